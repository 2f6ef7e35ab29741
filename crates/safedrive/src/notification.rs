//! Notification record types.
//!
//! Three shapes exist: [`NotificationRecord`] is what the synthesizer
//! produces, [`StoredNotification`] is what the log and legacy snapshots hold
//! on disk, and [`RenderedNotification`] is the display form returned to
//! clients.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use tracing::debug;

/// A freshly synthesized alert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationRecord {
    /// When the issue was observed.
    pub timestamp: DateTime<Utc>,
    /// Issue descriptions; never empty.
    pub issues: Vec<String>,
}

impl NotificationRecord {
    /// Create a record describing a single issue.
    #[must_use]
    pub fn single(timestamp: DateTime<Utc>, issue: impl Into<String>) -> Self {
        Self {
            timestamp,
            issues: vec![issue.into()],
        }
    }
}

/// A notification as persisted.
///
/// Older writers stored `{timestamp, message}`; newer ones store
/// `{timestamp, issues}`. Both are accepted.
///
/// Decoding never fails. Fields of an unexpected shape are read as far as
/// they can be, and a record that doesn't match either form remembers the
/// JSON it was read from so a rewrite puts it back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredNotification {
    /// ISO-8601 instant, kept verbatim so malformed values survive a rewrite.
    pub timestamp: String,

    /// Single-issue text from older writers.
    pub message: Option<String>,

    /// Issue list.
    pub issues: Option<Vec<String>>,

    /// Source JSON of an irregular record.
    pub(crate) verbatim: Option<Value>,
}

impl StoredNotification {
    /// Create a legacy message-style record.
    #[must_use]
    pub fn with_message(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: Some(message.into()),
            issues: None,
            verbatim: None,
        }
    }

    /// Create an issues-style record.
    #[must_use]
    pub fn with_issues(timestamp: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            message: None,
            issues: Some(issues),
            verbatim: None,
        }
    }

    /// The record's issue list: `issues` if present, else its `message`.
    #[must_use]
    pub fn issue_list(&self) -> Vec<&str> {
        match (&self.issues, &self.message) {
            (Some(issues), _) => issues.iter().map(String::as_str).collect(),
            (None, Some(message)) => vec![message.as_str()],
            (None, None) => Vec::new(),
        }
    }

    /// The parsed instant, or `None` if the timestamp is malformed.
    #[must_use]
    pub fn instant(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Whether this record was read from JSON matching neither known form.
    #[must_use]
    pub fn is_irregular(&self) -> bool {
        self.verbatim.is_some()
    }

    fn from_json(value: Value) -> Self {
        let timestamp = match value.get("timestamp") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let message = value.get("message").and_then(scalar_text);
        let issues = match value.get("issues") {
            None | Some(Value::Null) => None,
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .map(|item| scalar_text(item).unwrap_or_else(|| item.to_string()))
                    .collect(),
            ),
            // Not a list, so it can never hold exactly one issue.
            Some(_) => Some(Vec::new()),
        };

        let mut record = Self {
            timestamp,
            message,
            issues,
            verbatim: None,
        };
        if serde_json::to_value(&record).ok().as_ref() != Some(&value) {
            debug!("Keeping irregular notification record verbatim: {}", value);
            record.verbatim = Some(value);
        }
        record
    }
}

/// Text of a string, number or boolean.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(_) | Value::Bool(_) => Some(value.to_string()),
        _ => None,
    }
}

impl Serialize for StoredNotification {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if let Some(verbatim) = &self.verbatim {
            return verbatim.serialize(serializer);
        }

        let len = 1 + usize::from(self.message.is_some()) + usize::from(self.issues.is_some());
        let mut state = serializer.serialize_struct("StoredNotification", len)?;
        state.serialize_field("timestamp", &self.timestamp)?;
        match &self.message {
            Some(message) => state.serialize_field("message", message)?,
            None => state.skip_field("message")?,
        }
        match &self.issues {
            Some(issues) => state.serialize_field("issues", issues)?,
            None => state.skip_field("issues")?,
        }
        state.end()
    }
}

impl<'de> Deserialize<'de> for StoredNotification {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::from_json)
    }
}

impl From<&NotificationRecord> for StoredNotification {
    fn from(record: &NotificationRecord) -> Self {
        Self::with_issues(
            record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            record.issues.clone(),
        )
    }
}

/// A notification ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNotification {
    /// Local `MM/DD/YY H:MM:SS AM/PM` rendering of the instant.
    pub timestamp: String,
    /// Exactly one issue text.
    pub issues: Vec<String>,
}
