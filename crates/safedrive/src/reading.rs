//! Sensor readings and the persisted snapshot.
//!
//! A [`Readings`] value is both the inbound partial update a device posts and
//! the set of last-known values held by the [`Snapshot`]. Every field is
//! optional: `None` means "not provided", which is distinct from a provided
//! zero.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::notification::StoredNotification;

/// Coarse safety classification of the latest reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallStatus {
    /// No abnormal indicator.
    #[default]
    Normal,
    /// At least one abnormal indicator while the vehicle is moving.
    Alert,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Normal => write!(f, "NORMAL"),
            Self::Alert => write!(f, "ALERT"),
        }
    }
}

/// One set of sensor and vehicle readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Readings {
    /// Steering-wheel grip state (`"loose"` is abnormal).
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub grip_status: Option<String>,

    /// Eye state (`"closed"` is abnormal).
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub eyes_status: Option<String>,

    /// Heart rate in beats per minute.
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub bpm: Option<f64>,

    /// Blood-oxygen saturation percentage.
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub spo2: Option<f64>,

    /// Vehicle motion state: `"stationary"`, `"alert"`, or free text.
    #[serde(
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub car_status: Option<String>,
}

impl Readings {
    /// Whether the vehicle reports itself as parked.
    #[must_use]
    pub fn is_stationary(&self) -> bool {
        text_is(self.car_status.as_deref(), "stationary")
    }

    /// Whether the driver's grip is loose.
    #[must_use]
    pub fn grip_is_loose(&self) -> bool {
        text_is(self.grip_status.as_deref(), "loose")
    }

    /// Whether the driver's eyes are closed.
    #[must_use]
    pub fn eyes_are_closed(&self) -> bool {
        text_is(self.eyes_status.as_deref(), "closed")
    }

    /// Whether the vehicle flags unsafe driving.
    #[must_use]
    pub fn driving_is_unsafe(&self) -> bool {
        text_is(self.car_status.as_deref(), "alert")
    }

    /// Overlay the provided fields of `self` onto `previous`.
    ///
    /// Fields this update leaves out keep their previous value.
    #[must_use]
    pub fn merged_over(&self, previous: &Readings) -> Readings {
        Readings {
            grip_status: self
                .grip_status
                .clone()
                .or_else(|| previous.grip_status.clone()),
            eyes_status: self
                .eyes_status
                .clone()
                .or_else(|| previous.eyes_status.clone()),
            bpm: self.bpm.or(previous.bpm),
            spo2: self.spo2.or(previous.spo2),
            car_status: self
                .car_status
                .clone()
                .or_else(|| previous.car_status.clone()),
        }
    }

    /// Whether no field at all was provided.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Readings::default()
    }
}

/// The single current record of last-known readings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Last-known value of every reading field.
    #[serde(flatten)]
    pub readings: Readings,

    /// Status derived from the most recent update.
    #[serde(default)]
    pub overall_status: OverallStatus,

    /// Notifications embedded by older writers.
    ///
    /// New notifications go to the notification log only; this list is
    /// carried forward unchanged and reconciled when rendering.
    #[serde(default)]
    pub notifications: Vec<StoredNotification>,

    /// When this snapshot was last written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Write counter used to detect lost updates. Documents written before
    /// versioning existed read as version 0.
    #[serde(default)]
    pub version: u64,
}

impl Snapshot {
    /// Build the snapshot that follows `previous` after applying `update`.
    #[must_use]
    pub fn next(
        previous: Option<Snapshot>,
        update: &Readings,
        status: OverallStatus,
        now: DateTime<Utc>,
    ) -> Snapshot {
        let previous = previous.unwrap_or_default();
        Snapshot {
            readings: update.merged_over(&previous.readings),
            overall_status: status,
            notifications: previous.notifications,
            updated_at: Some(now),
            version: previous.version.saturating_add(1),
        }
    }
}

fn text_is(value: Option<&str>, expected: &str) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case(expected))
}

/// Accept any JSON for a text field; only non-empty strings count as provided.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) if s.is_empty() => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => {
            warn!("ignoring non-text status value: {}", other);
            None
        }
    })
}

/// Accept any JSON for a numeric field; non-numeric input is treated as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let number = match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() => None,
        Some(serde_json::Value::String(s)) => {
            let parsed = s.trim().parse::<f64>().ok();
            if parsed.is_none() {
                warn!("ignoring non-numeric reading: {:?}", s);
            }
            parsed
        }
        Some(other) => {
            warn!("ignoring non-numeric reading: {}", other);
            None
        }
    };
    Ok(number.filter(|n| n.is_finite()))
}
