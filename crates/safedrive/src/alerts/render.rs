//! Merging persisted notifications into a display list.
//!
//! The notification log and the snapshot's embedded list describe the same
//! stream. Rendering concatenates them, drops multi-issue records, removes
//! duplicates, and orders the rest newest first.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::notification::{RenderedNotification, StoredNotification};

/// Display format: `MM/DD/YY H:MM:SS AM/PM`.
const DISPLAY_FORMAT: &str = "%m/%d/%y %-I:%M:%S %p";

/// Time zone used for rendered timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayZone {
    /// The server's local time zone.
    #[default]
    Local,
    /// A fixed offset from UTC.
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Build the zone from an optional configured offset.
    #[must_use]
    pub fn from_offset(offset: Option<FixedOffset>) -> Self {
        offset.map_or(Self::Local, Self::Fixed)
    }

    /// Format an instant for display.
    #[must_use]
    pub fn format(&self, instant: DateTime<Utc>) -> String {
        match self {
            Self::Local => instant
                .with_timezone(&Local)
                .format(DISPLAY_FORMAT)
                .to_string(),
            Self::Fixed(offset) => instant
                .with_timezone(offset)
                .format(DISPLAY_FORMAT)
                .to_string(),
        }
    }
}

/// Identity of a record's timestamp for deduplication.
///
/// Parsed instants compare by value so equivalent ISO spellings collide;
/// malformed timestamps compare verbatim.
#[derive(Debug, PartialEq, Eq, Hash)]
enum TimestampKey<'a> {
    Instant(DateTime<Utc>),
    Raw(&'a str),
}

#[derive(Debug)]
struct Candidate<'a> {
    instant: Option<DateTime<Utc>>,
    raw_timestamp: &'a str,
    issue: &'a str,
}

/// Render the log and the snapshot's embedded notifications for display.
///
/// Malformed timestamps sort after every valid one and are shown verbatim.
/// The output depends only on the inputs, so rendering is repeatable.
#[must_use]
pub fn render(
    log: &[StoredNotification],
    embedded: &[StoredNotification],
    zone: DisplayZone,
) -> Vec<RenderedNotification> {
    let mut seen = HashSet::new();
    let mut candidates: Vec<Candidate<'_>> = log
        .iter()
        .chain(embedded)
        .filter_map(|record| match record.issue_list().as_slice() {
            [issue] => Some(Candidate {
                instant: record.instant(),
                raw_timestamp: &record.timestamp,
                issue: *issue,
            }),
            _ => None,
        })
        .filter(|candidate| {
            let key = candidate
                .instant
                .map_or(TimestampKey::Raw(candidate.raw_timestamp), TimestampKey::Instant);
            seen.insert((key, candidate.issue))
        })
        .collect();

    // Stable, so ties keep log-then-snapshot order.
    candidates.sort_by(|a, b| match (a.instant, b.instant) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    candidates
        .into_iter()
        .map(|candidate| RenderedNotification {
            timestamp: candidate
                .instant
                .map_or_else(|| candidate.raw_timestamp.to_string(), |i| zone.format(i)),
            issues: vec![candidate.issue.to_string()],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc() -> DisplayZone {
        DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap())
    }

    fn issues_of(rendered: &[RenderedNotification]) -> Vec<&str> {
        rendered.iter().map(|r| r.issues[0].as_str()).collect()
    }

    #[test]
    fn test_format_afternoon() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 7, 15, 4, 9).unwrap();
        assert_eq!(utc().format(instant), "03/07/24 3:04:09 PM");
    }

    #[test]
    fn test_format_midnight_and_noon() {
        let midnight = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 5).unwrap();
        assert_eq!(utc().format(midnight), "12/31/25 12:00:05 AM");

        let noon = Utc.with_ymd_and_hms(2025, 1, 2, 12, 30, 0).unwrap();
        assert_eq!(utc().format(noon), "01/02/25 12:30:00 PM");
    }

    #[test]
    fn test_format_with_offset() {
        let zone = DisplayZone::Fixed(FixedOffset::west_opt(5 * 3600).unwrap());
        let instant = Utc.with_ymd_and_hms(2024, 3, 7, 3, 0, 0).unwrap();
        assert_eq!(zone.format(instant), "03/06/24 10:00:00 PM");
    }

    #[test]
    fn test_from_offset() {
        assert_eq!(DisplayZone::from_offset(None), DisplayZone::Local);
        let offset = FixedOffset::east_opt(3600).unwrap();
        assert_eq!(
            DisplayZone::from_offset(Some(offset)),
            DisplayZone::Fixed(offset)
        );
    }

    #[test]
    fn test_combines_and_sorts_newest_first() {
        let log = vec![
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
            StoredNotification::with_issues(
                "2024-05-01T12:00:00.000Z",
                vec!["Eyes Closed".to_string()],
            ),
        ];
        let embedded = vec![StoredNotification::with_issues(
            "2024-05-01T11:00:00.000Z",
            vec!["Unsafe Driving".to_string()],
        )];

        let rendered = render(&log, &embedded, utc());
        assert_eq!(
            issues_of(&rendered),
            vec!["Eyes Closed", "Unsafe Driving", "Loose Grip"]
        );
        assert_eq!(rendered[0].timestamp, "05/01/24 12:00:00 PM");
    }

    #[test]
    fn test_multi_issue_records_excluded() {
        let log = vec![
            StoredNotification::with_issues(
                "2024-05-01T10:00:00.000Z",
                vec!["Loose Grip".to_string(), "Eyes Closed".to_string()],
            ),
            StoredNotification::with_message("2024-05-01T09:00:00.000Z", "Low SpO2: 85"),
        ];

        let rendered = render(&log, &[], utc());
        assert_eq!(issues_of(&rendered), vec!["Low SpO2: 85"]);
    }

    #[test]
    fn test_records_without_text_excluded() {
        let log = vec![StoredNotification {
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
            ..StoredNotification::default()
        }];
        assert!(render(&log, &[], utc()).is_empty());
    }

    #[test]
    fn test_duplicates_collapse() {
        let record = StoredNotification::with_issues(
            "2024-05-01T10:00:00.000Z",
            vec!["Loose Grip".to_string()],
        );
        let rendered = render(&[record.clone()], &[record], utc());
        assert_eq!(rendered.len(), 1);
    }

    #[test]
    fn test_message_and_issue_forms_collapse() {
        let log = vec![StoredNotification::with_message(
            "2024-05-01T10:00:00.000Z",
            "Loose Grip",
        )];
        let embedded = vec![StoredNotification::with_issues(
            "2024-05-01T10:00:00Z",
            vec!["Loose Grip".to_string()],
        )];
        assert_eq!(render(&log, &embedded, utc()).len(), 1);
    }

    #[test]
    fn test_same_time_different_issue_kept() {
        let log = vec![
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Eyes Closed"),
        ];
        let rendered = render(&log, &[], utc());
        assert_eq!(issues_of(&rendered), vec!["Loose Grip", "Eyes Closed"]);
    }

    #[test]
    fn test_same_issue_different_time_kept() {
        let log = vec![
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
            StoredNotification::with_message("2024-05-01T10:00:01.000Z", "Loose Grip"),
        ];
        assert_eq!(render(&log, &[], utc()).len(), 2);
    }

    #[test]
    fn test_malformed_timestamps_sort_last() {
        let log = vec![
            StoredNotification::with_message("not a time", "Eyes Closed"),
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
        ];
        let rendered = render(&log, &[], utc());

        assert_eq!(issues_of(&rendered), vec!["Loose Grip", "Eyes Closed"]);
        assert_eq!(rendered[1].timestamp, "not a time");
    }

    #[test]
    fn test_same_update_keeps_slot_order() {
        let log = vec![
            StoredNotification::with_issues(
                "2024-05-01T10:00:00.001Z",
                vec!["Eyes Closed".to_string()],
            ),
            StoredNotification::with_issues(
                "2024-05-01T10:00:00.002Z",
                vec!["Abnormal BPM: 150".to_string()],
            ),
        ];
        let rendered = render(&log, &[], utc());
        assert_eq!(issues_of(&rendered), vec!["Abnormal BPM: 150", "Eyes Closed"]);
    }

    #[test]
    fn test_render_is_repeatable() {
        let log = vec![
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
            StoredNotification::with_message("bad", "Eyes Closed"),
            StoredNotification::with_message("2024-05-01T10:00:00.000Z", "Loose Grip"),
        ];
        let embedded = vec![StoredNotification::with_message(
            "2024-05-02T10:00:00.000Z",
            "Unsafe Driving",
        )];

        assert_eq!(
            render(&log, &embedded, utc()),
            render(&log, &embedded, utc())
        );
    }

    #[test]
    fn test_empty_inputs() {
        assert!(render(&[], &[], DisplayZone::Local).is_empty());
    }
}
