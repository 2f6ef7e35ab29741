//! Retention policy for the notification log.

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::Config;
use crate::notification::StoredNotification;

/// Bounds applied to the notification log after each append.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Keep at most this many records. 0 means unlimited.
    pub max_records: usize,
    /// Drop records older than this.
    pub max_age: Option<Duration>,
}

impl RetentionPolicy {
    /// A policy that keeps everything.
    #[must_use]
    pub fn unlimited() -> Self {
        Self::default()
    }

    /// Build the policy from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_records: config.retention.max_notifications,
            max_age: config
                .max_notification_age()
                .and_then(|age| Duration::from_std(age).ok()),
        }
    }

    /// Prune `log` in place, returning how many records were removed.
    ///
    /// The log is in append order, so the most recent records are at the
    /// end. Records with unparsable timestamps are never pruned by age.
    pub fn apply(&self, log: &mut Vec<StoredNotification>, now: DateTime<Utc>) -> usize {
        let before = log.len();

        // A window reaching past the earliest representable instant keeps everything.
        if let Some(cutoff) = self.max_age.and_then(|age| now.checked_sub_signed(age)) {
            log.retain(|record| record.instant().map_or(true, |instant| instant >= cutoff));
        }

        if self.max_records > 0 && log.len() > self.max_records {
            let excess = log.len() - self.max_records;
            log.drain(..excess);
        }

        let pruned = before - log.len();
        if pruned > 0 {
            info!("Pruned {} notifications from the log", pruned);
        }
        pruned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{SecondsFormat, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn record_at(instant: DateTime<Utc>, issue: &str) -> StoredNotification {
        StoredNotification::with_message(instant.to_rfc3339_opts(SecondsFormat::Millis, true), issue)
    }

    #[test]
    fn test_unlimited_keeps_everything() {
        let mut log = vec![
            record_at(now() - Duration::days(400), "old"),
            record_at(now(), "new"),
        ];
        assert_eq!(RetentionPolicy::unlimited().apply(&mut log, now()), 0);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_prune_by_age() {
        let policy = RetentionPolicy {
            max_records: 0,
            max_age: Some(Duration::days(30)),
        };
        let mut log = vec![
            record_at(now() - Duration::days(31), "expired"),
            record_at(now() - Duration::days(29), "kept"),
            StoredNotification::with_message("garbage", "unparsable"),
        ];

        assert_eq!(policy.apply(&mut log, now()), 1);
        let issues: Vec<_> = log.iter().map(|r| r.issue_list()[0]).collect();
        assert_eq!(issues, vec!["kept", "unparsable"]);
    }

    #[test]
    fn test_age_beyond_calendar_keeps_everything() {
        let policy = RetentionPolicy {
            max_records: 0,
            max_age: Some(Duration::days(200_000_000)),
        };
        let mut log = vec![
            record_at(now() - Duration::days(3650), "ancient"),
            record_at(now(), "fresh"),
        ];

        assert_eq!(policy.apply(&mut log, now()), 0);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_prune_keeps_most_recent_appends() {
        let policy = RetentionPolicy {
            max_records: 2,
            max_age: None,
        };
        let mut log: Vec<_> = (0..5)
            .map(|i| record_at(now() + Duration::seconds(i), &format!("n{i}")))
            .collect();

        assert_eq!(policy.apply(&mut log, now()), 3);
        let issues: Vec<_> = log.iter().map(|r| r.issue_list()[0]).collect();
        assert_eq!(issues, vec!["n3", "n4"]);
    }

    #[test]
    fn test_no_pruning_needed() {
        let policy = RetentionPolicy {
            max_records: 10,
            max_age: Some(Duration::days(1)),
        };
        let mut log = vec![record_at(now(), "fresh")];
        assert_eq!(policy.apply(&mut log, now()), 0);
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.retention.max_notifications = 100;
        config.retention.max_age_days = 7;

        let policy = RetentionPolicy::from_config(&config);
        assert_eq!(policy.max_records, 100);
        assert_eq!(policy.max_age, Some(Duration::days(7)));

        config.retention.max_age_days = 0;
        assert!(RetentionPolicy::from_config(&config).max_age.is_none());
    }
}
