//! Notification synthesis.
//!
//! Each rule has a fixed slot. A rule in slot `k` that fires is stamped
//! `base + k` milliseconds, so issues raised by the same update keep a stable
//! relative order once the log is sorted by time.

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};

use crate::notification::NotificationRecord;
use crate::reading::Readings;

/// Heart rate below this is abnormal.
pub const MIN_NORMAL_BPM: f64 = 60.0;

/// Heart rate above this is abnormal.
pub const MAX_NORMAL_BPM: f64 = 120.0;

/// Blood-oxygen below this is abnormal.
pub const MIN_NORMAL_SPO2: f64 = 90.0;

type Rule = fn(&Readings) -> Option<String>;

/// Rules in slot order.
const RULES: [Rule; 5] = [
    loose_grip,
    eyes_closed,
    abnormal_bpm,
    low_spo2,
    unsafe_driving,
];

/// Produce the notifications raised by `update`, stamped from `base`.
///
/// A stationary vehicle produces nothing.
#[must_use]
pub fn synthesize(update: &Readings, base: DateTime<Utc>) -> Vec<NotificationRecord> {
    if update.is_stationary() {
        info!("Car is stationary - all alerts suppressed");
        return Vec::new();
    }

    let mut records = Vec::new();
    for (slot, rule) in (0_i64..).zip(RULES) {
        if let Some(issue) = rule(update) {
            debug!("Raising notification: {}", issue);
            records.push(NotificationRecord::single(
                base + Duration::milliseconds(slot),
                issue,
            ));
        }
    }
    records
}

fn loose_grip(update: &Readings) -> Option<String> {
    update.grip_is_loose().then(|| "Loose Grip".to_string())
}

fn eyes_closed(update: &Readings) -> Option<String> {
    update.eyes_are_closed().then(|| "Eyes Closed".to_string())
}

// A zero reading means the sensor reported nothing and is never flagged.
fn abnormal_bpm(update: &Readings) -> Option<String> {
    update
        .bpm
        .filter(|bpm| *bpm != 0.0 && (*bpm < MIN_NORMAL_BPM || *bpm > MAX_NORMAL_BPM))
        .map(|bpm| format!("Abnormal BPM: {bpm}"))
}

fn low_spo2(update: &Readings) -> Option<String> {
    update
        .spo2
        .filter(|spo2| *spo2 != 0.0 && *spo2 < MIN_NORMAL_SPO2)
        .map(|spo2| format!("Low SpO2: {spo2}"))
}

fn unsafe_driving(update: &Readings) -> Option<String> {
    update
        .driving_is_unsafe()
        .then(|| "Unsafe Driving".to_string())
}
