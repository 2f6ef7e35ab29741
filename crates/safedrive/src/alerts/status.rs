//! Overall status evaluation.

use crate::reading::{OverallStatus, Readings};

/// Derive the overall status of a single reading update.
///
/// A stationary vehicle is always [`OverallStatus::Normal`]. Otherwise a loose
/// grip or closed eyes raises [`OverallStatus::Alert`]. Heart rate and
/// blood-oxygen do not contribute here even though they produce
/// notifications.
#[must_use]
pub fn evaluate_status(reading: &Readings) -> OverallStatus {
    if reading.is_stationary() {
        return OverallStatus::Normal;
    }

    let abnormal = [reading.grip_is_loose(), reading.eyes_are_closed()]
        .into_iter()
        .filter(|flag| *flag)
        .count();

    if abnormal >= 1 {
        OverallStatus::Alert
    } else {
        OverallStatus::Normal
    }
}
