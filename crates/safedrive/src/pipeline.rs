//! Ingestion and retrieval of prototype sensor data.
//!
//! [`PrototypeService`] ties the status evaluator, the notification
//! synthesizer, the renderer and a [`DocumentStore`] together.
//!
//! Ingestion is a read-modify-write over two independent documents. Within
//! one process the service serialises ingestions behind a mutex; across
//! processes the snapshot's version check turns a lost update into
//! [`Error::VersionConflict`]. The log and snapshot writes are still not
//! atomic with respect to each other: if the snapshot write fails after the
//! log write succeeded, the new notifications stay in the log.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::alerts::{evaluate_status, render, synthesize, DisplayZone};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notification::{RenderedNotification, StoredNotification};
use crate::reading::{OverallStatus, Readings, Snapshot};
use crate::storage::{DocumentStore, RetentionPolicy};

/// Result of ingesting one reading update.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    /// The snapshot as persisted.
    #[serde(flatten)]
    pub snapshot: Snapshot,
    /// Notifications raised by this update, as appended to the log.
    pub new_notifications: Vec<StoredNotification>,
    /// Number of notifications raised by this update.
    pub notifications_created: usize,
}

/// Current snapshot with its notifications rendered for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrototypeView {
    /// Last-known readings.
    #[serde(flatten)]
    pub readings: Readings,
    /// Status derived from the most recent update.
    pub overall_status: OverallStatus,
    /// Merged, deduplicated notifications, newest first.
    pub notifications: Vec<RenderedNotification>,
    /// When the snapshot was last written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Snapshot write counter.
    pub version: u64,
}

/// Orchestrates reading updates and reads over a document store.
#[derive(Debug)]
pub struct PrototypeService {
    store: Arc<dyn DocumentStore>,
    retention: RetentionPolicy,
    zone: DisplayZone,
    ingest_lock: Mutex<()>,
}

impl PrototypeService {
    /// Create a service over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, retention: RetentionPolicy, zone: DisplayZone) -> Self {
        Self {
            store,
            retention,
            zone,
            ingest_lock: Mutex::new(()),
        }
    }

    /// Create a service using the retention and display settings in `config`.
    #[must_use]
    pub fn from_config(store: Arc<dyn DocumentStore>, config: &Config) -> Self {
        Self::new(
            store,
            RetentionPolicy::from_config(config),
            DisplayZone::from_offset(config.display_offset()),
        )
    }

    /// Ingest a reading update observed now.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the log or the snapshot fails.
    pub async fn ingest(&self, update: Readings) -> Result<IngestOutcome> {
        self.ingest_at(update, Utc::now()).await
    }

    /// Ingest a reading update observed at `now`.
    ///
    /// An unreadable snapshot or log is logged and treated as absent.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting the log or the snapshot fails.
    pub async fn ingest_at(&self, update: Readings, now: DateTime<Utc>) -> Result<IngestOutcome> {
        let _guard = self.ingest_lock.lock().await;
        info!("Reading update: {:?}", update);

        let previous = match self.store.load_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                error!("Failed to read snapshot, starting fresh: {}", err);
                None
            }
        };
        let expected_version = previous.as_ref().map(|s| s.version);

        let records = synthesize(&update, now);
        let status = evaluate_status(&update);
        let snapshot = Snapshot::next(previous, &update, status, now);
        let new_notifications: Vec<StoredNotification> =
            records.iter().map(StoredNotification::from).collect();

        if !new_notifications.is_empty() {
            let mut log = match self.store.load_notification_log().await {
                Ok(log) => log,
                Err(err) => {
                    warn!("Failed to read notification log, starting a new one: {}", err);
                    Vec::new()
                }
            };
            log.extend(new_notifications.iter().cloned());
            self.retention.apply(&mut log, now);
            self.store.save_notification_log(&log).await?;
        }

        self.store.save_snapshot(&snapshot, expected_version).await?;

        info!(
            "Prototype data updated: status={} version={} notifications_created={}",
            snapshot.overall_status,
            snapshot.version,
            new_notifications.len()
        );
        Ok(IngestOutcome {
            notifications_created: new_notifications.len(),
            snapshot,
            new_notifications,
        })
    }

    /// Load the current snapshot with rendered notifications.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotUnavailable`] if no snapshot has been written
    /// and [`Error::SnapshotUnreadable`] if it cannot be read. An unreadable
    /// log is logged and treated as empty.
    pub async fn current(&self) -> Result<PrototypeView> {
        let snapshot = match self.store.load_snapshot().await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Err(Error::SnapshotUnavailable),
            Err(err) => {
                error!("Failed to read snapshot: {}", err);
                return Err(Error::SnapshotUnreadable(Box::new(err)));
            }
        };

        let log = self.store.load_notification_log().await.unwrap_or_else(|err| {
            error!("Failed to read notification log: {}", err);
            Vec::new()
        });

        Ok(PrototypeView {
            notifications: render(&log, &snapshot.notifications, self.zone),
            readings: snapshot.readings,
            overall_status: snapshot.overall_status,
            updated_at: snapshot.updated_at,
            version: snapshot.version,
        })
    }
}
