//! Persistence for the sensor snapshot and notification log.
//!
//! Both are whole JSON documents, loaded fully on every access and replaced
//! wholesale on every write. The [`DocumentStore`] trait is the seam between
//! the pipeline and the backend; [`JsonFileStore`] is the production backend
//! and [`MemoryStore`] backs tests.

mod json_file;
mod memory;
pub mod retention;

use async_trait::async_trait;

use crate::error::Result;
use crate::notification::StoredNotification;
use crate::reading::Snapshot;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use retention::RetentionPolicy;

/// Backend holding the snapshot and notification log documents.
///
/// The snapshot and the log are independent documents: a write to one is not
/// coordinated with a write to the other.
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    /// Load the current snapshot.
    ///
    /// Returns `Ok(None)` if no snapshot has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    async fn load_snapshot(&self) -> Result<Option<Snapshot>>;

    /// Replace the snapshot.
    ///
    /// `expected_version` is the version the caller loaded (`None` if there
    /// was no snapshot). The write is refused if the stored version has moved
    /// on since.
    ///
    /// # Errors
    ///
    /// Returns [`Error::VersionConflict`](crate::Error::VersionConflict) on a
    /// lost update, or an error if the document cannot be written.
    async fn save_snapshot(&self, snapshot: &Snapshot, expected_version: Option<u64>)
        -> Result<()>;

    /// Load the notification log.
    ///
    /// Returns an empty log if none has been written yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    async fn load_notification_log(&self) -> Result<Vec<StoredNotification>>;

    /// Replace the notification log.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written.
    async fn save_notification_log(&self, log: &[StoredNotification]) -> Result<()>;
}
