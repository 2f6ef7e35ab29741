//! In-memory document store.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::DocumentStore;
use crate::error::{Error, Result};
use crate::notification::StoredNotification;
use crate::reading::Snapshot;

/// Keeps both documents in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: RwLock<Option<Snapshot>>,
    log: RwLock<Vec<StoredNotification>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with existing documents.
    #[must_use]
    pub fn with_documents(snapshot: Option<Snapshot>, log: Vec<StoredNotification>) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            log: RwLock::new(log),
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        Ok(self.snapshot.read().await.clone())
    }

    async fn save_snapshot(
        &self,
        snapshot: &Snapshot,
        expected_version: Option<u64>,
    ) -> Result<()> {
        let mut current = self.snapshot.write().await;
        let found = current.as_ref().map(|s| s.version);
        if found != expected_version {
            return Err(Error::VersionConflict {
                expected: expected_version,
                found,
            });
        }
        *current = Some(snapshot.clone());
        Ok(())
    }

    async fn load_notification_log(&self) -> Result<Vec<StoredNotification>> {
        Ok(self.log.read().await.clone())
    }

    async fn save_notification_log(&self, log: &[StoredNotification]) -> Result<()> {
        *self.log.write().await = log.to_vec();
        Ok(())
    }
}
