//! JSON-file document store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::DocumentStore;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::notification::StoredNotification;
use crate::reading::Snapshot;

/// Stores each document as a pretty-printed JSON file.
///
/// Writes go to a sibling temp file which is then renamed over the target, so
/// a crash mid-write leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    snapshot_path: PathBuf,
    log_path: PathBuf,
}

/// Just the version field of a stored snapshot.
#[derive(Debug, Deserialize)]
struct VersionProbe {
    #[serde(default)]
    version: u64,
}

impl JsonFileStore {
    /// Open a store over the given document paths.
    ///
    /// Creates parent directories if they don't exist. The documents
    /// themselves are created on first write.
    ///
    /// # Errors
    ///
    /// Returns an error if a parent directory cannot be created.
    pub fn open(snapshot_path: impl AsRef<Path>, log_path: impl AsRef<Path>) -> Result<Self> {
        let snapshot_path = snapshot_path.as_ref().to_path_buf();
        let log_path = log_path.as_ref().to_path_buf();

        for path in [&snapshot_path, &log_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                        path: parent.to_path_buf(),
                        source,
                    })?;
                }
            }
        }

        info!(
            "Document store at {} and {}",
            snapshot_path.display(),
            log_path.display()
        );
        Ok(Self {
            snapshot_path,
            log_path,
        })
    }

    /// Open the store at the paths named by the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::open(config.snapshot_path(), config.notifications_path())
    }

    /// Path of the snapshot document.
    #[must_use]
    pub fn snapshot_path(&self) -> &Path {
        &self.snapshot_path
    }

    /// Path of the notification log document.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    async fn read_document<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("No document at {}", path.display());
                return Ok(None);
            }
            Err(source) => {
                return Err(Error::DocumentRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|source| Error::DocumentParse {
                path: path.to_path_buf(),
                source,
            })
    }

    async fn write_document<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut temp = path.as_os_str().to_owned();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|source| Error::DocumentWrite {
                path: temp.clone(),
                source,
            })?;
        tokio::fs::rename(&temp, path)
            .await
            .map_err(|source| Error::DocumentWrite {
                path: path.to_path_buf(),
                source,
            })?;

        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn stored_version(&self) -> Result<Option<u64>> {
        match Self::read_document::<VersionProbe>(&self.snapshot_path).await {
            Ok(probe) => Ok(probe.map(|p| p.version)),
            Err(Error::DocumentParse { path, source }) => {
                warn!(
                    "Overwriting unreadable snapshot at {}: {}",
                    path.display(),
                    source
                );
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn load_snapshot(&self) -> Result<Option<Snapshot>> {
        Self::read_document(&self.snapshot_path).await
    }

    async fn save_snapshot(
        &self,
        snapshot: &Snapshot,
        expected_version: Option<u64>,
    ) -> Result<()> {
        let found = self.stored_version().await?;
        if found != expected_version {
            return Err(Error::VersionConflict {
                expected: expected_version,
                found,
            });
        }
        Self::write_document(&self.snapshot_path, snapshot).await
    }

    async fn load_notification_log(&self) -> Result<Vec<StoredNotification>> {
        Ok(Self::read_document(&self.log_path)
            .await?
            .unwrap_or_default())
    }

    async fn save_notification_log(&self, log: &[StoredNotification]) -> Result<()> {
        Self::write_document(&self.log_path, log).await
    }
}
