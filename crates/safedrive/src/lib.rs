//! `safedrive` - Driver-safety sensor ingestion and alert backend
//!
//! This library accepts partial reading updates from a vehicle prototype,
//! keeps the current sensor snapshot, raises notifications for unsafe
//! conditions, and serves a deduplicated, time-ordered alert history.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod alerts;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod reading;
pub mod server;
pub mod storage;
pub mod users;

pub use config::Config;
pub use error::{Error, Result};
pub use logging::init_logging;
pub use notification::{NotificationRecord, RenderedNotification, StoredNotification};
pub use pipeline::{IngestOutcome, PrototypeService, PrototypeView};
pub use reading::{OverallStatus, Readings, Snapshot};
pub use storage::{DocumentStore, JsonFileStore, MemoryStore};
pub use users::UserStore;
