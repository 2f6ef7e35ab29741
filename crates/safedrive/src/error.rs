//! Error types for safedrive.
//!
//! This module defines all error types used throughout the safedrive crate,
//! along with the HTTP status each one surfaces as.

use std::path::PathBuf;

use axum::http::StatusCode;
use thiserror::Error;

/// The main error type for safedrive operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Document Store Errors ===
    /// A persisted document could not be read.
    #[error("failed to read document at {path}: {source}")]
    DocumentRead {
        /// Path to the document file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A persisted document exists but is not valid JSON for its type.
    #[error("failed to parse document at {path}: {source}")]
    DocumentParse {
        /// Path to the document file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A persisted document could not be written.
    #[error("failed to write document at {path}: {source}")]
    DocumentWrite {
        /// Path to the document file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The snapshot changed between read and write.
    #[error("snapshot version conflict: expected {expected:?}, found {found:?}")]
    VersionConflict {
        /// Version the writer read before modifying.
        expected: Option<u64>,
        /// Version currently stored.
        found: Option<u64>,
    },

    /// No sensor snapshot has been recorded yet.
    #[error("Failed to read current prototype data")]
    SnapshotUnavailable,

    /// The snapshot document exists but could not be read.
    #[error("Failed to read current prototype data")]
    SnapshotUnreadable(#[source] Box<Error>),

    // === User Database Errors ===
    /// Failed to open or create the user database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === User Errors ===
    /// Request data failed validation.
    #[error("{0}")]
    Validation(String),

    /// A resource with the same identity already exists.
    #[error("{0}")]
    Conflict(String),

    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Login credentials did not match.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// The account has been soft-deleted.
    #[error("Account is deactivated")]
    AccountDeactivated,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for safedrive operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new conflict error.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Create a new not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the requested resource is missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::SnapshotUnavailable)
    }

    /// Check if this error is a lost-update conflict on the snapshot.
    #[must_use]
    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    /// The HTTP status this error is reported with.
    ///
    /// A missing snapshot is a server error rather than a 404: retrieval has
    /// no sensible default to fall back on.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::AccountDeactivated => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) | Self::VersionConflict { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
