//! `SQLite` schema definitions for the user database.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    phone TEXT,
    user_type TEXT NOT NULL DEFAULT 'rider',
    profile_completed INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// SQL statement to create an index on `created_at` for newest-first listing.
pub const CREATE_CREATED_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_users_created ON users(created_at DESC)
";

/// SQL statement to create an index on `user_type` for filtering.
pub const CREATE_TYPE_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_users_type ON users(user_type)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_CREATED_INDEX,
    CREATE_TYPE_INDEX,
    CREATE_METADATA_TABLE,
];
