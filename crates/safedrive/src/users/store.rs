//! `SQLite`-backed account store.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::migrations;
use super::model::{
    provided, Credentials, ListQuery, NewUser, Pagination, User, UserChanges, UserPage,
    DEFAULT_USER_TYPE,
};

const USER_COLUMNS: &str =
    "id, name, email, phone, user_type, profile_completed, is_active, created_at";

const USER_NOT_FOUND: &str = "User not found";

/// Length of generated account identifiers, in hex characters.
const ID_LENGTH: usize = 24;

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("invalid email regex")
    })
}

/// Persistent account storage.
#[derive(Debug)]
pub struct UserStore {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl UserStore {
    /// Open or create the account database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening user database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("User database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory store for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List accounts newest first, filtered and paginated.
    ///
    /// `search` is a case-insensitive substring match over name and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, query: &ListQuery) -> Result<UserPage> {
        let page = query.page.max(1);
        let limit = query.limit.max(1);
        let pattern = provided(query.search.as_deref()).map(|s| format!("%{s}%"));
        let user_type = provided(query.user_type.as_deref());

        let filter = r"
            WHERE (?1 IS NULL OR name LIKE ?1 OR email LIKE ?1)
              AND (?2 IS NULL OR user_type = ?2)
        ";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM users {filter}"),
            params![pattern, user_type],
            |row| row.get(0),
        )?;

        let offset = i64::from(page - 1) * i64::from(limit);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users {filter}
             ORDER BY created_at DESC, rowid DESC LIMIT ?3 OFFSET ?4"
        ))?;
        let users = stmt
            .query_map(
                params![pattern, user_type, i64::from(limit), offset],
                Self::row_to_user,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let total = u64::try_from(total).unwrap_or_default();
        Ok(UserPage {
            users,
            pagination: Pagination::new(page, limit, total),
        })
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns a validation error when name, email or password is missing or
    /// the email is malformed, and a conflict when the email is taken.
    pub fn create(&self, new: &NewUser) -> Result<User> {
        let (Some(name), Some(email), Some(password)) = (
            provided(new.name.as_deref()),
            provided(new.email.as_deref()),
            new.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(Error::validation("Name, email and password are required"));
        };

        let email = normalize_email(email);
        if !email_pattern().is_match(&email) {
            return Err(Error::validation("Please provide a valid email"));
        }
        if self.find_by_email(&email)?.is_some() {
            return Err(Error::conflict("User with this email already exists"));
        }

        let now = Utc::now();
        let user = User {
            id: generate_id(&email, now),
            name: name.to_string(),
            email,
            phone: provided(new.phone.as_deref()).map(str::to_string),
            user_type: provided(new.user_type.as_deref())
                .unwrap_or(DEFAULT_USER_TYPE)
                .to_string(),
            profile_completed: false,
            is_active: true,
            created_at: now,
        };
        let timestamp = format_timestamp(now);

        self.conn.execute(
            r"
            INSERT INTO users (id, name, email, password_hash, phone, user_type,
                               profile_completed, is_active, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 1, ?7, ?7)
            ",
            params![
                user.id,
                user.name,
                user.email,
                hash_password(password),
                user.phone,
                user.user_type,
                timestamp,
            ],
        )?;

        info!("Created user {}", user.id);
        Ok(user)
    }

    /// Check credentials and return the matching active account.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidCredentials`] for an unknown email or wrong
    /// password and [`Error::AccountDeactivated`] for a deleted account.
    pub fn login(&self, credentials: &Credentials) -> Result<User> {
        let (Some(email), Some(password)) = (
            provided(credentials.email.as_deref()),
            credentials.password.as_deref().filter(|p| !p.is_empty()),
        ) else {
            return Err(Error::validation("Email and password are required"));
        };

        let Some((user, stored_hash)) = self.find_by_email(&normalize_email(email))? else {
            debug!("Login for unknown email");
            return Err(Error::InvalidCredentials);
        };
        if stored_hash != hash_password(password) {
            warn!("Failed login for user {}", user.id);
            return Err(Error::InvalidCredentials);
        }
        if !user.is_active {
            return Err(Error::AccountDeactivated);
        }

        info!("User {} logged in", user.id);
        Ok(user)
    }

    /// Get an account by id.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no account has this id.
    pub fn get(&self, id: &str) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                [id],
                Self::row_to_user,
            )
            .optional()?
            .ok_or_else(|| Error::not_found(USER_NOT_FOUND))
    }

    /// Apply `changes` to an account and return the updated account.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no account has this id.
    pub fn update(&self, id: &str, changes: &UserChanges) -> Result<User> {
        let affected = self.conn.execute(
            r"
            UPDATE users SET
                name = COALESCE(?2, name),
                phone = COALESCE(?3, phone),
                user_type = COALESCE(?4, user_type),
                updated_at = ?5
            WHERE id = ?1
            ",
            params![
                id,
                provided(changes.name.as_deref()),
                provided(changes.phone.as_deref()),
                provided(changes.user_type.as_deref()),
                format_timestamp(Utc::now()),
            ],
        )?;
        if affected == 0 {
            return Err(Error::not_found(USER_NOT_FOUND));
        }

        debug!("Updated user {}", id);
        self.get(id)
    }

    /// Deactivate an account. The row is kept.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if no account has this id.
    pub fn deactivate(&self, id: &str) -> Result<User> {
        let affected = self.conn.execute(
            "UPDATE users SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            params![id, format_timestamp(Utc::now())],
        )?;
        if affected == 0 {
            return Err(Error::not_found(USER_NOT_FOUND));
        }

        info!("Deactivated user {}", id);
        self.get(id)
    }

    /// Count all accounts, active or not.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
        Ok(count)
    }

    fn find_by_email(&self, email: &str) -> Result<Option<(User, String)>> {
        let found = self
            .conn
            .query_row(
                &format!("SELECT {USER_COLUMNS}, password_hash FROM users WHERE email = ?1"),
                [email],
                |row| Ok((Self::row_to_user(row)?, row.get(8)?)),
            )
            .optional()?;
        Ok(found)
    }

    fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
        let created_at: String = row.get(7)?;
        let created_at = DateTime::parse_from_rfc3339(&created_at).map_or_else(
            |_| {
                warn!("Unparsable created_at {:?}, using epoch", created_at);
                DateTime::<Utc>::UNIX_EPOCH
            },
            |dt| dt.with_timezone(&Utc),
        );

        Ok(User {
            id: row.get(0)?,
            name: row.get(1)?,
            email: row.get(2)?,
            phone: row.get(3)?,
            user_type: row.get(4)?,
            profile_completed: row.get(5)?,
            is_active: row.get(6)?,
            created_at,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn format_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn hash_password(password: &str) -> String {
    let mut hasher = blake3::Hasher::new_derive_key("safedrive 2024 account password");
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

fn generate_id(email: &str, now: DateTime<Utc>) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(email.as_bytes());
    hasher.update(&now.timestamp_micros().to_le_bytes());
    hasher.update(&ID_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..ID_LENGTH].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_store() -> UserStore {
        UserStore::open_in_memory().expect("failed to create test store")
    }

    fn new_user(name: &str, email: &str) -> NewUser {
        NewUser {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some("secret".to_string()),
            ..NewUser::default()
        }
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        }
    }

    #[test]
    fn test_create_and_get() {
        let store = create_test_store();
        let user = store.create(&new_user("Ana", "ana@example.com")).unwrap();

        assert_eq!(user.id.len(), ID_LENGTH);
        assert_eq!(user.user_type, "rider");
        assert!(user.is_active);
        assert!(!user.profile_completed);

        let fetched = store.get(&user.id).unwrap();
        assert_eq!(fetched.email, "ana@example.com");
        assert_eq!(fetched.created_at, user.created_at);
    }

    #[test]
    fn test_create_requires_fields() {
        let store = create_test_store();
        let mut incomplete = new_user("Ana", "ana@example.com");
        incomplete.password = None;

        let err = store.create(&incomplete).unwrap_err();
        assert_eq!(err.to_string(), "Name, email and password are required");

        let err = store.create(&new_user("  ", "ana@example.com")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_create_rejects_malformed_email() {
        let store = create_test_store();
        let err = store.create(&new_user("Ana", "not-an-email")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_create_duplicate_email() {
        let store = create_test_store();
        store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let err = store.create(&new_user("Other", "ANA@example.com")).unwrap_err();
        assert_eq!(err.to_string(), "User with this email already exists");
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_create_custom_user_type() {
        let store = create_test_store();
        let mut new = new_user("Dee", "dee@example.com");
        new.user_type = Some("driver".to_string());
        new.phone = Some("555-0100".to_string());

        let user = store.create(&new).unwrap();
        assert_eq!(user.user_type, "driver");
        assert_eq!(user.phone.as_deref(), Some("555-0100"));
    }

    #[test]
    fn test_password_not_stored_in_clear() {
        let store = create_test_store();
        store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let stored: String = store
            .conn
            .query_row("SELECT password_hash FROM users", [], |row| row.get(0))
            .unwrap();
        assert_ne!(stored, "secret");
        assert_eq!(stored.len(), 64);
    }

    #[test]
    fn test_login_success() {
        let store = create_test_store();
        let created = store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let user = store.login(&credentials("ana@example.com", "secret")).unwrap();
        assert_eq!(user.id, created.id);
    }

    #[test]
    fn test_login_wrong_password_and_unknown_email() {
        let store = create_test_store();
        store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let err = store.login(&credentials("ana@example.com", "nope")).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));

        let err = store.login(&credentials("who@example.com", "secret")).unwrap_err();
        assert!(matches!(err, Error::InvalidCredentials));
    }

    #[test]
    fn test_login_missing_fields() {
        let store = create_test_store();
        let err = store.login(&Credentials::default()).unwrap_err();
        assert_eq!(err.to_string(), "Email and password are required");
    }

    #[test]
    fn test_login_deactivated() {
        let store = create_test_store();
        let user = store.create(&new_user("Ana", "ana@example.com")).unwrap();
        store.deactivate(&user.id).unwrap();

        let err = store.login(&credentials("ana@example.com", "secret")).unwrap_err();
        assert!(matches!(err, Error::AccountDeactivated));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = create_test_store();
        let err = store.get("missing").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "User not found");
    }

    #[test]
    fn test_update_keeps_absent_fields() {
        let store = create_test_store();
        let mut new = new_user("Ana", "ana@example.com");
        new.phone = Some("555-0100".to_string());
        let user = store.create(&new).unwrap();

        let changes = UserChanges {
            name: Some("Ana Maria".to_string()),
            phone: Some(String::new()),
            user_type: None,
        };
        let updated = store.update(&user.id, &changes).unwrap();

        assert_eq!(updated.name, "Ana Maria");
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));
        assert_eq!(updated.user_type, "rider");
    }

    #[test]
    fn test_update_nonexistent() {
        let store = create_test_store();
        let err = store.update("missing", &UserChanges::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_deactivate_is_soft() {
        let store = create_test_store();
        let user = store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let deactivated = store.deactivate(&user.id).unwrap();
        assert!(!deactivated.is_active);
        assert_eq!(store.count().unwrap(), 1);
        assert!(store.deactivate("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_list_newest_first_with_pagination() {
        let store = create_test_store();
        for i in 0..5 {
            store
                .create(&new_user(&format!("User {i}"), &format!("u{i}@example.com")))
                .unwrap();
        }

        let page = store
            .list(&ListQuery {
                page: 1,
                limit: 2,
                ..ListQuery::default()
            })
            .unwrap();

        let names: Vec<_> = page.users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["User 4", "User 3"]);
        assert_eq!(page.pagination.total_users, 5);
        assert_eq!(page.pagination.total_pages, 3);
        assert!(page.pagination.has_next);
        assert!(!page.pagination.has_prev);
    }

    #[test]
    fn test_list_search_and_type_filter() {
        let store = create_test_store();
        store.create(&new_user("Ana", "ana@example.com")).unwrap();
        store.create(&new_user("Bob", "bob@example.com")).unwrap();
        let mut driver = new_user("Anabel", "belle@example.com");
        driver.user_type = Some("driver".to_string());
        store.create(&driver).unwrap();

        let found = store
            .list(&ListQuery {
                search: Some("ANA".to_string()),
                ..ListQuery::default()
            })
            .unwrap();
        assert_eq!(found.pagination.total_users, 2);

        let drivers = store
            .list(&ListQuery {
                search: Some("ana".to_string()),
                user_type: Some("driver".to_string()),
                ..ListQuery::default()
            })
            .unwrap();
        assert_eq!(drivers.users.len(), 1);
        assert_eq!(drivers.users[0].name, "Anabel");
    }

    #[test]
    fn test_list_page_past_end() {
        let store = create_test_store();
        store.create(&new_user("Ana", "ana@example.com")).unwrap();

        let page = store
            .list(&ListQuery {
                page: 3,
                ..ListQuery::default()
            })
            .unwrap();
        assert!(page.users.is_empty());
        assert!(page.pagination.has_prev);
        assert!(!page.pagination.has_next);
    }

    #[test]
    fn test_open_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("users.db");

        let id = {
            let store = UserStore::open(&path).unwrap();
            store.create(&new_user("Ana", "ana@example.com")).unwrap().id
        };

        let reopened = UserStore::open(&path).unwrap();
        assert_eq!(reopened.path(), path);
        assert_eq!(reopened.get(&id).unwrap().name, "Ana");
    }

    #[test]
    fn test_generated_ids_unique() {
        let now = Utc::now();
        assert_ne!(generate_id("a@b.co", now), generate_id("a@b.co", now));
    }
}
