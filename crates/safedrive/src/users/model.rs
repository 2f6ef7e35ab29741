//! User account types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User type assigned when none is given.
pub const DEFAULT_USER_TYPE: &str = "rider";

/// A user account as returned to clients. Never carries the password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque identifier.
    #[serde(rename = "_id")]
    pub id: String,
    /// Display name.
    pub name: String,
    /// Login email, unique across accounts.
    pub email: String,
    /// Contact phone number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Account role, e.g. `rider`.
    pub user_type: String,
    /// Whether the user finished profile setup.
    pub profile_completed: bool,
    /// `false` once the account has been deleted.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

/// Fields accepted when creating an account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    /// Display name (required).
    pub name: Option<String>,
    /// Login email (required).
    pub email: Option<String>,
    /// Contact phone number.
    pub phone: Option<String>,
    /// Account role; defaults to [`DEFAULT_USER_TYPE`].
    pub user_type: Option<String>,
    /// Password (required).
    pub password: Option<String>,
}

/// Login credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Login email.
    pub email: Option<String>,
    /// Password.
    pub password: Option<String>,
}

/// Fields that may be changed on an existing account.
///
/// Absent or empty fields leave the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    /// New display name.
    pub name: Option<String>,
    /// New phone number.
    pub phone: Option<String>,
    /// New account role.
    pub user_type: Option<String>,
}

/// Filter and page selection for listing accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Substring matched against name or email.
    pub search: Option<String>,
    /// Exact user type to match.
    pub user_type: Option<String>,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 10,
            search: None,
            user_type: None,
        }
    }
}

/// Page position summary for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    /// Page returned.
    pub current: u32,
    /// Number of pages at the requested size.
    pub total_pages: u64,
    /// Number of matching accounts.
    pub total_users: u64,
    /// Whether a later page exists.
    pub has_next: bool,
    /// Whether an earlier page exists.
    pub has_prev: bool,
}

impl Pagination {
    /// Compute the summary for `page` of `limit` over `total` matches.
    #[must_use]
    pub fn new(page: u32, limit: u32, total: u64) -> Self {
        let total_pages = total.div_ceil(u64::from(limit.max(1)));
        Self {
            current: page,
            total_pages,
            total_users: total,
            has_next: u64::from(page) < total_pages,
            has_prev: page > 1,
        }
    }
}

/// One page of accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserPage {
    /// Accounts on this page, newest first.
    pub users: Vec<User>,
    /// Where this page sits in the full listing.
    pub pagination: Pagination,
}

/// Treat `None`, empty and whitespace-only strings alike.
pub(crate) fn provided(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
