//! Action-dispatched account requests.
//!
//! Clients drive every account operation through a single endpoint, naming
//! the operation in `action` and carrying its arguments alongside.

use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

use super::model::{Credentials, ListQuery, NewUser, Pagination, User, UserChanges};
use super::store::UserStore;

const INVALID_ACTION: &str =
    "Invalid action. Use: 'getAll', 'create', 'login', 'getById', 'update', or 'delete'";

/// The account operations a client may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    /// List accounts.
    GetAll,
    /// Create an account.
    Create,
    /// Check credentials.
    Login,
    /// Fetch one account.
    GetById,
    /// Change an account.
    Update,
    /// Deactivate an account.
    Delete,
}

impl FromStr for UserAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "getAll" => Ok(Self::GetAll),
            "create" => Ok(Self::Create),
            "login" => Ok(Self::Login),
            "getById" => Ok(Self::GetById),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(Error::validation(INVALID_ACTION)),
        }
    }
}

/// Request body for the account operations endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// Operation name, e.g. `getAll`.
    #[serde(default)]
    pub action: Option<String>,
    /// Operation payload for `create`, `login` and `update`.
    #[serde(default)]
    pub data: Option<Value>,
    /// Target account for `getById`, `update` and `delete`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Page for `getAll`.
    #[serde(default)]
    pub page: Option<u32>,
    /// Page size for `getAll`.
    #[serde(default)]
    pub limit: Option<u32>,
    /// Name/email filter for `getAll`.
    #[serde(default)]
    pub search: Option<String>,
    /// User type filter for `getAll`.
    #[serde(default)]
    pub user_type: Option<String>,
}

/// Successful response to a [`UserOperation`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationReply {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// Account or account list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Listing position, for `getAll`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    /// Human-readable summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    /// Response kind, e.g. `users_list`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl OperationReply {
    fn new(kind: &'static str) -> Self {
        Self {
            success: true,
            data: None,
            pagination: None,
            message: None,
            kind,
        }
    }

    fn with_user(mut self, user: &User) -> Result<Self> {
        self.data = Some(serde_json::to_value(user)?);
        Ok(self)
    }

    fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }
}

impl UserOperation {
    /// The requested action.
    ///
    /// # Errors
    ///
    /// Returns a validation error for a missing or unknown action.
    pub fn action(&self) -> Result<UserAction> {
        self.action
            .as_deref()
            .ok_or_else(|| Error::validation(INVALID_ACTION))?
            .parse()
    }

    /// Run the operation against `store`.
    ///
    /// # Errors
    ///
    /// Returns the store's error for the failed operation, or a validation
    /// error when the action or payload is malformed.
    pub fn execute(self, store: &UserStore) -> Result<OperationReply> {
        match self.action()? {
            UserAction::GetAll => {
                let defaults = ListQuery::default();
                let page = store.list(&ListQuery {
                    page: self.page.unwrap_or(defaults.page),
                    limit: self.limit.unwrap_or(defaults.limit),
                    search: self.search,
                    user_type: self.user_type,
                })?;
                let mut reply = OperationReply::new("users_list");
                reply.data = Some(serde_json::to_value(&page.users)?);
                reply.pagination = Some(page.pagination);
                Ok(reply)
            }
            UserAction::Create => {
                let new: NewUser = payload(self.data)?;
                let user = store.create(&new)?;
                Ok(OperationReply::new("user_created")
                    .with_user(&user)?
                    .with_message("User created successfully"))
            }
            UserAction::Login => {
                let credentials: Credentials = payload(self.data)?;
                let user = store.login(&credentials)?;
                Ok(OperationReply::new("login_success")
                    .with_user(&user)?
                    .with_message("Login successful"))
            }
            UserAction::GetById => {
                let user = store.get(&target(self.user_id)?)?;
                OperationReply::new("user_details").with_user(&user)
            }
            UserAction::Update => {
                let id = target(self.user_id)?;
                let changes: UserChanges = payload(self.data)?;
                let user = store.update(&id, &changes)?;
                Ok(OperationReply::new("user_updated")
                    .with_user(&user)?
                    .with_message("User updated successfully"))
            }
            UserAction::Delete => {
                store.deactivate(&target(self.user_id)?)?;
                Ok(OperationReply::new("user_deleted").with_message("User deactivated successfully"))
            }
        }
    }
}

fn payload<T: DeserializeOwned + Default>(data: Option<Value>) -> Result<T> {
    match data {
        None | Some(Value::Null) => Ok(T::default()),
        Some(value) => serde_json::from_value(value)
            .map_err(|e| Error::validation(format!("Invalid data: {e}"))),
    }
}

/// A missing id can never match an account.
fn target(user_id: Option<String>) -> Result<String> {
    user_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::not_found("User not found"))
}
