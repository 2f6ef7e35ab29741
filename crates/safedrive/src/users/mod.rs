//! Rider and driver accounts.
//!
//! Accounts live in a `SQLite` database separate from the sensor documents.
//! [`UserStore`] owns the connection; [`UserOperation`] is the
//! action-dispatched request the HTTP layer forwards to it.

pub mod migrations;
mod model;
mod operation;
pub mod schema;
mod store;

pub use model::{
    Credentials, ListQuery, NewUser, Pagination, User, UserChanges, UserPage, DEFAULT_USER_TYPE,
};
pub use operation::{OperationReply, UserAction, UserOperation};
pub use store::UserStore;
