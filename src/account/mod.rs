//! Account lifecycle: registration, confirmation, reset, login, and token
//! renewal.
//!
//! [`service::AccountService`] orchestrates every operation; the submodules
//! hold the pieces it composes. All persistence goes through
//! [`store::AccountStore`].

pub mod code;
pub mod config;
pub mod error;
pub mod model;
pub mod password;
pub mod service;
pub mod store;
pub mod validate;

pub use config::AccountConfig;
pub use error::AccountError;
pub use model::{Account, ProfileChanges, ProfileView};
pub use service::{AccountService, CodeWindow};
pub use store::{AccountStore, PgAccountStore};
