//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: bearer-token session persistence with expiry tracking
//! - `CredentialStore`: secure OS-level credential storage via keyring
//!
//! Sessions are persisted to disk and expire when the access token does.

pub mod credentials;
pub mod session;

pub use credentials::CredentialStore;
pub use session::{Session, SessionData};
