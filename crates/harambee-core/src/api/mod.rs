//! REST API client module for the hosted backend.
//!
//! The backend exposes two endpoint families: `/auth/v1` for accounts and
//! sessions, and `/rest/v1` for direct table access to `members` and
//! `transactions`. Requests authenticate with the project's anon key plus
//! the signed-in user's bearer token.

pub mod client;
pub mod error;

pub use client::{ApiClient, UserProfile};
pub use error::ApiError;
