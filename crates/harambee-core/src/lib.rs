//! Core library for harambee, a terminal client for a savings-group
//! contribution tracker.
//!
//! Persistence, authentication, and authorization are owned by a hosted
//! backend; this crate covers everything the client itself is responsible
//! for:
//!
//! - `models`: members, transactions, and the denormalized merge rows
//! - `aggregate`: the pure members ⋈ transactions merge with summary stats
//! - `api`: REST client for the backend's auth and table endpoints
//! - `auth`: session persistence and keychain credential storage
//! - `cache`: data snapshots for offline viewing and the asset cache
//! - `store`: string-keyed state persisted between runs
//! - `config`: backend coordinates and local paths

pub mod aggregate;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod store;
