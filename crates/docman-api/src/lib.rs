//! Docman REST API
//!
//! This crate provides the Axum-based HTTP API for Docman: login and
//! token refresh, user management and document storage.

pub mod bootstrap;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use bootstrap::{MasterAccount, ensure_master};
pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
