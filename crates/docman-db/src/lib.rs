//! Docman Database Layer
//!
//! This crate provides the persistence layer for Docman, storing users
//! and document metadata in SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;
pub mod utils;

pub use error::DbError;
pub use models::*;
pub use repository::{Database, DocumentSort, ListOptions, SortColumn, UserSort};
