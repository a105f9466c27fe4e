//! Docman Storage Layer
//!
//! This crate provides the file storage abstraction for Docman
//! documents, with a local disk backend.

pub mod backend;
pub mod error;
pub mod local;

pub use backend::{ByteStream, StorageBackend, StoredObject};
pub use error::StorageError;
pub use local::LocalStorage;
