//! Embedded, file-backed document store.
//!
//! An in-memory `SQLite` database persisted by exporting to a single backing
//! file on every mutation, plus a readiness-gated handle for async startup
//! and a CRUD facade for API-created documents.

#![deny(unsafe_code)]

pub mod errors;
pub mod handle;
pub mod service;
pub mod store;

pub use errors::{Result, StoreError};
pub use handle::StoreHandle;
pub use service::DocumentService;
pub use store::DocumentStore;
