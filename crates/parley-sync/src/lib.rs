//! File sync engine: keeps the document store aligned with the content
//! directories (personas, templates, scenarios, moods) through an initial
//! reconciliation pass and debounced filesystem watchers.

#![deny(unsafe_code)]

pub mod debounce;
pub mod engine;
pub mod errors;
pub mod events;
pub mod parsers;
pub mod service;

pub use engine::{FileSyncEngine, SyncPaths};
pub use errors::{Result, SyncError};
pub use events::{SyncEvent, SyncEventKind, SyncSource};
pub use service::ContentService;
