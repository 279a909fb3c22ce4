//! # parley-core
//!
//! Foundation types for the Parley content engine.
//!
//! This crate provides the shared vocabulary the other Parley crates depend on:
//!
//! - **Documents**: [`Document`], [`DocumentType`], [`DocumentStats`] — the
//!   persisted unit mirroring a content file on disk
//! - **Moods**: [`Mood`] — the simpler, wholesale-replaced entity
//! - **Messages**: [`ChatMessage`] for conversation-driven template selection
//! - **Frontmatter**: `---`-delimited YAML-subset parsing shared by the sync
//!   parsers and the template loader
//! - **Logging**: `tracing` subscriber initialization for binaries

#![deny(unsafe_code)]

pub mod documents;
pub mod frontmatter;
pub mod logging;
pub mod messages;

pub use documents::{Document, DocumentStats, DocumentType, Mood};
pub use messages::ChatMessage;
