//! Prompt template engine: `.prompty` loading, parameterized rendering,
//! and contextual template selection with persona/scenario enrichment.

#![deny(unsafe_code)]

pub mod constants;
pub mod errors;
pub mod loader;
pub mod renderer;
pub mod selector;
pub mod types;

pub use errors::{Result, TemplateError};
pub use loader::TemplateLoader;
pub use selector::PromptSelector;
pub use types::{ModelConfiguration, ModelSpec, PromptTemplate, RenderedPrompt, TemplateMetadata};
