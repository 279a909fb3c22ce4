//! Prompt template data model, mirroring the `.prompty` frontmatter shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A loaded `.prompty` template: frontmatter plus the raw body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PromptTemplate {
    /// Parsed frontmatter.
    pub metadata: TemplateMetadata,
    /// The unrendered body.
    pub content: String,
}

/// `.prompty` frontmatter fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateMetadata {
    /// Display name.
    pub name: String,
    /// One-line description.
    pub description: String,
    /// Author list.
    pub authors: Vec<String>,
    /// Model binding.
    pub model: ModelSpec,
    /// Declared template parameters (documentation only; rendering does
    /// not enforce them).
    pub parameters: Map<String, Value>,
    /// Any frontmatter fields beyond the known set.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The `model:` block of a template.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSpec {
    /// API flavor, e.g. `chat`.
    pub api: String,
    /// Provider endpoint and sampling configuration.
    pub configuration: ModelConfiguration,
}

/// Model configuration from a template's frontmatter.
///
/// String-typed fields may hold `${env:VAR}` references, resolved at render
/// time. Sampling fields pass through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfiguration {
    /// Provider kind, e.g. `azure_openai`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Endpoint URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_endpoint: Option<String>,
    /// Deployment name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub azure_deployment: Option<String>,
    /// API version string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Nucleus-sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Frequency penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    /// Presence penalty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    /// Provider-specific fields beyond the known set.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A rendered prompt, ready to hand to a chat backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenderedPrompt {
    /// Placeholder-free system message.
    pub system_message: String,
    /// Model configuration with `${env:VAR}` references resolved.
    pub configuration: ModelConfiguration,
}
