//! Contextual prompt selection and enrichment.
//!
//! Picks a template from conversation context, extracts render parameters,
//! enriches them from stored personas and scenarios, and renders. Store
//! misses never fail a render; only a second template failure propagates.

use std::sync::LazyLock;

use parley_core::{ChatMessage, DocumentType};
use parley_settings::PromptSettings;
use parley_store::StoreHandle;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::constants::{
    self, DEFAULT_LEARNING_LEVEL, DEFAULT_LEARNING_STYLE, DEFAULT_SUBJECT,
    EXIT_CRITERIA_FALLBACK, HISTORY_PHRASES, LEARNING_TUTOR_TEMPLATE,
    SCENARIO_DETAILS_FALLBACK, TRIGGER_PHRASES,
};
use crate::errors::Result;
use crate::loader::TemplateLoader;
use crate::renderer::{render_content, resolve_env, value_text};
use crate::types::RenderedPrompt;

static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:learn about|teach me|explain) (.+?)(?:\?|$|\.)").unwrap()
});

/// Selects, enriches, and renders prompts for a conversation.
pub struct PromptSelector {
    handle: StoreHandle,
    loader: TemplateLoader,
    settings: PromptSettings,
}

impl PromptSelector {
    /// Selector over a store handle, with directories from settings.
    pub fn new(handle: StoreHandle, settings: PromptSettings) -> Self {
        let loader = TemplateLoader::from_settings(&settings);
        Self {
            handle,
            loader,
            settings,
        }
    }

    /// Selector with an explicit loader (tests point it at temp dirs).
    pub fn with_loader(handle: StoreHandle, loader: TemplateLoader, settings: PromptSettings) -> Self {
        Self {
            handle,
            loader,
            settings,
        }
    }

    /// Pick a template id from conversation context.
    ///
    /// Tutoring trigger phrases in the latest message, or lesson/study talk
    /// anywhere in the transcript, select the tutor template; everything
    /// else gets the configured default.
    pub fn select_template(&self, messages: &[ChatMessage]) -> String {
        let last = messages
            .last()
            .map(|m| m.content.to_lowercase())
            .unwrap_or_default();
        let transcript = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");

        let tutoring = TRIGGER_PHRASES.iter().any(|phrase| last.contains(phrase))
            || HISTORY_PHRASES
                .iter()
                .any(|phrase| transcript.contains(phrase));
        if tutoring {
            LEARNING_TUTOR_TEMPLATE.to_string()
        } else {
            self.settings.default_template.clone()
        }
    }

    /// Build render parameters from the conversation.
    ///
    /// Always includes a windowed `role: content` transcript and the
    /// latest input; the tutor template additionally gets a subject and
    /// learning defaults.
    pub fn extract_parameters(
        &self,
        messages: &[ChatMessage],
        template_name: &str,
    ) -> Map<String, Value> {
        let window = self.settings.effective_message_window();
        let start = messages.len().saturating_sub(window);
        let context = messages[start..]
            .iter()
            .map(ChatMessage::transcript_line)
            .collect::<Vec<_>>()
            .join("\n");
        let last = messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();

        let mut params = Map::new();
        let _ = params.insert("conversation_context".to_string(), Value::String(context));
        let _ = params.insert("user_input".to_string(), Value::String(last.clone()));

        if template_name == LEARNING_TUTOR_TEMPLATE {
            let subject = SUBJECT_RE
                .captures(&last)
                .and_then(|c| c.get(1))
                .map_or(DEFAULT_SUBJECT, |m| m.as_str())
                .to_string();
            let _ = params.insert("subject".to_string(), Value::String(subject));
            let _ = params.insert(
                "learning_level".to_string(),
                Value::String(DEFAULT_LEARNING_LEVEL.to_string()),
            );
            let _ = params.insert(
                "learning_style".to_string(),
                Value::String(DEFAULT_LEARNING_STYLE.to_string()),
            );
        }
        params
    }

    /// The full pipeline: resolve a template, enrich parameters, render.
    ///
    /// A render failure falls back to the default template once; a second
    /// failure propagates.
    pub fn contextual_prompt(
        &self,
        messages: &[ChatMessage],
        explicit_params: Option<Map<String, Value>>,
        template_label: Option<&str>,
    ) -> Result<RenderedPrompt> {
        let default_id = self.settings.default_template.clone();
        let name = match template_label {
            Some(label) => constants::resolve_alias(label, &default_id),
            None => self.select_template(messages),
        };
        let mut params =
            explicit_params.unwrap_or_else(|| self.extract_parameters(messages, &name));

        self.enrich_persona(&mut params);
        self.enrich_scenario(&mut params);
        let _ = params.remove("templateName");
        let _ = params.remove("scenarioId");

        match self.render_named(&name, &params) {
            Ok(prompt) => Ok(prompt),
            Err(e) if name != default_id => {
                warn!(template = %name, error = %e, "render failed, retrying with default template");
                self.render_named(&default_id, &params)
            }
            Err(e) => Err(e),
        }
    }

    fn render_named(&self, name: &str, params: &Map<String, Value>) -> Result<RenderedPrompt> {
        let template = self.loader.load(name)?;
        Ok(RenderedPrompt {
            system_message: render_content(&template.content, params),
            configuration: resolve_env(&template.metadata.model.configuration),
        })
    }

    /// Replace a `persona` id parameter with the stored persona's combined
    /// description and flattened `persona_*` fields. A miss leaves the
    /// parameter untouched.
    fn enrich_persona(&self, params: &mut Map<String, Value>) {
        let Some(persona_id) = params.get("persona").and_then(Value::as_str) else {
            return;
        };
        if persona_id.is_empty() {
            return;
        }
        let Ok(store) = self.handle.get() else {
            debug!("store not ready, skipping persona enrichment");
            return;
        };
        let doc = match store.get_by_id(persona_id, DocumentType::Persona) {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                debug!(persona = persona_id, "persona not found, leaving parameter as-is");
                return;
            }
            Err(e) => {
                warn!(persona = persona_id, error = %e, "persona lookup failed");
                return;
            }
        };
        let profile = PersonaProfile::from_payload(&doc.payload);
        profile.flatten_into(params);
        let _ = params.insert("persona".to_string(), Value::String(profile.description()));
    }

    /// Supply `scenario_details` and `exit_criteria` from the stored
    /// scenario named by `scenarioId`, or generic fallbacks on a miss.
    fn enrich_scenario(&self, params: &mut Map<String, Value>) {
        let Some(scenario_id) = params.get("scenarioId").and_then(Value::as_str) else {
            return;
        };
        let scenario_id = scenario_id.to_string();

        let looked_up = self.handle.get().ok().and_then(|store| {
            match store.get_by_id(&scenario_id, DocumentType::Scenario) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!(scenario = %scenario_id, error = %e, "scenario lookup failed");
                    None
                }
            }
        });

        let (details, exit_criteria) = match looked_up {
            Some(doc) => {
                let brief = ScenarioBrief::from_payload(&doc.payload);
                (brief.details(), brief.exit_criteria())
            }
            None => {
                debug!(scenario = %scenario_id, "scenario not found, using fallback text");
                (
                    SCENARIO_DETAILS_FALLBACK.to_string(),
                    EXIT_CRITERIA_FALLBACK.to_string(),
                )
            }
        };
        let _ = params.insert("scenario_details".to_string(), Value::String(details));
        let _ = params.insert("exit_criteria".to_string(), Value::String(exit_criteria));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Enrichment builders
// ─────────────────────────────────────────────────────────────────────────────

/// Persona fields lifted out of an opaque payload. Demographics come as a
/// nested map of arbitrary entries; the remaining fields are flat.
#[derive(Debug, Default)]
struct PersonaProfile {
    name: Option<String>,
    demographics: Vec<(String, String)>,
    behavior: Option<String>,
    needs: Option<String>,
    pain_points: Option<String>,
}

impl PersonaProfile {
    fn from_payload(payload: &Value) -> Self {
        let demographics = payload
            .get("demographics")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(key, value)| match value {
                        Value::Null => None,
                        Value::String(s) if s.is_empty() => None,
                        other => Some((key.clone(), value_text(other))),
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: field_text(payload, "name"),
            demographics,
            behavior: field_text(payload, "behavior"),
            needs: field_text(payload, "needs"),
            pain_points: field_text(payload, "painpoints"),
        }
    }

    /// One `persona_*` parameter per present field, demographics entries
    /// under their own key.
    fn flatten_into(&self, params: &mut Map<String, Value>) {
        if let Some(name) = &self.name {
            let _ = params.insert("persona_name".to_string(), Value::String(name.clone()));
        }
        for (key, value) in &self.demographics {
            let _ = params.insert(format!("persona_{key}"), Value::String(value.clone()));
        }
        let fields = [
            ("persona_behavior", &self.behavior),
            ("persona_needs", &self.needs),
            ("persona_pain_points", &self.pain_points),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                let _ = params.insert(key.to_string(), Value::String(value.clone()));
            }
        }
    }

    /// Combined multi-line description, absent fields omitted.
    fn description(&self) -> String {
        let mut lines = Vec::new();
        if let Some(name) = &self.name {
            lines.push(format!("Name: {name}"));
        }
        for (key, value) in &self.demographics {
            lines.push(format!("{}: {value}", title_label(key)));
        }
        let tail = [
            ("Behavior", &self.behavior),
            ("Needs", &self.needs),
            ("Pain points", &self.pain_points),
        ];
        for (label, value) in tail {
            if let Some(value) = value {
                lines.push(format!("{label}: {value}"));
            }
        }
        lines.join("\n")
    }
}

/// Scenario fields lifted out of an opaque payload.
#[derive(Debug, Default)]
struct ScenarioBrief {
    title: Option<String>,
    description: Option<String>,
    difficulty: Option<String>,
    objective: Option<String>,
    exit_criteria: Option<String>,
}

impl ScenarioBrief {
    fn from_payload(payload: &Value) -> Self {
        Self {
            title: field_text(payload, "title"),
            description: field_text(payload, "description"),
            difficulty: field_text(payload, "difficulty"),
            objective: field_text(payload, "objective"),
            exit_criteria: field_text(payload, "exitCriteria"),
        }
    }

    fn details(&self) -> String {
        let lines = [
            ("Title", &self.title),
            ("Description", &self.description),
            ("Difficulty", &self.difficulty),
            ("Objective", &self.objective),
        ];
        let text = lines
            .iter()
            .filter_map(|(label, value)| {
                value.as_ref().map(|v| format!("{label}: {v}"))
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            SCENARIO_DETAILS_FALLBACK.to_string()
        } else {
            text
        }
    }

    fn exit_criteria(&self) -> String {
        self.exit_criteria
            .clone()
            .unwrap_or_else(|| EXIT_CRITERIA_FALLBACK.to_string())
    }
}

/// Uppercase the first letter of a demographics key for its display line.
fn title_label(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// A payload field as display text: strings pass through, arrays join on
/// `"; "`, other scalars use their JSON form. Absent/null yields `None`.
fn field_text(payload: &Value, key: &str) -> Option<String> {
    match payload.get(key)? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let joined = items
                .iter()
                .map(value_text)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join("; ");
            (!joined.is_empty()).then_some(joined)
        }
        other => Some(value_text(other)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Arc;

    use parley_store::DocumentStore;

    const TRAINING: &str = "---\nname: Training Agent\nmodel:\n  api: chat\n  configuration:\n    max_tokens: 800\n---\nYou are {{persona}}.{% if scenario_details %}\nScenario: {{scenario_details}}\nExit when: {{exit_criteria}}{% endif %}\nRecent conversation:\n{{conversation_context}}";

    const TUTOR: &str = "---\nname: Learning Tutor\nmodel:\n  api: chat\n---\nTeach {{subject}} at a {{learning_level}} level, {{learning_style}} style.\nUser said: {{user_input}}";

    struct Fixture {
        _dir: tempfile::TempDir,
        handle: StoreHandle,
        selector: PromptSelector,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        write_template(dir.path(), "training-agent", TRAINING);
        write_template(dir.path(), "learning-tutor", TUTOR);

        let handle = StoreHandle::new();
        let loader = TemplateLoader::new(dir.path(), dir.path().join("absent"));
        let selector =
            PromptSelector::with_loader(handle.clone(), loader, PromptSettings::default());
        Fixture {
            _dir: dir,
            handle,
            selector,
        }
    }

    fn write_template(dir: &Path, name: &str, content: &str) {
        std::fs::write(dir.join(format!("{name}.prompty")), content).unwrap();
    }

    fn install_store(fx: &Fixture) -> Arc<DocumentStore> {
        let store = Arc::new(
            DocumentStore::open(fx._dir.path().join("docs.db")).unwrap(),
        );
        fx.handle.install(Arc::clone(&store));
        store
    }

    fn user(content: &str) -> ChatMessage {
        ChatMessage::user(content)
    }

    // ── select_template ─────────────────────────────────────────────

    #[test]
    fn trigger_phrase_selects_tutor() {
        let fx = fixture();
        let picked = fx
            .selector
            .select_template(&[user("Can you teach me fractions?")]);
        assert_eq!(picked, "learning-tutor");
    }

    #[test]
    fn history_phrase_selects_tutor() {
        let fx = fixture();
        let picked = fx.selector.select_template(&[
            user("Our study session went well"),
            ChatMessage::assistant("Glad to hear it"),
            user("Back to work"),
        ]);
        assert_eq!(picked, "learning-tutor");
    }

    #[test]
    fn plain_conversation_selects_default() {
        let fx = fixture();
        let picked = fx.selector.select_template(&[user("Hi, I need a refund")]);
        assert_eq!(picked, "training-agent");
    }

    // ── extract_parameters ──────────────────────────────────────────

    #[test]
    fn parameters_include_windowed_transcript() {
        let fx = fixture();
        let messages: Vec<ChatMessage> = (0..30).map(|i| user(&format!("msg {i}"))).collect();
        let params = fx.selector.extract_parameters(&messages, "training-agent");
        let context = params["conversation_context"].as_str().unwrap();
        // Floor of 20 messages: msg 10 through msg 29.
        assert!(context.contains("user: msg 10"));
        assert!(!context.contains("user: msg 9\n"));
        assert_eq!(params["user_input"], "msg 29");
    }

    #[test]
    fn tutor_parameters_extract_subject() {
        let fx = fixture();
        let params = fx
            .selector
            .extract_parameters(&[user("teach me linear algebra?")], "learning-tutor");
        assert_eq!(params["subject"], "linear algebra");
        assert_eq!(params["learning_level"], DEFAULT_LEARNING_LEVEL);
    }

    #[test]
    fn tutor_subject_defaults_when_no_match() {
        let fx = fixture();
        let params = fx
            .selector
            .extract_parameters(&[user("study time")], "learning-tutor");
        assert_eq!(params["subject"], DEFAULT_SUBJECT);
    }

    // ── contextual_prompt ───────────────────────────────────────────

    #[test]
    fn renders_selected_template_end_to_end() {
        let fx = fixture();
        let _ = install_store(&fx);
        let prompt = fx
            .selector
            .contextual_prompt(&[user("what is recursion?")], None, None)
            .unwrap();
        assert!(prompt.system_message.contains("recursion"));
        assert!(!prompt.system_message.contains("{{"));
    }

    #[test]
    fn alias_label_maps_to_template_id() {
        let fx = fixture();
        let _ = install_store(&fx);
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hello")], None, Some("Learning Tutor"))
            .unwrap();
        assert!(prompt.system_message.starts_with("Teach"));
    }

    #[test]
    fn unknown_label_falls_back_to_default_template() {
        let fx = fixture();
        let _ = install_store(&fx);
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hello")], None, Some("No Such Thing"))
            .unwrap();
        assert!(prompt.system_message.starts_with("You are"));
    }

    #[test]
    fn persona_enrichment_flattens_fields() {
        let fx = fixture();
        let store = install_store(&fx);
        store
            .upsert_document(
                "morgan",
                DocumentType::Persona,
                "Morgan",
                &serde_json::json!({
                    "name": "Morgan",
                    "demographics": { "age": 34, "gender": "female" },
                    "behavior": "impatient",
                    "needs": "fast answers",
                    "painpoints": "long waits and jargon"
                }),
                "/p/morgan.json",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();

        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("morgan".to_string()));
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hi")], Some(params), Some("Training Agent"))
            .unwrap();

        assert!(prompt.system_message.contains("Name: Morgan"));
        assert!(prompt.system_message.contains("Age: 34"));
        assert!(prompt.system_message.contains("Gender: female"));
        assert!(prompt.system_message.contains("Pain points: long waits and jargon"));
    }

    #[test]
    fn persona_demographics_become_parameters() {
        let fx = fixture();
        let store = install_store(&fx);
        store
            .upsert_document(
                "sam",
                DocumentType::Persona,
                "Sam",
                &serde_json::json!({
                    "name": "Sam",
                    "demographics": { "age": 61, "occupation": "retired teacher" },
                    "painpoints": "small print"
                }),
                "/p/sam.json",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();

        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("sam".to_string()));
        fx.selector.enrich_persona(&mut params);

        assert_eq!(params["persona_name"], "Sam");
        assert_eq!(params["persona_age"], "61");
        assert_eq!(params["persona_occupation"], "retired teacher");
        assert_eq!(params["persona_pain_points"], "small print");
        let combined = params["persona"].as_str().unwrap();
        assert!(combined.contains("Occupation: retired teacher"));
    }

    #[test]
    fn persona_miss_leaves_parameter_untouched() {
        let fx = fixture();
        let _ = install_store(&fx);
        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("ghost".to_string()));
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hi")], Some(params), Some("Training Agent"))
            .unwrap();
        assert!(prompt.system_message.contains("You are ghost."));
    }

    #[test]
    fn scenario_enrichment_and_key_stripping() {
        let fx = fixture();
        let store = install_store(&fx);
        store
            .upsert_document(
                "checkout",
                DocumentType::Scenario,
                "Checkout",
                &serde_json::json!({
                    "title": "Checkout",
                    "difficulty": "hard",
                    "exitCriteria": "Customer completes the purchase"
                }),
                "/s/checkout.json",
                "2026-01-01T00:00:00Z",
            )
            .unwrap();

        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("anyone".to_string()));
        let _ = params.insert(
            "scenarioId".to_string(),
            Value::String("checkout".to_string()),
        );
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hi")], Some(params), Some("Training Agent"))
            .unwrap();

        assert!(prompt.system_message.contains("Title: Checkout"));
        assert!(prompt.system_message.contains("Customer completes the purchase"));
        assert!(!prompt.system_message.contains("scenarioId"));
    }

    #[test]
    fn scenario_miss_gets_fallback_text() {
        let fx = fixture();
        let _ = install_store(&fx);
        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("x".to_string()));
        let _ = params.insert("scenarioId".to_string(), Value::String("ghost".to_string()));
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hi")], Some(params), Some("Training Agent"))
            .unwrap();
        assert!(prompt.system_message.contains(SCENARIO_DETAILS_FALLBACK));
        assert!(prompt.system_message.contains(EXIT_CRITERIA_FALLBACK));
    }

    #[test]
    fn missing_template_falls_back_to_default_once() {
        let fx = fixture();
        let _ = install_store(&fx);
        // Tutor template removed: tutoring intent must still render.
        std::fs::remove_file(fx._dir.path().join("learning-tutor.prompty")).unwrap();
        let prompt = fx
            .selector
            .contextual_prompt(&[user("teach me chess")], None, None)
            .unwrap();
        assert!(prompt.system_message.starts_with("You are"));
    }

    #[test]
    fn enrichment_skips_when_store_not_ready() {
        let fx = fixture();
        // No store installed.
        let mut params = Map::new();
        let _ = params.insert("persona".to_string(), Value::String("morgan".to_string()));
        let prompt = fx
            .selector
            .contextual_prompt(&[user("hi")], Some(params), Some("Training Agent"))
            .unwrap();
        assert!(prompt.system_message.contains("You are morgan."));
    }
}
