// SPDX-License-Identifier: MIT

//! AI-backed tracker config generation.
//!
//! The model's output is never trusted as-is: the response body is parsed
//! strictly into [`GeneratedTrackerConfig`] and gated on the full
//! required-field check before anything downstream sees it.

use crate::config::Config;
use crate::error::AppError;
use crate::models::GeneratedTrackerConfig;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Outcome of a generation attempt. `NeedsDescription` is a distinct branch,
/// not a failure: the name didn't match any known concept and the user must
/// describe what they want to track.
#[derive(Debug)]
pub enum GenerationOutcome {
    Config(GeneratedTrackerConfig),
    NeedsDescription,
}

#[async_trait]
pub trait ConfigGenerator: Send + Sync {
    async fn generate(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<GenerationOutcome, AppError>;
}

/// Health concepts we can generate for without a user description.
/// Lowercased substring match against the tracker name.
const KNOWN_CONCEPTS: &[&str] = &[
    "pain",
    "headache",
    "migraine",
    "mood",
    "anxiety",
    "stress",
    "sleep",
    "insomnia",
    "fatigue",
    "energy",
    "nausea",
    "allergy",
    "asthma",
    "exercise",
    "workout",
    "medication",
    "symptom",
    "flare",
    "cramp",
    "dizziness",
    "appetite",
    "hydration",
    "blood pressure",
    "blood sugar",
];

/// Whether a tracker name maps to a concept the model can be prompted about
/// without further context.
pub fn lookup_concept(name: &str) -> Option<&'static str> {
    let lowered = name.to_lowercase();
    KNOWN_CONCEPTS
        .iter()
        .find(|concept| lowered.contains(*concept))
        .copied()
}

/// Chat-completions client for config generation.
pub struct GenerationClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: String,
}

impl GenerationClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.generation_base_url.clone(),
            api_key: config.generation_api_key.clone(),
            model: config.generation_model.clone(),
        }
    }

    fn build_prompt(name: &str, description: Option<&str>) -> String {
        let context = match description {
            Some(desc) => format!("The user describes it as: \"{}\".", desc),
            None => String::new(),
        };
        format!(
            "Design a logging form for a personal health tracker named \"{name}\". {context}\n\
             Respond with ONLY a JSON object, no prose, with these string fields: \
             title, intensity_label, intensity_min_label, intensity_max_label, \
             location_label, location_placeholder, triggers_label, notes_label, \
             notes_placeholder, log_button_text, form_title, empty_state_text, \
             delete_confirm_message; an intensity_scale field that is one of \
             \"high_bad\", \"low_bad\", \"neutral\" (high_bad when higher values are \
             worse, low_bad when lower values are worse); a location_options array \
             of {{\"value\", \"label\"}} objects; a trigger_options array of strings; \
             and a suggested_hashtags array of strings."
        )
    }

    async fn request_completion(&self, prompt: &str) -> Result<String, AppError> {
        let body = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You design structured health-tracking forms. Output strict JSON only."
                },
                { "role": "user", "content": prompt }
            ],
            "temperature": 0.4,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Generation request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Generation provider returned {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Malformed generation response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| AppError::Generation("Generation response had no choices".to_string()))
    }
}

/// Strip a Markdown code fence if the model wrapped its JSON in one.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop an optional language tag on the fence line.
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.trim_start_matches('\n')
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

/// Parse model output into a config, enforcing the required-field gate.
fn parse_generated(raw: &str) -> Result<GeneratedTrackerConfig, AppError> {
    let config: GeneratedTrackerConfig = serde_json::from_str(strip_code_fence(raw))
        .map_err(|e| AppError::Generation(format!("Generated config did not parse: {}", e)))?;

    if !config.is_complete() {
        return Err(AppError::Generation(
            "Generated config is missing required fields".to_string(),
        ));
    }
    Ok(config)
}

#[async_trait]
impl ConfigGenerator for GenerationClient {
    async fn generate(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<GenerationOutcome, AppError> {
        if description.is_none() && lookup_concept(name).is_none() {
            tracing::info!(name, "Tracker name not recognized, asking for a description");
            return Ok(GenerationOutcome::NeedsDescription);
        }

        let prompt = Self::build_prompt(name, description);
        let content = self.request_completion(&prompt).await?;
        let config = parse_generated(&content)?;

        tracing::info!(name, title = %config.title, "Generated tracker config");
        Ok(GenerationOutcome::Config(config))
    }
}

/// In-memory generator for tests: returns a canned config, a canned failure,
/// or the needs-description branch.
pub struct MockGenerator {
    response: std::sync::Mutex<MockGeneration>,
}

pub enum MockGeneration {
    Config(GeneratedTrackerConfig),
    NeedsDescription,
    Fail(String),
}

impl MockGenerator {
    pub fn new(response: MockGeneration) -> Self {
        Self {
            response: std::sync::Mutex::new(response),
        }
    }

    pub fn set(&self, response: MockGeneration) {
        *self.response.lock().unwrap() = response;
    }
}

#[async_trait]
impl ConfigGenerator for MockGenerator {
    async fn generate(
        &self,
        _name: &str,
        _description: Option<&str>,
    ) -> Result<GenerationOutcome, AppError> {
        match &*self.response.lock().unwrap() {
            MockGeneration::Config(config) => Ok(GenerationOutcome::Config(config.clone())),
            MockGeneration::NeedsDescription => Ok(GenerationOutcome::NeedsDescription),
            MockGeneration::Fail(msg) => Err(AppError::Generation(msg.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concept_lookup() {
        assert_eq!(lookup_concept("Migraine Log"), Some("migraine"));
        assert_eq!(lookup_concept("My Sleep"), Some("sleep"));
        assert_eq!(lookup_concept("Knitting Progress"), None);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_parse_rejects_incomplete_config() {
        // Parses as JSON but title is empty, so the completeness gate trips.
        let raw = r#"{
            "title": "",
            "intensity_label": "Severity",
            "intensity_min_label": "Mild",
            "intensity_max_label": "Severe",
            "location_label": "Where",
            "location_placeholder": "Select",
            "triggers_label": "Triggers",
            "notes_label": "Notes",
            "notes_placeholder": "Notes...",
            "log_button_text": "Log",
            "form_title": "Log it",
            "empty_state_text": "Nothing yet",
            "delete_confirm_message": "Delete?",
            "intensity_scale": "high_bad",
            "location_options": [],
            "trigger_options": []
        }"#;
        assert!(parse_generated(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_prose() {
        assert!(parse_generated("Sure! Here is your config: ...").is_err());
    }

    #[tokio::test]
    async fn test_unrecognized_name_without_description() {
        let client = MockGenerator::new(MockGeneration::NeedsDescription);
        match client.generate("Knitting Progress", None).await.unwrap() {
            GenerationOutcome::NeedsDescription => {}
            other => panic!("expected NeedsDescription, got {:?}", other),
        }
    }
}
