//! Optional model-assisted extraction.
//!
//! The normalizer only reaches for a model when the rules could not find an
//! action or a unit. The model gets the raw text plus the rule draft as a
//! template, and its answer is merged over the draft field by field. A model
//! failure never fails normalization.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fieldrep_core::{Priority, validate_candidate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::repair;

pub const DEFAULT_MODEL_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// System prompt sent alongside every extraction request.
pub const SYSTEM_PROMPT: &str = "\
You convert military field messages into JSON. Reply with one JSON object and nothing else.
Fields: action (lowercase verb), target_units (list of unit names), coordinates ({\"x\": number, \"y\": number}),
timeframe (string), priority (HIGH, MEDIUM or LOW), soldier_id (string), radio_call_sign (string or null),
extras (object). Keep template values that the message does not contradict. Do not invent units or coordinates.";

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("model call timed out after {0}s")]
    Timeout(u64),
    #[error("malformed model response: {0}")]
    Malformed(String),
}

/// A text-completion backend. Stateless from the caller's point of view.
#[async_trait]
pub trait ExtractionService: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ExtractionError>;
}

/// Where and how to reach the extraction model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    /// Extra attempts after the first failed call.
    pub retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_MODEL_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: 30,
            retries: 1,
        }
    }
}

/// Normalizer settings. No model section means rules only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub model: Option<ModelConfig>,
}

/// Build the extraction prompt: the raw message plus the rule draft to repair.
pub fn build_prompt(text: &str, template: &Map<String, Value>) -> String {
    let template = serde_json::to_string_pretty(template).unwrap_or_else(|_| "{}".into());
    format!(
        "Message:\n{text}\n\n\
         Draft extracted by rules (correct it, fill what is missing):\n{template}\n\n\
         Return the corrected JSON object only."
    )
}

/// A service plus the call budget it runs under.
#[derive(Clone)]
pub struct ModelAssist {
    service: Arc<dyn ExtractionService>,
    timeout: Duration,
    retries: u32,
}

impl ModelAssist {
    pub fn new(service: Arc<dyn ExtractionService>, config: &ModelConfig) -> Self {
        Self {
            service,
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            retries: config.retries,
        }
    }

    /// Ask the model to repair `template`. Any failure returns the template
    /// unchanged.
    pub async fn refine(&self, text: &str, template: &Map<String, Value>) -> Map<String, Value> {
        let prompt = build_prompt(text, template);
        match self.call(&prompt).await {
            Ok(answer) => {
                info!(fields = answer.len(), "model extraction merged");
                merge_over(template, &answer)
            }
            Err(e) => {
                warn!(error = %e, "model extraction failed, keeping rule draft");
                template.clone()
            }
        }
    }

    /// One call plus up to `retries` more, each under the timeout.
    async fn call(&self, prompt: &str) -> Result<Map<String, Value>, ExtractionError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(self.timeout, self.service.complete(prompt)).await
            {
                Ok(Ok(text)) => repair::extract_object(&text)
                    .map_err(|e| ExtractionError::Malformed(e.to_string())),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(ExtractionError::Timeout(self.timeout.as_secs())),
            };
            match result {
                Ok(answer) => return Ok(answer),
                Err(e) if attempt <= self.retries => {
                    warn!(attempt, error = %e, "model call failed, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Fields a model answer may set.
const MERGEABLE: &[&str] = &[
    "action",
    "target_units",
    "coordinates",
    "timeframe",
    "soldier_id",
    "radio_call_sign",
];

/// Overlay the model answer on the template. A field is taken only when it is
/// present, non-null and valid on its own. Priority can only go up. Extras
/// from the model fill keys the template lacks.
pub fn merge_over(template: &Map<String, Value>, answer: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = template.clone();
    let now = Utc::now();

    for &field in MERGEABLE {
        let Some(value) = answer.get(field).filter(|v| !v.is_null()) else {
            continue;
        };
        let mut single = Map::new();
        single.insert(field.to_string(), value.clone());
        match validate_candidate(&single, now) {
            Ok(_) => {
                merged.insert(field.to_string(), value.clone());
            }
            Err(e) => debug!(field, error = %e, "ignoring model field"),
        }
    }

    let rule_priority = template
        .get("priority")
        .and_then(Value::as_str)
        .and_then(Priority::coerce)
        .unwrap_or_default();
    let model_priority = answer
        .get("priority")
        .and_then(Value::as_str)
        .and_then(Priority::coerce);
    if let Some(p) = model_priority.filter(|p| *p > rule_priority) {
        merged.insert("priority".into(), Value::String(p.as_str().into()));
    }

    if let Some(Value::Object(model_extras)) = answer.get("extras") {
        let extras = merged
            .entry("extras")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(extras) = extras {
            for (k, v) in model_extras {
                extras.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }
    }
    merged
}
