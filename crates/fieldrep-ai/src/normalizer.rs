//! Raw field message → [`StructuredReport`].
//!
//! Strategy chain, first success wins:
//!
//! 1. strict JSON parse of JSON-ish text
//! 2. heuristic repair, then the first balanced `{...}` block
//! 3. rule-based field extraction
//! 4. model-assisted extraction, only when the rules found no action or unit
//!
//! Schema defaulting and validation closes every path, so a caller always
//! gets a complete report unless the message carries nothing at all.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use fieldrep_core::{ParseError, RawMessage, StructuredReport, validate_candidate};
use tracing::{debug, info};

use crate::extract::RuleDraft;
use crate::model::{ExtractionService, ModelAssist, ModelConfig};
use crate::repair;

/// Stages 1 and 2: a validated report from text that already is, or nearly
/// is, a JSON object.
pub fn parse_structured(text: &str, now: DateTime<Utc>) -> Result<StructuredReport, ParseError> {
    repair::direct_parse(text)
        .and_then(|c| Ok(validate_candidate(&c, now)?))
        .or_else(|e| {
            debug!(error = %e, "direct parse failed, trying repair");
            repair::repaired_parse(text).and_then(|c| Ok(validate_candidate(&c, now)?))
        })
}

fn non_empty(text: &str) -> Result<&str, ParseError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(text)
}

/// Gate for the rule path: punctuation alone gives the extractors nothing.
/// Structured input such as `{}` never reaches it.
fn check_signal(text: &str) -> Result<(), ParseError> {
    if text.chars().any(char::is_alphanumeric) {
        Ok(())
    } else {
        Err(ParseError::NoSignal)
    }
}

/// Rules-only normalization. Never calls out; usable without a runtime.
pub fn normalize_rules(raw: &RawMessage) -> Result<StructuredReport, ParseError> {
    let text = non_empty(&raw.text)?;
    let now = Utc::now();
    parse_structured(text, now).or_else(|e| {
        debug!(error = %e, "no structured candidate, extracting by rules");
        check_signal(text)?;
        let draft = RuleDraft::extract(text);
        Ok(validate_candidate(&draft.to_candidate(), now)?)
    })
}

/// Normalizer with an optional extraction model behind the rules.
#[derive(Clone, Default)]
pub struct Normalizer {
    assist: Option<ModelAssist>,
}

impl Normalizer {
    /// Rules only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model(service: Arc<dyn ExtractionService>, config: &ModelConfig) -> Self {
        Self {
            assist: Some(ModelAssist::new(service, config)),
        }
    }

    pub fn has_model(&self) -> bool {
        self.assist.is_some()
    }

    pub async fn normalize(&self, raw: &RawMessage) -> Result<StructuredReport, ParseError> {
        let text = non_empty(&raw.text)?;
        let now = Utc::now();

        match parse_structured(text, now) {
            Ok(report) => return Ok(report),
            Err(e) => debug!(error = %e, "no structured candidate, extracting by rules"),
        }
        check_signal(text)?;

        let draft = RuleDraft::extract(text);
        let template = draft.to_candidate();
        let candidate = match &self.assist {
            Some(assist) if !draft.is_complete() => {
                info!(
                    found_action = draft.action.is_some(),
                    found_units = !draft.target_units.is_empty(),
                    "rule draft incomplete, asking model"
                );
                assist.refine(text, &template).await
            }
            _ => template.clone(),
        };

        validate_candidate(&candidate, now)
            .or_else(|e| {
                debug!(error = %e, "merged candidate invalid, using rule draft");
                validate_candidate(&template, now)
            })
            .map_err(ParseError::from)
    }
}
