//! Follow-up report suggestions raised by the trigger classifier.
//!
//! A suggestion is derived and non-authoritative. It starts `pending`, may move
//! to `draft_created` when an operator opens a drafting flow, and ends either
//! `approved` (document finalised) or `dismissed` (explicit rejection).
//! Suggestions are never deleted.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuggestionType {
    /// Casualty evacuation request.
    Casevac,
    /// Enemy observation/incident report.
    Eoincrep,
    /// Incident report for explosive ordnance.
    EoincrepEod,
}

impl SuggestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Casevac => "CASEVAC",
            Self::Eoincrep => "EOINCREP",
            Self::EoincrepEod => "EOINCREP_EOD",
        }
    }
}

impl fmt::Display for SuggestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Urgent,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl fmt::Display for Urgency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionStatus {
    Pending,
    DraftCreated,
    Approved,
    Dismissed,
}

impl SuggestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::DraftCreated => "draft_created",
            Self::Approved => "approved",
            Self::Dismissed => "dismissed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Dismissed)
    }
}

impl fmt::Display for SuggestionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot move suggestion from {from} to {to}")]
    Invalid {
        from: SuggestionStatus,
        to: SuggestionStatus,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(rename = "suggestion_id")]
    pub id: Uuid,
    #[serde(rename = "suggestion_type")]
    pub kind: SuggestionType,
    pub urgency: Urgency,
    pub reason: String,
    /// In `[0, 1]`.
    pub confidence: f64,
    pub source_reports: BTreeSet<String>,
    pub status: SuggestionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dismissed_by: Option<String>,
}

impl Suggestion {
    /// A fresh `pending` suggestion with a random id.
    pub fn pending(
        kind: SuggestionType,
        urgency: Urgency,
        reason: impl Into<String>,
        confidence: f64,
        source_reports: impl IntoIterator<Item = String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            urgency,
            reason: reason.into(),
            confidence: confidence.clamp(0.0, 1.0),
            source_reports: source_reports.into_iter().collect(),
            status: SuggestionStatus::Pending,
            created_at,
            dismissed_at: None,
            dismissed_by: None,
        }
    }

    /// An operator opened a drafting flow from this suggestion.
    pub fn open_draft(&mut self) -> Result<(), TransitionError> {
        self.transition(SuggestionStatus::DraftCreated)
    }

    /// The generated document was finalised.
    pub fn approve(&mut self) -> Result<(), TransitionError> {
        self.transition(SuggestionStatus::Approved)
    }

    /// Soft-terminate the suggestion.
    pub fn dismiss(
        &mut self,
        by: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        self.transition(SuggestionStatus::Dismissed)?;
        self.dismissed_at = Some(at);
        self.dismissed_by = Some(by.into());
        Ok(())
    }

    fn transition(&mut self, to: SuggestionStatus) -> Result<(), TransitionError> {
        use SuggestionStatus::*;

        let allowed = matches!(
            (self.status, to),
            (Pending, DraftCreated)
                | (Pending, Approved)
                | (DraftCreated, Approved)
                | (Pending, Dismissed)
                | (DraftCreated, Dismissed)
        );
        if !allowed {
            return Err(TransitionError::Invalid {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
