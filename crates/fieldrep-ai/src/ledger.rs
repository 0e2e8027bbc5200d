//! In-memory ledger of admitted suggestions.
//!
//! Holds every suggestion ever admitted (none are deleted) and refuses a new
//! one when its `(source report, suggestion type)` pair is already held, in
//! any status. A dismissed suggestion is therefore never raised again by a
//! reanalysis sweep.
//!
//! The ledger grows with every admitted suggestion. Long-lived callers drop a
//! report's entries with [`SuggestionLedger::forget_report`] once the report
//! is archived and can no longer be reanalysed.

use std::collections::HashSet;

use chrono::Utc;
use fieldrep_core::{Suggestion, SuggestionStatus, SuggestionType, TransitionError};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("no suggestion with id {0}")]
    NotFound(Uuid),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

#[derive(Debug, Default)]
pub struct SuggestionLedger {
    suggestions: Vec<Suggestion>,
    seen: HashSet<(String, SuggestionType)>,
}

impl SuggestionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit candidates whose pairs are all new. Returns the admitted ones.
    pub fn admit(&mut self, candidates: Vec<Suggestion>) -> Vec<Suggestion> {
        let mut admitted = Vec::new();
        for candidate in candidates {
            let held = candidate
                .source_reports
                .iter()
                .any(|id| self.seen.contains(&(id.clone(), candidate.kind)));
            if held {
                debug!(
                    kind = %candidate.kind,
                    sources = ?candidate.source_reports,
                    "suppressing duplicate suggestion"
                );
                continue;
            }
            for id in &candidate.source_reports {
                self.seen.insert((id.clone(), candidate.kind));
            }
            info!(
                id = %candidate.id,
                kind = %candidate.kind,
                urgency = %candidate.urgency,
                "suggestion admitted"
            );
            self.suggestions.push(candidate.clone());
            admitted.push(candidate);
        }
        admitted
    }

    /// Whether a suggestion of `kind` citing `report_id` is already held.
    pub fn holds(&self, report_id: &str, kind: SuggestionType) -> bool {
        self.seen.contains(&(report_id.to_string(), kind))
    }

    pub fn get(&self, id: Uuid) -> Option<&Suggestion> {
        self.suggestions.iter().find(|s| s.id == id)
    }

    pub fn open_draft(&mut self, id: Uuid) -> Result<&Suggestion, LedgerError> {
        let s = self.get_mut(id)?;
        s.open_draft()?;
        Ok(s)
    }

    pub fn approve(&mut self, id: Uuid) -> Result<&Suggestion, LedgerError> {
        let s = self.get_mut(id)?;
        s.approve()?;
        Ok(s)
    }

    pub fn dismiss(&mut self, id: Uuid, by: &str) -> Result<&Suggestion, LedgerError> {
        let s = self.get_mut(id)?;
        s.dismiss(by, Utc::now())?;
        info!(id = %id, by, "suggestion dismissed");
        Ok(s)
    }

    pub fn by_status(&self, status: SuggestionStatus) -> impl Iterator<Item = &Suggestion> {
        self.suggestions.iter().filter(move |s| s.status == status)
    }

    pub fn all(&self) -> &[Suggestion] {
        &self.suggestions
    }

    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    /// Drop every suggestion citing `report_id`, and the pairs that block it.
    /// Pairs for other reports cited by a dropped suggestion stay held.
    pub fn forget_report(&mut self, report_id: &str) -> usize {
        let before = self.suggestions.len();
        self.suggestions.retain(|s| !s.source_reports.contains(report_id));
        self.seen.retain(|(id, _)| id != report_id);
        let dropped = before - self.suggestions.len();
        debug!(report_id, dropped, "forgot report");
        dropped
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut Suggestion, LedgerError> {
        self.suggestions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(LedgerError::NotFound(id))
    }
}
