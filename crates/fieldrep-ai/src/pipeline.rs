//! Ingest: normalize → record → classify → admit → record suggestions.
//!
//! Recording the report and analysing it are decoupled. A sink failure on the
//! report aborts ingest before classification; a sink failure on suggestions
//! is logged and the report stays recorded.

use fieldrep_core::{ParseError, RawMessage, ReportType, StructuredReport, Suggestion};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::TriggerClassifier;
use crate::ledger::SuggestionLedger;
use crate::normalizer::Normalizer;

/// Report type assumed when a message carries no hint. SITREP is evaluated by
/// both the casualty and the enemy rules.
pub const DEFAULT_REPORT_TYPE: ReportType = ReportType::Sitrep;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("sink error: {0}")]
pub struct SinkError(pub String);

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("normalization failed: {0}")]
    Parse(#[from] ParseError),
    #[error("recording report failed: {0}")]
    Sink(String),
}

/// A report as it was recorded, with what is needed to analyse it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedReport {
    pub report_id: String,
    pub report_type: ReportType,
    pub report: StructuredReport,
    pub raw_text: String,
}

/// Where reports and suggestions are persisted.
pub trait ReportSink {
    fn record_report(&mut self, record: &RecordedReport) -> Result<(), SinkError>;
    fn record_suggestions(&mut self, suggestions: &[Suggestion]) -> Result<(), SinkError>;
}

/// Keeps everything in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub reports: Vec<RecordedReport>,
    pub suggestions: Vec<Suggestion>,
}

impl ReportSink for MemorySink {
    fn record_report(&mut self, record: &RecordedReport) -> Result<(), SinkError> {
        self.reports.push(record.clone());
        Ok(())
    }

    fn record_suggestions(&mut self, suggestions: &[Suggestion]) -> Result<(), SinkError> {
        self.suggestions.extend_from_slice(suggestions);
        Ok(())
    }
}

/// Outcome of one ingest.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub record: RecordedReport,
    /// Newly admitted suggestions.
    pub suggestions: Vec<Suggestion>,
}

/// Summary of a reanalysis sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReanalysisStats {
    pub reports: usize,
    pub fired: usize,
    pub admitted: usize,
}

pub struct Pipeline {
    normalizer: Normalizer,
    classifier: TriggerClassifier,
    ledger: SuggestionLedger,
}

impl Pipeline {
    pub fn new(normalizer: Normalizer) -> Self {
        Self {
            normalizer,
            classifier: TriggerClassifier::new(),
            ledger: SuggestionLedger::new(),
        }
    }

    pub fn ledger(&self) -> &SuggestionLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut SuggestionLedger {
        &mut self.ledger
    }

    pub async fn ingest<S: ReportSink>(
        &mut self,
        raw: &RawMessage,
        sink: &mut S,
    ) -> Result<Ingested, IngestError> {
        let report = self.normalizer.normalize(raw).await?;
        let record = RecordedReport {
            report_id: Uuid::new_v4().to_string(),
            report_type: raw.report_type().unwrap_or(DEFAULT_REPORT_TYPE),
            report,
            raw_text: raw.text.clone(),
        };

        sink.record_report(&record)
            .map_err(|e| IngestError::Sink(e.to_string()))?;
        info!(
            report_id = %record.report_id,
            report_type = %record.report_type,
            priority = %record.report.priority,
            "report recorded"
        );

        let suggestions = self.analyse(&record, sink);
        Ok(Ingested {
            record,
            suggestions,
        })
    }

    /// Classify already-recorded reports again. Only new
    /// `(report, suggestion type)` pairs get through the ledger.
    pub fn reanalyze<S: ReportSink>(
        &mut self,
        records: &[RecordedReport],
        sink: &mut S,
    ) -> ReanalysisStats {
        let mut stats = ReanalysisStats {
            reports: records.len(),
            ..Default::default()
        };
        for record in records {
            let fired = self.classifier.classify(
                &record.report_id,
                &record.report,
                &record.report_type,
                &record.raw_text,
            );
            stats.fired += fired.len();
            let admitted = self.ledger.admit(fired);
            stats.admitted += admitted.len();
            store_suggestions(sink, &admitted);
        }
        info!(
            reports = stats.reports,
            fired = stats.fired,
            admitted = stats.admitted,
            "reanalysis complete"
        );
        stats
    }

    fn analyse<S: ReportSink>(&mut self, record: &RecordedReport, sink: &mut S) -> Vec<Suggestion> {
        let fired = self.classifier.classify(
            &record.report_id,
            &record.report,
            &record.report_type,
            &record.raw_text,
        );
        let admitted = self.ledger.admit(fired);
        store_suggestions(sink, &admitted);
        admitted
    }
}

fn store_suggestions<S: ReportSink>(sink: &mut S, suggestions: &[Suggestion]) {
    if suggestions.is_empty() {
        return;
    }
    match sink.record_suggestions(suggestions) {
        Ok(()) => info!(count = suggestions.len(), "suggestions recorded"),
        Err(e) => error!(error = %e, count = suggestions.len(), "failed to record suggestions"),
    }
}

/// Normalize and classify without recording or admitting anything.
pub async fn preview(
    normalizer: &Normalizer,
    raw: &RawMessage,
) -> Result<(StructuredReport, Vec<Suggestion>), ParseError> {
    let report = normalizer.normalize(raw).await.inspect_err(|e| {
        warn!(error = %e, "message could not be normalized");
    })?;
    let report_type = raw.report_type().unwrap_or(DEFAULT_REPORT_TYPE);
    let suggestions = TriggerClassifier::new().classify("preview", &report, &report_type, &raw.text);
    Ok((report, suggestions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldrep_core::{SuggestionStatus, SuggestionType};

    /// Refuses reports.
    struct BrokenSink;

    impl ReportSink for BrokenSink {
        fn record_report(&mut self, _: &RecordedReport) -> Result<(), SinkError> {
            Err(SinkError("disk full".into()))
        }
        fn record_suggestions(&mut self, _: &[Suggestion]) -> Result<(), SinkError> {
            panic!("must not be called after a failed report write");
        }
    }

    /// Records reports, refuses suggestions.
    #[derive(Default)]
    struct HalfSink {
        reports: Vec<RecordedReport>,
        suggestion_attempts: usize,
    }

    impl ReportSink for HalfSink {
        fn record_report(&mut self, record: &RecordedReport) -> Result<(), SinkError> {
            self.reports.push(record.clone());
            Ok(())
        }
        fn record_suggestions(&mut self, _: &[Suggestion]) -> Result<(), SinkError> {
            self.suggestion_attempts += 1;
            Err(SinkError("suggestions table locked".into()))
        }
    }

    fn pipeline() -> Pipeline {
        Pipeline::new(Normalizer::new())
    }

    #[tokio::test]
    async fn ingest_records_and_suggests() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        let raw = RawMessage::with_hint(
            r#"{"action": "hold", "target_units": ["Alpha Squad"], "casualties": 2, "severity": "critical"}"#,
            "CASUALTY",
        );
        let out = p.ingest(&raw, &mut sink).await.unwrap();

        assert_eq!(sink.reports.len(), 1);
        assert_eq!(sink.reports[0].report_type, ReportType::Casualty);
        assert_eq!(out.suggestions.len(), 1);
        assert_eq!(out.suggestions[0].kind, SuggestionType::Casevac);
        assert!(out.suggestions[0].source_reports.contains(&out.record.report_id));
        assert_eq!(sink.suggestions.len(), 1);
        assert_eq!(p.ledger().by_status(SuggestionStatus::Pending).count(), 1);
    }

    #[tokio::test]
    async fn missing_hint_defaults_to_sitrep() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        let out = p
            .ingest(&RawMessage::new("hostile infantry moving north"), &mut sink)
            .await
            .unwrap();
        assert_eq!(out.record.report_type, ReportType::Sitrep);
        assert_eq!(out.suggestions[0].kind, SuggestionType::Eoincrep);
    }

    #[tokio::test]
    async fn parse_failure_records_nothing() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        let err = p.ingest(&RawMessage::new("  "), &mut sink).await.unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::Empty)));
        assert!(sink.reports.is_empty());
    }

    #[tokio::test]
    async fn report_sink_failure_aborts_before_classification() {
        let mut p = pipeline();
        let err = p
            .ingest(&RawMessage::new("IED on route"), &mut BrokenSink)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Sink(_)));
        assert!(p.ledger().is_empty());
    }

    #[tokio::test]
    async fn suggestion_sink_failure_keeps_report() {
        let mut p = pipeline();
        let mut sink = HalfSink::default();
        let out = p
            .ingest(&RawMessage::new("IED on route"), &mut sink)
            .await
            .unwrap();
        assert_eq!(sink.reports.len(), 1);
        assert_eq!(sink.suggestion_attempts, 1);
        assert_eq!(out.suggestions.len(), 1);
    }

    #[tokio::test]
    async fn reanalysis_only_admits_new_pairs() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        let raw = RawMessage::with_hint("Mines reported, two wounded", "SITREP");
        let first = p.ingest(&raw, &mut sink).await.unwrap();
        assert_eq!(first.suggestions.len(), 2);

        // Dismiss one; a sweep must not raise it again.
        let id = first.suggestions[0].id;
        p.ledger_mut().dismiss(id, "ops").unwrap();

        let records = sink.reports.clone();
        let stats = p.reanalyze(&records, &mut sink);
        assert_eq!(
            stats,
            ReanalysisStats {
                reports: 1,
                fired: 2,
                admitted: 0
            }
        );
        assert_eq!(p.ledger().len(), 2);
    }

    #[tokio::test]
    async fn reanalysis_picks_up_changed_rules_input() {
        let mut p = pipeline();
        let mut sink = MemorySink::default();
        p.ingest(&RawMessage::with_hint("all quiet", "CONTACT"), &mut sink)
            .await
            .unwrap();
        assert!(p.ledger().is_empty());

        let mut records = sink.reports.clone();
        records[0]
            .report
            .extras
            .insert("enemy_count".into(), serde_json::json!(3));
        let stats = p.reanalyze(&records, &mut sink);
        assert_eq!(stats.admitted, 1);
        assert_eq!(sink.suggestions.len(), 1);
    }

    #[tokio::test]
    async fn preview_does_not_touch_ledger() {
        let (report, suggestions) =
            preview(&Normalizer::new(), &RawMessage::new("Bravo Team hold, booby trap at gate"))
                .await
                .unwrap();
        assert_eq!(report.action, "hold");
        assert_eq!(suggestions[0].kind, SuggestionType::EoincrepEod);
    }
}
