//! Field message normalization and follow-up report triggers.

pub mod classifier;
pub mod extract;
mod http;
pub mod keywords;
pub mod ledger;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod repair;

pub use classifier::{Signals, Trigger, TriggerClassifier};
pub use extract::RuleDraft;
pub use http::HttpExtractionService;
pub use ledger::{LedgerError, SuggestionLedger};
pub use model::{ExtractionError, ExtractionService, ModelConfig, NormalizerConfig};
pub use normalizer::{Normalizer, normalize_rules};
pub use pipeline::{
    IngestError, Ingested, MemorySink, Pipeline, RecordedReport, ReportSink, SinkError, preview,
};
