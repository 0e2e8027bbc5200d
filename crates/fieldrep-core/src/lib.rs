pub mod error;
pub mod report;
pub mod schema;
pub mod suggestion;
pub mod validate;

pub use error::{ParseError, ValidationError};
pub use report::{Coordinates, Priority, RawMessage, ReportType, StructuredReport, outcome_json};
pub use schema::columnar;
pub use suggestion::{Suggestion, SuggestionStatus, SuggestionType, TransitionError, Urgency};
pub use validate::validate_candidate;
