use thiserror::Error;

/// A single field of a candidate report could not be coerced into the schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("field `{field}`: {reason}")]
    Field { field: &'static str, reason: String },
}

impl ValidationError {
    pub fn field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Field {
            field,
            reason: reason.into(),
        }
    }
}

/// Failure of one normalization stage.
///
/// Only [`ParseError::Empty`] and [`ParseError::NoSignal`] ever reach a caller
/// of the normalizer; the other variants move the strategy chain on to its
/// next stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("message is empty")]
    Empty,

    #[error("message carries no recognisable content")]
    NoSignal,

    #[error("not JSON: {0}")]
    Json(String),

    #[error("no JSON object found")]
    NoCandidate,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for ParseError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e.to_string())
    }
}
