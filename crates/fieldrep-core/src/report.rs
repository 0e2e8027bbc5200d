//! Canonical field report types shared by the normalizer and the classifier.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::ParseError;

pub const DEFAULT_ACTION: &str = "move";
pub const DEFAULT_TIMEFRAME: &str = "immediate";
pub const UNKNOWN_UNIT: &str = "Unknown";
pub const UNKNOWN_SOLDIER: &str = "UNKNOWN";

/// One raw field message as it arrives from a soldier device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub text: String,
    #[serde(default, alias = "report_type")]
    pub report_type_hint: Option<String>,
}

impl RawMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            report_type_hint: None,
        }
    }

    pub fn with_hint(text: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            report_type_hint: Some(hint.into()),
        }
    }

    /// Report type named by the hint, if any.
    pub fn report_type(&self) -> Option<ReportType> {
        self.report_type_hint
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ReportType::parse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }

    /// Lenient mapping used when coercing candidate payloads.
    ///
    /// Accepts the enum names in any case plus the keyword synonyms the
    /// field extractor recognises (`urgent`, `critical`, `routine`).
    pub fn coerce(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" | "urgent" | "critical" => Some(Self::High),
            "medium" | "normal" => Some(Self::Medium),
            "low" | "routine" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::coerce(s).ok_or_else(|| format!("unknown priority: {s}"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_origin(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Report category attached to a message by the sending device or operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportType {
    Casualty,
    Contact,
    Sitrep,
    Intelligence,
    Intrep,
    Frago,
    Opord,
    Logstat,
    Casevac,
    Eoincrep,
    Other(String),
}

impl ReportType {
    /// Case-insensitive parse; anything unrecognised is kept as `Other`.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        match s.to_ascii_uppercase().as_str() {
            "CASUALTY" => Self::Casualty,
            "CONTACT" => Self::Contact,
            "SITREP" => Self::Sitrep,
            "INTELLIGENCE" => Self::Intelligence,
            "INTREP" => Self::Intrep,
            "FRAGO" => Self::Frago,
            "OPORD" => Self::Opord,
            "LOGSTAT" => Self::Logstat,
            "CASEVAC" => Self::Casevac,
            "EOINCREP" => Self::Eoincrep,
            _ => Self::Other(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Casualty => "CASUALTY",
            Self::Contact => "CONTACT",
            Self::Sitrep => "SITREP",
            Self::Intelligence => "INTELLIGENCE",
            Self::Intrep => "INTREP",
            Self::Frago => "FRAGO",
            Self::Opord => "OPORD",
            Self::Logstat => "LOGSTAT",
            Self::Casevac => "CASEVAC",
            Self::Eoincrep => "EOINCREP",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ReportType {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<ReportType> for String {
    fn from(t: ReportType) -> Self {
        t.as_str().to_string()
    }
}

/// The validated, fully-defaulted record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuredReport {
    pub action: String,
    pub target_units: Vec<String>,
    pub coordinates: Coordinates,
    pub timeframe: String,
    pub priority: Priority,
    pub soldier_id: String,
    pub radio_call_sign: Option<String>,
    #[serde(default)]
    pub extras: Map<String, Value>,
    pub transmission_time: DateTime<Utc>,
    pub received_time: DateTime<Utc>,
}

impl StructuredReport {
    /// A report with every field at its documented default.
    pub fn defaults(now: DateTime<Utc>) -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            target_units: vec![UNKNOWN_UNIT.to_string()],
            coordinates: Coordinates::default(),
            timeframe: DEFAULT_TIMEFRAME.to_string(),
            priority: Priority::Medium,
            soldier_id: UNKNOWN_SOLDIER.to_string(),
            radio_call_sign: None,
            extras: Map::new(),
            transmission_time: now,
            received_time: now,
        }
    }

    /// Canonical JSON rendering.
    pub fn to_json(&self) -> Value {
        // Serialising plain data with string keys cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }
}

/// JSON rendering of a normalization outcome: the report itself, or the
/// `{"error": …}` sentinel callers must check for.
pub fn outcome_json(outcome: &Result<StructuredReport, ParseError>) -> Value {
    match outcome {
        Ok(report) => report.to_json(),
        Err(e) => json!({ "error": e.to_string() }),
    }
}
