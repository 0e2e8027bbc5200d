//! Schema defaulting and coercion: the last stage of every normalization.
//!
//! Turns a loosely-typed candidate object into a [`StructuredReport`]. Missing
//! or null fields take their documented default; values of the wrong shape are
//! coerced where the intent is unambiguous (numeric strings, `[x, y]` pairs,
//! comma-separated unit lists) and rejected otherwise, which sends the
//! normalizer on to its next strategy.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ValidationError;
use crate::report::{
    Coordinates, DEFAULT_ACTION, DEFAULT_TIMEFRAME, Priority, StructuredReport, UNKNOWN_SOLDIER,
    UNKNOWN_UNIT,
};

/// Top-level keys with a dedicated field. Everything else folds into `extras`.
const KNOWN_FIELDS: &[&str] = &[
    "action",
    "target_units",
    "coordinates",
    "timeframe",
    "priority",
    "soldier_id",
    "radio_call_sign",
    "extras",
    "transmission_time",
    "received_time",
];

/// Validate a candidate object, filling defaults and stamping timestamps that
/// the candidate does not carry with `now`.
pub fn validate_candidate(
    candidate: &Map<String, Value>,
    now: DateTime<Utc>,
) -> Result<StructuredReport, ValidationError> {
    let action = optional_text(candidate, "action")?.unwrap_or_else(|| DEFAULT_ACTION.into());
    let target_units = target_units(candidate.get("target_units"))?;
    let coordinates = match candidate.get("coordinates") {
        None | Some(Value::Null) => Coordinates::default(),
        Some(v) => coordinates(v)?,
    };
    let timeframe =
        optional_text(candidate, "timeframe")?.unwrap_or_else(|| DEFAULT_TIMEFRAME.into());
    let priority = match candidate.get("priority") {
        None | Some(Value::Null) => Priority::Medium,
        Some(Value::String(s)) if s.trim().is_empty() => Priority::Medium,
        Some(Value::String(s)) => Priority::coerce(s)
            .ok_or_else(|| ValidationError::field("priority", format!("unknown value {s:?}")))?,
        Some(other) => {
            return Err(ValidationError::field(
                "priority",
                format!("expected string, got {other}"),
            ));
        }
    };
    let soldier_id =
        optional_text(candidate, "soldier_id")?.unwrap_or_else(|| UNKNOWN_SOLDIER.into());
    let radio_call_sign = optional_text(candidate, "radio_call_sign")?;

    let mut extras = match candidate.get("extras") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(m)) => m.clone(),
        Some(other) => {
            return Err(ValidationError::field(
                "extras",
                format!("expected object, got {other}"),
            ));
        }
    };
    for (key, value) in candidate {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            extras.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    let transmission_time = timestamp(candidate.get("transmission_time")).unwrap_or(now);
    let received_time = timestamp(candidate.get("received_time")).unwrap_or(now);

    Ok(StructuredReport {
        action,
        target_units,
        coordinates,
        timeframe,
        priority,
        soldier_id,
        radio_call_sign,
        extras,
        transmission_time,
        received_time,
    })
}

/// Scalar text field. Numbers and booleans are stringified; blank strings
/// count as absent.
fn optional_text(
    candidate: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match candidate.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Some(v @ (Value::Number(_) | Value::Bool(_))) => Ok(Some(v.to_string())),
        Some(other) => Err(ValidationError::field(
            field,
            format!("expected scalar, got {other}"),
        )),
    }
}

fn target_units(value: Option<&Value>) -> Result<Vec<String>, ValidationError> {
    let mut units: Vec<String> = Vec::new();
    let mut push = |s: &str| {
        let s = s.trim();
        if !s.is_empty() && !units.iter().any(|u| u == s) {
            units.push(s.to_string());
        }
    };

    match value {
        None | Some(Value::Null) => {}
        Some(Value::String(s)) => s.split(',').for_each(&mut push),
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => push(s),
                    Value::Number(n) => push(&n.to_string()),
                    Value::Null => {}
                    other => {
                        return Err(ValidationError::field(
                            "target_units",
                            format!("unexpected element {other}"),
                        ));
                    }
                }
            }
        }
        Some(other) => {
            return Err(ValidationError::field(
                "target_units",
                format!("expected list, got {other}"),
            ));
        }
    }

    if units.is_empty() {
        units.push(UNKNOWN_UNIT.to_string());
    }
    Ok(units)
}

fn coordinates(value: &Value) -> Result<Coordinates, ValidationError> {
    let (x, y) = match value {
        Value::Object(m) => (
            number(m.get("x"), "coordinates.x")?,
            number(m.get("y"), "coordinates.y")?,
        ),
        Value::Array(items) if items.len() == 2 => (
            number(items.first(), "coordinates.x")?,
            number(items.get(1), "coordinates.y")?,
        ),
        Value::String(s) => {
            let parts: Vec<&str> = s
                .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
                .filter(|p| !p.is_empty())
                .collect();
            if parts.len() != 2 {
                return Err(ValidationError::field(
                    "coordinates",
                    format!("expected an x,y pair, got {s:?}"),
                ));
            }
            (
                parse_finite(parts[0], "coordinates.x")?,
                parse_finite(parts[1], "coordinates.y")?,
            )
        }
        other => {
            return Err(ValidationError::field(
                "coordinates",
                format!("expected object or pair, got {other}"),
            ));
        }
    };
    Ok(Coordinates { x, y })
}

fn number(value: Option<&Value>, field: &'static str) -> Result<f64, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(0.0),
        Some(Value::Number(n)) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .ok_or_else(|| ValidationError::field(field, format!("not a finite number: {n}"))),
        Some(Value::String(s)) => parse_finite(s, field),
        Some(other) => Err(ValidationError::field(
            field,
            format!("expected number, got {other}"),
        )),
    }
}

fn parse_finite(s: &str, field: &'static str) -> Result<f64, ValidationError> {
    s.trim()
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .ok_or_else(|| ValidationError::field(field, format!("not a finite number: {s:?}")))
}

/// RFC 3339, or a zone-less ISO timestamp taken as UTC. Anything else is
/// restamped by the caller.
fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    let s = value?.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Some(naive.and_utc()),
        Err(e) => {
            debug!(value = s, error = %e, "unparseable timestamp, restamping");
            None
        }
    }
}
