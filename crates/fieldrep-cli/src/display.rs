//! Plain-text renderings of a normalized report.
//!
//! EOINCREP follows the heading / section A / section B layout and omits
//! fields the report does not carry. CASEVAC is the nine-line request; every
//! line is always printed, with a placeholder when the report is silent.

use fieldrep_ai::Signals;
use fieldrep_core::StructuredReport;
use serde_json::Value;

const UNKNOWN: &str = "Unknown";

// ── Public API ──

pub fn render_eoincrep(report: &StructuredReport) -> String {
    let mut lines = vec!["EXPLOSIVE ORDNANCE INCIDENT REPORT (EOINCREP)".to_string()];

    push_section(
        &mut lines,
        "Heading Information:",
        &[
            ("Unit Number", Some(report.target_units.join(", "))),
            ("Control Number", mission_id(report)),
            ("Incident Category", Some(report.priority.to_string())),
        ],
    );

    let reported_by = match &report.radio_call_sign {
        Some(cs) => format!("{} ({cs})", report.soldier_id),
        None => report.soldier_id.clone(),
    };
    push_section(
        &mut lines,
        "Section A \u{2013} Incident Reported:",
        &[
            (
                "Date/Time Reported",
                Some(report.transmission_time.format("%Y-%m-%d %H%MZ").to_string()),
            ),
            ("Reported by", Some(reported_by)),
            ("Incident Location", Some(location(report))),
            ("Item(s) Reported", extra_text(report, &["items_reported", "items"])),
        ],
    );

    push_section(
        &mut lines,
        "Section B \u{2013} Action by EOD:",
        &[
            ("Requested Action", Some(format!("{} ({})", report.action, report.timeframe))),
            ("Disposition", extra_text(report, &["disposition"])),
            ("Incident Narrative", extra_text(report, &["description", "narrative"])),
        ],
    );

    trim_trailing_blank(&mut lines);
    lines.join("\n")
}

pub fn render_casevac(report: &StructuredReport) -> String {
    let signals = Signals::from_extras(&report.extras);
    let patients = if signals.casualties > 0 {
        signals.casualties.to_string()
    } else {
        UNKNOWN.to_string()
    };
    let precedence = match (signals.casualties, signals.severity.as_str()) {
        (0, _) => UNKNOWN.to_string(),
        (n, "critical" | "severe") => format!("{n} URGENT"),
        (n, _) => format!("{n} PRIORITY"),
    };

    let lines = [
        "CASEVAC REQUEST (Nine-Line)".to_string(),
        format!("1. Location of pick-up site: {}", location(report)),
        format!(
            "2. Radio frequency / call sign: {}",
            report.radio_call_sign.as_deref().unwrap_or(UNKNOWN)
        ),
        format!("3. Number of patients by precedence: {precedence}"),
        format!(
            "4. Special equipment required: {}",
            extra_text(report, &["special_equipment"]).unwrap_or_else(|| "None".into())
        ),
        format!("5. Number of patients: {patients}"),
        format!(
            "6. Security at pick-up site: {}",
            extra_text(report, &["security"]).unwrap_or_else(|| UNKNOWN.into())
        ),
        format!(
            "7. Method of marking pick-up site: {}",
            extra_text(report, &["marking", "marking_method"]).unwrap_or_else(|| UNKNOWN.into())
        ),
        format!(
            "8. Patient nationality and status: {}",
            extra_text(report, &["patient_nationality", "nationality"])
                .unwrap_or_else(|| UNKNOWN.into())
        ),
        format!(
            "9. NBC contamination (if any): {}",
            extra_text(report, &["nbc_contamination", "nbc"]).unwrap_or_else(|| "None".into())
        ),
    ];
    lines.join("\n")
}

// ── Helpers ──

fn push_section(lines: &mut Vec<String>, title: &str, fields: &[(&str, Option<String>)]) {
    let present: Vec<_> = fields
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|v| (label, v)))
        .collect();
    if present.is_empty() {
        return;
    }
    lines.push(title.to_string());
    for (label, value) in present {
        lines.push(format!("  {label}: {value}"));
    }
    lines.push(String::new());
}

fn trim_trailing_blank(lines: &mut Vec<String>) {
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
}

fn location(report: &StructuredReport) -> String {
    if report.coordinates.is_origin() {
        UNKNOWN.to_string()
    } else {
        format!("{}, {}", report.coordinates.x, report.coordinates.y)
    }
}

fn mission_id(report: &StructuredReport) -> Option<String> {
    match report.extra("mission_info")? {
        Value::Object(info) => info.get("mission_id").and_then(scalar),
        other => scalar(other),
    }
}

fn extra_text(report: &StructuredReport, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| report.extra(k).and_then(scalar))
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(scalar).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        _ => None,
    }
}
