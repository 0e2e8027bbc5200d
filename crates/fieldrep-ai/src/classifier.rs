//! Rule-based trigger classification for normalized reports.
//!
//! Three independent rule families look at a report's type, the signals its
//! extras carry, and keywords in its description or raw text. Each family that
//! fires yields one [`Trigger`]; triggers become pending [`Suggestion`]s for an
//! operator to act on. The classifier keeps no state and does no dedup.

use chrono::{DateTime, Utc};
use fieldrep_core::{ReportType, StructuredReport, Suggestion, SuggestionType, Urgency};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::keywords::{ENEMY, EXPLOSIVE, INJURY, URGENT_INJURY};

/// One fired rule, before it is stamped into a suggestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub kind: SuggestionType,
    pub urgency: Urgency,
    pub reason: String,
    pub confidence: f64,
}

impl Trigger {
    pub fn into_suggestion(self, report_id: &str, now: DateTime<Utc>) -> Suggestion {
        Suggestion::pending(
            self.kind,
            self.urgency,
            self.reason,
            self.confidence,
            [report_id.to_string()],
            now,
        )
    }
}

/// Signals read from report extras. Malformed values read as zero or empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signals {
    pub casualties: u64,
    pub enemy_count: u64,
    pub vehicle_count: u64,
    /// Lowercased.
    pub severity: String,
    pub description: String,
}

impl Signals {
    pub fn from_extras(extras: &Map<String, Value>) -> Self {
        Self {
            casualties: count(extras, &["casualties", "casualty_count", "casualtyCount"]),
            enemy_count: count(extras, &["enemy_count", "enemyCount"]),
            vehicle_count: count(extras, &["vehicle_count", "vehicleCount"]),
            severity: text(extras, "severity").to_lowercase(),
            description: text(extras, "description"),
        }
    }
}

fn lookup<'a>(extras: &'a Map<String, Value>, keys: &[&str]) -> Option<(&'a Value, String)> {
    keys.iter()
        .find_map(|k| extras.get(*k).map(|v| (v, k.to_string())))
}

fn count(extras: &Map<String, Value>, keys: &[&str]) -> u64 {
    let Some((value, key)) = lookup(extras, keys) else {
        return 0;
    };
    let parsed = match value {
        Value::Null => Some(0.0),
        Value::Number(n) => n.as_f64(),
        Value::String(s) if s.trim().is_empty() => Some(0.0),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match parsed.filter(|f| f.is_finite()) {
        Some(f) if f > 0.0 => f.floor() as u64,
        Some(_) => 0,
        None => {
            warn!(field = %key, value = %value, "non-numeric signal, reading as zero");
            0
        }
    }
}

fn text(extras: &Map<String, Value>, key: &str) -> String {
    match extras.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// The three trigger rule families.
pub struct TriggerClassifier {
    casevac_types: Vec<ReportType>,
    eoincrep_types: Vec<ReportType>,
}

impl Default for TriggerClassifier {
    fn default() -> Self {
        Self {
            casevac_types: vec![ReportType::Casualty, ReportType::Contact, ReportType::Sitrep],
            eoincrep_types: vec![
                ReportType::Contact,
                ReportType::Intelligence,
                ReportType::Sitrep,
            ],
        }
    }
}

impl TriggerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run every rule family that applies to `report_type`.
    pub fn evaluate(
        &self,
        report: &StructuredReport,
        report_type: &ReportType,
        raw_text: &str,
    ) -> Vec<Trigger> {
        let signals = Signals::from_extras(&report.extras);
        let texts = [signals.description.as_str(), raw_text];

        let mut triggers = Vec::new();
        if self.casevac_types.contains(report_type) {
            triggers.extend(casevac(&signals, &texts));
        }
        if self.eoincrep_types.contains(report_type) {
            triggers.extend(eoincrep(&signals, &texts));
        }
        triggers.extend(explosive(&texts));

        debug!(
            report_type = %report_type,
            fired = triggers.len(),
            "trigger evaluation complete"
        );
        triggers
    }

    /// [`evaluate`](Self::evaluate), stamped into pending suggestions that
    /// cite `report_id`.
    pub fn classify(
        &self,
        report_id: &str,
        report: &StructuredReport,
        report_type: &ReportType,
        raw_text: &str,
    ) -> Vec<Suggestion> {
        let now = Utc::now();
        self.evaluate(report, report_type, raw_text)
            .into_iter()
            .map(|t| t.into_suggestion(report_id, now))
            .collect()
    }
}

// ── Rule families ──

fn casevac(signals: &Signals, texts: &[&str]) -> Option<Trigger> {
    let keyword = INJURY.first_match_in(texts);
    if signals.casualties == 0 && keyword.is_none() {
        return None;
    }

    let n = signals.casualties;
    let (urgency, confidence, reason) = if URGENT_INJURY.first_match_in(texts).is_some() {
        (Urgency::Urgent, 0.95, "URGENT: Critical casualties detected".to_string())
    } else if matches!(signals.severity.as_str(), "critical" | "severe") {
        (Urgency::Urgent, 0.95, format!("URGENT: {n} critical casualties"))
    } else if n >= 1 {
        (Urgency::High, 0.90, format!("{n} casualties reported"))
    } else {
        (Urgency::Medium, 0.75, "Potential casualties detected".to_string())
    };

    Some(Trigger {
        kind: SuggestionType::Casevac,
        urgency,
        reason,
        confidence,
    })
}

fn eoincrep(signals: &Signals, texts: &[&str]) -> Option<Trigger> {
    let (enemy, vehicles) = (signals.enemy_count, signals.vehicle_count);
    if enemy == 0 && ENEMY.first_match_in(texts).is_none() {
        return None;
    }

    let (urgency, confidence, reason) = if enemy > 10 || vehicles > 2 {
        (
            Urgency::High,
            0.90,
            format!("Significant enemy force: {enemy} personnel, {vehicles} vehicles"),
        )
    } else if enemy > 0 {
        (Urgency::Medium, 0.85, format!("Enemy contact: {enemy} hostiles"))
    } else {
        (Urgency::Medium, 0.80, "Enemy activity detected".to_string())
    };

    Some(Trigger {
        kind: SuggestionType::Eoincrep,
        urgency,
        reason,
        confidence,
    })
}

fn explosive(texts: &[&str]) -> Option<Trigger> {
    EXPLOSIVE.first_match_in(texts).map(|_| Trigger {
        kind: SuggestionType::EoincrepEod,
        urgency: Urgency::High,
        reason: "Explosive ordnance/device detected".to_string(),
        confidence: 0.85,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldrep_core::SuggestionStatus;
    use serde_json::json;

    fn report_with(extras: Value) -> StructuredReport {
        let mut report = StructuredReport::defaults(Utc::now());
        report.extras = extras.as_object().cloned().unwrap();
        report
    }

    fn kinds(triggers: &[Trigger]) -> Vec<SuggestionType> {
        triggers.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn casualty_with_critical_severity_is_urgent() {
        let report = report_with(json!({"casualties": 2, "severity": "critical"}));
        let triggers = TriggerClassifier::new().evaluate(&report, &ReportType::Casualty, "");
        assert_eq!(triggers.len(), 1);
        let t = &triggers[0];
        assert_eq!(t.kind, SuggestionType::Casevac);
        assert_eq!(t.urgency, Urgency::Urgent);
        assert_eq!(t.confidence, 0.95);
        assert_eq!(t.reason, "URGENT: 2 critical casualties");
    }

    #[test]
    fn contact_with_large_force_is_high() {
        let report = report_with(json!({"enemyCount": 15, "vehicleCount": 3}));
        let triggers = TriggerClassifier::new().evaluate(&report, &ReportType::Contact, "");
        assert_eq!(triggers.len(), 1);
        let t = &triggers[0];
        assert_eq!(t.kind, SuggestionType::Eoincrep);
        assert_eq!(t.urgency, Urgency::High);
        assert_eq!(t.confidence, 0.90);
        assert_eq!(t.reason, "Significant enemy force: 15 personnel, 3 vehicles");
    }

    #[test]
    fn quiet_sitrep_fires_nothing() {
        let report = report_with(json!({"casualties": 0, "enemy_count": 0}));
        let triggers = TriggerClassifier::new().evaluate(
            &report,
            &ReportType::Sitrep,
            "All units holding, resupply complete",
        );
        assert!(triggers.is_empty());
    }

    #[test]
    fn casevac_escalation_ladder() {
        let c = TriggerClassifier::new();

        let keyword_only = c.evaluate(
            &report_with(json!({})),
            &ReportType::Sitrep,
            "one soldier wounded",
        );
        assert_eq!(keyword_only[0].urgency, Urgency::Medium);
        assert_eq!(keyword_only[0].confidence, 0.75);
        assert_eq!(keyword_only[0].reason, "Potential casualties detected");

        let counted = c.evaluate(
            &report_with(json!({"casualties": "3"})),
            &ReportType::Casualty,
            "",
        );
        assert_eq!(counted[0].urgency, Urgency::High);
        assert_eq!(counted[0].reason, "3 casualties reported");

        let urgent_word = c.evaluate(
            &report_with(json!({"description": "Two KIA at checkpoint"})),
            &ReportType::Casualty,
            "",
        );
        assert_eq!(urgent_word[0].urgency, Urgency::Urgent);
        assert_eq!(urgent_word[0].reason, "URGENT: Critical casualties detected");
    }

    #[test]
    fn eoincrep_escalation_ladder() {
        let c = TriggerClassifier::new();

        let small = c.evaluate(
            &report_with(json!({"enemy_count": 4})),
            &ReportType::Intelligence,
            "",
        );
        assert_eq!(small[0].urgency, Urgency::Medium);
        assert_eq!(small[0].confidence, 0.85);
        assert_eq!(small[0].reason, "Enemy contact: 4 hostiles");

        let keyword = c.evaluate(&report_with(json!({})), &ReportType::Sitrep, "hostile patrol east");
        assert_eq!(keyword[0].confidence, 0.80);
        assert_eq!(keyword[0].reason, "Enemy activity detected");

        let vehicles_only = c.evaluate(
            &report_with(json!({"vehicle_count": 5})),
            &ReportType::Contact,
            "",
        );
        assert!(vehicles_only.is_empty());
    }

    #[test]
    fn report_type_gates_families() {
        let report = report_with(json!({"casualties": 1, "enemy_count": 20}));
        let c = TriggerClassifier::new();

        assert_eq!(
            kinds(&c.evaluate(&report, &ReportType::Intelligence, "")),
            vec![SuggestionType::Eoincrep]
        );
        assert_eq!(
            kinds(&c.evaluate(&report, &ReportType::Casualty, "")),
            vec![SuggestionType::Casevac]
        );
        assert_eq!(
            kinds(&c.evaluate(&report, &ReportType::Sitrep, "")),
            vec![SuggestionType::Casevac, SuggestionType::Eoincrep]
        );
        assert!(c.evaluate(&report, &ReportType::Logstat, "").is_empty());
    }

    #[test]
    fn explosive_fires_for_any_type() {
        let c = TriggerClassifier::new();
        for rt in [
            ReportType::Logstat,
            ReportType::Other("MEDREP".into()),
            ReportType::Frago,
        ] {
            let triggers = c.evaluate(&report_with(json!({})), &rt, "IED found at culvert");
            assert_eq!(kinds(&triggers), vec![SuggestionType::EoincrepEod]);
            assert_eq!(triggers[0].urgency, Urgency::High);
            assert_eq!(triggers[0].confidence, 0.85);
        }
    }

    #[test]
    fn explosive_compounds_fire_eod() {
        let c = TriggerClassifier::new();
        for text in [
            "landmine spotted on MSR",
            "VBIED parked at checkpoint",
            "antitank landmines ahead",
            "car-bomb threat",
            "Mines on MSR",
        ] {
            let triggers = c.evaluate(&report_with(json!({})), &ReportType::Logstat, text);
            assert_eq!(kinds(&triggers), vec![SuggestionType::EoincrepEod], "{text}");
        }
        let quiet = c.evaluate(&report_with(json!({})), &ReportType::Logstat, "fuel state green");
        assert!(quiet.is_empty());
    }

    #[test]
    fn bad_signal_does_not_block_other_rules() {
        let report = report_with(json!({"enemy_count": "lots", "casualties": {"n": 1}}));
        let triggers = TriggerClassifier::new().evaluate(
            &report,
            &ReportType::Sitrep,
            "enemy infantry, two wounded, possible mine",
        );
        assert_eq!(
            kinds(&triggers),
            vec![
                SuggestionType::Casevac,
                SuggestionType::Eoincrep,
                SuggestionType::EoincrepEod
            ]
        );
        assert_eq!(triggers[0].reason, "Potential casualties detected");
        assert_eq!(triggers[1].reason, "Enemy activity detected");
    }

    #[test]
    fn signals_accept_aliases_and_coerce() {
        let extras = json!({
            "casualty_count": 2.7,
            "enemyCount": "12",
            "vehicle_count": -1,
            "severity": "SEVERE",
            "description": 42
        });
        let s = Signals::from_extras(extras.as_object().unwrap());
        assert_eq!(s.casualties, 2);
        assert_eq!(s.enemy_count, 12);
        assert_eq!(s.vehicle_count, 0);
        assert_eq!(s.severity, "severe");
        assert_eq!(s.description, "42");
    }

    #[test]
    fn classify_stamps_pending_suggestions() {
        let report = report_with(json!({"casualties": 1}));
        let suggestions =
            TriggerClassifier::new().classify("rpt-7", &report, &ReportType::Casualty, "");
        assert_eq!(suggestions.len(), 1);
        let s = &suggestions[0];
        assert_eq!(s.status, SuggestionStatus::Pending);
        assert_eq!(s.source_reports.iter().collect::<Vec<_>>(), vec!["rpt-7"]);
    }
}
