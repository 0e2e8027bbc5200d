//! Rule-based field extraction from free-form field text.
//!
//! Each extractor looks for one field with a small set of regexes. The result
//! is a [`RuleDraft`] that remembers which fields were actually found, so the
//! normalizer can decide whether model assistance is worth a call.

use std::sync::LazyLock;

use fieldrep_core::report::{DEFAULT_ACTION, DEFAULT_TIMEFRAME, UNKNOWN_SOLDIER, UNKNOWN_UNIT};
use fieldrep_core::{Coordinates, Priority};
use regex::Regex;
use serde_json::{Map, Value, json};

/// Verbs recognised as the report's action, in lowercase.
pub const ACTION_VERBS: &[&str] = &[
    "advance", "attack", "evacuate", "hold", "defend", "secure", "move", "withdraw", "retreat",
    "support", "occupy", "protect",
];

const UNIT_TYPES: &str = "Squad|Team|Platoon|Company|Unit|Section|Battery";

/// Words that are capitalised at sentence start or in shouted traffic but are
/// never unit names.
const STOPWORDS: &[&str] = &[
    // Filler and sentence starters.
    "a", "an", "and", "or", "the", "this", "that", "these", "those", "we", "i", "our", "us",
    "they", "their", "it", "is", "are", "be", "to", "of", "in", "on", "at", "by", "for", "from",
    "with", "all", "any", "no", "not", "do", "out", "over", "roger", "copy", "please", "request",
    "requesting", "report", "send", "sending", "enemy", "contact", "time", "grid", "objective",
    "command",
    // Modal and cue words.
    "need", "needs", "must", "should", "will", "shall", "can", "may", "ordered",
    // Priority and time words.
    "high", "medium", "low", "urgent", "critical", "routine", "priority", "asap", "immediately",
    "zulu", "tomorrow", "today", "tonight", "now",
    // Labels.
    "position", "coords", "coordinates", "call", "sign", "id", "sid", "soldier", "mission",
    "missionid",
    // Action-ish words that are not unit names.
    "maintain", "execute", "providing", "proceed", "moving",
];

static UNIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"\b([A-Z][A-Za-z]*)\s+({UNIT_TYPES})\b")).unwrap()
});
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-z0-9]+").unwrap());

const PAIR: &str = r"([-+]?\d+\.\d+)(?:\s*[,;]\s*|\s+)([-+]?\d+\.\d+)";
static LABELLED_PAIR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:coord(?:inate)?s?|position|pos|at)\b[\s:=(\[]*{PAIR}"
    ))
    .unwrap()
});
static PAIR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(PAIR).unwrap());

static MODAL_ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:needs?\s+to|must|should|will|shall|ordered\s+to)\s+({})\b",
        ACTION_VERBS.join("|")
    ))
    .unwrap()
});
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)\b({})\b", ACTION_VERBS.join("|"))).unwrap()
});

static HIGH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:urgent|critical|high)\b").unwrap());
static LOW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:low|routine)\b").unwrap());

static ZULU_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(\d{3,4})\s*Z\b").unwrap());
static TOMORROW_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:tomorrow|tmrw)\b").unwrap());
static IMMEDIATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:asap|immediately)\b").unwrap());

static SOLDIER_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:Soldier[\s_-]*ID|SID|ID|Soldier)\s*[:=]\s*([A-Za-z0-9_-]+)").unwrap()
});
// An unlabelled value may follow a linking verb: "call sign is EAGLE1".
static CALL_SIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bcall[- ]?sign\s*[:=]?\s*(?:(?:is|was)\s+)?([A-Za-z0-9_-]+)").unwrap()
});
static MISSION_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bmission[- ]?id\s*[:=]?\s*(?:(?:is|was)\s+)?([A-Za-z0-9_-]+)").unwrap()
});

/// Fields recovered from text by rules alone. `None` / empty means not found.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleDraft {
    pub action: Option<String>,
    pub target_units: Vec<String>,
    pub coordinates: Option<Coordinates>,
    pub timeframe: Option<String>,
    pub priority: Option<Priority>,
    pub soldier_id: Option<String>,
    pub radio_call_sign: Option<String>,
    pub mission_id: Option<String>,
}

impl RuleDraft {
    pub fn extract(text: &str) -> Self {
        let text = collapse_whitespace(text);
        Self {
            action: extract_action(&text),
            target_units: extract_units(&text),
            coordinates: extract_coordinates(&text),
            timeframe: extract_timeframe(&text),
            priority: extract_priority(&text),
            soldier_id: extract_soldier_id(&text),
            radio_call_sign: extract_call_sign(&text),
            mission_id: extract_mission_id(&text),
        }
    }

    /// Both an action and at least one unit were found in the text.
    pub fn is_complete(&self) -> bool {
        self.action.is_some() && !self.target_units.is_empty()
    }

    /// Candidate object with defaults filled in, ready for validation or to be
    /// used as the model's template.
    pub fn to_candidate(&self) -> Map<String, Value> {
        let units = if self.target_units.is_empty() {
            vec![UNKNOWN_UNIT.to_string()]
        } else {
            self.target_units.clone()
        };
        let coords = self.coordinates.unwrap_or_default();

        let mut extras = Map::new();
        if let Some(id) = &self.mission_id {
            extras.insert("mission_info".into(), json!({ "mission_id": id }));
        }

        let mut candidate = Map::new();
        candidate.insert(
            "action".into(),
            json!(self.action.as_deref().unwrap_or(DEFAULT_ACTION)),
        );
        candidate.insert("target_units".into(), json!(units));
        candidate.insert("coordinates".into(), json!({ "x": coords.x, "y": coords.y }));
        candidate.insert(
            "timeframe".into(),
            json!(self.timeframe.as_deref().unwrap_or(DEFAULT_TIMEFRAME)),
        );
        candidate.insert(
            "priority".into(),
            json!(self.priority.unwrap_or_default().as_str()),
        );
        candidate.insert(
            "soldier_id".into(),
            json!(self.soldier_id.as_deref().unwrap_or(UNKNOWN_SOLDIER)),
        );
        candidate.insert("radio_call_sign".into(), json!(self.radio_call_sign));
        candidate.insert("extras".into(), Value::Object(extras));
        candidate
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_stopword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    STOPWORDS.contains(&lower.as_str()) || ACTION_VERBS.contains(&lower.as_str())
}

/// `<Name> <UnitType>` phrases, falling back to capitalised words.
pub fn extract_units(text: &str) -> Vec<String> {
    let mut units: Vec<String> = Vec::new();
    for caps in UNIT_RE.captures_iter(text) {
        // "Support Company" is a unit, "The Team" is not.
        if STOPWORDS.contains(&caps[1].to_ascii_lowercase().as_str()) {
            continue;
        }
        let unit = format!("{} {}", &caps[1], &caps[2]);
        if !units.contains(&unit) {
            units.push(unit);
        }
    }
    if units.is_empty() {
        units = capitalised_names(text);
    }
    units
}

/// Runs of adjacent capitalised words, chunked into bigrams. Acronyms, words
/// with digits and stopwords break a run.
fn capitalised_names(text: &str) -> Vec<String> {
    let mut runs: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut prev_end = 0;

    for m in WORD_RE.find_iter(text) {
        let word = m.as_str();
        let adjacent = text[prev_end..m.start()].chars().all(char::is_whitespace);
        prev_end = m.end();

        let qualifies = word.len() >= 2
            && word.starts_with(|c: char| c.is_ascii_uppercase())
            && !word.chars().any(|c| c.is_ascii_digit())
            && !word.chars().all(|c| c.is_ascii_uppercase())
            && !is_stopword(word);

        if (!qualifies || !adjacent) && !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
        if qualifies {
            current.push(word);
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }

    let mut names: Vec<String> = Vec::new();
    for run in runs {
        for chunk in run.chunks(2) {
            let name = chunk.join(" ");
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Decimal pair, preferring one introduced by a position label.
pub fn extract_coordinates(text: &str) -> Option<Coordinates> {
    let caps = LABELLED_PAIR_RE
        .captures(text)
        .or_else(|| PAIR_RE.captures(text))?;
    let x: f64 = caps[1].parse().ok()?;
    let y: f64 = caps[2].parse().ok()?;
    (x.is_finite() && y.is_finite()).then(|| Coordinates::new(x, y))
}

/// Verb following a modal cue, else the first known verb anywhere.
pub fn extract_action(text: &str) -> Option<String> {
    MODAL_ACTION_RE
        .captures(text)
        .or_else(|| ACTION_RE.captures(text))
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// High words win over low words; neither means the default applies.
pub fn extract_priority(text: &str) -> Option<Priority> {
    if HIGH_RE.is_match(text) {
        Some(Priority::High)
    } else if LOW_RE.is_match(text) {
        Some(Priority::Low)
    } else {
        None
    }
}

pub fn extract_timeframe(text: &str) -> Option<String> {
    let tomorrow = TOMORROW_RE.is_match(text);
    if let Some(caps) = ZULU_RE.captures(text) {
        let time = format!("{}Z", &caps[1]);
        return Some(if tomorrow {
            format!("{time} (tomorrow)")
        } else {
            time
        });
    }
    if IMMEDIATE_RE.is_match(text) {
        Some("immediate".to_string())
    } else if tomorrow {
        Some("tomorrow".to_string())
    } else {
        None
    }
}

/// A bare `ID:` label belongs to the soldier unless it is a mission's.
pub fn extract_soldier_id(text: &str) -> Option<String> {
    SOLDIER_ID_RE
        .captures_iter(text)
        .find(|c| c.get(0).is_some_and(|m| !labels_mission(&text[..m.start()])))
        .map(|c| c[1].to_string())
}

fn labels_mission(before: &str) -> bool {
    before
        .trim_end_matches(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .to_ascii_lowercase()
        .ends_with("mission")
}

pub fn extract_call_sign(text: &str) -> Option<String> {
    CALL_SIGN_RE.captures(text).map(|c| c[1].to_string())
}

pub fn extract_mission_id(text: &str) -> Option<String> {
    MISSION_ID_RE.captures(text).map(|c| c[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHA: &str = "Alpha Squad needs to advance to position ASAP at coords 123.456, 789.012";

    #[test]
    fn unit_phrases() {
        assert_eq!(extract_units(ALPHA), vec!["Alpha Squad"]);
        assert_eq!(
            extract_units("Bravo Team and Charlie Platoon hold; Bravo Team report"),
            vec!["Bravo Team", "Charlie Platoon"]
        );
    }

    #[test]
    fn unit_fallback_to_capitalised_names() {
        assert_eq!(
            extract_units("Alpha team needs 2 move. Bravo & Charlie providing backup"),
            vec!["Alpha", "Bravo", "Charlie"]
        );
        // Acronyms and digit-bearing tokens are not names.
        assert!(extract_units("THIS IS URGENT, ID:A123 EAGLE1").is_empty());
    }

    #[test]
    fn coordinates_prefer_labelled_pair() {
        assert_eq!(
            extract_coordinates("grid 1.0 2.0 then at coords 123.456, 789.012"),
            Some(Coordinates::new(123.456, 789.012))
        );
        assert_eq!(
            extract_coordinates("(123.45, 678.90)"),
            Some(Coordinates::new(123.45, 678.90))
        );
        assert_eq!(
            extract_coordinates("pos -12.5; 40.25"),
            Some(Coordinates::new(-12.5, 40.25))
        );
        assert_eq!(extract_coordinates("grid 12 34"), None);
    }

    #[test]
    fn action_after_modal_cue() {
        assert_eq!(extract_action(ALPHA).as_deref(), Some("advance"));
        assert_eq!(
            extract_action("Hold here, we must withdraw").as_deref(),
            Some("withdraw")
        );
        assert_eq!(extract_action("Hold the bridge").as_deref(), Some("hold"));
        assert_eq!(extract_action("nothing to see"), None);
    }

    #[test]
    fn priority_words() {
        assert_eq!(extract_priority("THIS IS URGENT"), Some(Priority::High));
        assert_eq!(extract_priority("routine but critical"), Some(Priority::High));
        assert_eq!(extract_priority("routine resupply"), Some(Priority::Low));
        assert_eq!(extract_priority("resupply"), None);
        // Word boundaries: "highway" is not "high".
        assert_eq!(extract_priority("via the highway"), None);
    }

    #[test]
    fn timeframes() {
        assert_eq!(extract_timeframe("move at 0800Z").as_deref(), Some("0800Z"));
        assert_eq!(
            extract_timeframe("Execute tomorrow 0800 Z").as_deref(),
            Some("0800Z (tomorrow)")
        );
        assert_eq!(extract_timeframe("asap").as_deref(), Some("immediate"));
        assert_eq!(extract_timeframe("go tmrw").as_deref(), Some("tomorrow"));
        assert_eq!(extract_timeframe("whenever"), None);
    }

    #[test]
    fn labelled_fields() {
        let text = "ID:A123 Call Sign: EAGLE1 MissionID=OP-45";
        assert_eq!(extract_soldier_id(text).as_deref(), Some("A123"));
        assert_eq!(extract_call_sign(text).as_deref(), Some("EAGLE1"));
        assert_eq!(extract_mission_id(text).as_deref(), Some("OP-45"));
        assert_eq!(extract_soldier_id("Soldier wounded"), None);
    }

    #[test]
    fn mission_id_label_is_not_a_soldier_id() {
        assert_eq!(extract_soldier_id("Alpha Squad hold. Mission ID: OP-45"), None);
        assert_eq!(extract_soldier_id("mission-ID=OP-45"), None);
        assert_eq!(
            extract_soldier_id("Mission ID: OP-45, Soldier ID: B77").as_deref(),
            Some("B77")
        );
        assert_eq!(extract_mission_id("Mission ID: OP-45").as_deref(), Some("OP-45"));
    }

    #[test]
    fn linking_verb_is_skipped() {
        assert_eq!(extract_call_sign("call sign is EAGLE1").as_deref(), Some("EAGLE1"));
        assert_eq!(extract_call_sign("callsign ISLAND7").as_deref(), Some("ISLAND7"));
        assert_eq!(extract_mission_id("mission id was OP-9").as_deref(), Some("OP-9"));
    }

    #[test]
    fn draft_completeness() {
        let draft = RuleDraft::extract(ALPHA);
        assert!(draft.is_complete());
        assert_eq!(draft.priority, None);
        assert_eq!(draft.timeframe.as_deref(), Some("immediate"));

        let sparse = RuleDraft::extract("(123.45, 678.90)");
        assert!(!sparse.is_complete());
        assert_eq!(sparse.coordinates, Some(Coordinates::new(123.45, 678.90)));
    }

    #[test]
    fn candidate_fills_defaults() {
        let candidate = RuleDraft::extract("MissionID: OP45").to_candidate();
        assert_eq!(candidate["action"], "move");
        assert_eq!(candidate["target_units"], json!(["Unknown"]));
        assert_eq!(candidate["priority"], "MEDIUM");
        assert_eq!(candidate["soldier_id"], "UNKNOWN");
        assert!(candidate["radio_call_sign"].is_null());
        assert_eq!(candidate["extras"]["mission_info"]["mission_id"], "OP45");
    }

    #[test]
    fn newlines_do_not_split_phrases() {
        let draft = RuleDraft::extract("Alpha\nSquad\n\nhold");
        assert_eq!(draft.target_units, vec!["Alpha Squad"]);
        assert_eq!(draft.action.as_deref(), Some("hold"));
    }
}
