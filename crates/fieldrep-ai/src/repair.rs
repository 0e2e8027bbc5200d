//! JSON recovery for structured-looking field messages.
//!
//! Devices and operators often send something that is almost JSON: Python
//! literals, single quotes, bare keys, trailing commas, or an object buried in
//! chatter. The helpers here back the first two normalizer stages.

use std::sync::LazyLock;

use fieldrep_core::ParseError;
use regex::Regex;
use serde_json::{Map, Value};

/// A `key: value` token, optionally with a quoted key.
static KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""?\w+"?\s*:\s*"#).unwrap());

/// Cheap test for whether the direct-parse stage should run at all.
pub fn looks_like_json(text: &str) -> bool {
    let s = text.trim();
    s.starts_with('{') || s.starts_with('[') || KEY_VALUE_RE.is_match(s)
}

/// Strict parse. A non-object top-level value is wrapped as `{"data": value}`.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            Ok(map)
        }
    }
}

/// Stage 1: strict parse of JSON-ish text.
pub fn direct_parse(text: &str) -> Result<Map<String, Value>, ParseError> {
    if !looks_like_json(text) {
        return Err(ParseError::NoCandidate);
    }
    parse_object(text)
}

/// Stage 2: heuristic repair, then the first balanced `{...}` block alone.
pub fn repaired_parse(text: &str) -> Result<Map<String, Value>, ParseError> {
    let text = text.trim();
    if !looks_like_json(text) && !text.contains('{') {
        return Err(ParseError::NoCandidate);
    }
    parse_object(&repair_json(text)).or_else(|_| {
        let block = first_balanced_braces(text).ok_or(ParseError::NoCandidate)?;
        parse_object(block).or_else(|_| parse_object(&repair_json(block)))
    })
}

/// Pull a JSON object out of free text returned by a model.
pub fn extract_object(text: &str) -> Result<Map<String, Value>, ParseError> {
    let block = first_balanced_braces(text).ok_or(ParseError::NoCandidate)?;
    parse_object(block).or_else(|_| parse_object(&repair_json(block)))
}

/// First substring whose braces balance, found by a depth scan.
///
/// Braces inside double-quoted strings of the candidate do not count.
pub fn first_balanced_braces(s: &str) -> Option<&str> {
    let mut start = None;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in s.char_indices() {
        if start.is_some() && in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' if start.is_some() => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return start.map(|st| &s[st..=i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Rewrite common near-JSON mistakes outside string literals:
/// single-quoted strings, bare keys after `{` or `,`, trailing commas before
/// `}`/`]`, and Python `None`/`True`/`False`.
pub fn repair_json(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    // Last non-whitespace character emitted outside a string.
    let mut last_sig: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            '"' => {
                let end = scan_string(&chars, i, '"');
                out.extend(&chars[i..end]);
                if end > i + 1 && chars[end - 1] == '"' {
                    last_sig = Some('"');
                }
                i = end;
            }
            '\'' => {
                let end = scan_string(&chars, i, '\'');
                if end > i + 1 && chars[end - 1] == '\'' {
                    out.push('"');
                    let mut j = i + 1;
                    while j < end - 1 {
                        match chars[j] {
                            '\\' if j + 1 < end - 1 && chars[j + 1] == '\'' => {
                                out.push('\'');
                                j += 2;
                                continue;
                            }
                            '"' => out.push_str("\\\""),
                            c => out.push(c),
                        }
                        j += 1;
                    }
                    out.push('"');
                    last_sig = Some('"');
                    i = end;
                } else {
                    // Unterminated: an apostrophe, not a string.
                    out.push(ch);
                    i += 1;
                }
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(ch);
                    last_sig = Some(ch);
                }
                i += 1;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len()
                    && (chars[end].is_ascii_alphanumeric() || chars[end] == '_' || chars[end] == '-')
                {
                    end += 1;
                }
                let ident: String = chars[i..end].iter().collect();
                let next = chars[end..].iter().find(|c| !c.is_whitespace());
                let key_position = matches!(last_sig, Some('{') | Some(','));

                if key_position && next == Some(&':') {
                    out.push('"');
                    out.push_str(&ident);
                    out.push('"');
                } else {
                    out.push_str(match ident.as_str() {
                        "None" => "null",
                        "True" => "true",
                        "False" => "false",
                        other => other,
                    });
                }
                last_sig = Some(chars[end - 1]);
                i = end;
            }
            c => {
                out.push(c);
                if !c.is_whitespace() {
                    last_sig = Some(c);
                }
                i += 1;
            }
        }
    }
    out
}

/// Index one past the closing `quote` of the string starting at `start`, or
/// the end of input when unterminated.
fn scan_string(chars: &[char], start: usize, quote: char) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_detection() {
        assert!(looks_like_json("  {\"action\": \"hold\"}"));
        assert!(looks_like_json("[1, 2]"));
        assert!(looks_like_json("Call Sign: EAGLE1"));
        assert!(!looks_like_json("Alpha Squad hold the bridge"));
    }

    #[test]
    fn non_object_is_wrapped() {
        let map = parse_object("[1, 2]").unwrap();
        assert_eq!(map["data"], json!([1, 2]));
    }

    #[test]
    fn direct_parse_skips_prose() {
        assert_eq!(
            direct_parse("hold the bridge"),
            Err(ParseError::NoCandidate)
        );
    }

    #[test]
    fn python_style_dict_is_repaired() {
        let text = "{'action': 'hold', 'priority': 'HIGH', 'radio_call_sign': None, 'ok': True,}";
        let map = repaired_parse(text).unwrap();
        assert_eq!(map["action"], json!("hold"));
        assert_eq!(map["priority"], json!("HIGH"));
        assert_eq!(map["radio_call_sign"], Value::Null);
        assert_eq!(map["ok"], json!(true));
    }

    #[test]
    fn bare_keys_are_quoted() {
        let map = repaired_parse("{action: \"advance\", target_units: [\"Alpha\",],}").unwrap();
        assert_eq!(map["action"], json!("advance"));
        assert_eq!(map["target_units"], json!(["Alpha"]));
    }

    #[test]
    fn literals_inside_strings_are_untouched() {
        let repaired = repair_json(r#"{"note": "True story, None left", "x": False}"#);
        let map = parse_object(&repaired).unwrap();
        assert_eq!(map["note"], json!("True story, None left"));
        assert_eq!(map["x"], json!(false));
    }

    #[test]
    fn double_quotes_inside_single_quoted_string() {
        let map = repaired_parse(r#"{'note': 'he said "go"'}"#).unwrap();
        assert_eq!(map["note"], json!("he said \"go\""));
    }

    #[test]
    fn embedded_object_is_extracted() {
        let text = "Sending now: {\"action\": \"hold\", \"coordinates\": {\"x\": 1.0, \"y\": 2.0}} over.";
        let map = repaired_parse(text).unwrap();
        assert_eq!(map["action"], json!("hold"));
        assert_eq!(map["coordinates"]["y"], json!(2.0));
    }

    #[test]
    fn balanced_scan_ignores_braces_in_strings() {
        let text = r#"noise {"a": "}{", "b": {"c": 1}} trailing }"#;
        assert_eq!(
            first_balanced_braces(text),
            Some(r#"{"a": "}{", "b": {"c": 1}}"#)
        );
        assert_eq!(first_balanced_braces("no braces"), None);
        assert_eq!(first_balanced_braces("{ never closed"), None);
    }

    #[test]
    fn extract_object_from_model_chatter() {
        let reply = "Here is the JSON:\n{'action': 'evacuate', 'priority': 'HIGH'}\nDone.";
        let map = extract_object(reply).unwrap();
        assert_eq!(map["action"], json!("evacuate"));
        assert!(extract_object("I cannot help with that.").is_err());
    }

    #[test]
    fn unrepairable_text_fails() {
        assert!(repaired_parse("Call Sign: EAGLE1 and Alpha Squad moving").is_err());
    }
}
