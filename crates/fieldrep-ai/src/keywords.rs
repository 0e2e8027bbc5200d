//! Keyword sets used by the trigger rules.
//!
//! Matching is case-insensitive. Casualty and explosive sets match anywhere in
//! a word (`landmine`, `VBIED`); the enemy set is anchored at a word start, so
//! `contact` does not fire on `noncontact` chatter but `contacts` does.

use std::sync::LazyLock;

use regex::Regex;

/// Where a keyword may begin inside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    WordStart,
    Anywhere,
}

pub struct KeywordSet {
    name: &'static str,
    anchor: Anchor,
    words: &'static [&'static str],
    pattern: Regex,
}

impl KeywordSet {
    pub fn new(name: &'static str, anchor: Anchor, words: &'static [&'static str]) -> Self {
        // Longest first, so the reported hit is the most specific phrase.
        let mut sorted: Vec<&str> = words.to_vec();
        sorted.sort_by_key(|w| std::cmp::Reverse(w.len()));
        let alternation = sorted
            .iter()
            .map(|w| {
                w.split_whitespace()
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(r"\s+")
            })
            .collect::<Vec<_>>()
            .join("|");
        let prefix = match anchor {
            Anchor::WordStart => r"\b",
            Anchor::Anywhere => "",
        };
        let pattern = Regex::new(&format!(r"(?i){prefix}(?:{alternation})"))
            .unwrap_or_else(|e| panic!("keyword set {name}: {e}"));
        Self {
            name,
            anchor,
            words,
            pattern,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn anchor(&self) -> Anchor {
        self.anchor
    }

    pub fn words(&self) -> &'static [&'static str] {
        self.words
    }

    /// First keyword occurrence in `text`, as written there.
    pub fn first_match<'t>(&self, text: &'t str) -> Option<&'t str> {
        self.pattern.find(text).map(|m| m.as_str())
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// Hit in any of the given texts, reporting the first one found.
    pub fn first_match_in<'t>(&self, texts: &[&'t str]) -> Option<&'t str> {
        texts.iter().find_map(|t| self.first_match(t))
    }
}

pub static INJURY: LazyLock<KeywordSet> = LazyLock::new(|| {
    KeywordSet::new(
        "injury",
        Anchor::Anywhere,
        &[
            "wounded",
            "injured",
            "casualty",
            "casualties",
            "medevac",
            "kia",
            "killed",
            "wia",
            "gunshot",
            "bleeding",
            "critical",
        ],
    )
});

/// Injury words that escalate a casualty report straight to URGENT.
pub static URGENT_INJURY: LazyLock<KeywordSet> = LazyLock::new(|| {
    KeywordSet::new(
        "urgent_injury",
        Anchor::Anywhere,
        &["critical", "severe", "life-threatening", "kia", "killed"],
    )
});

pub static ENEMY: LazyLock<KeywordSet> = LazyLock::new(|| {
    KeywordSet::new(
        "enemy",
        Anchor::WordStart,
        &[
            "enemy",
            "hostile",
            "contact",
            "engagement",
            "patrol",
            "infantry",
            "armor",
            "artillery",
        ],
    )
});

pub static EXPLOSIVE: LazyLock<KeywordSet> = LazyLock::new(|| {
    KeywordSet::new(
        "explosive",
        Anchor::Anywhere,
        &[
            "ied",
            "mine",
            "unexploded",
            "booby trap",
            "explosive",
            "ordnance",
            "bomb",
            "explosive device",
        ],
    )
});
