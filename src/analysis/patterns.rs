use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::SentenceScore;

/// Verbs the detector ecosystem flags as characteristic of machine prose.
/// The scan produces diagnostic hints only; these never feed scoring.
const AI_VERB_PATTERNS: &[(&str, &str)] = &[
    ("reveals", r"(?i)\breveal(s|ed|ing)?\b"),
    ("showcases", r"(?i)\bshowcas(es|e|ed|ing)\b"),
    ("demonstrates", r"(?i)\bdemonstrat(es|e|ed|ing)\b"),
    ("highlights", r"(?i)\bhighlight(s|ed|ing)?\b"),
    ("underscores", r"(?i)\bunderscor(es|e|ed|ing)\b"),
    ("exemplifies", r"(?i)\bexemplif(ies|y|ied|ying)\b"),
    ("delves", r"(?i)\bdelv(es|e|ed|ing)\b"),
    ("fosters", r"(?i)\bfoster(s|ed|ing)?\b"),
    ("leverages", r"(?i)\bleverag(es|e|ed|ing)\b"),
    ("encompasses", r"(?i)\bencompass(es|ed|ing)?\b"),
];

static COMPILED_PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

fn compiled_patterns() -> &'static [(&'static str, Regex)] {
    COMPILED_PATTERNS.get_or_init(|| {
        AI_VERB_PATTERNS
            .iter()
            .map(|(name, pattern)| (*name, Regex::new(pattern).expect("static pattern")))
            .collect()
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternHit {
    pub pattern: String,
    pub sentence: String,
}

/// Scan the given (already worst-first) sentences against the verb
/// catalogue, returning up to `max_hits` matches.
pub fn scan_ai_patterns(sentences: &[SentenceScore], max_hits: usize) -> Vec<PatternHit> {
    let mut hits = Vec::new();
    for sentence in sentences {
        for (name, regex) in compiled_patterns() {
            if hits.len() >= max_hits {
                return hits;
            }
            if regex.is_match(&sentence.text) {
                hits.push(PatternHit {
                    pattern: (*name).to_string(),
                    sentence: sentence.text.clone(),
                });
            }
        }
    }
    hits
}
