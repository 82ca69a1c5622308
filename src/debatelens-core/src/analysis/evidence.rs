//! Local evidence-quality heuristic.
//!
//! Works without the LLM or retrieval; a retrieved `strong_evidence`
//! knowledge item only adds a bonus on top.

use std::sync::LazyLock;

use regex::Regex;

use crate::retrieval::RetrievedContext;

/// Phrases that signal an argument cites evidence.
pub const EVIDENCE_LEXICON: &[&str] = &[
    "according to",
    "study",
    "studies",
    "research",
    "data",
    "statistics",
    "statistic",
    "survey",
    "evidence",
    "percent",
    "report",
    "published",
    "journal",
    "peer-reviewed",
    "experiment",
    "analysis",
    "source",
];

pub const BASE_SCORE: f64 = 30.0;
pub const PER_INDICATOR: f64 = 15.0;
pub const NO_INDICATOR_PENALTY: f64 = 10.0;
pub const VERIFIED_BONUS: f64 = 10.0;

/// Knowledge subtype that earns the retrieval bonus.
pub const STRONG_EVIDENCE_KIND: &str = "strong_evidence";

static EVIDENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternatives = EVIDENCE_LEXICON
        .iter()
        .map(|phrase| regex::escape(phrase))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives)).expect("evidence lexicon regex")
});

/// Number of evidentiary phrase occurrences in `text`.
pub fn count_indicators(text: &str) -> usize {
    EVIDENCE_RE.find_iter(text).count()
}

pub fn has_indicator(text: &str) -> bool {
    EVIDENCE_RE.is_match(text)
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvidenceAssessment {
    pub indicators: usize,
    pub heuristic_score: f64,
    pub verified_by_retrieval: bool,
    pub score: f64,
    pub trace: Vec<String>,
}

/// Score the evidence in `content`, optionally verified against retrieved
/// knowledge.
pub fn assess_evidence(content: &str, retrieved: Option<&RetrievedContext>) -> EvidenceAssessment {
    let indicators = count_indicators(content);
    let mut trace = Vec::new();

    let mut heuristic = BASE_SCORE + PER_INDICATOR * indicators as f64;
    if indicators == 0 {
        heuristic -= NO_INDICATOR_PENALTY;
        trace.push(format!(
            "Evidence: no evidentiary phrases found, base {:.0} - {:.0} penalty",
            BASE_SCORE, NO_INDICATOR_PENALTY
        ));
    } else {
        trace.push(format!(
            "Evidence: {} evidentiary phrase(s) found, {:.0} + {:.0} x {}",
            indicators, BASE_SCORE, PER_INDICATOR, indicators
        ));
    }
    let heuristic_score = heuristic.clamp(0.0, 100.0);

    let verified_by_retrieval = retrieved.is_some_and(|context| {
        context
            .knowledge
            .iter()
            .any(|item| item.knowledge_kind() == Some(STRONG_EVIDENCE_KIND))
    });

    let score = if verified_by_retrieval {
        trace.push(format!(
            "Evidence: retrieved knowledge matches strong evidence, +{:.0}",
            VERIFIED_BONUS
        ));
        (heuristic_score + VERIFIED_BONUS).clamp(0.0, 100.0)
    } else {
        if retrieved.is_none() {
            trace.push("Evidence: retrieval unavailable, heuristic only".to_string());
        }
        heuristic_score
    };
    trace.push(format!("Evidence score: {:.1}", score));

    EvidenceAssessment {
        indicators,
        heuristic_score,
        verified_by_retrieval,
        score,
        trace,
    }
}
