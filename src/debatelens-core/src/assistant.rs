//! Live draft assistant.
//!
//! Gives feedback while a participant is still typing. Everything here is
//! pattern matching plus read-only knowledge retrieval; the LLM is never
//! called, so feedback stays well under interactive latency.

use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::{Duration, Instant};

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::analysis::evidence;
use crate::config::AssistantConfig;
use crate::retrieval::{RetrievalOptions, RetrievalOrchestrator, RetrievalSource, truncate_chars};

const MAX_TIPS: usize = 2;
const TIP_MIN_SIMILARITY: f32 = 0.15;
/// Absolute quantifiers tolerated before warning.
const ABSOLUTE_THRESHOLD: usize = 2;

static AD_HOMINEM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\byou(?:'re|\s+are|r|\s+sound\s+like|\s+must\s+be)?\b[\w\s,']{0,30}?\b(?:idiot|idiotic|stupid|moron|fool|foolish|ignorant|dumb|liar|clueless|pathetic|incompetent|delusional)\b",
    )
    .expect("ad hominem regex")
});

static EMOTIONAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:think of the children|how would you feel|heartbreaking|outrageous|disgusting|terrifying|shameful|horrifying|devastating|sickening)\b",
    )
    .expect("emotional appeal regex")
});

static ABSOLUTE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:all|never|always|everyone|everybody|nobody|no one|none|every)\b")
        .expect("absolute quantifier regex")
});

static REBUTTAL_SIGNAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:however|but|disagree|contrary|although|counter|opponent|claims?|argued|incorrect|wrong|overlooks?|ignores?)\b",
    )
    .expect("rebuttal signal regex")
});

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

/// A likely problem in the draft.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftWarning {
    /// Snake-case label, e.g. `ad_hominem`.
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    RebuttalOpportunity,
    AddEvidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftSuggestion {
    pub kind: SuggestionKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Analyzed,
    /// Too soon after the previous analysis for this user and debate.
    Throttled,
    /// Draft below the minimum length.
    TooShort,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DraftFeedback {
    pub status: FeedbackStatus,
    pub warnings: Vec<DraftWarning>,
    pub suggestions: Vec<DraftSuggestion>,
    /// Related reference knowledge.
    pub tips: Vec<String>,
}

impl DraftFeedback {
    fn empty(status: FeedbackStatus) -> Self {
        Self {
            status,
            warnings: Vec::new(),
            suggestions: Vec::new(),
            tips: Vec::new(),
        }
    }
}

/// A draft being composed.
#[derive(Debug, Clone)]
pub struct DraftRequest {
    pub debate_id: Uuid,
    pub user_id: String,
    pub draft: String,
    /// The opponent's most recent turn, if they have spoken.
    pub opponent_latest: Option<String>,
}

/// Throttled, LLM-free feedback on in-progress drafts.
pub struct DraftAssistant {
    retrieval: Option<Arc<RetrievalOrchestrator>>,
    settings: AssistantConfig,
    last_run: Mutex<HashMap<(Uuid, String), Instant>>,
}

impl DraftAssistant {
    pub fn new(retrieval: Option<Arc<RetrievalOrchestrator>>, settings: AssistantConfig) -> Self {
        Self {
            retrieval,
            settings,
            last_run: Mutex::new(HashMap::new()),
        }
    }

    pub async fn analyze_draft(&self, request: &DraftRequest) -> DraftFeedback {
        let draft = request.draft.trim();
        if draft.chars().count() < self.settings.min_draft_chars {
            return DraftFeedback::empty(FeedbackStatus::TooShort);
        }
        if !self.admit(request.debate_id, &request.user_id, self.settings.throttle()) {
            return DraftFeedback::empty(FeedbackStatus::Throttled);
        }

        let mut feedback = DraftFeedback {
            status: FeedbackStatus::Analyzed,
            warnings: detect_warnings(draft),
            suggestions: self.suggestions(draft, request.opponent_latest.as_deref()),
            tips: Vec::new(),
        };
        feedback.tips = self.tips(draft).await;
        feedback
    }

    /// Record a run for (debate, user) unless one happened within `interval`.
    fn admit(&self, debate_id: Uuid, user_id: &str, interval: Duration) -> bool {
        let now = Instant::now();
        let mut last_run = match self.last_run.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Entries past the interval no longer throttle anyone.
        last_run.retain(|_, previous| now.duration_since(*previous) < interval);
        let key = (debate_id, user_id.to_string());
        if let Some(previous) = last_run.get(&key) {
            if now.duration_since(*previous) < interval {
                return false;
            }
        }
        last_run.insert(key, now);
        true
    }

    fn suggestions(&self, draft: &str, opponent_latest: Option<&str>) -> Vec<DraftSuggestion> {
        let mut suggestions = Vec::new();

        if let Some(point) = opponent_latest.map(str::trim).filter(|p| !p.is_empty()) {
            if !REBUTTAL_SIGNAL_RE.is_match(draft) {
                suggestions.push(DraftSuggestion {
                    kind: SuggestionKind::RebuttalOpportunity,
                    message: format!(
                        "Your opponent argued: \"{}\". Consider responding to it directly.",
                        truncate_chars(point, 80)
                    ),
                });
            }
        }

        if draft.chars().count() > self.settings.evidence_nudge_chars
            && !evidence::has_indicator(draft)
        {
            suggestions.push(DraftSuggestion {
                kind: SuggestionKind::AddEvidence,
                message: "Consider backing your argument with evidence: a study, data or a named source."
                    .to_string(),
            });
        }

        suggestions
    }

    async fn tips(&self, draft: &str) -> Vec<String> {
        let Some(retrieval) = &self.retrieval else {
            return Vec::new();
        };
        let options = RetrievalOptions {
            sources: vec![RetrievalSource::Knowledge],
            top_k: MAX_TIPS,
            debate_id: None,
            min_similarity: TIP_MIN_SIMILARITY,
        };
        retrieval
            .retrieve_context(draft, &options)
            .await
            .knowledge
            .into_iter()
            .map(|item| item.content)
            .collect()
    }
}

/// Pattern-based warnings for a draft.
pub fn detect_warnings(draft: &str) -> Vec<DraftWarning> {
    let mut warnings = Vec::new();

    if AD_HOMINEM_RE.is_match(draft) {
        warnings.push(DraftWarning {
            kind: "ad_hominem".to_string(),
            message: "This attacks your opponent rather than their argument.".to_string(),
            severity: Severity::High,
        });
    }

    if EMOTIONAL_RE.is_match(draft) {
        warnings.push(DraftWarning {
            kind: "appeal_to_emotion".to_string(),
            message: "Emotional language may read as a substitute for reasoning.".to_string(),
            severity: Severity::Medium,
        });
    }

    let absolutes = ABSOLUTE_RE.find_iter(draft).count();
    if absolutes >= ABSOLUTE_THRESHOLD {
        warnings.push(DraftWarning {
            kind: "absolute_language".to_string(),
            message: format!(
                "{} absolute terms (all, never, everyone...) make claims easy to refute.",
                absolutes
            ),
            severity: Severity::Low,
        });
    }

    warnings
}
