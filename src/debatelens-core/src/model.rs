//! Records owned by the debate engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::debate_format::RoundConfig;
use crate::participant::{Participant, Side};

/// Score used wherever an AI-derived value is missing.
pub const NEUTRAL_SCORE: f64 = 50.0;

/// Lifecycle state of a debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DebateStatus {
    Waiting,
    Active,
    Completed,
    Cancelled,
}

impl DebateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebateStatus::Waiting => "waiting",
            DebateStatus::Active => "active",
            DebateStatus::Completed => "completed",
            DebateStatus::Cancelled => "cancelled",
        }
    }
}

/// A structured debate between two participants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debate {
    pub id: Uuid,
    pub topic: String,
    pub description: Option<String>,
    pub status: DebateStatus,
    pub rounds: Vec<RoundConfig>,
    /// 1-based; 0 until the debate starts.
    pub current_round: u32,
    /// User allowed to submit the next turn.
    pub current_turn_user: Option<String>,
    pub participants: Vec<Participant>,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Debate {
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    pub fn participant_for(&self, side: Side) -> Option<&Participant> {
        self.participants.iter().find(|p| p.side == side)
    }

    pub fn round(&self, number: u32) -> Option<&RoundConfig> {
        self.rounds.iter().find(|r| r.number == number)
    }

    pub fn total_rounds(&self) -> u32 {
        self.rounds.len() as u32
    }
}

/// A fallacy flagged in a turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Fallacy {
    /// Snake-case fallacy name, e.g. `ad_hominem`.
    #[serde(rename = "type")]
    pub kind: String,
    pub explanation: String,
    /// 1 to 10.
    pub severity: u8,
}

/// AI assessment of a single turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TurnAnalysis {
    pub claims: Vec<String>,
    pub rebuttals: Vec<String>,
    pub fallacies: Vec<Fallacy>,
    pub tone_score: f64,
    pub clarity_score: f64,
    pub evidence_quality: f64,
    pub overall_quality: f64,
    /// Ordered reasoning steps behind every score.
    pub decision_trace: Vec<String>,
    /// Provenance labels of the snippets injected into prompts.
    pub retrieved_sources: Vec<String>,
    pub analyzed_at: DateTime<Utc>,
}

/// Where a turn's analysis stands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AnalysisStatus {
    Pending,
    Complete(Box<TurnAnalysis>),
    Failed { reason: String },
}

/// A single argument submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub debate_id: Uuid,
    pub round: u32,
    pub turn_number: u32,
    pub author: String,
    pub side: Side,
    pub content: String,
    pub word_count: usize,
    pub analysis: AnalysisStatus,
    pub submitted_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(
        debate_id: Uuid,
        round: u32,
        turn_number: u32,
        author: impl Into<String>,
        side: Side,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            debate_id,
            round,
            turn_number,
            author: author.into(),
            side,
            word_count: word_count(&content),
            content,
            analysis: AnalysisStatus::Pending,
            submitted_at: Utc::now(),
        }
    }

    /// The completed analysis, if any.
    pub fn analysis(&self) -> Option<&TurnAnalysis> {
        match &self.analysis {
            AnalysisStatus::Complete(analysis) => Some(analysis),
            _ => None,
        }
    }

    pub fn overall_quality_or_neutral(&self) -> f64 {
        self.analysis()
            .map(|a| a.overall_quality)
            .unwrap_or(NEUTRAL_SCORE)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// An audience vote for one round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateVote {
    pub debate_id: Uuid,
    pub round: u32,
    pub voter: String,
    pub vote: Side,
    /// 1 to 5.
    pub confidence: u8,
    pub cast_at: DateTime<Utc>,
}

/// Percentage weights applied to the four score components.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScoringWeights {
    pub argument_quality: f64,
    pub rebuttal_effectiveness: f64,
    pub conduct_clarity: f64,
    pub audience_support: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            argument_quality: 40.0,
            rebuttal_effectiveness: 25.0,
            conduct_clarity: 15.0,
            audience_support: 20.0,
        }
    }
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.argument_quality
            + self.rebuttal_effectiveness
            + self.conduct_clarity
            + self.audience_support
    }
}

/// Component scores for one side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct SideScore {
    pub argument_quality: f64,
    pub rebuttal_effectiveness: f64,
    pub conduct_clarity: f64,
    pub audience_support: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RoundScore {
    pub round: u32,
    #[serde(rename = "for")]
    pub for_side: f64,
    pub against: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    For,
    Against,
    Draw,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrongestArgument {
    pub turn_id: Uuid,
    pub turn_number: u32,
    pub author: String,
    pub excerpt: String,
    pub quality: f64,
}

/// A claim the opposing side never answered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MissedRebuttal {
    /// Side that left the claim unanswered.
    pub missed_by: Side,
    pub claim: String,
    pub turn_number: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum KeyMomentKind {
    StrongArgument,
    MultipleFallacies,
}

impl KeyMomentKind {
    pub fn label(&self) -> &'static str {
        match self {
            KeyMomentKind::StrongArgument => "strong argument",
            KeyMomentKind::MultipleFallacies => "multiple fallacies",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyMoment {
    pub turn_number: u32,
    pub round: u32,
    pub side: Side,
    pub author: String,
    /// Every reason the turn stood out, strong argument first.
    pub kinds: Vec<KeyMomentKind>,
    pub quality: f64,
}

impl KeyMoment {
    pub fn label(&self) -> String {
        self.kinds
            .iter()
            .map(KeyMomentKind::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateInsights {
    pub strongest_argument_for: Option<StrongestArgument>,
    pub strongest_argument_against: Option<StrongestArgument>,
    pub missed_rebuttals: Vec<MissedRebuttal>,
    pub key_moments: Vec<KeyMoment>,
    pub overall_analysis: String,
}

/// Final, immutable outcome of a completed debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateScore {
    pub debate_id: Uuid,
    #[serde(rename = "for")]
    pub for_side: SideScore,
    pub against: SideScore,
    pub round_scores: Vec<RoundScore>,
    pub insights: DebateInsights,
    pub winner: Winner,
    pub confidence: f64,
    pub weights: ScoringWeights,
    pub vote_count: usize,
    pub scored_at: DateTime<Utc>,
}

/// Category of a curated knowledge item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeCategory {
    Fallacy,
    Evidence,
    Technique,
    Logic,
    Rhetoric,
    Concept,
}

impl KnowledgeCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeCategory::Fallacy => "fallacy",
            KnowledgeCategory::Evidence => "evidence",
            KnowledgeCategory::Technique => "technique",
            KnowledgeCategory::Logic => "logic",
            KnowledgeCategory::Rhetoric => "rhetoric",
            KnowledgeCategory::Concept => "concept",
        }
    }
}

/// Immutable reference fact used for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeItem {
    pub id: String,
    pub text: String,
    pub category: KnowledgeCategory,
    /// Subtype tag such as `ad_hominem` or `strong_evidence`.
    pub kind: String,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryMetadata {
    pub topic: String,
    pub side: Side,
    pub round: u32,
    pub quality: f64,
}

/// Snapshot of a past turn kept for retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebateMemoryEntry {
    pub turn_id: Uuid,
    pub debate_id: Uuid,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: MemoryMetadata,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_word_count_is_derived() {
        let turn = Turn::new(Uuid::new_v4(), 1, 1, "alice", Side::For, "  one two\nthree  ");
        assert_eq!(turn.word_count, 3);
        assert!(turn.analysis().is_none());
        assert_eq!(turn.overall_quality_or_neutral(), NEUTRAL_SCORE);
    }

    #[test]
    fn test_default_weights_sum_to_hundred() {
        assert_eq!(ScoringWeights::default().sum(), 100.0);
    }

    #[test]
    fn test_fallacy_serializes_type_field() {
        let fallacy = Fallacy {
            kind: "straw_man".to_string(),
            explanation: "misrepresents".to_string(),
            severity: 4,
        };
        let json = serde_json::to_value(&fallacy).unwrap();
        assert_eq!(json["type"], "straw_man");
    }
}
