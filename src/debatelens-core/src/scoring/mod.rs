//! Round and debate scoring.
//!
//! Folds a completed debate's turn analyses and audience votes into a
//! [`DebateScore`]. Everything except the closing narrative is deterministic
//! arithmetic; the narrative is one best-effort LLM call.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::analysis::prompts::NARRATIVE_SYSTEM_PROMPT;
use crate::llm::{CompletionClient, CompletionOptions, complete_with_timeout};
use crate::model::{
    Debate, DebateInsights, DebateScore, DebateVote, ScoringWeights, SideScore, Turn, Winner,
};
use crate::participant::Side;

pub mod components;
pub mod insights;

pub use components::{DRAW_BAND, audience_support, decide_winner};

/// Narrative used when the LLM summary is unavailable.
pub const NARRATIVE_FALLBACK: &str =
    "Narrative analysis is unavailable for this debate; see the component scores for the outcome.";

/// Computes the final score of a completed debate.
pub struct DebateScorer {
    llm: Arc<dyn CompletionClient>,
    weights: ScoringWeights,
    options: CompletionOptions,
    timeout: Duration,
}

impl DebateScorer {
    pub fn new(llm: Arc<dyn CompletionClient>, weights: ScoringWeights, timeout: Duration) -> Self {
        if (weights.sum() - 100.0).abs() > f64::EPSILON {
            tracing::warn!(sum = weights.sum(), "Scoring weights do not sum to 100");
        }
        Self {
            llm,
            weights,
            options: CompletionOptions {
                temperature: 0.5,
                max_tokens: 400,
            },
            timeout,
        }
    }

    pub fn weights(&self) -> ScoringWeights {
        self.weights
    }

    /// Score a debate from all of its turns and votes.
    pub async fn score_debate(
        &self,
        debate: &Debate,
        turns: &[Turn],
        votes: &[DebateVote],
    ) -> DebateScore {
        let (audience_for, audience_against) = audience_support(votes);
        let for_side = components::side_score(turns, Side::For, audience_for, &self.weights);
        let against = components::side_score(turns, Side::Against, audience_against, &self.weights);
        let (winner, confidence) = decide_winner(for_side.total, against.total);

        let mut insights = DebateInsights {
            strongest_argument_for: insights::strongest_argument(turns, Side::For),
            strongest_argument_against: insights::strongest_argument(turns, Side::Against),
            missed_rebuttals: insights::missed_rebuttals(turns),
            key_moments: insights::key_moments(turns),
            overall_analysis: String::new(),
        };
        insights.overall_analysis = self
            .narrative(debate, &for_side, &against, winner, &insights)
            .await;

        tracing::info!(
            debate_id = %debate.id,
            total_for = for_side.total,
            total_against = against.total,
            winner = ?winner,
            confidence = confidence,
            "Debate scored"
        );

        DebateScore {
            debate_id: debate.id,
            for_side,
            against,
            round_scores: components::round_breakdown(turns, &debate.rounds),
            insights,
            winner,
            confidence,
            weights: self.weights,
            vote_count: votes.len(),
            scored_at: Utc::now(),
        }
    }

    async fn narrative(
        &self,
        debate: &Debate,
        for_side: &SideScore,
        against: &SideScore,
        winner: Winner,
        insights: &DebateInsights,
    ) -> String {
        let prompt = build_narrative_prompt(debate, for_side, against, winner, insights);
        match complete_with_timeout(
            self.llm.as_ref(),
            NARRATIVE_SYSTEM_PROMPT,
            &prompt,
            self.options,
            self.timeout,
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => NARRATIVE_FALLBACK.to_string(),
            Err(e) => {
                tracing::warn!(debate_id = %debate.id, error = %e, "Narrative generation failed");
                NARRATIVE_FALLBACK.to_string()
            }
        }
    }
}

fn build_narrative_prompt(
    debate: &Debate,
    for_side: &SideScore,
    against: &SideScore,
    winner: Winner,
    insights: &DebateInsights,
) -> String {
    let mut prompt = format!("TOPIC: {}\n\n", debate.topic);
    for (label, score) in [("FOR", for_side), ("AGAINST", against)] {
        prompt.push_str(&format!(
            "{label}: total {:.1} (argument quality {:.1}, rebuttals {:.1}, conduct {:.1}, audience {:.1})\n",
            score.total,
            score.argument_quality,
            score.rebuttal_effectiveness,
            score.conduct_clarity,
            score.audience_support,
        ));
    }
    prompt.push_str(&format!("RESULT: {:?}\n", winner));

    for (label, strongest) in [
        ("FOR", &insights.strongest_argument_for),
        ("AGAINST", &insights.strongest_argument_against),
    ] {
        if let Some(s) = strongest {
            prompt.push_str(&format!("STRONGEST {label} ARGUMENT: {}\n", s.excerpt));
        }
    }
    for missed in &insights.missed_rebuttals {
        prompt.push_str(&format!(
            "UNANSWERED CLAIM (missed by {}): {}\n",
            missed.missed_by.display_name(),
            missed.claim
        ));
    }
    for moment in &insights.key_moments {
        prompt.push_str(&format!(
            "KEY MOMENT: turn {} by {} ({})\n",
            moment.turn_number,
            moment.author,
            moment.label()
        ));
    }
    prompt
}
