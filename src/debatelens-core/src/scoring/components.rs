//! Side-level score components and the winner rule.

use crate::model::{
    DebateVote, NEUTRAL_SCORE, RoundScore, ScoringWeights, SideScore, Turn, Winner,
};
use crate::debate_format::RoundConfig;
use crate::participant::Side;

/// Totals closer than this are a draw.
pub const DRAW_BAND: f64 = 5.0;

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn side_turns(turns: &[Turn], side: Side) -> impl Iterator<Item = &Turn> {
    turns.iter().filter(move |t| t.side == side)
}

/// Mean of `overall×0.4 + evidence×0.3 + clarity×0.2 + min(100, claims×5)×0.1`.
/// Unanalyzed turns count as neutral.
pub fn argument_quality(turns: &[Turn], side: Side) -> f64 {
    mean(side_turns(turns, side).map(|turn| match turn.analysis() {
        Some(a) => {
            let claims = (a.claims.len() as f64 * 5.0).min(100.0);
            a.overall_quality * 0.4 + a.evidence_quality * 0.3 + a.clarity_score * 0.2 + claims * 0.1
        }
        None => NEUTRAL_SCORE,
    }))
}

/// Mean of `min(100, 40 + rebuttals×15)`.
pub fn rebuttal_effectiveness(turns: &[Turn], side: Side) -> f64 {
    mean(side_turns(turns, side).map(|turn| match turn.analysis() {
        Some(a) => (40.0 + a.rebuttals.len() as f64 * 15.0).min(100.0),
        None => NEUTRAL_SCORE,
    }))
}

/// Mean of `max(0, (tone×0.5 + clarity×0.5) − fallacies×5)`.
pub fn conduct_clarity(turns: &[Turn], side: Side) -> f64 {
    mean(side_turns(turns, side).map(|turn| match turn.analysis() {
        Some(a) => {
            let conduct = a.tone_score * 0.5 + a.clarity_score * 0.5;
            (conduct - a.fallacies.len() as f64 * 5.0).max(0.0)
        }
        None => NEUTRAL_SCORE,
    }))
}

/// Confidence-weighted share of the audience vote as `(for, against)`
/// percentages; 50/50 with no votes.
pub fn audience_support(votes: &[DebateVote]) -> (f64, f64) {
    let (mut for_pool, mut against_pool) = (0.0, 0.0);
    for vote in votes {
        let weight = f64::from(vote.confidence) / 5.0;
        match vote.vote {
            Side::For => for_pool += weight,
            Side::Against => against_pool += weight,
        }
    }

    let total = for_pool + against_pool;
    if total <= 0.0 {
        return (NEUTRAL_SCORE, NEUTRAL_SCORE);
    }
    (for_pool / total * 100.0, against_pool / total * 100.0)
}

/// Weighted sum of the four components, weights read as percentages.
pub fn total(score: &SideScore, weights: &ScoringWeights) -> f64 {
    (score.argument_quality * weights.argument_quality
        + score.rebuttal_effectiveness * weights.rebuttal_effectiveness
        + score.conduct_clarity * weights.conduct_clarity
        + score.audience_support * weights.audience_support)
        / 100.0
}

/// Build one side's component scores and total.
pub fn side_score(turns: &[Turn], side: Side, audience: f64, weights: &ScoringWeights) -> SideScore {
    let mut score = SideScore {
        argument_quality: argument_quality(turns, side),
        rebuttal_effectiveness: rebuttal_effectiveness(turns, side),
        conduct_clarity: conduct_clarity(turns, side),
        audience_support: audience,
        total: 0.0,
    };
    score.total = total(&score, weights);
    score
}

/// Decide the winner from the two totals.
///
/// Within [`DRAW_BAND`] the debate is a draw at confidence 50; otherwise the
/// higher side wins with confidence `min(50 + diff, 100)`.
pub fn decide_winner(total_for: f64, total_against: f64) -> (Winner, f64) {
    let diff = (total_for - total_against).abs();
    if diff < DRAW_BAND {
        return (Winner::Draw, 50.0);
    }
    let winner = if total_for > total_against {
        Winner::For
    } else {
        Winner::Against
    };
    (winner, (50.0 + diff).min(100.0))
}

/// Each configured round's turn quality per side (50 when absent).
pub fn round_breakdown(turns: &[Turn], rounds: &[RoundConfig]) -> Vec<RoundScore> {
    let quality = |round: u32, side: Side| {
        turns
            .iter()
            .find(|t| t.round == round && t.side == side)
            .map(Turn::overall_quality_or_neutral)
            .unwrap_or(NEUTRAL_SCORE)
    };

    rounds
        .iter()
        .map(|r| RoundScore {
            round: r.number,
            for_side: quality(r.number, Side::For),
            against: quality(r.number, Side::Against),
        })
        .collect()
}
