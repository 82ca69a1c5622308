//! Narrative-free debate insights: strongest arguments, missed rebuttals and
//! key moments.

use crate::model::{KeyMoment, KeyMomentKind, MissedRebuttal, StrongestArgument, Turn};
use crate::participant::Side;
use crate::retrieval::truncate_chars;

pub const MAX_MISSED_REBUTTALS: usize = 3;
pub const MAX_KEY_MOMENTS: usize = 5;
pub const STRONG_ARGUMENT_THRESHOLD: f64 = 85.0;
pub const MULTIPLE_FALLACIES_THRESHOLD: usize = 2;
/// Leading characters of a claim matched against rebuttal text.
const CLAIM_KEY_CHARS: usize = 20;
const EXCERPT_CHARS: usize = 200;

/// The side's turn with the highest overall quality; earliest wins ties.
pub fn strongest_argument(turns: &[Turn], side: Side) -> Option<StrongestArgument> {
    let mut best: Option<&Turn> = None;
    for turn in turns.iter().filter(|t| t.side == side) {
        let better = best.is_none_or(|b| {
            turn.overall_quality_or_neutral() > b.overall_quality_or_neutral()
        });
        if better {
            best = Some(turn);
        }
    }

    best.map(|turn| StrongestArgument {
        turn_id: turn.id,
        turn_number: turn.turn_number,
        author: turn.author.clone(),
        excerpt: truncate_chars(turn.content.trim(), EXCERPT_CHARS),
        quality: turn.overall_quality_or_neutral(),
    })
}

/// Claims that no rebuttal on the opposing side picks up, in turn order.
///
/// A claim counts as answered when the first 20 characters of it appear
/// (case-insensitively) inside any opposing rebuttal.
pub fn missed_rebuttals(turns: &[Turn]) -> Vec<MissedRebuttal> {
    let rebuttals_by = |side: Side| -> Vec<String> {
        turns
            .iter()
            .filter(|t| t.side == side)
            .filter_map(Turn::analysis)
            .flat_map(|a| a.rebuttals.iter().map(|r| r.to_lowercase()))
            .collect()
    };
    let for_rebuttals = rebuttals_by(Side::For);
    let against_rebuttals = rebuttals_by(Side::Against);

    let mut missed = Vec::new();
    for turn in turns {
        let Some(analysis) = turn.analysis() else {
            continue;
        };
        let opposing = match turn.side {
            Side::For => &against_rebuttals,
            Side::Against => &for_rebuttals,
        };

        for claim in &analysis.claims {
            let key: String = claim.to_lowercase().chars().take(CLAIM_KEY_CHARS).collect();
            if key.trim().is_empty() {
                continue;
            }
            if !opposing.iter().any(|r| r.contains(&key)) {
                missed.push(MissedRebuttal {
                    missed_by: turn.side.opponent(),
                    claim: claim.clone(),
                    turn_number: turn.turn_number,
                });
                if missed.len() == MAX_MISSED_REBUTTALS {
                    return missed;
                }
            }
        }
    }
    missed
}

/// Turns scoring above 85 or carrying two or more fallacies, latest first.
/// A turn matching both rules is one moment with both tags.
pub fn key_moments(turns: &[Turn]) -> Vec<KeyMoment> {
    let mut moments = Vec::new();
    for turn in turns {
        let Some(analysis) = turn.analysis() else {
            continue;
        };
        let mut kinds = Vec::new();
        if analysis.overall_quality > STRONG_ARGUMENT_THRESHOLD {
            kinds.push(KeyMomentKind::StrongArgument);
        }
        if analysis.fallacies.len() >= MULTIPLE_FALLACIES_THRESHOLD {
            kinds.push(KeyMomentKind::MultipleFallacies);
        }
        if kinds.is_empty() {
            continue;
        }
        moments.push(KeyMoment {
            turn_number: turn.turn_number,
            round: turn.round,
            side: turn.side,
            author: turn.author.clone(),
            kinds,
            quality: analysis.overall_quality,
        });
    }

    moments.sort_by(|a, b| b.turn_number.cmp(&a.turn_number));
    moments.truncate(MAX_KEY_MOMENTS);
    moments
}
