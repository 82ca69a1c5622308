//! Weighted overall-quality score with an auditable trace.

pub const TONE_WEIGHT: f64 = 0.2;
pub const CLARITY_WEIGHT: f64 = 0.3;
pub const EVIDENCE_WEIGHT: f64 = 0.3;
pub const CLAIMS_WEIGHT: f64 = 0.2;
/// Points per claim before the claims term saturates at 100.
pub const POINTS_PER_CLAIM: f64 = 10.0;
pub const FALLACY_PENALTY: f64 = 5.0;

/// Inputs to [`overall_quality`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityInputs {
    pub tone: f64,
    pub clarity: f64,
    pub evidence: f64,
    pub claim_count: usize,
    pub fallacy_count: usize,
}

/// Combine component scores into a 0..=100 quality score, appending every
/// term and its contribution to `trace`.
pub fn overall_quality(inputs: &QualityInputs, trace: &mut Vec<String>) -> f64 {
    let claims_score = (inputs.claim_count as f64 * POINTS_PER_CLAIM).min(100.0);

    let terms = [
        ("tone", inputs.tone, TONE_WEIGHT),
        ("clarity", inputs.clarity, CLARITY_WEIGHT),
        ("evidence", inputs.evidence, EVIDENCE_WEIGHT),
        ("claims", claims_score, CLAIMS_WEIGHT),
    ];

    let mut total = 0.0;
    for (name, value, weight) in terms {
        let contribution = value * weight;
        total += contribution;
        trace.push(format!(
            "Overall: {} {:.1} x {:.1} = {:.2}",
            name, value, weight, contribution
        ));
    }

    let penalty = inputs.fallacy_count as f64 * FALLACY_PENALTY;
    if penalty > 0.0 {
        trace.push(format!(
            "Overall: {} fallacy(ies) x {:.0} = -{:.1}",
            inputs.fallacy_count, FALLACY_PENALTY, penalty
        ));
    }

    let raw = total - penalty;
    let clamped = raw.clamp(0.0, 100.0);
    if clamped != raw {
        trace.push(format!("Overall: clamped {:.2} to {:.2}", raw, clamped));
    }
    trace.push(format!("Overall quality: {:.2}", clamped));

    clamped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weighted_combination() {
        let mut trace = Vec::new();
        let inputs = QualityInputs {
            tone: 80.0,
            clarity: 70.0,
            evidence: 60.0,
            claim_count: 3,
            fallacy_count: 1,
        };
        // 16 + 21 + 18 + 6 - 5
        let score = overall_quality(&inputs, &mut trace);
        assert!((score - 56.0).abs() < 1e-9);
        assert!(trace.iter().any(|t| t.contains("tone 80.0 x 0.2 = 16.00")));
        assert!(trace.iter().any(|t| t.contains("fallacy")));
        assert_eq!(trace.last().unwrap(), "Overall quality: 56.00");
    }

    #[test]
    fn test_claims_saturate() {
        let mut trace = Vec::new();
        let inputs = QualityInputs {
            tone: 0.0,
            clarity: 0.0,
            evidence: 0.0,
            claim_count: 25,
            fallacy_count: 0,
        };
        assert_eq!(overall_quality(&inputs, &mut trace), 20.0);
    }

    #[test]
    fn test_bounds_hold_for_extreme_inputs() {
        for (tone, clarity, evidence, claims, fallacies) in [
            (0.0, 0.0, 0.0, 0, 10),
            (100.0, 100.0, 100.0, 50, 0),
            (100.0, 0.0, 100.0, 1, 3),
            (50.0, 50.0, 50.0, 5, 100),
        ] {
            let mut trace = Vec::new();
            let score = overall_quality(
                &QualityInputs {
                    tone,
                    clarity,
                    evidence,
                    claim_count: claims,
                    fallacy_count: fallacies,
                },
                &mut trace,
            );
            assert!((0.0..=100.0).contains(&score), "score {score} out of bounds");
        }
    }

    #[test]
    fn test_clamp_is_traced() {
        let mut trace = Vec::new();
        let inputs = QualityInputs {
            tone: 0.0,
            clarity: 0.0,
            evidence: 0.0,
            claim_count: 0,
            fallacy_count: 3,
        };
        assert_eq!(overall_quality(&inputs, &mut trace), 0.0);
        assert!(trace.iter().any(|t| t.starts_with("Overall: clamped")));
    }
}
