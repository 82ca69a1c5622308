//! Debate format definitions and trait.
//!
//! A format decides the round schedule of a debate: how many rounds there
//! are, what each round is for, and the word and time limits that apply to
//! every turn submitted in it.

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Purpose of a round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RoundKind {
    Opening,
    Rebuttal,
    Closing,
}

/// A round within a debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoundConfig {
    /// 1-based round number.
    pub number: u32,
    pub kind: RoundKind,
    /// Maximum words per turn in this round.
    pub word_limit: usize,
    /// Speaking time hint for clients, in seconds.
    pub time_limit_secs: u64,
}

impl RoundConfig {
    pub fn new(number: u32, kind: RoundKind, word_limit: usize, time_limit_secs: u64) -> Self {
        Self {
            number,
            kind,
            word_limit,
            time_limit_secs,
        }
    }
}

/// Trait for defining debate formats.
///
/// Implement this trait to create custom round schedules.
pub trait DebateFormat: Send + Sync {
    /// Returns the name of this debate format.
    fn name(&self) -> &str;

    /// Returns the display name for the format.
    fn display_name(&self) -> &str;

    /// Returns all rounds of the debate in order.
    fn rounds(&self) -> Vec<RoundConfig>;
}

/// The default three-round opening / rebuttal / closing schedule.
#[derive(Debug, Clone, Default)]
pub struct StandardDebateFormat;

impl DebateFormat for StandardDebateFormat {
    fn name(&self) -> &str {
        "standard"
    }

    fn display_name(&self) -> &str {
        "Standard Debate (Opening, Rebuttal, Closing)"
    }

    fn rounds(&self) -> Vec<RoundConfig> {
        vec![
            RoundConfig::new(1, RoundKind::Opening, 300, 300),
            RoundConfig::new(2, RoundKind::Rebuttal, 250, 240),
            RoundConfig::new(3, RoundKind::Closing, 200, 180),
        ]
    }
}

/// A caller-supplied round schedule, validated on construction.
#[derive(Debug, Clone)]
pub struct CustomDebateFormat {
    rounds: Vec<RoundConfig>,
}

impl CustomDebateFormat {
    pub fn new(rounds: Vec<RoundConfig>) -> Result<Self, DebateError> {
        validate_rounds(&rounds)?;
        Ok(Self { rounds })
    }
}

impl DebateFormat for CustomDebateFormat {
    fn name(&self) -> &str {
        "custom"
    }

    fn display_name(&self) -> &str {
        "Custom Debate"
    }

    fn rounds(&self) -> Vec<RoundConfig> {
        self.rounds.clone()
    }
}

/// Check that rounds are non-empty, numbered 1..=n in order, and allow at
/// least one word per turn.
pub fn validate_rounds(rounds: &[RoundConfig]) -> Result<(), DebateError> {
    if rounds.is_empty() {
        return Err(DebateError::InvalidRounds(
            "at least one round is required".to_string(),
        ));
    }

    for (i, round) in rounds.iter().enumerate() {
        let expected = i as u32 + 1;
        if round.number != expected {
            return Err(DebateError::InvalidRounds(format!(
                "round at position {} is numbered {}, expected {}",
                i + 1,
                round.number,
                expected
            )));
        }
        if round.word_limit == 0 {
            return Err(DebateError::InvalidRounds(format!(
                "round {} has a zero word limit",
                round.number
            )));
        }
    }

    Ok(())
}

/// Get a debate format by name.
pub fn get_format(name: &str) -> Option<Box<dyn DebateFormat>> {
    match name.to_lowercase().as_str() {
        "standard" => Some(Box::new(StandardDebateFormat)),
        _ => None,
    }
}

/// List all available debate format names.
pub fn available_formats() -> Vec<&'static str> {
    vec!["standard"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_format_rounds() {
        let rounds = StandardDebateFormat.rounds();

        assert_eq!(rounds.len(), 3);
        assert_eq!(rounds[0].kind, RoundKind::Opening);
        assert_eq!(rounds[1].kind, RoundKind::Rebuttal);
        assert_eq!(rounds[2].kind, RoundKind::Closing);
        assert!(validate_rounds(&rounds).is_ok());
    }

    #[test]
    fn test_custom_format_rejects_gaps() {
        let rounds = vec![
            RoundConfig::new(1, RoundKind::Opening, 100, 60),
            RoundConfig::new(3, RoundKind::Closing, 100, 60),
        ];
        assert!(matches!(
            CustomDebateFormat::new(rounds),
            Err(DebateError::InvalidRounds(_))
        ));
    }

    #[test]
    fn test_custom_format_rejects_empty_and_zero_limit() {
        assert!(CustomDebateFormat::new(Vec::new()).is_err());
        let rounds = vec![RoundConfig::new(1, RoundKind::Opening, 0, 60)];
        assert!(CustomDebateFormat::new(rounds).is_err());
    }

    #[test]
    fn test_get_format_standard() {
        let format = get_format("Standard");
        assert!(format.is_some());
        assert_eq!(format.unwrap().name(), "standard");
    }

    #[test]
    fn test_get_format_unknown() {
        assert!(get_format("unknown_format").is_none());
    }
}
