//! Debate sides and participants.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DebateError;

/// Side a participant argues in a debate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Arguing in favor of the topic.
    For,
    /// Arguing against the topic.
    Against,
}

impl Side {
    pub fn display_name(&self) -> &str {
        match self {
            Side::For => "FOR",
            Side::Against => "AGAINST",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::For => "for",
            Side::Against => "against",
        }
    }

    pub fn opponent(&self) -> Side {
        match self {
            Side::For => Side::Against,
            Side::Against => Side::For,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = DebateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "for" | "pro" => Ok(Side::For),
            "against" | "con" => Ok(Side::Against),
            _ => Err(DebateError::InvalidSide(s.to_string())),
        }
    }
}

/// A user taking part in a debate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Stable user identifier.
    pub user_id: String,
    /// The side this participant argues.
    pub side: Side,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, side: Side) -> Self {
        Self {
            user_id: user_id.into(),
            side,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parse() {
        assert_eq!("for".parse::<Side>().unwrap(), Side::For);
        assert_eq!(" Against ".parse::<Side>().unwrap(), Side::Against);
        assert!(matches!(
            "neutral".parse::<Side>(),
            Err(DebateError::InvalidSide(_))
        ));
    }

    #[test]
    fn test_side_opponent() {
        assert_eq!(Side::For.opponent(), Side::Against);
        assert_eq!(Side::Against.opponent(), Side::For);
    }
}
