//! Error types for the debate engine.

use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced synchronously to callers of the debate engine.
///
/// Validation variants are rejected at the boundary and never reach the
/// analysis pipeline.
#[derive(Error, Debug)]
pub enum DebateError {
    #[error("Invalid side: {0:?} (expected \"for\" or \"against\")")]
    InvalidSide(String),

    #[error("Word limit exceeded: {actual} words submitted, round {round} allows {limit}")]
    WordLimitExceeded { round: u32, limit: usize, actual: usize },

    #[error("Not your turn: waiting for {expected}")]
    NotYourTurn { expected: String },

    #[error("User {0} is not a participant in this debate")]
    NotParticipant(String),

    #[error("User {0} already participates in this debate")]
    AlreadyParticipant(String),

    #[error("Debate {id} is not accepting this action (status: {status})")]
    DebateNotActive { id: Uuid, status: String },

    #[error("Debate not found: {0}")]
    DebateNotFound(Uuid),

    #[error("Turn content is empty")]
    EmptyTurn,

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Invalid round configuration: {0}")]
    InvalidRounds(String),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Failure modes of the external completion function.
///
/// Analysis steps treat every variant the same way: the step failed and its
/// neutral default is used.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limited: {0}")]
    RateLimit(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("generation failed: {0}")]
    Generation(String),
}

/// LLM output that did not survive strict parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no JSON {0} found in response")]
    NotFound(&'static str),

    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("unexpected shape: {0}")]
    Shape(String),
}

/// Errors raised by a [`DebateStore`](crate::store::DebateStore) backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("duplicate {entity}: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("turn {0} already has an analysis result")]
    AlreadyAnalyzed(Uuid),
}

impl StoreError {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, StoreError::Duplicate { .. })
    }
}
