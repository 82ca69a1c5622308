//! DebateLens Core Library
//!
//! Retrieval-augmented analysis and scoring for structured two-sided
//! debates: turn analysis, a knowledge and memory corpus, round and debate
//! scoring, a live draft assistant and the debate lifecycle around them.

pub mod analysis;
pub mod assistant;
pub mod config;
pub mod debate_format;
pub mod embedding;
pub mod error;
pub mod knowledge;
pub mod llm;
pub mod model;
pub mod orchestrator;
pub mod participant;
pub mod retrieval;
pub mod scoring;
pub mod store;
pub mod worker;

pub use analysis::{AnalysisRequest, PriorTurn, TurnAnalyzer};
pub use assistant::{DraftAssistant, DraftFeedback, DraftRequest};
pub use config::Config;
pub use debate_format::{DebateFormat, RoundConfig, RoundKind, StandardDebateFormat};
pub use error::{DebateError, LlmError, ParseError, StoreError};
pub use knowledge::KnowledgeService;
pub use llm::{CompletionClient, DisabledCompletionClient, OpenAiCompletionClient};
pub use model::{Debate, DebateScore, Turn, TurnAnalysis, Winner};
pub use orchestrator::{DebateEvent, DebateOrchestrator, EventCallback, NewDebate};
pub use participant::{Participant, Side};
pub use retrieval::{RetrievalOptions, RetrievalOrchestrator, RetrievedContext};
pub use scoring::DebateScorer;
pub use store::{DebateStore, InMemoryStore};
pub use worker::{Job, JobProcessor};
