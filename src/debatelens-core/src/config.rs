//! Configuration module for loading TOML config files.
//!
//! Every section has defaults, so a config file only needs the values it
//! overrides. API credentials are not part of the file; they come from the
//! environment.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::debate_format::{DebateFormat, RoundConfig, StandardDebateFormat, validate_rounds};
use crate::error::DebateError;
use crate::knowledge::DEFAULT_MEMORY_CANDIDATE_LIMIT;
use crate::model::ScoringWeights;

/// Root configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub analysis: AnalysisConfig,
    pub retrieval: RetrievalConfig,
    pub scoring: ScoringConfig,
    pub assistant: AssistantConfig,
    pub rounds: RoundsConfig,
}

/// Completion client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Deadline for a single completion. Each retry gets a share of it
    /// after the backoff between attempts is set aside.
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout_secs: 30,
            max_retries: 3,
        }
    }
}

/// Turn analysis pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub max_claims: usize,
    pub max_rebuttals: usize,
    pub max_fallacies: usize,
    /// Character budget for prior-turn context in prompts.
    pub context_chars: usize,
    pub retrieval_enabled: bool,
    pub retrieval_top_k: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_claims: 5,
            max_rebuttals: 5,
            max_fallacies: 3,
            context_chars: 2000,
            retrieval_enabled: true,
            retrieval_top_k: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Knowledge results returned when a caller does not ask for a count.
    pub default_top_k: usize,
    /// Most-recent memory entries considered per query.
    pub memory_candidate_limit: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_top_k: 5,
            memory_candidate_limit: DEFAULT_MEMORY_CANDIDATE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: ScoringWeights,
}

/// Live draft assistant settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub throttle_ms: u64,
    pub min_draft_chars: usize,
    pub evidence_nudge_chars: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            throttle_ms: 2000,
            min_draft_chars: 20,
            evidence_nudge_chars: 150,
        }
    }
}

impl AssistantConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }
}

/// Default round schedule for new debates.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoundsConfig {
    pub schedule: Vec<RoundConfig>,
}

impl Default for RoundsConfig {
    fn default() -> Self {
        Self {
            schedule: StandardDebateFormat.rounds(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_toml(&content)
    }

    /// Load configuration from string content.
    pub fn from_toml(content: &str) -> Result<Self, DebateError> {
        let config: Config = toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), DebateError> {
        validate_rounds(&self.rounds.schedule)?;

        let weight_sum = self.scoring.weights.sum();
        if (weight_sum - 100.0).abs() > f64::EPSILON {
            // Weights are percentages by convention only.
            tracing::warn!(sum = weight_sum, "Scoring weights do not sum to 100");
        }

        Ok(())
    }

    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm.timeout_secs)
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    Config::default()
}
