//! Completion-function boundary.
//!
//! The engine never depends on a concrete LLM provider: every caller goes
//! through [`CompletionClient`], which makes the analysis pipeline and scorer
//! testable with scripted doubles.

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;

use crate::config::LlmConfig;
use crate::error::{DebateError, LlmError};

/// Sampling parameters for one completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionOptions {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

/// A black-box text completion function.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, LlmError>;
}

/// Run `client.complete` under a hard deadline, mapping expiry to
/// [`LlmError::Timeout`].
pub async fn complete_with_timeout(
    client: &dyn CompletionClient,
    system_prompt: &str,
    user_prompt: &str,
    options: CompletionOptions,
    timeout: Duration,
) -> Result<String, LlmError> {
    match tokio::time::timeout(timeout, client.complete(system_prompt, user_prompt, options)).await
    {
        Ok(result) => result,
        Err(_) => Err(LlmError::Timeout(timeout.as_secs())),
    }
}

/// Floor for a single request so tiny budgets still get a usable attempt.
const MIN_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(1);

/// Backoff before retry `attempt` (1-based): 1s, 2s, 4s, ...
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.saturating_sub(1).min(6))
}

/// Per-request timeout that fits every attempt and the backoff between
/// them inside `budget`.
fn attempt_timeout(budget: Duration, max_retries: u32) -> Duration {
    let attempts = max_retries.max(1);
    let backoff: Duration = (1..attempts).map(backoff_delay).sum();
    (budget.saturating_sub(backoff) / attempts).max(MIN_ATTEMPT_TIMEOUT)
}

/// [`CompletionClient`] for any OpenAI-compatible chat completions API.
pub struct OpenAiCompletionClient {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
    max_retries: u32,
}

impl OpenAiCompletionClient {
    pub fn new(
        config: &LlmConfig,
        api_base: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, DebateError> {
        let max_retries = config.max_retries.max(1);
        let request_timeout = attempt_timeout(Duration::from_secs(config.timeout_secs), max_retries);

        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                DebateError::ConfigError(format!("Failed to create HTTP client: {}", e))
            })?;

        let openai_config = OpenAIConfig::new()
            .with_api_key(api_key.into())
            .with_api_base(api_base.into());

        tracing::info!(
            model = %config.model,
            attempt_timeout_ms = request_timeout.as_millis() as u64,
            "LLM client initialized"
        );

        Ok(Self {
            client: Client::with_config(openai_config).with_http_client(http_client),
            model: config.model.clone(),
            request_timeout,
            max_retries,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, LlmError> {
        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: system_prompt.to_string().into(),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: user_prompt.to_string().into(),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens)
            .messages(messages)
            .build()
            .map_err(|e| LlmError::Generation(e.to_string()))?;

        let mut last_error = LlmError::Generation("no attempt made".to_string());

        for attempt in 0..self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff_delay(attempt)).await;
            }

            match self.client.chat().create(request.clone()).await {
                Ok(response) => {
                    let content = response
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    let content = sanitize_response(&content);
                    if content.is_empty() {
                        return Err(LlmError::Generation("empty completion".to_string()));
                    }
                    return Ok(content);
                }
                Err(e) => {
                    let error = classify_error(e, self.request_timeout);
                    // Only rate limits and timeouts are worth retrying
                    let transient = matches!(error, LlmError::RateLimit(_) | LlmError::Timeout(_));
                    tracing::warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %error,
                        "Completion request failed"
                    );
                    last_error = error;
                    if !transient {
                        break;
                    }
                }
            }
        }

        Err(last_error)
    }
}

/// Map a provider error onto the four completion failure modes.
fn classify_error(error: OpenAIError, timeout: Duration) -> LlmError {
    if let OpenAIError::Reqwest(e) = &error {
        if e.is_timeout() {
            return LlmError::Timeout(timeout.as_secs());
        }
    }

    let message = error.to_string();
    let lower = message.to_lowercase();
    if lower.contains("rate limit") || lower.contains("rate_limit") || lower.contains("429") {
        LlmError::RateLimit(message)
    } else if lower.contains("api key")
        || lower.contains("api_key")
        || lower.contains("unauthorized")
        || lower.contains("401")
    {
        LlmError::Auth(message)
    } else {
        LlmError::Generation(message)
    }
}

/// Client used when no LLM is configured: every call fails, so every
/// analysis step falls back to its neutral default.
#[derive(Debug, Clone, Default)]
pub struct DisabledCompletionClient;

#[async_trait]
impl CompletionClient for DisabledCompletionClient {
    async fn complete(
        &self,
        _system_prompt: &str,
        _user_prompt: &str,
        _options: CompletionOptions,
    ) -> Result<String, LlmError> {
        Err(LlmError::Generation("LLM disabled".to_string()))
    }
}

/// Sanitize AI response by stripping reasoning tokens and XML-like tags.
///
/// Removes patterns like <thinking>...</thinking>, <reflection>...</reflection>, etc.
/// JSON braces and markdown fences are left for the output parsers.
pub fn sanitize_response(response: &str) -> String {
    let tags_to_strip = [
        "thinking",
        "think",
        "reflection",
        "reflect",
        "internal",
        "reasoning",
        "thought",
        "scratchpad",
    ];

    let mut result = response.to_string();

    for tag in &tags_to_strip {
        let pattern = format!(r"(?is)<{tag}[^>]*>.*?</{tag}>", tag = tag);
        if let Ok(re) = regex::Regex::new(&pattern) {
            result = re.replace_all(&result, "").to_string();
        }
    }

    result.trim().to_string()
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedCompletion;
    use super::*;
    use async_openai::error::ApiError;

    #[test]
    fn test_sanitize_response_thinking_tags() {
        let input = "<thinking>Let me think about this...</thinking>[\"claim\"]";
        assert_eq!(sanitize_response(input), "[\"claim\"]");
    }

    #[test]
    fn test_sanitize_response_multiline_tags() {
        let input = "<reasoning>\nMultiple\nlines\n</reasoning>\n{\"score\": 70}";
        assert_eq!(sanitize_response(input), "{\"score\": 70}");
    }

    #[test]
    fn test_sanitize_response_keeps_json() {
        let input = "```json\n[{\"type\": \"straw_man\"}]\n```";
        assert_eq!(sanitize_response(input), input);
    }

    fn api_error(message: &str, kind: Option<&str>, code: Option<&str>) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: kind.map(str::to_string),
            param: None,
            code: code.map(str::to_string),
        })
    }

    #[test]
    fn test_classify_error() {
        let timeout = Duration::from_secs(9);

        let limited = api_error(
            "Rate limit reached for gpt-4o-mini on requests per min",
            Some("requests"),
            Some("rate_limit_exceeded"),
        );
        assert!(matches!(classify_error(limited, timeout), LlmError::RateLimit(_)));

        let auth = api_error(
            "Incorrect API key provided: sk-xxxx",
            Some("invalid_request_error"),
            Some("invalid_api_key"),
        );
        assert!(matches!(classify_error(auth, timeout), LlmError::Auth(_)));

        let other = api_error("The model `gpt-9` does not exist", None, Some("model_not_found"));
        assert!(matches!(
            classify_error(other, timeout),
            LlmError::Generation(m) if m.contains("gpt-9")
        ));

        let invalid = OpenAIError::InvalidArgument("messages must not be empty".to_string());
        assert!(matches!(classify_error(invalid, timeout), LlmError::Generation(_)));
    }

    #[test]
    fn test_attempt_timeout_leaves_room_for_retries() {
        let budget = Duration::from_secs(30);
        let per_attempt = attempt_timeout(budget, 3);
        assert_eq!(per_attempt, Duration::from_secs(9));

        let worst_case = per_attempt * 3 + backoff_delay(1) + backoff_delay(2);
        assert!(worst_case <= budget);

        assert_eq!(attempt_timeout(budget, 0), budget);
        assert_eq!(attempt_timeout(Duration::from_secs(2), 3), MIN_ATTEMPT_TIMEOUT);
    }

    #[tokio::test]
    async fn test_disabled_client_fails() {
        let result = DisabledCompletionClient
            .complete("sys", "user", CompletionOptions::default())
            .await;
        assert!(matches!(result, Err(LlmError::Generation(_))));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let client = ScriptedCompletion::new()
            .on("sys", "late")
            .with_delay(Duration::from_millis(200));
        let result = complete_with_timeout(
            &client,
            "sys",
            "user",
            CompletionOptions::default(),
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(LlmError::Timeout(_))));
    }
}
