//! Turn analysis pipeline.
//!
//! Turns a submitted argument into a [`TurnAnalysis`]: claims, rebuttals,
//! fallacies, tone, clarity and evidence scores, and a weighted overall
//! quality. The LLM-backed steps run concurrently and each one has a neutral
//! fallback, so [`TurnAnalyzer::analyze`] always produces a result.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::config::{AnalysisConfig, Config};
use crate::error::{LlmError, ParseError};
use crate::llm::{CompletionClient, CompletionOptions, complete_with_timeout};
use crate::model::{Fallacy, NEUTRAL_SCORE, TurnAnalysis};
use crate::participant::Side;
use crate::retrieval::{
    RetrievalOptions, RetrievalOrchestrator, RetrievalSource, RetrievedContext,
};

pub mod evidence;
pub mod parse;
pub mod prompts;
pub mod quality;

use evidence::assess_evidence;
use prompts::{
    CLAIMS_SYSTEM_PROMPT, CLARITY_SYSTEM_PROMPT, FALLACIES_SYSTEM_PROMPT, REBUTTALS_SYSTEM_PROMPT,
    TONE_SYSTEM_PROMPT, build_turn_prompt,
};
use quality::{QualityInputs, overall_quality};

/// An earlier turn in the same debate.
#[derive(Debug, Clone)]
pub struct PriorTurn {
    pub author: String,
    pub side: Side,
    pub content: String,
}

/// Everything the pipeline needs to know about one turn.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub topic: String,
    pub side: Side,
    pub content: String,
    /// Earlier turns, oldest first.
    pub prior_turns: Vec<PriorTurn>,
}

/// Why a step fell back to its default.
#[derive(Debug)]
enum StepError {
    Llm(LlmError),
    Parse(ParseError),
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Llm(e) => write!(f, "{}", e),
            StepError::Parse(e) => write!(f, "unparseable output ({})", e),
        }
    }
}

/// Outcome of one analysis step: its value plus trace lines.
struct Step<T> {
    value: T,
    trace: Vec<String>,
}

/// Converts turn text into a structured, explainable quality assessment.
pub struct TurnAnalyzer {
    llm: Arc<dyn CompletionClient>,
    retrieval: Option<Arc<RetrievalOrchestrator>>,
    settings: AnalysisConfig,
    options: CompletionOptions,
    timeout: Duration,
}

impl TurnAnalyzer {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        retrieval: Option<Arc<RetrievalOrchestrator>>,
        config: &Config,
    ) -> Self {
        Self {
            llm,
            retrieval,
            settings: config.analysis.clone(),
            options: CompletionOptions {
                temperature: config.llm.temperature,
                max_tokens: config.llm.max_tokens,
            },
            timeout: config.llm_timeout(),
        }
    }

    /// Analyze one turn. Never fails; failed steps use neutral defaults and
    /// say so in the decision trace.
    pub async fn analyze(&self, request: &AnalysisRequest) -> TurnAnalysis {
        let mut trace = Vec::new();

        let prior_context = build_prior_context(&request.prior_turns, self.settings.context_chars);
        if prior_context.is_empty() {
            trace.push("Context: opening turn, no prior turns".to_string());
        } else {
            trace.push(format!(
                "Context: {} prior turn(s), {} chars",
                request.prior_turns.len(),
                prior_context.chars().count()
            ));
        }

        let retrieved = self.retrieve(&request.content).await;
        match &retrieved {
            Some(context) => trace.push(format!(
                "Retrieval: {} knowledge, {} memory item(s)",
                context.knowledge_count, context.memory_count
            )),
            None => trace.push("Retrieval: disabled, continuing without context".to_string()),
        }

        let retrieved_block = retrieved
            .as_ref()
            .map(RetrievedContext::prompt_block)
            .unwrap_or_default();
        let user_prompt = build_turn_prompt(
            &request.topic,
            request.side,
            &request.content,
            &prior_context,
            &retrieved_block,
        );

        let (claims, rebuttals, fallacies, tone, clarity) = tokio::join!(
            self.extract_list(
                "Claims",
                CLAIMS_SYSTEM_PROMPT,
                &user_prompt,
                self.settings.max_claims
            ),
            self.extract_rebuttals(&user_prompt, !prior_context.is_empty()),
            self.detect_fallacies(&user_prompt),
            self.score_judgement("Tone", TONE_SYSTEM_PROMPT, &user_prompt),
            self.score_judgement("Clarity", CLARITY_SYSTEM_PROMPT, &user_prompt),
        );
        let evidence = assess_evidence(&request.content, retrieved.as_ref());

        for step_trace in [
            claims.trace,
            rebuttals.trace,
            fallacies.trace,
            tone.trace,
            clarity.trace,
            evidence.trace,
        ] {
            trace.extend(step_trace);
        }

        let inputs = QualityInputs {
            tone: tone.value,
            clarity: clarity.value,
            evidence: evidence.score,
            claim_count: claims.value.len(),
            fallacy_count: fallacies.value.len(),
        };
        let overall = overall_quality(&inputs, &mut trace);

        tracing::debug!(
            side = %request.side,
            claims = claims.value.len(),
            fallacies = fallacies.value.len(),
            overall = overall,
            "Turn analyzed"
        );

        TurnAnalysis {
            claims: claims.value,
            rebuttals: rebuttals.value,
            fallacies: fallacies.value,
            tone_score: tone.value,
            clarity_score: clarity.value,
            evidence_quality: evidence.score,
            overall_quality: overall,
            decision_trace: trace,
            retrieved_sources: retrieved
                .as_ref()
                .map(RetrievedContext::source_labels)
                .unwrap_or_default(),
            analyzed_at: Utc::now(),
        }
    }

    async fn retrieve(&self, content: &str) -> Option<RetrievedContext> {
        if !self.settings.retrieval_enabled {
            return None;
        }
        let retrieval = self.retrieval.as_ref()?;
        let options = RetrievalOptions {
            sources: vec![RetrievalSource::Knowledge, RetrievalSource::Memory],
            top_k: self.settings.retrieval_top_k,
            ..Default::default()
        };
        Some(retrieval.retrieve_context(content, &options).await)
    }

    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError> {
        complete_with_timeout(
            self.llm.as_ref(),
            system_prompt,
            user_prompt,
            self.options,
            self.timeout,
        )
        .await
    }

    async fn run_step<T>(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        parse: impl FnOnce(&str) -> Result<T, ParseError>,
    ) -> Result<T, StepError> {
        let raw = self
            .complete(system_prompt, user_prompt)
            .await
            .map_err(StepError::Llm)?;
        parse(&raw).map_err(StepError::Parse)
    }

    async fn extract_list(
        &self,
        label: &str,
        system_prompt: &str,
        user_prompt: &str,
        max: usize,
    ) -> Step<Vec<String>> {
        match self
            .run_step(system_prompt, user_prompt, |raw| {
                parse::parse_string_list(raw, max)
            })
            .await
        {
            Ok(items) => Step {
                trace: vec![format!("{}: {} extracted", label, items.len())],
                value: items,
            },
            Err(e) => {
                tracing::debug!(step = label, error = %e, "Analysis step fell back");
                Step {
                    value: Vec::new(),
                    trace: vec![format!("{}: extraction failed ({}), using none", label, e)],
                }
            }
        }
    }

    async fn extract_rebuttals(&self, user_prompt: &str, has_context: bool) -> Step<Vec<String>> {
        if !has_context {
            return Step {
                value: Vec::new(),
                trace: vec!["Rebuttals: skipped, no prior turns to rebut".to_string()],
            };
        }
        self.extract_list(
            "Rebuttals",
            REBUTTALS_SYSTEM_PROMPT,
            user_prompt,
            self.settings.max_rebuttals,
        )
        .await
    }

    async fn detect_fallacies(&self, user_prompt: &str) -> Step<Vec<Fallacy>> {
        let max = self.settings.max_fallacies;
        match self
            .run_step(FALLACIES_SYSTEM_PROMPT, user_prompt, |raw| {
                parse::parse_fallacies(raw, max)
            })
            .await
        {
            Ok((fallacies, dropped)) => {
                let mut trace = vec![format!("Fallacies: {} detected", fallacies.len())];
                if dropped > 0 {
                    trace.push(format!("Fallacies: dropped {} malformed entr(ies)", dropped));
                }
                for fallacy in &fallacies {
                    trace.push(format!(
                        "Fallacies: {} (severity {})",
                        fallacy.kind, fallacy.severity
                    ));
                }
                Step {
                    value: fallacies,
                    trace,
                }
            }
            Err(e) => {
                tracing::debug!(step = "fallacies", error = %e, "Analysis step fell back");
                Step {
                    value: Vec::new(),
                    trace: vec![format!("Fallacies: detection failed ({}), using none", e)],
                }
            }
        }
    }

    async fn score_judgement(&self, label: &str, system_prompt: &str, user_prompt: &str) -> Step<f64> {
        match self
            .run_step(system_prompt, user_prompt, parse::parse_score)
            .await
        {
            Ok(judgement) => {
                let mut line = format!("{}: {:.1}", label, judgement.score);
                if !judgement.reasoning.is_empty() {
                    line.push_str(&format!(" ({})", judgement.reasoning));
                }
                Step {
                    value: judgement.score,
                    trace: vec![line],
                }
            }
            Err(e) => {
                tracing::debug!(step = label, error = %e, "Analysis step fell back");
                Step {
                    value: NEUTRAL_SCORE,
                    trace: vec![format!(
                        "{}: scoring failed ({}), defaulting to {:.0}",
                        label, e, NEUTRAL_SCORE
                    )],
                }
            }
        }
    }
}

/// Render prior turns as side-labelled lines, keeping the most recent turns
/// that fit in `max_chars`. The oldest kept turn may have its content cut
/// from the front; its `[SIDE] author:` label is always kept whole.
pub fn build_prior_context(prior_turns: &[PriorTurn], max_chars: usize) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut used = 0;

    for turn in prior_turns.iter().rev() {
        let label = format!("[{}] {}: ", turn.side.display_name(), turn.author);
        let content = turn.content.trim();
        let label_len = label.chars().count();
        let content_len = content.chars().count();
        let len = label_len + content_len + 1;
        if used + len <= max_chars {
            used += len;
            lines.push(format!("{}{}", label, content));
            continue;
        }
        // Label, "...", at least one content character and the newline.
        let room = max_chars
            .saturating_sub(used)
            .saturating_sub(label_len + 3 + 1);
        if room > 0 {
            let tail: String = content.chars().skip(content_len.saturating_sub(room)).collect();
            lines.push(format!("{}...{}", label, tail));
        }
        break;
    }

    lines.reverse();
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_config;
    use crate::knowledge::KnowledgeService;
    use crate::llm::mock::ScriptedCompletion;
    use crate::store::InMemoryStore;

    fn request(content: &str, prior: Vec<PriorTurn>) -> AnalysisRequest {
        AnalysisRequest {
            topic: "Cities should ban cars downtown".to_string(),
            side: Side::For,
            content: content.to_string(),
            prior_turns: prior,
        }
    }

    fn prior(side: Side, content: &str) -> PriorTurn {
        PriorTurn {
            author: match side {
                Side::For => "alice".to_string(),
                Side::Against => "bob".to_string(),
            },
            side,
            content: content.to_string(),
        }
    }

    fn happy_llm() -> ScriptedCompletion {
        ScriptedCompletion::new()
            .on("extracting claims", r#"["Cars pollute", "Walking is healthier"]"#)
            .on("extracting rebuttals", r#"["Answers the jobs point"]"#)
            .on(
                "detecting logical fallacies",
                "```json\n[{\"type\": \"slippery_slope\", \"explanation\": \"chain\", \"severity\": 3}]\n```",
            )
            .on("rating TONE", r#"{"score": 80, "reasoning": "civil"}"#)
            .on("rating CLARITY", r#"{"score": 70, "reasoning": "structured"}"#)
    }

    fn analyzer(llm: ScriptedCompletion) -> (TurnAnalyzer, Arc<ScriptedCompletion>) {
        let llm = Arc::new(llm);
        let analyzer = TurnAnalyzer::new(llm.clone(), None, &default_config());
        (analyzer, llm)
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let (analyzer, _) = analyzer(happy_llm());
        let analysis = analyzer
            .analyze(&request(
                "According to a city study, traffic fell 20 percent.",
                vec![prior(Side::Against, "Cars enable jobs.")],
            ))
            .await;

        assert_eq!(analysis.claims.len(), 2);
        assert_eq!(analysis.rebuttals.len(), 1);
        assert_eq!(analysis.fallacies.len(), 1);
        assert_eq!(analysis.tone_score, 80.0);
        assert_eq!(analysis.clarity_score, 70.0);
        // according to, study, percent
        assert_eq!(analysis.evidence_quality, 75.0);
        // 16 + 21 + 22.5 + 4 - 5
        assert!((analysis.overall_quality - 58.5).abs() < 1e-9);
        assert!(analysis.decision_trace.iter().any(|t| t.contains("Retrieval: disabled")));
        assert!(analysis.retrieved_sources.is_empty());
    }

    #[tokio::test]
    async fn test_opening_turn_skips_rebuttals() {
        let (analyzer, llm) = analyzer(happy_llm());
        let analysis = analyzer.analyze(&request("Cars pollute our city.", Vec::new())).await;

        assert!(analysis.rebuttals.is_empty());
        assert!(
            analysis
                .decision_trace
                .iter()
                .any(|t| t.starts_with("Rebuttals: skipped"))
        );
        // claims, fallacies, tone, clarity
        assert_eq!(llm.calls(), 4);
    }

    #[tokio::test]
    async fn test_every_llm_failure_degrades_to_defaults() {
        let llm = ScriptedCompletion::new()
            .fail_on("extracting claims", LlmError::RateLimit("slow down".to_string()))
            .fail_on("rating TONE", LlmError::Auth("bad key".to_string()))
            .on("rating CLARITY", "I'd rate this a solid seven")
            .on("detecting logical fallacies", "None that I can see.");
        let (analyzer, _) = analyzer(llm);

        let analysis = analyzer
            .analyze(&request("I just think it is right.", vec![prior(Side::Against, "No.")]))
            .await;

        assert!(analysis.claims.is_empty());
        assert!(analysis.rebuttals.is_empty());
        assert!(analysis.fallacies.is_empty());
        assert_eq!(analysis.tone_score, NEUTRAL_SCORE);
        assert_eq!(analysis.clarity_score, NEUTRAL_SCORE);
        assert_eq!(analysis.evidence_quality, 20.0);
        // 10 + 15 + 6 + 0
        assert!((analysis.overall_quality - 31.0).abs() < 1e-9);
        assert!(
            analysis
                .decision_trace
                .iter()
                .any(|t| t.contains("Tone: scoring failed") && t.contains("defaulting to 50"))
        );
        assert!(
            analysis
                .decision_trace
                .iter()
                .any(|t| t.contains("Claims: extraction failed"))
        );
    }

    #[tokio::test]
    async fn test_slow_llm_times_out_to_defaults() {
        let mut config = default_config();
        config.llm.timeout_secs = 0;
        let llm = Arc::new(happy_llm().with_delay(Duration::from_millis(50)));
        let analyzer = TurnAnalyzer::new(llm, None, &config);

        let analysis = analyzer.analyze(&request("Cars pollute.", Vec::new())).await;
        assert_eq!(analysis.tone_score, NEUTRAL_SCORE);
        assert!(analysis.claims.is_empty());
    }

    #[tokio::test]
    async fn test_retrieval_feeds_prompt_and_sources() {
        let knowledge = Arc::new(KnowledgeService::new(Arc::new(InMemoryStore::new())));
        knowledge.seed_knowledge().await.unwrap();
        let retrieval = Arc::new(RetrievalOrchestrator::new(knowledge));
        let llm = Arc::new(happy_llm());
        let analyzer = TurnAnalyzer::new(llm.clone(), Some(retrieval), &default_config());

        let analysis = analyzer
            .analyze(&request(
                "A peer-reviewed study published in a journal shows strong evidence.",
                Vec::new(),
            ))
            .await;

        assert!(!analysis.retrieved_sources.is_empty());
        assert!(analysis.retrieved_sources[0].starts_with("knowledge:"));
        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts.iter().all(|p| p.contains("Reference knowledge")));
    }

    #[test]
    fn test_prior_context_bounded_keeps_recent() {
        let turns = vec![
            prior(Side::For, &"old ".repeat(50)),
            prior(Side::Against, "most recent point"),
        ];
        let context = build_prior_context(&turns, 60);
        assert!(context.chars().count() <= 60);
        assert!(context.ends_with("[AGAINST] bob: most recent point"));
        assert!(context.contains("..."));
    }

    #[test]
    fn test_prior_context_oversized_latest_keeps_label() {
        let content = format!("{} final sentence", "filler ".repeat(40));
        let context = build_prior_context(&[prior(Side::Against, &content)], 40);

        assert!(context.chars().count() <= 40);
        assert!(context.starts_with("[AGAINST] bob: ..."), "{context}");
        assert!(context.ends_with("final sentence"));

        // Too small for the label: nothing rather than an unlabelled fragment.
        assert_eq!(build_prior_context(&[prior(Side::Against, &content)], 12), "");
    }

    #[test]
    fn test_prior_context_empty() {
        assert_eq!(build_prior_context(&[], 2000), "");
    }
}
