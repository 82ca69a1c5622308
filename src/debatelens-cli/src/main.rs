//! DebateLens CLI - debate analysis and scoring
//!
//! Analyzes single turns, gives live feedback on drafts, searches the
//! reference knowledge, and replays debate transcripts through the full
//! lifecycle to produce a final score.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use debatelens_core::analysis::{AnalysisRequest, PriorTurn, TurnAnalyzer};
use debatelens_core::assistant::{DraftAssistant, DraftRequest, FeedbackStatus};
use debatelens_core::config::{Config, default_config};
use debatelens_core::debate_format::{self, DebateFormat};
use debatelens_core::model::{DebateScore, TurnAnalysis};
use debatelens_core::worker::JobProcessor;
use debatelens_core::{
    CompletionClient, DebateEvent, DebateOrchestrator, DebateScorer, DisabledCompletionClient,
    EventCallback, InMemoryStore, KnowledgeService, NewDebate, OpenAiCompletionClient,
    RetrievalOrchestrator, RoundConfig, Side,
};
use serde::Deserialize;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "debatelens",
    version,
    about = "DebateLens - Analyze and score structured debates",
    long_about = "Retrieval-augmented argument analysis and debate scoring using OpenAI-compatible APIs."
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run without an LLM; every model-backed step falls back to its default
    #[arg(long, global = true)]
    no_llm: bool,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a single turn
    Analyze {
        /// The debate topic
        #[arg(short, long)]
        topic: String,

        /// Side the turn argues (for/against)
        #[arg(short, long, default_value = "for")]
        side: String,

        /// Earlier turns, oldest first, alternating from the opposite side
        #[arg(long, value_name = "TEXT")]
        prior: Vec<String>,

        /// The turn text
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Live feedback on a draft (no LLM calls)
    Draft {
        /// The opponent's latest point
        #[arg(long, value_name = "TEXT")]
        opponent: Option<String>,

        /// The draft text
        #[arg(value_name = "TEXT")]
        text: String,
    },
    /// Search the reference knowledge
    Knowledge {
        #[arg(value_name = "QUERY")]
        query: String,

        /// Results to return [default: retrieval.default_top_k]
        #[arg(short = 'k', long)]
        top_k: Option<usize>,
    },
    /// Replay a debate transcript and print its final score
    Score {
        /// Transcript JSON file
        #[arg(value_name = "FILE")]
        transcript: PathBuf,
    },
}

/// A recorded debate to replay.
#[derive(Debug, Deserialize)]
struct Transcript {
    topic: String,
    #[serde(default)]
    description: Option<String>,
    /// User arguing for the motion; opens every round.
    #[serde(rename = "for")]
    for_user: String,
    against: String,
    /// Named round schedule, e.g. "standard".
    #[serde(default)]
    format: Option<String>,
    /// Explicit round schedule; takes precedence over `format`.
    #[serde(default)]
    rounds: Option<Vec<RoundConfig>>,
    turns: Vec<TranscriptTurn>,
    #[serde(default)]
    votes: Vec<TranscriptVote>,
}

#[derive(Debug, Deserialize)]
struct TranscriptTurn {
    author: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct TranscriptVote {
    voter: String,
    round: u32,
    side: Side,
    confidence: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    let llm = completion_client(&config, cli.no_llm)?;

    let store = Arc::new(InMemoryStore::new());
    let knowledge = Arc::new(
        KnowledgeService::new(store.clone())
            .with_memory_candidate_limit(config.retrieval.memory_candidate_limit),
    );
    let seeded = knowledge.seed_knowledge().await?;
    tracing::debug!(seeded = seeded, "Knowledge seeded");
    let retrieval = Arc::new(RetrievalOrchestrator::new(knowledge.clone()));
    let retrieval_for_analysis = config
        .analysis
        .retrieval_enabled
        .then(|| retrieval.clone());

    match cli.command {
        Command::Analyze {
            topic,
            side,
            prior,
            text,
        } => {
            let side: Side = side.parse()?;
            let analyzer = TurnAnalyzer::new(llm, retrieval_for_analysis, &config);
            let request = AnalysisRequest {
                topic,
                side,
                content: text,
                prior_turns: prior_turns(&prior, side),
            };
            let analysis = analyzer.analyze(&request).await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis);
            }
        }
        Command::Draft { opponent, text } => {
            let assistant = DraftAssistant::new(Some(retrieval), config.assistant.clone());
            let feedback = assistant
                .analyze_draft(&DraftRequest {
                    debate_id: Uuid::nil(),
                    user_id: "cli".to_string(),
                    draft: text,
                    opponent_latest: opponent,
                })
                .await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&feedback)?);
            } else {
                print_draft_feedback(&feedback);
            }
        }
        Command::Knowledge { query, top_k } => {
            let top_k = top_k.unwrap_or(config.retrieval.default_top_k);
            let matches = knowledge.try_retrieve_knowledge(&query, top_k).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&matches)?);
            } else {
                for m in &matches {
                    println!(
                        "{} {} {}",
                        format!("{:.2}", m.similarity).dimmed(),
                        format!("[{}:{}]", m.category.as_str(), m.kind).yellow(),
                        m.content
                    );
                }
            }
        }
        Command::Score { transcript } => {
            let content = std::fs::read_to_string(&transcript)
                .map_err(|e| format!("Failed to read {}: {}", transcript.display(), e))?;
            let transcript: Transcript = serde_json::from_str(&content)?;

            let analyzer = Arc::new(TurnAnalyzer::new(llm.clone(), retrieval_for_analysis, &config));
            let scorer = Arc::new(DebateScorer::new(
                llm,
                config.scoring.weights,
                config.llm_timeout(),
            ));
            let processor = JobProcessor::new(store.clone(), analyzer, scorer, knowledge);
            let callback = (!cli.json).then(create_console_callback);
            let orchestrator = DebateOrchestrator::new(
                store,
                processor,
                config.rounds.schedule.clone(),
                callback,
            )?;

            let score = replay(&orchestrator, transcript).await;
            orchestrator.shutdown().await;
            let debate_id = score?;

            let score = orchestrator
                .score(debate_id)
                .await?
                .ok_or("Debate finished without a score; is the transcript complete?")?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&score)?);
            } else {
                print_score(&score);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn completion_client(
    config: &Config,
    no_llm: bool,
) -> Result<Arc<dyn CompletionClient>, Box<dyn std::error::Error>> {
    if no_llm {
        return Ok(Arc::new(DisabledCompletionClient));
    }

    // Get API configuration from environment
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. API calls may fail.".yellow()
        );
        String::new()
    });

    Ok(Arc::new(OpenAiCompletionClient::new(&config.llm, api_base, api_key)?))
}

/// Prior turns alternate sides, with the most recent one from the opponent.
fn prior_turns(texts: &[String], side: Side) -> Vec<PriorTurn> {
    let count = texts.len();
    texts
        .iter()
        .enumerate()
        .map(|(i, content)| {
            let from_opponent = (count - i) % 2 == 1;
            let speaker = if from_opponent { side.opponent() } else { side };
            PriorTurn {
                author: speaker.display_name().to_string(),
                side: speaker,
                content: content.clone(),
            }
        })
        .collect()
}

/// Run a transcript through create, join, submit and vote. Returns the
/// debate id.
async fn replay(
    orchestrator: &DebateOrchestrator,
    transcript: Transcript,
) -> Result<Uuid, Box<dyn std::error::Error>> {
    let rounds = match (transcript.rounds, &transcript.format) {
        (Some(rounds), _) => Some(rounds),
        (None, Some(name)) => {
            let format = debate_format::get_format(name).ok_or_else(|| {
                format!(
                    "Unknown debate format: '{}'. Available formats: {}",
                    name,
                    debate_format::available_formats().join(", ")
                )
            })?;
            Some(format.rounds())
        }
        (None, None) => None,
    };
    let debate = orchestrator
        .create_debate(NewDebate {
            topic: transcript.topic,
            description: transcript.description,
            creator: transcript.for_user,
            creator_side: Side::For,
            rounds,
        })
        .await?;
    orchestrator.join_debate(debate.id, &transcript.against).await?;

    print_header(&debate.topic);

    // Votes close when the debate completes, so they go in before the final turn.
    let (closing, opening) = match transcript.turns.split_last() {
        Some((last, rest)) => (Some(last), rest),
        None => (None, &transcript.turns[..]),
    };
    for turn in opening {
        orchestrator
            .submit_turn(debate.id, &turn.author, &turn.content)
            .await?;
    }
    for vote in &transcript.votes {
        orchestrator
            .cast_vote(debate.id, vote.round, &vote.voter, vote.side, vote.confidence)
            .await?;
    }
    if let Some(turn) = closing {
        orchestrator
            .submit_turn(debate.id, &turn.author, &turn.content)
            .await?;
    }
    Ok(debate.id)
}

/// Create a callback that prints debate events to the console.
fn create_console_callback() -> EventCallback {
    Arc::new(move |event| match event {
        DebateEvent::TurnSubmitted {
            round,
            turn_number,
            author,
            side,
            ..
        } => {
            println!(
                "{} {} {} {}",
                "▶".bright_cyan(),
                author.bright_cyan().bold(),
                format!("({})", side.display_name()).yellow(),
                format!("round {} turn {}", round, turn_number).dimmed()
            );
        }
        DebateEvent::RoundAdvanced { round, .. } => {
            println!();
            println!("{}", format!("  Round {} begins", round).bright_magenta().bold());
            println!();
        }
        DebateEvent::DebateCompleted { .. } => {
            println!();
            println!("{}", "  All rounds complete, scoring...".bright_magenta().bold());
        }
        DebateEvent::AnalysisComplete {
            turn_id,
            overall_quality,
            ..
        } => {
            println!(
                "  {} turn {} quality {}",
                "✓".green(),
                turn_id.to_string()[..8].dimmed(),
                format!("{:.1}", overall_quality).bright_white()
            );
        }
    })
}

fn print_header(topic: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", format!("  {}", "DebateLens".bold()).bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!();
    println!("{} {}", "Topic:".bold(), topic.bright_white());
    println!();
}

fn print_analysis(analysis: &TurnAnalysis) {
    println!(
        "{} {}",
        "Overall quality:".bold(),
        format!("{:.1}", analysis.overall_quality).bright_green().bold()
    );
    println!(
        "  tone {:.0}  clarity {:.0}  evidence {:.0}",
        analysis.tone_score, analysis.clarity_score, analysis.evidence_quality
    );
    print_list("Claims", &analysis.claims);
    print_list("Rebuttals", &analysis.rebuttals);
    if !analysis.fallacies.is_empty() {
        println!("{}", "Fallacies:".bold());
        for f in &analysis.fallacies {
            println!(
                "  {} {} {}",
                "!".red().bold(),
                format!("{} ({}/10)", f.kind, f.severity).red(),
                f.explanation
            );
        }
    }
    println!("{}", "Decision trace:".bold());
    for line in &analysis.decision_trace {
        println!("  {}", line.dimmed());
    }
    if !analysis.retrieved_sources.is_empty() {
        print_list("Sources", &analysis.retrieved_sources);
    }
}

fn print_list(title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    println!("{}", format!("{}:", title).bold());
    for item in items {
        println!("  - {}", item);
    }
}

fn print_draft_feedback(feedback: &debatelens_core::DraftFeedback) {
    match feedback.status {
        FeedbackStatus::TooShort => {
            println!("{}", "Draft too short for feedback.".dimmed());
            return;
        }
        FeedbackStatus::Throttled => {
            println!("{}", "Feedback throttled, try again shortly.".dimmed());
            return;
        }
        FeedbackStatus::Analyzed => {}
    }
    if feedback.warnings.is_empty() && feedback.suggestions.is_empty() {
        println!("{}", "No issues found.".green());
    }
    for w in &feedback.warnings {
        println!("{} {}", format!("[{:?}] {}", w.severity, w.kind).yellow().bold(), w.message);
    }
    for s in &feedback.suggestions {
        println!("{} {}", "→".bright_cyan(), s.message);
    }
    for tip in &feedback.tips {
        println!("{} {}", "tip:".dimmed(), textwrap(tip, 66));
    }
}

fn print_score(score: &DebateScore) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Final Score".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    println!(
        "  {:<24}{:>10}{:>10}",
        "",
        Side::For.display_name().bold(),
        Side::Against.display_name().bold()
    );
    for (label, f, a) in [
        ("Argument quality", score.for_side.argument_quality, score.against.argument_quality),
        ("Rebuttals", score.for_side.rebuttal_effectiveness, score.against.rebuttal_effectiveness),
        ("Conduct & clarity", score.for_side.conduct_clarity, score.against.conduct_clarity),
        ("Audience", score.for_side.audience_support, score.against.audience_support),
    ] {
        println!("  {:<24}{:>10.1}{:>10.1}", label, f, a);
    }
    println!(
        "  {:<24}{:>10}{:>10}",
        "Total".bold(),
        format!("{:.1}", score.for_side.total).bright_white().bold(),
        format!("{:.1}", score.against.total).bright_white().bold()
    );
    println!();
    for round in &score.round_scores {
        println!(
            "  {} {:>10.1}{:>10.1}",
            format!("Round {:<17}", round.round).dimmed(),
            round.for_side,
            round.against
        );
    }
    println!();
    println!(
        "{} {} {}",
        "Winner:".bold(),
        format!("{:?}", score.winner).bright_green().bold(),
        format!("(confidence {:.0})", score.confidence).dimmed()
    );

    let insights = &score.insights;
    for s in [&insights.strongest_argument_for, &insights.strongest_argument_against]
        .into_iter()
        .flatten()
    {
        println!(
            "{} {} {}",
            "Strongest:".bold(),
            s.author.bright_cyan(),
            format!("({:.0})", s.quality).dimmed()
        );
        println!("  {}", textwrap(&s.excerpt, 66).replace('\n', "\n  "));
    }
    for missed in &insights.missed_rebuttals {
        println!(
            "{} {} left unanswered: {}",
            "Missed:".yellow().bold(),
            missed.missed_by.display_name(),
            missed.claim
        );
    }
    for moment in &insights.key_moments {
        println!(
            "{} turn {} by {} ({})",
            "Key moment:".bold(),
            moment.turn_number,
            moment.author,
            moment.label()
        );
    }
    println!();
    for line in textwrap(&insights.overall_analysis, 66).lines() {
        println!("  {}", line);
    }
    println!();
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        if current_line_len + word.len() + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word.len();
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prior_turns_end_with_opponent() {
        let prior = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let turns = prior_turns(&prior, Side::For);
        let sides: Vec<Side> = turns.iter().map(|t| t.side).collect();
        assert_eq!(sides, vec![Side::Against, Side::For, Side::Against]);
    }

    #[test]
    fn test_transcript_parses() {
        let transcript: Transcript = serde_json::from_str(
            r#"{
                "topic": "Homework should be optional",
                "for": "alice",
                "against": "bob",
                "turns": [{"author": "alice", "content": "Rest matters."}],
                "votes": [{"voter": "v1", "round": 1, "side": "for", "confidence": 4}]
            }"#,
        )
        .unwrap();
        assert_eq!(transcript.for_user, "alice");
        assert!(transcript.rounds.is_none());
        assert_eq!(transcript.votes[0].side, Side::For);
    }

    #[tokio::test]
    async fn test_replay_counts_every_vote() {
        let transcript: Transcript =
            serde_json::from_str(include_str!("../../../demos/transcript.json")).unwrap();
        let config = Config::default();
        let llm: Arc<dyn CompletionClient> = Arc::new(DisabledCompletionClient);
        let store = Arc::new(InMemoryStore::new());
        let processor = JobProcessor::new(
            store.clone(),
            Arc::new(TurnAnalyzer::new(llm.clone(), None, &config)),
            Arc::new(DebateScorer::new(llm, config.scoring.weights, config.llm_timeout())),
            Arc::new(KnowledgeService::new(store.clone())),
        );
        let orchestrator =
            DebateOrchestrator::new(store, processor, config.rounds.schedule.clone(), None).unwrap();

        let id = replay(&orchestrator, transcript).await.unwrap();
        orchestrator.shutdown().await;

        let score = orchestrator.score(id).await.unwrap().expect("scored");
        assert_eq!(score.vote_count, 3);
    }

    #[test]
    fn test_knowledge_top_k_defaults_from_config() {
        let cli = Cli::try_parse_from(["debatelens", "knowledge", "straw man"]).unwrap();
        let Command::Knowledge { top_k, .. } = cli.command else {
            panic!("expected knowledge command");
        };
        assert_eq!(top_k, None);
        assert_eq!(top_k.unwrap_or(default_config().retrieval.default_top_k), 5);

        let cli = Cli::try_parse_from(["debatelens", "knowledge", "straw man", "-k", "2"]).unwrap();
        assert!(matches!(cli.command, Command::Knowledge { top_k: Some(2), .. }));
    }

    #[test]
    fn test_textwrap() {
        let wrapped = textwrap("aaa bbb ccc", 7);
        assert_eq!(wrapped, "aaa bbb\nccc");
    }
}
