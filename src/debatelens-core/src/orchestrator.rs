//! Debate lifecycle orchestration.
//!
//! Validates and applies participant actions (create, join, submit, vote,
//! cancel) and hands analysis and scoring to the background worker. Nothing
//! on this path waits for the LLM.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use crate::debate_format::{CustomDebateFormat, DebateFormat, RoundConfig, validate_rounds};
use crate::error::DebateError;
use crate::model::{Debate, DebateScore, DebateStatus, DebateVote, Turn, word_count};
use crate::participant::{Participant, Side};
use crate::store::DebateStore;
use crate::worker::{Job, JobFailure, JobProcessor, JobQueue, WorkerHandle, spawn_worker};

/// Callback for debate events.
pub type EventCallback = Arc<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted as a debate progresses.
#[derive(Debug, Clone, PartialEq)]
pub enum DebateEvent {
    /// A turn was accepted and queued for analysis.
    TurnSubmitted {
        debate_id: Uuid,
        turn_id: Uuid,
        round: u32,
        turn_number: u32,
        author: String,
        side: Side,
    },
    /// Both sides spoke and the next round began.
    RoundAdvanced { debate_id: Uuid, round: u32 },
    /// The final round finished; scoring is queued.
    DebateCompleted { debate_id: Uuid },
    /// Background analysis of a turn finished.
    AnalysisComplete {
        debate_id: Uuid,
        turn_id: Uuid,
        overall_quality: f64,
    },
}

impl DebateEvent {
    /// Wire name of the event.
    pub fn name(&self) -> &'static str {
        match self {
            DebateEvent::TurnSubmitted { .. } => "turn-submitted",
            DebateEvent::RoundAdvanced { .. } => "round-advanced",
            DebateEvent::DebateCompleted { .. } => "debate-completed",
            DebateEvent::AnalysisComplete { .. } => "analysis-complete",
        }
    }

    pub fn debate_id(&self) -> Uuid {
        match self {
            DebateEvent::TurnSubmitted { debate_id, .. }
            | DebateEvent::RoundAdvanced { debate_id, .. }
            | DebateEvent::DebateCompleted { debate_id }
            | DebateEvent::AnalysisComplete { debate_id, .. } => *debate_id,
        }
    }
}

/// Parameters for a new debate.
#[derive(Debug, Clone)]
pub struct NewDebate {
    pub topic: String,
    pub description: Option<String>,
    pub creator: String,
    pub creator_side: Side,
    /// Round schedule; `None` uses the configured default.
    pub rounds: Option<Vec<RoundConfig>>,
}

/// Drives debates through their lifecycle.
pub struct DebateOrchestrator {
    store: Arc<dyn DebateStore>,
    default_rounds: Vec<RoundConfig>,
    queue: Mutex<Option<JobQueue>>,
    worker: AsyncMutex<Option<WorkerHandle>>,
    /// Serializes read-modify-write cycles on debates.
    write_lock: AsyncMutex<()>,
    callback: Option<EventCallback>,
}

impl DebateOrchestrator {
    /// Create the orchestrator and start its worker on the current runtime.
    pub fn new(
        store: Arc<dyn DebateStore>,
        processor: JobProcessor,
        default_rounds: Vec<RoundConfig>,
        callback: Option<EventCallback>,
    ) -> Result<Self, DebateError> {
        validate_rounds(&default_rounds)?;
        let (queue, worker) = spawn_worker(processor.with_events(callback.clone()));
        Ok(Self {
            store,
            default_rounds,
            queue: Mutex::new(Some(queue)),
            worker: AsyncMutex::new(Some(worker)),
            write_lock: AsyncMutex::new(()),
            callback,
        })
    }

    pub async fn create_debate(&self, new: NewDebate) -> Result<Debate, DebateError> {
        let topic = new.topic.trim();
        if topic.is_empty() {
            return Err(DebateError::ConfigError("Debate topic is empty".to_string()));
        }
        let rounds = match new.rounds {
            Some(rounds) => CustomDebateFormat::new(rounds)?.rounds(),
            None => self.default_rounds.clone(),
        };

        let debate = Debate {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            description: new.description,
            status: DebateStatus::Waiting,
            rounds,
            current_round: 0,
            current_turn_user: None,
            participants: vec![Participant::new(new.creator, new.creator_side)],
            turn_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.store.insert_debate(debate.clone()).await?;

        tracing::info!(
            debate_id = %debate.id,
            topic = %debate.topic,
            rounds = debate.rounds.len(),
            "Debate created"
        );
        Ok(debate)
    }

    /// Join the open side of a waiting debate, which starts it.
    pub async fn join_debate(&self, debate_id: Uuid, user_id: &str) -> Result<Debate, DebateError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.load(debate_id).await?;

        if debate.status != DebateStatus::Waiting {
            return Err(not_active(&debate));
        }
        if debate.participant(user_id).is_some() {
            return Err(DebateError::AlreadyParticipant(user_id.to_string()));
        }
        let open_side = match debate.participants.first() {
            Some(creator) => creator.side.opponent(),
            None => Side::For,
        };
        debate.participants.push(Participant::new(user_id, open_side));

        debate.status = DebateStatus::Active;
        debate.current_round = 1;
        debate.current_turn_user = debate
            .participant_for(Side::For)
            .map(|p| p.user_id.clone());
        self.store.update_debate(debate.clone()).await?;

        tracing::info!(debate_id = %debate_id, user = user_id, side = %open_side, "Debate started");
        Ok(debate)
    }

    /// Accept a turn from the participant holding the floor.
    pub async fn submit_turn(
        &self,
        debate_id: Uuid,
        author: &str,
        content: &str,
    ) -> Result<Turn, DebateError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.load(debate_id).await?;

        if debate.status != DebateStatus::Active {
            return Err(not_active(&debate));
        }
        let side = debate
            .participant(author)
            .map(|p| p.side)
            .ok_or_else(|| DebateError::NotParticipant(author.to_string()))?;
        if debate.current_turn_user.as_deref() != Some(author) {
            return Err(DebateError::NotYourTurn {
                expected: debate.current_turn_user.clone().unwrap_or_default(),
            });
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(DebateError::EmptyTurn);
        }
        let round = debate.current_round;
        let limit = debate
            .round(round)
            .map(|r| r.word_limit)
            .ok_or_else(|| DebateError::InvalidRounds(format!("round {} is not configured", round)))?;
        let words = word_count(content);
        if words > limit {
            return Err(DebateError::WordLimitExceeded {
                round,
                limit,
                actual: words,
            });
        }

        // Numbered from stored turns so a failed debate update cannot wedge
        // later submissions on a duplicate turn number.
        let existing = self.store.list_turns(debate_id).await?;
        let turn_number = existing
            .iter()
            .map(|t| t.turn_number)
            .max()
            .unwrap_or(0)
            .max(debate.turn_count)
            + 1;
        let spoken_before: Vec<Side> = existing
            .iter()
            .filter(|t| t.round == round)
            .map(|t| t.side)
            .collect();
        let round_done = spoken_before.contains(&side.opponent());

        let turn = Turn::new(debate_id, round, turn_number, author, side, content);
        self.store.insert_turn(turn.clone()).await?;
        debate.turn_count = turn.turn_number;

        let mut follow_up = None;
        if !round_done {
            debate.current_turn_user = debate
                .participant_for(side.opponent())
                .map(|p| p.user_id.clone());
        } else if round < debate.total_rounds() {
            debate.current_round = round + 1;
            debate.current_turn_user = debate
                .participant_for(Side::For)
                .map(|p| p.user_id.clone());
            follow_up = Some(DebateEvent::RoundAdvanced {
                debate_id,
                round: debate.current_round,
            });
        } else {
            debate.status = DebateStatus::Completed;
            debate.current_turn_user = None;
            debate.completed_at = Some(Utc::now());
            follow_up = Some(DebateEvent::DebateCompleted { debate_id });
        }
        self.store.update_debate(debate).await?;

        self.emit(DebateEvent::TurnSubmitted {
            debate_id,
            turn_id: turn.id,
            round,
            turn_number: turn.turn_number,
            author: author.to_string(),
            side,
        });
        self.enqueue(Job::AnalyzeTurn {
            debate_id,
            turn_id: turn.id,
        });
        if let Some(event) = follow_up {
            let completed = matches!(event, DebateEvent::DebateCompleted { .. });
            self.emit(event);
            if completed {
                self.enqueue(Job::ScoreDebate { debate_id });
            }
        }

        tracing::info!(
            debate_id = %debate_id,
            turn_number = turn.turn_number,
            round = round,
            words = words,
            "Turn submitted"
        );
        Ok(turn)
    }

    /// Record or replace an audience vote on an active debate. Returns `true`
    /// for a new vote.
    pub async fn cast_vote(
        &self,
        debate_id: Uuid,
        round: u32,
        voter: &str,
        vote: Side,
        confidence: u8,
    ) -> Result<bool, DebateError> {
        let _guard = self.write_lock.lock().await;
        let debate = self.load(debate_id).await?;

        // The score is computed once at completion, so later votes would
        // never be counted.
        if debate.status != DebateStatus::Active {
            return Err(not_active(&debate));
        }
        if round == 0 || round > debate.total_rounds() {
            return Err(DebateError::InvalidVote(format!(
                "round {} is outside 1..={}",
                round,
                debate.total_rounds()
            )));
        }
        if !(1..=5).contains(&confidence) {
            return Err(DebateError::InvalidVote(format!(
                "confidence {} is outside 1..=5",
                confidence
            )));
        }
        if debate.participant(voter).is_some() {
            return Err(DebateError::InvalidVote(
                "participants cannot vote in their own debate".to_string(),
            ));
        }

        let created = self
            .store
            .upsert_vote(DebateVote {
                debate_id,
                round,
                voter: voter.to_string(),
                vote,
                confidence,
                cast_at: Utc::now(),
            })
            .await?;
        tracing::debug!(debate_id = %debate_id, round = round, voter = voter, created = created, "Vote recorded");
        Ok(created)
    }

    /// Cancel a debate that has not finished. Queued analysis still runs.
    pub async fn cancel_debate(&self, debate_id: Uuid) -> Result<Debate, DebateError> {
        let _guard = self.write_lock.lock().await;
        let mut debate = self.load(debate_id).await?;

        if matches!(debate.status, DebateStatus::Completed | DebateStatus::Cancelled) {
            return Err(not_active(&debate));
        }
        debate.status = DebateStatus::Cancelled;
        debate.current_turn_user = None;
        self.store.update_debate(debate.clone()).await?;

        tracing::info!(debate_id = %debate_id, "Debate cancelled");
        Ok(debate)
    }

    pub async fn debate(&self, debate_id: Uuid) -> Result<Debate, DebateError> {
        self.load(debate_id).await
    }

    pub async fn turns(&self, debate_id: Uuid) -> Result<Vec<Turn>, DebateError> {
        Ok(self.store.list_turns(debate_id).await?)
    }

    /// The stored final score, once the scoring job has run.
    pub async fn score(&self, debate_id: Uuid) -> Result<Option<DebateScore>, DebateError> {
        self.load(debate_id).await?;
        Ok(self.store.get_score(debate_id).await?)
    }

    /// Take the background failure channel. Only the first call returns it.
    pub async fn take_job_failures(
        &self,
    ) -> Option<tokio::sync::mpsc::UnboundedReceiver<JobFailure>> {
        self.worker.lock().await.as_mut().and_then(WorkerHandle::take_failures)
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub async fn shutdown(&self) {
        let queue = match self.queue.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        drop(queue);

        let worker = self.worker.lock().await.take();
        if let Some(worker) = worker {
            worker.join().await;
            tracing::info!("Background worker stopped");
        }
    }

    async fn load(&self, debate_id: Uuid) -> Result<Debate, DebateError> {
        self.store
            .get_debate(debate_id)
            .await?
            .ok_or(DebateError::DebateNotFound(debate_id))
    }

    fn enqueue(&self, job: Job) {
        let guard = match self.queue.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match guard.as_ref() {
            Some(queue) => {
                queue.enqueue(job);
            }
            None => tracing::warn!(job = ?job, "Orchestrator shut down, job dropped"),
        }
    }

    /// Emit an event if a callback is registered.
    fn emit(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

fn not_active(debate: &Debate) -> DebateError {
    DebateError::DebateNotActive {
        id: debate.id,
        status: debate.status.as_str().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::TurnAnalyzer;
    use crate::config::Config;
    use crate::debate_format::RoundKind;
    use crate::knowledge::KnowledgeService;
    use crate::llm::mock::ScriptedCompletion;
    use crate::model::{ScoringWeights, Winner};
    use crate::scoring::DebateScorer;
    use crate::store::faulty::FaultyStore;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    struct Harness {
        orchestrator: DebateOrchestrator,
        store: Arc<FaultyStore>,
        events: Arc<Mutex<Vec<DebateEvent>>>,
    }

    fn harness() -> Harness {
        let store = Arc::new(FaultyStore::default());
        let llm = Arc::new(
            ScriptedCompletion::new()
                .on("extracting claims", r#"["main claim"]"#)
                .on("rating TONE", r#"{"score": 80, "reasoning": "civil"}"#)
                .on("debate commentator", "Both sides argued well."),
        );
        let knowledge = Arc::new(KnowledgeService::new(store.clone()));
        let config = Config::default();
        let processor = JobProcessor::new(
            store.clone(),
            Arc::new(TurnAnalyzer::new(llm.clone(), None, &config)),
            Arc::new(DebateScorer::new(llm, ScoringWeights::default(), Duration::from_secs(5))),
            knowledge,
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let callback: EventCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
        let orchestrator =
            DebateOrchestrator::new(store.clone(), processor, config.rounds.schedule, Some(callback))
                .unwrap();
        Harness {
            orchestrator,
            store,
            events,
        }
    }

    fn two_rounds() -> Vec<RoundConfig> {
        vec![
            RoundConfig::new(1, RoundKind::Opening, 50, 60),
            RoundConfig::new(2, RoundKind::Closing, 10, 60),
        ]
    }

    async fn active_debate(h: &Harness, rounds: Option<Vec<RoundConfig>>) -> Debate {
        let debate = h
            .orchestrator
            .create_debate(NewDebate {
                topic: "Remote work is better than office work".to_string(),
                description: None,
                creator: "bob".to_string(),
                creator_side: Side::Against,
                rounds,
            })
            .await
            .unwrap();
        h.orchestrator.join_debate(debate.id, "alice").await.unwrap()
    }

    #[tokio::test]
    async fn test_join_starts_debate_with_for_side() {
        let h = harness();
        let debate = active_debate(&h, None).await;

        assert_eq!(debate.status, DebateStatus::Active);
        assert_eq!(debate.current_round, 1);
        assert_eq!(debate.current_turn_user.as_deref(), Some("alice"));
        assert_eq!(debate.participant("alice").unwrap().side, Side::For);
        assert_eq!(debate.rounds.len(), 3);

        let again = h.orchestrator.join_debate(debate.id, "carol").await;
        assert!(matches!(again, Err(DebateError::DebateNotActive { .. })));
    }

    #[tokio::test]
    async fn test_full_debate_flow() {
        let h = harness();
        let debate = active_debate(&h, Some(two_rounds())).await;
        let id = debate.id;
        let mut failures = h.orchestrator.take_job_failures().await.unwrap();

        h.orchestrator
            .submit_turn(id, "alice", "Remote work removes commuting and saves hours every week.")
            .await
            .unwrap();
        h.orchestrator
            .submit_turn(id, "bob", "However, offices build trust and mentoring.")
            .await
            .unwrap();
        assert_eq!(h.orchestrator.debate(id).await.unwrap().current_round, 2);

        assert!(h.orchestrator.cast_vote(id, 1, "viewer", Side::For, 4).await.unwrap());
        assert!(!h.orchestrator.cast_vote(id, 1, "viewer", Side::For, 5).await.unwrap());

        h.orchestrator.submit_turn(id, "alice", "Output matters, not presence.").await.unwrap();
        let last = h.orchestrator.submit_turn(id, "bob", "Culture needs presence.").await.unwrap();
        assert_eq!(last.turn_number, 4);

        let finished = h.orchestrator.debate(id).await.unwrap();
        assert_eq!(finished.status, DebateStatus::Completed);
        assert!(finished.completed_at.is_some());

        h.orchestrator.shutdown().await;
        assert!(failures.try_recv().is_err());

        for turn in h.orchestrator.turns(id).await.unwrap() {
            let analysis = turn.analysis().expect("every turn analyzed before shutdown returns");
            assert_eq!(analysis.claims, vec!["main claim".to_string()]);
            assert_eq!(analysis.tone_score, 80.0);
        }
        let score = h.orchestrator.score(id).await.unwrap().expect("scored");
        assert_eq!(score.vote_count, 1);
        assert_eq!(score.insights.overall_analysis, "Both sides argued well.");
        assert_ne!(score.winner, Winner::Against);

        let names: Vec<&str> = h.events.lock().unwrap().iter().map(DebateEvent::name).collect();
        assert_eq!(names.iter().filter(|n| **n == "turn-submitted").count(), 4);
        assert_eq!(names.iter().filter(|n| **n == "round-advanced").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "debate-completed").count(), 1);
        assert_eq!(names.iter().filter(|n| **n == "analysis-complete").count(), 4);
    }

    #[tokio::test]
    async fn test_word_limit_rejected_before_turn_created() {
        let h = harness();
        let debate = active_debate(&h, Some(two_rounds())).await;
        let long = "word ".repeat(51);

        let result = h.orchestrator.submit_turn(debate.id, "alice", &long).await;
        assert!(matches!(
            result,
            Err(DebateError::WordLimitExceeded { round: 1, limit: 50, actual: 51 })
        ));
        assert!(h.store.list_turns(debate.id).await.unwrap().is_empty());
        assert!(h.events.lock().unwrap().is_empty());

        let stored = h.orchestrator.debate(debate.id).await.unwrap();
        assert_eq!(stored.current_turn_user.as_deref(), Some("alice"));
        assert_eq!(stored.turn_count, 0);
    }

    #[tokio::test]
    async fn test_submission_validation_order() {
        let h = harness();
        let debate = active_debate(&h, None).await;
        let id = debate.id;

        assert!(matches!(
            h.orchestrator.submit_turn(Uuid::new_v4(), "alice", "hi").await,
            Err(DebateError::DebateNotFound(_))
        ));
        assert!(matches!(
            h.orchestrator.submit_turn(id, "mallory", "hi").await,
            Err(DebateError::NotParticipant(_))
        ));
        assert!(matches!(
            h.orchestrator.submit_turn(id, "bob", "").await,
            Err(DebateError::NotYourTurn { expected }) if expected == "alice"
        ));
        assert!(matches!(
            h.orchestrator.submit_turn(id, "alice", "   ").await,
            Err(DebateError::EmptyTurn)
        ));

        h.orchestrator.cancel_debate(id).await.unwrap();
        assert!(matches!(
            h.orchestrator.submit_turn(id, "alice", "hello").await,
            Err(DebateError::DebateNotActive { .. })
        ));
    }

    #[tokio::test]
    async fn test_vote_validation() {
        let h = harness();
        let debate = active_debate(&h, None).await;
        let id = debate.id;

        for (round, voter, confidence) in [(0, "v", 3), (4, "v", 3), (1, "v", 0), (1, "v", 6), (1, "alice", 3)] {
            let result = h.orchestrator.cast_vote(id, round, voter, Side::For, confidence).await;
            assert!(matches!(result, Err(DebateError::InvalidVote(_))), "round {round} voter {voter}");
        }
        assert_eq!(h.store.count_votes(id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_vote_rejected_once_debate_completed() {
        let h = harness();
        let rounds = vec![RoundConfig::new(1, RoundKind::Opening, 50, 60)];
        let debate = active_debate(&h, Some(rounds)).await;
        let id = debate.id;

        assert!(h.orchestrator.cast_vote(id, 1, "early", Side::For, 3).await.unwrap());
        h.orchestrator.submit_turn(id, "alice", "Commutes waste time.").await.unwrap();
        h.orchestrator.submit_turn(id, "bob", "Teams need contact.").await.unwrap();

        let late = h.orchestrator.cast_vote(id, 1, "late", Side::Against, 5).await;
        assert!(matches!(
            late,
            Err(DebateError::DebateNotActive { ref status, .. }) if status == "completed"
        ));

        h.orchestrator.shutdown().await;
        let score = h.orchestrator.score(id).await.unwrap().expect("scored");
        assert_eq!(score.vote_count, 1);
        assert_eq!(h.store.count_votes(id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_vote_rejected_before_debate_starts() {
        let h = harness();
        let debate = h
            .orchestrator
            .create_debate(NewDebate {
                topic: "Four-day week".to_string(),
                description: None,
                creator: "alice".to_string(),
                creator_side: Side::For,
                rounds: None,
            })
            .await
            .unwrap();
        let result = h.orchestrator.cast_vote(debate.id, 1, "v", Side::For, 3).await;
        assert!(matches!(result, Err(DebateError::DebateNotActive { .. })));
    }

    #[tokio::test]
    async fn test_failed_debate_update_emits_nothing_and_recovers() {
        let h = harness();
        let debate = active_debate(&h, Some(two_rounds())).await;
        let id = debate.id;

        h.store.fail_next_debate_update.store(true, Ordering::SeqCst);
        let failed = h.orchestrator.submit_turn(id, "alice", "First attempt.").await;
        assert!(matches!(failed, Err(DebateError::Store(_))));
        assert!(h.events.lock().unwrap().is_empty());

        // The floor did not move, so the same author retries.
        let retried = h.orchestrator.submit_turn(id, "alice", "Second attempt.").await.unwrap();
        assert_eq!(retried.turn_number, 2);
        let next = h.orchestrator.submit_turn(id, "bob", "Reply.").await.unwrap();
        assert_eq!(next.turn_number, 3);
        assert_eq!(h.orchestrator.debate(id).await.unwrap().current_round, 2);

        let names: Vec<&str> = h.events.lock().unwrap().iter().map(DebateEvent::name).collect();
        assert_eq!(names, vec!["turn-submitted", "turn-submitted", "round-advanced"]);
    }

    #[tokio::test]
    async fn test_custom_rounds_validated() {
        let h = harness();
        let result = h
            .orchestrator
            .create_debate(NewDebate {
                topic: "Tabs over spaces".to_string(),
                description: None,
                creator: "alice".to_string(),
                creator_side: Side::For,
                rounds: Some(vec![RoundConfig::new(1, RoundKind::Opening, 0, 60)]),
            })
            .await;
        assert!(matches!(result, Err(DebateError::InvalidRounds(_))));
    }

    #[test]
    fn test_event_names() {
        let id = Uuid::nil();
        assert_eq!(DebateEvent::RoundAdvanced { debate_id: id, round: 2 }.name(), "round-advanced");
        assert_eq!(DebateEvent::DebateCompleted { debate_id: id }.name(), "debate-completed");
        assert_eq!(DebateEvent::DebateCompleted { debate_id: id }.debate_id(), id);
    }
}
