//! Background job queue.
//!
//! Turn analysis and final scoring run off the request path on a single
//! worker task. Jobs are processed strictly in submission order, so every
//! analysis job for a debate finishes before that debate's scoring job.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::analysis::{AnalysisRequest, PriorTurn, TurnAnalyzer};
use crate::error::{DebateError, StoreError};
use crate::knowledge::KnowledgeService;
use crate::model::AnalysisStatus;
use crate::orchestrator::{DebateEvent, EventCallback};
use crate::scoring::DebateScorer;
use crate::store::DebateStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    AnalyzeTurn { debate_id: Uuid, turn_id: Uuid },
    ScoreDebate { debate_id: Uuid },
}

/// A job that returned an error.
#[derive(Debug, Clone)]
pub struct JobFailure {
    pub job: Job,
    pub error: String,
}

/// Sending half of the queue.
#[derive(Debug, Clone)]
pub struct JobQueue {
    sender: mpsc::UnboundedSender<Job>,
}

impl JobQueue {
    /// Queue a job. Returns `false` if the worker has stopped.
    pub fn enqueue(&self, job: Job) -> bool {
        match self.sender.send(job) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(job = ?e.0, "Job queue closed, dropping job");
                false
            }
        }
    }
}

/// Handle on the running worker task.
pub struct WorkerHandle {
    task: JoinHandle<()>,
    failures: Option<mpsc::UnboundedReceiver<JobFailure>>,
}

impl WorkerHandle {
    /// Take the failure channel. Only the first call returns it.
    pub fn take_failures(&mut self) -> Option<mpsc::UnboundedReceiver<JobFailure>> {
        self.failures.take()
    }

    /// Wait for the worker to drain the queue and exit. Every [`JobQueue`]
    /// clone must be dropped first.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Worker task panicked");
        }
    }
}

/// Start the worker on the current tokio runtime.
pub fn spawn_worker(processor: JobProcessor) -> (JobQueue, WorkerHandle) {
    let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
    let (failure_tx, failure_rx) = mpsc::unbounded_channel();

    let task = tokio::spawn(async move {
        while let Some(job) = receiver.recv().await {
            if let Err(e) = processor.process(job).await {
                tracing::error!(job = ?job, error = %e, "Background job failed");
                // Nobody listening is fine.
                let _ = failure_tx.send(JobFailure {
                    job,
                    error: e.to_string(),
                });
            }
        }
        tracing::debug!("Job queue closed, worker exiting");
    });

    (
        JobQueue { sender },
        WorkerHandle {
            task,
            failures: Some(failure_rx),
        },
    )
}

/// Executes queued jobs against the store and analysis services.
pub struct JobProcessor {
    store: Arc<dyn DebateStore>,
    analyzer: Arc<TurnAnalyzer>,
    scorer: Arc<DebateScorer>,
    knowledge: Arc<KnowledgeService>,
    events: Option<EventCallback>,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn DebateStore>,
        analyzer: Arc<TurnAnalyzer>,
        scorer: Arc<DebateScorer>,
        knowledge: Arc<KnowledgeService>,
    ) -> Self {
        Self {
            store,
            analyzer,
            scorer,
            knowledge,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventCallback>) -> Self {
        self.events = events;
        self
    }

    pub async fn process(&self, job: Job) -> Result<(), DebateError> {
        match job {
            Job::AnalyzeTurn { debate_id, turn_id } => self.analyze_turn(debate_id, turn_id).await,
            Job::ScoreDebate { debate_id } => self.score_debate(debate_id).await,
        }
    }

    async fn analyze_turn(&self, debate_id: Uuid, turn_id: Uuid) -> Result<(), DebateError> {
        let debate = self
            .store
            .get_debate(debate_id)
            .await?
            .ok_or(DebateError::DebateNotFound(debate_id))?;
        let mut turn = self
            .store
            .get_turn(turn_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "turn",
                id: turn_id.to_string(),
            })?;

        if !matches!(turn.analysis, AnalysisStatus::Pending) {
            tracing::debug!(turn_id = %turn_id, "Turn already analyzed, skipping");
            return Ok(());
        }

        let prior_turns = self
            .store
            .list_turns(debate_id)
            .await?
            .into_iter()
            .filter(|t| t.turn_number < turn.turn_number)
            .map(|t| PriorTurn {
                author: t.author,
                side: t.side,
                content: t.content,
            })
            .collect();

        let request = AnalysisRequest {
            topic: debate.topic.clone(),
            side: turn.side,
            content: turn.content.clone(),
            prior_turns,
        };
        let analysis = self.analyzer.analyze(&request).await;
        let overall_quality = analysis.overall_quality;
        let status = AnalysisStatus::Complete(Box::new(analysis));

        match self.store.set_turn_analysis(turn_id, status.clone()).await {
            Ok(()) => {}
            Err(StoreError::AlreadyAnalyzed(_)) => {
                tracing::debug!(turn_id = %turn_id, "Turn analyzed concurrently, discarding result");
                return Ok(());
            }
            Err(e) => {
                let failed = AnalysisStatus::Failed {
                    reason: e.to_string(),
                };
                if let Err(marker_err) = self.store.set_turn_analysis(turn_id, failed).await {
                    tracing::warn!(turn_id = %turn_id, error = %marker_err, "Could not mark turn as failed");
                }
                return Err(e.into());
            }
        }

        turn.analysis = status;
        self.knowledge.add_memory(&turn, &debate).await;

        tracing::info!(
            debate_id = %debate_id,
            turn_id = %turn_id,
            overall_quality = overall_quality,
            "Turn analyzed"
        );
        self.emit(DebateEvent::AnalysisComplete {
            debate_id,
            turn_id,
            overall_quality,
        });
        Ok(())
    }

    async fn score_debate(&self, debate_id: Uuid) -> Result<(), DebateError> {
        if self.store.get_score(debate_id).await?.is_some() {
            tracing::debug!(debate_id = %debate_id, "Debate already scored, skipping");
            return Ok(());
        }

        let debate = self
            .store
            .get_debate(debate_id)
            .await?
            .ok_or(DebateError::DebateNotFound(debate_id))?;
        let turns = self.store.list_turns(debate_id).await?;
        let votes = self.store.list_votes(debate_id).await?;

        let score = self.scorer.score_debate(&debate, &turns, &votes).await;
        match self.store.insert_score(score).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_duplicate() => {
                tracing::debug!(debate_id = %debate_id, "Score inserted concurrently, keeping first");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn emit(&self, event: DebateEvent) {
        if let Some(ref callback) = self.events {
            callback(event);
        }
    }
}
