//! Persistence boundary for the debate engine.
//!
//! The engine only needs create/read/update primitives with a few uniqueness
//! constraints, so any backend offering them can implement [`DebateStore`].
//! [`InMemoryStore`] is the reference backend used by the CLI and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::model::{
    AnalysisStatus, Debate, DebateMemoryEntry, DebateScore, DebateVote, KnowledgeItem, Turn,
};
use crate::participant::Side;

/// Average overall quality per side, over analyzed turns only.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideAverages {
    pub for_side: Option<f64>,
    pub against: Option<f64>,
}

/// Storage backend used by the engine.
///
/// Uniqueness constraints every backend must enforce:
/// - one [`DebateScore`] per debate
/// - one [`DebateMemoryEntry`] per turn
/// - one [`DebateVote`] per (debate, round, voter), upserted
/// - a turn's analysis leaves `Pending` at most once
#[async_trait]
pub trait DebateStore: Send + Sync {
    // Debates

    async fn insert_debate(&self, debate: Debate) -> Result<(), StoreError>;

    async fn get_debate(&self, id: Uuid) -> Result<Option<Debate>, StoreError>;

    async fn update_debate(&self, debate: Debate) -> Result<(), StoreError>;

    // Turns

    async fn insert_turn(&self, turn: Turn) -> Result<(), StoreError>;

    async fn get_turn(&self, id: Uuid) -> Result<Option<Turn>, StoreError>;

    /// All turns of a debate ordered by turn number.
    async fn list_turns(&self, debate_id: Uuid) -> Result<Vec<Turn>, StoreError>;

    /// Move a pending turn to `status`. Fails with
    /// [`StoreError::AlreadyAnalyzed`] if the turn is no longer pending.
    async fn set_turn_analysis(&self, turn_id: Uuid, status: AnalysisStatus)
    -> Result<(), StoreError>;

    /// Per-side average of `overall_quality` over analyzed turns.
    async fn average_quality_by_side(&self, debate_id: Uuid) -> Result<SideAverages, StoreError>;

    // Votes

    /// Insert or replace the vote for (debate, round, voter). Returns `true`
    /// when a new vote was created.
    async fn upsert_vote(&self, vote: DebateVote) -> Result<bool, StoreError>;

    async fn list_votes(&self, debate_id: Uuid) -> Result<Vec<DebateVote>, StoreError>;

    async fn count_votes(&self, debate_id: Uuid) -> Result<usize, StoreError>;

    // Scores

    /// Fails with [`StoreError::Duplicate`] if the debate is already scored.
    async fn insert_score(&self, score: DebateScore) -> Result<(), StoreError>;

    async fn get_score(&self, debate_id: Uuid) -> Result<Option<DebateScore>, StoreError>;

    // Knowledge

    async fn insert_knowledge(&self, items: Vec<KnowledgeItem>) -> Result<(), StoreError>;

    async fn count_knowledge(&self) -> Result<usize, StoreError>;

    async fn list_knowledge(&self) -> Result<Vec<KnowledgeItem>, StoreError>;

    // Memory

    /// Fails with [`StoreError::Duplicate`] if the turn is already stored.
    async fn insert_memory(&self, entry: DebateMemoryEntry) -> Result<(), StoreError>;

    async fn has_memory(&self, turn_id: Uuid) -> Result<bool, StoreError>;

    /// The `limit` most recent entries, newest first, optionally limited to
    /// one debate.
    async fn recent_memory(
        &self,
        debate_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<DebateMemoryEntry>, StoreError>;
}

#[derive(Default)]
struct Inner {
    debates: HashMap<Uuid, Debate>,
    turns: HashMap<Uuid, Turn>,
    votes: HashMap<(Uuid, u32, String), DebateVote>,
    scores: HashMap<Uuid, DebateScore>,
    knowledge: Vec<KnowledgeItem>,
    /// Append order doubles as recency order.
    memory: Vec<DebateMemoryEntry>,
}

/// [`DebateStore`] held entirely in process memory.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> StoreError {
    StoreError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[async_trait]
impl DebateStore for InMemoryStore {
    async fn insert_debate(&self, debate: Debate) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.debates.contains_key(&debate.id) {
            return Err(StoreError::Duplicate {
                entity: "debate",
                key: debate.id.to_string(),
            });
        }
        inner.debates.insert(debate.id, debate);
        Ok(())
    }

    async fn get_debate(&self, id: Uuid) -> Result<Option<Debate>, StoreError> {
        Ok(self.inner.read().await.debates.get(&id).cloned())
    }

    async fn update_debate(&self, debate: Debate) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        match inner.debates.get_mut(&debate.id) {
            Some(existing) => {
                *existing = debate;
                Ok(())
            }
            None => Err(not_found("debate", debate.id)),
        }
    }

    async fn insert_turn(&self, turn: Turn) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let clash = inner
            .turns
            .values()
            .any(|t| t.debate_id == turn.debate_id && t.turn_number == turn.turn_number);
        if clash || inner.turns.contains_key(&turn.id) {
            return Err(StoreError::Duplicate {
                entity: "turn",
                key: format!("{}#{}", turn.debate_id, turn.turn_number),
            });
        }
        inner.turns.insert(turn.id, turn);
        Ok(())
    }

    async fn get_turn(&self, id: Uuid) -> Result<Option<Turn>, StoreError> {
        Ok(self.inner.read().await.turns.get(&id).cloned())
    }

    async fn list_turns(&self, debate_id: Uuid) -> Result<Vec<Turn>, StoreError> {
        let inner = self.inner.read().await;
        let mut turns: Vec<Turn> = inner
            .turns
            .values()
            .filter(|t| t.debate_id == debate_id)
            .cloned()
            .collect();
        turns.sort_by_key(|t| t.turn_number);
        Ok(turns)
    }

    async fn set_turn_analysis(
        &self,
        turn_id: Uuid,
        status: AnalysisStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let turn = inner
            .turns
            .get_mut(&turn_id)
            .ok_or_else(|| not_found("turn", turn_id))?;
        if turn.analysis != AnalysisStatus::Pending {
            return Err(StoreError::AlreadyAnalyzed(turn_id));
        }
        turn.analysis = status;
        Ok(())
    }

    async fn average_quality_by_side(&self, debate_id: Uuid) -> Result<SideAverages, StoreError> {
        let inner = self.inner.read().await;
        let average = |side: Side| {
            let scores: Vec<f64> = inner
                .turns
                .values()
                .filter(|t| t.debate_id == debate_id && t.side == side)
                .filter_map(|t| t.analysis().map(|a| a.overall_quality))
                .collect();
            (!scores.is_empty()).then(|| scores.iter().sum::<f64>() / scores.len() as f64)
        };
        Ok(SideAverages {
            for_side: average(Side::For),
            against: average(Side::Against),
        })
    }

    async fn upsert_vote(&self, vote: DebateVote) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (vote.debate_id, vote.round, vote.voter.clone());
        Ok(inner.votes.insert(key, vote).is_none())
    }

    async fn list_votes(&self, debate_id: Uuid) -> Result<Vec<DebateVote>, StoreError> {
        let inner = self.inner.read().await;
        let mut votes: Vec<DebateVote> = inner
            .votes
            .values()
            .filter(|v| v.debate_id == debate_id)
            .cloned()
            .collect();
        votes.sort_by(|a, b| a.round.cmp(&b.round).then_with(|| a.voter.cmp(&b.voter)));
        Ok(votes)
    }

    async fn count_votes(&self, debate_id: Uuid) -> Result<usize, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .votes
            .values()
            .filter(|v| v.debate_id == debate_id)
            .count())
    }

    async fn insert_score(&self, score: DebateScore) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.scores.contains_key(&score.debate_id) {
            return Err(StoreError::Duplicate {
                entity: "debate score",
                key: score.debate_id.to_string(),
            });
        }
        inner.scores.insert(score.debate_id, score);
        Ok(())
    }

    async fn get_score(&self, debate_id: Uuid) -> Result<Option<DebateScore>, StoreError> {
        Ok(self.inner.read().await.scores.get(&debate_id).cloned())
    }

    async fn insert_knowledge(&self, items: Vec<KnowledgeItem>) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if let Some(dup) = items
            .iter()
            .find(|item| inner.knowledge.iter().any(|k| k.id == item.id))
        {
            return Err(StoreError::Duplicate {
                entity: "knowledge item",
                key: dup.id.clone(),
            });
        }
        inner.knowledge.extend(items);
        Ok(())
    }

    async fn count_knowledge(&self) -> Result<usize, StoreError> {
        Ok(self.inner.read().await.knowledge.len())
    }

    async fn list_knowledge(&self) -> Result<Vec<KnowledgeItem>, StoreError> {
        Ok(self.inner.read().await.knowledge.clone())
    }

    async fn insert_memory(&self, entry: DebateMemoryEntry) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.memory.iter().any(|m| m.turn_id == entry.turn_id) {
            return Err(StoreError::Duplicate {
                entity: "memory entry",
                key: entry.turn_id.to_string(),
            });
        }
        inner.memory.push(entry);
        Ok(())
    }

    async fn has_memory(&self, turn_id: Uuid) -> Result<bool, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.memory.iter().any(|m| m.turn_id == turn_id))
    }

    async fn recent_memory(
        &self,
        debate_id: Option<Uuid>,
        limit: usize,
    ) -> Result<Vec<DebateMemoryEntry>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .memory
            .iter()
            .rev()
            .filter(|m| debate_id.is_none_or(|id| m.debate_id == id))
            .take(limit)
            .cloned()
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MemoryMetadata, TurnAnalysis};
    use chrono::Utc;

    fn memory_entry(turn_id: Uuid, debate_id: Uuid) -> DebateMemoryEntry {
        DebateMemoryEntry {
            turn_id,
            debate_id,
            text: "text".to_string(),
            embedding: Vec::new(),
            metadata: MemoryMetadata {
                topic: "topic".to_string(),
                side: Side::For,
                round: 1,
                quality: 50.0,
            },
            created_at: Utc::now(),
        }
    }

    fn analysis(overall: f64) -> AnalysisStatus {
        AnalysisStatus::Complete(Box::new(TurnAnalysis {
            claims: Vec::new(),
            rebuttals: Vec::new(),
            fallacies: Vec::new(),
            tone_score: 50.0,
            clarity_score: 50.0,
            evidence_quality: 50.0,
            overall_quality: overall,
            decision_trace: Vec::new(),
            retrieved_sources: Vec::new(),
            analyzed_at: Utc::now(),
        }))
    }

    #[tokio::test]
    async fn test_memory_unique_by_turn() {
        let store = InMemoryStore::new();
        let turn_id = Uuid::new_v4();
        let debate_id = Uuid::new_v4();

        store.insert_memory(memory_entry(turn_id, debate_id)).await.unwrap();
        let err = store
            .insert_memory(memory_entry(turn_id, debate_id))
            .await
            .unwrap_err();
        assert!(err.is_duplicate());
        assert!(store.has_memory(turn_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_recent_memory_newest_first_with_filter() {
        let store = InMemoryStore::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        store.insert_memory(memory_entry(first, a)).await.unwrap();
        store.insert_memory(memory_entry(Uuid::new_v4(), b)).await.unwrap();
        store.insert_memory(memory_entry(second, a)).await.unwrap();

        let recent = store.recent_memory(Some(a), 10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].turn_id, second);
        assert_eq!(recent[1].turn_id, first);

        assert_eq!(store.recent_memory(None, 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_score_unique_per_debate() {
        let store = InMemoryStore::new();
        let score = crate::scoring::tests::sample_score(Uuid::new_v4());
        store.insert_score(score.clone()).await.unwrap();
        assert!(store.insert_score(score).await.unwrap_err().is_duplicate());
    }

    #[tokio::test]
    async fn test_vote_upsert_replaces() {
        let store = InMemoryStore::new();
        let debate_id = Uuid::new_v4();
        let mut vote = DebateVote {
            debate_id,
            round: 1,
            voter: "carol".to_string(),
            vote: Side::For,
            confidence: 3,
            cast_at: Utc::now(),
        };
        assert!(store.upsert_vote(vote.clone()).await.unwrap());
        vote.vote = Side::Against;
        assert!(!store.upsert_vote(vote).await.unwrap());

        let votes = store.list_votes(debate_id).await.unwrap();
        assert_eq!(votes.len(), 1);
        assert_eq!(votes[0].vote, Side::Against);
        assert_eq!(store.count_votes(debate_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_turn_analysis_written_once() {
        let store = InMemoryStore::new();
        let debate_id = Uuid::new_v4();
        let turn = Turn::new(debate_id, 1, 1, "alice", Side::For, "hello there");
        let turn_id = turn.id;
        store.insert_turn(turn).await.unwrap();

        store.set_turn_analysis(turn_id, analysis(80.0)).await.unwrap();
        let err = store
            .set_turn_analysis(turn_id, analysis(10.0))
            .await
            .unwrap_err();
        assert_eq!(err, StoreError::AlreadyAnalyzed(turn_id));

        let averages = store.average_quality_by_side(debate_id).await.unwrap();
        assert_eq!(averages.for_side, Some(80.0));
        assert_eq!(averages.against, None);
    }
}
