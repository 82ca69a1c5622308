//! Knowledge and debate-memory corpora, queried by similarity.
//!
//! The knowledge corpus is a fixed curated set seeded once and then only
//! read. The memory corpus grows by one entry per analyzed turn and is scanned
//! linearly, so reads are bounded by a most-recent candidate cap.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embedding::{cosine_similarity, embed};
use crate::error::StoreError;
use crate::model::{
    Debate, DebateMemoryEntry, KnowledgeCategory, KnowledgeItem, MemoryMetadata, NEUTRAL_SCORE,
    Turn,
};
use crate::participant::Side;
use crate::store::DebateStore;

mod seed;

/// Default cap on memory entries considered per query.
pub const DEFAULT_MEMORY_CANDIDATE_LIMIT: usize = 500;

/// A knowledge item scored against a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeMatch {
    pub id: String,
    pub content: String,
    pub category: KnowledgeCategory,
    pub kind: String,
    pub similarity: f32,
}

/// A memory entry scored against a query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryMatch {
    pub turn_id: Uuid,
    pub debate_id: Uuid,
    pub content: String,
    pub metadata: MemoryMetadata,
    pub similarity: f32,
}

/// Restricts which memory entries a query may return.
#[derive(Debug, Clone, Default)]
pub struct MemoryFilter {
    pub debate_id: Option<Uuid>,
    pub side: Option<Side>,
    pub min_quality: Option<f64>,
}

impl MemoryFilter {
    fn accepts(&self, entry: &DebateMemoryEntry) -> bool {
        self.side.is_none_or(|side| entry.metadata.side == side)
            && self
                .min_quality
                .is_none_or(|min| entry.metadata.quality >= min)
    }
}

/// Accessor over the knowledge and memory corpora.
pub struct KnowledgeService {
    store: Arc<dyn DebateStore>,
    memory_candidate_limit: usize,
}

impl KnowledgeService {
    pub fn new(store: Arc<dyn DebateStore>) -> Self {
        Self {
            store,
            memory_candidate_limit: DEFAULT_MEMORY_CANDIDATE_LIMIT,
        }
    }

    /// Override the most-recent cap applied before memory scoring.
    pub fn with_memory_candidate_limit(mut self, limit: usize) -> Self {
        self.memory_candidate_limit = limit.max(1);
        self
    }

    /// Populate the knowledge corpus with the curated set if it is empty.
    ///
    /// Returns the number of items inserted (0 when already seeded).
    pub async fn seed_knowledge(&self) -> Result<usize, StoreError> {
        if self.store.count_knowledge().await? > 0 {
            tracing::debug!("Knowledge corpus already seeded");
            return Ok(0);
        }

        let items: Vec<KnowledgeItem> = seed::SEED_KNOWLEDGE
            .iter()
            .map(|s| KnowledgeItem {
                id: s.id.to_string(),
                text: s.text.to_string(),
                category: s.category,
                kind: s.kind.to_string(),
                embedding: embed(s.text),
            })
            .collect();
        let count = items.len();

        match self.store.insert_knowledge(items).await {
            Ok(()) => {
                tracing::info!(items = count, "Seeded knowledge corpus");
                Ok(count)
            }
            // A concurrent seeder won the race.
            Err(e) if e.is_duplicate() => Ok(0),
            Err(e) => Err(e),
        }
    }

    /// Top `top_k` knowledge items by similarity to `query`.
    ///
    /// Never fails: an unseeded or unreachable store yields an empty list.
    pub async fn retrieve_knowledge(&self, query: &str, top_k: usize) -> Vec<KnowledgeMatch> {
        self.try_retrieve_knowledge(query, top_k)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Knowledge retrieval failed");
                Vec::new()
            })
    }

    pub async fn try_retrieve_knowledge(
        &self,
        query: &str,
        top_k: usize,
    ) -> Result<Vec<KnowledgeMatch>, StoreError> {
        let items = self.store.list_knowledge().await?;
        if items.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = embed(query);
        let scored = items
            .into_iter()
            .map(|item| {
                let similarity = cosine_similarity(&query_vec, &item.embedding);
                KnowledgeMatch {
                    id: item.id,
                    content: item.text,
                    category: item.category,
                    kind: item.kind,
                    similarity,
                }
            })
            .collect();

        Ok(top_by_similarity(scored, top_k, |m| m.similarity))
    }

    /// Top `top_k` memory entries by similarity to `query`.
    pub async fn retrieve_memory(
        &self,
        query: &str,
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Vec<MemoryMatch> {
        self.try_retrieve_memory(query, top_k, filter)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Memory retrieval failed");
                Vec::new()
            })
    }

    pub async fn try_retrieve_memory(
        &self,
        query: &str,
        top_k: usize,
        filter: &MemoryFilter,
    ) -> Result<Vec<MemoryMatch>, StoreError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self
            .store
            .recent_memory(filter.debate_id, self.memory_candidate_limit)
            .await?;

        let query_vec = embed(query);
        let scored = candidates
            .into_iter()
            .filter(|entry| filter.accepts(entry))
            .map(|entry| {
                let similarity = cosine_similarity(&query_vec, &entry.embedding);
                MemoryMatch {
                    turn_id: entry.turn_id,
                    debate_id: entry.debate_id,
                    content: entry.text,
                    metadata: entry.metadata,
                    similarity,
                }
            })
            .collect();

        Ok(top_by_similarity(scored, top_k, |m| m.similarity))
    }

    /// Remember an analyzed turn for future retrieval.
    ///
    /// Idempotent per turn. Failures are logged and swallowed; returns `true`
    /// only when a new entry was stored.
    pub async fn add_memory(&self, turn: &Turn, debate: &Debate) -> bool {
        match self.store.has_memory(turn.id).await {
            Ok(true) => return false,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(turn_id = %turn.id, error = %e, "Memory lookup failed");
                return false;
            }
        }

        let entry = DebateMemoryEntry {
            turn_id: turn.id,
            debate_id: turn.debate_id,
            text: turn.content.clone(),
            embedding: embed(&turn.content),
            metadata: MemoryMetadata {
                topic: debate.topic.clone(),
                side: turn.side,
                round: turn.round,
                quality: turn
                    .analysis()
                    .map(|a| a.overall_quality)
                    .unwrap_or(NEUTRAL_SCORE),
            },
            created_at: Utc::now(),
        };

        match self.store.insert_memory(entry).await {
            Ok(()) => {
                tracing::debug!(turn_id = %turn.id, "Stored debate memory");
                true
            }
            Err(e) if e.is_duplicate() => false,
            Err(e) => {
                tracing::warn!(turn_id = %turn.id, error = %e, "Failed to store debate memory");
                false
            }
        }
    }
}

/// Sort descending by similarity (stable, so earlier items win ties) and keep
/// the first `top_k`.
fn top_by_similarity<T>(mut items: Vec<T>, top_k: usize, similarity: impl Fn(&T) -> f32) -> Vec<T> {
    items.sort_by(|a, b| similarity(b).total_cmp(&similarity(a)));
    items.truncate(top_k);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn service() -> KnowledgeService {
        KnowledgeService::new(Arc::new(InMemoryStore::new()))
    }

    fn debate(topic: &str) -> Debate {
        Debate {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            description: None,
            status: crate::model::DebateStatus::Active,
            rounds: Vec::new(),
            current_round: 1,
            current_turn_user: None,
            participants: Vec::new(),
            turn_count: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let knowledge = service();
        let first = knowledge.seed_knowledge().await.unwrap();
        assert!(first > 0);
        assert_eq!(knowledge.seed_knowledge().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_retrieve_knowledge_unseeded_is_empty() {
        let knowledge = service();
        assert!(knowledge.retrieve_knowledge("anything", 3).await.is_empty());
    }

    #[tokio::test]
    async fn test_retrieve_knowledge_ranks_relevant_first() {
        let knowledge = service();
        knowledge.seed_knowledge().await.unwrap();

        let results = knowledge
            .retrieve_knowledge("a peer-reviewed study published in a journal", 3)
            .await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].kind, "strong_evidence");
        assert!(results[0].similarity >= results[1].similarity);
        assert!(results[1].similarity >= results[2].similarity);
    }

    #[tokio::test]
    async fn test_add_memory_twice_stores_once() {
        let store = Arc::new(InMemoryStore::new());
        let knowledge = KnowledgeService::new(store.clone());
        let debate = debate("school uniforms");
        let turn = Turn::new(debate.id, 1, 1, "alice", Side::For, "Uniforms reduce bullying.");

        assert!(knowledge.add_memory(&turn, &debate).await);
        assert!(!knowledge.add_memory(&turn, &debate).await);
        assert_eq!(store.recent_memory(None, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_retrieve_memory_applies_filters_and_cap() {
        let store = Arc::new(InMemoryStore::new());
        let knowledge = KnowledgeService::new(store.clone()).with_memory_candidate_limit(2);
        let debate = debate("nuclear power");

        let old = Turn::new(debate.id, 1, 1, "alice", Side::For, "nuclear power is safe");
        let mid = Turn::new(debate.id, 1, 2, "bob", Side::Against, "nuclear waste lasts");
        let new = Turn::new(debate.id, 2, 3, "alice", Side::For, "nuclear is clean power");
        for turn in [&old, &mid, &new] {
            knowledge.add_memory(turn, &debate).await;
        }

        // The oldest entry falls outside the candidate cap.
        let all = knowledge
            .retrieve_memory("nuclear power", 10, &MemoryFilter::default())
            .await;
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|m| m.turn_id != old.id));

        let for_only = knowledge
            .retrieve_memory(
                "nuclear power",
                10,
                &MemoryFilter {
                    side: Some(Side::For),
                    ..Default::default()
                },
            )
            .await;
        assert_eq!(for_only.len(), 1);
        assert_eq!(for_only[0].turn_id, new.id);
        assert_eq!(for_only[0].metadata.topic, "nuclear power");
    }
}
