//! Retrieval orchestration across the knowledge and memory corpora.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::knowledge::{KnowledgeMatch, KnowledgeService, MemoryFilter, MemoryMatch};
use crate::model::{KnowledgeCategory, MemoryMetadata};

/// A corpus that can contribute retrieved context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalSource {
    Knowledge,
    Memory,
}

impl fmt::Display for RetrievalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalSource::Knowledge => f.write_str("knowledge"),
            RetrievalSource::Memory => f.write_str("memory"),
        }
    }
}

/// Parameters for [`RetrievalOrchestrator::retrieve_context`].
#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub sources: Vec<RetrievalSource>,
    /// Cap applied to each source independently.
    pub top_k: usize,
    /// Restrict memory results to one debate.
    pub debate_id: Option<Uuid>,
    /// Drop items scoring below this similarity.
    pub min_similarity: f32,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            sources: vec![RetrievalSource::Knowledge, RetrievalSource::Memory],
            top_k: 5,
            debate_id: None,
            min_similarity: 0.0,
        }
    }
}

/// Source-specific metadata of a retrieved item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ItemMetadata {
    Knowledge {
        category: KnowledgeCategory,
        kind: String,
    },
    Memory {
        debate_id: Uuid,
        turn_id: Uuid,
        #[serde(flatten)]
        memory: MemoryMetadata,
    },
}

/// A snippet with its provenance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievedItem {
    pub id: String,
    pub source: RetrievalSource,
    pub content: String,
    pub metadata: ItemMetadata,
    pub similarity: f32,
}

impl RetrievedItem {
    /// Subtype tag of a knowledge item.
    pub fn knowledge_kind(&self) -> Option<&str> {
        match &self.metadata {
            ItemMetadata::Knowledge { kind, .. } => Some(kind),
            ItemMetadata::Memory { .. } => None,
        }
    }

    /// Short provenance label, e.g. `knowledge:straw_man (0.41)`.
    pub fn label(&self) -> String {
        match &self.metadata {
            ItemMetadata::Knowledge { kind, .. } => {
                format!("{}:{} ({:.2})", self.source, kind, self.similarity)
            }
            ItemMetadata::Memory { memory, .. } => format!(
                "{}:{} round {} ({:.2})",
                self.source, memory.side, memory.round, self.similarity
            ),
        }
    }
}

impl From<KnowledgeMatch> for RetrievedItem {
    fn from(m: KnowledgeMatch) -> Self {
        Self {
            id: m.id,
            source: RetrievalSource::Knowledge,
            content: m.content,
            metadata: ItemMetadata::Knowledge {
                category: m.category,
                kind: m.kind,
            },
            similarity: m.similarity,
        }
    }
}

impl From<MemoryMatch> for RetrievedItem {
    fn from(m: MemoryMatch) -> Self {
        Self {
            id: m.turn_id.to_string(),
            source: RetrievalSource::Memory,
            content: m.content,
            metadata: ItemMetadata::Memory {
                debate_id: m.debate_id,
                turn_id: m.turn_id,
                memory: m.metadata,
            },
            similarity: m.similarity,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetrievalMetadata {
    pub sources: Vec<RetrievalSource>,
    pub top_k: usize,
    /// Sources that failed and contributed nothing.
    pub failed_sources: Vec<RetrievalSource>,
    pub elapsed_ms: u64,
}

/// Merged result of one retrieval call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RetrievedContext {
    pub knowledge: Vec<RetrievedItem>,
    pub memory: Vec<RetrievedItem>,
    pub knowledge_count: usize,
    pub memory_count: usize,
    pub metadata: RetrievalMetadata,
}

impl RetrievedContext {
    pub fn items(&self) -> impl Iterator<Item = &RetrievedItem> {
        self.knowledge.iter().chain(self.memory.iter())
    }

    /// Provenance labels of every item, knowledge first.
    pub fn source_labels(&self) -> Vec<String> {
        self.items().map(RetrievedItem::label).collect()
    }

    /// Render snippets for injection into a prompt. Empty when nothing was
    /// retrieved.
    pub fn prompt_block(&self) -> String {
        let mut block = String::new();
        if !self.knowledge.is_empty() {
            block.push_str("Reference knowledge:\n");
            for item in &self.knowledge {
                block.push_str(&format!("- {}\n", item.content));
            }
        }
        if !self.memory.is_empty() {
            block.push_str("Similar arguments from past debates:\n");
            for item in &self.memory {
                block.push_str(&format!("- {}\n", truncate_chars(&item.content, 300)));
            }
        }
        block
    }
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Fans a query out to the requested corpora and merges the results.
pub struct RetrievalOrchestrator {
    knowledge: Arc<KnowledgeService>,
}

impl RetrievalOrchestrator {
    pub fn new(knowledge: Arc<KnowledgeService>) -> Self {
        Self { knowledge }
    }

    /// Retrieve context for `query` from every requested source.
    ///
    /// Never fails: a failing source contributes an empty list and is listed
    /// in `metadata.failed_sources`.
    pub async fn retrieve_context(&self, query: &str, options: &RetrievalOptions) -> RetrievedContext {
        let started = Instant::now();
        let wants = |source| options.sources.contains(&source);

        let knowledge_fut = async {
            if wants(RetrievalSource::Knowledge) {
                Some(
                    self.knowledge
                        .try_retrieve_knowledge(query, options.top_k)
                        .await,
                )
            } else {
                None
            }
        };
        let memory_filter = MemoryFilter {
            debate_id: options.debate_id,
            ..Default::default()
        };
        let memory_fut = async {
            if wants(RetrievalSource::Memory) {
                Some(
                    self.knowledge
                        .try_retrieve_memory(query, options.top_k, &memory_filter)
                        .await,
                )
            } else {
                None
            }
        };

        let (knowledge_result, memory_result) = tokio::join!(knowledge_fut, memory_fut);

        let mut failed_sources = Vec::new();
        let knowledge = collect_source(
            RetrievalSource::Knowledge,
            knowledge_result,
            options.min_similarity,
            &mut failed_sources,
        );
        let memory = collect_source(
            RetrievalSource::Memory,
            memory_result,
            options.min_similarity,
            &mut failed_sources,
        );

        let context = RetrievedContext {
            knowledge_count: knowledge.len(),
            memory_count: memory.len(),
            knowledge,
            memory,
            metadata: RetrievalMetadata {
                sources: options.sources.clone(),
                top_k: options.top_k,
                failed_sources,
                elapsed_ms: started.elapsed().as_millis() as u64,
            },
        };

        tracing::debug!(
            knowledge = context.knowledge_count,
            memory = context.memory_count,
            failed = context.metadata.failed_sources.len(),
            elapsed_ms = context.metadata.elapsed_ms,
            "Retrieved context"
        );

        context
    }
}

fn collect_source<T, E>(
    source: RetrievalSource,
    result: Option<Result<Vec<T>, E>>,
    min_similarity: f32,
    failed: &mut Vec<RetrievalSource>,
) -> Vec<RetrievedItem>
where
    T: Into<RetrievedItem>,
    E: fmt::Display,
{
    match result {
        None => Vec::new(),
        Some(Ok(items)) => items
            .into_iter()
            .map(Into::into)
            .filter(|item: &RetrievedItem| item.similarity >= min_similarity)
            .collect(),
        Some(Err(e)) => {
            tracing::warn!(source = %source, error = %e, "Retrieval source failed");
            failed.push(source);
            Vec::new()
        }
    }
}
