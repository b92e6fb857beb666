//! Event-sourced pipeline branches.
//!
//! A [`PipelineBranch`] is an immutable value: a name, a vector store
//! handle, a data-source handle, and an ordered, append-only event list.
//! Every mutation-shaped operation returns a **new** branch whose event
//! list is the previous one plus the new events; the receiver is never
//! changed. Current reasoning state is whatever a replay of the event
//! log says it is, which is what makes replay, audit, and branching
//! cheap.
//!
//! Two branch values may share the same store handle (they then observe
//! each other's ingests); [`PipelineBranch::fork`] installs a fresh store
//! so exploration on the fork cannot affect the original's retrievals.

pub mod snapshot;

pub use snapshot::{capture, restore, restore_with_source, BranchSnapshot};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::error::{AppError, SourceError};
use crate::vector::{EmbeddingModel, Vector, VectorStore};

/// The kind of a reasoning state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    /// A first draft.
    Draft,
    /// A critique of the latest draft or final spec.
    Critique,
    /// An improved, final version.
    FinalSpec,
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateKind::Draft => write!(f, "draft"),
            StateKind::Critique => write!(f, "critique"),
            StateKind::FinalSpec => write!(f, "final_spec"),
        }
    }
}

impl std::str::FromStr for StateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(StateKind::Draft),
            "critique" => Ok(StateKind::Critique),
            "final_spec" => Ok(StateKind::FinalSpec),
            _ => Err(format!("Unknown state kind: {}", s)),
        }
    }
}

/// One produced reasoning state, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReasoningState {
    /// A first draft.
    Draft {
        /// Generated draft text.
        text: String,
    },
    /// A critique of the latest draft or final spec.
    Critique {
        /// Generated critique text.
        text: String,
    },
    /// An improved, final version.
    FinalSpec {
        /// Generated final text.
        text: String,
    },
}

impl ReasoningState {
    /// The kind tag of this state.
    pub fn kind(&self) -> StateKind {
        match self {
            ReasoningState::Draft { .. } => StateKind::Draft,
            ReasoningState::Critique { .. } => StateKind::Critique,
            ReasoningState::FinalSpec { .. } => StateKind::FinalSpec,
        }
    }

    /// The generated text this state carries.
    pub fn text(&self) -> &str {
        match self {
            ReasoningState::Draft { text }
            | ReasoningState::Critique { text }
            | ReasoningState::FinalSpec { text } => text,
        }
    }
}

/// The recorded effect of one executed tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Tool name as invoked.
    pub name: String,
    /// Raw argument text.
    pub arguments: String,
    /// Tool output (or inline error text).
    pub output: String,
}

/// One immutable entry in a branch's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// One Draft/Critique/FinalSpec production.
    ReasoningStep {
        /// Unique event identifier.
        id: String,
        /// The produced state.
        state: ReasoningState,
        /// The full prompt the model was called with.
        prompt: String,
        /// Tool calls executed during this production.
        #[serde(default)]
        tool_calls: Vec<ToolCallRecord>,
        /// When the event was appended.
        created_at: DateTime<Utc>,
    },
    /// A batch of documents added to the vector store.
    IngestBatch {
        /// Unique event identifier.
        id: String,
        /// Label of the data source the batch came from.
        source_label: String,
        /// Ids of the ingested documents.
        document_ids: Vec<String>,
        /// When the event was appended.
        created_at: DateTime<Utc>,
    },
}

impl PipelineEvent {
    /// Unique id of the event.
    pub fn id(&self) -> &str {
        match self {
            PipelineEvent::ReasoningStep { id, .. } | PipelineEvent::IngestBatch { id, .. } => id,
        }
    }
}

/// A document produced by a data source, before embedding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Stable document identifier.
    pub id: String,
    /// Document text.
    pub text: String,
    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SourceDocument {
    /// Create a document with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }
}

/// Data-source collaborator seam: where ingested documents come from.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Label recorded on `IngestBatch` events.
    fn label(&self) -> &str;

    /// Load the source's documents.
    async fn load(&self, cancel: &CancellationToken) -> Result<Vec<SourceDocument>, SourceError>;
}

/// A fixed, in-memory document set.
pub struct StaticSource {
    label: String,
    documents: Vec<SourceDocument>,
}

impl StaticSource {
    /// Create a source over a fixed document set.
    pub fn new(label: impl Into<String>, documents: Vec<SourceDocument>) -> Self {
        Self {
            label: label.into(),
            documents,
        }
    }

    /// Create a source with no documents.
    pub fn empty(label: impl Into<String>) -> Self {
        Self::new(label, Vec::new())
    }
}

#[async_trait]
impl DataSource for StaticSource {
    fn label(&self) -> &str {
        &self.label
    }

    async fn load(&self, cancel: &CancellationToken) -> Result<Vec<SourceDocument>, SourceError> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        Ok(self.documents.clone())
    }
}

/// An immutable, event-sourced execution branch.
#[derive(Clone)]
pub struct PipelineBranch {
    name: String,
    store: Arc<dyn VectorStore>,
    source: Arc<dyn DataSource>,
    events: Vec<PipelineEvent>,
}

impl fmt::Debug for PipelineBranch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBranch")
            .field("name", &self.name)
            .field("events", &self.events.len())
            .finish()
    }
}

impl PipelineBranch {
    /// Create a branch with an empty event list.
    pub fn new(
        name: impl Into<String>,
        store: Arc<dyn VectorStore>,
        source: Arc<dyn DataSource>,
    ) -> Self {
        Self {
            name: name.into(),
            store,
            source,
            events: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        name: String,
        store: Arc<dyn VectorStore>,
        source: Arc<dyn DataSource>,
        events: Vec<PipelineEvent>,
    ) -> Self {
        Self {
            name,
            store,
            source,
            events,
        }
    }

    /// Branch name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The branch's vector store handle.
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// The branch's data-source handle.
    pub fn source(&self) -> &Arc<dyn DataSource> {
        &self.source
    }

    /// The ordered, append-only event log.
    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    /// Number of events in the log.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Derive a new branch with one additional `ReasoningStep` event.
    ///
    /// # Panics
    ///
    /// Panics if `prompt` is empty: a reasoning step without its prompt
    /// cannot be replayed or audited, so this is a programming error,
    /// not a recoverable failure.
    pub fn with_reasoning(
        &self,
        state: ReasoningState,
        prompt: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        let prompt = prompt.into();
        assert!(
            !prompt.trim().is_empty(),
            "a reasoning step requires a non-empty prompt"
        );

        let mut next = self.clone();
        next.events.push(PipelineEvent::ReasoningStep {
            id: Uuid::new_v4().to_string(),
            state,
            prompt,
            tool_calls,
            created_at: Utc::now(),
        });
        next
    }

    /// Derive a new branch with one additional `IngestBatch` event.
    pub fn with_ingest_event(
        &self,
        source_label: impl Into<String>,
        document_ids: Vec<String>,
    ) -> Self {
        let mut next = self.clone();
        next.events.push(PipelineEvent::IngestBatch {
            id: Uuid::new_v4().to_string(),
            source_label: source_label.into(),
            document_ids,
            created_at: Utc::now(),
        });
        next
    }

    /// Clone the branch's history under a new name with a different
    /// (typically empty) vector store, so exploration on the fork cannot
    /// affect this branch's future retrieval results.
    pub fn fork(&self, new_name: impl Into<String>, new_store: Arc<dyn VectorStore>) -> Self {
        Self {
            name: new_name.into(),
            store: new_store,
            source: Arc::clone(&self.source),
            events: self.events.clone(),
        }
    }

    /// Most recent `Draft` or `FinalSpec` state, if any.
    ///
    /// Deliberately matches both kinds: repeated Critique/Improve cycles
    /// must critique the latest improvement, not the original draft.
    pub fn latest_draft_or_final(&self) -> Option<&ReasoningState> {
        self.events.iter().rev().find_map(|event| match event {
            PipelineEvent::ReasoningStep { state, .. }
                if matches!(
                    state,
                    ReasoningState::Draft { .. } | ReasoningState::FinalSpec { .. }
                ) =>
            {
                Some(state)
            }
            _ => None,
        })
    }

    /// Most recent `Critique` state, if any.
    pub fn latest_critique(&self) -> Option<&ReasoningState> {
        self.events.iter().rev().find_map(|event| match event {
            PipelineEvent::ReasoningStep {
                state: state @ ReasoningState::Critique { .. },
                ..
            } => Some(state),
            _ => None,
        })
    }

    /// All reasoning states in insertion order.
    pub fn reasoning_states(&self) -> Vec<&ReasoningState> {
        self.events
            .iter()
            .filter_map(|event| match event {
                PipelineEvent::ReasoningStep { state, .. } => Some(state),
                _ => None,
            })
            .collect()
    }
}

/// Load the branch's data source, embed every document, add the vectors
/// to the branch's store, and append one `IngestBatch` event.
///
/// Returns a new branch; the receiver is unchanged. The event is
/// appended only after embedding and the store write fully complete.
pub async fn ingest(
    branch: &PipelineBranch,
    embedder: &Arc<dyn EmbeddingModel>,
    cancel: &CancellationToken,
) -> Result<PipelineBranch, AppError> {
    let documents = branch.source().load(cancel).await?;

    let mut vectors = Vec::with_capacity(documents.len());
    let mut document_ids = Vec::with_capacity(documents.len());
    for doc in documents {
        let embedding = embedder.embed(&doc.text, cancel).await?;
        document_ids.push(doc.id.clone());
        vectors.push(Vector {
            id: doc.id,
            text: doc.text,
            metadata: doc.metadata,
            embedding,
        });
    }

    branch.store().add(vectors).await;

    info!(
        branch = %branch.name(),
        source = %branch.source().label(),
        documents = document_ids.len(),
        "Ingested document batch"
    );

    Ok(branch.with_ingest_event(branch.source().label().to_string(), document_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{HashingEmbedder, InMemoryVectorStore};
    use pretty_assertions::assert_eq;

    fn test_branch() -> PipelineBranch {
        PipelineBranch::new(
            "main",
            InMemoryVectorStore::shared(),
            Arc::new(StaticSource::empty("test")),
        )
    }

    fn draft(text: &str) -> ReasoningState {
        ReasoningState::Draft {
            text: text.to_string(),
        }
    }

    #[test]
    fn test_state_kind_display_and_parse() {
        assert_eq!(StateKind::Draft.to_string(), "draft");
        assert_eq!(StateKind::FinalSpec.to_string(), "final_spec");
        assert_eq!("critique".parse::<StateKind>().unwrap(), StateKind::Critique);
        assert!("bogus".parse::<StateKind>().is_err());
    }

    #[test]
    fn test_state_accessors() {
        let state = ReasoningState::FinalSpec {
            text: "done".to_string(),
        };
        assert_eq!(state.kind(), StateKind::FinalSpec);
        assert_eq!(state.text(), "done");
    }

    #[test]
    fn test_with_reasoning_returns_new_branch() {
        let branch = test_branch();
        let extended = branch.with_reasoning(draft("v1"), "prompt text", Vec::new());

        // The receiver still reports zero events.
        assert_eq!(branch.len(), 0);
        assert_eq!(extended.len(), 1);
        assert_eq!(extended.latest_draft_or_final().unwrap().text(), "v1");
    }

    #[test]
    fn test_events_are_appended_in_order() {
        let branch = test_branch()
            .with_reasoning(draft("v1"), "p1", Vec::new())
            .with_ingest_event("docs", vec!["d1".to_string()])
            .with_reasoning(
                ReasoningState::Critique {
                    text: "weak".to_string(),
                },
                "p2",
                Vec::new(),
            );

        assert_eq!(branch.len(), 3);
        assert!(matches!(
            branch.events()[0],
            PipelineEvent::ReasoningStep { .. }
        ));
        assert!(matches!(
            branch.events()[1],
            PipelineEvent::IngestBatch { .. }
        ));
    }

    #[test]
    #[should_panic(expected = "non-empty prompt")]
    fn test_with_reasoning_panics_on_empty_prompt() {
        test_branch().with_reasoning(draft("v1"), "   ", Vec::new());
    }

    #[test]
    fn test_latest_draft_or_final_prefers_final_spec() {
        let branch = test_branch()
            .with_reasoning(draft("original draft"), "p1", Vec::new())
            .with_reasoning(
                ReasoningState::Critique {
                    text: "too short".to_string(),
                },
                "p2",
                Vec::new(),
            )
            .with_reasoning(
                ReasoningState::FinalSpec {
                    text: "improved".to_string(),
                },
                "p3",
                Vec::new(),
            );

        let latest = branch.latest_draft_or_final().unwrap();
        assert_eq!(latest.kind(), StateKind::FinalSpec);
        assert_eq!(latest.text(), "improved");
    }

    #[test]
    fn test_latest_critique() {
        let branch = test_branch();
        assert!(branch.latest_critique().is_none());

        let branch = branch
            .with_reasoning(draft("v1"), "p", Vec::new())
            .with_reasoning(
                ReasoningState::Critique {
                    text: "first".to_string(),
                },
                "p",
                Vec::new(),
            )
            .with_reasoning(
                ReasoningState::Critique {
                    text: "second".to_string(),
                },
                "p",
                Vec::new(),
            );

        assert_eq!(branch.latest_critique().unwrap().text(), "second");
    }

    #[test]
    fn test_fork_shares_history_but_not_name() {
        let branch = test_branch().with_reasoning(draft("v1"), "p", Vec::new());
        let fork = branch.fork("experiment", InMemoryVectorStore::shared());

        assert_eq!(fork.name(), "experiment");
        assert_eq!(fork.events(), branch.events());
    }

    #[tokio::test]
    async fn test_fork_store_is_independent() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new());
        let cancel = CancellationToken::new();

        let source = Arc::new(StaticSource::new(
            "docs",
            vec![SourceDocument::new("d1", "tenant cache eviction")],
        ));
        let branch = PipelineBranch::new("main", InMemoryVectorStore::shared(), source);

        let fork = branch.fork("fork", InMemoryVectorStore::shared());
        let fork = ingest(&fork, &embedder, &cancel).await.unwrap();

        // Ingesting into the fork does not change the original's
        // retrievable documents.
        assert_eq!(branch.store().len().await, 0);
        assert_eq!(fork.store().len().await, 1);
        assert_eq!(fork.len(), 1);
        assert_eq!(branch.len(), 0);
    }

    #[tokio::test]
    async fn test_ingest_records_document_ids() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new());
        let cancel = CancellationToken::new();

        let source = Arc::new(StaticSource::new(
            "notes",
            vec![
                SourceDocument::new("a", "first document"),
                SourceDocument::new("b", "second document"),
            ],
        ));
        let branch = PipelineBranch::new("main", InMemoryVectorStore::shared(), source);
        let branch = ingest(&branch, &embedder, &cancel).await.unwrap();

        match &branch.events()[0] {
            PipelineEvent::IngestBatch {
                source_label,
                document_ids,
                ..
            } => {
                assert_eq!(source_label, "notes");
                assert_eq!(document_ids, &vec!["a".to_string(), "b".to_string()]);
            }
            other => panic!("expected IngestBatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancelled_ingest_appends_nothing() {
        let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let source = Arc::new(StaticSource::new(
            "docs",
            vec![SourceDocument::new("d1", "text")],
        ));
        let branch = PipelineBranch::new("main", InMemoryVectorStore::shared(), source);

        assert!(ingest(&branch, &embedder, &cancel).await.is_err());
        assert_eq!(branch.len(), 0);
        assert_eq!(branch.store().len().await, 0);
    }

    #[test]
    fn test_event_serde_is_kind_tagged() {
        let event = PipelineEvent::ReasoningStep {
            id: "e-1".to_string(),
            state: draft("text"),
            prompt: "p".to_string(),
            tool_calls: vec![ToolCallRecord {
                name: "math".to_string(),
                arguments: "1+1".to_string(),
                output: "2".to_string(),
            }],
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "reasoning_step");
        assert_eq!(json["state"]["kind"], "draft");
        assert_eq!(json["tool_calls"][0]["name"], "math");

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_ingest_event_serde() {
        let event = PipelineEvent::IngestBatch {
            id: "e-2".to_string(),
            source_label: "docs".to_string(),
            document_ids: vec!["a".to_string()],
            created_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "ingest_batch");
        assert_eq!(json["source_label"], "docs");

        let back: PipelineEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_reasoning_states_projection() {
        let branch = test_branch()
            .with_reasoning(draft("v1"), "p", Vec::new())
            .with_ingest_event("docs", Vec::new())
            .with_reasoning(
                ReasoningState::Critique {
                    text: "c".to_string(),
                },
                "p",
                Vec::new(),
            );

        let states = branch.reasoning_states();
        assert_eq!(states.len(), 2);
        assert_eq!(states[0].kind(), StateKind::Draft);
        assert_eq!(states[1].kind(), StateKind::Critique);
    }
}
