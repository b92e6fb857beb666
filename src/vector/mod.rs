//! Vector records, store and embedding collaborator seams.
//!
//! The core treats a [`Vector`] as an opaque unit of retrievable content
//! addressed by `id`. Stores are internally synchronized so a branch may
//! opt into sharing one across forks; by default every branch owns its
//! store (see [`crate::branch::PipelineBranch::fork`]).

mod embedding;

pub use embedding::HashingEmbedder;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::ProviderResult;

/// A unit of retrievable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    /// Stable identifier; merge conflicts are grouped by this.
    pub id: String,
    /// Source text of the document.
    pub text: String,
    /// Free-form string metadata.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Embedding of `text`.
    pub embedding: Vec<f32>,
}

impl Vector {
    /// Create a vector with empty metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            metadata: HashMap::new(),
            embedding,
        }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Embedding model collaborator seam.
#[async_trait]
pub trait EmbeddingModel: Send + Sync {
    /// Embed a piece of text into a float vector.
    async fn embed(&self, text: &str, cancel: &CancellationToken) -> ProviderResult<Vec<f32>>;
}

/// Vector store collaborator seam.
///
/// Implementations must be internally synchronized; the core never takes
/// its own locks around store calls.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Add a batch of vectors to the store.
    async fn add(&self, vectors: Vec<Vector>);

    /// Return the `k` most similar vectors to `embedding`, best first.
    async fn similarity_search(&self, embedding: &[f32], k: usize) -> Vec<Vector>;

    /// Flatten the store into plain vector records (snapshot/merge).
    async fn export(&self) -> Vec<Vector>;

    /// Number of stored vectors.
    async fn len(&self) -> usize;
}

/// Cosine similarity between two embeddings.
///
/// Returns 0.0 for zero-magnitude or length-mismatched inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

/// In-memory vector store scanning with cosine similarity.
///
/// Search is a full scan: score every entry, sort descending, drop
/// non-positive scores, take `k`. Equal scores keep insertion order.
#[derive(Default)]
pub struct InMemoryVectorStore {
    entries: RwLock<Vec<Vector>>,
}

impl InMemoryVectorStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store behind an `Arc<dyn VectorStore>` handle.
    pub fn shared() -> Arc<dyn VectorStore> {
        Arc::new(Self::new())
    }

    /// Create a store pre-populated with `vectors`.
    pub fn from_vectors(vectors: Vec<Vector>) -> Self {
        Self {
            entries: RwLock::new(vectors),
        }
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, vectors: Vec<Vector>) {
        self.entries.write().await.extend(vectors);
    }

    async fn similarity_search(&self, embedding: &[f32], k: usize) -> Vec<Vector> {
        let entries = self.entries.read().await;
        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| (idx, cosine_similarity(embedding, &entry.embedding)))
            .collect();

        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .filter(|(_, score)| *score > 0.0)
            .take(k)
            .map(|(idx, _)| entries[idx].clone())
            .collect()
    }

    async fn export(&self) -> Vec<Vector> {
        self.entries.read().await.clone()
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}
