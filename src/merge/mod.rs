//! Relevance-based branch merging.
//!
//! Merging two branches concatenates their event logs (A's then B's) and
//! unions their vectors. When both branches hold a vector under the same
//! id, the conflict is resolved per group: the candidates are scored by
//! similarity to a caller-supplied query and the closest one survives.
//! Groups are resolved independently; this is a deterministic
//! per-conflict tie-break, not a global ranking.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::branch::PipelineBranch;
use crate::error::MergeError;
use crate::vector::{EmbeddingModel, InMemoryVectorStore, Vector, VectorStore};

/// Merge two branches, resolving vector id conflicts by similarity to
/// `query`.
///
/// The merged branch is named `"{a}+{b}"`, its event list is A's events
/// followed by B's, and its store is a fresh in-memory store holding the
/// conflict-resolved vector union. The data-source handle is taken from
/// `a`.
pub async fn merge_by_relevance(
    a: &PipelineBranch,
    b: &PipelineBranch,
    query: &str,
    top_k: usize,
    embedder: &Arc<dyn EmbeddingModel>,
    cancel: &CancellationToken,
) -> Result<PipelineBranch, MergeError> {
    let mut events = a.events().to_vec();
    events.extend_from_slice(b.events());

    let mut union = a.store().export().await;
    union.extend(b.store().export().await);

    // Group by id, preserving first-seen order.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Vector>> = HashMap::new();
    for vector in union {
        if !groups.contains_key(&vector.id) {
            order.push(vector.id.clone());
        }
        groups.entry(vector.id.clone()).or_default().push(vector);
    }

    let query_embedding = embedder.embed(query, cancel).await?;

    let mut kept = Vec::with_capacity(order.len());
    for id in order {
        let group = groups.remove(&id).unwrap_or_default();
        if group.len() == 1 {
            kept.extend(group);
            continue;
        }
        debug!(id = %id, candidates = group.len(), "Resolving vector conflict");
        kept.push(resolve_conflict(group, &query_embedding, top_k).await);
    }

    let store = Arc::new(InMemoryVectorStore::new());
    store.add(kept).await;

    let name = format!("{}+{}", a.name(), b.name());
    info!(
        merged = %name,
        events = events.len(),
        vectors = store.len().await,
        "Merged branches"
    );

    Ok(PipelineBranch::from_parts(
        name,
        store,
        Arc::clone(a.source()),
        events,
    ))
}

/// Pick one survivor from a same-id conflict group.
///
/// A temporary store is built from just this group, with candidates
/// re-keyed by position so a search hit can name a unique winner. Falls
/// back to the group's first candidate when the search returns nothing
/// (for example, all candidates have zero-score embeddings).
async fn resolve_conflict(group: Vec<Vector>, query_embedding: &[f32], top_k: usize) -> Vector {
    let fallback = group[0].clone();

    let temp = InMemoryVectorStore::new();
    let rekeyed: Vec<Vector> = group
        .iter()
        .enumerate()
        .map(|(position, v)| Vector {
            id: format!("{}#{}", v.id, position),
            ..v.clone()
        })
        .collect();
    temp.add(rekeyed).await;

    let hits = temp.similarity_search(query_embedding, top_k.max(1)).await;
    hits.first()
        .and_then(|hit| hit.id.rsplit('#').next())
        .and_then(|suffix| suffix.parse::<usize>().ok())
        .and_then(|position| group.get(position).cloned())
        // Search came back empty; keep the first candidate.
        .unwrap_or(fallback)
}
