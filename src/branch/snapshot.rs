//! Branch snapshots for persistence round-trips.
//!
//! A snapshot flattens a branch into plain data: its name, its full event
//! list, and the vector store's contents as plain records. Serialized as
//! JSON with stable field names; restoring rebuilds an in-memory store
//! and a branch with the identical name and event list.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{DataSource, PipelineBranch, PipelineEvent, StaticSource};
use crate::error::AppError;
use crate::vector::{InMemoryVectorStore, Vector, VectorStore};

/// A flattened, serializable branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchSnapshot {
    /// Branch name.
    pub name: String,
    /// Full event list, in order.
    pub events: Vec<PipelineEvent>,
    /// Flattened vector store contents.
    pub vectors: Vec<Vector>,
}

/// Flatten a branch into a snapshot.
pub async fn capture(branch: &PipelineBranch) -> BranchSnapshot {
    BranchSnapshot {
        name: branch.name().to_string(),
        events: branch.events().to_vec(),
        vectors: branch.store().export().await,
    }
}

/// Rebuild a branch from a snapshot.
///
/// The snapshot format does not carry the data source, so the restored
/// branch gets an empty static source; use [`restore_with_source`] to
/// re-attach a live one.
pub fn restore(snapshot: BranchSnapshot) -> PipelineBranch {
    let label = format!("{}-restored", snapshot.name);
    restore_with_source(snapshot, Arc::new(StaticSource::empty(label)))
}

/// Rebuild a branch from a snapshot with a caller-supplied data source.
pub fn restore_with_source(
    snapshot: BranchSnapshot,
    source: Arc<dyn DataSource>,
) -> PipelineBranch {
    let store = Arc::new(InMemoryVectorStore::from_vectors(snapshot.vectors));
    PipelineBranch::from_parts(snapshot.name, store, source, snapshot.events)
}

impl BranchSnapshot {
    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self).map_err(|e| AppError::Internal {
            message: format!("failed to serialize snapshot: {}", e),
        })
    }

    /// Deserialize from JSON.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        serde_json::from_str(json).map_err(|e| AppError::Internal {
            message: format!("failed to deserialize snapshot: {}", e),
        })
    }
}
