//! Snapshot persistence round-trip tests, including through a file on disk.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

use draftforge::branch::{
    capture, ingest, restore, restore_with_source, BranchSnapshot, PipelineBranch, ReasoningState,
    SourceDocument, StaticSource, ToolCallRecord,
};
use draftforge::vector::{EmbeddingModel, HashingEmbedder, InMemoryVectorStore, VectorStore};

async fn populated_branch() -> PipelineBranch {
    let embedder: Arc<dyn EmbeddingModel> = Arc::new(HashingEmbedder::new());
    let cancel = CancellationToken::new();

    let source = Arc::new(StaticSource::new(
        "kb",
        vec![
            SourceDocument::new("d1", "tenant cache eviction uses an LRU policy"),
            SourceDocument::new("d2", "spring gardening almanac"),
        ],
    ));
    let branch = PipelineBranch::new("main", InMemoryVectorStore::shared(), source);
    let branch = ingest(&branch, &embedder, &cancel).await.unwrap();

    branch
        .with_reasoning(
            ReasoningState::Draft {
                text: "a draft about caches".to_string(),
            },
            "draft prompt",
            vec![ToolCallRecord {
                name: "math".to_string(),
                arguments: "1+1".to_string(),
                output: "2".to_string(),
            }],
        )
        .with_reasoning(
            ReasoningState::Critique {
                text: "needs more detail".to_string(),
            },
            "critique prompt",
            Vec::new(),
        )
}

#[tokio::test]
async fn test_round_trip_preserves_name_events_and_vectors() {
    let branch = populated_branch().await;
    let restored = restore(capture(&branch).await);

    assert_eq!(restored.name(), branch.name());
    assert_eq!(restored.events(), branch.events());

    // Same set of vectors by id, text, and embedding.
    let mut original = branch.store().export().await;
    let mut recovered = restored.store().export().await;
    original.sort_by(|a, b| a.id.cmp(&b.id));
    recovered.sort_by(|a, b| a.id.cmp(&b.id));
    assert_eq!(original, recovered);
}

#[tokio::test]
async fn test_round_trip_through_file() -> anyhow::Result<()> {
    let branch = populated_branch().await;
    let snapshot = capture(&branch).await;

    let dir = tempdir()?;
    let path = dir.path().join("branch.json");
    std::fs::write(&path, snapshot.to_json()?)?;

    let loaded = BranchSnapshot::from_json(&std::fs::read_to_string(&path)?)?;
    assert_eq!(loaded, snapshot);

    let restored = restore(loaded);
    assert_eq!(restored.name(), "main");
    assert_eq!(restored.events(), branch.events());
    Ok(())
}

#[tokio::test]
async fn test_restored_branch_continues_accumulating_events() {
    let branch = populated_branch().await;
    let restored = restore(capture(&branch).await);

    let extended = restored.with_reasoning(
        ReasoningState::FinalSpec {
            text: "final".to_string(),
        },
        "improve prompt",
        Vec::new(),
    );

    assert_eq!(extended.len(), restored.len() + 1);
    assert_eq!(
        extended.latest_draft_or_final().unwrap().text(),
        "final"
    );
}

#[tokio::test]
async fn test_restore_with_source_reattaches_live_source() {
    let branch = populated_branch().await;
    let snapshot = capture(&branch).await;

    let source = Arc::new(StaticSource::new(
        "kb",
        vec![SourceDocument::new("d3", "new document")],
    ));
    let restored = restore_with_source(snapshot, source);

    assert_eq!(restored.source().label(), "kb");

    // The restored store still serves similarity search.
    let embedder = HashingEmbedder::new();
    let cancel = CancellationToken::new();
    let query = embedder.embed("tenant cache", &cancel).await.unwrap();
    let hits = restored.store().similarity_search(&query, 1).await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "d1");
}

#[tokio::test]
async fn test_snapshot_json_is_stable_and_kind_tagged() {
    let branch = populated_branch().await;
    let snapshot = capture(&branch).await;
    let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();

    assert_eq!(value["name"], "main");
    assert_eq!(value["events"][0]["kind"], "ingest_batch");
    assert_eq!(value["events"][1]["kind"], "reasoning_step");
    assert_eq!(value["events"][1]["state"]["kind"], "draft");
    assert_eq!(value["events"][1]["tool_calls"][0]["name"], "math");
    assert_eq!(value["vectors"][0]["id"], "d1");
}
