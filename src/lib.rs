//! # Draftforge
//!
//! An iterative, tool-augmented text-generation pipeline: given a topic
//! and a retrieval query, it produces a draft, critiques it, and improves
//! it, optionally invoking external tools mid-generation, while recording
//! every step as an immutable, append-only event log for replay, audit,
//! and branching.
//!
//! ## Features
//!
//! - **Arrow composition**: uniform async `In -> Out` transformations
//!   with sequencing, mapping, taps, and panic trapping; `Result`- and
//!   `Option`-carrying variants short-circuit
//! - **Event-sourced branches**: immutable branch values whose state is
//!   an append-only event log; fork, snapshot, and restore
//! - **Draft → Critique → Improve**: reasoning arrows that retrieve
//!   context, format prompts, and call the model with tool execution
//!   interleaved
//! - **Tool-call DSL**: delimiter-depth parsing of `[TOOL:name args]`
//!   lines out of free-form model output
//! - **Relevance-based merging**: combine two branches' histories and
//!   vectors, resolving id conflicts by similarity to a query
//!
//! ## Architecture
//!
//! ```text
//! PipelineBranch -> Draft -> Critique -> Improve -> PipelineBranch
//!       |             |_________|___________|
//!       |                       v
//!       |        ChatModel + ToolRegistry (HTTP)
//!       v
//!  VectorStore <- EmbeddingModel
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use draftforge::{Config, HttpChatClient, ReasoningEngine};
//! use draftforge::branch::{ingest, PipelineBranch, StaticSource};
//! use draftforge::vector::InMemoryVectorStore;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = Arc::new(HttpChatClient::new(&config.provider, config.request.clone())?);
//!
//!     let branch = PipelineBranch::new(
//!         "main",
//!         InMemoryVectorStore::shared(),
//!         Arc::new(StaticSource::empty("docs")),
//!     );
//!
//!     let engine = ReasoningEngine::new(client.clone(), client);
//!     let result = engine
//!         .safe_pipeline("cache eviction", "tenant cache")
//!         .run(branch)
//!         .await?;
//!
//!     println!("{}", result.latest_draft_or_final().unwrap().text());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Composable asynchronous transformations with short-circuiting variants.
pub mod arrow;
/// Event-sourced pipeline branches, data sources, and snapshots.
pub mod branch;
/// Configuration management loaded from the environment.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Chat-model collaborators and tool-aware generation.
pub mod llm;
/// Relevance-based branch merging.
pub mod merge;
/// Injected telemetry sinks.
pub mod metrics;
/// Tool-call extraction from generated text.
pub mod parser;
/// Draft → Critique → Improve reasoning arrows.
pub mod pipeline;
/// Prompt templates for the reasoning stages.
pub mod prompts;
/// Invocable tools and the immutable tool registry.
pub mod tool;
/// Vector records, stores, and embedding models.
pub mod vector;

pub use arrow::{Arrow, MaybeArrow, TryArrow};
pub use branch::{BranchSnapshot, PipelineBranch, PipelineEvent, ReasoningState};
pub use config::Config;
pub use error::{AppError, AppResult, StageError};
pub use llm::{ChatModel, HttpChatClient};
pub use merge::merge_by_relevance;
pub use pipeline::ReasoningEngine;
pub use tool::{Tool, ToolRegistry};
pub use vector::{EmbeddingModel, InMemoryVectorStore, Vector, VectorStore};
