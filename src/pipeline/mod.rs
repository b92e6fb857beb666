//! Draft → Critique → Improve reasoning arrows.
//!
//! [`ReasoningEngine`] holds the collaborators (chat model, embedding
//! model, tool registry, metrics sink) and produces stage arrows over
//! [`PipelineBranch`] values. Each arrow reads the branch's history,
//! calls the model with tool execution interleaved, and returns a new
//! branch with one appended reasoning step. Stages compose with
//! [`crate::arrow::TryArrow::then`], so a failure at any stage
//! short-circuits the rest and surfaces one [`StageError`].
//!
//! Within one composition chain stages execute strictly in sequence:
//! Draft's new branch is fully committed before Critique begins. Because
//! branches are immutable values, independent chains may run concurrently
//! on separate branch values without coordination.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::arrow::TryArrow;
use crate::branch::{PipelineBranch, ReasoningState, StateKind};
use crate::config::PipelineConfig;
use crate::error::{ProviderError, StageError, StageResult};
use crate::llm::{ChatModel, ToolRunner};
use crate::metrics::{MetricsSink, NoopMetrics};
use crate::prompts;
use crate::tool::ToolRegistry;
use crate::vector::{EmbeddingModel, VectorStore};

/// A stage arrow: branch in, extended branch or stage error out.
pub type StageArrow = TryArrow<PipelineBranch, PipelineBranch, StageError>;

/// Produces the Draft/Critique/Improve arrows.
#[derive(Clone)]
pub struct ReasoningEngine {
    model: Arc<dyn ChatModel>,
    embedder: Arc<dyn EmbeddingModel>,
    registry: ToolRegistry,
    metrics: Arc<dyn MetricsSink>,
    config: PipelineConfig,
    cancel: CancellationToken,
}

impl ReasoningEngine {
    /// Create an engine with no tools, no-op metrics, and default config.
    pub fn new(model: Arc<dyn ChatModel>, embedder: Arc<dyn EmbeddingModel>) -> Self {
        Self {
            model,
            embedder,
            registry: ToolRegistry::new(),
            metrics: Arc::new(NoopMetrics),
            config: PipelineConfig::default(),
            cancel: CancellationToken::new(),
        }
    }

    /// Set the tool registry exposed to the model.
    pub fn with_tools(mut self, registry: ToolRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Set the metrics sink.
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the pipeline configuration.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the cancellation token observed by every stage.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn runner(&self) -> ToolRunner {
        ToolRunner::new(
            Arc::clone(&self.model),
            self.registry.clone(),
            Arc::clone(&self.metrics),
            self.config.max_tool_rounds,
        )
    }

    /// Draft arrow: retrieve context for `query`, render the draft
    /// prompt for `topic`, generate, append a `Draft` step.
    ///
    /// Finding no documents is not a failure; context is then empty.
    pub fn draft(&self, topic: &str, query: &str) -> StageArrow {
        let engine = self.clone();
        let topic = topic.to_string();
        let query = query.to_string();
        TryArrow::from_fn(move |branch: PipelineBranch| {
            let engine = engine.clone();
            let topic = topic.clone();
            let query = query.clone();
            async move { engine.run_draft(branch, &topic, &query).await }
        })
    }

    /// Critique arrow: critique the most recent Draft **or** FinalSpec,
    /// so repeated cycles critique the latest improvement.
    pub fn critique(&self) -> StageArrow {
        let engine = self.clone();
        TryArrow::from_fn(move |branch: PipelineBranch| {
            let engine = engine.clone();
            async move { engine.run_critique(branch).await }
        })
    }

    /// Improve arrow: rewrite the most recent Draft/FinalSpec against the
    /// most recent Critique, appending a `FinalSpec` step.
    pub fn improve(&self) -> StageArrow {
        let engine = self.clone();
        TryArrow::from_fn(move |branch: PipelineBranch| {
            let engine = engine.clone();
            async move { engine.run_improve(branch).await }
        })
    }

    /// The full Draft → Critique → Improve composition.
    pub fn safe_pipeline(&self, topic: &str, query: &str) -> StageArrow {
        self.draft(topic, query).then(self.critique()).then(self.improve())
    }

    async fn run_draft(
        &self,
        branch: PipelineBranch,
        topic: &str,
        query: &str,
    ) -> StageResult<PipelineBranch> {
        let start = Instant::now();
        let map_err = stage_error(StageError::Draft);

        let embedding = self
            .embedder
            .embed(query, &self.cancel)
            .await
            .map_err(&map_err)?;
        let documents = branch
            .store()
            .similarity_search(&embedding, self.config.top_k)
            .await;
        let context = documents
            .iter()
            .map(|v| v.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        debug!(
            branch = %branch.name(),
            retrieved = documents.len(),
            "Draft retrieval complete"
        );

        let schemas = self.registry.export_schemas().to_string();
        let prompt = prompts::render(
            prompts::DRAFT_PROMPT,
            &[
                ("context", context.as_str()),
                ("topic", topic),
                ("tools_schemas", schemas.as_str()),
            ],
        );

        let outcome = self
            .runner()
            .generate(&prompt, &self.cancel)
            .await
            .map_err(&map_err)?;

        self.metrics
            .stage_completed(StateKind::Draft, start.elapsed());
        info!(
            branch = %branch.name(),
            tool_calls = outcome.tool_calls.len(),
            latency_ms = start.elapsed().as_millis(),
            "Draft stage completed"
        );

        Ok(branch.with_reasoning(
            ReasoningState::Draft { text: outcome.text },
            prompt,
            outcome.tool_calls,
        ))
    }

    async fn run_critique(&self, branch: PipelineBranch) -> StageResult<PipelineBranch> {
        let start = Instant::now();
        let map_err = stage_error(StageError::Critique);

        let target = branch
            .latest_draft_or_final()
            .ok_or(StageError::NothingToCritique)?
            .text()
            .to_string();

        let prompt = prompts::render(prompts::CRITIQUE_PROMPT, &[("draft", target.as_str())]);
        let outcome = self
            .runner()
            .generate(&prompt, &self.cancel)
            .await
            .map_err(&map_err)?;

        self.metrics
            .stage_completed(StateKind::Critique, start.elapsed());
        info!(
            branch = %branch.name(),
            latency_ms = start.elapsed().as_millis(),
            "Critique stage completed"
        );

        Ok(branch.with_reasoning(
            ReasoningState::Critique { text: outcome.text },
            prompt,
            outcome.tool_calls,
        ))
    }

    async fn run_improve(&self, branch: PipelineBranch) -> StageResult<PipelineBranch> {
        let start = Instant::now();
        let map_err = stage_error(StageError::Improve);

        let draft = branch
            .latest_draft_or_final()
            .ok_or(StageError::MissingDraft)?
            .text()
            .to_string();
        let critique = branch
            .latest_critique()
            .ok_or(StageError::MissingCritique)?
            .text()
            .to_string();

        let prompt = prompts::render(
            prompts::IMPROVE_PROMPT,
            &[("draft", draft.as_str()), ("critique", critique.as_str())],
        );
        let outcome = self
            .runner()
            .generate(&prompt, &self.cancel)
            .await
            .map_err(&map_err)?;

        self.metrics
            .stage_completed(StateKind::FinalSpec, start.elapsed());
        info!(
            branch = %branch.name(),
            latency_ms = start.elapsed().as_millis(),
            "Improve stage completed"
        );

        Ok(branch.with_reasoning(
            ReasoningState::FinalSpec { text: outcome.text },
            prompt,
            outcome.tool_calls,
        ))
    }
}

// Cancellation stays a distinct outcome; everything else is tagged with
// the failing stage.
fn stage_error(
    wrap: fn(ProviderError) -> StageError,
) -> impl Copy + Fn(ProviderError) -> StageError {
    move |e| {
        if e.is_cancelled() {
            StageError::Cancelled
        } else {
            wrap(e)
        }
    }
}
