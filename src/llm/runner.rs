//! Tool execution interleaved with generation.

use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ChatModel, GenerationOutcome};
use crate::branch::ToolCallRecord;
use crate::error::{ProviderError, ProviderResult, ToolError};
use crate::metrics::MetricsSink;
use crate::parser::parse_tool_calls;
use crate::tool::ToolRegistry;

/// Drives a chat model, executing any `[TOOL:...]` calls its output
/// requests and feeding the results back for further rounds.
///
/// Tool failures and unknown names become inline `error:` observations
/// rather than aborting the generation; only cancellation and provider
/// errors abort. Every executed call is recorded in the returned
/// [`GenerationOutcome`].
#[derive(Clone)]
pub struct ToolRunner {
    model: Arc<dyn ChatModel>,
    registry: ToolRegistry,
    metrics: Arc<dyn MetricsSink>,
    max_rounds: u32,
}

impl ToolRunner {
    /// Create a runner over a model and tool registry.
    pub fn new(
        model: Arc<dyn ChatModel>,
        registry: ToolRegistry,
        metrics: Arc<dyn MetricsSink>,
        max_rounds: u32,
    ) -> Self {
        Self {
            model,
            registry,
            metrics,
            max_rounds,
        }
    }

    /// Generate text, executing tool calls between rounds.
    pub async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> ProviderResult<GenerationOutcome> {
        let mut prompt = prompt.to_string();
        let mut executed = Vec::new();
        let mut text = String::new();

        for round in 0..=self.max_rounds {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }

            let start = Instant::now();
            text = self.model.generate(&prompt, cancel).await?;
            self.metrics.generation_completed(start.elapsed());

            let parsed = parse_tool_calls(&text);
            if parsed.skipped > 0 {
                // Dropped lines usually mean the prompt taught the model
                // a broken call format; surface the count.
                warn!(
                    skipped = parsed.skipped,
                    round, "Dropped malformed tool-call lines"
                );
                self.metrics.parse_skipped(parsed.skipped);
            }

            if parsed.calls.is_empty() || round == self.max_rounds {
                break;
            }

            let mut observations = String::new();
            for call in parsed.calls {
                if cancel.is_cancelled() {
                    return Err(ProviderError::Cancelled);
                }

                let output = match self.registry.get(&call.name) {
                    Some(tool) => match tool.invoke(&call.arguments, cancel).await {
                        Ok(output) => output,
                        Err(ToolError::Cancelled) => return Err(ProviderError::Cancelled),
                        Err(e) => format!("error: {}", e),
                    },
                    None => format!("error: unknown tool '{}'", call.name),
                };

                debug!(tool = %call.name, round, "Executed tool call");
                self.metrics.tool_invoked(&call.name);

                observations.push_str(&format!("[TOOL RESULT {}: {}]\n", call.name, output));
                executed.push(ToolCallRecord {
                    name: call.name,
                    arguments: call.arguments,
                    output,
                });
            }

            prompt = format!(
                "{}\n\n{}\nContinue, incorporating the tool results above.",
                prompt, observations
            );
        }

        Ok(GenerationOutcome {
            text,
            tool_calls: executed,
        })
    }
}
