//! Sequential per-chunk rewriting with fallback to the original text.

use crate::rewrite::RewriteClient;
use std::sync::Arc;
use std::time::Duration;

use super::types::{ChunkOutcome, PipelineError, ProcessingResult};

/// Default pause between consecutive chunk requests.
pub const DEFAULT_PACING_DELAY: Duration = Duration::from_millis(100);

/// Percentage reported once chunks are prepared.
const PROGRESS_START: f32 = 25.0;
/// Share of the overall progress bar covered by chunk rewriting.
const PROGRESS_SPAN: f32 = 60.0;

/// Feeds chunks one at a time to a [`RewriteClient`].
///
/// Chunks are never sent concurrently: the remote service rate-limits per key, and in-order
/// processing keeps reassembly trivial. Dropping the returned future between chunks abandons the
/// run.
pub struct ChunkProcessingPipeline {
    client: Arc<dyn RewriteClient>,
    pacing_delay: Duration,
}

impl ChunkProcessingPipeline {
    /// Build a pipeline with the default pacing delay.
    pub fn new(client: Arc<dyn RewriteClient>) -> Self {
        Self::with_pacing(client, DEFAULT_PACING_DELAY)
    }

    /// Build a pipeline with an explicit pacing delay.
    pub fn with_pacing(client: Arc<dyn RewriteClient>, pacing_delay: Duration) -> Self {
        Self {
            client,
            pacing_delay,
        }
    }

    /// Rewrite every chunk in order.
    ///
    /// A failed chunk keeps its original text and the run continues. The run fails with
    /// [`PipelineError::NoProgress`] only when not a single chunk was rewritten.
    pub async fn process(&self, chunks: &[String]) -> Result<ProcessingResult, PipelineError> {
        let total = chunks.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, chunk) in chunks.iter().enumerate() {
            tracing::info!(
                chunk = index + 1,
                total,
                progress = progress_percent(index, total),
                "Processing chunk"
            );

            match self.client.rewrite(chunk, index, total).await {
                Ok(text) => outcomes.push(ChunkOutcome::Rewritten(text)),
                Err(error) => {
                    tracing::warn!(
                        chunk = index + 1,
                        total,
                        error = %error,
                        "Chunk rewrite failed; keeping original text"
                    );
                    outcomes.push(ChunkOutcome::Fallback(chunk.clone()));
                }
            }

            if index + 1 < total && !self.pacing_delay.is_zero() {
                tokio::time::sleep(self.pacing_delay).await;
            }
        }

        let result = ProcessingResult::new(outcomes);
        if result.rewritten_count() == 0 {
            return Err(PipelineError::NoProgress { attempted: total });
        }

        tracing::info!(
            rewritten = result.rewritten_count(),
            fallbacks = result.fallback_count(),
            "Finished processing chunks"
        );
        Ok(result)
    }
}

fn progress_percent(index: usize, total: usize) -> f32 {
    if total == 0 {
        return PROGRESS_START;
    }
    PROGRESS_START + (index as f32 / total as f32) * PROGRESS_SPAN
}
