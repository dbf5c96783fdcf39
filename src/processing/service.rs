//! Document service coordinating analysis, chunking, and rewriting.

use crate::{
    config::Config,
    document::Document,
    metrics::{MetricsSnapshot, RewriteMetrics},
    processing::{
        analysis::analyze,
        chunking::ChunkAssembler,
        estimator::build_estimator,
        pipeline::ChunkProcessingPipeline,
        types::{ChunkPlan, PipelineError, RewriteOutcome, ServiceError},
    },
    rewrite::{GeminiClient, RewriteClient},
};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs the full rewrite flow for one document at a time: analysis, chunking, and sequential
/// rewriting.
///
/// The service owns the configuration, the chunk assembler, the rewrite pipeline, and the metrics
/// registry, so the CLI and the HTTP surface share the same behaviour. Construct it once and
/// share it through an `Arc`.
pub struct DocumentService {
    config: Arc<Config>,
    assembler: ChunkAssembler,
    pipeline: ChunkProcessingPipeline,
    metrics: Arc<RewriteMetrics>,
}

impl std::fmt::Debug for DocumentService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentService")
            .field("assembler", &self.assembler)
            .finish_non_exhaustive()
    }
}

/// Abstraction over the service used by external surfaces (HTTP).
#[async_trait]
pub trait ProcessingApi: Send + Sync {
    /// Rewrite a document and return the reassembled text.
    async fn rewrite_document(&self, document: Document) -> Result<RewriteOutcome, ServiceError>;

    /// Preview chunking for `text` without calling the rewriting service.
    fn plan(&self, text: &str) -> ChunkPlan;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

impl DocumentService {
    /// Build a service around an explicit rewrite client.
    pub fn new(config: Arc<Config>, client: Arc<dyn RewriteClient>) -> Self {
        let estimator = build_estimator(config.token_estimator, &config.model);
        let assembler = ChunkAssembler::new(estimator, config.chunk_size);
        let pipeline = ChunkProcessingPipeline::with_pacing(client, config.pacing_delay());
        tracing::debug!(
            chunk_size = config.chunk_size,
            estimator = ?config.token_estimator,
            pacing_ms = config.pacing_delay_ms,
            "Document service initialized"
        );

        Self {
            config,
            assembler,
            pipeline,
            metrics: Arc::new(RewriteMetrics::new()),
        }
    }

    /// Build a service backed by the Gemini client described in `config`.
    pub fn from_config(config: Arc<Config>) -> Result<Self, ServiceError> {
        let client = GeminiClient::from_config(&config)?;
        Ok(Self::new(config, Arc::new(client)))
    }

    /// Configuration the service was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token budget applied to every chunk.
    pub fn chunk_budget(&self) -> usize {
        self.assembler.budget()
    }

    /// Preview chunking for `text`.
    pub fn plan(&self, text: &str) -> ChunkPlan {
        let estimator = self.assembler.estimator();
        let chunk_tokens: Vec<usize> = self
            .assembler
            .chunk(text)
            .iter()
            .map(|chunk| estimator.estimate(chunk))
            .collect();
        let oversized_chunks = chunk_tokens
            .iter()
            .filter(|tokens| **tokens > self.chunk_budget())
            .count();

        ChunkPlan {
            stats: analyze(text, estimator.as_ref()),
            chunk_budget: self.chunk_budget(),
            chunk_tokens,
            oversized_chunks,
        }
    }

    /// Analyze, chunk, and rewrite a document.
    pub async fn rewrite_document(
        &self,
        document: &Document,
    ) -> Result<RewriteOutcome, ServiceError> {
        let metadata = document.metadata();
        let text = document.text();

        let stats = analyze(text, self.assembler.estimator().as_ref());
        tracing::info!(
            source = %metadata.source_name,
            pages = metadata.page_count,
            words = stats.word_count,
            tokens = stats.estimated_tokens,
            progress = 15,
            "Analyzed content"
        );

        let chunks = self.assembler.chunk(text);
        let chunk_budget = self.chunk_budget();
        tracing::info!(
            source = %metadata.source_name,
            chunks = chunks.len(),
            chunk_budget,
            progress = 25,
            "Prepared chunks for processing"
        );

        let result = match self.pipeline.process(&chunks).await {
            Ok(result) => result,
            Err(error @ PipelineError::NoProgress { attempted }) => {
                self.metrics.record_failed_run(attempted as u64);
                tracing::error!(
                    source = %metadata.source_name,
                    error = %error,
                    "Document rewrite made no progress"
                );
                return Err(error.into());
            }
        };

        let rewritten = result.rewritten_count();
        let fallbacks = result.fallback_count();
        self.metrics
            .record_document(rewritten as u64, fallbacks as u64, chunk_budget as u64);
        tracing::info!(
            source = %metadata.source_name,
            chunks = chunks.len(),
            rewritten,
            fallbacks,
            progress = 100,
            "Document rewritten"
        );

        Ok(RewriteOutcome {
            source_name: metadata.source_name.clone(),
            page_count: metadata.page_count,
            stats,
            chunk_budget,
            chunk_count: chunks.len(),
            rewritten,
            fallbacks,
            text: result.assemble(),
        })
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl ProcessingApi for DocumentService {
    async fn rewrite_document(&self, document: Document) -> Result<RewriteOutcome, ServiceError> {
        DocumentService::rewrite_document(self, &document).await
    }

    fn plan(&self, text: &str) -> ChunkPlan {
        DocumentService::plan(self, text)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        DocumentService::metrics_snapshot(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rewrite::RemoteError;

    struct EchoClient {
        fail_all: bool,
    }

    #[async_trait]
    impl RewriteClient for EchoClient {
        async fn rewrite(
            &self,
            text: &str,
            index: usize,
            _total: usize,
        ) -> Result<String, RemoteError> {
            if self.fail_all {
                return Err(RemoteError::Api {
                    status: 403,
                    message: "API key not valid".into(),
                });
            }
            Ok(format!("[{index}] {text}"))
        }
    }

    fn service(fail_all: bool) -> DocumentService {
        let config = Config {
            chunk_size: 500,
            pacing_delay_ms: 0,
            ..Config::default()
        };
        DocumentService::new(Arc::new(config), Arc::new(EchoClient { fail_all }))
    }

    fn long_document() -> Document {
        let paragraph = "This sentence is part of a long paragraph. ".repeat(30);
        let text = [paragraph.trim(); 3].join("\n\n");
        Document::new(text, 3, "paper.pdf")
    }

    #[tokio::test]
    async fn rewrites_every_chunk_and_records_metrics() {
        let service = service(false);
        let document = long_document();

        let outcome = service.rewrite_document(&document).await.expect("outcome");

        assert_eq!(outcome.source_name, "paper.pdf");
        assert_eq!(outcome.page_count, 3);
        assert_eq!(outcome.chunk_budget, 500);
        assert!(outcome.chunk_count >= 2);
        assert_eq!(outcome.rewritten, outcome.chunk_count);
        assert_eq!(outcome.fallbacks, 0);
        assert!(outcome.text.starts_with("[0] This sentence"));
        assert_eq!(outcome.stats.paragraph_count, 3);

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_processed, 1);
        assert_eq!(snapshot.chunks_rewritten, outcome.chunk_count as u64);
        assert_eq!(snapshot.last_chunk_budget, Some(500));
    }

    #[tokio::test]
    async fn total_failure_surfaces_no_progress() {
        let service = service(true);

        let error = service
            .rewrite_document(&long_document())
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ServiceError::Pipeline(PipelineError::NoProgress { .. })
        ));
        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.documents_processed, 0);
        assert!(snapshot.chunks_fallback > 0);
    }

    #[test]
    fn plan_reports_chunk_estimates_within_budget() {
        let service = service(false);
        let plan = service.plan(long_document().text());

        assert_eq!(plan.chunk_budget, 500);
        assert!(plan.chunk_tokens.len() >= 2);
        assert!(plan.chunk_tokens.iter().all(|tokens| *tokens <= 500));
        assert_eq!(plan.oversized_chunks, 0);
        assert_eq!(plan.stats.paragraph_count, 3);
    }
}
