//! Text processing pipeline: estimation, chunking, analysis, and sequential rewriting.

pub mod analysis;
pub mod chunking;
pub mod estimator;
mod pipeline;
pub mod sentences;
mod service;
pub mod types;

pub use analysis::{ContentStats, analyze};
pub use chunking::{ChunkAssembler, chunk_text};
pub use estimator::{CharRatioEstimator, TiktokenEstimator, TokenEstimator};
pub use pipeline::{ChunkProcessingPipeline, DEFAULT_PACING_DELAY};
pub use service::{DocumentService, ProcessingApi};
pub use types::{
    ChunkOutcome, ChunkPlan, ChunkingError, PipelineError, ProcessingResult, RewriteOutcome,
    ServiceError,
};
