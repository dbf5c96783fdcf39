#![deny(missing_docs)]

//! Core library for pdf2speech: turn extracted PDF text into speech-friendly prose by chunking it
//! under a token budget and rewriting each chunk through a generative language model.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF extraction, document metadata, and output rendering.
pub mod document;
/// Structured logging and tracing setup.
pub mod logging;
/// Rewrite metrics helpers.
pub mod metrics;
/// Document processing pipeline utilities.
pub mod processing;
/// Remote rewriting service clients.
pub mod rewrite;
