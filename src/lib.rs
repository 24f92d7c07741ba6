#![deny(missing_docs)]

//! Core library for the wordcollect extraction service.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Checkpoint events and their publishers.
pub mod events;
/// Content fetcher and object store access.
pub mod fetch;
/// Text-generation gateway and provider backends.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Workflow metrics helpers.
pub mod metrics;
/// Extraction workflow: states, stages, and the orchestrator.
pub mod pipeline;
/// Idempotent result persistence.
pub mod store;
