//! # Document Enrichment Pipeline
//!
//! Application and infrastructure layers of the document enrichment
//! pipeline. The binary in `main.rs` is a thin composition root over
//! this library.
//!
//! ## Layers
//!
//! - [`application`]: the seven processing stages (loader,
//!   deduplicator, PII, summarizer, embedder, clusterer, indexer) and
//!   the orchestrator that batches documents through them
//! - [`infrastructure`]: the lineage store/cache/manager, the schema
//!   registry with file storage and hot cache, the cache layer, HTTP
//!   adapters for the vector index and the enrichment models, logging,
//!   and observability
//!
//! Domain types come from `docpipe-domain`; process-edge concerns (CLI,
//! configuration, signals, shutdown) from `docpipe-bootstrap`.

pub mod application;
pub mod infrastructure;

pub use application::services::{PipelineRunResult, PipelineService};
pub use application::stages::StageContext;
