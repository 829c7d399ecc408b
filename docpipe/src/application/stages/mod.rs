// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Processing Stages
//!
//! The seven pipeline stages and the contract they share: take a batch of
//! documents, return a batch of documents, and append exactly one
//! processing-step record per input document to its lineage.
//!
//! A stage MUST NOT fail the batch for a single bad document. It records
//! an Error (or Warning/Skipped) step and applies its per-document
//! policy; drop or pass through. Only stage-scoped problems (the loader
//! cannot read the export directory, configuration is broken) surface as
//! `Err`, which the orchestrator wraps and treats as fatal.

use async_trait::async_trait;
use std::sync::Arc;

use docpipe_bootstrap::CancellationToken;
use docpipe_domain::{Document, DocumentId, PipelineError, ProcessingStep, StepStatus};

use crate::infrastructure::lineage::LineageManager;
use crate::infrastructure::observability::{ErrorLog, HealthAggregator, MetricsService};

pub mod clusterer;
pub mod deduplicator;
pub mod embedder;
pub mod indexer;
pub mod loader;
pub mod pii;
pub mod summarizer;

pub use clusterer::{Clusterer, ClustererConfig};
pub use deduplicator::Deduplicator;
pub use embedder::{Embedder, EmbedderConfig};
pub use indexer::{Indexer, IndexerConfig};
pub use loader::{Loader, LoaderConfig};
pub use pii::{PiiConfig, PiiStage};
pub use summarizer::{Summarizer, SummarizerConfig};

/// Shared context handed to every stage invocation.
///
/// Everything in here is `Arc`-shared and thread-safe; stages clone the
/// context freely when fanning work out.
#[derive(Clone)]
pub struct StageContext {
    pub lineage: Arc<LineageManager>,
    pub metrics: Arc<MetricsService>,
    pub health: Arc<HealthAggregator>,
    pub errors: Arc<ErrorLog>,
    pub cancellation: CancellationToken,
}

impl StageContext {
    /// Records one document's terminal step everywhere it is observed:
    /// the lineage record, the metrics counters, the health aggregation,
    /// and (for error outcomes) the error log.
    pub async fn record_outcome(&self, document_id: DocumentId, step: ProcessingStep) {
        debug_assert!(step.status.is_terminal(), "non-terminal step at stage boundary");

        self.metrics.record_document(&step.step_name, step.status);
        self.health.record(&step.step_name, step.status);
        if matches!(step.status, StepStatus::Error | StepStatus::Failed) {
            let error = PipelineError::processing(
                step.step_name.clone(),
                step.error_message.clone().unwrap_or_default(),
            );
            self.errors.record(&step.step_name, Some(document_id), &error);
        }

        if let Err(e) = self.lineage.record_step(document_id, step).await {
            // missing lineage means the loader skipped this document; the
            // step is still visible in metrics and logs
            tracing::warn!("Cannot attach step to lineage {}: {}", document_id, e);
        }
    }
}

/// The single capability every stage implements.
#[async_trait]
pub trait ProcessingStage: Send + Sync {
    /// Stable stage name used in step records, metrics labels, and
    /// stage-scoped error messages.
    fn name(&self) -> &'static str;

    /// Transforms one batch. The returned batch may shrink (dedup, loader
    /// skips) but never grows.
    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Shared fixtures for stage unit tests.

    use super::*;
    use crate::infrastructure::cache::MemoryCacheBackend;
    use crate::infrastructure::lineage::{LineageCache, LineageStore, LineageStoreConfig};
    use chrono::{TimeZone, Utc};
    use docpipe_domain::DocumentMetadata;
    use std::time::Duration;

    pub fn context() -> StageContext {
        let store = Arc::new(LineageStore::new(LineageStoreConfig::default()));
        let backend = Arc::new(MemoryCacheBackend::new(1024, Duration::from_secs(60)));
        let cache = Arc::new(LineageCache::new(backend, Duration::from_secs(60)));
        StageContext {
            lineage: Arc::new(LineageManager::new(store, cache)),
            metrics: Arc::new(MetricsService::new().unwrap()),
            health: Arc::new(HealthAggregator::new()),
            errors: Arc::new(ErrorLog::default()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn document(body: &str) -> Document {
        Document::new(
            body,
            DocumentMetadata::new(
                "fixture",
                "test",
                Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                "fixtures/doc.md",
            ),
        )
    }

    /// Registers a lineage record for a document the way the loader does.
    pub async fn with_lineage(ctx: &StageContext, document: &Document) {
        ctx.lineage
            .ensure_created(document.id, None, None)
            .await
            .unwrap();
    }
}
