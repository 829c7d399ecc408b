// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Indexing Stage
//!
//! Upserts embedded documents into the external vector index in batches
//! of at most `batch_size`:
//!
//! - each batch is retried up to `max_retries` times with exponential
//!   backoff; retries re-send the whole batch (upserts are idempotent by
//!   id, so re-sending is safe)
//! - per-item failures inside a successful batch are recorded per
//!   document and do not fail the batch
//! - a batch whose retries are exhausted records an Error step on each
//!   of its documents; the run continues
//! - documents without a usable body vector are skipped with a Skipped
//!   step (the embedder marked them `v1_failed` or the stage was
//!   disabled)
//!
//! Cancellation is honored between batches and between backoff sleeps.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docpipe_domain::services::{IndexRecord, UpsertReport, VectorIndexClient};
use docpipe_domain::{Document, PipelineError, ProcessingStep};

use super::{ProcessingStage, StageContext};

const STAGE_NAME: &str = "indexer";

/// Configuration for the indexing stage, validated at construction.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Class name in the vector index
    pub class_name: String,
    /// Documents per upsert batch
    pub batch_size: usize,
    /// Retry attempts per batch after the first try
    pub max_retries: usize,
    /// First backoff delay; doubles per retry
    pub initial_backoff: Duration,
}

impl IndexerConfig {
    pub fn new(class_name: impl Into<String>, batch_size: usize) -> Result<Self, PipelineError> {
        let config = Self {
            class_name: class_name.into(),
            batch_size,
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.class_name.is_empty() {
            return Err(PipelineError::invalid_config("class_name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(PipelineError::invalid_config("batch_size must be >= 1"));
        }
        Ok(())
    }
}

/// The indexing stage.
pub struct Indexer {
    config: IndexerConfig,
    index: Arc<dyn VectorIndexClient>,
}

impl Indexer {
    pub fn new(config: IndexerConfig, index: Arc<dyn VectorIndexClient>) -> Self {
        Self { config, index }
    }

    fn to_record(document: &Document) -> Option<IndexRecord> {
        let vector = document.embeddings.body.as_ref()?;
        Some(IndexRecord {
            id: document.id,
            content: serde_json::json!({
                "body": document.content.body,
                "summary": document.content.summary,
                "title": document.metadata.title,
                "source": document.metadata.source,
                "timestamp": document.metadata.timestamp.to_rfc3339(),
                "path": document.metadata.path,
            }),
            vector: vector.as_slice().to_vec(),
        })
    }

    /// Sends one batch with retry and exponential backoff. Returns the
    /// final report, or the last error when every attempt failed.
    async fn upsert_with_retry(
        &self,
        records: &[IndexRecord],
        ctx: &StageContext,
    ) -> Result<UpsertReport, PipelineError> {
        let mut backoff = self.config.initial_backoff;
        let mut last_error: Option<PipelineError> = None;

        for attempt in 0..=self.config.max_retries {
            if ctx.cancellation.is_cancelled() {
                return Err(PipelineError::Cancelled("indexing cancelled".to_string()));
            }
            match self.index.upsert_batch(&self.config.class_name, records).await {
                Ok(report) => return Ok(report),
                Err(e) => {
                    tracing::warn!(
                        "Upsert attempt {}/{} failed: {}",
                        attempt + 1,
                        self.config.max_retries + 1,
                        e
                    );
                    last_error = Some(e);
                    if attempt < self.config.max_retries {
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = ctx.cancellation.cancelled() => {
                                return Err(PipelineError::Cancelled("indexing cancelled".to_string()));
                            }
                        }
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| PipelineError::indexing("upsert failed with no attempts")))
    }
}

#[async_trait]
impl ProcessingStage for Indexer {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        // partition: indexable records vs skipped documents
        let mut records = Vec::new();
        for document in &batch {
            match Self::to_record(document) {
                Some(record) => records.push(record),
                None => {
                    let reason = if document.embeddings.is_failed() {
                        "embedding failed"
                    } else {
                        "no body vector"
                    };
                    ctx.record_outcome(document.id, ProcessingStep::skipped(STAGE_NAME, reason))
                        .await;
                }
            }
        }

        for chunk in records.chunks(self.config.batch_size) {
            let started = Instant::now();
            match self.upsert_with_retry(chunk, ctx).await {
                Ok(report) => {
                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    let failed_ids: BTreeSet<_> =
                        report.item_errors.iter().map(|e| e.id).collect();
                    for record in chunk {
                        if let Some(item_error) =
                            report.item_errors.iter().find(|e| e.id == record.id)
                        {
                            ctx.record_outcome(
                                record.id,
                                ProcessingStep::error(STAGE_NAME, item_error.message.clone())
                                    .with_duration(duration_ms),
                            )
                            .await;
                        } else {
                            ctx.record_outcome(
                                record.id,
                                ProcessingStep::success(STAGE_NAME, duration_ms)
                                    .with_detail("class_name", self.config.class_name.clone()),
                            )
                            .await;
                        }
                    }
                    tracing::info!(
                        "Indexed {} documents ({} item failures)",
                        chunk.len() - failed_ids.len(),
                        failed_ids.len()
                    );
                }
                Err(e) if matches!(e, PipelineError::Cancelled(_)) => {
                    // cancellation is not a per-document error
                    for record in chunk {
                        ctx.record_outcome(
                            record.id,
                            ProcessingStep::skipped(STAGE_NAME, "cancelled"),
                        )
                        .await;
                    }
                }
                Err(e) => {
                    // retries exhausted: record per document, keep going
                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    tracing::error!("Batch upsert failed after retries: {}", e);
                    for record in chunk {
                        ctx.record_outcome(
                            record.id,
                            ProcessingStep::error(STAGE_NAME, e.to_string())
                                .with_duration(duration_ms),
                        )
                        .await;
                    }
                }
            }
        }

        Ok(batch)
    }
}
