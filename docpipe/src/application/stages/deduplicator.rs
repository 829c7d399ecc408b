// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Deduplication Stage
//!
//! Drops duplicate documents within the batch. The duplicate key is the
//! stable SHA-256 content hash over `content`, `metadata`, and
//! `embeddings` in sorted-key order, so duplicates collide across runs
//! and processes regardless of their generated ids.
//!
//! The kept document is the first by encounter order; dropped documents
//! get a Skipped step naming the survivor. Deterministic by construction,
//! no per-document failure policy applies.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Instant;

use docpipe_domain::services::document_content_hash;
use docpipe_domain::{Document, DocumentId, PipelineError, ProcessingStep};

use super::{ProcessingStage, StageContext};

const STAGE_NAME: &str = "deduplicator";

/// The deduplication stage.
#[derive(Default)]
pub struct Deduplicator;

impl Deduplicator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessingStage for Deduplicator {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let started = Instant::now();
        let input_count = batch.len();
        let mut seen: HashMap<String, DocumentId> = HashMap::new();
        let mut kept = Vec::with_capacity(batch.len());

        for document in batch {
            let hash = match document_content_hash(&document) {
                Ok(hash) => hash,
                Err(e) => {
                    // a document that cannot be hashed cannot collide;
                    // keep it and record the anomaly
                    tracing::warn!("Cannot hash document {}: {}", document.id, e);
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::new(STAGE_NAME, docpipe_domain::StepStatus::Warning)
                            .with_detail("hash_failed", "true"),
                    )
                    .await;
                    kept.push(document);
                    continue;
                }
            };

            let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
            match seen.get(&hash) {
                Some(survivor) => {
                    tracing::debug!(
                        "Dropping duplicate document {} (duplicate of {})",
                        document.id,
                        survivor
                    );
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::skipped(
                            STAGE_NAME,
                            format!("duplicate of {}", survivor),
                        )
                        .with_detail("content_hash", hash.clone())
                        .with_duration(duration_ms),
                    )
                    .await;
                }
                None => {
                    seen.insert(hash.clone(), document.id);
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::success(STAGE_NAME, duration_ms)
                            .with_detail("content_hash", hash),
                    )
                    .await;
                    kept.push(document);
                }
            }
        }

        tracing::info!("Deduplication kept {} of {} documents", kept.len(), input_count);
        Ok(kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::test_support::{context, document, with_lineage};
    use docpipe_domain::StepStatus;

    #[tokio::test]
    async fn test_batch_of_one_passes_through() {
        let ctx = context();
        let doc = document("only one");
        with_lineage(&ctx, &doc).await;
        let out = Deduplicator::new().process(vec![doc], &ctx).await.unwrap();
        assert_eq!(out.len(), 1);
    }

    #[tokio::test]
    async fn test_identical_content_collapses_to_first() {
        let ctx = context();
        let first = document("same body");
        let second = document("same body");
        let third = document("different body");
        for doc in [&first, &second, &third] {
            with_lineage(&ctx, doc).await;
        }
        let first_id = first.id;
        let second_id = second.id;

        let out = Deduplicator::new()
            .process(vec![first, second, third], &ctx)
            .await
            .unwrap();

        assert_eq!(out.len(), 2);
        // survivor is the earlier document by encounter order
        assert_eq!(out[0].id, first_id);

        let dropped = ctx.lineage.get(second_id).await.unwrap();
        let step = &dropped.processing_steps[0];
        assert_eq!(step.status, StepStatus::Skipped);
        assert!(step.details["reason"].contains(&first_id.to_string()));
    }

    #[tokio::test]
    async fn test_every_input_gets_exactly_one_step() {
        let ctx = context();
        let docs: Vec<Document> = (0..3).map(|_| document("same body")).collect();
        for doc in &docs {
            with_lineage(&ctx, doc).await;
        }
        let ids: Vec<DocumentId> = docs.iter().map(|d| d.id).collect();

        Deduplicator::new().process(docs, &ctx).await.unwrap();

        for id in ids {
            let lineage = ctx.lineage.get(id).await.unwrap();
            assert_eq!(lineage.processing_steps.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_differing_metadata_is_not_a_duplicate() {
        let ctx = context();
        let a = document("body");
        let mut b = document("body");
        b.metadata.title = "another title".to_string();
        with_lineage(&ctx, &a).await;
        with_lineage(&ctx, &b).await;

        let out = Deduplicator::new().process(vec![a, b], &ctx).await.unwrap();
        assert_eq!(out.len(), 2);
    }
}
