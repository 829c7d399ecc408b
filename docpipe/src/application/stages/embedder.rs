// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Embedding Stage
//!
//! Produces vector embeddings through the external embedding model:
//!
//! 1. the body is split into token-bounded chunks with overlap; text
//!    shorter than one chunk yields exactly one chunk
//! 2. each chunk gets a vector from the model
//! 3. the document-level vector is the L2-normalized mean of the
//!    L2-normalized chunk vectors; zero-norm vectors pass through
//!    normalization unchanged
//! 4. a summary, when present, gets its own single vector
//!
//! Per-document failure policy: pass through with an Error step, the
//! embeddings record tagged `v1_failed` and carrying the error. The
//! document continues downstream, where the indexer skips it.
//!
//! The stage is I/O bound; documents within a batch embed concurrently
//! up to `worker_count`. Chunk vectors are memoized by chunk text.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;

use docpipe_domain::services::{text_chunker, EmbeddingModelService};
use docpipe_domain::{Document, EmbeddingVector, PipelineError, ProcessingStep};

use super::{ProcessingStage, StageContext};
use crate::infrastructure::cache::FunctionCache;

const STAGE_NAME: &str = "embedder";

/// Configuration for the embedding stage, validated at construction.
#[derive(Debug, Clone)]
pub struct EmbedderConfig {
    /// Approximate token budget per chunk
    pub chunk_size_tokens: usize,
    /// Overlapping tokens between chunks
    pub chunk_overlap_tokens: usize,
    /// Concurrent documents per batch
    pub worker_count: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: 512,
            chunk_overlap_tokens: 50,
            worker_count: 4,
        }
    }
}

impl EmbedderConfig {
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_overlap_tokens >= self.chunk_size_tokens {
            return Err(PipelineError::invalid_config(format!(
                "chunk_overlap_tokens {} must be below chunk_size_tokens {}",
                self.chunk_overlap_tokens, self.chunk_size_tokens
            )));
        }
        if self.worker_count == 0 {
            return Err(PipelineError::invalid_config("worker_count must be positive"));
        }
        Ok(())
    }
}

/// The embedding stage.
pub struct Embedder {
    config: EmbedderConfig,
    model: Arc<dyn EmbeddingModelService>,
    memo: Option<Arc<FunctionCache>>,
}

impl Embedder {
    pub fn new(
        config: EmbedderConfig,
        model: Arc<dyn EmbeddingModelService>,
        memo: Option<Arc<FunctionCache>>,
    ) -> Result<Self, PipelineError> {
        config.validate()?;
        Ok(Self { config, model, memo })
    }

    async fn embed_text(&self, text: &str) -> Result<EmbeddingVector, PipelineError> {
        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.get::<Vec<f32>>("embed", text.as_bytes()).await {
                if let Ok(vector) = EmbeddingVector::new(hit) {
                    return Ok(vector);
                }
            }
        }
        let vector = self.model.embed(text).await?;
        if let Some(memo) = &self.memo {
            memo.put("embed", text.as_bytes(), &vector.as_slice().to_vec()).await;
        }
        Ok(vector)
    }

    /// Chunks, embeds every chunk, and folds the normalized chunk vectors
    /// into the document-level vector.
    async fn embed_document(&self, document: &mut Document) -> Result<usize, PipelineError> {
        let chunks = text_chunker::chunk_by_tokens(
            &document.content.body,
            self.config.chunk_size_tokens,
            self.config.chunk_overlap_tokens,
        );

        let mut chunk_vectors = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let vector = self.embed_text(chunk).await?;
            chunk_vectors.push(vector.l2_normalized());
        }

        let body_vector = EmbeddingVector::mean(&chunk_vectors)?.l2_normalized();

        let summary_vector = match &document.content.summary {
            Some(summary) if !summary.is_empty() => match self.embed_text(summary).await {
                Ok(vector) => Some(vector.l2_normalized()),
                Err(e) => {
                    // the body vector is the contract; a summary vector is
                    // best effort
                    tracing::warn!("Summary embedding failed for {}: {}", document.id, e);
                    None
                }
            },
            _ => None,
        };

        document.embeddings.model = self.model.model_id().to_string();
        document.embeddings.body = Some(body_vector);
        document.embeddings.summary = summary_vector;
        document.embeddings.chunks = if chunk_vectors.len() > 1 {
            chunk_vectors
        } else {
            Vec::new()
        };
        document.embeddings.error = None;
        Ok(chunks.len())
    }
}

#[async_trait]
impl ProcessingStage for Embedder {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let results: Vec<(Document, ProcessingStep)> = stream::iter(batch)
            .map(|mut document| async move {
                let started = Instant::now();
                let outcome = self.embed_document(&mut document).await;
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                let step = match outcome {
                    Ok(chunk_count) => ProcessingStep::success(STAGE_NAME, duration_ms)
                        .with_metric("chunk_count", chunk_count as f64)
                        .with_detail("model", self.model.model_id()),
                    Err(e) => {
                        document.embeddings.mark_failed(e.to_string());
                        ProcessingStep::error(STAGE_NAME, e.to_string()).with_duration(duration_ms)
                    }
                };
                (document, step)
            })
            .buffered(self.config.worker_count)
            .collect()
            .await;

        let mut output = Vec::with_capacity(results.len());
        for (document, step) in results {
            ctx.record_outcome(document.id, step).await;
            output.push(document);
        }
        Ok(output)
    }
}
