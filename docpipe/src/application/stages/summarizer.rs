// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Summarization Stage
//!
//! Fills `content.summary` via the external summarization model:
//!
//! 1. bodies shorter than `min_word_count` are their own summary,
//!    recorded Success with `was_summarized = false`
//! 2. longer bodies are split into word-count chunks with overlap, each
//!    chunk summarized independently
//! 3. chunk summaries are concatenated; more than one chunk triggers a
//!    final combining pass
//! 4. the result is truncated to `max_length` words
//!
//! Per-document failure policy: pass through with an Error step and the
//! summary unset; a dead summarizer model never blocks the run. A chunk
//! that fails is dropped with a warning; only all chunks failing is a
//! document failure.
//!
//! Summaries are memoized by body hash so reprocessing identical content
//! skips the model.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

use docpipe_domain::services::{text_chunker, SummarizationModelService};
use docpipe_domain::{Document, PipelineError, ProcessingStep};

use super::{ProcessingStage, StageContext};
use crate::infrastructure::cache::FunctionCache;

const STAGE_NAME: &str = "summarizer";

/// Configuration for the summarization stage, validated at construction.
#[derive(Debug, Clone)]
pub struct SummarizerConfig {
    /// Summary cap in words
    pub max_length: usize,
    /// Summary floor in words, passed to the model
    pub min_length: usize,
    /// Bodies below this word count are returned unsummarized
    pub min_word_count: usize,
    /// Words per chunk for long documents
    pub chunk_size: usize,
    /// Overlapping words between chunks
    pub chunk_overlap: usize,
}

impl SummarizerConfig {
    pub fn new(max_length: usize, min_length: usize) -> Result<Self, PipelineError> {
        let config = Self {
            max_length,
            min_length,
            min_word_count: 100,
            chunk_size: 1024,
            chunk_overlap: 100,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.min_length >= self.max_length {
            return Err(PipelineError::invalid_config(format!(
                "summary min_length {} must be below max_length {}",
                self.min_length, self.max_length
            )));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(PipelineError::invalid_config(format!(
                "chunk_overlap {} must be below chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// The summarization stage.
pub struct Summarizer {
    config: SummarizerConfig,
    model: Arc<dyn SummarizationModelService>,
    memo: Option<Arc<FunctionCache>>,
}

impl Summarizer {
    pub fn new(
        config: SummarizerConfig,
        model: Arc<dyn SummarizationModelService>,
        memo: Option<Arc<FunctionCache>>,
    ) -> Self {
        Self { config, model, memo }
    }

    /// Chunk, summarize, combine, truncate. Returns the summary and the
    /// chunk count that produced it.
    async fn summarize_body(&self, body: &str) -> Result<(String, usize), PipelineError> {
        if let Some(memo) = &self.memo {
            if let Some(hit) = memo.get::<(String, usize)>("summarize", body.as_bytes()).await {
                return Ok(hit);
            }
        }

        let chunks = text_chunker::chunk_by_words(body, self.config.chunk_size, self.config.chunk_overlap);
        let chunk_count = chunks.len();

        let mut chunk_summaries = Vec::with_capacity(chunk_count);
        let mut last_error: Option<PipelineError> = None;
        for chunk in &chunks {
            match self
                .model
                .summarize(chunk, self.config.max_length, self.config.min_length)
                .await
            {
                Ok(summary) => chunk_summaries.push(summary),
                Err(e) => {
                    tracing::warn!("Chunk summarization failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if chunk_summaries.is_empty() {
            return Err(last_error
                .unwrap_or_else(|| PipelineError::processing(STAGE_NAME, "no chunks produced")));
        }

        let combined = chunk_summaries.join(" ");
        let summary = if chunk_summaries.len() > 1 {
            // final pass condenses the concatenation of chunk summaries
            self.model
                .summarize(&combined, self.config.max_length, self.config.min_length)
                .await
                .unwrap_or(combined)
        } else {
            combined
        };

        let result = (
            text_chunker::truncate_words(&summary, self.config.max_length),
            chunk_count,
        );
        if let Some(memo) = &self.memo {
            memo.put("summarize", body.as_bytes(), &result).await;
        }
        Ok(result)
    }
}

#[async_trait]
impl ProcessingStage for Summarizer {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let mut output = Vec::with_capacity(batch.len());
        for mut document in batch {
            let started = Instant::now();
            let word_count = document.word_count();

            if word_count < self.config.min_word_count {
                document.content.summary = Some(document.content.body.clone());
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                ctx.record_outcome(
                    document.id,
                    ProcessingStep::success(STAGE_NAME, duration_ms)
                        .with_detail("was_summarized", "false")
                        .with_metric("word_count", word_count as f64),
                )
                .await;
                output.push(document);
                continue;
            }

            match self.summarize_body(&document.content.body).await {
                Ok((summary, chunk_count)) => {
                    document.content.summary = Some(summary);
                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::success(STAGE_NAME, duration_ms)
                            .with_detail("was_summarized", "true")
                            .with_metric("chunk_count", chunk_count as f64)
                            .with_metric("word_count", word_count as f64),
                    )
                    .await;
                }
                Err(e) => {
                    // pass through with summary unset; never block the run
                    document.content.summary = None;
                    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::error(STAGE_NAME, e.to_string()).with_duration(duration_ms),
                    )
                    .await;
                }
            }
            output.push(document);
        }
        Ok(output)
    }
}
