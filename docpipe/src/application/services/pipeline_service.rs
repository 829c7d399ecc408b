// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Orchestrator
//!
//! Drives the enabled stages in canonical order: Load, Deduplicate, PII,
//! Summarize, Embed, Cluster, Index. The source stage (the loader) runs
//! once and produces the document set; every later stage consumes batches
//! of at most `batch_size` documents.
//!
//! ## Error Partition
//!
//! Document-scoped errors never reach this module; stages convert them
//! into step records. An `Err` from a stage is stage-scoped by
//! definition: the orchestrator records the stage failure in health and
//! metrics, wraps it with the stage name, and aborts the run.
//!
//! ## Cancellation
//!
//! The token is checked between batches and between stages. The batch in
//! flight completes; every document that did not go through a stage gets
//! a Skipped step with a `cancelled` reason, and the partial result is
//! returned with `cancelled = true`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docpipe_domain::{Document, PipelineError, ProcessingStep};

use crate::application::stages::{ProcessingStage, StageContext};
use crate::infrastructure::observability::HealthReport;

/// Outcome of a pipeline run.
#[derive(Debug)]
pub struct PipelineRunResult {
    /// Documents that came out of the last stage (partial on
    /// cancellation)
    pub documents: Vec<Document>,
    /// Documents produced by the source stage
    pub loaded_count: usize,
    /// Whether the run was cut short by cancellation
    pub cancelled: bool,
    /// Wall time of the run
    pub duration: Duration,
    /// Aggregated per-stage health
    pub health: HealthReport,
}

/// The pipeline orchestrator.
pub struct PipelineService {
    /// The stage that produces documents (the loader), when enabled
    source: Option<Arc<dyn ProcessingStage>>,
    /// Enrichment stages in canonical order
    stages: Vec<Arc<dyn ProcessingStage>>,
    batch_size: usize,
}

impl PipelineService {
    pub fn new(
        source: Option<Arc<dyn ProcessingStage>>,
        stages: Vec<Arc<dyn ProcessingStage>>,
        batch_size: usize,
    ) -> Result<Self, PipelineError> {
        if batch_size == 0 {
            return Err(PipelineError::invalid_config("batch_size must be >= 1"));
        }
        Ok(Self {
            source,
            stages,
            batch_size,
        })
    }

    /// Runs the pipeline to completion, cancellation, or stage failure.
    ///
    /// Resources owned by the context (stores, caches, clients) survive
    /// the run; everything allocated here is released on every path.
    pub async fn run(&self, ctx: &StageContext) -> Result<PipelineRunResult, PipelineError> {
        let run_started = Instant::now();
        let mut cancelled = false;

        // source stage: one invocation over an empty input
        let mut documents: Vec<Document> = match &self.source {
            Some(source) => {
                let stage_started = Instant::now();
                let loaded = source.process(Vec::new(), ctx).await.map_err(|e| {
                    self.fail_stage(ctx, source.name(), &e);
                    PipelineError::stage_failed(source.name(), e)
                })?;
                ctx.metrics
                    .record_batch(source.name(), stage_started.elapsed().as_secs_f64());
                loaded
            }
            None => Vec::new(),
        };
        let loaded_count = documents.len();
        ctx.metrics.add_in_flight(loaded_count as i64);
        tracing::info!("Pipeline starting with {} documents", loaded_count);

        for stage in &self.stages {
            if ctx.cancellation.is_cancelled() {
                cancelled = true;
            }
            if cancelled {
                for document in &documents {
                    ctx.record_outcome(
                        document.id,
                        ProcessingStep::skipped(stage.name(), "cancelled"),
                    )
                    .await;
                }
                continue;
            }

            let mut remaining = std::mem::take(&mut documents);
            let mut next = Vec::with_capacity(remaining.len());
            while !remaining.is_empty() {
                if ctx.cancellation.is_cancelled() {
                    cancelled = true;
                    tracing::info!(
                        "Cancellation observed before a {} batch; {} documents unprocessed",
                        stage.name(),
                        remaining.len()
                    );
                    for document in &remaining {
                        ctx.record_outcome(
                            document.id,
                            ProcessingStep::skipped(stage.name(), "cancelled"),
                        )
                        .await;
                    }
                    next.append(&mut remaining);
                    break;
                }

                let rest = if remaining.len() > self.batch_size {
                    remaining.split_off(self.batch_size)
                } else {
                    Vec::new()
                };
                let batch = std::mem::replace(&mut remaining, rest);

                let batch_started = Instant::now();
                let processed = stage.process(batch, ctx).await.map_err(|e| {
                    self.fail_stage(ctx, stage.name(), &e);
                    PipelineError::stage_failed(stage.name(), e)
                })?;
                ctx.metrics
                    .record_batch(stage.name(), batch_started.elapsed().as_secs_f64());
                next.extend(processed);
            }
            documents = next;
        }

        ctx.metrics.add_in_flight(-(loaded_count as i64));
        let duration = run_started.elapsed();
        ctx.metrics.record_run(duration.as_secs_f64());

        let health = ctx.health.report();
        tracing::info!(
            "Pipeline finished: {} loaded, {} out, cancelled: {}, status: {}",
            loaded_count,
            documents.len(),
            cancelled,
            health.status
        );
        Ok(PipelineRunResult {
            documents,
            loaded_count,
            cancelled,
            duration,
            health,
        })
    }

    fn fail_stage(&self, ctx: &StageContext, stage_name: &str, error: &PipelineError) {
        tracing::error!("Stage '{}' failed fatally: {}", stage_name, error);
        ctx.health.record_stage_failure(stage_name);
        ctx.metrics.record_error(stage_name, error);
        ctx.errors.record(stage_name, None, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::test_support::{context, document, with_lineage};
    use crate::infrastructure::observability::HealthStatus;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    /// Fake source emitting a fixed set of documents.
    struct FixedSource {
        bodies: Vec<&'static str>,
    }

    #[async_trait]
    impl ProcessingStage for FixedSource {
        fn name(&self) -> &'static str {
            "loader"
        }
        async fn process(
            &self,
            _batch: Vec<Document>,
            ctx: &StageContext,
        ) -> Result<Vec<Document>, PipelineError> {
            let mut documents = Vec::new();
            for body in &self.bodies {
                let doc = document(body);
                with_lineage(ctx, &doc).await;
                ctx.record_outcome(doc.id, ProcessingStep::success("loader", 0.1)).await;
                documents.push(doc);
            }
            Ok(documents)
        }
    }

    /// Pass-through stage counting the batches it saw.
    struct CountingStage {
        name: &'static str,
        batches: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl ProcessingStage for CountingStage {
        fn name(&self) -> &'static str {
            self.name
        }
        async fn process(
            &self,
            batch: Vec<Document>,
            ctx: &StageContext,
        ) -> Result<Vec<Document>, PipelineError> {
            self.batches.lock().push(batch.len());
            for doc in &batch {
                ctx.record_outcome(doc.id, ProcessingStep::success(self.name, 0.1)).await;
            }
            Ok(batch)
        }
    }

    /// Stage that fails fatally.
    struct BrokenStage;

    #[async_trait]
    impl ProcessingStage for BrokenStage {
        fn name(&self) -> &'static str {
            "broken"
        }
        async fn process(
            &self,
            _batch: Vec<Document>,
            _ctx: &StageContext,
        ) -> Result<Vec<Document>, PipelineError> {
            Err(PipelineError::Io("backend directory vanished".to_string()))
        }
    }

    fn source(n: usize) -> Arc<FixedSource> {
        let bodies: Vec<&'static str> = (0..n)
            .map(|i| {
                // leak a handful of distinct bodies for 'static lifetimes
                Box::leak(format!("document body {}", i).into_boxed_str()) as &'static str
            })
            .collect();
        Arc::new(FixedSource { bodies })
    }

    #[tokio::test]
    async fn test_empty_source_completes_cleanly() {
        let ctx = context();
        let service = PipelineService::new(Some(source(0)), vec![], 10).unwrap();
        let result = service.run(&ctx).await.unwrap();
        assert_eq!(result.loaded_count, 0);
        assert!(result.documents.is_empty());
        assert!(!result.cancelled);
        assert_eq!(result.health.status, HealthStatus::Healthy);
    }

    #[tokio::test]
    async fn test_batching_splits_at_batch_size() {
        let ctx = context();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let stage = Arc::new(CountingStage {
            name: "counting",
            batches: batches.clone(),
        });
        let service = PipelineService::new(Some(source(7)), vec![stage], 3).unwrap();
        let result = service.run(&ctx).await.unwrap();
        assert_eq!(result.documents.len(), 7);
        assert_eq!(*batches.lock(), vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_stage_failure_aborts_and_names_stage() {
        let ctx = context();
        let service =
            PipelineService::new(Some(source(2)), vec![Arc::new(BrokenStage)], 10).unwrap();
        let err = service.run(&ctx).await.unwrap_err();
        match err {
            PipelineError::StageFailed { stage, source } => {
                assert_eq!(stage, "broken");
                assert!(source.to_string().contains("vanished"));
            }
            other => panic!("expected StageFailed, got {:?}", other),
        }
        assert_eq!(ctx.health.report().status, HealthStatus::Unhealthy);
    }

    #[tokio::test]
    async fn test_cancellation_yields_partial_result_with_skipped_steps() {
        let ctx = context();
        // cancel before the enrichment stage runs
        ctx.cancellation.cancel();
        let batches = Arc::new(Mutex::new(Vec::new()));
        let stage = Arc::new(CountingStage {
            name: "counting",
            batches: batches.clone(),
        });
        let service = PipelineService::new(Some(source(3)), vec![stage], 10).unwrap();
        let result = service.run(&ctx).await.unwrap();

        assert!(result.cancelled);
        assert_eq!(result.documents.len(), 3);
        assert!(batches.lock().is_empty(), "no batch ran after cancellation");
        for document in &result.documents {
            let lineage = ctx.lineage.get(document.id).await.unwrap();
            let last = lineage.processing_steps.last().unwrap();
            assert_eq!(last.step_name, "counting");
            assert_eq!(last.details["reason"], "cancelled");
        }
    }

    #[tokio::test]
    async fn test_every_document_gets_one_step_per_stage() {
        let ctx = context();
        let stage_a = Arc::new(CountingStage {
            name: "stage_a",
            batches: Arc::new(Mutex::new(Vec::new())),
        });
        let stage_b = Arc::new(CountingStage {
            name: "stage_b",
            batches: Arc::new(Mutex::new(Vec::new())),
        });
        let service = PipelineService::new(Some(source(4)), vec![stage_a, stage_b], 2).unwrap();
        let result = service.run(&ctx).await.unwrap();

        for document in &result.documents {
            let lineage = ctx.lineage.get(document.id).await.unwrap();
            let names: Vec<&str> = lineage
                .processing_steps
                .iter()
                .map(|s| s.step_name.as_str())
                .collect();
            assert_eq!(names, vec!["loader", "stage_a", "stage_b"]);
        }
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        assert!(PipelineService::new(None, vec![], 0).is_err());
    }
}
