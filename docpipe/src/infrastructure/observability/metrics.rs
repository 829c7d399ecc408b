// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus-based metrics for pipeline observability: per-stage
//! document counters (labelled by stage and terminal status), stage
//! duration histograms, batch counters, and a gauge for in-flight
//! batches. Thread-safe and cheap enough to call per document.

use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;

use docpipe_domain::{PipelineError, StepStatus};

const NAMESPACE: &str = "docpipe";

/// Prometheus metrics service for the pipeline.
#[derive(Clone)]
pub struct MetricsService {
    registry: Arc<Registry>,

    documents_processed_total: IntCounterVec,
    batches_processed_total: IntCounter,
    stage_duration_seconds: HistogramVec,
    run_duration_seconds: Histogram,
    documents_in_flight: IntGauge,
    errors_total: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, PipelineError> {
        let registry = Registry::new();
        let metrics_error =
            |name: &str, e: prometheus::Error| PipelineError::internal(format!("Failed to create {} metric: {}", name, e));

        let documents_processed_total = IntCounterVec::new(
            Opts::new(
                "documents_processed_total",
                "Documents leaving a stage, by stage and terminal status",
            )
            .namespace(NAMESPACE),
            &["stage", "status"],
        )
        .map_err(|e| metrics_error("documents_processed_total", e))?;

        let batches_processed_total = IntCounter::with_opts(
            Opts::new("batches_processed_total", "Batches completed across all stages")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_error("batches_processed_total", e))?;

        let stage_duration_seconds = HistogramVec::new(
            HistogramOpts::new("stage_duration_seconds", "Wall time per stage batch")
                .namespace(NAMESPACE),
            &["stage"],
        )
        .map_err(|e| metrics_error("stage_duration_seconds", e))?;

        let run_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("run_duration_seconds", "Wall time per pipeline run")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_error("run_duration_seconds", e))?;

        let documents_in_flight = IntGauge::with_opts(
            Opts::new("documents_in_flight", "Documents currently inside the pipeline")
                .namespace(NAMESPACE),
        )
        .map_err(|e| metrics_error("documents_in_flight", e))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Errors by stage and category").namespace(NAMESPACE),
            &["stage", "category"],
        )
        .map_err(|e| metrics_error("errors_total", e))?;

        for metric in [
            Box::new(documents_processed_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(batches_processed_total.clone()),
            Box::new(stage_duration_seconds.clone()),
            Box::new(run_duration_seconds.clone()),
            Box::new(documents_in_flight.clone()),
            Box::new(errors_total.clone()),
        ] {
            registry
                .register(metric)
                .map_err(|e| PipelineError::internal(format!("Failed to register metric: {}", e)))?;
        }

        Ok(Self {
            registry: Arc::new(registry),
            documents_processed_total,
            batches_processed_total,
            stage_duration_seconds,
            run_duration_seconds,
            documents_in_flight,
            errors_total,
        })
    }

    /// Records one document leaving a stage with its terminal status.
    pub fn record_document(&self, stage: &str, status: StepStatus) {
        self.documents_processed_total
            .with_label_values(&[stage, &status.to_string()])
            .inc();
    }

    /// Records a completed stage batch and its duration.
    pub fn record_batch(&self, stage: &str, duration_secs: f64) {
        self.batches_processed_total.inc();
        self.stage_duration_seconds
            .with_label_values(&[stage])
            .observe(duration_secs);
    }

    /// Records a whole-run duration.
    pub fn record_run(&self, duration_secs: f64) {
        self.run_duration_seconds.observe(duration_secs);
    }

    /// Records an error by stage and category.
    pub fn record_error(&self, stage: &str, error: &PipelineError) {
        self.errors_total
            .with_label_values(&[stage, error.category()])
            .inc();
    }

    /// Adjusts the in-flight gauge as documents enter/leave the pipeline.
    pub fn add_in_flight(&self, delta: i64) {
        self.documents_in_flight.add(delta);
    }

    /// The underlying registry, for exposition.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Renders all metrics in the Prometheus text format.
    pub fn gather_text(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::warn!("Metrics encoding failed: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_counter_labelled_by_stage_and_status() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_document("embedder", StepStatus::Success);
        metrics.record_document("embedder", StepStatus::Success);
        metrics.record_document("embedder", StepStatus::Error);

        let text = metrics.gather_text();
        assert!(text.contains("docpipe_documents_processed_total"));
        assert!(text.contains("stage=\"embedder\""));
        assert!(text.contains("status=\"success\""));
        assert!(text.contains("status=\"error\""));
    }

    #[test]
    fn test_error_counter_uses_category() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_error("indexer", &PipelineError::indexing("boom"));
        let text = metrics.gather_text();
        assert!(text.contains("category=\"indexing\""));
    }

    #[test]
    fn test_batch_and_run_metrics_register() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_batch("loader", 0.5);
        metrics.record_run(2.0);
        metrics.add_in_flight(3);
        metrics.add_in_flight(-3);
        let text = metrics.gather_text();
        assert!(text.contains("docpipe_batches_processed_total"));
        assert!(text.contains("docpipe_run_duration_seconds"));
    }
}
