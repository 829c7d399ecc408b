// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline CLI
//!
//! Composition root for the document enrichment pipeline. The flow is:
//!
//! 1. parse and resolve configuration (flags over `PIPELINE_*`
//!    environment over defaults); validation failures exit 1 before any
//!    stage runs
//! 2. initialize logging (NDJSON at `<log-dir>/pipeline.json` plus a
//!    stderr layer)
//! 3. wire the lineage store/cache, the schema registry, the caches, the
//!    HTTP clients, and the enabled stages
//! 4. install signal handlers feeding the shutdown coordinator whose
//!    token every stage checks at batch boundaries
//! 5. run, print the processed-document count and log path on success,
//!    or a one-line diagnostic on stderr and exit 1 on any fatal error
//!
//! Inside the process, failures map to sysexits-style [`ExitCode`]s for
//! logs and tests; `as_process_code()` collapses them to the external
//! `0`/`1` contract at the very last line.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;

use docpipe_bootstrap::signals::create_signal_handler;
use docpipe_bootstrap::{CliArgs, ExitCode, PipelineSettings, ShutdownCoordinator, StepName};
use docpipe_domain::{
    FieldDefinition, FieldType, PipelineError, SchemaDefinition, SchemaKind, SchemaVersion,
};

use docpipe::application::stages::{
    Clusterer, ClustererConfig, Deduplicator, Embedder, EmbedderConfig, Indexer, IndexerConfig,
    Loader, LoaderConfig, PiiConfig, PiiStage, ProcessingStage, StageContext, Summarizer,
    SummarizerConfig,
};
use docpipe::infrastructure::adapters::{
    EmbeddingModelConfig, HeuristicEntityRecognizer, HttpEmbeddingModel, HttpSummarizationModel,
    HttpVectorIndex, HttpVectorIndexConfig, SummarizationModelConfig,
};
use docpipe::infrastructure::cache::{FunctionCache, MemoryCacheBackend};
use docpipe::infrastructure::lineage::{
    LineageCache, LineageManager, LineageStore, LineageStoreConfig,
};
use docpipe::infrastructure::logging::{init_logging, log_file_path};
use docpipe::infrastructure::observability::{ErrorLog, HealthAggregator, MetricsService};
use docpipe::infrastructure::schema::{SchemaRegistry, SchemaRegistryConfig};
use docpipe::{PipelineRunResult, PipelineService};

/// Cache capacity for the shared in-memory backend.
const CACHE_CAPACITY: usize = 4096;

/// Default endpoints for the model services when the environment does
/// not name them.
const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8081";
const DEFAULT_SUMMARIZER_URL: &str = "http://localhost:8082";

/// Directory for persisted schema envelopes.
const SCHEMA_DIR: &str = "schemas";

#[tokio::main]
async fn main() {
    let code = run().await;
    std::process::exit(code.as_process_code());
}

async fn run() -> ExitCode {
    let args = CliArgs::parse();
    let settings = match args.resolve() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::Config;
        }
    };

    let _logging_guard = match init_logging(&settings.log_dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Cannot initialize logging: {}", e);
            return ExitCode::Software;
        }
    };

    match execute(&settings).await {
        Ok(result) => {
            println!(
                "Processed {} documents ({} loaded{}). Log: {}",
                result.documents.len(),
                result.loaded_count,
                if result.cancelled { ", cancelled" } else { "" },
                log_file_path(&settings.log_dir).display()
            );
            ExitCode::Success
        }
        Err(e) => {
            // the structured log line carries the full chain; stderr
            // gets the one-line diagnostic
            tracing::error!(error = format!("{:#}", e).as_str(), "Pipeline run failed");
            eprintln!("Pipeline error: {:#}", e);
            exit_code_for(&e)
        }
    }
}

/// Maps a fatal error onto the internal exit-code set. The process edge
/// still collapses everything to 0/1.
fn exit_code_for(error: &anyhow::Error) -> ExitCode {
    match error.downcast_ref::<PipelineError>() {
        Some(PipelineError::Validation(_)) | Some(PipelineError::InvalidConfiguration(_)) => {
            ExitCode::Config
        }
        Some(PipelineError::Io(_)) => ExitCode::IoError,
        Some(PipelineError::Resource(_)) | Some(PipelineError::Timeout(_)) => ExitCode::Unavailable,
        Some(_) => ExitCode::Error,
        None => ExitCode::Software,
    }
}

async fn execute(settings: &PipelineSettings) -> anyhow::Result<PipelineRunResult> {
    let coordinator = ShutdownCoordinator::default();
    install_signal_handler(&coordinator);

    // shared cache backend and lineage plumbing
    let ttl = Duration::from_secs(settings.cache_ttl_secs);
    tracing::info!(
        "Cache backend {}:{} (ttl {}s)",
        settings.cache_host,
        settings.cache_port,
        settings.cache_ttl_secs
    );
    let backend = Arc::new(MemoryCacheBackend::new(CACHE_CAPACITY, ttl));
    let store = Arc::new(LineageStore::new(LineageStoreConfig::default()));
    let lineage_cache = Arc::new(LineageCache::new(backend.clone(), ttl));
    let lineage = Arc::new(LineageManager::new(store, lineage_cache));

    // schema registry: persist the index document schema for this run
    let registry = SchemaRegistry::new(SchemaRegistryConfig::new(SCHEMA_DIR))
        .context("schema registry initialization failed")?;
    registry
        .register(&index_document_schema(), true, true)
        .context("registering the index document schema failed")?;

    let ctx = StageContext {
        lineage,
        metrics: Arc::new(MetricsService::new()?),
        health: Arc::new(HealthAggregator::new()),
        errors: Arc::new(ErrorLog::default()),
        cancellation: coordinator.token(),
    };

    let (source, stages) =
        build_stages(settings, backend).context("stage construction failed")?;
    let service = PipelineService::new(source, stages, settings.batch_size)?;

    let result = service.run(&ctx).await;
    coordinator.complete_shutdown();
    Ok(result?)
}

fn install_signal_handler(coordinator: &ShutdownCoordinator) {
    let handler = create_signal_handler();
    let coordinator = coordinator.clone();
    tokio::spawn(async move {
        handler
            .wait_for_signal(Box::new(move || coordinator.initiate_shutdown()))
            .await;
    });
}

/// Builds the enabled stages in canonical order.
fn build_stages(
    settings: &PipelineSettings,
    backend: Arc<MemoryCacheBackend>,
) -> Result<(Option<Arc<dyn ProcessingStage>>, Vec<Arc<dyn ProcessingStage>>), PipelineError> {
    let ttl = Duration::from_secs(settings.cache_ttl_secs);
    let mut source: Option<Arc<dyn ProcessingStage>> = None;
    let mut stages: Vec<Arc<dyn ProcessingStage>> = Vec::new();

    for step in &settings.steps {
        match step {
            StepName::Load => {
                source = Some(Arc::new(Loader::new(LoaderConfig::new(
                    settings.export_dir.clone(),
                )?)));
            }
            StepName::Deduplicate => {
                stages.push(Arc::new(Deduplicator::new()));
            }
            StepName::Pii => {
                stages.push(Arc::new(PiiStage::new(
                    PiiConfig::default(),
                    Arc::new(HeuristicEntityRecognizer::new()),
                )));
            }
            StepName::Summarize => {
                let endpoint = settings
                    .summarizer_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SUMMARIZER_URL.to_string());
                let model = Arc::new(HttpSummarizationModel::new(SummarizationModelConfig::new(
                    endpoint,
                ))?);
                let memo = Arc::new(FunctionCache::new(backend.clone(), "summary", ttl));
                stages.push(Arc::new(Summarizer::new(
                    SummarizerConfig::new(settings.summary_max_length, settings.summary_min_length)?,
                    model,
                    Some(memo),
                )));
            }
            StepName::Embed => {
                let endpoint = settings
                    .embedding_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EMBEDDING_URL.to_string());
                let model = Arc::new(HttpEmbeddingModel::new(EmbeddingModelConfig::new(endpoint))?);
                let memo = Arc::new(FunctionCache::new(backend.clone(), "emb", ttl));
                stages.push(Arc::new(Embedder::new(
                    EmbedderConfig::default(),
                    model,
                    Some(memo),
                )?));
            }
            StepName::Cluster => {
                stages.push(Arc::new(Clusterer::new(ClustererConfig::new(
                    settings.cluster_count,
                    settings.min_cluster_size,
                )?)));
            }
            StepName::Index => {
                let index = Arc::new(HttpVectorIndex::new(HttpVectorIndexConfig::new(
                    settings.index_url.clone(),
                ))?);
                stages.push(Arc::new(Indexer::new(
                    IndexerConfig::new("Document", settings.batch_size)?,
                    index,
                )));
            }
        }
    }
    Ok((source, stages))
}

/// The schema persisted for the vector-index document class.
fn index_document_schema() -> SchemaDefinition {
    SchemaDefinition::new("document", SchemaVersion::new(1, 0, 0), SchemaKind::Document)
        .with_field("title", FieldDefinition::new(FieldType::String).required())
        .with_field("source", FieldDefinition::new(FieldType::String).required())
        .with_field("timestamp", FieldDefinition::new(FieldType::Datetime).required())
        .with_field("path", FieldDefinition::new(FieldType::String).required())
        .with_field("body", FieldDefinition::new(FieldType::String).required())
        .with_field("summary", FieldDefinition::new(FieldType::String))
}
