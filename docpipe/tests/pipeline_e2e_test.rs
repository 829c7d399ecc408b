//! End-to-end pipeline scenarios over in-memory collaborators: empty
//! input, dedup collapse, embed-then-index with a failing document, and
//! cancellation.

mod common;

use std::sync::Arc;

use common::{context, FakeEmbeddingModel, FakeSummarizationModel, InMemoryIndex};
use docpipe::application::stages::{
    Clusterer, ClustererConfig, Deduplicator, Embedder, EmbedderConfig, Indexer, IndexerConfig,
    Loader, LoaderConfig, PiiConfig, PiiStage, ProcessingStage, Summarizer, SummarizerConfig,
};
use docpipe::infrastructure::adapters::HeuristicEntityRecognizer;
use docpipe::infrastructure::observability::HealthStatus;
use docpipe::PipelineService;
use docpipe_domain::{StepStatus, EMBEDDING_VERSION_FAILED};

fn write(dir: &std::path::Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).unwrap();
}

fn full_stages(
    embedding: Arc<FakeEmbeddingModel>,
    index: Arc<InMemoryIndex>,
) -> Vec<Arc<dyn ProcessingStage>> {
    let mut summarizer_config = SummarizerConfig::new(150, 50).unwrap();
    summarizer_config.min_word_count = 5;
    summarizer_config.chunk_size = 50;
    summarizer_config.chunk_overlap = 5;
    vec![
        Arc::new(Deduplicator::new()),
        Arc::new(PiiStage::new(
            PiiConfig::default(),
            Arc::new(HeuristicEntityRecognizer::new()),
        )),
        Arc::new(Summarizer::new(
            summarizer_config,
            Arc::new(FakeSummarizationModel),
            None,
        )),
        Arc::new(
            Embedder::new(
                EmbedderConfig {
                    chunk_size_tokens: 64,
                    chunk_overlap_tokens: 8,
                    worker_count: 2,
                },
                embedding,
                None,
            )
            .unwrap(),
        ),
        Arc::new(Clusterer::new(ClustererConfig::new(5, 3).unwrap())),
        Arc::new(Indexer::new(
            IndexerConfig::new("Document", 100).unwrap(),
            index,
        )),
    ]
}

#[tokio::test]
async fn empty_export_directory_completes_with_zero_documents() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context();
    let index = InMemoryIndex::new();

    let loader: Arc<dyn ProcessingStage> =
        Arc::new(Loader::new(LoaderConfig::new(dir.path()).unwrap()));
    let service = PipelineService::new(
        Some(loader),
        full_stages(FakeEmbeddingModel::reliable(), index.clone()),
        100,
    )
    .unwrap();

    let result = service.run(&ctx).await.unwrap();
    assert_eq!(result.loaded_count, 0);
    assert!(result.documents.is_empty());
    assert!(!result.cancelled);
    // lineage store empty, no upserts issued
    assert!(ctx.lineage.store().is_empty());
    assert_eq!(*index.upsert_calls.lock(), 0);
    assert_eq!(result.health.status, HealthStatus::Healthy);
}

/// Source double that emits the same logical document twice, the way
/// overlapping format readers can over one export tree.
struct DoubleEmittingSource;

#[async_trait::async_trait]
impl ProcessingStage for DoubleEmittingSource {
    fn name(&self) -> &'static str {
        "loader"
    }

    async fn process(
        &self,
        _batch: Vec<docpipe_domain::Document>,
        ctx: &docpipe::StageContext,
    ) -> Result<Vec<docpipe_domain::Document>, docpipe_domain::PipelineError> {
        let mut documents = Vec::new();
        for _ in 0..2 {
            // identical content and metadata; only the generated id differs
            let doc = common::document("identical content body for the pair", "shared");
            ctx.lineage.ensure_created(doc.id, None, None).await?;
            ctx.record_outcome(
                doc.id,
                docpipe_domain::ProcessingStep::success("loader", 0.1),
            )
            .await;
            documents.push(doc);
        }
        Ok(documents)
    }
}

#[tokio::test]
async fn duplicate_documents_collapse_before_later_stages() {
    let ctx = context();
    let index = InMemoryIndex::new();
    let service = PipelineService::new(
        Some(Arc::new(DoubleEmittingSource)),
        full_stages(FakeEmbeddingModel::reliable(), index.clone()),
        100,
    )
    .unwrap();

    let result = service.run(&ctx).await.unwrap();
    assert_eq!(result.loaded_count, 2);
    assert_eq!(result.documents.len(), 1, "dedup keeps one of the pair");
    assert_eq!(index.stored_ids().len(), 1);

    // the survivor is the first by encounter order and carries a full
    // stage history; the dropped twin stops at the deduplicator
    let survivor = &result.documents[0];
    let survivor_lineage = ctx.lineage.get(survivor.id).await.unwrap();
    let dedup_step = survivor_lineage
        .processing_steps
        .iter()
        .find(|s| s.step_name == "deduplicator")
        .unwrap();
    assert_eq!(dedup_step.status, StepStatus::Success);

    let dropped_id = ctx
        .lineage
        .store()
        .ids()
        .into_iter()
        .find(|id| *id != survivor.id)
        .unwrap();
    let dropped = ctx.lineage.get(dropped_id).await.unwrap();
    let step_names: Vec<&str> = dropped
        .processing_steps
        .iter()
        .map(|s| s.step_name.as_str())
        .collect();
    assert_eq!(step_names, vec!["loader", "deduplicator"]);
    assert_eq!(
        dropped.processing_steps.last().unwrap().status,
        StepStatus::Skipped
    );
}

#[tokio::test]
async fn embed_failure_marks_document_and_skips_indexing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "one.txt", "first perfectly ordinary document body");
    write(dir.path(), "two.txt", "POISONED document body that cannot embed");
    write(dir.path(), "three.txt", "third perfectly ordinary document body");

    let ctx = context();
    let index = InMemoryIndex::new();
    let loader: Arc<dyn ProcessingStage> =
        Arc::new(Loader::new(LoaderConfig::new(dir.path()).unwrap()));
    let service = PipelineService::new(
        Some(loader),
        full_stages(FakeEmbeddingModel::failing_on("POISONED"), index.clone()),
        100,
    )
    .unwrap();

    // the run itself succeeds: document-scoped failures never abort
    let result = service.run(&ctx).await.unwrap();
    assert_eq!(result.documents.len(), 3);

    let failed = result
        .documents
        .iter()
        .find(|d| d.content.body.contains("POISONED"))
        .unwrap();
    assert_eq!(failed.embeddings.version, EMBEDDING_VERSION_FAILED);
    assert!(failed.embeddings.error.is_some());

    // the two healthy documents are upserted; the failed one is skipped
    let stored = index.stored_ids();
    assert_eq!(stored.len(), 2);
    assert!(!stored.contains(&failed.id));

    let lineage = ctx.lineage.get(failed.id).await.unwrap();
    let embed_step = lineage
        .processing_steps
        .iter()
        .find(|s| s.step_name == "embedder")
        .unwrap();
    assert_eq!(embed_step.status, StepStatus::Error);
    let index_step = lineage
        .processing_steps
        .iter()
        .find(|s| s.step_name == "indexer")
        .unwrap();
    assert_eq!(index_step.status, StepStatus::Skipped);

    assert_eq!(result.health.status, HealthStatus::Degraded);
}

#[tokio::test]
async fn every_document_gets_one_step_per_enabled_stage() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        write(
            dir.path(),
            &format!("doc{}.txt", i),
            &format!("document body number {} with enough words to matter", i),
        );
    }

    let ctx = context();
    let index = InMemoryIndex::new();
    let loader: Arc<dyn ProcessingStage> =
        Arc::new(Loader::new(LoaderConfig::new(dir.path()).unwrap()));
    let service = PipelineService::new(
        Some(loader),
        full_stages(FakeEmbeddingModel::reliable(), index),
        2,
    )
    .unwrap();

    let result = service.run(&ctx).await.unwrap();
    let expected = [
        "loader",
        "deduplicator",
        "pii",
        "summarizer",
        "embedder",
        "clusterer",
        "indexer",
    ];
    for document in &result.documents {
        let lineage = ctx.lineage.get(document.id).await.unwrap();
        let names: Vec<&str> = lineage
            .processing_steps
            .iter()
            .map(|s| s.step_name.as_str())
            .collect();
        assert_eq!(names, expected, "document {}", document.id);
    }
}

#[tokio::test]
async fn cancellation_returns_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "doc.txt", "a document that will never be enriched");

    let ctx = context();
    ctx.cancellation.cancel();

    let index = InMemoryIndex::new();
    let loader: Arc<dyn ProcessingStage> =
        Arc::new(Loader::new(LoaderConfig::new(dir.path()).unwrap()));
    let service = PipelineService::new(
        Some(loader),
        full_stages(FakeEmbeddingModel::reliable(), index.clone()),
        100,
    )
    .unwrap();

    let result = service.run(&ctx).await.unwrap();
    assert!(result.cancelled);
    assert_eq!(*index.upsert_calls.lock(), 0);
    for document in &result.documents {
        let lineage = ctx.lineage.get(document.id).await.unwrap();
        for step in lineage
            .processing_steps
            .iter()
            .filter(|s| s.step_name != "loader")
        {
            assert_eq!(step.status, StepStatus::Skipped);
            assert_eq!(step.details["reason"], "cancelled");
        }
    }
}
