//! Shared fixtures for the integration tests: deterministic fake model
//! and index collaborators plus context wiring.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use docpipe_bootstrap::CancellationToken;
use docpipe_domain::services::{
    DeleteOutcome, EmbeddingModelService, IndexRecord, SearchResult, SummarizationModelService,
    UpsertReport, VectorIndexClient,
};
use docpipe_domain::{Document, DocumentId, DocumentMetadata, EmbeddingVector, PipelineError};

use docpipe::application::stages::StageContext;
use docpipe::infrastructure::cache::MemoryCacheBackend;
use docpipe::infrastructure::lineage::{
    LineageCache, LineageManager, LineageStore, LineageStoreConfig,
};
use docpipe::infrastructure::observability::{ErrorLog, HealthAggregator, MetricsService};

/// A fresh stage context over in-memory backends.
pub fn context() -> StageContext {
    let store = Arc::new(LineageStore::new(LineageStoreConfig::default()));
    let backend = Arc::new(MemoryCacheBackend::new(4096, Duration::from_secs(300)));
    let cache = Arc::new(LineageCache::new(backend, Duration::from_secs(300)));
    StageContext {
        lineage: Arc::new(LineageManager::new(store, cache)),
        metrics: Arc::new(MetricsService::new().expect("metrics")),
        health: Arc::new(HealthAggregator::new()),
        errors: Arc::new(ErrorLog::default()),
        cancellation: CancellationToken::new(),
    }
}

/// A document fixture with deterministic metadata.
pub fn document(body: &str, title: &str) -> Document {
    use chrono::TimeZone;
    Document::new(
        body,
        DocumentMetadata::new(
            title,
            "test",
            chrono::Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap(),
            format!("fixtures/{}.md", title),
        ),
    )
}

/// Deterministic embedding model; fails for bodies containing the
/// configured marker.
pub struct FakeEmbeddingModel {
    pub fail_marker: Option<String>,
}

impl FakeEmbeddingModel {
    pub fn reliable() -> Arc<Self> {
        Arc::new(Self { fail_marker: None })
    }

    pub fn failing_on(marker: &str) -> Arc<Self> {
        Arc::new(Self {
            fail_marker: Some(marker.to_string()),
        })
    }
}

#[async_trait]
impl EmbeddingModelService for FakeEmbeddingModel {
    fn model_id(&self) -> &str {
        "fake-embedding-model"
    }

    fn dimension(&self) -> usize {
        8
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector, PipelineError> {
        if let Some(marker) = &self.fail_marker {
            if text.contains(marker) {
                return Err(PipelineError::Timeout(
                    "embedding model unreachable".to_string(),
                ));
            }
        }
        let mut counts = [0.1f32; 8];
        for (i, b) in text.bytes().enumerate() {
            counts[i % 8] += (b % 23) as f32;
        }
        EmbeddingVector::new(counts.to_vec())
    }
}

/// Summarizer double that truncates instead of calling a model.
pub struct FakeSummarizationModel;

#[async_trait]
impl SummarizationModelService for FakeSummarizationModel {
    async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        _min_length: usize,
    ) -> Result<String, PipelineError> {
        let words: Vec<&str> = text.split_whitespace().take(max_length.max(1) / 2).collect();
        Ok(words.join(" "))
    }
}

/// In-memory vector index capturing upserts.
#[derive(Default)]
pub struct InMemoryIndex {
    pub stored: Mutex<BTreeMap<DocumentId, Vec<f32>>>,
    pub upsert_calls: Mutex<usize>,
}

impl InMemoryIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn stored_ids(&self) -> BTreeSet<DocumentId> {
        self.stored.lock().keys().copied().collect()
    }
}

#[async_trait]
impl VectorIndexClient for InMemoryIndex {
    async fn upsert_batch(
        &self,
        _class_name: &str,
        records: &[IndexRecord],
    ) -> Result<UpsertReport, PipelineError> {
        *self.upsert_calls.lock() += 1;
        let mut stored = self.stored.lock();
        for record in records {
            stored.insert(record.id, record.vector.clone());
        }
        Ok(UpsertReport {
            ok_count: records.len(),
            item_errors: Vec::new(),
        })
    }

    async fn delete(&self, id: DocumentId) -> Result<DeleteOutcome, PipelineError> {
        Ok(if self.stored.lock().remove(&id).is_some() {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::NotFound
        })
    }

    async fn update(
        &self,
        id: DocumentId,
        _partial_fields: serde_json::Value,
        vector: Option<Vec<f32>>,
    ) -> Result<(), PipelineError> {
        if let Some(vector) = vector {
            self.stored.lock().insert(id, vector);
        }
        Ok(())
    }

    async fn semantic_search(
        &self,
        _vector: &[f32],
        _limit: usize,
        _min_score: f32,
        _extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        Ok(Vec::new())
    }

    async fn hybrid_search(
        &self,
        _text: &str,
        _vector: &[f32],
        _limit: usize,
        _alpha: f32,
        _extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        Ok(Vec::new())
    }
}
