// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Clustering Stage
//!
//! Groups the batch's embedded documents with seeded k-means. The cluster
//! count comes from the elbow heuristic over
//! `k ∈ [1, min(max_clusters, N / min_cluster_size)]`; batches smaller
//! than `min_cluster_size` collapse to a single cluster.
//!
//! Each embedded document's metadata gains a `clustering` annotation:
//! its cluster id, the size of that cluster, the cluster's top keywords
//! (extracted from the bodies most similar to the centroid), and the
//! document's own cosine similarity to the centroid.
//!
//! The whole batch is one fit; per-document concurrency is deliberately
//! absent here. Documents without a usable body vector receive a Skipped
//! step; a batch with no embeddings at all skips the stage entirely.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Instant;

use docpipe_domain::services::{kmeans, optimal_cluster_count, text_chunker, KMeansFit};
use docpipe_domain::{Document, EmbeddingVector, PipelineError, ProcessingStep};

use super::{ProcessingStage, StageContext};

const STAGE_NAME: &str = "clusterer";

/// Configuration for the clustering stage, validated at construction.
#[derive(Debug, Clone)]
pub struct ClustererConfig {
    /// Upper bound for the elbow search (the CLI's cluster-count hint)
    pub max_clusters: usize,
    /// Minimum documents per cluster; also the lower bound for the
    /// elbow search
    pub min_cluster_size: usize,
    /// Seed making the fit deterministic
    pub seed: u64,
    /// Keywords extracted per cluster
    pub top_keywords: usize,
}

impl ClustererConfig {
    pub fn new(max_clusters: usize, min_cluster_size: usize) -> Result<Self, PipelineError> {
        let config = Self {
            max_clusters,
            min_cluster_size,
            seed: 42,
            top_keywords: 5,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PipelineError> {
        if self.max_clusters < 1 {
            return Err(PipelineError::invalid_config("max_clusters must be >= 1"));
        }
        if self.min_cluster_size < 1 {
            return Err(PipelineError::invalid_config("min_cluster_size must be >= 1"));
        }
        Ok(())
    }
}

/// The clustering stage.
pub struct Clusterer {
    config: ClustererConfig,
}

impl Clusterer {
    pub fn new(config: ClustererConfig) -> Self {
        Self { config }
    }

    /// Top keywords for a cluster: the member bodies most similar to the
    /// centroid contribute their words, deduplicated, first-seen order.
    fn cluster_keywords(
        &self,
        members: &[(usize, &Document)],
        vectors: &[EmbeddingVector],
        centroid: &EmbeddingVector,
    ) -> Vec<String> {
        let mut scored: Vec<(f32, &Document)> = members
            .iter()
            .map(|(vector_index, document)| {
                let similarity = vectors[*vector_index]
                    .cosine_similarity(centroid)
                    .unwrap_or(0.0);
                (similarity, *document)
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let mut keywords = Vec::new();
        let mut seen = BTreeSet::new();
        for (_, document) in scored.iter().take(self.config.top_keywords) {
            for word in text_chunker::clean_text(&document.content.body)
                .to_lowercase()
                .split_whitespace()
            {
                if word.len() > 3 && seen.insert(word.to_string()) {
                    keywords.push(word.to_string());
                    if keywords.len() >= self.config.top_keywords {
                        return keywords;
                    }
                }
            }
        }
        keywords
    }
}

#[async_trait]
impl ProcessingStage for Clusterer {
    fn name(&self) -> &'static str {
        STAGE_NAME
    }

    async fn process(
        &self,
        mut batch: Vec<Document>,
        ctx: &StageContext,
    ) -> Result<Vec<Document>, PipelineError> {
        let started = Instant::now();

        // indices of documents with usable vectors, in batch order
        let embedded: Vec<usize> = batch
            .iter()
            .enumerate()
            .filter(|(_, d)| d.has_body_vector())
            .map(|(i, _)| i)
            .collect();

        if embedded.is_empty() {
            tracing::info!("Clusterer skipped: no embedded documents in batch");
            for document in &batch {
                ctx.record_outcome(
                    document.id,
                    ProcessingStep::skipped(STAGE_NAME, "no embeddings in batch"),
                )
                .await;
            }
            return Ok(batch);
        }

        let vectors: Vec<EmbeddingVector> = embedded
            .iter()
            .filter_map(|&i| batch[i].embeddings.body.clone())
            .collect();

        let k = optimal_cluster_count(
            &vectors,
            self.config.min_cluster_size,
            self.config.max_clusters,
            self.config.seed,
        )?;
        let fit: KMeansFit = kmeans(&vectors, k, self.config.seed, 100)?;
        tracing::info!(
            "Clustered {} documents into {} clusters (inertia {:.3})",
            vectors.len(),
            k,
            fit.inertia
        );

        // per-cluster keyword extraction over member bodies
        let mut cluster_keywords: Vec<Vec<String>> = Vec::with_capacity(fit.centroids.len());
        for (cluster, centroid) in fit.centroids.iter().enumerate() {
            let members: Vec<(usize, &Document)> = fit
                .assignments
                .iter()
                .enumerate()
                .filter(|(_, &a)| a == cluster)
                .map(|(vector_index, _)| (vector_index, &batch[embedded[vector_index]]))
                .collect();
            cluster_keywords.push(self.cluster_keywords(&members, &vectors, centroid));
        }

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        // annotate embedded documents; skip the rest
        for (vector_index, &batch_index) in embedded.iter().enumerate() {
            let cluster = fit.assignments[vector_index];
            let similarity = vectors[vector_index]
                .cosine_similarity(&fit.centroids[cluster])
                .unwrap_or(0.0);
            let annotation = serde_json::json!({
                "cluster_id": cluster,
                "cluster_size": fit.cluster_size(cluster),
                "keywords": cluster_keywords[cluster],
                "similarity_to_centroid": similarity,
            });
            let document = &mut batch[batch_index];
            document.metadata.annotate("clustering", annotation);
            ctx.record_outcome(
                document.id,
                ProcessingStep::success(STAGE_NAME, duration_ms)
                    .with_detail("cluster_id", cluster.to_string())
                    .with_metric("similarity_to_centroid", similarity as f64),
            )
            .await;
        }
        let embedded_set: BTreeSet<usize> = embedded.into_iter().collect();
        for (i, document) in batch.iter().enumerate() {
            if !embedded_set.contains(&i) {
                ctx.record_outcome(
                    document.id,
                    ProcessingStep::skipped(STAGE_NAME, "no body vector"),
                )
                .await;
            }
        }

        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::test_support::{context, document, with_lineage};
    use docpipe_domain::StepStatus;

    fn embedded_document(body: &str, vector: &[f32]) -> Document {
        let mut doc = document(body);
        doc.embeddings.body = Some(EmbeddingVector::new(vector.to_vec()).unwrap());
        doc
    }

    fn config(max_clusters: usize, min_cluster_size: usize) -> ClustererConfig {
        ClustererConfig::new(max_clusters, min_cluster_size).unwrap()
    }

    #[tokio::test]
    async fn test_small_batch_collapses_to_cluster_zero() {
        let ctx = context();
        let docs = vec![
            embedded_document("alpha beta gamma delta", &[0.0, 1.0]),
            embedded_document("epsilon zeta eta theta", &[1.0, 0.0]),
        ];
        for doc in &docs {
            with_lineage(&ctx, doc).await;
        }

        let out = Clusterer::new(config(5, 3)).process(docs, &ctx).await.unwrap();
        for document in &out {
            let clustering = &document.metadata.extra["clustering"];
            assert_eq!(clustering["cluster_id"], 0);
            assert_eq!(clustering["cluster_size"], 2);
        }
    }

    #[tokio::test]
    async fn test_annotations_cover_all_fields() {
        let ctx = context();
        let docs: Vec<Document> = (0..6)
            .map(|i| {
                let offset = if i < 3 { 0.0 } else { 10.0 };
                embedded_document(
                    &format!("sample words number{} content", i),
                    &[offset + (i % 3) as f32 * 0.01, offset],
                )
            })
            .collect();
        for doc in &docs {
            with_lineage(&ctx, doc).await;
        }

        let out = Clusterer::new(config(3, 2)).process(docs, &ctx).await.unwrap();
        for document in &out {
            let clustering = &document.metadata.extra["clustering"];
            assert!(clustering["cluster_id"].is_number());
            assert!(clustering["cluster_size"].as_u64().unwrap() >= 1);
            assert!(clustering["keywords"].is_array());
            let similarity = clustering["similarity_to_centroid"].as_f64().unwrap();
            assert!((-1.0..=1.0001).contains(&similarity));
        }
    }

    #[tokio::test]
    async fn test_deterministic_across_runs() {
        let docs: Vec<Document> = (0..8)
            .map(|i| embedded_document("text body", &[(i % 4) as f32, (i / 4) as f32]))
            .collect();

        let ctx_a = context();
        let ctx_b = context();
        for doc in &docs {
            with_lineage(&ctx_a, doc).await;
            with_lineage(&ctx_b, doc).await;
        }

        let out_a = Clusterer::new(config(4, 2)).process(docs.clone(), &ctx_a).await.unwrap();
        let out_b = Clusterer::new(config(4, 2)).process(docs, &ctx_b).await.unwrap();
        let ids_a: Vec<_> = out_a
            .iter()
            .map(|d| d.metadata.extra["clustering"]["cluster_id"].as_u64())
            .collect();
        let ids_b: Vec<_> = out_b
            .iter()
            .map(|d| d.metadata.extra["clustering"]["cluster_id"].as_u64())
            .collect();
        assert_eq!(ids_a, ids_b);
    }

    #[tokio::test]
    async fn test_unembedded_documents_are_skipped() {
        let ctx = context();
        let with_vector = embedded_document("has a vector", &[1.0, 0.0]);
        let without_vector = document("no vector here");
        with_lineage(&ctx, &with_vector).await;
        with_lineage(&ctx, &without_vector).await;
        let skipped_id = without_vector.id;

        let out = Clusterer::new(config(3, 1))
            .process(vec![with_vector, without_vector], &ctx)
            .await
            .unwrap();
        assert_eq!(out.len(), 2);

        let lineage = ctx.lineage.get(skipped_id).await.unwrap();
        assert_eq!(lineage.processing_steps[0].status, StepStatus::Skipped);
        assert!(out[1].metadata.extra.get("clustering").is_none());
    }

    #[tokio::test]
    async fn test_stage_skips_entirely_without_embeddings() {
        let ctx = context();
        let docs = vec![document("plain one"), document("plain two")];
        for doc in &docs {
            with_lineage(&ctx, doc).await;
        }
        let out = Clusterer::new(config(3, 1)).process(docs, &ctx).await.unwrap();
        for document in &out {
            let lineage = ctx.lineage.get(document.id).await.unwrap();
            assert_eq!(lineage.processing_steps[0].status, StepStatus::Skipped);
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(ClustererConfig::new(0, 1).is_err());
        assert!(ClustererConfig::new(5, 0).is_err());
        assert!(ClustererConfig::new(5, 3).is_ok());
    }
}
