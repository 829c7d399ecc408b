// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # HTTP Vector Index Client
//!
//! `reqwest` implementation of the [`VectorIndexClient`] port against the
//! external vector index's JSON API. The adapter owns connection pooling
//! and per-request timeouts; retry with backoff is the indexer stage's
//! policy and deliberately not duplicated here.
//!
//! Wire shape (one route per port operation):
//!
//! - `POST   {base}/v1/batch/{class}`    : batch upsert
//! - `DELETE {base}/v1/objects/{id}`     : delete (404 is NotFound)
//! - `PATCH  {base}/v1/objects/{id}`     : partial update
//! - `POST   {base}/v1/search/semantic`  : vector search
//! - `POST   {base}/v1/search/hybrid`    : blended search
//!
//! Communication failures surface as `Indexing` errors; per-item upsert
//! failures ride back inside the report without failing the call.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docpipe_domain::services::{
    DeleteOutcome, IndexRecord, SearchResult, UpsertReport, VectorIndexClient,
};
use docpipe_domain::{DocumentId, PipelineError};

/// Configuration for the index client.
#[derive(Debug, Clone)]
pub struct HttpVectorIndexConfig {
    /// Base endpoint, e.g. `http://localhost:8080`
    pub base_url: String,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl HttpVectorIndexConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP adapter for the external vector index.
pub struct HttpVectorIndex {
    client: reqwest::Client,
    config: HttpVectorIndexConfig,
}

#[derive(Serialize)]
struct UpsertRequest<'a> {
    objects: &'a [IndexRecord],
}

#[derive(Deserialize)]
struct UpsertResponse {
    #[serde(default)]
    ok_count: usize,
    #[serde(default)]
    errors: Vec<WireItemError>,
}

#[derive(Deserialize)]
struct WireItemError {
    id: DocumentId,
    message: String,
}

#[derive(Serialize)]
struct UpdateRequest<'a> {
    fields: &'a serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    vector: Option<&'a [f32]>,
}

#[derive(Serialize)]
struct SemanticSearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    min_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_props: Option<&'a [String]>,
}

#[derive(Serialize)]
struct HybridSearchRequest<'a> {
    text: &'a str,
    vector: &'a [f32],
    limit: usize,
    alpha: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    extra_props: Option<&'a [String]>,
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

impl HttpVectorIndex {
    pub fn new(config: HttpVectorIndexConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PipelineError::resource(format!("Cannot build index client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn request_error(context: &str, e: reqwest::Error) -> PipelineError {
        if e.is_timeout() {
            PipelineError::Timeout(format!("{}: {}", context, e))
        } else {
            PipelineError::indexing(format!("{}: {}", context, e))
        }
    }

    async fn check_status(
        context: &str,
        response: reqwest::Response,
    ) -> Result<reqwest::Response, PipelineError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PipelineError::indexing(format!(
            "{} failed with status {}: {}",
            context, status, body
        )))
    }
}

#[async_trait]
impl VectorIndexClient for HttpVectorIndex {
    async fn upsert_batch(
        &self,
        class_name: &str,
        records: &[IndexRecord],
    ) -> Result<UpsertReport, PipelineError> {
        if records.is_empty() {
            return Ok(UpsertReport::default());
        }
        let url = self.url(&format!("v1/batch/{}", class_name));
        let response = self
            .client
            .post(&url)
            .json(&UpsertRequest { objects: records })
            .send()
            .await
            .map_err(|e| Self::request_error("Batch upsert", e))?;
        let response = Self::check_status("Batch upsert", response).await?;
        let parsed: UpsertResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::indexing(format!("Bad upsert response: {}", e)))?;
        Ok(UpsertReport {
            ok_count: parsed.ok_count,
            item_errors: parsed
                .errors
                .into_iter()
                .map(|e| docpipe_domain::services::UpsertItemError {
                    id: e.id,
                    message: e.message,
                })
                .collect(),
        })
    }

    async fn delete(&self, id: DocumentId) -> Result<DeleteOutcome, PipelineError> {
        let url = self.url(&format!("v1/objects/{}", id));
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| Self::request_error("Delete", e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeleteOutcome::NotFound);
        }
        Self::check_status("Delete", response).await?;
        Ok(DeleteOutcome::Deleted)
    }

    async fn update(
        &self,
        id: DocumentId,
        partial_fields: serde_json::Value,
        vector: Option<Vec<f32>>,
    ) -> Result<(), PipelineError> {
        let url = self.url(&format!("v1/objects/{}", id));
        let response = self
            .client
            .patch(&url)
            .json(&UpdateRequest {
                fields: &partial_fields,
                vector: vector.as_deref(),
            })
            .send()
            .await
            .map_err(|e| Self::request_error("Update", e))?;
        Self::check_status("Update", response).await?;
        Ok(())
    }

    async fn semantic_search(
        &self,
        vector: &[f32],
        limit: usize,
        min_score: f32,
        extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        let url = self.url("v1/search/semantic");
        let response = self
            .client
            .post(&url)
            .json(&SemanticSearchRequest {
                vector,
                limit,
                min_score,
                extra_props,
            })
            .send()
            .await
            .map_err(|e| Self::request_error("Semantic search", e))?;
        let response = Self::check_status("Semantic search", response).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::indexing(format!("Bad search response: {}", e)))?;
        Ok(parsed.results)
    }

    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        limit: usize,
        alpha: f32,
        extra_props: Option<&[String]>,
    ) -> Result<Vec<SearchResult>, PipelineError> {
        let url = self.url("v1/search/hybrid");
        let response = self
            .client
            .post(&url)
            .json(&HybridSearchRequest {
                text,
                vector,
                limit,
                alpha,
                extra_props,
            })
            .send()
            .await
            .map_err(|e| Self::request_error("Hybrid search", e))?;
        let response = Self::check_status("Hybrid search", response).await?;
        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::indexing(format!("Bad search response: {}", e)))?;
        Ok(parsed.results)
    }
}
