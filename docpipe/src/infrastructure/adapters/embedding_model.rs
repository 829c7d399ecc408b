// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Embedding Model Client
//!
//! `reqwest` adapter for the external embedding model behind the
//! [`EmbeddingModelService`] port. The endpoint comes from
//! `PIPELINE_EMBEDDING_URL`; the wire contract is a minimal
//! `POST {base}/v1/embeddings` with `{model, input}` returning
//! `{embedding: [f32]}`.
//!
//! A timeout is a document-scoped error at the stage boundary, never a
//! stage failure; the adapter only classifies it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docpipe_domain::services::EmbeddingModelService;
use docpipe_domain::{EmbeddingVector, PipelineError};

/// Configuration for the embedding client.
#[derive(Debug, Clone)]
pub struct EmbeddingModelConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub request_timeout: Duration,
}

impl EmbeddingModelConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: "text-embedding-v1".to_string(),
            dimension: 384,
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP embedding model adapter.
pub struct HttpEmbeddingModel {
    client: reqwest::Client,
    config: EmbeddingModelConfig,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl HttpEmbeddingModel {
    pub fn new(config: EmbeddingModelConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PipelineError::resource(format!("Cannot build embedding client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl EmbeddingModelService for HttpEmbeddingModel {
    fn model_id(&self) -> &str {
        &self.config.model
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    async fn embed(&self, text: &str) -> Result<EmbeddingVector, PipelineError> {
        let url = format!(
            "{}/v1/embeddings",
            self.config.base_url.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .json(&EmbeddingRequest {
                model: &self.config.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout(format!("Embedding request: {}", e))
                } else {
                    PipelineError::resource(format!("Embedding request: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::resource(format!(
                "Embedding model returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::resource(format!("Bad embedding response: {}", e)))?;

        if parsed.embedding.len() != self.config.dimension {
            return Err(PipelineError::validation(format!(
                "Embedding dimension {} does not match declared {}",
                parsed.embedding.len(),
                self.config.dimension
            )));
        }
        EmbeddingVector::new(parsed.embedding)
    }
}
