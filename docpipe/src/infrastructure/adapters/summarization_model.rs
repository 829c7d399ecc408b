// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Summarization Model Client
//!
//! `reqwest` adapter for the external summarization model behind the
//! [`SummarizationModelService`] port. Endpoint from
//! `PIPELINE_SUMMARIZER_URL`; wire contract:
//! `POST {base}/v1/summarize` with `{text, max_length, min_length}`
//! returning `{summary}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docpipe_domain::services::SummarizationModelService;
use docpipe_domain::PipelineError;

/// Configuration for the summarizer client.
#[derive(Debug, Clone)]
pub struct SummarizationModelConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl SummarizationModelConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// HTTP summarization model adapter.
pub struct HttpSummarizationModel {
    client: reqwest::Client,
    config: SummarizationModelConfig,
}

#[derive(Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
    max_length: usize,
    min_length: usize,
}

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

impl HttpSummarizationModel {
    pub fn new(config: SummarizationModelConfig) -> Result<Self, PipelineError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PipelineError::resource(format!("Cannot build summarizer client: {}", e)))?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl SummarizationModelService for HttpSummarizationModel {
    async fn summarize(
        &self,
        text: &str,
        max_length: usize,
        min_length: usize,
    ) -> Result<String, PipelineError> {
        let url = format!("{}/v1/summarize", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&SummarizeRequest {
                text,
                max_length,
                min_length,
            })
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    PipelineError::Timeout(format!("Summarize request: {}", e))
                } else {
                    PipelineError::resource(format!("Summarize request: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PipelineError::resource(format!(
                "Summarizer returned {}: {}",
                status, body
            )));
        }

        let parsed: SummarizeResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::resource(format!("Bad summarize response: {}", e)))?;
        Ok(parsed.summary)
    }
}
