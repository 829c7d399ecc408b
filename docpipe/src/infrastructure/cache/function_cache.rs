// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Function Memoization Cache
//!
//! Per-function memoization namespace over any [`CacheBackend`], keyed by
//! `(prefix, function_name, argument-hash)`. The embedder and summarizer
//! use it to skip repeat model calls for identical inputs.
//!
//! Values are JSON; a failed read or a corrupt entry degrades to a miss,
//! and a failed write is logged and ignored; memoization never turns
//! into a pipeline failure.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use docpipe_domain::services::{hash_bytes, CacheBackend};

/// Memoization facade scoped to one prefix (for example `"emb"` or
/// `"summary"`).
pub struct FunctionCache {
    backend: Arc<dyn CacheBackend>,
    prefix: String,
    default_ttl: Duration,
}

impl FunctionCache {
    pub fn new(backend: Arc<dyn CacheBackend>, prefix: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            backend,
            prefix: prefix.into(),
            default_ttl,
        }
    }

    /// The cache key for a function call with the given argument bytes.
    fn key(&self, function_name: &str, args: &[u8]) -> String {
        format!("{}:{}:{}", self.prefix, function_name, hash_bytes(args))
    }

    /// Fetches a memoized value for `(function_name, args)`.
    pub async fn get<T: DeserializeOwned>(&self, function_name: &str, args: &[u8]) -> Option<T> {
        let key = self.key(function_name, args);
        match self.backend.get(&key).await {
            Ok(Some(payload)) => match serde_json::from_slice(&payload) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::debug!("Corrupt memo entry {}: {}", key, e);
                    let _ = self.backend.delete(&key).await;
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Memo read failed {}: {}", key, e);
                None
            }
        }
    }

    /// Stores a memoized value.
    pub async fn put<T: Serialize>(&self, function_name: &str, args: &[u8], value: &T) {
        let key = self.key(function_name, args);
        match serde_json::to_vec(value) {
            Ok(payload) => {
                if let Err(e) = self.backend.set(&key, payload, Some(self.default_ttl)).await {
                    tracing::debug!("Memo write failed {}: {}", key, e);
                }
            }
            Err(e) => tracing::debug!("Memo serialize failed {}: {}", key, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::MemoryCacheBackend;

    fn cache(prefix: &str) -> FunctionCache {
        let backend = Arc::new(MemoryCacheBackend::new(64, Duration::from_secs(60)));
        FunctionCache::new(backend, prefix, Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_memoization_round_trip() {
        let memo = cache("emb");
        let vector = vec![0.25f32, 0.5, 0.75];
        memo.put("embed", b"some text", &vector).await;
        let back: Vec<f32> = memo.get("embed", b"some text").await.unwrap();
        assert_eq!(back, vector);
    }

    #[tokio::test]
    async fn test_different_args_are_different_keys() {
        let memo = cache("emb");
        memo.put("embed", b"text a", &1u32).await;
        assert_eq!(memo.get::<u32>("embed", b"text b").await, None);
    }

    #[tokio::test]
    async fn test_different_functions_are_isolated() {
        let memo = cache("summary");
        memo.put("summarize", b"x", &"short".to_string()).await;
        assert_eq!(memo.get::<String>("combine", b"x").await, None);
    }

    #[tokio::test]
    async fn test_prefixes_share_backend_without_collision() {
        let backend: Arc<MemoryCacheBackend> =
            Arc::new(MemoryCacheBackend::new(64, Duration::from_secs(60)));
        let a = FunctionCache::new(backend.clone(), "emb", Duration::from_secs(60));
        let b = FunctionCache::new(backend, "summary", Duration::from_secs(60));
        a.put("f", b"args", &1u32).await;
        assert_eq!(b.get::<u32>("f", b"args").await, None);
    }
}
