// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cache Backend Port
//!
//! Four-method byte-cache contract every cache namespace delegates to.
//! Implementations own TTL enforcement and size-bounded eviction; the
//! observable contract is simply that expired and evicted keys read as
//! empty.
//!
//! This is an infrastructure port: implementations talk to a cache server
//! or an in-memory map, so the trait is async. A map-backed in-memory
//! implementation is sufficient for tests and for single-process runs.
//!
//! Cache failures never propagate into pipeline failures: callers log and
//! degrade to no-cache.

use async_trait::async_trait;
use std::time::Duration;

use crate::PipelineError;

/// Byte-oriented cache backend with per-call TTL override.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Fetches a value; `None` for missing, expired, or evicted keys.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError>;

    /// Stores a value. A supplied `ttl` wins over the backend's default.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), PipelineError>;

    /// Removes a key; removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), PipelineError>;

    /// Drops every key in the backend's namespace.
    async fn clear(&self) -> Result<(), PipelineError>;
}
