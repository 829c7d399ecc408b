// /////////////////////////////////////////////////////////////////////////////
// Document Enrichment Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Memory Cache Backend
//!
//! Map-backed implementation of the [`CacheBackend`] port with per-entry
//! absolute expiry and LRU eviction at a configured capacity. The
//! observable contract: expired and evicted keys read as empty.
//!
//! This backend stands in for the external cache server in tests and in
//! single-process runs; the layered namespaces (lineage, schema, function
//! memoization) cannot tell the difference.
//!
//! LRU bookkeeping is a monotone access counter per entry rather than a
//! linked list. Capacity here is small (hundreds to thousands of
//! entries), so the O(n) eviction scan is cheaper than the pointer
//! gymnastics.

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use docpipe_domain::services::CacheBackend;
use docpipe_domain::PipelineError;

struct Entry {
    value: Vec<u8>,
    /// Absolute expiry time
    expires_at: DateTime<Utc>,
    /// Access stamp for LRU eviction
    last_access: u64,
}

struct Inner {
    entries: HashMap<String, Entry>,
    access_counter: u64,
}

/// In-memory LRU + TTL cache backend.
pub struct MemoryCacheBackend {
    inner: Mutex<Inner>,
    capacity: usize,
    default_ttl: Duration,
}

impl MemoryCacheBackend {
    /// Creates a backend bounded to `capacity` entries with the given
    /// default TTL.
    pub fn new(capacity: usize, default_ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                access_counter: 0,
            }),
            capacity: capacity.max(1),
            default_ttl,
        }
    }

    fn expiry_for(&self, ttl: Option<Duration>) -> DateTime<Utc> {
        let ttl = ttl.unwrap_or(self.default_ttl);
        Utc::now() + ChronoDuration::from_std(ttl).unwrap_or(ChronoDuration::seconds(86_400))
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.inner
            .lock()
            .entries
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PipelineError> {
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let stamp = inner.access_counter;
        match inner.entries.get_mut(key) {
            Some(entry) if entry.expires_at > Utc::now() => {
                entry.last_access = stamp;
                Ok(Some(entry.value.clone()))
            }
            Some(_) => {
                // expired; drop lazily on access
                inner.entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Option<Duration>,
    ) -> Result<(), PipelineError> {
        let expires_at = self.expiry_for(ttl);
        let mut inner = self.inner.lock();
        inner.access_counter += 1;
        let stamp = inner.access_counter;

        // make room: expired entries first, then the least recently used
        if !inner.entries.contains_key(key) && inner.entries.len() >= self.capacity {
            let now = Utc::now();
            inner.entries.retain(|_, e| e.expires_at > now);
            while inner.entries.len() >= self.capacity {
                let victim = inner
                    .entries
                    .iter()
                    .min_by_key(|(_, e)| e.last_access)
                    .map(|(k, _)| k.clone());
                match victim {
                    Some(victim) => {
                        inner.entries.remove(&victim);
                    }
                    None => break,
                }
            }
        }

        inner.entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at,
                last_access: stamp,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), PipelineError> {
        self.inner.lock().entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), PipelineError> {
        self.inner.lock().entries.clear();
        Ok(())
    }
}
