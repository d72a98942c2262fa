//! Typed facade over a [`KvStore`].
//!
//! The cache is advisory for existence facts and entities: read errors read
//! as "unknown", write errors are logged and swallowed. The work queue is
//! the exception, since the pipeline cannot run without it, so queue
//! operations propagate [`AppError::QueueUnavailable`].

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::AppError;
use crate::models::{EntityKind, Existence};
use crate::traits::KvStore;

/// List holding identifiers awaiting processing.
pub const QUEUE_KEY: &str = "job_processing_queue";

/// Prefix of fully materialized company records.
pub const COMPANY_ENTITY_PREFIX: &str = "company:name:";

/// TTLs of the two kinds of cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    /// Existence facts can flip (postings close), so they live for minutes.
    pub existence_secs: u64,
    /// Captured entities are stable, so they live for about an hour.
    pub entity_secs: u64,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            existence_secs: 300,
            entity_secs: 3600,
        }
    }
}

/// Key of an existence fact, e.g. `job_exists:4012345678`.
pub fn existence_key(kind: EntityKind, key: &str) -> String {
    format!("{}_exists:{}", kind.as_str(), key)
}

pub fn existence_prefix(kind: EntityKind) -> String {
    format!("{}_exists:", kind.as_str())
}

pub fn company_entity_key(name: &str) -> String {
    format!("{COMPANY_ENTITY_PREFIX}{name}")
}

fn queue_error(e: AppError) -> AppError {
    match e {
        AppError::QueueUnavailable(_) => e,
        other => AppError::QueueUnavailable(other.to_string()),
    }
}

/// What a `clear-cache` run removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub queued: usize,
    pub job_facts: usize,
    pub company_facts: usize,
    pub company_entities: usize,
}

#[derive(Clone)]
pub struct Cache<K: KvStore> {
    store: K,
    ttls: CacheTtls,
}

impl<K: KvStore> Cache<K> {
    pub fn new(store: K, ttls: CacheTtls) -> Self {
        Self { store, ttls }
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    pub fn store(&self) -> &K {
        &self.store
    }

    pub async fn get_existence(&self, kind: EntityKind, key: &str) -> Existence {
        let cache_key = existence_key(kind, key);
        match self.store.get(&cache_key).await {
            Ok(Some(value)) => match value.as_str() {
                "true" => Existence::known(true),
                "false" => Existence::known(false),
                other => {
                    tracing::debug!(key = %cache_key, value = %other, "Ignoring malformed existence fact");
                    Existence::UNKNOWN
                }
            },
            Ok(None) => Existence::UNKNOWN,
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "Cache read failed");
                Existence::UNKNOWN
            }
        }
    }

    pub async fn set_existence(&self, kind: EntityKind, key: &str, exists: bool) {
        let cache_key = existence_key(kind, key);
        let value = if exists { "true" } else { "false" };
        if let Err(e) = self
            .store
            .set(&cache_key, value, self.ttls.existence_secs)
            .await
        {
            tracing::warn!(key = %cache_key, error = %e, "Cache write failed");
        }
    }

    /// Record positive facts for many keys at once. Returns how many were written.
    pub async fn set_existence_many(&self, kind: EntityKind, keys: &[String]) -> usize {
        if keys.is_empty() {
            return 0;
        }
        let cache_keys: Vec<String> = keys.iter().map(|k| existence_key(kind, k)).collect();
        match self
            .store
            .set_many(&cache_keys, "true", self.ttls.existence_secs)
            .await
        {
            Ok(()) => cache_keys.len(),
            Err(e) => {
                tracing::warn!(%kind, count = cache_keys.len(), error = %e, "Bulk cache write failed");
                0
            }
        }
    }

    pub async fn get_entity<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache read failed");
                None
            }
        }
    }

    pub async fn set_entity<T: Serialize>(&self, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Failed to encode cache entry");
                return;
            }
        };
        if let Err(e) = self.store.set(key, &raw, self.ttls.entity_secs).await {
            tracing::warn!(%key, error = %e, "Cache write failed");
        }
    }

    /// Enqueue `value` unless it is already waiting. Returns true if added.
    pub async fn push_unique(&self, list: &str, value: &str) -> Result<bool, AppError> {
        self.store.push_unique(list, value).await.map_err(queue_error)
    }

    pub async fn pop(&self, list: &str) -> Result<Option<String>, AppError> {
        self.store.pop(list).await.map_err(queue_error)
    }

    pub async fn length(&self, list: &str) -> Result<usize, AppError> {
        self.store.length(list).await.map_err(queue_error)
    }

    pub async fn clear_list(&self, list: &str) -> Result<(), AppError> {
        self.store.clear_list(list).await.map_err(queue_error)
    }

    /// Maintenance only: scan and delete every key under `prefix`.
    pub async fn clear_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        self.store.delete_prefix(prefix).await
    }

    /// Wipe the queue, every existence fact and every cached company.
    pub async fn clear_all(&self) -> Result<ClearReport, AppError> {
        let queued = self.length(QUEUE_KEY).await?;
        self.clear_list(QUEUE_KEY).await?;
        let report = ClearReport {
            queued,
            job_facts: self.clear_prefix(&existence_prefix(EntityKind::Job)).await?,
            company_facts: self
                .clear_prefix(&existence_prefix(EntityKind::Company))
                .await?,
            company_entities: self.clear_prefix(COMPANY_ENTITY_PREFIX).await?,
        };
        tracing::info!(?report, "Cache cleared");
        Ok(report)
    }

    /// Connectivity probe; an unreachable cache means no queue.
    pub async fn ping(&self) -> Result<(), AppError> {
        self.store.ping().await.map_err(queue_error)
    }
}
