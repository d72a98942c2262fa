//! In-process [`KvStore`].
//!
//! Keys live in a moka cache with per-entry expiry; queues are a
//! mutex-guarded list plus membership set. Only meaningful inside one
//! process: used by tests and by single-process `--ephemeral` runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use moka::Expiry;
use moka::future::Cache;

use crate::error::AppError;
use crate::traits::KvStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    ttl: Option<Duration>,
}

impl Entry {
    fn new(value: &str, ttl_secs: u64) -> Self {
        Self {
            value: value.to_string(),
            ttl: (ttl_secs > 0).then(|| Duration::from_secs(ttl_secs)),
        }
    }
}

/// Expire each entry after its own TTL, restarting the clock on overwrite.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl
    }
}

#[derive(Debug, Default)]
struct Queue {
    items: VecDeque<String>,
    members: HashSet<String>,
}

#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    queues: Arc<Mutex<HashMap<String, Queue>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder().expire_after(PerEntryTtl).build(),
            queues: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock_queues(&self) -> MutexGuard<'_, HashMap<String, Queue>> {
        self.queues.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Recovered from poisoned queue mutex");
            poisoned.into_inner()
        })
    }

    /// Snapshot of a queue, oldest first.
    pub fn queued(&self, list: &str) -> Vec<String> {
        self.lock_queues()
            .get(list)
            .map(|q| q.items.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        Ok(self.entries.get(key).await.map(|e| e.value))
    }

    async fn set(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), AppError> {
        self.entries
            .insert(key.to_string(), Entry::new(value, ttl_secs))
            .await;
        Ok(())
    }

    async fn set_many(&self, keys: &[String], value: &str, ttl_secs: u64) -> Result<(), AppError> {
        for key in keys {
            self.entries
                .insert(key.clone(), Entry::new(value, ttl_secs))
                .await;
        }
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize, AppError> {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.as_ref().clone())
            .collect();
        for key in &doomed {
            self.entries.invalidate(key).await;
        }
        Ok(doomed.len())
    }

    async fn push_unique(&self, list: &str, value: &str) -> Result<bool, AppError> {
        let mut queues = self.lock_queues();
        let queue = queues.entry(list.to_string()).or_default();
        if queue.members.insert(value.to_string()) {
            queue.items.push_back(value.to_string());
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn pop(&self, list: &str) -> Result<Option<String>, AppError> {
        let mut queues = self.lock_queues();
        let Some(queue) = queues.get_mut(list) else {
            return Ok(None);
        };
        let value = queue.items.pop_front();
        if let Some(v) = &value {
            queue.members.remove(v);
        }
        Ok(value)
    }

    async fn length(&self, list: &str) -> Result<usize, AppError> {
        Ok(self.lock_queues().get(list).map_or(0, |q| q.items.len()))
    }

    async fn clear_list(&self, list: &str) -> Result<(), AppError> {
        self.lock_queues().remove(list);
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }
}
