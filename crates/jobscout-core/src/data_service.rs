//! Read-through / write-through facade over the cache and the backend.
//!
//! The pipeline only ever talks to [`DataService`]; the cache and the
//! gateway behind it are implementation details. The service also owns the
//! queue protocol and the novelty rule used during discovery.

use crate::cache::{Cache, QUEUE_KEY, company_entity_key};
use crate::error::AppError;
use crate::identifier::JobId;
use crate::models::{Company, EntityKind, PostingRecord, StoredPosting};
use crate::site::SiteProfile;
use crate::traits::{BackendGateway, KvStore};

/// Outcome of the start-of-run cache warm-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    pub job_ids: usize,
    pub companies: usize,
    /// Listing calls that failed (warm-up continues regardless).
    pub failures: usize,
}

/// Reachability and backlog, for the `status` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStatus {
    /// `None` when the cache is unreachable.
    pub queued: Option<usize>,
    pub cache_error: Option<String>,
    pub gateway_error: Option<String>,
}

impl QueueStatus {
    pub fn healthy(&self) -> bool {
        self.cache_error.is_none() && self.gateway_error.is_none()
    }
}

#[derive(Clone)]
pub struct DataService<K: KvStore, G: BackendGateway> {
    cache: Cache<K>,
    gateway: G,
    profile: SiteProfile,
}

impl<K: KvStore, G: BackendGateway> DataService<K, G> {
    pub fn new(cache: Cache<K>, gateway: G, profile: SiteProfile) -> Self {
        Self {
            cache,
            gateway,
            profile,
        }
    }

    pub fn profile(&self) -> &SiteProfile {
        &self.profile
    }

    pub fn cache(&self) -> &Cache<K> {
        &self.cache
    }

    /// Does the backend know this posting? Caches both answers.
    pub async fn posting_known(&self, id: &JobId) -> Result<bool, AppError> {
        let fact = self.cache.get_existence(EntityKind::Job, id.as_str()).await;
        if fact.known {
            return Ok(fact.exists);
        }
        let exists = self.gateway.posting_exists(id).await?;
        self.cache
            .set_existence(EntityKind::Job, id.as_str(), exists)
            .await;
        Ok(exists)
    }

    /// Discovery-time variant of [`Self::posting_known`] that caches only
    /// positive answers.
    ///
    /// During discovery "no" means "not committed yet", which the processor
    /// may flip within the same run; a cached negative would outlive it.
    pub async fn posting_known_for_discovery(&self, id: &JobId) -> Result<bool, AppError> {
        let fact = self.cache.get_existence(EntityKind::Job, id.as_str()).await;
        if fact.known {
            return Ok(fact.exists);
        }
        let exists = self.gateway.posting_exists(id).await?;
        if exists {
            self.cache
                .set_existence(EntityKind::Job, id.as_str(), true)
                .await;
        }
        Ok(exists)
    }

    /// Resolve a company name to its backend id, creating it on first sight.
    pub async fn ensure_company(&self, name: &str) -> Result<i64, AppError> {
        let name = name.trim();
        let key = company_entity_key(name);
        if let Some(company) = self.cache.get_entity::<Company>(&key).await {
            return Ok(company.id);
        }

        let fact = self.cache.get_existence(EntityKind::Company, name).await;
        if !fact.is_known_false() {
            let lookup = self.gateway.company_exists(name).await?;
            if let (true, Some(company)) = (lookup.exists, lookup.company) {
                self.remember_company(&company).await;
                return Ok(company.id);
            }
        }

        let company = self.gateway.create_company(name).await?;
        tracing::info!(company_id = company.id, name = %company.name, "Company created");
        self.remember_company(&company).await;
        Ok(company.id)
    }

    async fn remember_company(&self, company: &Company) {
        self.cache
            .set_entity(&company_entity_key(&company.name), company)
            .await;
        self.cache
            .set_existence(EntityKind::Company, &company.name, true)
            .await;
    }

    /// Write a posting through to the backend.
    ///
    /// A posting the backend already holds, whether found by the pre-write
    /// check or reported as a conflict by the write, yields
    /// [`AppError::AlreadyExists`].
    pub async fn commit(&self, record: &PostingRecord) -> Result<StoredPosting, AppError> {
        if record.title.trim().is_empty() || record.company_name.trim().is_empty() {
            return Err(AppError::ExtractionEmpty(format!(
                "posting {} lacks a title or company",
                record.job_id
            )));
        }

        if self.posting_known(&record.job_id).await? {
            return Err(AppError::AlreadyExists(format!("posting {}", record.job_id)));
        }

        let company_id = self.ensure_company(&record.company_name).await?;

        match self.gateway.create_posting(record, company_id).await {
            Ok(stored) => {
                self.cache
                    .set_existence(EntityKind::Job, record.job_id.as_str(), true)
                    .await;
                Ok(stored)
            }
            Err(AppError::AlreadyExists(msg)) => {
                self.cache
                    .set_existence(EntityKind::Job, record.job_id.as_str(), true)
                    .await;
                Err(AppError::AlreadyExists(msg))
            }
            Err(e) => Err(e),
        }
    }

    /// Queue an identifier for processing. Returns false if it was already queued.
    pub async fn enqueue(&self, id: &JobId) -> Result<bool, AppError> {
        self.cache.push_unique(QUEUE_KEY, id.as_str()).await
    }

    /// Take the oldest queued identifier together with its detail URL.
    pub async fn dequeue(&self) -> Result<Option<(JobId, String)>, AppError> {
        while let Some(raw) = self.cache.pop(QUEUE_KEY).await? {
            match raw.parse::<JobId>() {
                Ok(id) => {
                    let url = self.profile.detail_url(&id);
                    return Ok(Some((id, url)));
                }
                Err(e) => {
                    tracing::warn!(entry = %raw, error = %e, "Dropping malformed queue entry");
                }
            }
        }
        Ok(None)
    }

    pub async fn queue_size(&self) -> Result<usize, AppError> {
        self.cache.length(QUEUE_KEY).await
    }

    pub fn detail_url(&self, id: &JobId) -> String {
        self.profile.detail_url(id)
    }

    /// Preload positive existence facts for everything the backend holds.
    ///
    /// Turns the first discovery checks into cache hits. Never fails: a
    /// listing error only costs performance.
    pub async fn warm_up(&self) -> WarmUpReport {
        let mut report = WarmUpReport::default();

        match self.gateway.list_all_posting_ids().await {
            Ok(ids) => {
                let keys: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                report.job_ids = self.cache.set_existence_many(EntityKind::Job, &keys).await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Warm-up: failed to list posting ids");
                report.failures += 1;
            }
        }

        match self.gateway.list_all_company_names().await {
            Ok(names) => {
                report.companies = self
                    .cache
                    .set_existence_many(EntityKind::Company, &names)
                    .await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Warm-up: failed to list company names");
                report.failures += 1;
            }
        }

        tracing::info!(
            job_ids = report.job_ids,
            companies = report.companies,
            failures = report.failures,
            "Cache warmed up"
        );
        report
    }

    /// Probe both dependencies without failing on either.
    pub async fn status(&self) -> QueueStatus {
        let cache_error = self.cache.ping().await.err().map(|e| e.to_string());
        let queued = match cache_error {
            None => self.queue_size().await.ok(),
            Some(_) => None,
        };
        // Any cheap lookup proves the backend answers.
        let gateway_error = self
            .gateway
            .posting_exists(&JobId::from(0))
            .await
            .err()
            .map(|e| e.to_string());
        QueueStatus {
            queued,
            cache_error,
            gateway_error,
        }
    }}
