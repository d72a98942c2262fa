//! Test utilities: mock implementations of the core traits.
//!
//! Handwritten mocks for dependency injection in unit tests. All mocks use
//! `Arc<Mutex<_>>` for interior mutability so tests can assert on recorded
//! calls after handing a clone to the code under test.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::error::AppError;
use crate::events::{PipelineEvent, PipelineReporter};
use crate::identifier::JobId;
use crate::models::{Company, CompanyLookup, PostingRecord, StoredPosting, WorkType};
use crate::traits::{BackendGateway, KvStore, PageDriver, PageExtractor, ReadyProbe, Readiness};

/// Fixed capture instant used by test records.
pub fn test_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 20, 12, 0, 0).unwrap()
}

pub fn make_test_record(id: u64) -> PostingRecord {
    PostingRecord {
        job_id: JobId::from(id),
        title: format!("Rust Engineer {id}"),
        company_name: "Acme ApS".to_string(),
        location_raw: "Copenhagen, Capital Region, Denmark · 2 days ago · 37 applicants"
            .to_string(),
        location: "Copenhagen, Capital Region, Denmark".to_string(),
        posted_at: test_time() - chrono::TimeDelta::days(2),
        applicants: Some(37),
        description: "Build reliable data pipelines in Rust. ".repeat(4),
        apply_url: format!("https://example.com/apply/{id}"),
        work_type: WorkType::Hybrid,
        skills: BTreeSet::from(["Rust".to_string(), "SQL".to_string()]),
        captured_at: test_time(),
    }
}

// ---------------------------------------------------------------------------
// FailingStore
// ---------------------------------------------------------------------------

/// Store whose every operation fails like an unreachable server.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingStore;

fn refused() -> AppError {
    AppError::NetworkError("connection refused".to_string())
}

impl KvStore for FailingStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, AppError> {
        Err(refused())
    }

    async fn set(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<(), AppError> {
        Err(refused())
    }

    async fn set_many(&self, _keys: &[String], _value: &str, _ttl_secs: u64) -> Result<(), AppError> {
        Err(refused())
    }

    async fn delete_prefix(&self, _prefix: &str) -> Result<usize, AppError> {
        Err(refused())
    }

    async fn push_unique(&self, _list: &str, _value: &str) -> Result<bool, AppError> {
        Err(refused())
    }

    async fn pop(&self, _list: &str) -> Result<Option<String>, AppError> {
        Err(refused())
    }

    async fn length(&self, _list: &str) -> Result<usize, AppError> {
        Err(refused())
    }

    async fn clear_list(&self, _list: &str) -> Result<(), AppError> {
        Err(refused())
    }

    async fn ping(&self) -> Result<(), AppError> {
        Err(refused())
    }
}

// ---------------------------------------------------------------------------
// MockGateway
// ---------------------------------------------------------------------------

/// Per-method call counters of [`MockGateway`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayCalls {
    pub company_exists: usize,
    pub create_company: usize,
    pub posting_exists: usize,
    pub create_posting: usize,
    pub list_posting_ids: usize,
    pub list_company_names: usize,
}

#[derive(Default)]
struct GatewayState {
    postings: BTreeMap<JobId, i64>,
    companies: Vec<Company>,
    /// Ids the lookup reports as unknown but the write rejects as duplicates.
    conflicts: HashSet<JobId>,
    unavailable: bool,
    calls: GatewayCalls,
}

/// In-memory backend with call counters and failure injection.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Postings the backend already holds (attached to company 0).
    pub fn with_postings(self, ids: &[u64]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for id in ids {
                state.postings.insert(JobId::from(*id), 0);
            }
        }
        self
    }

    pub fn with_companies(self, names: &[&str]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            for name in names {
                let id = state.companies.len() as i64 + 1;
                state.companies.push(Company {
                    id,
                    name: name.to_string(),
                });
            }
        }
        self
    }

    /// Simulate another writer racing us: lookups say "unknown", writes say 409.
    pub fn with_conflict_on_create(self, ids: &[u64]) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.conflicts.extend(ids.iter().map(|id| JobId::from(*id)));
        }
        self
    }

    /// Every call fails as if the backend were down.
    pub fn unavailable(self) -> Self {
        self.state.lock().unwrap().unavailable = true;
        self
    }

    pub fn calls(&self) -> GatewayCalls {
        self.state.lock().unwrap().calls
    }

    /// Ids of postings created through this gateway or seeded, in id order.
    pub fn saved_ids(&self) -> Vec<JobId> {
        self.state.lock().unwrap().postings.keys().cloned().collect()
    }

    pub fn company_id(&self, name: &str) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state
            .companies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.id)
    }

    fn guard(
        &self,
        count: impl FnOnce(&mut GatewayCalls),
    ) -> Result<std::sync::MutexGuard<'_, GatewayState>, AppError> {
        let mut state = self.state.lock().unwrap();
        count(&mut state.calls);
        if state.unavailable {
            return Err(AppError::GatewayUnavailable(
                "connection refused".to_string(),
            ));
        }
        Ok(state)
    }
}

impl BackendGateway for MockGateway {
    async fn company_exists(&self, name: &str) -> Result<CompanyLookup, AppError> {
        let state = self.guard(|c| c.company_exists += 1)?;
        let company = state.companies.iter().find(|c| c.name == name).cloned();
        Ok(CompanyLookup {
            exists: company.is_some(),
            company,
        })
    }

    async fn create_company(&self, name: &str) -> Result<Company, AppError> {
        let mut state = self.guard(|c| c.create_company += 1)?;
        if let Some(existing) = state.companies.iter().find(|c| c.name == name) {
            return Ok(existing.clone());
        }
        let company = Company {
            id: state.companies.len() as i64 + 1,
            name: name.to_string(),
        };
        state.companies.push(company.clone());
        Ok(company)
    }

    async fn posting_exists(&self, id: &JobId) -> Result<bool, AppError> {
        let state = self.guard(|c| c.posting_exists += 1)?;
        Ok(state.postings.contains_key(id))
    }

    async fn create_posting(
        &self,
        record: &PostingRecord,
        company_id: i64,
    ) -> Result<StoredPosting, AppError> {
        let mut state = self.guard(|c| c.create_posting += 1)?;
        if state.conflicts.contains(&record.job_id) || state.postings.contains_key(&record.job_id)
        {
            return Err(AppError::AlreadyExists(format!(
                "posting {}",
                record.job_id
            )));
        }
        state.postings.insert(record.job_id.clone(), company_id);
        Ok(StoredPosting {
            id: Some(state.postings.len() as i64),
            linkedin_job_id: record.job_id.as_u64().unwrap_or_default(),
            title: Some(record.title.clone()),
            company_id: Some(company_id),
        })
    }

    async fn list_all_posting_ids(&self) -> Result<Vec<JobId>, AppError> {
        let state = self.guard(|c| c.list_posting_ids += 1)?;
        Ok(state.postings.keys().cloned().collect())
    }

    async fn list_all_company_names(&self) -> Result<Vec<String>, AppError> {
        let state = self.guard(|c| c.list_company_names += 1)?;
        Ok(state.companies.iter().map(|c| c.name.clone()).collect())
    }
}

// ---------------------------------------------------------------------------
// MockDriver
// ---------------------------------------------------------------------------

/// A canned page: how it settles and what it renders.
#[derive(Debug, Clone)]
pub struct MockPage {
    pub readiness: Readiness,
    pub html: String,
}

impl MockPage {
    pub fn content(html: impl Into<String>) -> Self {
        Self {
            readiness: Readiness::Content,
            html: html.into(),
        }
    }

    pub fn settles_as(readiness: Readiness) -> Self {
        Self {
            readiness,
            html: String::new(),
        }
    }
}

#[derive(Default)]
struct DriverState {
    pages: HashMap<String, MockPage>,
    failing: HashSet<String>,
    current: Option<String>,
    visited: Vec<String>,
}

/// Browser stand-in serving canned pages by URL.
///
/// Unknown URLs settle as content with an empty body.
#[derive(Clone, Default)]
pub struct MockDriver {
    state: Arc<Mutex<DriverState>>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: impl Into<String>, page: MockPage) -> Self {
        self.state.lock().unwrap().pages.insert(url.into(), page);
        self
    }

    /// Navigation to `url` times out.
    pub fn failing_on(self, url: impl Into<String>) -> Self {
        self.state.lock().unwrap().failing.insert(url.into());
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.state.lock().unwrap().visited.clone()
    }

    fn current_page(&self) -> MockPage {
        let state = self.state.lock().unwrap();
        state
            .current
            .as_ref()
            .and_then(|url| state.pages.get(url).cloned())
            .unwrap_or_else(|| MockPage::content(""))
    }
}

impl PageDriver for MockDriver {
    async fn goto(&self, url: &str) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        state.visited.push(url.to_string());
        if state.failing.contains(url) {
            return Err(AppError::NavigationTimeout {
                url: url.to_string(),
                secs: 30,
            });
        }
        state.current = Some(url.to_string());
        Ok(())
    }

    async fn wait_ready(&self, _probe: &ReadyProbe) -> Result<Readiness, AppError> {
        Ok(self.current_page().readiness)
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, AppError> {
        Ok(serde_json::Value::Null)
    }

    async fn content(&self) -> Result<String, AppError> {
        Ok(self.current_page().html)
    }

    async fn expand_all(&self, _selectors: &[String]) -> Result<usize, AppError> {
        Ok(0)
    }

    async fn scroll_through(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn open_modal(
        &self,
        _openers: &[String],
        _modal: &[String],
        _timeout: Duration,
    ) -> Result<bool, AppError> {
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Extractor over test-friendly page bodies.
///
/// Search pages list one URL per line; detail pages are a JSON-encoded
/// [`PostingRecord`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MockExtractor;

impl PageExtractor for MockExtractor {
    fn search_results(&self, html: &str) -> Vec<String> {
        html.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn extract(
        &self,
        html: &str,
        url: &str,
        _captured_at: DateTime<Utc>,
    ) -> Result<PostingRecord, AppError> {
        serde_json::from_str(html)
            .map_err(|e| AppError::ExtractionEmpty(format!("{url}: {e}")))
    }
}

/// Detail page body understood by [`MockExtractor`].
pub fn record_page(record: &PostingRecord) -> MockPage {
    MockPage::content(serde_json::to_string(record).unwrap())
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Reporter that records event names in order.
#[derive(Clone, Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn labels(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match event {
            PipelineEvent::DiscoverStarted { .. } => "discover_started".to_string(),
            PipelineEvent::PageScanned { page, .. } => format!("page_scanned:{page}"),
            PipelineEvent::DiscoverFinished { reason, .. } => {
                format!("discover_finished:{reason}")
            }
            PipelineEvent::ProcessStarted { .. } => "process_started".to_string(),
            PipelineEvent::ItemStarted { job_id, .. } => format!("item_started:{job_id}"),
            PipelineEvent::ItemSaved { job_id, .. } => format!("item_saved:{job_id}"),
            PipelineEvent::ItemSkipped { job_id } => format!("item_skipped:{job_id}"),
            PipelineEvent::ItemFailed { job_id, .. } => format!("item_failed:{job_id}"),
            PipelineEvent::ProcessFinished { .. } => "process_finished".to_string(),
        };
        self.events.lock().unwrap().push(label);
    }
}
