use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::identifier::JobId;
use crate::models::{Company, CompanyLookup, PostingRecord, StoredPosting};

// ---------------------------------------------------------------------------
// Browser
// ---------------------------------------------------------------------------

/// What a page turned out to be once it settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// The expected content rendered.
    Content,
    /// The site rendered an explicit error (404, no results, bad login).
    ErrorSurface,
    /// The session was bounced to the login form.
    LoginRequired,
    /// A verification challenge needs a human.
    Challenge,
    /// Nothing matched before the deadline.
    TimedOut,
}

/// One disjunct of a readiness wait: any selector matching means `state`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeGroup {
    pub state: Readiness,
    pub selectors: Vec<String>,
}

/// Compound readiness wait: groups are checked in order, first match wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyProbe {
    pub groups: Vec<ProbeGroup>,
    pub timeout: Duration,
}

impl ReadyProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            groups: Vec::new(),
            timeout,
        }
    }

    pub fn group(mut self, state: Readiness, selectors: &[String]) -> Self {
        self.groups.push(ProbeGroup {
            state,
            selectors: selectors.to_vec(),
        });
        self
    }
}

/// A controlled browser session.
///
/// The session is exclusively owned by one pipeline run; every operation
/// carries its own deadline and reports failures without retrying.
pub trait PageDriver: Send + Sync {
    /// Navigate the session's page to `url`.
    fn goto(&self, url: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Wait until one of the probe's groups matches, or the deadline passes.
    fn wait_ready(
        &self,
        probe: &ReadyProbe,
    ) -> impl Future<Output = Result<Readiness, AppError>> + Send;

    /// Evaluate a JavaScript expression and return its JSON value.
    fn evaluate(
        &self,
        script: &str,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;

    /// The rendered HTML of the current page.
    fn content(&self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Click every "show more" style control; returns how many were clicked.
    fn expand_all(
        &self,
        selectors: &[String],
    ) -> impl Future<Output = Result<usize, AppError>> + Send;

    /// Scroll to the bottom and back to the top to trigger lazy loading.
    fn scroll_through(&self) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Click the first matching opener and wait for a modal to appear.
    fn open_modal(
        &self,
        openers: &[String],
        modal: &[String],
        timeout: Duration,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Maps rendered pages to data. Pure: no I/O, deterministic given its inputs.
pub trait PageExtractor: Send + Sync + Clone {
    /// Posting URLs shown on a search results page, in display order.
    fn search_results(&self, html: &str) -> Vec<String>;

    /// Normalize a rendered detail page into a posting record.
    fn extract(
        &self,
        html: &str,
        url: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<PostingRecord, AppError>;
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Typed client of the external jobs/companies CRUD service.
///
/// Implementations never retry; that decision belongs to callers.
pub trait BackendGateway: Send + Sync + Clone {
    fn company_exists(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<CompanyLookup, AppError>> + Send;

    /// Create a company. A conflict resolves to the existing company.
    fn create_company(&self, name: &str) -> impl Future<Output = Result<Company, AppError>> + Send;

    fn posting_exists(&self, id: &JobId) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Create a posting. A conflict is reported as [`AppError::AlreadyExists`].
    fn create_posting(
        &self,
        record: &PostingRecord,
        company_id: i64,
    ) -> impl Future<Output = Result<StoredPosting, AppError>> + Send;

    fn list_all_posting_ids(&self) -> impl Future<Output = Result<Vec<JobId>, AppError>> + Send;

    fn list_all_company_names(
        &self,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send;
}

// ---------------------------------------------------------------------------
// Key-value store
// ---------------------------------------------------------------------------

/// Remote key-value store with TTLs and list operations.
///
/// Errors are transport errors; the typed [`crate::cache::Cache`] decides
/// which of them matter.
pub trait KvStore: Send + Sync + Clone {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn set(
        &self,
        key: &str,
        value: &str,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Write many keys with the same value and TTL in one round-trip.
    fn set_many(
        &self,
        keys: &[String],
        value: &str,
        ttl_secs: u64,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Delete every key starting with `prefix`; returns how many went.
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = Result<usize, AppError>> + Send;

    /// Atomically append `value` to the list unless it is already queued.
    ///
    /// Returns true if the value was added.
    fn push_unique(
        &self,
        list: &str,
        value: &str,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Remove and return the oldest value of the list.
    fn pop(&self, list: &str) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    fn length(&self, list: &str) -> impl Future<Output = Result<usize, AppError>> + Send;

    /// Drop the list and its membership index.
    fn clear_list(&self, list: &str) -> impl Future<Output = Result<(), AppError>> + Send;

    fn ping(&self) -> impl Future<Output = Result<(), AppError>> + Send;
}
