//! Discover phase: walk the paginated search surface and queue new postings.

use std::fmt;
use std::sync::Arc;

use crate::data_service::DataService;
use crate::error::AppError;
use crate::events::{PipelineEvent, PipelineReporter};
use crate::identifier::JobId;
use crate::pacing::Pacing;
use crate::progress::ProgressTracker;
use crate::traits::{BackendGateway, KvStore, PageDriver, PageExtractor, Readiness};

/// Default upper bound on search pages visited in one run.
pub const MAX_PAGES: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverRequest {
    pub keywords: String,
    pub location: String,
    /// Stop once this many new identifiers were queued by this run.
    pub target: usize,
    /// Initial search offset; `None` resumes from the current queue size.
    pub start_from: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TargetReached,
    EmptyPage,
    NoResults,
    PageCap,
    PageFailed,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::TargetReached => "target_reached",
            StopReason::EmptyPage => "empty_page",
            StopReason::NoResults => "no_results",
            StopReason::PageCap => "page_cap",
            StopReason::PageFailed => "page_failed",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoverReport {
    pub pages: usize,
    pub urls_seen: usize,
    pub enqueued: usize,
    /// Already committed according to the backend (or the cache).
    pub known: usize,
    /// Already waiting in the queue.
    pub duplicates: usize,
    pub unparseable: usize,
    /// Every `start` offset requested, in order.
    pub offsets: Vec<usize>,
    pub reason: StopReason,
}

/// Walks search result pages and feeds unseen identifiers to the queue.
pub struct Discoverer<'a, D, E, K, G>
where
    D: PageDriver,
    E: PageExtractor,
    K: KvStore,
    G: BackendGateway,
{
    driver: &'a D,
    extractor: E,
    data: &'a DataService<K, G>,
    pacing: Pacing,
    max_pages: usize,
    progress: Option<Arc<ProgressTracker>>,
}

impl<'a, D, E, K, G> Discoverer<'a, D, E, K, G>
where
    D: PageDriver,
    E: PageExtractor,
    K: KvStore,
    G: BackendGateway,
{
    pub fn new(driver: &'a D, extractor: E, data: &'a DataService<K, G>, pacing: Pacing) -> Self {
        Self {
            driver,
            extractor,
            data,
            pacing,
            max_pages: MAX_PAGES,
            progress: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run discovery until the target, an empty page or the page cap.
    ///
    /// A page that fails to load ends the run early but keeps what was
    /// queued so far. Losing the session or the queue is an error.
    pub async fn run<R: PipelineReporter>(
        &self,
        request: &DiscoverRequest,
        reporter: &R,
    ) -> Result<DiscoverReport, AppError> {
        let profile = self.data.profile();
        let mut urls_seen = match request.start_from {
            Some(start) => start,
            None => self.data.queue_size().await?,
        };

        reporter.report(PipelineEvent::DiscoverStarted {
            keywords: &request.keywords,
            location: &request.location,
            start: urls_seen,
            target: request.target,
        });

        let mut report = DiscoverReport {
            pages: 0,
            urls_seen,
            enqueued: 0,
            known: 0,
            duplicates: 0,
            unparseable: 0,
            offsets: Vec::new(),
            reason: StopReason::PageCap,
        };
        let probe = profile.search_probe();

        let reason = loop {
            if report.enqueued >= request.target {
                break StopReason::TargetReached;
            }
            if report.pages >= self.max_pages {
                break StopReason::PageCap;
            }
            if report.pages > 0 {
                self.pacing.pause().await;
            }

            let start = urls_seen;
            let url = profile.search_url(&request.keywords, &request.location, start)?;
            report.pages += 1;
            report.offsets.push(start);
            if let Some(progress) = &self.progress {
                progress.set_page(report.pages);
            }

            if let Err(e) = self.driver.goto(&url).await {
                tracing::warn!(%url, error = %e, "Search page failed to load");
                break StopReason::PageFailed;
            }
            match self.driver.wait_ready(&probe).await {
                Ok(Readiness::Content) => {}
                Ok(Readiness::TimedOut) => {
                    tracing::debug!(%url, "Search page never settled, reading what rendered");
                }
                Ok(Readiness::ErrorSurface) => break StopReason::NoResults,
                Ok(Readiness::LoginRequired | Readiness::Challenge) => {
                    return Err(AppError::AuthFailed(format!(
                        "session lost while loading {url}"
                    )));
                }
                Err(e) => {
                    tracing::warn!(%url, error = %e, "Search page failed to settle");
                    break StopReason::PageFailed;
                }
            }
            let html = match self.driver.content().await {
                Ok(html) => html,
                Err(e) => {
                    tracing::warn!(%url, error = %e, "Could not read search page");
                    break StopReason::PageFailed;
                }
            };

            let urls = self.extractor.search_results(&html);
            if urls.is_empty() {
                break StopReason::EmptyPage;
            }
            urls_seen += urls.len();
            report.urls_seen = urls_seen;

            let mut page_enqueued = 0;
            for posting_url in &urls {
                if report.enqueued >= request.target {
                    break;
                }
                let Some(id) = JobId::from_url(posting_url) else {
                    tracing::debug!(url = %posting_url, "No job id in result link");
                    report.unparseable += 1;
                    continue;
                };
                match self.data.posting_known_for_discovery(&id).await {
                    Ok(true) => {
                        report.known += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        // Unknown is treated as new; commit re-checks anyway.
                        tracing::warn!(%id, error = %e, "Existence check failed");
                    }
                }
                if self.data.enqueue(&id).await? {
                    page_enqueued += 1;
                    report.enqueued += 1;
                } else {
                    report.duplicates += 1;
                }
            }

            reporter.report(PipelineEvent::PageScanned {
                page: report.pages,
                start,
                urls: urls.len(),
                enqueued: page_enqueued,
            });
        };

        report.reason = reason;
        reporter.report(PipelineEvent::DiscoverFinished {
            pages: report.pages,
            urls_seen: report.urls_seen,
            enqueued: report.enqueued,
            reason: reason.as_str(),
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Cache, CacheTtls, QUEUE_KEY};
    use crate::memory::MemoryStore;
    use crate::site::SiteProfile;
    use crate::testutil::{MockDriver, MockExtractor, MockGateway, MockPage, MockReporter};
    use std::time::Duration;

    fn service(gateway: MockGateway) -> DataService<MemoryStore, MockGateway> {
        DataService::new(
            Cache::new(MemoryStore::new(), CacheTtls::default()),
            gateway,
            SiteProfile::default(),
        )
    }

    // Site ids are long; small offsets keep the tests readable.
    const BASE: u64 = 4_000_000_000;

    fn posting_url(id: u64) -> String {
        format!("https://www.linkedin.com/jobs/view/{id}/?refId=abc")
    }

    fn results_page(ids: impl IntoIterator<Item = u64>) -> MockPage {
        let lines: Vec<String> = ids.into_iter().map(|n| posting_url(BASE + n)).collect();
        MockPage::content(lines.join("\n"))
    }

    fn search_url(start: usize) -> String {
        SiteProfile::default()
            .search_url("go developer", "Copenhagen", start)
            .unwrap()
    }

    fn request(target: usize, start_from: Option<usize>) -> DiscoverRequest {
        DiscoverRequest {
            keywords: "go developer".into(),
            location: "Copenhagen".into(),
            target,
            start_from,
        }
    }

    fn store_of(svc: &DataService<MemoryStore, MockGateway>) -> &MemoryStore {
        svc.cache().store()
    }

    fn ids(range: std::ops::RangeInclusive<u64>) -> Vec<String> {
        range.map(|n| (BASE + n).to_string()).collect()
    }

    fn pacing() -> Pacing {
        Pacing::new(Duration::ZERO)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_discovery_fills_queue_in_order() {
        let gateway = MockGateway::new();
        let svc = service(gateway.clone());
        let driver = MockDriver::new()
            .with_page(search_url(0), results_page(100..=124))
            .with_page(search_url(25), results_page(125..=149));

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(50, Some(0)), &MockReporter::new())
            .await
            .unwrap();

        assert_eq!(store_of(&svc).queued(QUEUE_KEY), ids(100..=149));
        assert_eq!(report.urls_seen, 50);
        assert_eq!(report.enqueued, 50);
        assert_eq!(report.reason, StopReason::TargetReached);
        assert_eq!(report.offsets, vec![0, 25]);
        assert_eq!(gateway.calls().create_posting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn resumes_from_queue_size() {
        let svc = service(MockGateway::new());
        for n in 1..=100u64 {
            svc.enqueue(&JobId::from(n)).await.unwrap();
        }
        let driver = MockDriver::new().with_page(search_url(100), results_page(500..=510));

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(20, None), &MockReporter::new())
            .await
            .unwrap();

        assert_eq!(report.offsets[0], 100);
        assert_eq!(driver.visited()[0], search_url(100));
        assert_eq!(report.enqueued, 11);
        assert_eq!(report.reason, StopReason::EmptyPage);
    }

    #[tokio::test(start_paused = true)]
    async fn offsets_only_move_forward() {
        // Every result is already known, so novelty never advances but the
        // offset must.
        let gateway = MockGateway::new().with_postings(&(1..=75).map(|n| BASE + n).collect::<Vec<_>>());
        let svc = service(gateway);
        let driver = MockDriver::new()
            .with_page(search_url(0), results_page(1..=25))
            .with_page(search_url(25), results_page(26..=50))
            .with_page(search_url(50), results_page(51..=75));

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap();

        assert_eq!(report.offsets, vec![0, 25, 50, 75]);
        assert!(report.offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(report.known, 75);
        assert_eq!(report.enqueued, 0);
        assert_eq!(report.reason, StopReason::EmptyPage);
    }

    #[tokio::test(start_paused = true)]
    async fn page_cap_ends_a_run_of_known_results() {
        let gateway = MockGateway::new().with_postings(&(1..=100).map(|n| BASE + n).collect::<Vec<_>>());
        let svc = service(gateway);
        let driver = MockDriver::new()
            .with_page(search_url(0), results_page(1..=25))
            .with_page(search_url(25), results_page(26..=50))
            .with_page(search_url(50), results_page(51..=75))
            .with_page(search_url(75), results_page(76..=100));

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .with_max_pages(3)
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap();

        assert_eq!(report.reason, StopReason::PageCap);
        assert_eq!(report.pages, 3);
        assert_eq!(report.offsets, vec![0, 25, 50]);
        assert!(report.offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(driver.visited().len(), 3);
        assert_eq!(report.known, 75);
        assert_eq!(svc.queue_size().await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn known_and_duplicate_ids_are_not_queued_again() {
        let gateway = MockGateway::new().with_postings(&[10_000_001]);
        let svc = service(gateway);
        svc.enqueue(&JobId::from(10_000_002)).await.unwrap();
        let driver = MockDriver::new().with_page(
            search_url(0),
            MockPage::content(format!(
                "{}\n{}\n{}\nhttps://www.linkedin.com/jobs/collections/",
                posting_url(10_000_001),
                posting_url(10_000_002),
                posting_url(10_000_003),
            )),
        );

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap();

        assert_eq!(report.known, 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.unparseable, 1);
        assert_eq!(report.enqueued, 1);
        assert_eq!(
            store_of(&svc).queued(QUEUE_KEY),
            vec!["10000002".to_string(), "10000003".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_page_keeps_partial_progress() {
        let svc = service(MockGateway::new());
        let driver = MockDriver::new()
            .with_page(search_url(0), results_page(100..=124))
            .failing_on(search_url(25));

        let reporter = MockReporter::new();
        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(100, Some(0)), &reporter)
            .await
            .unwrap();

        assert_eq!(report.reason, StopReason::PageFailed);
        assert_eq!(svc.queue_size().await.unwrap(), 25);
        assert_eq!(
            reporter.labels().last().map(String::as_str),
            Some("discover_finished:page_failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn login_redirect_is_fatal() {
        let svc = service(MockGateway::new());
        let driver = MockDriver::new()
            .with_page(search_url(0), MockPage::settles_as(Readiness::LoginRequired));

        let err = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::AuthFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn no_results_surface_stops() {
        let svc = service(MockGateway::new());
        let driver = MockDriver::new()
            .with_page(search_url(0), MockPage::settles_as(Readiness::ErrorSurface));

        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap();
        assert_eq!(report.reason, StopReason::NoResults);
        assert_eq!(report.pages, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_target_visits_nothing() {
        let svc = service(MockGateway::new());
        let driver = MockDriver::new();
        let report = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(0, Some(0)), &MockReporter::new())
            .await
            .unwrap();
        assert_eq!(report.pages, 0);
        assert!(driver.visited().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_backend_aborts() {
        let svc = service(MockGateway::new().unavailable());
        let driver = MockDriver::new().with_page(search_url(0), results_page(100..=101));
        let err = Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .run(&request(10, Some(0)), &MockReporter::new())
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_tracks_current_page() {
        let svc = service(MockGateway::new());
        let driver = MockDriver::new()
            .with_page(search_url(0), results_page(100..=124))
            .with_page(search_url(25), results_page(125..=130));
        let progress = Arc::new(ProgressTracker::new(50));

        Discoverer::new(&driver, MockExtractor, &svc, pacing())
            .with_progress(Arc::clone(&progress))
            .run(&request(50, Some(0)), &MockReporter::new())
            .await
            .unwrap();
        // Third page is the empty one that ended the run.
        assert_eq!(progress.snapshot().current_page, 3);
    }
}
