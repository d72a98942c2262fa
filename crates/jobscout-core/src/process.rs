//! Process phase: drain the queue into committed postings.

use std::sync::Arc;

use chrono::Utc;

use crate::data_service::DataService;
use crate::error::AppError;
use crate::events::{PipelineEvent, PipelineReporter};
use crate::identifier::JobId;
use crate::models::{ItemState, PostingRecord};
use crate::pacing::Pacing;
use crate::progress::ProgressTracker;
use crate::traits::{BackendGateway, KvStore, PageDriver, PageExtractor, Readiness};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessReport {
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub processed: usize,
}

impl ProcessReport {
    fn record(&mut self, state: ItemState) {
        match state {
            ItemState::Saved => self.saved += 1,
            ItemState::Skipped => self.skipped += 1,
            ItemState::Failed => self.failed += 1,
            ItemState::Queued | ItemState::InFlight => return,
        }
        self.processed += 1;
    }
}

/// Pops identifiers off the queue and turns each into a committed posting.
pub struct Processor<'a, D, E, K, G>
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
    progress: Option<Arc<ProgressTracker>>,
}

impl<'a, D, E, K, G> Processor<'a, D, E, K, G>
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
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: Arc<ProgressTracker>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Process up to `limit` queued postings.
    ///
    /// Per-item failures are counted and never retried. Fatal errors
    /// (queue, backend, session) abort the run; the item being worked on
    /// at that moment has already left the queue.
    pub async fn run<R: PipelineReporter>(
        &self,
        limit: usize,
        reporter: &R,
    ) -> Result<ProcessReport, AppError> {
        let queued = self.data.queue_size().await?;
        reporter.report(PipelineEvent::ProcessStarted { queued, limit });

        let mut report = ProcessReport::default();
        while report.processed < limit {
            let Some((job_id, url)) = self.data.dequeue().await? else {
                tracing::info!("Queue drained");
                break;
            };
            if report.processed > 0 {
                self.pacing.pause().await;
            }

            reporter.report(PipelineEvent::ItemStarted {
                job_id: &job_id,
                url: &url,
            });
            let state = match self.process_one(&job_id, &url).await {
                Ok(record) => {
                    reporter.report(PipelineEvent::ItemSaved {
                        job_id: &job_id,
                        title: &record.title,
                        company: &record.company_name,
                    });
                    ItemState::Saved
                }
                Err(e) if e.is_already_exists() => {
                    reporter.report(PipelineEvent::ItemSkipped { job_id: &job_id });
                    ItemState::Skipped
                }
                Err(e) if e.is_fatal() => {
                    tracing::error!(%job_id, error = %e, "Aborting processing run");
                    return Err(e);
                }
                Err(e) => {
                    let error = e.to_string();
                    reporter.report(PipelineEvent::ItemFailed {
                        job_id: &job_id,
                        error: &error,
                    });
                    ItemState::Failed
                }
            };

            report.record(state);
            if let Some(progress) = &self.progress {
                progress.record(state);
            }
        }

        reporter.report(PipelineEvent::ProcessFinished {
            saved: report.saved,
            skipped: report.skipped,
            failed: report.failed,
        });
        Ok(report)
    }

    async fn process_one(&self, job_id: &JobId, url: &str) -> Result<PostingRecord, AppError> {
        let profile = self.data.profile();
        self.driver.goto(url).await?;

        match self.driver.wait_ready(&profile.detail_probe()).await? {
            Readiness::Content => {}
            Readiness::TimedOut => {
                tracing::debug!(%job_id, "Detail page never settled, extracting anyway");
            }
            Readiness::ErrorSurface => {
                return Err(AppError::ExtractionEmpty(format!(
                    "posting {job_id} shows an error page"
                )));
            }
            Readiness::LoginRequired | Readiness::Challenge => {
                return Err(AppError::AuthFailed(format!(
                    "session lost while loading {url}"
                )));
            }
        }

        self.enrich_page(job_id).await;

        let html = self.driver.content().await?;
        let record = self.extractor.extract(&html, url, Utc::now())?;
        if &record.job_id != job_id {
            tracing::debug!(queued = %job_id, page = %record.job_id, "Page id differs from queued id");
        }
        self.data.commit(&record).await?;
        Ok(record)
    }

    /// Reveal collapsed content; failures only cost detail.
    async fn enrich_page(&self, job_id: &JobId) {
        let detail = &self.data.profile().detail;

        if let Err(e) = self.driver.expand_all(&detail.show_more).await {
            tracing::debug!(%job_id, error = %e, "Could not expand description");
        }
        if let Err(e) = self.driver.scroll_through().await {
            tracing::debug!(%job_id, error = %e, "Could not scroll page");
        }
        match self
            .driver
            .open_modal(
                &detail.skills_opener,
                &detail.skills_modal,
                self.data.profile().modal_timeout(),
            )
            .await
        {
            Ok(true) => {}
            Ok(false) => tracing::debug!(%job_id, "No skills modal"),
            Err(e) => tracing::debug!(%job_id, error = %e, "Could not open skills modal"),
        }
    }
}
