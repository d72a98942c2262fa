use crate::identifier::JobId;

/// Events emitted by the discoverer and processor for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    DiscoverStarted {
        keywords: &'a str,
        location: &'a str,
        start: usize,
        target: usize,
    },
    PageScanned {
        page: usize,
        start: usize,
        urls: usize,
        enqueued: usize,
    },
    DiscoverFinished {
        pages: usize,
        urls_seen: usize,
        enqueued: usize,
        reason: &'a str,
    },
    ProcessStarted {
        queued: usize,
        limit: usize,
    },
    ItemStarted {
        job_id: &'a JobId,
        url: &'a str,
    },
    ItemSaved {
        job_id: &'a JobId,
        title: &'a str,
        company: &'a str,
    },
    ItemSkipped {
        job_id: &'a JobId,
    },
    ItemFailed {
        job_id: &'a JobId,
        error: &'a str,
    },
    ProcessFinished {
        saved: usize,
        skipped: usize,
        failed: usize,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::DiscoverStarted {
                keywords,
                location,
                start,
                target,
            } => {
                tracing::info!(%keywords, %location, %start, %target, "Discovery started");
            }
            PipelineEvent::PageScanned {
                page,
                start,
                urls,
                enqueued,
            } => {
                tracing::info!(%page, %start, %urls, %enqueued, "Search page scanned");
            }
            PipelineEvent::DiscoverFinished {
                pages,
                urls_seen,
                enqueued,
                reason,
            } => {
                tracing::info!(%pages, %urls_seen, %enqueued, %reason, "Discovery finished");
            }
            PipelineEvent::ProcessStarted { queued, limit } => {
                tracing::info!(%queued, %limit, "Processing started");
            }
            PipelineEvent::ItemStarted { job_id, url } => {
                tracing::debug!(%job_id, %url, "Processing posting");
            }
            PipelineEvent::ItemSaved {
                job_id,
                title,
                company,
            } => {
                tracing::info!(%job_id, %title, %company, "Posting saved");
            }
            PipelineEvent::ItemSkipped { job_id } => {
                tracing::debug!(%job_id, "Posting already known");
            }
            PipelineEvent::ItemFailed { job_id, error } => {
                tracing::warn!(%job_id, %error, "Posting failed");
            }
            PipelineEvent::ProcessFinished {
                saved,
                skipped,
                failed,
            } => {
                tracing::info!(%saved, %skipped, %failed, "Processing finished");
            }
        }
    }
}
