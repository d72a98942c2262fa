//! Progress readout for pipeline runs.
//!
//! The tracker is shared between the loop that records outcomes and a
//! ticker that redraws the status line, so all state sits behind one mutex.

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::task::JoinHandle;

use crate::models::ItemState;

const BAR_WIDTH: usize = 24;

#[derive(Debug, Clone)]
struct ProgressState {
    target: usize,
    saved: usize,
    skipped: usize,
    failed: usize,
    current_page: usize,
    started_at: DateTime<Utc>,
}

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSnapshot {
    pub target: usize,
    pub saved: usize,
    pub skipped: usize,
    pub failed: usize,
    pub processed: usize,
    pub current_page: usize,
    pub elapsed: TimeDelta,
    /// Saved postings per minute.
    pub rate_per_minute: f64,
    /// Time left to reach the target at the current rate.
    pub eta: Option<TimeDelta>,
}

#[derive(Debug)]
pub struct ProgressTracker {
    inner: Mutex<ProgressState>,
}

impl ProgressTracker {
    pub fn new(target: usize) -> Self {
        Self::started_at(target, Utc::now())
    }

    pub fn started_at(target: usize, started_at: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(ProgressState {
                target,
                saved: 0,
                skipped: 0,
                failed: 0,
                current_page: 0,
                started_at,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Count a terminal outcome; non-terminal states are ignored.
    pub fn record(&self, state: ItemState) {
        let mut inner = self.lock();
        match state {
            ItemState::Saved => inner.saved += 1,
            ItemState::Skipped => inner.skipped += 1,
            ItemState::Failed => inner.failed += 1,
            ItemState::Queued | ItemState::InFlight => {}
        }
    }

    pub fn set_page(&self, page: usize) {
        self.lock().current_page = page;
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(Utc::now())
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> ProgressSnapshot {
        let s = self.lock().clone();
        let elapsed = (now - s.started_at).max(TimeDelta::zero());
        let minutes = elapsed.num_milliseconds() as f64 / 60_000.0;
        let rate_per_minute = if minutes > 0.0 {
            s.saved as f64 / minutes
        } else {
            0.0
        };
        let remaining = s.target.saturating_sub(s.saved);
        let eta = if remaining == 0 {
            Some(TimeDelta::zero())
        } else if rate_per_minute > 0.0 {
            let secs = remaining as f64 / rate_per_minute * 60.0;
            Some(TimeDelta::milliseconds((secs * 1000.0) as i64))
        } else {
            None
        };

        ProgressSnapshot {
            target: s.target,
            saved: s.saved,
            skipped: s.skipped,
            failed: s.failed,
            processed: s.saved + s.skipped + s.failed,
            current_page: s.current_page,
            elapsed,
            rate_per_minute,
            eta,
        }
    }

    pub fn render_line(&self) -> String {
        self.snapshot().render()
    }
}

impl ProgressSnapshot {
    /// Single status line with a Unicode progress bar.
    pub fn render(&self) -> String {
        let filled = if self.target == 0 {
            0
        } else {
            (self.saved.min(self.target) * BAR_WIDTH) / self.target
        };
        let bar = format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled));
        let eta = match self.eta {
            Some(eta) => format_duration(eta),
            None => "--".to_string(),
        };
        format!(
            "[{bar}] {}/{} saved · {} skipped · {} failed · page {} · {:.1}/min · ETA {eta}",
            self.saved,
            self.target,
            self.skipped,
            self.failed,
            self.current_page,
            self.rate_per_minute,
        )
    }
}

fn format_duration(d: TimeDelta) -> String {
    let secs = d.num_seconds().max(0);
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Redraw the status line in place on stderr every `interval`.
///
/// Abort the returned handle to stop; a final newline is the caller's job.
pub fn spawn_ticker(tracker: Arc<ProgressTracker>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(interval);
        loop {
            ticks.tick().await;
            let line = tracker.render_line();
            let mut err = std::io::stderr().lock();
            let _ = write!(err, "\r\x1b[2K{line}");
            let _ = err.flush();
        }
    })
}
