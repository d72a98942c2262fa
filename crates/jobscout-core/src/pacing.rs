//! Inter-request pacing for detail and search page fetches.
//!
//! One browser session visits one page at a time, so pacing reduces to a
//! sleep between consecutive fetches: a floor of [`MIN_DELAY`] plus optional
//! random jitter to avoid a perfectly regular request cadence.

use std::time::Duration;

use crate::error::AppError;

/// Lower bound on the gap between two page fetches.
pub const MIN_DELAY: Duration = Duration::from_millis(500);

/// Delay between consecutive page fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    /// Base delay, never below [`MIN_DELAY`].
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter]).
    pub jitter: Duration,
}

impl Pacing {
    /// Create a pacing with the given delay (floored at [`MIN_DELAY`]) and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: delay.max(MIN_DELAY),
            jitter: Duration::ZERO,
        }
    }

    /// Add random jitter (uniform [0, jitter]) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Read `SCRAPER_DELAY` (seconds, fractional allowed). Defaults to 1 s
    /// with 500 ms jitter.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let Some(raw) = lookup("SCRAPER_DELAY") else {
            return Ok(Self::default());
        };
        let secs: f64 = raw.trim().parse().map_err(|_| {
            AppError::ConfigError(format!(
                "Invalid SCRAPER_DELAY '{raw}': must be a number of seconds"
            ))
        })?;
        if !secs.is_finite() || secs < 0.0 {
            return Err(AppError::ConfigError(format!(
                "Invalid SCRAPER_DELAY '{raw}': must be non-negative"
            )));
        }
        Ok(Self::new(Duration::from_secs_f64(secs)).with_jitter(Duration::from_millis(500)))
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    pub fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }

    pub async fn pause(&self) {
        let wait = self.effective_delay();
        tracing::debug!(sleep_ms = %wait.as_millis(), "Pacing");
        tokio::time::sleep(wait).await;
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            jitter: Duration::from_millis(500),
        }
    }
}

/// Uniform-ish value in `[0, max_ms]` from a splitmix64 round over the clock.
fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let seed = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    let mut z = seed.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    (z ^ (z >> 31)) % (max_ms + 1)
}
