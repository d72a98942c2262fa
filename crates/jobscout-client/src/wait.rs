//! Deadline-bounded waits used by the browser session.

use std::future::Future;
use std::io;
use std::time::Duration;

use jobscout_core::error::AppError;
use jobscout_core::traits::{ReadyProbe, Readiness};
use tokio::sync::oneshot;
use tokio::time::Instant;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
/// Grace period after a readiness deadline before reading the page anyway.
const SETTLE_FALLBACK: Duration = Duration::from_secs(2);

/// Poll `evaluate` until it names one of the probe's groups.
///
/// Each evaluation only gets what is left of `probe.timeout`, so a hung
/// page cannot stretch the wait past its deadline.
pub(crate) async fn poll_readiness<F, Fut>(probe: &ReadyProbe, mut evaluate: F) -> Readiness
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<serde_json::Value, AppError>>,
{
    let deadline = Instant::now() + probe.timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        // Evaluation fails while a navigation swaps the document; keep polling.
        match tokio::time::timeout(remaining, evaluate()).await {
            Ok(Ok(value)) => {
                let hit = value
                    .as_i64()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| probe.groups.get(i));
                if let Some(group) = hit {
                    return group.state;
                }
            }
            Ok(Err(e)) => tracing::debug!(error = %e, "Readiness probe failed"),
            Err(_) => tracing::debug!("Readiness probe hit the deadline"),
        }
        if Instant::now() >= deadline {
            tokio::time::sleep(SETTLE_FALLBACK).await;
            return Readiness::TimedOut;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Block until the operator presses Enter, for at most `timeout`.
///
/// The terminal is read on a detached thread: a read still pending when the
/// deadline passes must not keep the runtime from shutting down.
pub(crate) async fn operator_confirmation(timeout: Duration) -> Result<(), AppError> {
    let (tx, rx) = oneshot::channel();
    std::thread::Builder::new()
        .name("challenge-prompt".into())
        .spawn(move || {
            let mut line = String::new();
            let _ = tx.send(io::stdin().read_line(&mut line));
        })
        .map_err(|e| AppError::Generic(format!("Cannot start prompt thread: {e}")))?;
    await_line(rx, timeout).await
}

async fn await_line(
    line: oneshot::Receiver<io::Result<usize>>,
    timeout: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(timeout, line).await {
        Err(_) => Err(AppError::AuthChallenge(format!(
            "not resolved within {} seconds",
            timeout.as_secs()
        ))),
        Ok(Err(_)) => Err(AppError::Generic("Prompt thread exited without reading".into())),
        Ok(Ok(Err(e))) => Err(AppError::AuthChallenge(format!("cannot read terminal: {e}"))),
        Ok(Ok(Ok(_))) => Ok(()),
    }
}
