//! Readiness detection from unstructured container log output.
//!
//! A service counts as ready when a known success substring shows up in its
//! combined stdout/stderr stream, and as failed when a known failure
//! substring shows up first. The engine may close a log session at any time
//! without a verdict (idle timeouts, log rotation), so detection is
//! level-triggered: the monitor reopens the stream after a fixed backoff
//! and keeps scanning until a decisive marker or the caller's timeout.

use std::sync::Arc;
use std::time::Duration;

use container_engine::ContainerEngine;
use futures_util::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{Error, Result};

const DEFAULT_REOPEN_BACKOFF: Duration = Duration::from_secs(5);
const LINE_BUFFER: usize = 64;

/// Success and failure substrings for one service type.
#[derive(Debug, Clone)]
pub struct ReadinessMarker {
    /// Substring that signals successful startup
    pub success: String,
    /// Substring that signals a fatal startup error
    pub failure: String,
}

impl ReadinessMarker {
    /// Build a marker pair.
    pub fn new(success: impl Into<String>, failure: impl Into<String>) -> Self {
        Self {
            success: success.into(),
            failure: failure.into(),
        }
    }

    /// Classify one log line. Success is checked first, so a line
    /// containing both markers counts as ready.
    fn classify(&self, line: &str) -> Option<Verdict> {
        if line.contains(&self.success) {
            Some(Verdict::Ready)
        } else if line.contains(&self.failure) {
            Some(Verdict::Failed(line.trim_end().to_string()))
        } else {
            None
        }
    }
}

#[derive(Debug)]
enum Verdict {
    Ready,
    Failed(String),
}

/// Aborts the wrapped task when dropped, so a cancelled readiness wait
/// never leaks its reader or classifier.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Blocks a caller until a container's log output decides readiness.
pub struct ReadinessMonitor {
    engine: Arc<dyn ContainerEngine>,
    backoff: Duration,
    echo_logs: bool,
}

impl ReadinessMonitor {
    /// New monitor with the default 5 second stream-reopen backoff.
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self {
            engine,
            backoff: DEFAULT_REOPEN_BACKOFF,
            echo_logs: false,
        }
    }

    /// Override the reopen backoff (tests use a short one).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Echo every observed log line at info level.
    pub fn echo_logs(mut self, echo: bool) -> Self {
        self.echo_logs = echo;
        self
    }

    /// Wait until `marker` decides the container's fate.
    ///
    /// The reopen loop itself is unbounded; `timeout` is the only bound on
    /// total wait time and `None` waits forever. On expiry the in-flight
    /// stream session is cancelled and [`Error::ReadinessTimeout`] returned.
    pub async fn await_ready(
        &self,
        service: &str,
        container_id: &str,
        marker: &ReadinessMarker,
        timeout: Option<Duration>,
    ) -> Result<()> {
        debug!(service, success = %marker.success, "waiting for readiness marker");
        let wait = self.wait_loop(service, container_id, marker);
        match timeout {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| Error::ReadinessTimeout {
                    service: service.to_string(),
                })?,
            None => wait.await,
        }
    }

    async fn wait_loop(
        &self,
        service: &str,
        container_id: &str,
        marker: &ReadinessMarker,
    ) -> Result<()> {
        loop {
            match self.watch_session(service, container_id, marker).await? {
                Some(Verdict::Ready) => {
                    info!(service, "service is ready");
                    return Ok(());
                }
                Some(Verdict::Failed(line)) => {
                    return Err(Error::StartupFailed {
                        service: service.to_string(),
                        line,
                    });
                }
                None => {
                    debug!(service, "log stream ended without a marker; reopening");
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }
    }

    /// Run one log session to its first decisive match or its end.
    ///
    /// The reader forwards lines into a bounded queue; the classifier
    /// consumes the queue and resolves a single-slot signal on the first
    /// match. Awaiting the signal alone covers both outcomes: it resolves
    /// with a verdict on a match, and errors once the classifier exits
    /// after draining a closed stream. Returning drops both task guards,
    /// discarding any still-buffered lines.
    async fn watch_session(
        &self,
        service: &str,
        container_id: &str,
        marker: &ReadinessMarker,
    ) -> Result<Option<Verdict>> {
        let mut stream = self.engine.container_logs(container_id).await?;
        let (line_tx, mut line_rx) = mpsc::channel::<String>(LINE_BUFFER);
        let (verdict_tx, verdict_rx) = oneshot::channel::<Verdict>();

        let _reader = AbortOnDrop(tokio::spawn(async move {
            while let Some(next) = stream.next().await {
                match next {
                    Ok(line) => {
                        if line_tx.send(line).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "log stream error; ending session");
                        break;
                    }
                }
            }
        }));

        let marker = marker.clone();
        let service = service.to_string();
        let echo = self.echo_logs;
        let _classifier = AbortOnDrop(tokio::spawn(async move {
            while let Some(line) = line_rx.recv().await {
                if echo {
                    info!(service = %service, "{}", line.trim_end());
                }
                if let Some(verdict) = marker.classify(&line) {
                    let _ = verdict_tx.send(verdict);
                    return;
                }
            }
        }));

        Ok(verdict_rx.await.ok())
    }
}
