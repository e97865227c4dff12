//! Periodic heartbeat for one session.
//!
//! Every tick writes the 4-byte `ping` literal to the peer. The monitor is the
//! only writer on the stream; no reply is expected. A socket-level write
//! failure flips the session's liveness flag and ends the monitor, any other
//! error is logged and the next tick tries again.

use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::time::{interval_at, timeout, Instant, MissedTickBehavior};

use crate::config::{DEFAULT_HEARTBEAT_INTERVAL, DEFAULT_WRITE_TIMEOUT, HEARTBEAT_PAYLOAD};
use crate::error::HeartbeatError;
use crate::liveness::Liveness;

/// Counters reported when the monitor stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Heartbeats written and flushed
    pub sent: u64,
    /// Non-fatal send errors
    pub transient_errors: u64,
    /// Whether the monitor flagged the session as dead
    pub flagged_failure: bool,
}

/// Heartbeat timer for a single session.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    write_timeout: Duration,
}

impl HeartbeatMonitor {
    /// Monitor ticking every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }

    /// Set the deadline for one write + flush.
    #[must_use]
    pub fn with_write_timeout(mut self, write_timeout: Duration) -> Self {
        self.write_timeout = write_timeout;
        self
    }

    /// Heartbeat period.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until `stop` fires or the session is declared dead.
    ///
    /// The first heartbeat goes out one full period after the call. The
    /// writer is handed back so the session can close the stream once the
    /// monitor has stopped.
    pub async fn run<W>(
        self,
        mut writer: W,
        liveness: Liveness,
        mut stop: watch::Receiver<bool>,
    ) -> (W, HeartbeatReport)
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut report = HeartbeatReport::default();
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }

            if liveness.is_failed() {
                break;
            }
            if !liveness.is_connected() {
                tracing::debug!("Stream no longer readable/writable, stopping heartbeat");
                liveness.mark_failed();
                report.flagged_failure = true;
                break;
            }

            match self.send(&mut writer).await {
                Ok(()) => {
                    report.sent += 1;
                    // A successful send clears any stale failure.
                    liveness.clear_failed();
                    tracing::trace!(sent = report.sent, "Heartbeat sent");
                }
                Err(err) if err.is_fatal() => {
                    tracing::warn!(error = %err, "Socket error caught during heartbeat");
                    liveness.mark_failed();
                    report.flagged_failure = true;
                    break;
                }
                Err(err) => {
                    report.transient_errors += 1;
                    tracing::warn!(error = %err, "General error caught during heartbeat");
                }
            }
        }

        (writer, report)
    }

    async fn send<W>(&self, writer: &mut W) -> Result<(), HeartbeatError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let write = async {
            writer.write_all(HEARTBEAT_PAYLOAD).await?;
            writer.flush().await
        };
        match timeout(self.write_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(HeartbeatError::from_io(e)),
            Err(_) => Err(HeartbeatError::Other(format!(
                "write timed out after {}ms",
                self.write_timeout.as_millis()
            ))),
        }
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_HEARTBEAT_INTERVAL)
    }
}
