//! One connection's lifecycle: open, run reader + heartbeat, close.
//!
//! ```text
//! open() ──> Session ──run()──> reader task (this task) ─┐
//!                          └──> heartbeat task ──────────┤
//!                                                       ▼
//!                         reader exits ─> stop heartbeat ─> join ─> close
//! ```
//!
//! The stream is split into a read half (owned by the reader loop) and a
//! write half (owned by the heartbeat task). Both halves are handed back
//! before the stream is closed, so nothing touches it after shutdown.

use std::fmt;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;

use crate::config::ClientConfig;
use crate::connection::Connector;
use crate::error::ConnectError;
use crate::heartbeat::{HeartbeatMonitor, HeartbeatReport};
use crate::liveness::Liveness;
use crate::reader::{ReaderReport, StreamReader};
use crate::shutdown::Shutdown;
use crate::sink::OutputSink;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Peer closed the connection or the socket is no longer connected.
    ConnectionClosed,
    /// The heartbeat declared the connection dead.
    HeartbeatFailed,
    /// Shutdown was requested.
    Cancelled,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionClosed => write!(f, "connection closed"),
            Self::HeartbeatFailed => write!(f, "heartbeat failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Summary of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    /// Why the session ended
    pub exit: ExitReason,
    /// How long the connection was up
    pub duration: Duration,
    /// Reader counters
    pub reader: ReaderReport,
    /// Heartbeat counters
    pub heartbeat: HeartbeatReport,
}

/// Settings a session needs from the client configuration.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Reader policy
    pub poll: crate::config::PollPolicy,
    /// Heartbeat period
    pub heartbeat_interval: Duration,
    /// Blocking read deadline
    pub read_timeout: Duration,
    /// Heartbeat write deadline
    pub write_timeout: Duration,
}

impl From<&ClientConfig> for SessionOptions {
    fn from(config: &ClientConfig) -> Self {
        Self {
            poll: config.poll,
            heartbeat_interval: config.heartbeat_interval,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

/// An open connection to the telemetry endpoint.
pub struct Session<S> {
    stream: S,
    target: String,
    liveness: Liveness,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Attempt a single connection through `connector`.
    pub async fn open<C>(connector: &C) -> Result<Self, ConnectError>
    where
        C: Connector<Stream = S> + ?Sized,
    {
        let stream = connector.connect().await?;
        Ok(Self::from_stream(stream, connector.target()))
    }

    /// Wrap an already connected stream.
    pub fn from_stream(stream: S, target: impl Into<String>) -> Self {
        Self {
            stream,
            target: target.into(),
            liveness: Liveness::new(),
        }
    }

    /// Endpoint this session is connected to.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Handle on this session's liveness flags.
    #[must_use]
    pub fn liveness(&self) -> Liveness {
        self.liveness.clone()
    }

    /// Run reader and heartbeat until either reports failure, then close.
    pub async fn run(
        self,
        options: &SessionOptions,
        sink: &mut dyn OutputSink,
        shutdown: Shutdown,
    ) -> SessionReport {
        let Self {
            stream,
            target,
            liveness,
        } = self;
        let started = Instant::now();
        tracing::info!(target_addr = %target, poll = %options.poll.label(), "Connection made!");

        let (read_half, write_half) = tokio::io::split(stream);

        let (stop_tx, stop_rx) = watch::channel(false);
        let monitor = HeartbeatMonitor::new(options.heartbeat_interval)
            .with_write_timeout(options.write_timeout);
        let heartbeat = tokio::spawn(monitor.run(write_half, liveness.clone(), stop_rx));

        let (read_half, exit, reader_report) = StreamReader::new(read_half, options.poll)
            .with_read_timeout(options.read_timeout)
            .run(sink, &liveness, shutdown)
            .await;

        let _ = stop_tx.send(true);
        let heartbeat_report = match heartbeat.await {
            Ok((write_half, report)) => {
                let mut stream = read_half.unsplit(write_half);
                if let Err(e) = stream.shutdown().await {
                    tracing::debug!("Ignoring error while closing {}: {}", target, e);
                }
                report
            }
            Err(e) => {
                // Dropping the read half releases the stream.
                tracing::error!("Heartbeat task for {} aborted: {}", target, e);
                HeartbeatReport::default()
            }
        };

        let duration = started.elapsed();
        match exit {
            ExitReason::Cancelled => {
                tracing::info!(target_addr = %target, "Session closed on shutdown")
            }
            _ => tracing::warn!(
                target_addr = %target,
                reason = %exit,
                uptime_ms = duration.as_millis() as u64,
                "Connection lost!"
            ),
        }

        SessionReport {
            exit,
            duration,
            reader: reader_report,
            heartbeat: heartbeat_report,
        }
    }
}
