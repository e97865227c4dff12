//! Reconnect controller: drives repeated session attempts.
//!
//! # Attempt Loop
//!
//! ```text
//!        ┌──────────────────────── retry policy allows next attempt ─┐
//!        ▼                                                            │
//!   Connecting ──open ok──> Connected ──session ends──> Disconnected ─┤
//!        │                                                            │
//!        └──open failed (logged)─────────────────────> Disconnected ─┘
//! ```
//!
//! - `FixedAttempts(n)` runs exactly `n` attempts back to back, whatever
//!   their outcome, then returns.
//! - `Infinite` keeps going until shutdown, pausing `retry_delay` between
//!   consecutive attempts so a refusing endpoint is not hammered.
//!
//! A failed connect and a session that ran and ended are both just a spent
//! attempt; the controller never looks at the cause when deciding to retry.

use std::time::Duration;

use crate::config::{ClientConfig, RetryPolicy};
use crate::connection::Connector;
use crate::error::ConnectError;
use crate::session::{ExitReason, Session, SessionOptions, SessionReport};
use crate::shutdown::Shutdown;
use crate::sink::OutputSink;

/// Controller state, observable for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session open, nothing in flight.
    Disconnected,
    /// Dialing the endpoint.
    Connecting {
        /// 1-based attempt number
        attempt: u64,
    },
    /// A session is running.
    Connected {
        /// 1-based attempt number
        attempt: u64,
    },
    /// Attempts exhausted or shutdown requested.
    Finished,
}

impl ConnectionState {
    /// Returns a short status label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Disconnected => "Disconnected",
            Self::Connecting { .. } => "Connecting...",
            Self::Connected { .. } => "Connected",
            Self::Finished => "Finished",
        }
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum AttemptOutcome {
    /// The connection could not be opened.
    ConnectFailed(ConnectError),
    /// A session ran and ended.
    SessionEnded(SessionReport),
    /// Shutdown fired before the connection opened.
    Cancelled,
}

/// Totals reported when the controller returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Attempts made (connect + run)
    pub attempts: u64,
    /// Attempts that produced a session
    pub sessions: u64,
    /// Attempts whose connect failed
    pub failed_connects: u64,
    /// Exit reason of the most recent session
    pub last_exit: Option<ExitReason>,
    /// Whether the controller stopped because of shutdown
    pub cancelled: bool,
}

impl RunSummary {
    fn record(&mut self, outcome: &AttemptOutcome) {
        self.attempts += 1;
        match outcome {
            AttemptOutcome::ConnectFailed(_) => self.failed_connects += 1,
            AttemptOutcome::SessionEnded(report) => {
                self.sessions += 1;
                self.last_exit = Some(report.exit);
            }
            AttemptOutcome::Cancelled => self.cancelled = true,
        }
    }
}

/// Runs sessions against one endpoint according to the retry policy.
pub struct ReconnectController<C> {
    connector: C,
    retry: RetryPolicy,
    retry_delay: Duration,
    options: SessionOptions,
    shutdown: Shutdown,
    state: ConnectionState,
}

impl<C> ReconnectController<C>
where
    C: Connector,
{
    /// Controller for `connector` using the policies in `config`.
    pub fn new(connector: C, config: &ClientConfig) -> Self {
        Self {
            connector,
            retry: config.retry,
            retry_delay: config.retry_delay,
            options: SessionOptions::from(config),
            shutdown: Shutdown::never(),
            state: ConnectionState::Disconnected,
        }
    }

    /// Stop between or during attempts when `shutdown` fires.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Shutdown) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Current controller state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run attempts until the retry policy is exhausted or shutdown fires.
    pub async fn run(&mut self, sink: &mut dyn OutputSink) -> RunSummary {
        let mut summary = RunSummary::default();
        tracing::info!(
            target_addr = %self.connector.target(),
            retry = ?self.retry,
            "Starting connection..."
        );

        let mut attempt: u64 = 0;
        loop {
            let next = attempt + 1;
            if !self.retry.allows(next) {
                break;
            }
            if self.shutdown.is_triggered() {
                summary.cancelled = true;
                break;
            }
            if attempt > 0 && self.retry == RetryPolicy::Infinite && !self.retry_delay.is_zero() {
                let mut shutdown = self.shutdown.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_delay) => {}
                    _ = shutdown.wait() => {
                        summary.cancelled = true;
                        break;
                    }
                }
            }
            attempt = next;

            let outcome = self.attempt(attempt, sink).await;
            summary.record(&outcome);
            match &outcome {
                AttemptOutcome::Cancelled => break,
                AttemptOutcome::SessionEnded(report) if report.exit == ExitReason::Cancelled => {
                    summary.cancelled = true;
                    break;
                }
                _ => {}
            }
        }

        self.state = ConnectionState::Finished;
        tracing::info!(
            attempts = summary.attempts,
            sessions = summary.sessions,
            failed_connects = summary.failed_connects,
            cancelled = summary.cancelled,
            "Reconnect controller finished"
        );
        summary
    }

    /// One open + run cycle.
    pub async fn attempt(&mut self, attempt: u64, sink: &mut dyn OutputSink) -> AttemptOutcome {
        self.state = ConnectionState::Connecting { attempt };
        let target = self.connector.target();
        tracing::debug!(attempt, target_addr = %target, "Connecting");

        // Dial under the shutdown signal too; a connect with no timeout can hang.
        let mut shutdown = self.shutdown.clone();
        let opened = tokio::select! {
            opened = Session::open(&self.connector) => opened,
            _ = shutdown.wait() => {
                tracing::info!(attempt, target_addr = %target, "Connect abandoned on shutdown");
                self.state = ConnectionState::Disconnected;
                return AttemptOutcome::Cancelled;
            }
        };

        let outcome = match opened {
            Ok(session) => {
                self.state = ConnectionState::Connected { attempt };
                let report = session
                    .run(&self.options, sink, self.shutdown.clone())
                    .await;
                AttemptOutcome::SessionEnded(report)
            }
            Err(err) => {
                tracing::error!(
                    attempt,
                    error_class = err.class(),
                    "Failed to connect to {}: {}",
                    target,
                    err
                );
                AttemptOutcome::ConnectFailed(err)
            }
        };
        self.state = ConnectionState::Disconnected;
        outcome
    }
}
