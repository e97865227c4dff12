//! Connection, polling and retry settings for the telemetry client.
//!
//! [`ClientConfig`] is built once at startup and never mutated afterwards.
//! The application layer produces it from CLI flags, a config file and the
//! environment; the core only ever sees the finished record.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{ClientError, Result};

/// Default host of the robot controller.
pub const DEFAULT_HOST: &str = "192.168.49.1";

/// Default telemetry port on the robot controller.
pub const DEFAULT_PORT: u16 = 8333;

/// Maximum number of bytes consumed by a single read.
pub const READ_BUFFER_SIZE: usize = 256;

/// Literal written to the peer on every heartbeat tick.
pub const HEARTBEAT_PAYLOAD: &[u8; 4] = b"ping";

/// Heartbeat period while a session is active.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Pause between attempts under [`RetryPolicy::Infinite`].
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Read deadline applied by [`PollPolicy::BlockingRead`].
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Deadline for writing and flushing one heartbeat.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// How many sessions the reconnect controller attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
    /// Keep reconnecting until shut down externally.
    Infinite,
    /// Attempt exactly this many sessions, then stop.
    FixedAttempts(u32),
}

impl RetryPolicy {
    /// Build the policy from the `--infinite` and `--attempts` flags.
    pub fn from_flags(infinite: bool, attempts: u32) -> Result<Self> {
        if infinite {
            return Ok(Self::Infinite);
        }
        if attempts == 0 {
            return Err(ClientError::Config(
                "attempts must be at least 1 when not running infinitely".into(),
            ));
        }
        Ok(Self::FixedAttempts(attempts))
    }

    /// Whether attempt number `attempt` (1-based) may run.
    #[must_use]
    pub fn allows(&self, attempt: u64) -> bool {
        match self {
            Self::Infinite => true,
            Self::FixedAttempts(n) => attempt <= u64::from(*n),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::FixedAttempts(1)
    }
}

/// How the stream reader waits for and consumes incoming bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollPolicy {
    /// Read whatever is available, then sleep for `interval`.
    DelayedPoll {
        /// Sleep between polls
        interval: Duration,
    },
    /// Wait in a read call until data, EOF or the read deadline.
    #[default]
    BlockingRead,
    /// Check for available data on every iteration without sleeping.
    BusyPoll,
}

impl PollPolicy {
    /// Map the CLI `--delay` selector onto a policy.
    ///
    /// `>= 0` polls with that many milliseconds between reads, `-1` blocks in
    /// the read call and anything lower busy-polls.
    #[must_use]
    pub fn from_delay_ms(delay: i64) -> Self {
        match delay {
            d if d >= 0 => Self::DelayedPoll {
                interval: Duration::from_millis(d.unsigned_abs()),
            },
            -1 => Self::BlockingRead,
            _ => Self::BusyPoll,
        }
    }

    /// Short label for status lines.
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::DelayedPoll { interval } => format!("delayed poll ({}ms)", interval.as_millis()),
            Self::BlockingRead => "blocking read".to_string(),
            Self::BusyPoll => "busy poll".to_string(),
        }
    }
}

/// Immutable configuration record consumed by the client core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Target host name or IP address
    pub host: String,
    /// Target TCP port
    pub port: u16,
    /// Retry policy for the reconnect controller
    pub retry: RetryPolicy,
    /// Poll policy for the stream reader
    pub poll: PollPolicy,
    /// Heartbeat period
    pub heartbeat_interval: Duration,
    /// Pause between attempts under the infinite policy
    pub retry_delay: Duration,
    /// Read deadline for the blocking read policy
    pub read_timeout: Duration,
    /// Deadline for one heartbeat write + flush
    pub write_timeout: Duration,
    /// Optional connect deadline; `None` waits as long as the OS does
    pub connect_timeout: Option<Duration>,
    /// Disable Nagle's algorithm on connected sockets
    pub nodelay: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            retry: RetryPolicy::default(),
            poll: PollPolicy::default(),
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            retry_delay: DEFAULT_RETRY_DELAY,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            connect_timeout: None,
            nodelay: true,
        }
    }
}

impl ClientConfig {
    /// Config for `host:port` with every other setting at its default.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Set the poll policy.
    #[must_use]
    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    /// Set the heartbeat period.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Set the pause between infinite-policy attempts.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Set the blocking read deadline.
    #[must_use]
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// `host:port` as dialed.
    #[must_use]
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validate the record before any connection is attempted.
    ///
    /// The host is deliberately not checked here: an empty host is reported
    /// by every connect attempt as `InvalidAddress` instead of stopping the
    /// process.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ClientError::Config("port must be in 1..=65535".into()));
        }
        if let RetryPolicy::FixedAttempts(0) = self.retry {
            return Err(ClientError::Config("attempts must be at least 1".into()));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(ClientError::Config(
                "heartbeat interval must be non-zero".into(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(ClientError::Config("read timeout must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_policy_from_delay() {
        assert_eq!(
            PollPolicy::from_delay_ms(100),
            PollPolicy::DelayedPoll {
                interval: Duration::from_millis(100)
            }
        );
        assert_eq!(
            PollPolicy::from_delay_ms(0),
            PollPolicy::DelayedPoll {
                interval: Duration::ZERO
            }
        );
        assert_eq!(PollPolicy::from_delay_ms(-1), PollPolicy::BlockingRead);
        assert_eq!(PollPolicy::from_delay_ms(-2), PollPolicy::BusyPoll);
        assert_eq!(PollPolicy::from_delay_ms(-50), PollPolicy::BusyPoll);
    }

    #[test]
    fn test_retry_policy_from_flags() {
        assert_eq!(RetryPolicy::from_flags(true, 0).unwrap(), RetryPolicy::Infinite);
        assert_eq!(
            RetryPolicy::from_flags(false, 3).unwrap(),
            RetryPolicy::FixedAttempts(3)
        );
        assert!(RetryPolicy::from_flags(false, 0).is_err());
    }

    #[test]
    fn test_retry_policy_allows() {
        let fixed = RetryPolicy::FixedAttempts(2);
        assert!(fixed.allows(1));
        assert!(fixed.allows(2));
        assert!(!fixed.allows(3));
        assert!(RetryPolicy::Infinite.allows(u64::MAX));
    }

    #[test]
    fn test_defaults_match_cli() {
        let config = ClientConfig::default();
        assert_eq!(config.target(), "192.168.49.1:8333");
        assert_eq!(config.retry, RetryPolicy::FixedAttempts(1));
        assert_eq!(config.poll, PollPolicy::BlockingRead);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.connect_timeout, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(ClientConfig::new("", 8333).validate().is_ok());
        assert!(ClientConfig::new("127.0.0.1", 0).validate().is_err());
        assert!(ClientConfig::new("127.0.0.1", 1)
            .with_retry(RetryPolicy::FixedAttempts(0))
            .validate()
            .is_err());
        assert!(ClientConfig::new("127.0.0.1", 1)
            .with_heartbeat_interval(Duration::ZERO)
            .validate()
            .is_err());
    }
}
