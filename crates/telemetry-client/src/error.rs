//! Client error types.
//!
//! Nothing in this crate treats an error as fatal to the process. Connect
//! failures are reported and count as a spent attempt, read errors are logged
//! and the read loop carries on, and heartbeat write failures flip the
//! liveness flag so the reader winds the session down.

use std::io;
use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the client outside of a running session.
#[derive(Error, Debug)]
pub enum ClientError {
    /// Opening a connection failed.
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Failure to open a connection to the telemetry endpoint.
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Host was empty or could not be used as an address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Peer actively refused the connection.
    #[error("Connection refused by {0}")]
    ConnectionRefused(String),

    /// No route to the peer.
    #[error("Network unreachable: {0}")]
    NetworkUnreachable(String),

    /// Configured connect timeout elapsed.
    #[error("Connection to {0} timed out")]
    TimedOut(String),

    /// Any other transport failure.
    #[error("Connection to {target} failed: {message}")]
    Other {
        /// Address that was dialed
        target: String,
        /// Underlying error message
        message: String,
    },
}

impl ConnectError {
    /// Classify an I/O error returned while dialing `target`.
    pub fn from_io(target: &str, err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused(target.to_string()),
            io::ErrorKind::NetworkUnreachable
            | io::ErrorKind::HostUnreachable
            | io::ErrorKind::NetworkDown
            | io::ErrorKind::AddrNotAvailable => {
                Self::NetworkUnreachable(format!("{target} ({err})"))
            }
            io::ErrorKind::TimedOut => Self::TimedOut(target.to_string()),
            io::ErrorKind::InvalidInput => Self::InvalidAddress(format!("{target} ({err})")),
            _ => Self::Other {
                target: target.to_string(),
                message: err.to_string(),
            },
        }
    }

    /// Short label used in log lines.
    #[must_use]
    pub fn class(&self) -> &'static str {
        match self {
            Self::InvalidAddress(_) => "InvalidAddress",
            Self::ConnectionRefused(_) => "ConnectionRefused",
            Self::NetworkUnreachable(_) => "NetworkUnreachable",
            Self::TimedOut(_) => "TimedOut",
            Self::Other { .. } => "Other",
        }
    }
}

/// Error raised by a single read inside the read loop. Always non-fatal.
#[derive(Error, Debug)]
pub enum ReadError {
    /// Transport read failed; the loop re-checks liveness and continues.
    #[error("Transient read error: {0}")]
    Transient(#[from] io::Error),
}

impl ReadError {
    /// Short label used in log lines.
    #[must_use]
    pub fn class(&self) -> String {
        match self {
            Self::Transient(err) => format!("{:?}", err.kind()),
        }
    }
}

/// Error raised while sending a heartbeat.
#[derive(Error, Debug)]
pub enum HeartbeatError {
    /// Socket-level write failure: the connection is presumed dead.
    #[error("Heartbeat write failed: {0}")]
    WriteFailed(io::Error),

    /// Anything else, treated as transient.
    #[error("Heartbeat error: {0}")]
    Other(String),
}

impl HeartbeatError {
    /// Classify an I/O error raised while writing or flushing the heartbeat.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => Self::WriteFailed(err),
            _ => Self::Other(err.to_string()),
        }
    }

    /// Whether this error means the session should be considered dead.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::WriteFailed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_classification() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            ConnectError::from_io("127.0.0.1:10", &refused),
            ConnectError::ConnectionRefused(_)
        ));

        let unreachable = io::Error::from(io::ErrorKind::NetworkUnreachable);
        assert_eq!(
            ConnectError::from_io("10.0.0.1:1", &unreachable).class(),
            "NetworkUnreachable"
        );

        let host = io::Error::from(io::ErrorKind::HostUnreachable);
        assert_eq!(
            ConnectError::from_io("10.0.0.1:1", &host).class(),
            "NetworkUnreachable"
        );

        let odd = io::Error::new(io::ErrorKind::Other, "boom");
        let err = ConnectError::from_io("host:1", &odd);
        assert_eq!(err.class(), "Other");
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_heartbeat_error_fatality() {
        assert!(HeartbeatError::from_io(io::Error::from(io::ErrorKind::BrokenPipe)).is_fatal());
        assert!(
            HeartbeatError::from_io(io::Error::from(io::ErrorKind::ConnectionReset)).is_fatal()
        );
        assert!(!HeartbeatError::from_io(io::Error::from(io::ErrorKind::Interrupted)).is_fatal());
        assert!(!HeartbeatError::Other("timed out".into()).is_fatal());
    }

    #[test]
    fn test_client_error_wraps_connect_error() {
        let err: ClientError = ConnectError::InvalidAddress("empty host".into()).into();
        assert_eq!(err.to_string(), "Invalid address: empty host");
    }

    #[test]
    fn test_client_error_config_message() {
        let err = ClientError::Config("port must be in 1..=65535".into());
        assert!(matches!(err, ClientError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: port must be in 1..=65535"
        );
    }
}
