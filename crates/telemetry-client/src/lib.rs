//! Resilient TCP telemetry client.
//!
//! Connects to a fixed endpoint, echoes everything the peer sends to an
//! output sink, pings the peer on a fixed period to detect dead links, and
//! reconnects according to a retry policy. The crate is UI-agnostic; the
//! `telemetry_pclog` binary supplies a [`ClientConfig`] and a sink.
//!
//! Components, leaf first:
//! - [`heartbeat`]: periodic `ping` writer that flags dead connections
//! - [`reader`]: read loop under one of three poll policies
//! - [`session`]: one connection's open → run → close lifecycle
//! - [`reconnect`]: drives sessions per the retry policy

pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod liveness;
pub mod reader;
pub mod reconnect;
pub mod session;
pub mod shutdown;
pub mod sink;

pub use config::{ClientConfig, PollPolicy, RetryPolicy, DEFAULT_HOST, DEFAULT_PORT};
pub use connection::{Connector, TcpConnector};
pub use error::{ClientError, ConnectError, HeartbeatError, ReadError, Result};
pub use liveness::Liveness;
pub use reconnect::{AttemptOutcome, ConnectionState, ReconnectController, RunSummary};
pub use session::{ExitReason, Session, SessionOptions, SessionReport};
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use sink::{MemorySink, OutputSink, StdoutSink};
