//! Transport seam for opening telemetry connections.
//!
//! - [`Connector`]: anything that can produce a duplex byte stream
//! - [`TcpConnector`]: the production implementation over `tokio::net::TcpStream`
//!
//! Sessions and the reconnect controller are generic over [`Connector`], so
//! tests drive them with in-memory streams instead of sockets.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::ClientConfig;
use crate::error::ConnectError;

/// Opens one connection per call.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Duplex stream produced by a successful connect.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Attempt a single connection.
    async fn connect(&self) -> Result<Self::Stream, ConnectError>;

    /// Human-readable description of the endpoint.
    fn target(&self) -> String;
}

/// Plain TCP connector for a fixed `host:port`.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    host: String,
    port: u16,
    connect_timeout: Option<std::time::Duration>,
    nodelay: bool,
}

impl TcpConnector {
    /// Connector for `host:port` with no connect timeout.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            connect_timeout: None,
            nodelay: true,
        }
    }

    /// Connector built from the client configuration.
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
            connect_timeout: config.connect_timeout,
            nodelay: config.nodelay,
        }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self) -> Result<TcpStream, ConnectError> {
        let host = self.host.trim();
        if host.is_empty() {
            return Err(ConnectError::InvalidAddress("host is empty".into()));
        }
        let target = self.target();

        let attempt = TcpStream::connect((host, self.port));
        let stream = match self.connect_timeout {
            Some(limit) => timeout(limit, attempt)
                .await
                .map_err(|_| ConnectError::TimedOut(target.clone()))?,
            None => attempt.await,
        }
        .map_err(|e| ConnectError::from_io(&target, &e))?;

        if self.nodelay {
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!("Could not set TCP_NODELAY on {}: {}", target, e);
            }
        }

        Ok(stream)
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
