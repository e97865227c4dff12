//! Stream reader: pulls bytes off the connection and forwards text.
//!
//! # State Machine
//!
//! ```text
//!            ┌───────── read per poll policy ─────────┐
//!            ▼                                        │
//!        Reading ──termination check──> (continue) ───┘
//!            │
//!            ├── peer closed / not connected ──> Closed
//!            ├── liveness flag set ────────────> LivenessFailed
//!            └── shutdown requested ───────────> Cancelled
//! ```
//!
//! Termination conditions are checked before every read. A zero-length read
//! is a graceful close from the peer: it clears the `connected` flag so the
//! next check exits with `Closed`. Read errors never propagate. They are
//! logged and the loop goes back to its termination check.

use futures::FutureExt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

use crate::config::{PollPolicy, DEFAULT_READ_TIMEOUT, READ_BUFFER_SIZE};
use crate::error::ReadError;
use crate::liveness::Liveness;
use crate::session::ExitReason;
use crate::shutdown::Shutdown;
use crate::sink::{decode_ascii, is_blank, OutputSink};

/// Counters reported when the read loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderReport {
    /// Bytes received from the peer
    pub bytes_read: u64,
    /// Non-blank chunks handed to the sink
    pub chunks_forwarded: u64,
    /// Read errors that were logged and skipped
    pub read_errors: u64,
}

/// Result of one read step.
enum ReadStep {
    Data(usize),
    Eof,
    Idle,
    Failed(ReadError),
    Cancelled,
}

/// Read loop over one half of the session stream.
pub struct StreamReader<R> {
    reader: R,
    policy: PollPolicy,
    read_timeout: Duration,
    buf: [u8; READ_BUFFER_SIZE],
}

impl<R> StreamReader<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Reader using `policy`.
    pub fn new(reader: R, policy: PollPolicy) -> Self {
        Self {
            reader,
            policy,
            read_timeout: DEFAULT_READ_TIMEOUT,
            buf: [0u8; READ_BUFFER_SIZE],
        }
    }

    /// Deadline for one blocking read. Only used by [`PollPolicy::BlockingRead`].
    #[must_use]
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Run until the connection closes, the liveness flag is set or
    /// shutdown is requested. Hands the read half back for closing.
    pub async fn run(
        mut self,
        sink: &mut dyn OutputSink,
        liveness: &Liveness,
        mut shutdown: Shutdown,
    ) -> (R, ExitReason, ReaderReport) {
        let mut report = ReaderReport::default();

        let exit = loop {
            if !liveness.is_connected() {
                break ExitReason::ConnectionClosed;
            }
            if liveness.is_failed() {
                break ExitReason::HeartbeatFailed;
            }
            if shutdown.is_triggered() {
                break ExitReason::Cancelled;
            }

            match self.read_step(&mut shutdown).await {
                ReadStep::Data(n) => {
                    report.bytes_read += n as u64;
                    if forward(sink, &self.buf[..n]) {
                        report.chunks_forwarded += 1;
                    }
                }
                ReadStep::Eof => {
                    tracing::debug!("Peer closed the connection (zero-length read)");
                    liveness.mark_closed();
                }
                ReadStep::Idle => {}
                ReadStep::Failed(err) => {
                    report.read_errors += 1;
                    tracing::warn!(
                        error_class = %err.class(),
                        error = %err,
                        "Error caught while reading, trivial or undetermined error level"
                    );
                    if let ReadError::Transient(io_err) = &err {
                        if is_disconnect(io_err) {
                            liveness.mark_closed();
                        }
                    }
                }
                ReadStep::Cancelled => break ExitReason::Cancelled,
            }

            match self.policy {
                PollPolicy::DelayedPoll { interval } => {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {}
                        _ = shutdown.wait() => break ExitReason::Cancelled,
                    }
                }
                PollPolicy::BusyPoll => tokio::task::yield_now().await,
                PollPolicy::BlockingRead => {}
            }
        };

        (self.reader, exit, report)
    }

    async fn read_step(&mut self, shutdown: &mut Shutdown) -> ReadStep {
        match self.policy {
            PollPolicy::BlockingRead => {
                let read = timeout(self.read_timeout, self.reader.read(&mut self.buf));
                tokio::select! {
                    result = read => match result {
                        Ok(result) => classify(result),
                        // Deadline hit on a silent peer; go back and re-check liveness.
                        Err(_) => ReadStep::Idle,
                    },
                    _ = shutdown.wait() => ReadStep::Cancelled,
                }
            }
            PollPolicy::DelayedPoll { .. } | PollPolicy::BusyPoll => {
                // Only consume what is already available.
                match self.reader.read(&mut self.buf).now_or_never() {
                    Some(result) => classify(result),
                    None => ReadStep::Idle,
                }
            }
        }
    }
}

fn classify(result: io::Result<usize>) -> ReadStep {
    match result {
        Ok(0) => ReadStep::Eof,
        Ok(n) => ReadStep::Data(n),
        Err(e) => ReadStep::Failed(ReadError::Transient(e)),
    }
}

/// Decode and emit one chunk. Returns whether anything was forwarded.
fn forward(sink: &mut dyn OutputSink, bytes: &[u8]) -> bool {
    let text = decode_ascii(bytes);
    if is_blank(&text) {
        return false;
    }
    match sink.emit(&text) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to write telemetry to output sink");
            false
        }
    }
}

/// Errors after which the socket can no longer be considered connected.
fn is_disconnect(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncWriteExt, ReadBuf};
    use tracing_test::traced_test;

    const POLICIES: [PollPolicy; 3] = [
        PollPolicy::DelayedPoll {
            interval: Duration::from_millis(50),
        },
        PollPolicy::BlockingRead,
        PollPolicy::BusyPoll,
    ];

    /// Yields a scripted sequence of read results, then EOF.
    struct ScriptedReader {
        script: Vec<io::Result<Vec<u8>>>,
    }

    impl AsyncRead for ScriptedReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.script.is_empty() {
                return Poll::Ready(Ok(()));
            }
            match self.script.remove(0) {
                Ok(bytes) => {
                    buf.put_slice(&bytes);
                    Poll::Ready(Ok(()))
                }
                Err(e) => Poll::Ready(Err(e)),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_forwards_text_and_exits_on_close() {
        for policy in POLICIES {
            let (client, mut peer) = tokio::io::duplex(1024);
            let sink = MemorySink::new();
            let mut writer = sink.clone();

            peer.write_all(b"telemetry 1\n").await.unwrap();
            drop(peer);

            let (_, exit, report) = StreamReader::new(client, policy)
                .run(&mut writer, &Liveness::new(), Shutdown::never())
                .await;

            assert_eq!(exit, ExitReason::ConnectionClosed, "{policy:?}");
            assert_eq!(sink.contents(), "telemetry 1\n", "{policy:?}");
            assert_eq!(report.bytes_read, 12);
            assert_eq!(report.chunks_forwarded, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_chunks_never_forwarded() {
        for policy in POLICIES {
            let (client, mut peer) = tokio::io::duplex(1024);
            let sink = MemorySink::new();
            let mut writer = sink.clone();

            peer.write_all(b" \r\n\t  \n").await.unwrap();
            drop(peer);

            let (_, exit, report) = StreamReader::new(client, policy)
                .run(&mut writer, &Liveness::new(), Shutdown::never())
                .await;

            assert_eq!(exit, ExitReason::ConnectionClosed);
            assert!(sink.chunks().is_empty(), "{policy:?}");
            assert_eq!(report.bytes_read, 7);
            assert_eq!(report.chunks_forwarded, 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_at_most_buffer_size_per_chunk() {
        let (client, mut peer) = tokio::io::duplex(4096);
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        peer.write_all(&[b'x'; 600]).await.unwrap();
        drop(peer);

        let (_, _, report) = StreamReader::new(client, PollPolicy::BlockingRead)
            .run(&mut writer, &Liveness::new(), Shutdown::never())
            .await;

        assert_eq!(report.bytes_read, 600);
        assert!(sink.chunks().iter().all(|c| c.len() <= READ_BUFFER_SIZE));
        assert_eq!(sink.contents().len(), 600);
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_failure_stops_silent_blocking_read() {
        let (client, _peer) = tokio::io::duplex(64);
        let liveness = Liveness::new();
        let mut sink = MemorySink::new();

        let flag = liveness.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            flag.mark_failed();
        });

        let started = tokio::time::Instant::now();
        let (_, exit, _) = StreamReader::new(client, PollPolicy::BlockingRead)
            .with_read_timeout(Duration::from_secs(1))
            .run(&mut sink, &liveness, Shutdown::never())
            .await;

        assert_eq!(exit, ExitReason::HeartbeatFailed);
        // Within one read deadline of the flag flipping.
        assert!(started.elapsed() <= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_failure_stops_polling_within_one_cycle() {
        for policy in [
            PollPolicy::DelayedPoll {
                interval: Duration::from_millis(100),
            },
            PollPolicy::BusyPoll,
        ] {
            let (client, _peer) = tokio::io::duplex(64);
            let liveness = Liveness::new();
            liveness.mark_failed();

            let (_, exit, report) = StreamReader::new(client, policy)
                .run(&mut MemorySink::new(), &liveness, Shutdown::never())
                .await;

            assert_eq!(exit, ExitReason::HeartbeatFailed);
            assert_eq!(report.bytes_read, 0);
        }
    }

    #[tokio::test]
    #[traced_test]
    async fn test_read_errors_are_not_fatal() {
        let reader = ScriptedReader {
            script: vec![
                Err(io::Error::new(io::ErrorKind::InvalidData, "garbled frame")),
                Ok(b"after error\n".to_vec()),
            ],
        };
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        let (_, exit, report) = StreamReader::new(reader, PollPolicy::BlockingRead)
            .run(&mut writer, &Liveness::new(), Shutdown::never())
            .await;

        assert_eq!(exit, ExitReason::ConnectionClosed);
        assert_eq!(report.read_errors, 1);
        assert_eq!(sink.contents(), "after error\n");
        assert!(logs_contain("garbled frame"));
    }

    #[tokio::test]
    async fn test_connection_reset_marks_closed() {
        let reader = ScriptedReader {
            script: vec![Err(io::Error::from(io::ErrorKind::ConnectionReset))],
        };
        let liveness = Liveness::new();

        let (_, exit, report) = StreamReader::new(reader, PollPolicy::BusyPoll)
            .run(&mut MemorySink::new(), &liveness, Shutdown::never())
            .await;

        assert_eq!(exit, ExitReason::ConnectionClosed);
        assert_eq!(report.read_errors, 1);
        assert!(!liveness.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_read_loop() {
        let (client, _peer) = tokio::io::duplex(64);
        let (trigger, shutdown) = Shutdown::channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            trigger.trigger();
        });

        let (_, exit, _) = StreamReader::new(client, PollPolicy::BlockingRead)
            .with_read_timeout(Duration::from_secs(30))
            .run(&mut MemorySink::new(), &Liveness::new(), shutdown)
            .await;

        assert_eq!(exit, ExitReason::Cancelled);
    }
}
