//! Wiring between the loaded configuration and the client core.

use crate::config::AppConfig;
use crate::error::AppResult;
use telemetry_client::{
    OutputSink, ReconnectController, RunSummary, Shutdown, StdoutSink, TcpConnector,
};

/// Run the reconnect loop with telemetry echoed to stdout.
pub async fn run(config: &AppConfig, shutdown: Shutdown) -> AppResult<RunSummary> {
    run_with_sink(config, shutdown, &mut StdoutSink::new()).await
}

/// Run the reconnect loop against an arbitrary sink.
pub async fn run_with_sink(
    config: &AppConfig,
    shutdown: Shutdown,
    sink: &mut dyn OutputSink,
) -> AppResult<RunSummary> {
    let client = config.client_config()?;
    client.validate()?;

    let connector = TcpConnector::from_config(&client);
    let mut controller = ReconnectController::new(connector, &client).with_shutdown(shutdown);
    let summary = controller.run(sink).await;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_client::MemorySink;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_refused_port_exhausts_attempts() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let mut config = AppConfig::default();
        config.connection.host = "127.0.0.1".into();
        config.connection.port = port;
        config.connection.attempts = 3;

        let summary = run_with_sink(&config, Shutdown::never(), &mut MemorySink::new())
            .await
            .unwrap();
        assert_eq!(summary.attempts, 3);
        assert_eq!(summary.failed_connects, 3);
        assert_eq!(summary.sessions, 0);
        assert!(!summary.cancelled);

        // The controller owns the start and finish lines; each appears once.
        logs_assert(|lines: &[&str]| {
            let starts = lines
                .iter()
                .filter(|line| line.contains("Starting connection..."))
                .count();
            let finishes = lines
                .iter()
                .filter(|line| line.contains("Reconnect controller finished"))
                .count();
            match (starts, finishes) {
                (1, 1) => Ok(()),
                other => Err(format!("expected one start and one finish line, got {other:?}")),
            }
        });
    }

    #[tokio::test]
    async fn test_invalid_attempts_is_rejected_before_connecting() {
        let mut config = AppConfig::default();
        config.connection.attempts = 0;
        assert!(run_with_sink(&config, Shutdown::never(), &mut MemorySink::new())
            .await
            .is_err());
    }
}
