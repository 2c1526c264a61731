//! Integration tests for signal-driven shutdown of the stdio transport.
//!
//! Tests that raise a real signal run serially; each raises only signals
//! it has trapped itself.

use std::sync::Arc;

use tokio::io::duplex;
use tokio::time::timeout;

use rpc_stdio::codec::MAX_LINE_BYTES;
use rpc_stdio::stream::StreamGuard;
use rpc_stdio::{StdioTransport, Transport, TransportConfig};

use super::test_helpers::{wait_until_running, RecordingHandler, WAIT};

fn pipe_streams() -> (StreamGuard, tokio::io::DuplexStream) {
    let (peer, server) = duplex(4096);
    let streams = StreamGuard::new(server, tokio::io::sink(), tokio::io::sink(), MAX_LINE_BYTES);
    (streams, peer)
}

/// A default transport traps the three termination signals.
#[tokio::test]
async fn default_transport_traps_termination_signals() {
    let (streams, _peer) = pipe_streams();
    let transport = StdioTransport::new(Arc::new(RecordingHandler::default()), streams);

    for name in ["INT", "TERM", "QUIT"] {
        assert!(transport.signals().is_registered(name), "{name} registered");
        assert!(transport.signals().is_trapped(name), "{name} trapped");
    }
}

/// Shutdown signals come from the config when built from one.
#[tokio::test]
async fn configured_signals_replace_the_defaults() {
    let config = TransportConfig::from_toml_str(r#"shutdown_signals = ["HUP"]"#).expect("config");
    let (streams, _peer) = pipe_streams();
    let transport =
        StdioTransport::with_config(Arc::new(RecordingHandler::default()), streams, &config);

    assert!(transport.signals().is_registered("SIGHUP"));
    assert!(transport.signals().is_trapped("HUP"));
    assert!(!transport.signals().is_registered("INT"));
}

/// A config with no shutdown signals traps nothing.
#[tokio::test]
async fn empty_signal_config_traps_nothing() {
    let config = TransportConfig::from_toml_str("shutdown_signals = []").expect("config");
    let (streams, _peer) = pipe_streams();
    let transport =
        StdioTransport::with_config(Arc::new(RecordingHandler::default()), streams, &config);

    for name in ["INT", "TERM", "QUIT"] {
        assert!(!transport.signals().is_registered(name), "{name} registered");
    }
}

/// Dropping the transport removes its traps and callbacks.
#[tokio::test]
async fn dropping_the_transport_clears_its_router() {
    let (streams, _peer) = pipe_streams();
    let transport = StdioTransport::with_signals(
        Arc::new(RecordingHandler::default()),
        streams,
        &["USR2"],
    );
    let router = transport.signals().clone();
    assert!(router.is_trapped("USR2"));

    drop(transport);

    assert!(!router.is_registered("USR2"));
    assert!(!router.is_trapped("USR2"));
}

/// Running the registered callbacks directly stops a running transport.
#[tokio::test]
async fn executing_shutdown_callbacks_stops_the_loop() {
    let (streams, _peer) = pipe_streams();
    let transport = Arc::new(StdioTransport::with_signals(
        Arc::new(RecordingHandler::default()),
        streams,
        &["USR2"],
    ));

    let runner = Arc::clone(&transport);
    let task = tokio::spawn(async move { runner.start().await });
    wait_until_running(&transport).await;

    transport.signals().execute_callbacks("USR2").await;

    timeout(WAIT, task)
        .await
        .expect("callback must unblock the read loop")
        .expect("join");
    assert!(!transport.is_running().await);
    assert!(transport.streams().is_closed());
}

/// A real signal delivered to the process stops the transport.
#[cfg(unix)]
#[tokio::test]
#[serial_test::serial]
async fn delivered_signal_stops_the_loop() {
    use nix::sys::signal::{raise, Signal};

    let (streams, _peer) = pipe_streams();
    let transport = Arc::new(StdioTransport::with_signals(
        Arc::new(RecordingHandler::default()),
        streams,
        &["USR1"],
    ));

    let runner = Arc::clone(&transport);
    let task = tokio::spawn(async move { runner.start().await });
    wait_until_running(&transport).await;

    raise(Signal::SIGUSR1).expect("raise SIGUSR1");

    timeout(WAIT, task)
        .await
        .expect("signal must stop the read loop")
        .expect("join");
    assert!(!transport.is_running().await);
}
