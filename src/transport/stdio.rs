//! Line-delimited JSON-RPC transport over stdin/stdout.
//!
//! One task runs [`StdioTransport::start`], which reads lines until the
//! input ends or the transport is stopped. Any number of other tasks may
//! call [`send_message`](Transport::send_message), [`is_running`](StdioTransport::is_running)
//! or [`stop`](Transport::stop) concurrently.
//!
//! The running flag and every outbound write share one lock, so a send
//! that saw `running == true` finishes its write before a concurrent stop
//! can close the output, and no two lines ever interleave.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::{Headers, RequestHandler, Transport, DEFAULT_SHUTDOWN_SIGNALS};
use crate::config::TransportConfig;
use crate::jsonrpc::{ErrorEnvelope, OutboundMessage, INTERNAL_ERROR};
use crate::signals::SignalRouter;
use crate::stream::{ReadOutcome, StreamGuard};
use crate::{BoxError, BoxFuture};

/// State reachable from signal callbacks, which hold it weakly.
struct Shared {
    streams: StreamGuard,
    running: Mutex<bool>,
}

impl Shared {
    async fn stop(&self) {
        info!("stopping stdio transport");
        *self.running.lock().await = false;
        self.streams.close().await;
    }
}

/// JSON-RPC transport over a [`StreamGuard`], stopped by OS signals.
pub struct StdioTransport {
    shared: Arc<Shared>,
    signals: SignalRouter,
    handler: Arc<dyn RequestHandler>,
}

impl std::fmt::Debug for StdioTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StdioTransport")
            .field("streams", &self.shared.streams)
            .field("signals", &self.signals)
            .finish_non_exhaustive()
    }
}

impl StdioTransport {
    /// Create a transport that stops on `INT`, `TERM` and `QUIT`.
    ///
    /// Must be called inside a tokio runtime for the signal traps to be
    /// installed; otherwise the failure is logged and signals are ignored.
    #[must_use]
    pub fn new(handler: Arc<dyn RequestHandler>, streams: StreamGuard) -> Self {
        Self::with_signals(handler, streams, &DEFAULT_SHUTDOWN_SIGNALS)
    }

    /// Create a transport that stops on the given signal names.
    #[must_use]
    pub fn with_signals(
        handler: Arc<dyn RequestHandler>,
        streams: StreamGuard,
        shutdown_signals: &[&str],
    ) -> Self {
        let shared = Arc::new(Shared {
            streams,
            running: Mutex::new(false),
        });

        let signals = SignalRouter::new();
        let weak = Arc::downgrade(&shared);
        signals.register(shutdown_signals, move || {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    shared.stop().await;
                }
                Ok::<(), BoxError>(())
            }
        });

        Self {
            shared,
            signals,
            handler,
        }
    }

    /// Create a transport that stops on the signals named in `config`.
    ///
    /// The line limit is a property of `streams`; build them from the same
    /// config, as [`stdio`](Self::stdio) does.
    #[must_use]
    pub fn with_config(
        handler: Arc<dyn RequestHandler>,
        streams: StreamGuard,
        config: &TransportConfig,
    ) -> Self {
        let names: Vec<&str> = config.shutdown_signals.iter().map(String::as_str).collect();
        Self::with_signals(handler, streams, &names)
    }

    /// Create a transport over the process stdio, configured by `config`.
    #[must_use]
    pub fn stdio(handler: Arc<dyn RequestHandler>, config: &TransportConfig) -> Self {
        Self::with_config(handler, StreamGuard::stdio(config), config)
    }

    /// Whether the transport is running, read under the write lock.
    pub async fn is_running(&self) -> bool {
        *self.shared.running.lock().await
    }

    /// The signal router; embedders may register additional callbacks.
    #[must_use]
    pub fn signals(&self) -> &SignalRouter {
        &self.signals
    }

    /// The underlying streams.
    #[must_use]
    pub fn streams(&self) -> &StreamGuard {
        &self.shared.streams
    }

    async fn run(&self) {
        info!("starting stdio transport");
        *self.shared.running.lock().await = true;

        let headers = Headers::new();
        loop {
            let line = match self.shared.streams.read_line().await {
                ReadOutcome::Line(line) => line,
                ReadOutcome::EndOfStream | ReadOutcome::Failed(_) => break,
            };

            if !self.is_running().await {
                break;
            }

            let message = line.trim();
            debug!(len = message.len(), "received message");
            self.dispatch(message, &headers).await;
        }

        if self.is_running().await {
            debug!("input ended");
            self.shared.stop().await;
        }
    }

    async fn dispatch(&self, message: &str, headers: &Headers) {
        let outcome = AssertUnwindSafe(self.process_message(message, headers))
            .catch_unwind()
            .await;

        let err: BoxError = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(err)) => err,
            Err(payload) => panic_message(payload.as_ref()).into(),
        };

        error!(error = %err, "failed to process message");
        let mut source = err.source();
        while let Some(cause) = source {
            debug!(cause = %cause, "caused by");
            source = cause.source();
        }

        self.send_error(INTERNAL_ERROR, format!("Internal error: {err}"), None)
            .await;
    }

    async fn send(&self, message: OutboundMessage) {
        let running = self.shared.running.lock().await;
        if !*running {
            debug!("transport not running, dropping outbound message");
            return;
        }

        match message.into_line() {
            Ok(line) => {
                self.shared.streams.write(&line).await;
            }
            Err(err) => warn!(error = %err, "failed to serialize outbound message"),
        }
        drop(running);
    }

    async fn send_error(&self, code: i64, message: String, id: Option<Value>) {
        let envelope = ErrorEnvelope::new(code, message, id);
        match serde_json::to_string(&envelope) {
            Ok(text) => self.send(OutboundMessage::Text(text)).await,
            Err(err) => warn!(error = %err, "failed to serialize error envelope"),
        }
    }
}

impl Transport for StdioTransport {
    fn start(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.run())
    }

    fn stop(&self) -> BoxFuture<'_, ()> {
        Box::pin(self.shared.stop())
    }

    fn send_message(&self, message: OutboundMessage) -> BoxFuture<'_, ()> {
        Box::pin(self.send(message))
    }

    fn request_handler(&self) -> &dyn RequestHandler {
        self.handler.as_ref()
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        self.signals.clear();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "request handler panicked".to_owned()
    }
}
