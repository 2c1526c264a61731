//! Transport contract shared by every concrete transport.
//!
//! A [`Transport`] owns an inbound message source and an outbound sink.
//! Inbound messages are handed to a [`RequestHandler`] together with a
//! reference to the transport, so the handler can push replies back out
//! through [`Transport::send_message`].

pub mod stdio;

use std::collections::HashMap;

use crate::jsonrpc::OutboundMessage;
use crate::{BoxError, BoxFuture};

pub use stdio::StdioTransport;

/// Per-message header map. Stdio lines carry none, so it is usually empty.
pub type Headers = HashMap<String, String>;

/// Signals every transport traps to stop itself unless configured otherwise.
pub const DEFAULT_SHUTDOWN_SIGNALS: [&str; 3] = ["INT", "TERM", "QUIT"];

/// Consumer of decoded inbound messages.
///
/// The return value carries no response; replies go through `transport`.
/// An `Err` is reported to the peer by the transport as an internal error.
pub trait RequestHandler: Send + Sync {
    /// Handle one inbound message.
    ///
    /// # Errors
    ///
    /// Any failure; its `Display` text becomes the description in the
    /// `-32000` error envelope sent back to the peer.
    fn handle_request<'a>(
        &'a self,
        message: &'a str,
        headers: &'a Headers,
        transport: &'a dyn Transport,
    ) -> BoxFuture<'a, Result<(), BoxError>>;
}

/// Operations every concrete transport supplies.
pub trait Transport: Send + Sync {
    /// Run the inbound loop until the source ends or the transport stops.
    fn start(&self) -> BoxFuture<'_, ()>;

    /// Stop the transport. Idempotent.
    fn stop(&self) -> BoxFuture<'_, ()>;

    /// Send one outbound message; dropped silently when not running.
    fn send_message(&self, message: OutboundMessage) -> BoxFuture<'_, ()>;

    /// Handler that inbound messages are forwarded to.
    fn request_handler(&self) -> &dyn RequestHandler;

    /// Forward `message` and `headers` unchanged to the request handler.
    ///
    /// # Errors
    ///
    /// Propagates the handler's failure; the caller decides how to report it.
    fn process_message<'a>(
        &'a self,
        message: &'a str,
        headers: &'a Headers,
    ) -> BoxFuture<'a, Result<(), BoxError>>
    where
        Self: Sized,
    {
        self.request_handler()
            .handle_request(message, headers, self)
    }
}
