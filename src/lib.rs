#![forbid(unsafe_code)]

//! Line-delimited JSON-RPC over stdio with signal-driven graceful shutdown.
//!
//! - [`stream`]: failure-isolating wrapper around stdin/stdout/stderr.
//! - [`signals`]: named OS signals routed to ordered async callbacks.
//! - [`transport`]: the transport contract and the stdio implementation.

use std::future::Future;
use std::pin::Pin;

pub mod codec;
pub mod config;
pub mod errors;
pub mod jsonrpc;
pub mod signals;
pub mod stream;
pub mod transport;

pub use config::TransportConfig;
pub use errors::{AppError, BoxError, Result};
pub use transport::{Headers, RequestHandler, StdioTransport, Transport};

/// Boxed, sendable future used at the trait seams.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
