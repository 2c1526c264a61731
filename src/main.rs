#![forbid(unsafe_code)]

//! `rpc-stdio`: demo JSON-RPC server on stdin/stdout.
//!
//! Answers `ping` requests, rejects other methods with `-32601`, and stops
//! on end of input or on `SIGINT`/`SIGTERM`/`SIGQUIT`. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

use rpc_stdio::jsonrpc::{ErrorEnvelope, JSONRPC_VERSION, METHOD_NOT_FOUND};
use rpc_stdio::{
    AppError, BoxError, BoxFuture, Headers, RequestHandler, Result, StdioTransport, Transport,
    TransportConfig,
};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rpc-stdio", about = "JSON-RPC over stdio demo server", version, long_about = None)]
struct Cli {
    /// Path to an optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

/// Handler answering `ping` and rejecting everything else.
struct PingHandler;

impl RequestHandler for PingHandler {
    fn handle_request<'a>(
        &'a self,
        message: &'a str,
        _headers: &'a Headers,
        transport: &'a dyn Transport,
    ) -> BoxFuture<'a, std::result::Result<(), BoxError>> {
        Box::pin(async move {
            let request: Value = serde_json::from_str(message)?;
            let method = request.get("method").and_then(Value::as_str).unwrap_or_default();

            let Some(id) = request.get("id").cloned() else {
                debug!(method, "ignoring notification");
                return Ok(());
            };

            let reply = if method == "ping" {
                json!({ "jsonrpc": JSONRPC_VERSION, "result": {}, "id": id })
            } else {
                let envelope = ErrorEnvelope::new(
                    METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                    Some(id),
                );
                serde_json::to_value(&envelope)?
            };

            transport.send_message(reply.into()).await;
            Ok::<(), BoxError>(())
        })
    }
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    let config = match &args.config {
        Some(path) => TransportConfig::load_from_path(path)?,
        None => TransportConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?;

    runtime.block_on(async {
        let transport = StdioTransport::stdio(Arc::new(PingHandler), &config);
        transport.start().await;
    });

    // A stdin read may still be parked on a blocking thread.
    runtime.shutdown_background();
    info!("rpc-stdio shut down");
    Ok(())
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
