//! Failure-isolating wrapper around the three stdio byte streams.
//!
//! [`StreamGuard`] owns an input reader and two writers (output and error).
//! Every operation returns a tagged outcome instead of an error: I/O
//! failures are logged here and never propagate, so the transport above
//! only has to distinguish "got a line" from "stop reading".
//!
//! Closing is cooperative: [`StreamGuard::close`] cancels a token that a
//! parked [`StreamGuard::read_line`] selects on, so shutdown from another
//! task wakes the reader with [`ReadOutcome::EndOfStream`].

use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::codec::LineCodec;
use crate::{AppError, TransportConfig};

/// Boxed async reader used for the input stream.
pub type BoxedReader = Box<dyn AsyncRead + Unpin + Send>;

/// Boxed async writer used for the output and error streams.
pub type BoxedWriter = Box<dyn AsyncWrite + Unpin + Send>;

/// Result of a single [`StreamGuard::read_line`] call.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete line, without its terminator.
    Line(String),
    /// The input ended or was closed.
    EndOfStream,
    /// The input failed; already logged. Callers treat it as end-of-stream.
    Failed(AppError),
}

/// Result of a single [`StreamGuard::write`] or [`StreamGuard::write_error`].
#[derive(Debug)]
pub enum WriteOutcome {
    /// The line was written and flushed.
    Written,
    /// The target stream was already closed; nothing was written.
    Closed,
    /// The write failed; already logged and otherwise ignored.
    Failed(AppError),
}

impl WriteOutcome {
    /// Whether the line reached the underlying stream.
    #[must_use]
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written)
    }
}

/// Input, output, and error streams with per-call failure isolation.
pub struct StreamGuard {
    input: Mutex<Option<FramedRead<BoxedReader, LineCodec>>>,
    output: Mutex<Option<BoxedWriter>>,
    error: Mutex<Option<BoxedWriter>>,
    input_closed: CancellationToken,
    output_closed: AtomicBool,
    error_closed: AtomicBool,
}

impl std::fmt::Debug for StreamGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamGuard")
            .field("input_closed", &self.input_closed.is_cancelled())
            .field("output_closed", &self.output_closed.load(Ordering::Acquire))
            .field("error_closed", &self.error_closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl StreamGuard {
    /// Wrap arbitrary async streams.
    ///
    /// Inbound lines longer than `max_line_bytes` are logged and skipped.
    /// Writers are flushed after every line, so no output is held back.
    #[must_use]
    pub fn new<R, W, E>(input: R, output: W, error: E, max_line_bytes: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
        E: AsyncWrite + Unpin + Send + 'static,
    {
        let input: BoxedReader = Box::new(input);
        Self {
            input: Mutex::new(Some(FramedRead::new(
                input,
                LineCodec::with_max_length(max_line_bytes),
            ))),
            output: Mutex::new(Some(Box::new(output))),
            error: Mutex::new(Some(Box::new(error))),
            input_closed: CancellationToken::new(),
            output_closed: AtomicBool::new(false),
            error_closed: AtomicBool::new(false),
        }
    }

    /// Wrap the process stdin, stdout, and stderr with the line limit from
    /// `config`.
    #[must_use]
    pub fn stdio(config: &TransportConfig) -> Self {
        Self::new(
            tokio::io::stdin(),
            tokio::io::stdout(),
            tokio::io::stderr(),
            config.max_line_bytes,
        )
    }

    /// Wait for the next complete inbound line.
    ///
    /// Returns [`ReadOutcome::EndOfStream`] on EOF or once the input has been
    /// closed, including when [`close_input`](Self::close_input) is called
    /// from another task while this call is parked. Over-long lines are
    /// skipped. Only one task may read at a time.
    pub async fn read_line(&self) -> ReadOutcome {
        if self.input_closed.is_cancelled() {
            return ReadOutcome::EndOfStream;
        }

        let mut guard = self.input.lock().await;
        let Some(framed) = guard.as_mut() else {
            return ReadOutcome::EndOfStream;
        };

        // FramedRead yields a single `None` after a decode error before it
        // resumes reading; that one is not end-of-stream.
        let mut after_codec_error = false;

        loop {
            let item = tokio::select! {
                biased;

                () = self.input_closed.cancelled() => {
                    debug!("stream guard: input closed while reading");
                    return ReadOutcome::EndOfStream;
                }

                item = framed.next() => item,
            };

            match item {
                None if after_codec_error => after_codec_error = false,
                None => {
                    debug!("stream guard: input reached EOF");
                    return ReadOutcome::EndOfStream;
                }
                Some(Err(AppError::Codec(msg))) => {
                    warn!(error = msg.as_str(), "stream guard: skipping oversized line");
                    after_codec_error = true;
                }
                Some(Err(err)) => {
                    warn!(error = %err, "stream guard: read failed, treating as end of stream");
                    return ReadOutcome::Failed(err);
                }
                Some(Ok(line)) => {
                    trace!(len = line.len(), "stream guard: read line");
                    return ReadOutcome::Line(line);
                }
            }
        }
    }

    /// Write `text` plus a line terminator to the output stream.
    pub async fn write(&self, text: &str) -> WriteOutcome {
        write_line(&self.output, &self.output_closed, "output", text).await
    }

    /// Write `text` plus a line terminator to the error stream.
    pub async fn write_error(&self, text: &str) -> WriteOutcome {
        write_line(&self.error, &self.error_closed, "error", text).await
    }

    /// Close the input stream and wake any parked reader. Idempotent.
    pub fn close_input(&self) {
        self.input_closed.cancel();
        // A parked reader holds the lock and wakes on the cancellation.
        if let Ok(mut guard) = self.input.try_lock() {
            guard.take();
        }
    }

    /// Shut down and drop the output stream. Idempotent.
    pub async fn close_output(&self) {
        close_writer(&self.output, &self.output_closed, "output").await;
    }

    /// Shut down and drop the error stream. Idempotent.
    pub async fn close_error(&self) {
        close_writer(&self.error, &self.error_closed, "error").await;
    }

    /// Close all three streams. Closing an already-closed stream is a no-op.
    pub async fn close(&self) {
        self.close_input();
        self.close_output().await;
        self.close_error().await;
    }

    /// `true` only when input, output, and error are all closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.input_closed.is_cancelled()
            && self.output_closed.load(Ordering::Acquire)
            && self.error_closed.load(Ordering::Acquire)
    }
}

async fn write_line(
    slot: &Mutex<Option<BoxedWriter>>,
    closed: &AtomicBool,
    stream: &'static str,
    text: &str,
) -> WriteOutcome {
    if closed.load(Ordering::Acquire) {
        debug!(stream, "stream guard: dropping write to closed stream");
        return WriteOutcome::Closed;
    }

    let mut guard = slot.lock().await;
    let Some(writer) = guard.as_mut() else {
        debug!(stream, "stream guard: dropping write to closed stream");
        return WriteOutcome::Closed;
    };

    let mut bytes = Vec::with_capacity(text.len() + 1);
    bytes.extend_from_slice(text.as_bytes());
    bytes.push(b'\n');

    let result = match writer.write_all(&bytes).await {
        Ok(()) => writer.flush().await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => {
            trace!(stream, len = text.len(), "stream guard: wrote line");
            WriteOutcome::Written
        }
        Err(err) => {
            warn!(stream, kind = ?err.kind(), error = %err, "stream guard: write failed, discarding");
            WriteOutcome::Failed(AppError::Io(err.to_string()))
        }
    }
}

async fn close_writer(slot: &Mutex<Option<BoxedWriter>>, closed: &AtomicBool, stream: &'static str) {
    closed.store(true, Ordering::Release);

    let writer = slot.lock().await.take();
    if let Some(mut writer) = writer {
        if let Err(err) = writer.shutdown().await {
            debug!(stream, error = %err, "stream guard: shutdown on close failed");
        }
    }
}
