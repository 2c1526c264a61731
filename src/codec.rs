//! Newline-delimited framing for inbound JSON-RPC lines.
//!
//! Wraps [`tokio_util::codec::LinesCodec`] with a maximum line length so a
//! peer that never sends `\n` cannot make the reader buffer without bound.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, LinesCodec, LinesCodecError};

use crate::{AppError, Result};

/// Default maximum inbound line length: 1 MiB.
pub const MAX_LINE_BYTES: usize = 1_048_576;

/// Line codec used by [`StreamGuard`](crate::stream::StreamGuard).
///
/// # Decoder
///
/// Yields each line without its terminator (`\n` or `\r\n`). Lines longer
/// than the configured limit return [`AppError::Codec`]; the codec then
/// discards input up to the next newline so framing recovers.
#[derive(Debug)]
pub struct LineCodec(LinesCodec);

impl LineCodec {
    /// Create a codec with the default [`MAX_LINE_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_BYTES)
    }

    /// Create a codec with a custom line length limit.
    #[must_use]
    pub fn with_max_length(max_line_bytes: usize) -> Self {
        Self(LinesCodec::new_with_max_length(max_line_bytes))
    }

    /// The line length limit enforced by the decoder.
    #[must_use]
    pub fn max_length(&self) -> usize {
        self.0.max_length()
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let limit = self.max_length();
        self.0.decode(src).map_err(|e| map_codec_error(e, limit))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let limit = self.max_length();
        self.0.decode_eof(src).map_err(|e| map_codec_error(e, limit))
    }
}

fn map_codec_error(e: LinesCodecError, limit: usize) -> AppError {
    match e {
        LinesCodecError::MaxLineLengthExceeded => {
            AppError::Codec(format!("line too long: exceeded {limit} bytes"))
        }
        LinesCodecError::Io(io_err) => AppError::Io(io_err.to_string()),
    }
}
