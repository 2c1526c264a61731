//! Unit tests for `AppError` display format.

use rpc_stdio::{AppError, BoxError};

#[test]
fn display_carries_kind_prefix() {
    assert_eq!(AppError::Config("bad".into()).to_string(), "config: bad");
    assert_eq!(AppError::Io("broken pipe".into()).to_string(), "io: broken pipe");
    assert_eq!(AppError::Signal("unknown".into()).to_string(), "signal: unknown");
    assert_eq!(AppError::Codec("line too long".into()).to_string(), "codec: line too long");
}

#[test]
fn io_errors_convert_to_io_variant() {
    let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe gone");
    let err = AppError::from(io);
    assert!(matches!(err, AppError::Io(ref msg) if msg == "pipe gone"));
}

/// Boxed collaborator errors keep the original text, which is what ends
/// up in the internal error envelope.
#[test]
fn boxed_errors_keep_original_text() {
    let err: BoxError = "boom".into();
    assert_eq!(err.to_string(), "boom");

    let err: BoxError = Box::new(AppError::Io("closed".into()));
    assert_eq!(err.to_string(), "io: closed");
}
