use std::io::Write;

use rpc_stdio::transport::DEFAULT_SHUTDOWN_SIGNALS;
use rpc_stdio::{AppError, TransportConfig};

#[test]
fn empty_document_uses_defaults() {
    let config = TransportConfig::from_toml_str("").expect("empty config parses");

    assert_eq!(config, TransportConfig::default());
    assert_eq!(config.max_line_bytes, 1_048_576);
    assert_eq!(config.shutdown_signals, vec!["INT", "TERM", "QUIT"]);
    assert_eq!(config.shutdown_signals, DEFAULT_SHUTDOWN_SIGNALS);
}

#[test]
fn parses_all_fields() {
    let config = TransportConfig::from_toml_str(
        r#"
max_line_bytes = 4096
shutdown_signals = ["TERM", "HUP"]
"#,
    )
    .expect("config parses");

    assert_eq!(config.max_line_bytes, 4096);
    assert_eq!(config.shutdown_signals, vec!["TERM", "HUP"]);
}

#[test]
fn empty_signal_list_is_allowed() {
    let config =
        TransportConfig::from_toml_str("shutdown_signals = []").expect("config parses");
    assert!(config.shutdown_signals.is_empty());
}

#[test]
fn zero_line_limit_is_rejected() {
    let err = TransportConfig::from_toml_str("max_line_bytes = 0").unwrap_err();
    match err {
        AppError::Config(msg) => assert!(msg.contains("max_line_bytes"), "{msg}"),
        other => panic!("expected AppError::Config, got: {other:?}"),
    }
}

#[test]
fn blank_signal_name_is_rejected() {
    let err = TransportConfig::from_toml_str(r#"shutdown_signals = ["INT", "  "]"#).unwrap_err();
    assert!(matches!(err, AppError::Config(ref msg) if msg.contains("blank")));
}

#[test]
fn unknown_keys_are_rejected() {
    let err = TransportConfig::from_toml_str("http_port = 3000").unwrap_err();
    assert!(err.to_string().starts_with("config: invalid config"));
}

#[test]
fn invalid_toml_is_a_config_error() {
    let err = TransportConfig::from_toml_str("max_line_bytes = [").unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "max_line_bytes = 512").expect("write config");

    let config = TransportConfig::load_from_path(file.path()).expect("config loads");

    assert_eq!(config.max_line_bytes, 512);
}

#[test]
fn missing_file_is_a_config_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let err = TransportConfig::load_from_path(temp.path().join("absent.toml")).unwrap_err();

    match err {
        AppError::Config(msg) => assert!(msg.contains("failed to read config"), "{msg}"),
        other => panic!("expected AppError::Config, got: {other:?}"),
    }
}
