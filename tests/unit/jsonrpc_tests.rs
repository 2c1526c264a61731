//! Unit tests for the JSON-RPC shapes the transport emits.

use serde_json::{json, Value};

use rpc_stdio::jsonrpc::{ErrorEnvelope, OutboundMessage, INTERNAL_ERROR};

#[test]
fn internal_error_envelope_matches_wire_format() {
    let envelope = ErrorEnvelope::new(INTERNAL_ERROR, "Internal error: boom", None);

    assert_eq!(
        serde_json::to_string(&envelope).unwrap(),
        r#"{"jsonrpc":"2.0","error":{"code":-32000,"message":"Internal error: boom"},"id":null}"#
    );
}

#[test]
fn envelope_keeps_a_known_id() {
    let envelope = ErrorEnvelope::new(-32601, "Method not found: x", Some(json!(42)));
    let value: Value = serde_json::to_value(&envelope).unwrap();

    assert_eq!(value["id"], 42);
    assert_eq!(value["error"]["code"], -32601);
}

#[test]
fn text_messages_are_written_verbatim() {
    let message = OutboundMessage::from("{ \"spaced\" : true }");
    assert_eq!(message.into_line().unwrap(), "{ \"spaced\" : true }");
}

#[test]
fn structured_messages_serialize_compactly() {
    let message = OutboundMessage::from(json!({ "jsonrpc": "2.0", "result": [1, 2] }));
    let line = message.into_line().unwrap();

    assert!(!line.contains('\n'));
    assert!(!line.contains(' '));
    let back: Value = serde_json::from_str(&line).unwrap();
    assert_eq!(back["result"], json!([1, 2]));
}
