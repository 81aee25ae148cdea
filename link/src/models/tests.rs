use serde_json::json;

use super::*;
use crate::request_id::RequestId;

// ==================== EngineOptions Tests ====================

#[test]
fn test_engine_options_default() {
    let opts = EngineOptions::default();

    assert_eq!(opts.page_size, 1000, "page_size should default to 1000");
    assert!(!opts.streaming_updates, "streaming_updates should default to false");
    assert_eq!(opts.max_message_bytes, 32 * 1024 * 1024);
    assert_eq!(opts.command_channel_capacity, 256);
}

#[test]
fn test_engine_options_builder_pattern() {
    let opts = EngineOptions::new()
        .with_page_size(50)
        .with_streaming_updates(true)
        .with_max_message_bytes(1024)
        .with_command_channel_capacity(8);

    assert_eq!(opts.page_size, 50);
    assert!(opts.streaming_updates);
    assert_eq!(opts.max_message_bytes, 1024);
    assert_eq!(opts.command_channel_capacity, 8);
}

#[test]
fn test_engine_options_zero_page_size_is_clamped() {
    let opts = EngineOptions::new().with_page_size(0);
    assert_eq!(opts.page_size, 1);
}

#[test]
fn test_engine_options_partial_json_uses_defaults() {
    let opts: EngineOptions = serde_json::from_value(json!({ "page_size": 25 })).unwrap();

    assert_eq!(opts.page_size, 25);
    assert!(!opts.streaming_updates);
    assert_eq!(opts.command_channel_capacity, 256);
}

// ==================== ResponseEnvelope Tests ====================

#[test]
fn test_rows_envelope_parses() {
    let raw = json!({
        "requestId": "r1",
        "subIndex": 2,
        "isFinal": false,
        "payload": {
            "kind": "rows",
            "columns": [
                { "name": "id", "dataType": "BIGINT", "flags": ["pk", "nn"] },
                { "name": "name", "dataType": "varchar" }
            ],
            "rows": [{ "id": 1, "name": "a" }],
            "totalRowCount": 10
        }
    });

    let envelope: ResponseEnvelope = serde_json::from_value(raw).unwrap();
    assert_eq!(envelope.request_id, RequestId::new("r1"));
    assert_eq!(envelope.sub_index, Some(2));
    assert!(!envelope.is_final);

    match envelope.payload {
        ResponsePayload::Rows {
            columns,
            rows,
            total_row_count,
        } => {
            let columns = columns.expect("columns should be present");
            assert_eq!(columns.len(), 2);
            assert_eq!(columns[0].data_type, ColumnDataType::BigInt);
            assert!(columns[0].is_primary_key());
            assert!(!columns[1].is_primary_key());
            assert_eq!(rows.len(), 1);
            assert_eq!(total_row_count, Some(10));
        },
        other => panic!("expected rows payload, got {:?}", other),
    }
}

#[test]
fn test_envelope_defaults() {
    let raw = json!({
        "requestId": "r1",
        "payload": { "kind": "rows" }
    });

    let envelope: ResponseEnvelope = serde_json::from_value(raw).unwrap();
    assert!(envelope.sub_index.is_none());
    assert!(!envelope.is_final);
    assert_eq!(envelope.request_id, RequestId::new("r1"));
    assert_eq!(envelope.payload.kind(), ResultKind::Tabular);
}

#[test]
fn test_text_envelope_parses() {
    let raw = json!({
        "requestId": "r1",
        "isFinal": true,
        "payload": {
            "kind": "text",
            "entries": [
                { "type": "info", "content": "connected" },
                { "type": "error", "content": "boom", "index": 3 },
                { "content": "untyped" }
            ]
        }
    });

    let envelope: ResponseEnvelope = serde_json::from_value(raw).unwrap();
    let ResponsePayload::Text { entries } = envelope.payload else {
        panic!("expected text payload");
    };
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[1], TextEntry::new(MessageType::Error, "boom").with_index(3));
    assert_eq!(entries[2].message_type, MessageType::Info);
}

#[test]
fn test_graph_and_status_envelopes_parse() {
    let graph: ResponsePayload =
        serde_json::from_value(json!({ "kind": "graph", "options": { "series": [] } })).unwrap();
    assert_eq!(graph.kind(), ResultKind::Graph);
    assert!(graph.carries_data());

    let status: ResponsePayload = serde_json::from_value(json!({
        "kind": "status",
        "message": "Table 'x' doesn't exist",
        "isError": true
    }))
    .unwrap();
    assert_eq!(status.error_message(), Some("Table 'x' doesn't exist"));
    assert!(!status.carries_data());

    let ok: ResponsePayload =
        serde_json::from_value(json!({ "kind": "status", "message": "3 rows affected" })).unwrap();
    assert_eq!(ok.error_message(), None);
}

#[test]
fn test_unknown_payload_kind_is_rejected() {
    let result: Result<ResponseEnvelope, _> = serde_json::from_value(json!({
        "requestId": "r1",
        "payload": { "kind": "video" }
    }));
    assert!(result.is_err());
}

// ==================== Row Tests ====================

#[test]
fn test_positional_row_maps_to_column_names() {
    let columns = vec![
        ColumnDescriptor::new("id", ColumnDataType::Int),
        ColumnDescriptor::new("name", ColumnDataType::Varchar),
    ];
    let row: RowPayload = serde_json::from_value(json!([7, "x", true])).unwrap();

    let record = row.into_record(&columns);
    assert_eq!(record.get("id"), Some(&json!(7)));
    assert_eq!(record.get("name"), Some(&json!("x")));
    assert_eq!(record.get("2"), Some(&json!(true)));
}

#[test]
fn test_object_row_is_kept() {
    let row: RowPayload = serde_json::from_value(json!({ "b": 2, "a": 1 })).unwrap();
    let record = row.into_record(&[]);
    assert_eq!(record.len(), 2);
    assert_eq!(record.get("a"), Some(&json!(1)));
}

// ==================== Column Tests ====================

#[test]
fn test_column_data_type_aliases() {
    assert_eq!(ColumnDataType::from("INTEGER".to_string()), ColumnDataType::Int);
    assert_eq!(ColumnDataType::from("longtext".to_string()), ColumnDataType::Text);
    assert_eq!(ColumnDataType::from("Bool".to_string()), ColumnDataType::Boolean);
    assert!(ColumnDataType::Decimal.is_numeric());
    assert!(!ColumnDataType::Date.is_numeric());
}

#[test]
fn test_unknown_column_type_is_preserved() {
    let parsed: ColumnDataType = serde_json::from_value(json!("uuid")).unwrap();
    assert_eq!(parsed, ColumnDataType::Other("uuid".to_string()));
    assert_eq!(serde_json::to_value(&parsed).unwrap(), json!("uuid"));
}

#[test]
fn test_column_flags_wire_codes() {
    let flags: ColumnFlags = serde_json::from_value(json!(["pk", "ai", "zz"])).unwrap();
    assert_eq!(
        flags,
        vec![
            ColumnFlag::PrimaryKey,
            ColumnFlag::AutoIncrement,
            ColumnFlag::Other("zz".to_string())
        ]
    );

    let column = ColumnDescriptor::new("id", ColumnDataType::Int).primary_key();
    let value = serde_json::to_value(&column).unwrap();
    assert_eq!(value, json!({ "name": "id", "dataType": "int", "flags": ["pk"] }));
}

// ==================== ClientMessage Tests ====================

#[test]
fn test_client_message_wire_shape() {
    let msg = ClientMessage::new(RequestId::new("r9"), "execute", json!({ "sql": "SELECT 1" }));
    let value = serde_json::to_value(&msg).unwrap();

    assert_eq!(
        value,
        json!({ "requestId": "r9", "command": "execute", "args": { "sql": "SELECT 1" } })
    );
    assert!(!msg.is_cancel());
}

#[test]
fn test_cancel_message() {
    let msg = ClientMessage::cancel(RequestId::new("r9"));
    assert!(msg.is_cancel());
    assert_eq!(
        serde_json::to_value(&msg).unwrap(),
        json!({ "requestId": "r9", "command": "cancel", "args": {} })
    );
}

// ==================== State / Status Tests ====================

#[test]
fn test_loading_state_button_rules() {
    assert!(LoadingState::Idle.can_execute());
    assert!(!LoadingState::Idle.can_stop());
    for state in [LoadingState::Pending, LoadingState::Waiting, LoadingState::Loading] {
        assert!(!state.can_execute());
        assert!(state.can_stop());
    }
}

#[test]
fn test_loading_state_transitions() {
    assert!(LoadingState::Idle.can_transition_to(LoadingState::Pending));
    assert!(LoadingState::Waiting.can_transition_to(LoadingState::Loading));
    assert!(!LoadingState::Idle.can_transition_to(LoadingState::Loading));
    assert!(!LoadingState::Loading.can_transition_to(LoadingState::Waiting));
    assert!(!LoadingState::Loading.can_transition_to(LoadingState::Pending));
}

#[test]
fn test_result_status_serialization() {
    assert_eq!(serde_json::to_value(ResultStatus::Open).unwrap(), json!({ "state": "open" }));
    assert_eq!(
        serde_json::to_value(ResultStatus::error("bad")).unwrap(),
        json!({ "state": "error", "message": "bad" })
    );
    assert_eq!(ResultStatus::error("bad").error_message(), Some("bad"));
    assert!(ResultStatus::ok().error_message().is_none());
}

#[test]
fn test_result_key_display() {
    let id = RequestId::new("abc");
    assert_eq!(ResultKey::primary(id.clone()).to_string(), "abc");
    assert_eq!(ResultKey::new(id, Some(1)).to_string(), "abc#1");
}
