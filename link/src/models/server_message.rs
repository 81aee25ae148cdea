use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::column_descriptor::ColumnDescriptor;
use super::result_kind::ResultKind;
use super::row_record::RowPayload;
use super::text_entry::TextEntry;
use crate::request_id::RequestId;

/// Inbound frame from the backend session.
///
/// # Example (JSON representation)
///
/// ```json
/// {
///   "requestId": "5f0c3e9a2b7d4f1e8a6c0b9d3e2f1a4c",
///   "subIndex": 0,
///   "isFinal": false,
///   "payload": { "kind": "rows", "rows": [{ "id": 1 }] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Request this frame answers
    pub request_id: RequestId,

    /// Result stream within the request (multi-result requests only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<u32>,

    /// Whether this is the last frame of its result stream
    #[serde(default)]
    pub is_final: bool,

    pub payload: ResponsePayload,
}

/// Typed content of an inbound frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponsePayload {
    /// A batch of tabular rows
    Rows {
        /// Column descriptors, usually present on the first batch only
        #[serde(default, skip_serializing_if = "Option::is_none")]
        columns: Option<Vec<ColumnDescriptor>>,

        #[serde(default)]
        rows: Vec<RowPayload>,

        /// Total number of rows reported by the backend
        #[serde(rename = "totalRowCount", default, skip_serializing_if = "Option::is_none")]
        total_row_count: Option<u64>,
    },

    /// Text output lines
    Text {
        #[serde(default)]
        entries: Vec<TextEntry>,
    },

    /// Graph data, replaces any previous options
    Graph { options: JsonValue },

    /// Status or error information
    Status {
        message: String,
        #[serde(rename = "isError", default)]
        is_error: bool,
    },
}

impl ResponsePayload {
    /// Result kind this payload opens when it is the first of its stream.
    pub fn kind(&self) -> ResultKind {
        match self {
            ResponsePayload::Rows { .. } => ResultKind::Tabular,
            ResponsePayload::Text { .. } => ResultKind::Text,
            ResponsePayload::Graph { .. } => ResultKind::Graph,
            ResponsePayload::Status { .. } => ResultKind::Status,
        }
    }

    /// Message of a status payload flagged as an error.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResponsePayload::Status {
                message,
                is_error: true,
            } => Some(message),
            _ => None,
        }
    }

    /// Returns true if the payload carries result data (as opposed to status).
    pub fn carries_data(&self) -> bool {
        !matches!(self, ResponsePayload::Status { .. })
    }
}
