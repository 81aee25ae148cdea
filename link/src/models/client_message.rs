use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use crate::request_id::RequestId;

/// Command name of the best-effort cancellation notice.
pub const CANCEL_COMMAND: &str = "cancel";

/// Outbound request frame.
///
/// # Example (JSON representation)
///
/// ```json
/// {
///   "requestId": "5f0c3e9a2b7d4f1e8a6c0b9d3e2f1a4c",
///   "command": "execute",
///   "args": { "sql": "SELECT * FROM t" }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub request_id: RequestId,
    pub command: String,
    #[serde(default = "empty_args")]
    pub args: JsonValue,
}

fn empty_args() -> JsonValue {
    json!({})
}

impl ClientMessage {
    pub fn new(request_id: RequestId, command: impl Into<String>, args: JsonValue) -> Self {
        Self {
            request_id,
            command: command.into(),
            args,
        }
    }

    /// Cancellation notice for an in-flight request.
    pub fn cancel(request_id: RequestId) -> Self {
        Self::new(request_id, CANCEL_COMMAND, empty_args())
    }

    pub fn is_cancel(&self) -> bool {
        self.command == CANCEL_COMMAND
    }
}
