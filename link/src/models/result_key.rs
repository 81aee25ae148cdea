use serde::{Deserialize, Serialize};
use std::fmt;

use crate::request_id::RequestId;

/// Address of one result stream: the owning request plus an optional
/// sub-index for requests that yield several independent results
/// (multi-statement scripts, stored procedure calls).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultKey {
    pub request_id: RequestId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<u32>,
}

impl ResultKey {
    pub fn new(request_id: RequestId, sub_index: Option<u32>) -> Self {
        Self {
            request_id,
            sub_index,
        }
    }

    /// Key of the primary (un-indexed) result of a request.
    pub fn primary(request_id: RequestId) -> Self {
        Self::new(request_id, None)
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_index {
            Some(index) => write!(f, "{}#{}", self.request_id, index),
            None => write!(f, "{}", self.request_id),
        }
    }
}
