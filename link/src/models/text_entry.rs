use serde::{Deserialize, Serialize};

use super::message_type::MessageType;

/// One line (or block) of text output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEntry {
    /// Message classification (info, warning, error)
    #[serde(rename = "type", default)]
    pub message_type: MessageType,

    /// Text content
    pub content: String,

    /// Index of the source statement this entry belongs to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl TextEntry {
    pub fn new(message_type: MessageType, content: impl Into<String>) -> Self {
        Self {
            message_type,
            content: content.into(),
            index: None,
        }
    }

    pub fn with_index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }
}
