use serde::{Deserialize, Serialize};

/// Classification of a text output entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Info,
    Warning,
    Error,
}
