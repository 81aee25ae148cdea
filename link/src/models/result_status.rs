use serde::{Deserialize, Serialize};

/// Terminal status of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ResultStatus {
    /// Still accumulating.
    #[default]
    Open,

    /// Finished successfully.
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(rename = "rowCount", default, skip_serializing_if = "Option::is_none")]
        row_count: Option<u64>,
    },

    /// Finished with a backend-reported error. Rows received before the
    /// error stay available.
    Error { message: String },
}

impl ResultStatus {
    pub fn ok() -> Self {
        ResultStatus::Ok {
            message: None,
            row_count: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ResultStatus::Error {
            message: message.into(),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, ResultStatus::Open)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ResultStatus::Error { .. })
    }

    /// Error message, if this is an error status.
    pub fn error_message(&self) -> Option<&str> {
        match self {
            ResultStatus::Error { message } => Some(message.as_str()),
            _ => None,
        }
    }
}
