use serde::{Deserialize, Serialize};
use std::fmt;

/// Declared kind of an accumulated result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Tabular,
    Text,
    Graph,
    Status,
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultKind::Tabular => write!(f, "tabular"),
            ResultKind::Text => write!(f, "text"),
            ResultKind::Graph => write!(f, "graph"),
            ResultKind::Status => write!(f, "status"),
        }
    }
}
