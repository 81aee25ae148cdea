use serde::{Deserialize, Serialize};

/// Structural flag attached to a result column.
///
/// Wire form is the short code used by the backend (`"pk"`, `"nn"`, `"uq"`,
/// `"ai"`). Unknown codes are preserved in [`ColumnFlag::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnFlag {
    /// Column is part of the table's primary key
    PrimaryKey,
    /// Column is NOT NULL
    NotNull,
    /// Column has a unique constraint
    Unique,
    /// Column is auto-generated
    AutoIncrement,
    Other(String),
}

/// Flags of a single column, in wire order.
pub type ColumnFlags = Vec<ColumnFlag>;

impl From<String> for ColumnFlag {
    fn from(value: String) -> Self {
        match value.as_str() {
            "pk" => ColumnFlag::PrimaryKey,
            "nn" => ColumnFlag::NotNull,
            "uq" => ColumnFlag::Unique,
            "ai" => ColumnFlag::AutoIncrement,
            _ => ColumnFlag::Other(value),
        }
    }
}

impl From<ColumnFlag> for String {
    fn from(value: ColumnFlag) -> Self {
        match value {
            ColumnFlag::PrimaryKey => "pk".to_string(),
            ColumnFlag::NotNull => "nn".to_string(),
            ColumnFlag::Unique => "uq".to_string(),
            ColumnFlag::AutoIncrement => "ai".to_string(),
            ColumnFlag::Other(code) => code,
        }
    }
}
