use serde::{Deserialize, Serialize};

use super::column_data_type::ColumnDataType;
use super::column_flag::{ColumnFlag, ColumnFlags};

/// A column in a tabular result.
///
/// # Example (JSON representation)
///
/// ```json
/// {
///   "name": "id",
///   "dataType": "bigint",
///   "flags": ["pk", "nn"]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDescriptor {
    /// Column name, also the key used in row records
    pub name: String,

    /// Semantic data type
    pub data_type: ColumnDataType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<ColumnFlags>,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, data_type: ColumnDataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            flags: None,
        }
    }

    /// Mark this column as part of the primary key.
    pub fn primary_key(mut self) -> Self {
        self.flags
            .get_or_insert_with(Vec::new)
            .push(ColumnFlag::PrimaryKey);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.flags
            .as_ref()
            .is_some_and(|flags| flags.contains(&ColumnFlag::PrimaryKey))
    }
}
