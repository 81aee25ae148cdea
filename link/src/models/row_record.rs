use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::column_descriptor::ColumnDescriptor;

/// One row of a tabular result: column name to value.
pub type RowRecord = Map<String, JsonValue>;

/// A row as it arrives on the wire.
///
/// The backend sends rows either as objects keyed by column name or as
/// positional arrays ordered like the column descriptors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RowPayload {
    Record(RowRecord),
    Positional(Vec<JsonValue>),
}

impl RowPayload {
    /// Convert to a record, naming positional values after `columns`.
    /// Values without a matching column are keyed by their position.
    pub fn into_record(self, columns: &[ColumnDescriptor]) -> RowRecord {
        match self {
            RowPayload::Record(record) => record,
            RowPayload::Positional(values) => {
                let mut record = Map::with_capacity(values.len());
                for (i, value) in values.into_iter().enumerate() {
                    let key = columns
                        .get(i)
                        .map(|column| column.name.clone())
                        .unwrap_or_else(|| i.to_string());
                    record.insert(key, value);
                }
                record
            },
        }
    }
}
