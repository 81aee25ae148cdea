use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::column_descriptor::ColumnDescriptor;
use super::result_key::ResultKey;
use super::result_kind::ResultKind;
use super::result_status::ResultStatus;
use super::row_record::RowRecord;
use super::text_entry::TextEntry;

/// Accumulated result of one result stream.
///
/// Instances are owned by the accumulator; consumers receive clones as
/// snapshots. Which fields are populated depends on [`ResultSet::kind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub key: ResultKey,
    pub kind: ResultKind,

    /// Query text the result was produced from, if known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,

    #[serde(default)]
    pub rows: Vec<RowRecord>,

    #[serde(default)]
    pub text: Vec<TextEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graph: Option<JsonValue>,

    /// Zero-based page currently held
    pub current_page: u32,

    /// Page size of paged fetches, `None` for unpaged results
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,

    /// Whether the backend has rows beyond the current page
    pub has_more_rows: bool,

    /// Whether rows may be edited and written back to a base table
    pub updatable: bool,

    /// The single base table, when the query shape traces back to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_row_count: Option<u64>,

    pub status: ResultStatus,
}

impl ResultSet {
    pub fn new(key: ResultKey, kind: ResultKind) -> Self {
        Self {
            key,
            kind,
            sql: None,
            columns: Vec::new(),
            rows: Vec::new(),
            text: Vec::new(),
            graph: None,
            current_page: 0,
            page_size: None,
            has_more_rows: false,
            updatable: false,
            table_name: None,
            total_row_count: None,
            status: ResultStatus::Open,
        }
    }

    /// Returns true once the result has been finalized.
    pub fn is_final(&self) -> bool {
        !self.status.is_open()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}
