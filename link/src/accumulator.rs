//! Assembly of partial response chunks into result sets.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, ShellLinkError};
use crate::models::{
    ColumnDescriptor, ResponsePayload, ResultKey, ResultKind, ResultSet, ResultStatus,
};
use crate::query_shape::QueryShape;
use crate::request_id::RequestId;

/// Where a result comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultOrigin {
    pub sql: Option<String>,
    pub page: u32,
    pub page_size: Option<usize>,
}

impl ResultOrigin {
    pub fn from_sql(sql: Option<String>) -> Self {
        Self {
            sql,
            ..Self::default()
        }
    }
}

/// Per-chunk ingest options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Clear accumulated rows (and text) before appending this chunk
    pub replace: bool,
}

impl IngestOptions {
    pub fn replace() -> Self {
        Self { replace: true }
    }
}

#[derive(Debug)]
struct Slot {
    result: ResultSet,
    shape: QueryShape,
    updatable_decided: bool,
    /// Message of the last non-error status chunk, used by the next finalize
    pending_message: Option<String>,
    /// Row index where the current page starts
    page_start: usize,
    /// Absolute backend offset of the first row held
    row_offset: u64,
    /// The current page was fetched with one extra probe row
    probe: bool,
    /// The current page received at least one data chunk
    page_received: bool,
}

/// Owns every result set of a session, keyed by [`ResultKey`].
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    slots: HashMap<ResultKey, Slot>,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a result. Returns false (and changes nothing) if the key exists.
    pub fn begin(&mut self, key: ResultKey, kind: ResultKind, origin: ResultOrigin) -> bool {
        if self.slots.contains_key(&key) {
            return false;
        }
        let probe = origin.page_size.is_some();
        let row_offset = origin
            .page_size
            .map_or(0, |size| u64::from(origin.page) * size as u64);
        let shape = origin
            .sql
            .as_deref()
            .map(QueryShape::parse)
            .unwrap_or_default();

        let mut result = ResultSet::new(key.clone(), kind);
        result.sql = origin.sql;
        result.current_page = origin.page;
        result.page_size = origin.page_size;

        self.slots.insert(
            key,
            Slot {
                result,
                shape,
                updatable_decided: false,
                pending_message: None,
                page_start: 0,
                row_offset,
                probe,
                page_received: false,
            },
        );
        true
    }

    /// Reopen a finalized tabular result to receive another page.
    ///
    /// In append mode the page starts after the rows already held; otherwise
    /// the first data chunk is expected to replace them.
    pub fn reopen_for_page(
        &mut self,
        key: &ResultKey,
        page: u32,
        page_size: usize,
        append: bool,
    ) -> Result<()> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| ShellLinkError::ResultNotFound(key.to_string()))?;
        if slot.result.kind != ResultKind::Tabular {
            return Err(ShellLinkError::NotPageable(format!(
                "{} is a {} result",
                key, slot.result.kind
            )));
        }

        slot.result.status = ResultStatus::Open;
        slot.result.current_page = page;
        slot.result.page_size = Some(page_size);
        slot.result.has_more_rows = false;
        slot.pending_message = None;
        slot.page_start = if append { slot.result.rows.len() } else { 0 };
        if !append {
            slot.row_offset = u64::from(page) * page_size as u64;
        }
        slot.probe = true;
        slot.page_received = false;
        Ok(())
    }

    /// Backend offset of the row right after the last one held.
    pub fn next_offset(&self, key: &ResultKey) -> Option<u64> {
        self.slots
            .get(key)
            .map(|slot| slot.row_offset + slot.result.rows.len() as u64)
    }

    /// Fold one chunk into the result at `key`.
    ///
    /// Late chunks (result already final) and chunks of a different kind are
    /// rejected with [`ShellLinkError::ProtocolError`].
    pub fn ingest(
        &mut self,
        key: &ResultKey,
        payload: ResponsePayload,
        options: IngestOptions,
    ) -> Result<()> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| ShellLinkError::ResultNotFound(key.to_string()))?;

        if slot.result.is_final() {
            return Err(ShellLinkError::ProtocolError(format!(
                "late {} chunk for finalized result {}",
                payload.kind(),
                key
            )));
        }

        if let ResponsePayload::Status { message, is_error } = payload {
            if is_error {
                Self::finalize_slot(slot, ResultStatus::error(message));
            } else {
                slot.pending_message = Some(message);
            }
            return Ok(());
        }

        // A result opened by a plain status message takes the kind of its
        // first data chunk.
        if slot.result.kind == ResultKind::Status {
            slot.result.kind = payload.kind();
        }
        // Rows and graphs may be followed by text output ("OK, 3 records").
        if let ResponsePayload::Text { entries } = payload {
            if options.replace && slot.result.kind == ResultKind::Text {
                slot.result.text.clear();
            }
            slot.result.text.extend(entries);
            return Ok(());
        }
        if payload.kind() != slot.result.kind {
            return Err(ShellLinkError::ProtocolError(format!(
                "{} chunk for {} result {}",
                payload.kind(),
                slot.result.kind,
                key
            )));
        }

        slot.page_received = true;
        let result = &mut slot.result;
        match payload {
            ResponsePayload::Rows {
                columns,
                rows,
                total_row_count,
            } => {
                if let Some(mut columns) = columns {
                    if result.columns.is_empty() || options.replace {
                        make_names_unique(&mut columns);
                        result.columns = columns;
                    }
                }
                if !slot.updatable_decided && !result.columns.is_empty() {
                    slot.updatable_decided = true;
                    result.updatable = slot.shape.permits_updates(&result.columns);
                    if result.updatable {
                        result.table_name = slot.shape.base_table().map(str::to_string);
                    }
                }
                if options.replace {
                    result.rows.clear();
                }
                let columns = &result.columns;
                let records: Vec<_> = rows.into_iter().map(|row| row.into_record(columns)).collect();
                result.rows.extend(records);
                if total_row_count.is_some() {
                    result.total_row_count = total_row_count;
                }
            },
            ResponsePayload::Graph { options } => {
                result.graph = Some(options);
            },
            ResponsePayload::Text { .. } | ResponsePayload::Status { .. } => {},
        }
        Ok(())
    }

    /// Mark the result terminal. Returns false if it already was.
    ///
    /// A plain `Ok` status picks up the last remembered status message and
    /// the row count. Accumulated rows are kept on error.
    pub fn finalize(&mut self, key: &ResultKey, status: ResultStatus) -> Result<bool> {
        let slot = self
            .slots
            .get_mut(key)
            .ok_or_else(|| ShellLinkError::ResultNotFound(key.to_string()))?;
        if slot.result.is_final() {
            return Ok(false);
        }
        Self::finalize_slot(slot, status);
        Ok(true)
    }

    fn finalize_slot(slot: &mut Slot, status: ResultStatus) {
        let result = &mut slot.result;

        if slot.probe && slot.page_received {
            if let Some(page_size) = result.page_size {
                let page_rows = result.rows.len().saturating_sub(slot.page_start);
                result.has_more_rows = page_rows > page_size;
                if result.has_more_rows {
                    result.rows.truncate(slot.page_start + page_size);
                }
            }
        }

        let (message, row_count) = match status {
            ResultStatus::Error { .. } => {
                result.status = status;
                return;
            },
            ResultStatus::Ok { message, row_count } => (message, row_count),
            ResultStatus::Open => (None, None),
        };
        let row_count = row_count
            .or_else(|| (result.kind == ResultKind::Tabular).then_some(result.rows.len() as u64));
        result.status = ResultStatus::Ok {
            message: message.or_else(|| slot.pending_message.take()),
            row_count,
        };
    }

    pub fn get(&self, key: &ResultKey) -> Option<&ResultSet> {
        self.slots.get(key).map(|slot| &slot.result)
    }

    pub fn contains(&self, key: &ResultKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Remove one result.
    pub fn remove(&mut self, key: &ResultKey) -> Option<ResultSet> {
        self.slots.remove(key).map(|slot| slot.result)
    }

    /// Remove every result of a request. Returns the removed keys.
    pub fn remove_request(&mut self, id: &RequestId) -> Vec<ResultKey> {
        let keys: Vec<ResultKey> = self
            .slots
            .keys()
            .filter(|key| &key.request_id == id)
            .cloned()
            .collect();
        for key in &keys {
            self.slots.remove(key);
        }
        keys
    }

    /// Keys of all open results of a request.
    pub fn open_keys_for(&self, id: &RequestId) -> Vec<ResultKey> {
        self.slots
            .iter()
            .filter(|(key, slot)| &key.request_id == id && !slot.result.is_final())
            .map(|(key, _)| key.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Rename repeated column names (`id`, `id` becomes `id`, `id_1`) so every
/// positional value keeps its own key in the row records.
fn make_names_unique(columns: &mut [ColumnDescriptor]) {
    let mut taken: HashSet<String> = columns.iter().map(|column| column.name.clone()).collect();
    let mut seen = HashSet::new();
    for column in columns.iter_mut() {
        if seen.insert(column.name.clone()) {
            continue;
        }
        let renamed = (1..)
            .map(|n| format!("{}_{}", column.name, n))
            .find(|candidate| !taken.contains(candidate))
            .unwrap_or_default();
        taken.insert(renamed.clone());
        seen.insert(renamed.clone());
        column.name = renamed;
    }
}
