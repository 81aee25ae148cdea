//! Bookkeeping of in-flight requests.

use serde_json::Value as JsonValue;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use crate::execution_context::ContextId;
use crate::models::{ClientMessage, ResultKey};
use crate::request_id::RequestId;
use crate::util::now_ms;

/// Where the chunks of a page request go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTarget {
    /// Existing result the page folds into
    pub key: ResultKey,
    /// Zero-based page number being fetched
    pub page: u32,
    pub page_size: usize,
    /// Clear the target's rows on the first data chunk
    pub replace_next: bool,
}

/// An outstanding request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub id: RequestId,
    pub command: String,
    pub args: JsonValue,
    pub context: Option<ContextId>,
    pub submitted_at_ms: u64,
    /// Query text, when the command carries one
    pub sql: Option<String>,
    pub page: Option<PageTarget>,
    /// Page size the request was sent with when its first page is probed
    pub first_page_size: Option<usize>,
}

impl PendingRequest {
    pub fn is_page_request(&self) -> bool {
        self.page.is_some()
    }

    /// Result key a frame of this request is accumulated under.
    pub fn route(&self, sub_index: Option<u32>) -> ResultKey {
        match &self.page {
            Some(target) => target.key.clone(),
            None => ResultKey::new(self.id.clone(), sub_index),
        }
    }

    /// Consume the one-shot replace flag.
    pub fn take_replace(&mut self) -> bool {
        match self.page.as_mut() {
            Some(target) => std::mem::take(&mut target.replace_next),
            None => false,
        }
    }
}

/// Allocates request identifiers and tracks requests until a terminal
/// response or a cancellation.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    pending: HashMap<RequestId, PendingRequest>,
    retained: HashSet<RequestId>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an identifier unique among outstanding and retained requests.
    pub fn allocate(&self, command: &str) -> RequestId {
        loop {
            let id = RequestId::generate();
            if !self.pending.contains_key(&id) && !self.retained.contains(&id) {
                log::debug!("[shell-link] Allocated request {} for '{}'", id, command);
                return id;
            }
        }
    }

    /// Start tracking a request. The returned entry can be configured further
    /// (page target, query text).
    pub fn track(
        &mut self,
        id: RequestId,
        command: impl Into<String>,
        args: JsonValue,
        context: Option<ContextId>,
    ) -> &mut PendingRequest {
        let entry = PendingRequest {
            id: id.clone(),
            command: command.into(),
            args,
            context,
            submitted_at_ms: now_ms(),
            sql: None,
            page: None,
            first_page_size: None,
        };
        match self.pending.entry(id) {
            Entry::Occupied(mut slot) => {
                slot.insert(entry);
                slot.into_mut()
            },
            Entry::Vacant(slot) => slot.insert(entry),
        }
    }

    pub fn get(&self, id: &RequestId) -> Option<&PendingRequest> {
        self.pending.get(id)
    }

    pub fn get_mut(&mut self, id: &RequestId) -> Option<&mut PendingRequest> {
        self.pending.get_mut(id)
    }

    pub fn contains(&self, id: &RequestId) -> bool {
        self.pending.contains_key(id)
    }

    /// Stop tracking a request after its terminal response.
    pub fn complete(&mut self, id: &RequestId) -> Option<PendingRequest> {
        self.pending.remove(id)
    }

    /// Outstanding page fetches feeding results of `id`.
    pub fn page_requests_for(&self, id: &RequestId) -> Vec<RequestId> {
        self.pending
            .values()
            .filter(|request| {
                request
                    .page
                    .as_ref()
                    .is_some_and(|target| &target.key.request_id == id)
            })
            .map(|request| request.id.clone())
            .collect()
    }

    /// Stop tracking a request and build the cancellation notice for it.
    /// Unknown ids yield `None`.
    pub fn cancel(&mut self, id: &RequestId) -> Option<ClientMessage> {
        self.pending.remove(id).map(|request| {
            log::debug!(
                "[shell-link] Cancelled request {} ('{}')",
                request.id,
                request.command
            );
            ClientMessage::cancel(request.id)
        })
    }

    /// Mark an identifier as referenced by a retained result.
    pub fn retain(&mut self, id: RequestId) {
        self.retained.insert(id);
    }

    pub fn release(&mut self, id: &RequestId) {
        self.retained.remove(id);
    }

    pub fn is_retained(&self, id: &RequestId) -> bool {
        self.retained.contains(id)
    }

    /// Outstanding requests owned by `context`.
    pub fn outstanding_for(&self, context: &ContextId) -> Vec<RequestId> {
        self.pending
            .values()
            .filter(|request| request.context.as_ref() == Some(context))
            .map(|request| request.id.clone())
            .collect()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
