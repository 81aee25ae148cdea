//! The execution engine: single owner of all request, result and context
//! state of one backend session.
//!
//! The engine is synchronous. Callers feed it commands and inbound frames;
//! it answers through two outboxes, outbound client messages for the backend
//! channel and [`EngineEvent`]s for observers. The session driver drains both
//! after every step.

use serde::Serialize;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use tokio::time::Instant;

use crate::accumulator::{IngestOptions, ResultAccumulator, ResultOrigin};
use crate::demux::{DemuxStats, ResponseDemux, RoutedFrame};
use crate::error::{Result, ShellLinkError};
use crate::execution_context::{ContextId, ExecutionContext, LineRange};
use crate::models::{
    ClientMessage, EngineOptions, LoadingState, ResultKey, ResultSet, ResultStatus,
};
use crate::query_shape::QueryShape;
use crate::registry::{PageTarget, RequestRegistry};
use crate::request_id::RequestId;
use crate::timeouts::EngineTimeouts;

/// Command name used by [`ExecutionRequest::query`].
pub const EXECUTE_COMMAND: &str = "execute";

/// Status message of results cut short by [`ExecutionEngine::stop`].
pub const STOPPED_MESSAGE: &str = "Execution stopped";

/// A command to send to the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionRequest {
    pub command: String,
    pub args: JsonValue,
}

impl ExecutionRequest {
    pub fn new(command: impl Into<String>, args: JsonValue) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Run a query: `{"command": "execute", "args": {"sql": ...}}`.
    pub fn query(sql: impl Into<String>) -> Self {
        let mut args = Map::new();
        args.insert("sql".to_string(), JsonValue::String(sql.into()));
        Self::new(EXECUTE_COMMAND, JsonValue::Object(args))
    }

    /// Query text carried in `args.sql`, if any.
    pub fn sql(&self) -> Option<&str> {
        self.args.get("sql").and_then(JsonValue::as_str)
    }
}

/// Something observers may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum EngineEvent {
    ContextStateChanged {
        context: ContextId,
        state: LoadingState,
    },
    /// Emitted per ingested chunk when streaming updates are enabled
    ResultUpdated { key: ResultKey },
    ResultFinalized { key: ResultKey, status: ResultStatus },
    ContextError { context: ContextId, message: String },
}

impl EngineEvent {
    /// Requisition name the event is published under.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::ContextStateChanged { .. } => "editorContextStateChanged",
            EngineEvent::ResultUpdated { .. } => "resultUpdated",
            EngineEvent::ResultFinalized { .. } => "resultFinalized",
            EngineEvent::ContextError { .. } => "showError",
        }
    }

    /// JSON payload of the event.
    pub fn to_payload(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Original command of a request whose results are still held, kept so
/// further pages can be fetched.
#[derive(Debug, Clone)]
struct IssuedCommand {
    command: String,
    args: JsonValue,
    context: Option<ContextId>,
    sql: Option<String>,
}

pub struct ExecutionEngine {
    options: EngineOptions,
    timeouts: EngineTimeouts,
    registry: RequestRegistry,
    demux: ResponseDemux,
    accumulator: ResultAccumulator,
    contexts: HashMap<ContextId, ExecutionContext>,
    next_context: u64,
    issued: HashMap<RequestId, IssuedCommand>,
    outbound: Vec<ClientMessage>,
    events: Vec<EngineEvent>,
}

impl ExecutionEngine {
    pub fn new(options: EngineOptions, timeouts: EngineTimeouts) -> Self {
        Self {
            demux: ResponseDemux::new(options.max_message_bytes),
            options,
            timeouts,
            registry: RequestRegistry::new(),
            accumulator: ResultAccumulator::new(),
            contexts: HashMap::new(),
            next_context: 1,
            issued: HashMap::new(),
            outbound: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn timeouts(&self) -> &EngineTimeouts {
        &self.timeouts
    }

    // ── Contexts ────────────────────────────────────────────────────────────

    /// Create an idle context for `source`.
    pub fn create_context(
        &mut self,
        source: impl Into<String>,
        line_range: Option<LineRange>,
    ) -> ContextId {
        let id = ContextId::new(format!("ec{}", self.next_context));
        self.next_context += 1;

        let mut context = ExecutionContext::new(id.clone(), source);
        if let Some(range) = line_range {
            context = context.with_line_range(range.start, range.end);
        }
        self.contexts.insert(id.clone(), context);
        id
    }

    /// Stop and drop a context together with its results.
    pub fn remove_context(&mut self, id: &ContextId) -> Result<()> {
        self.stop(id)?;
        self.clear_results(id)?;
        self.contexts.remove(id);
        Ok(())
    }

    /// Drop all results a context produced. A running context must be
    /// stopped first.
    pub fn clear_results(&mut self, id: &ContextId) -> Result<()> {
        let ctx = self.context_mut(id)?;
        if !ctx.can_execute() {
            return Err(ShellLinkError::ContextBusy {
                context: id.to_string(),
                state: ctx.state(),
            });
        }
        self.drop_results(id)
    }

    fn drop_results(&mut self, id: &ContextId) -> Result<()> {
        let keys = self.context_mut(id)?.clear_results();
        for key in keys {
            self.accumulator.remove(&key);
            self.release_if_unreferenced(&key.request_id);
        }
        Ok(())
    }

    fn release_if_unreferenced(&mut self, id: &RequestId) {
        let referenced = self
            .contexts
            .values()
            .any(|ctx| ctx.result_keys().iter().any(|key| &key.request_id == id));
        if !referenced && !self.registry.contains(id) {
            self.accumulator.remove_request(id);
            self.registry.release(id);
            self.issued.remove(id);
        }
    }

    /// Identifiers of all live contexts.
    pub fn context_ids(&self) -> Vec<ContextId> {
        self.contexts.keys().cloned().collect()
    }

    pub fn context(&self, id: &ContextId) -> Option<&ExecutionContext> {
        self.contexts.get(id)
    }

    pub fn context_state(&self, id: &ContextId) -> Option<LoadingState> {
        self.contexts.get(id).map(ExecutionContext::state)
    }

    fn context_mut(&mut self, id: &ContextId) -> Result<&mut ExecutionContext> {
        self.contexts
            .get_mut(id)
            .ok_or_else(|| ShellLinkError::UnknownContext(id.to_string()))
    }

    // ── Requests ────────────────────────────────────────────────────────────

    /// Submit `request` on behalf of a context. Previous results of the
    /// context are dropped.
    pub fn submit(&mut self, context: &ContextId, request: ExecutionRequest) -> Result<RequestId> {
        let deadline = Instant::now() + self.timeouts.wait_threshold;
        let id = self.registry.allocate(&request.command);

        self.context_mut(context)?.submit(id.clone(), deadline)?;
        self.drop_results(context)?;

        self.send(id.clone(), request, Some(context.clone()));
        self.events.push(EngineEvent::ContextStateChanged {
            context: context.clone(),
            state: LoadingState::Pending,
        });
        Ok(id)
    }

    /// Send a request that belongs to no context.
    pub fn issue(&mut self, request: ExecutionRequest) -> RequestId {
        let id = self.registry.allocate(&request.command);
        self.send(id.clone(), request, None);
        id
    }

    fn send(&mut self, id: RequestId, request: ExecutionRequest, context: Option<ContextId>) {
        let sql = request.sql().map(str::to_string);
        let first_page_size = self.first_page_size(&request);

        let mut args = request.args.clone();
        if let (Some(page_size), JsonValue::Object(map)) = (first_page_size, &mut args) {
            map.insert("offset".to_string(), JsonValue::from(0u64));
            map.insert("rowCount".to_string(), JsonValue::from(page_size as u64 + 1));
        }

        let entry = self
            .registry
            .track(id.clone(), request.command.clone(), args.clone(), context.clone());
        entry.sql = sql.clone();
        entry.first_page_size = first_page_size;

        self.registry.retain(id.clone());
        self.issued.insert(
            id.clone(),
            IssuedCommand {
                command: request.command.clone(),
                args: request.args.clone(),
                context,
                sql,
            },
        );
        self.outbound.push(ClientMessage::new(id, request.command, args));
    }

    /// Page size to probe the first page with. Only single queries sent with
    /// named arguments and no explicit paging of their own are paged.
    fn first_page_size(&self, request: &ExecutionRequest) -> Option<usize> {
        if request.command != EXECUTE_COMMAND {
            return None;
        }
        let args = request.args.as_object()?;
        if args.contains_key("offset") || args.contains_key("rowCount") {
            return None;
        }
        let sql = request.sql()?;
        QueryShape::parse(sql)
            .is_query()
            .then_some(self.options.page_size)
    }

    /// Drop the results of a context-free request, cancelling it and any
    /// page fetch for it that is still running.
    pub fn release_request(&mut self, id: &RequestId) {
        let mut running = self.registry.page_requests_for(id);
        running.push(id.clone());
        for request in running {
            if let Some(notice) = self.registry.cancel(&request) {
                self.outbound.push(notice);
            }
        }
        self.release_if_unreferenced(id);
    }

    /// Fetch `page` of a tabular result, replacing the rows it holds.
    pub fn fetch_page(&mut self, key: &ResultKey, page: u32) -> Result<RequestId> {
        self.fetch(key, page, false)
    }

    /// Fetch the page after the current one and append it.
    pub fn fetch_more(&mut self, key: &ResultKey) -> Result<RequestId> {
        let current = self
            .accumulator
            .get(key)
            .ok_or_else(|| ShellLinkError::ResultNotFound(key.to_string()))?
            .current_page;
        let next = current.checked_add(1).ok_or_else(|| {
            ShellLinkError::NotPageable(format!("{} has no page after {}", key, current))
        })?;
        self.fetch(key, next, true)
    }

    fn fetch(&mut self, key: &ResultKey, page: u32, append: bool) -> Result<RequestId> {
        let result = self
            .accumulator
            .get(key)
            .ok_or_else(|| ShellLinkError::ResultNotFound(key.to_string()))?;
        if !result.is_final() {
            return Err(ShellLinkError::NotPageable(format!("{} is still loading", key)));
        }
        if key.sub_index.is_some() {
            return Err(ShellLinkError::NotPageable(format!(
                "{} is one of several results of its request",
                key
            )));
        }
        let issued = self
            .issued
            .get(&key.request_id)
            .cloned()
            .ok_or_else(|| ShellLinkError::NotPageable(format!("{} has no origin command", key)))?;
        let JsonValue::Object(mut args) = issued.args else {
            return Err(ShellLinkError::NotPageable(format!(
                "{} was issued without named arguments",
                key
            )));
        };

        if let Some(context) = &issued.context {
            let ctx = self.context_mut(context)?;
            if !ctx.can_execute() {
                return Err(ShellLinkError::ContextBusy {
                    context: context.to_string(),
                    state: ctx.state(),
                });
            }
        }

        let page_size = self.options.page_size;
        // Appending continues after the rows held, whatever their page size.
        let offset = match self.accumulator.next_offset(key) {
            Some(next) if append => next,
            _ => u64::from(page) * page_size as u64,
        };
        self.accumulator.reopen_for_page(key, page, page_size, append)?;

        args.insert("offset".to_string(), JsonValue::from(offset));
        args.insert("rowCount".to_string(), JsonValue::from(page_size as u64 + 1));

        let id = self.registry.allocate(&issued.command);
        if let Some(context) = &issued.context {
            let deadline = Instant::now() + self.timeouts.wait_threshold;
            self.context_mut(context)?.submit(id.clone(), deadline)?;
            self.events.push(EngineEvent::ContextStateChanged {
                context: context.clone(),
                state: LoadingState::Pending,
            });
        }

        let args = JsonValue::Object(args);
        let entry = self
            .registry
            .track(id.clone(), issued.command.clone(), args.clone(), issued.context.clone());
        entry.sql = issued.sql.clone();
        entry.page = Some(PageTarget {
            key: key.clone(),
            page,
            page_size,
            replace_next: !append,
        });

        log::debug!(
            "[shell-link] Fetching page {} of {} ({})",
            page,
            key,
            if append { "append" } else { "replace" }
        );
        self.outbound.push(ClientMessage::new(id.clone(), issued.command, args));
        Ok(id)
    }

    /// Stop a context. Its running request is cancelled and every result
    /// still open is finalized as stopped.
    pub fn stop(&mut self, context: &ContextId) -> Result<()> {
        let ctx = self.context_mut(context)?;
        let was = ctx.state();
        let active = ctx.stop();

        if let Some(request_id) = active {
            let open = self.open_keys_of(&request_id);
            if let Some(notice) = self.registry.cancel(&request_id) {
                self.outbound.push(notice);
            }
            for key in open {
                self.finalize(&key, ResultStatus::error(STOPPED_MESSAGE));
            }
        }

        if was != LoadingState::Idle {
            self.events.push(EngineEvent::ContextStateChanged {
                context: context.clone(),
                state: LoadingState::Idle,
            });
        }
        Ok(())
    }

    /// Open results a request feeds into.
    fn open_keys_of(&self, id: &RequestId) -> Vec<ResultKey> {
        match self.registry.get(id).and_then(|request| request.page.as_ref()) {
            Some(target) => self
                .accumulator
                .get(&target.key)
                .filter(|result| !result.is_final())
                .map(|_| vec![target.key.clone()])
                .unwrap_or_default(),
            None => self.accumulator.open_keys_for(id),
        }
    }

    // ── Inbound ─────────────────────────────────────────────────────────────

    /// Process one inbound text frame. Protocol problems are logged and the
    /// frame is dropped.
    pub fn on_message(&mut self, raw: &str) {
        if let Some(frame) = self.demux.on_message(raw, &mut self.registry) {
            self.apply(frame);
        }
    }

    fn apply(&mut self, frame: RoutedFrame) {
        let RoutedFrame {
            request_id,
            key,
            sub_index,
            is_final,
            payload,
            context,
            page_request,
            replace,
            sql,
            first_page_size,
        } = frame;

        if !self.accumulator.contains(&key) {
            let origin = ResultOrigin {
                sql,
                page: 0,
                page_size: first_page_size,
            };
            self.accumulator.begin(key.clone(), payload.kind(), origin);
        }
        if let Some(ctx) = context.as_ref().and_then(|id| self.contexts.get_mut(id)) {
            ctx.add_result(key.clone());
        }

        let carries_data = payload.carries_data();
        let error = payload.error_message().map(str::to_string);

        // A refused chunk is dropped, but its terminal flags still count.
        let accepted = match self.accumulator.ingest(&key, payload, IngestOptions { replace }) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("[shell-link] Dropping frame of {}: {}", request_id, e);
                self.demux.record_rejected();
                false
            },
        };

        if accepted && carries_data {
            self.mark_loading(context.as_ref(), &request_id);
            if self.options.streaming_updates {
                self.events.push(EngineEvent::ResultUpdated { key: key.clone() });
            }
        }

        if let Some(message) = error {
            // An accepted error status already finalized the result.
            if accepted {
                if let Some(result) = self.accumulator.get(&key) {
                    self.events.push(EngineEvent::ResultFinalized {
                        key: key.clone(),
                        status: result.status.clone(),
                    });
                }
            }
            self.complete_request(&request_id, Some(message));
        } else if is_final {
            self.finalize(&key, ResultStatus::ok());
            if sub_index.is_none() || page_request {
                self.complete_request(&request_id, None);
            }
        }
    }

    fn mark_loading(&mut self, context: Option<&ContextId>, request_id: &RequestId) {
        let Some(id) = context else {
            return;
        };
        if let Some(ctx) = self.contexts.get_mut(id) {
            if ctx.active_request() == Some(request_id) && ctx.data_arrived() {
                self.events.push(EngineEvent::ContextStateChanged {
                    context: id.clone(),
                    state: LoadingState::Loading,
                });
            }
        }
    }

    fn finalize(&mut self, key: &ResultKey, status: ResultStatus) {
        match self.accumulator.finalize(key, status) {
            Ok(true) => {
                if let Some(result) = self.accumulator.get(key) {
                    self.events.push(EngineEvent::ResultFinalized {
                        key: key.clone(),
                        status: result.status.clone(),
                    });
                }
            },
            Ok(false) => {},
            Err(e) => log::debug!("[shell-link] Cannot finalize {}: {}", key, e),
        }
    }

    /// Terminal response observed: finalize what is still open, stop
    /// tracking the request and return its context to idle.
    fn complete_request(&mut self, id: &RequestId, error: Option<String>) {
        let status = match &error {
            Some(message) => ResultStatus::error(message.clone()),
            None => ResultStatus::ok(),
        };
        for key in self.open_keys_of(id) {
            self.finalize(&key, status.clone());
        }

        let Some(request) = self.registry.complete(id) else {
            return;
        };
        let Some(context) = request.context else {
            return;
        };
        let Some(ctx) = self.contexts.get_mut(&context) else {
            return;
        };
        if ctx.active_request() != Some(id) {
            return;
        }

        match ctx.finish(error.clone()) {
            Ok(()) => {
                self.events.push(EngineEvent::ContextStateChanged {
                    context: context.clone(),
                    state: LoadingState::Idle,
                });
                if let Some(message) = error {
                    self.events.push(EngineEvent::ContextError { context, message });
                }
            },
            Err(e) => log::warn!("[shell-link] {}", e),
        }
    }

    // ── Timers ──────────────────────────────────────────────────────────────

    /// Move every context whose lag deadline passed to `Waiting`.
    pub fn expire_lag(&mut self, now: Instant) -> usize {
        let mut expired = 0;
        for (id, ctx) in self.contexts.iter_mut() {
            if ctx.lag_elapsed(now) {
                expired += 1;
                self.events.push(EngineEvent::ContextStateChanged {
                    context: id.clone(),
                    state: LoadingState::Waiting,
                });
            }
        }
        expired
    }

    /// Earliest lag deadline among pending contexts.
    pub fn next_lag_deadline(&self) -> Option<Instant> {
        self.contexts
            .values()
            .filter(|ctx| ctx.state() == LoadingState::Pending)
            .filter_map(ExecutionContext::lag_deadline)
            .min()
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn result(&self, key: &ResultKey) -> Option<&ResultSet> {
        self.accumulator.get(key)
    }

    /// Results of a context in production order.
    pub fn results_for(&self, context: &ContextId) -> Result<Vec<&ResultSet>> {
        let ctx = self
            .contexts
            .get(context)
            .ok_or_else(|| ShellLinkError::UnknownContext(context.to_string()))?;
        Ok(ctx
            .result_keys()
            .iter()
            .filter_map(|key| self.accumulator.get(key))
            .collect())
    }

    /// Number of requests still awaiting a terminal response.
    pub fn outstanding_requests(&self) -> usize {
        self.registry.len()
    }

    pub fn stats(&self) -> DemuxStats {
        self.demux.stats()
    }

    // ── Outboxes ────────────────────────────────────────────────────────────

    pub fn drain_outbound(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outbound)
    }

    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }
}
