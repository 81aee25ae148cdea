//! Session driver.
//!
//! One background task owns the [`ExecutionEngine`] of a backend session and
//! is its only writer. It multiplexes:
//!
//! - commands from any number of [`SessionHandle`] clones
//! - inbound frames from the backend
//! - the earliest `Pending -> Waiting` lag deadline
//!
//! After every step it writes the engine's outbound messages to the backend
//! and posts the engine's events on the [`RequisitionBus`].

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::EngineConfig;
use crate::engine::{EngineEvent, ExecutionEngine, ExecutionRequest};
use crate::error::{Result, ShellLinkError};
use crate::event_handlers::{CloseReason, SessionHandlers, TransportError};
use crate::execution_context::{ContextId, LineRange};
use crate::models::{LoadingState, ResultKey, ResultSet};
use crate::request_id::RequestId;
use crate::requisitions::RequisitionBus;

/// Sleep target when no lag deadline is armed.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365);

/// Duplex text channel to the backend session process.
#[derive(Debug)]
pub struct SessionTransport {
    /// Frames written to the backend
    pub outbound: mpsc::Sender<String>,
    /// Frames read from the backend; closing it ends the session
    pub inbound: mpsc::Receiver<String>,
}

impl SessionTransport {
    pub fn new(outbound: mpsc::Sender<String>, inbound: mpsc::Receiver<String>) -> Self {
        Self { outbound, inbound }
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from handles to the session task.
enum SessionCmd {
    CreateContext {
        source: String,
        line_range: Option<LineRange>,
        result_tx: oneshot::Sender<ContextId>,
    },
    RemoveContext {
        context: ContextId,
        result_tx: oneshot::Sender<Result<()>>,
    },
    ClearResults {
        context: ContextId,
        result_tx: oneshot::Sender<Result<()>>,
    },
    Submit {
        context: ContextId,
        request: ExecutionRequest,
        result_tx: oneshot::Sender<Result<RequestId>>,
    },
    Issue {
        request: ExecutionRequest,
        result_tx: oneshot::Sender<RequestId>,
    },
    FetchPage {
        key: ResultKey,
        page: u32,
        result_tx: oneshot::Sender<Result<RequestId>>,
    },
    FetchMore {
        key: ResultKey,
        result_tx: oneshot::Sender<Result<RequestId>>,
    },
    Stop {
        context: ContextId,
        result_tx: oneshot::Sender<Result<()>>,
    },
    ResultSnapshot {
        key: ResultKey,
        result_tx: oneshot::Sender<Option<ResultSet>>,
    },
    ContextState {
        context: ContextId,
        result_tx: oneshot::Sender<Option<LoadingState>>,
    },
    ResultsFor {
        context: ContextId,
        result_tx: oneshot::Sender<Result<Vec<ResultSet>>>,
    },
    Shutdown,
}

// ── Session (entry point) ───────────────────────────────────────────────────

pub struct Session;

impl Session {
    /// Spawn the session task. Must be called from within a tokio runtime.
    pub fn start(
        transport: SessionTransport,
        config: EngineConfig,
        bus: RequisitionBus,
        handlers: SessionHandlers,
    ) -> SessionHandle {
        let capacity = config.options.command_channel_capacity.max(1);
        let (cmd_tx, cmd_rx) = mpsc::channel::<SessionCmd>(capacity);
        let engine = ExecutionEngine::new(config.options, config.timeouts);

        let task = tokio::spawn(async move {
            session_task(cmd_rx, transport, engine, bus, handlers).await;
        });

        SessionHandle {
            cmd_tx,
            task: Some(task),
        }
    }
}

// ── SessionHandle (public handle) ───────────────────────────────────────────

/// Handle to a running session. Dropping the last handle ends the session.
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCmd>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> SessionCmd) -> Result<T> {
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(make(result_tx))
            .await
            .map_err(|_| ShellLinkError::SessionClosed)?;
        result_rx.await.map_err(|_| ShellLinkError::SessionClosed)
    }

    /// Whether the session task has exited.
    pub fn is_closed(&self) -> bool {
        self.cmd_tx.is_closed()
    }

    pub async fn create_context(
        &self,
        source: impl Into<String>,
        line_range: Option<LineRange>,
    ) -> Result<ContextId> {
        let source = source.into();
        self.call(|result_tx| SessionCmd::CreateContext {
            source,
            line_range,
            result_tx,
        })
        .await
    }

    pub async fn remove_context(&self, context: &ContextId) -> Result<()> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::RemoveContext { context, result_tx })
            .await?
    }

    pub async fn clear_results(&self, context: &ContextId) -> Result<()> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::ClearResults { context, result_tx })
            .await?
    }

    /// Submit a request for a context. Fails with
    /// [`ShellLinkError::ContextBusy`] unless the context is idle.
    pub async fn submit_execution(
        &self,
        context: &ContextId,
        request: ExecutionRequest,
    ) -> Result<RequestId> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::Submit {
            context,
            request,
            result_tx,
        })
        .await?
    }

    /// Send a request that belongs to no context.
    pub async fn issue(&self, request: ExecutionRequest) -> Result<RequestId> {
        self.call(|result_tx| SessionCmd::Issue { request, result_tx })
            .await
    }

    pub async fn fetch_page(&self, key: &ResultKey, page: u32) -> Result<RequestId> {
        let key = key.clone();
        self.call(|result_tx| SessionCmd::FetchPage {
            key,
            page,
            result_tx,
        })
        .await?
    }

    pub async fn fetch_more(&self, key: &ResultKey) -> Result<RequestId> {
        let key = key.clone();
        self.call(|result_tx| SessionCmd::FetchMore { key, result_tx })
            .await?
    }

    pub async fn stop(&self, context: &ContextId) -> Result<()> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::Stop { context, result_tx })
            .await?
    }

    /// Current snapshot of a result.
    pub async fn result_snapshot(&self, key: &ResultKey) -> Result<Option<ResultSet>> {
        let key = key.clone();
        self.call(|result_tx| SessionCmd::ResultSnapshot { key, result_tx })
            .await
    }

    pub async fn context_state(&self, context: &ContextId) -> Result<Option<LoadingState>> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::ContextState { context, result_tx })
            .await
    }

    /// Snapshots of all results of a context, in production order.
    pub async fn results_for(&self, context: &ContextId) -> Result<Vec<ResultSet>> {
        let context = context.clone();
        self.call(|result_tx| SessionCmd::ResultsFor { context, result_tx })
            .await?
    }

    /// Stop running contexts, flush pending frames and wait for the session
    /// task to exit.
    pub async fn shutdown(mut self) {
        let _ = self.cmd_tx.send(SessionCmd::Shutdown).await;
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Clone for SessionHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            task: None,
        }
    }
}

// ── Background session task ─────────────────────────────────────────────────

async fn session_task(
    mut cmd_rx: mpsc::Receiver<SessionCmd>,
    transport: SessionTransport,
    mut engine: ExecutionEngine,
    bus: RequisitionBus,
    handlers: SessionHandlers,
) {
    let SessionTransport {
        outbound,
        mut inbound,
    } = transport;

    log::info!("[shell-link] Session started");
    handlers.emit_open();

    let reason = loop {
        let lag_deadline = engine.next_lag_deadline();
        let lag_sleep =
            tokio::time::sleep_until(lag_deadline.unwrap_or_else(|| Instant::now() + FAR_FUTURE));
        tokio::pin!(lag_sleep);

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(SessionCmd::Shutdown) | None => {
                        for context in engine.context_ids() {
                            if let Err(e) = engine.stop(&context) {
                                log::debug!("[shell-link] Stop on shutdown failed: {}", e);
                            }
                        }
                        flush(&mut engine, &outbound, &bus, &handlers).await;
                        break CloseReason::Shutdown;
                    },
                    Some(cmd) => handle_command(&mut engine, cmd),
                }
            }

            frame = inbound.recv() => {
                match frame {
                    Some(text) => {
                        handlers.emit_receive(&text);
                        engine.on_message(&text);
                    },
                    None => break CloseReason::InboundClosed,
                }
            }

            _ = &mut lag_sleep, if lag_deadline.is_some() => {
                engine.expire_lag(Instant::now());
            }
        }

        flush(&mut engine, &outbound, &bus, &handlers).await;
    };

    log::info!("[shell-link] Session closed: {}", reason);
    handlers.emit_close(reason);
}

fn handle_command(engine: &mut ExecutionEngine, cmd: SessionCmd) {
    match cmd {
        SessionCmd::CreateContext {
            source,
            line_range,
            result_tx,
        } => {
            let _ = result_tx.send(engine.create_context(source, line_range));
        },
        SessionCmd::RemoveContext { context, result_tx } => {
            let _ = result_tx.send(engine.remove_context(&context));
        },
        SessionCmd::ClearResults { context, result_tx } => {
            let _ = result_tx.send(engine.clear_results(&context));
        },
        SessionCmd::Submit {
            context,
            request,
            result_tx,
        } => {
            let _ = result_tx.send(engine.submit(&context, request));
        },
        SessionCmd::Issue { request, result_tx } => {
            let _ = result_tx.send(engine.issue(request));
        },
        SessionCmd::FetchPage {
            key,
            page,
            result_tx,
        } => {
            let _ = result_tx.send(engine.fetch_page(&key, page));
        },
        SessionCmd::FetchMore { key, result_tx } => {
            let _ = result_tx.send(engine.fetch_more(&key));
        },
        SessionCmd::Stop { context, result_tx } => {
            let _ = result_tx.send(engine.stop(&context));
        },
        SessionCmd::ResultSnapshot { key, result_tx } => {
            let _ = result_tx.send(engine.result(&key).cloned());
        },
        SessionCmd::ContextState { context, result_tx } => {
            let _ = result_tx.send(engine.context_state(&context));
        },
        SessionCmd::ResultsFor { context, result_tx } => {
            let results = engine
                .results_for(&context)
                .map(|results| results.into_iter().cloned().collect());
            let _ = result_tx.send(results);
        },
        SessionCmd::Shutdown => {},
    }
}

/// Write pending outbound messages and publish pending events.
async fn flush(
    engine: &mut ExecutionEngine,
    outbound: &mpsc::Sender<String>,
    bus: &RequisitionBus,
    handlers: &SessionHandlers,
) {
    for message in engine.drain_outbound() {
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                log::warn!("[shell-link] Failed to encode request {}: {}", message.request_id, e);
                handlers.emit_error(TransportError::new(e.to_string()));
                continue;
            },
        };
        handlers.emit_send(&text);
        if outbound.send(text).await.is_err() {
            log::warn!(
                "[shell-link] Outbound channel closed, request {} not sent",
                message.request_id
            );
            handlers.emit_error(TransportError::new("Outbound channel closed"));
        }
    }

    for event in engine.drain_events() {
        publish(bus, event);
    }
}

fn publish(bus: &RequisitionBus, event: EngineEvent) {
    match event.to_payload() {
        Ok(payload) => bus.post(event.name(), payload),
        Err(e) => log::warn!("[shell-link] Failed to encode {} event: {}", event.name(), e),
    }
}
