//! Shared harness: an in-memory backend connected to a session through tokio
//! channels.

#![allow(dead_code)]

use serde_json::{json, Value as JsonValue};
use shell_link::{
    handler, ClientMessage, EngineConfig, RequestId, RequisitionBus, Session, SessionHandle,
    SessionHandlers, SessionTransport,
};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// Upper bound for any single wait in the suites.
pub const WAIT: Duration = Duration::from_secs(5);

/// The backend side of a session transport.
pub struct MockBackend {
    requests: mpsc::Receiver<String>,
    responses: Option<mpsc::Sender<String>>,
}

impl MockBackend {
    /// Next request written by the session.
    pub async fn next_request(&mut self) -> ClientMessage {
        let raw = timeout(WAIT, self.requests.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("session closed the outbound channel");
        serde_json::from_str(&raw).expect("request frame should be valid JSON")
    }

    /// Whether a request is already queued, without waiting.
    pub fn try_next_request(&mut self) -> Option<ClientMessage> {
        self.requests
            .try_recv()
            .ok()
            .map(|raw| serde_json::from_str(&raw).expect("request frame should be valid JSON"))
    }

    pub async fn send_raw(&self, raw: impl Into<String>) {
        self.responses
            .as_ref()
            .expect("backend already closed")
            .send(raw.into())
            .await
            .expect("session dropped the inbound channel");
    }

    pub async fn send(&self, frame: JsonValue) {
        self.send_raw(frame.to_string()).await;
    }

    /// Close the inbound side of the session.
    pub fn close(&mut self) {
        self.responses = None;
    }
}

pub fn rows_frame(id: &RequestId, is_final: bool, rows: JsonValue) -> JsonValue {
    json!({
        "requestId": id,
        "isFinal": is_final,
        "payload": { "kind": "rows", "rows": rows }
    })
}

pub fn status_frame(id: &RequestId, message: &str, is_error: bool) -> JsonValue {
    json!({
        "requestId": id,
        "isFinal": true,
        "payload": { "kind": "status", "message": message, "isError": is_error }
    })
}

pub fn start_session(config: EngineConfig) -> (SessionHandle, MockBackend, RequisitionBus) {
    start_session_with(config, SessionHandlers::new())
}

pub fn start_session_with(
    config: EngineConfig,
    handlers: SessionHandlers,
) -> (SessionHandle, MockBackend, RequisitionBus) {
    let (to_backend, requests) = mpsc::channel(64);
    let (responses, from_backend) = mpsc::channel(64);
    let bus = RequisitionBus::new();

    let session = Session::start(
        SessionTransport::new(to_backend, from_backend),
        config,
        bus.clone(),
        handlers,
    );
    let backend = MockBackend {
        requests,
        responses: Some(responses),
    };
    (session, backend, bus)
}

/// Stream of every payload published under `name`.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<JsonValue>,
}

impl EventStream {
    pub fn subscribe(bus: &RequisitionBus, name: &str) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        bus.register(
            name,
            handler(move |payload| {
                let tx = tx.clone();
                async move {
                    let _ = tx.send(payload);
                    Ok(true)
                }
            }),
        );
        Self { rx }
    }

    pub async fn next(&mut self) -> JsonValue {
        timeout(WAIT, self.rx.recv())
            .await
            .expect("timed out waiting for an event")
            .expect("event stream closed")
    }

    /// Skip events until one matches `predicate`.
    pub async fn until(&mut self, predicate: impl Fn(&JsonValue) -> bool) -> JsonValue {
        loop {
            let event = self.next().await;
            if predicate(&event) {
                return event;
            }
        }
    }

    /// Wait for the context state event carrying `state`.
    pub async fn until_state(&mut self, state: &str) -> JsonValue {
        self.until(|event| event["state"] == state).await
    }
}
