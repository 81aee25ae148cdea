//! Named-event publish/subscribe hub ("requisitions").
//!
//! Any number of components register async handlers under an event name.
//! A requisition runs every handler of its name in registration order, one
//! after another, and resolves to `true` if at least one of them reported
//! that it handled the request.
//!
//! Deliveries of the same name are serialized through a per-name queue
//! drained by one lazily spawned tokio task. The task exits once its queue
//! runs empty and the next delivery spawns a fresh one. Enqueueing happens eagerly when
//! [`RequisitionBus::execute`] or [`RequisitionBus::post`] is called, so a
//! handler that issues a requisition of its own name gets it delivered after
//! the current delivery completes. Awaiting such a nested `execute` from
//! inside the handler would wait on itself; spawn it or use `post` instead.
//!
//! # Example
//!
//! ```rust,no_run
//! use shell_link::{handler, RequisitionBus};
//! use serde_json::json;
//!
//! # async fn example() {
//! let bus = RequisitionBus::new();
//! bus.register(
//!     "showError",
//!     handler(|payload| async move {
//!         eprintln!("error: {}", payload);
//!         Ok(true)
//!     }),
//! );
//!
//! let handled = bus.execute("showError", json!({ "message": "boom" })).await;
//! assert!(handled);
//! # }
//! ```

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::{Mutex, RwLock};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};

use crate::error::Result;

/// An async requisition handler. Resolves to `Ok(true)` when it handled the
/// request.
pub type RequisitionHandler =
    Arc<dyn Fn(JsonValue) -> BoxFuture<'static, Result<bool>> + Send + Sync>;

/// Wrap an async closure as a [`RequisitionHandler`].
pub fn handler<F, Fut>(f: F) -> RequisitionHandler
where
    F: Fn(JsonValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<bool>> + Send + 'static,
{
    Arc::new(move |payload| f(payload).boxed())
}

/// One step of [`RequisitionBus::execute_job`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobEntry {
    pub name: String,
    pub payload: JsonValue,
}

impl JobEntry {
    pub fn new(name: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }
}

struct Delivery {
    payload: JsonValue,
    reply: Option<oneshot::Sender<bool>>,
}

#[derive(Default)]
struct BusInner {
    handlers: RwLock<HashMap<String, Vec<RequisitionHandler>>>,
    queues: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
}

/// Cheaply cloneable handle to a requisition hub.
#[derive(Clone, Default)]
pub struct RequisitionBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for RequisitionBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let handlers = self.inner.handlers.read();
        f.debug_struct("RequisitionBus")
            .field("events", &handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn same_handler(a: &RequisitionHandler, b: &RequisitionHandler) -> bool {
    Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
}

impl RequisitionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `name`. Registering the same handler twice for
    /// one name is a no-op that returns false.
    pub fn register(&self, name: impl Into<String>, handler: RequisitionHandler) -> bool {
        let mut handlers = self.inner.handlers.write();
        let list = handlers.entry(name.into()).or_default();
        if list.iter().any(|existing| same_handler(existing, &handler)) {
            return false;
        }
        list.push(handler);
        true
    }

    /// Remove `handler` from `name`. Unknown pairs are ignored.
    pub fn unregister(&self, name: &str, handler: &RequisitionHandler) -> bool {
        let mut handlers = self.inner.handlers.write();
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let before = list.len();
        list.retain(|existing| !same_handler(existing, handler));
        let removed = list.len() != before;
        if list.is_empty() {
            handlers.remove(name);
        }
        removed
    }

    /// Remove every handler of `name`.
    pub fn unregister_all(&self, name: &str) {
        self.inner.handlers.write().remove(name);
    }

    /// Remove every handler of every name.
    pub fn clear(&self) {
        self.inner.handlers.write().clear();
    }

    /// Number of handlers registered for `name`.
    pub fn registrations(&self, name: &str) -> usize {
        self.inner
            .handlers
            .read()
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Run the handlers of `name` with `payload`.
    ///
    /// The delivery is queued before this returns; the future resolves once
    /// it ran. Resolves to `false` when no handler is registered or none
    /// handled the request.
    pub fn execute(
        &self,
        name: impl Into<String>,
        payload: JsonValue,
    ) -> impl Future<Output = bool> + Send + 'static {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.enqueue(
            name.into(),
            Delivery {
                payload,
                reply: Some(reply_tx),
            },
        );
        async move { reply_rx.await.unwrap_or(false) }
    }

    /// Queue a requisition without waiting for it.
    pub fn post(&self, name: impl Into<String>, payload: JsonValue) {
        self.enqueue(
            name.into(),
            Delivery {
                payload,
                reply: None,
            },
        );
    }

    /// Run a list of requisitions one after another. Resolves to `true` if
    /// every one of them was handled.
    pub async fn execute_job(&self, entries: Vec<JobEntry>) -> bool {
        let mut all_handled = true;
        for entry in entries {
            if !self.execute(entry.name, entry.payload).await {
                all_handled = false;
            }
        }
        all_handled
    }

    fn enqueue(&self, name: String, delivery: Delivery) {
        let mut queues = self.inner.queues.lock();

        let delivery = match queues.get(&name) {
            Some(tx) => match tx.send(delivery) {
                Ok(()) => return,
                // Worker gone, take the delivery back and respawn.
                Err(mpsc::error::SendError(delivery)) => delivery,
            },
            None => delivery,
        };

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                log::warn!(
                    "[shell-link] No tokio runtime, dropping requisition '{}'",
                    name
                );
                return;
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so this cannot fail.
        let _ = tx.send(delivery);
        queues.insert(name.clone(), tx);
        runtime.spawn(run_queue(name, Arc::downgrade(&self.inner), rx));
    }
}

async fn run_queue(name: String, bus: Weak<BusInner>, mut rx: mpsc::UnboundedReceiver<Delivery>) {
    let mut next = rx.recv().await;
    while let Some(delivery) = next {
        let Some(inner) = bus.upgrade() else {
            break;
        };
        let handlers: Vec<RequisitionHandler> =
            inner.handlers.read().get(&name).cloned().unwrap_or_default();
        drop(inner);
        let handled = dispatch(&name, &handlers, delivery.payload).await;
        if let Some(reply) = delivery.reply {
            let _ = reply.send(handled);
        }

        next = match rx.try_recv() {
            Ok(delivery) => Some(delivery),
            Err(mpsc::error::TryRecvError::Empty) => retire(&name, &bus, &mut rx),
            Err(mpsc::error::TryRecvError::Disconnected) => None,
        };
    }
    log::debug!("[shell-link] Requisition queue '{}' stopped", name);
}

/// Unlist an idle queue. Enqueueing holds the same lock, so a delivery
/// either lands before the second check or finds no queue and respawns.
fn retire(
    name: &str,
    bus: &Weak<BusInner>,
    rx: &mut mpsc::UnboundedReceiver<Delivery>,
) -> Option<Delivery> {
    let inner = bus.upgrade()?;
    let mut queues = inner.queues.lock();
    if let Ok(delivery) = rx.try_recv() {
        return Some(delivery);
    }
    queues.remove(name);
    None
}

#[cfg(test)]
impl RequisitionBus {
    fn live_queues(&self) -> usize {
        self.inner.queues.lock().len()
    }
}

async fn dispatch(name: &str, handlers: &[RequisitionHandler], payload: JsonValue) -> bool {
    let mut handled = false;
    for (index, handler) in handlers.iter().enumerate() {
        let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(payload.clone()))) {
            Ok(future) => future,
            Err(_) => {
                log::error!("[shell-link] Handler #{} for '{}' panicked", index, name);
                continue;
            },
        };
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(true)) => handled = true,
            Ok(Ok(false)) => {},
            Ok(Err(e)) => {
                log::warn!("[shell-link] Handler #{} for '{}' failed: {}", index, name, e);
            },
            Err(_) => {
                log::error!("[shell-link] Handler #{} for '{}' panicked", index, name);
            },
        }
    }
    handled
}
