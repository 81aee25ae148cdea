//! Session lifecycle and wire tracing hooks.
//!
//! - [`on_open`](SessionHandlers::on_open): the session loop started
//! - [`on_close`](SessionHandlers::on_close): the session loop ended
//! - [`on_error`](SessionHandlers::on_error): an outbound frame could not be
//!   written or encoded
//! - [`on_receive`](SessionHandlers::on_receive) / [`on_send`](SessionHandlers::on_send):
//!   debug hooks for every raw frame
//!
//! Hooks run synchronously on the session task; keep them short.
//!
//! # Example
//!
//! ```rust
//! use shell_link::SessionHandlers;
//!
//! let handlers = SessionHandlers::new()
//!     .on_close(|reason| println!("session closed: {}", reason))
//!     .on_send(|frame| println!("[SEND] {}", frame));
//! ```

use std::fmt;
use std::sync::Arc;

/// Why the session loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `shutdown` was requested through a handle, or every handle was dropped
    Shutdown,
    /// The backend closed the inbound channel
    InboundClosed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Shutdown => write!(f, "shutdown requested"),
            CloseReason::InboundClosed => write!(f, "inbound channel closed"),
        }
    }
}

/// Error information passed to the `on_error` hook.
#[derive(Debug, Clone)]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

pub type OnOpenCallback = Arc<dyn Fn() + Send + Sync>;
pub type OnCloseCallback = Arc<dyn Fn(CloseReason) + Send + Sync>;
pub type OnErrorCallback = Arc<dyn Fn(TransportError) + Send + Sync>;
/// Debug hook receiving every raw inbound frame.
pub type OnReceiveCallback = Arc<dyn Fn(&str) + Send + Sync>;
/// Debug hook receiving every raw outbound frame.
pub type OnSendCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional session hooks, registered with the builder methods.
#[derive(Clone, Default)]
pub struct SessionHandlers {
    pub(crate) on_open: Option<OnOpenCallback>,
    pub(crate) on_close: Option<OnCloseCallback>,
    pub(crate) on_error: Option<OnErrorCallback>,
    pub(crate) on_receive: Option<OnReceiveCallback>,
    pub(crate) on_send: Option<OnSendCallback>,
}

impl fmt::Debug for SessionHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandlers")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .field("on_send", &self.on_send.is_some())
            .finish()
    }
}

impl SessionHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_open(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_open = Some(Arc::new(f));
        self
    }

    pub fn on_close(mut self, f: impl Fn(CloseReason) + Send + Sync + 'static) -> Self {
        self.on_close = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(TransportError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw frame read from the backend,
    /// before it is parsed.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    /// Register a debug hook for every raw frame written to the backend.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Returns `true` if any hook is registered.
    pub fn has_any(&self) -> bool {
        self.on_open.is_some()
            || self.on_close.is_some()
            || self.on_error.is_some()
            || self.on_receive.is_some()
            || self.on_send.is_some()
    }

    pub(crate) fn emit_open(&self) {
        if let Some(cb) = &self.on_open {
            cb();
        }
    }

    pub(crate) fn emit_close(&self, reason: CloseReason) {
        if let Some(cb) = &self.on_close {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: TransportError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_handlers() {
        let handlers = SessionHandlers::new();
        assert!(!handlers.has_any());
        handlers.emit_open();
        handlers.emit_close(CloseReason::Shutdown);
        handlers.emit_receive("{}");
    }

    #[test]
    fn test_hooks_are_invoked() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let handlers = SessionHandlers::new().on_send(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        assert!(handlers.has_any());
        handlers.emit_send("a");
        handlers.emit_send("b");
        handlers.emit_receive("ignored");
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::InboundClosed.to_string(), "inbound channel closed");
    }
}
