//! Lifecycle state of one runnable unit (notebook block, script, page).

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

use crate::error::{Result, ShellLinkError};
use crate::models::{LoadingState, ResultKey};
use crate::request_id::RequestId;
use crate::util::now_ms;

/// Identifier of an execution context (`ec1`, `ec2`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// One-based inclusive line range of the source text a context covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub start: u32,
    pub end: u32,
}

/// Execution state of a runnable unit.
///
/// Transitions are validated against [`LoadingState::can_transition_to`];
/// the only ones reachable from outside are `submit`, `lag_elapsed`,
/// `data_arrived`, `finish` and `stop`.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    id: ContextId,
    state: LoadingState,
    source: String,
    line_range: Option<LineRange>,
    result_keys: Vec<ResultKey>,
    active_request: Option<RequestId>,
    submitted_at_ms: Option<u64>,
    completed_at_ms: Option<u64>,
    lag_deadline: Option<Instant>,
    last_error: Option<String>,
}

impl ExecutionContext {
    pub fn new(id: ContextId, source: impl Into<String>) -> Self {
        Self {
            id,
            state: LoadingState::Idle,
            source: source.into(),
            line_range: None,
            result_keys: Vec::new(),
            active_request: None,
            submitted_at_ms: None,
            completed_at_ms: None,
            lag_deadline: None,
            last_error: None,
        }
    }

    pub fn with_line_range(mut self, start: u32, end: u32) -> Self {
        self.line_range = Some(LineRange { start, end });
        self
    }

    pub fn id(&self) -> &ContextId {
        &self.id
    }

    pub fn state(&self) -> LoadingState {
        self.state
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_range(&self) -> Option<LineRange> {
        self.line_range
    }

    pub fn result_keys(&self) -> &[ResultKey] {
        &self.result_keys
    }

    pub fn active_request(&self) -> Option<&RequestId> {
        self.active_request.as_ref()
    }

    pub fn submitted_at_ms(&self) -> Option<u64> {
        self.submitted_at_ms
    }

    pub fn completed_at_ms(&self) -> Option<u64> {
        self.completed_at_ms
    }

    pub fn lag_deadline(&self) -> Option<Instant> {
        self.lag_deadline
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn can_execute(&self) -> bool {
        self.state.can_execute()
    }

    pub fn can_stop(&self) -> bool {
        self.state.can_stop()
    }

    fn transition(&mut self, to: LoadingState) -> Result<()> {
        if !self.state.can_transition_to(to) {
            return Err(ShellLinkError::InvalidTransition {
                context: self.id.to_string(),
                from: self.state,
                to,
            });
        }
        log::debug!("[shell-link] {}: {} -> {}", self.id, self.state, to);
        self.state = to;
        Ok(())
    }

    /// `Idle -> Pending`. Rejected with [`ShellLinkError::ContextBusy`] in any
    /// other state, leaving the context untouched.
    pub fn submit(&mut self, request: RequestId, lag_deadline: Instant) -> Result<()> {
        if !self.state.can_execute() {
            return Err(ShellLinkError::ContextBusy {
                context: self.id.to_string(),
                state: self.state,
            });
        }
        self.transition(LoadingState::Pending)?;
        self.active_request = Some(request);
        self.submitted_at_ms = Some(now_ms());
        self.completed_at_ms = None;
        self.lag_deadline = Some(lag_deadline);
        self.last_error = None;
        Ok(())
    }

    /// `Pending -> Waiting` once the lag deadline has passed. Returns true if
    /// the state changed.
    pub fn lag_elapsed(&mut self, now: Instant) -> bool {
        match self.lag_deadline {
            Some(deadline) if self.state == LoadingState::Pending && deadline <= now => {
                self.lag_deadline = None;
                self.transition(LoadingState::Waiting).is_ok()
            },
            _ => false,
        }
    }

    /// `{Pending, Waiting} -> Loading` on the first data chunk. Returns true if
    /// the state changed.
    pub fn data_arrived(&mut self) -> bool {
        match self.state {
            LoadingState::Pending | LoadingState::Waiting => {
                self.lag_deadline = None;
                self.transition(LoadingState::Loading).is_ok()
            },
            LoadingState::Idle | LoadingState::Loading => false,
        }
    }

    /// Busy state `-> Idle` after the terminal response.
    pub fn finish(&mut self, error: Option<String>) -> Result<()> {
        self.transition(LoadingState::Idle)?;
        self.active_request = None;
        self.lag_deadline = None;
        self.completed_at_ms = Some(now_ms());
        self.last_error = error;
        Ok(())
    }

    /// Any state `-> Idle`. Returns the request that was running, which the
    /// caller cancels.
    pub fn stop(&mut self) -> Option<RequestId> {
        if self.state != LoadingState::Idle {
            log::debug!("[shell-link] {}: {} -> idle (stopped)", self.id, self.state);
            self.state = LoadingState::Idle;
            self.completed_at_ms = Some(now_ms());
        }
        self.lag_deadline = None;
        self.active_request.take()
    }

    /// Remember a result produced by this context.
    pub fn add_result(&mut self, key: ResultKey) {
        if !self.result_keys.contains(&key) {
            self.result_keys.push(key);
        }
    }

    /// Forget all results. Returns the keys that were held.
    pub fn clear_results(&mut self) -> Vec<ResultKey> {
        std::mem::take(&mut self.result_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn context() -> ExecutionContext {
        ExecutionContext::new(ContextId::new("ec1"), "SELECT 1")
    }

    #[test]
    fn test_happy_path() {
        let start = Instant::now();
        let mut ctx = context();
        assert!(ctx.can_execute());

        ctx.submit(RequestId::new("r1"), start + Duration::from_millis(500)).unwrap();
        assert_eq!(ctx.state(), LoadingState::Pending);
        assert!(ctx.can_stop());
        assert_eq!(ctx.active_request(), Some(&RequestId::new("r1")));

        assert!(!ctx.lag_elapsed(start + Duration::from_millis(100)));
        assert!(ctx.lag_elapsed(start + Duration::from_millis(500)));
        assert_eq!(ctx.state(), LoadingState::Waiting);

        assert!(ctx.data_arrived());
        assert_eq!(ctx.state(), LoadingState::Loading);
        assert!(!ctx.data_arrived());

        ctx.finish(None).unwrap();
        assert_eq!(ctx.state(), LoadingState::Idle);
        assert!(ctx.active_request().is_none());
        assert!(ctx.completed_at_ms().is_some());
    }

    #[test]
    fn test_data_before_lag_skips_waiting() {
        let start = Instant::now();
        let mut ctx = context();
        ctx.submit(RequestId::new("r1"), start + Duration::from_millis(500)).unwrap();

        assert!(ctx.data_arrived());
        assert!(!ctx.lag_elapsed(start + Duration::from_secs(5)));
        assert_eq!(ctx.state(), LoadingState::Loading);
    }

    #[test]
    fn test_submit_while_busy_is_rejected() {
        let mut ctx = context();
        ctx.submit(RequestId::new("r1"), Instant::now()).unwrap();

        let err = ctx.submit(RequestId::new("r2"), Instant::now()).unwrap_err();
        assert!(matches!(
            err,
            ShellLinkError::ContextBusy {
                state: LoadingState::Pending,
                ..
            }
        ));
        assert_eq!(ctx.active_request(), Some(&RequestId::new("r1")));
    }

    #[test]
    fn test_finish_from_idle_is_invalid() {
        let mut ctx = context();
        let err = ctx.finish(None).unwrap_err();
        assert!(matches!(
            err,
            ShellLinkError::InvalidTransition {
                from: LoadingState::Idle,
                to: LoadingState::Idle,
                ..
            }
        ));
    }

    #[test]
    fn test_stop_from_any_state() {
        let mut ctx = context();
        assert!(ctx.stop().is_none());

        ctx.submit(RequestId::new("r1"), Instant::now()).unwrap();
        ctx.data_arrived();
        assert_eq!(ctx.stop(), Some(RequestId::new("r1")));
        assert_eq!(ctx.state(), LoadingState::Idle);
        assert!(ctx.can_execute());
    }

    #[test]
    fn test_finish_records_error() {
        let mut ctx = context();
        ctx.submit(RequestId::new("r1"), Instant::now()).unwrap();
        ctx.finish(Some("syntax error".to_string())).unwrap();
        assert_eq!(ctx.last_error(), Some("syntax error"));

        ctx.submit(RequestId::new("r2"), Instant::now()).unwrap();
        assert!(ctx.last_error().is_none());
    }

    #[test]
    fn test_results_deduplicated() {
        let mut ctx = context();
        let key = ResultKey::primary(RequestId::new("r1"));
        ctx.add_result(key.clone());
        ctx.add_result(key.clone());
        assert_eq!(ctx.result_keys(), &[key.clone()]);
        assert_eq!(ctx.clear_results(), vec![key]);
        assert!(ctx.result_keys().is_empty());
    }
}
