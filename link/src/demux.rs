//! Routing of inbound frames to the result they belong to.
//!
//! The demultiplexer never fails: malformed, oversized and orphaned frames
//! are logged, counted and dropped.

use crate::execution_context::ContextId;
use crate::models::{ResponseEnvelope, ResponsePayload, ResultKey};
use crate::registry::RequestRegistry;
use crate::request_id::RequestId;

/// Counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DemuxStats {
    pub routed: u64,
    pub malformed: u64,
    pub oversized: u64,
    /// Frames for unknown, completed or cancelled requests
    pub orphaned: u64,
    /// Frames the accumulator refused (late chunk, kind mismatch)
    pub rejected: u64,
}

impl DemuxStats {
    pub fn dropped(&self) -> u64 {
        self.malformed + self.oversized + self.orphaned + self.rejected
    }
}

/// A frame resolved to its owning request.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedFrame {
    pub request_id: RequestId,
    /// Result key the payload is accumulated under
    pub key: ResultKey,
    pub sub_index: Option<u32>,
    pub is_final: bool,
    pub payload: ResponsePayload,
    pub context: Option<ContextId>,
    pub page_request: bool,
    /// Clear the target's rows before this chunk
    pub replace: bool,
    pub sql: Option<String>,
    /// Page size of a probed first page, for the request's primary result
    pub first_page_size: Option<usize>,
}

#[derive(Debug)]
pub struct ResponseDemux {
    max_message_bytes: usize,
    stats: DemuxStats,
}

impl ResponseDemux {
    pub fn new(max_message_bytes: usize) -> Self {
        Self {
            max_message_bytes,
            stats: DemuxStats::default(),
        }
    }

    /// Parse a raw text frame.
    pub fn parse(&mut self, raw: &str) -> Option<ResponseEnvelope> {
        if raw.len() > self.max_message_bytes {
            log::warn!(
                "[shell-link] Inbound frame too large ({} bytes, limit {})",
                raw.len(),
                self.max_message_bytes
            );
            self.stats.oversized += 1;
            return None;
        }
        match serde_json::from_str::<ResponseEnvelope>(raw) {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                log::warn!("[shell-link] Failed to parse inbound frame: {}", e);
                self.stats.malformed += 1;
                None
            },
        }
    }

    /// Resolve the owning request of `envelope` and compute its result key.
    ///
    /// The one-shot replace flag of a page request is consumed by the first
    /// data-carrying frame.
    pub fn route(
        &mut self,
        envelope: ResponseEnvelope,
        registry: &mut RequestRegistry,
    ) -> Option<RoutedFrame> {
        let Some(request) = registry.get_mut(&envelope.request_id) else {
            log::debug!(
                "[shell-link] Dropping frame for unknown request {}",
                envelope.request_id
            );
            self.stats.orphaned += 1;
            return None;
        };

        let replace = envelope.payload.carries_data() && request.take_replace();
        let frame = RoutedFrame {
            key: request.route(envelope.sub_index),
            request_id: envelope.request_id,
            sub_index: envelope.sub_index,
            is_final: envelope.is_final,
            payload: envelope.payload,
            context: request.context.clone(),
            page_request: request.is_page_request(),
            replace,
            sql: request.sql.clone(),
            first_page_size: request
                .first_page_size
                .filter(|_| envelope.sub_index.is_none()),
        };
        log::debug!("[shell-link] Routed {} frame to {}", frame.payload.kind(), frame.key);
        self.stats.routed += 1;
        Some(frame)
    }

    /// Parse and route in one step.
    pub fn on_message(&mut self, raw: &str, registry: &mut RequestRegistry) -> Option<RoutedFrame> {
        let envelope = self.parse(raw)?;
        self.route(envelope, registry)
    }

    /// Count a routed frame the accumulator refused.
    pub fn record_rejected(&mut self) {
        self.stats.rejected += 1;
    }

    pub fn stats(&self) -> DemuxStats {
        self.stats
    }
}
