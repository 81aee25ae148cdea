use serde::{Deserialize, Serialize};

/// Engine-level options.
///
/// Separate from [`EngineTimeouts`](crate::EngineTimeouts), which holds the
/// lag threshold of the execution state machine.
///
/// # Example
///
/// ```rust
/// use shell_link::EngineOptions;
///
/// let options = EngineOptions::default()
///     .with_page_size(500)
///     .with_streaming_updates(true);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Rows per page for paged fetches
    /// Default: 1000
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Emit a result update for every ingested chunk, not only on finalize
    /// Default: false
    #[serde(default)]
    pub streaming_updates: bool,

    /// Inbound frames larger than this are dropped
    /// Default: 32 MiB
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,

    /// Capacity of the session command channel
    /// Default: 256
    #[serde(default = "default_command_channel_capacity")]
    pub command_channel_capacity: usize,
}

fn default_page_size() -> usize {
    1000
}

fn default_max_message_bytes() -> usize {
    32 * 1024 * 1024
}

fn default_command_channel_capacity() -> usize {
    256
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            streaming_updates: false,
            max_message_bytes: default_max_message_bytes(),
            command_channel_capacity: default_command_channel_capacity(),
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size. Zero is clamped to one.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_streaming_updates(mut self, enabled: bool) -> Self {
        self.streaming_updates = enabled;
        self
    }

    pub fn with_max_message_bytes(mut self, limit: usize) -> Self {
        self.max_message_bytes = limit;
        self
    }

    pub fn with_command_channel_capacity(mut self, capacity: usize) -> Self {
        self.command_channel_capacity = capacity.max(1);
        self
    }
}
