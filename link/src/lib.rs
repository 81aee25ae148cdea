//! # shell-link
//!
//! Request correlation and result accumulation for an editor front-end that
//! talks to a long-lived backend session process over a duplex channel of
//! JSON text frames.
//!
//! The crate:
//!
//! - issues requests tagged with generated request identifiers
//! - reassembles multi-part, interleaved responses into typed result sets
//!   (tabular rows, text, graphs, status), including paged fetches
//! - drives one lifecycle state machine per runnable unit
//!   (`idle -> pending -> waiting -> loading -> idle`) for button enablement
//! - publishes engine events on a named-event bus ("requisitions") that any
//!   number of components can subscribe to
//!
//! ## Layers
//!
//! - [`ExecutionEngine`]: synchronous single-writer state for one session
//! - [`Session`]: tokio task that owns the engine and connects it to the
//!   transport, the lag timer and the [`RequisitionBus`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use shell_link::{
//!     EngineConfig, ExecutionRequest, RequisitionBus, Session, SessionHandlers,
//!     SessionTransport,
//! };
//! use tokio::sync::mpsc;
//!
//! # async fn example() -> shell_link::Result<()> {
//! let (to_backend, _backend_rx) = mpsc::channel(64);
//! let (_backend_tx, from_backend) = mpsc::channel(64);
//!
//! let bus = RequisitionBus::new();
//! let session = Session::start(
//!     SessionTransport::new(to_backend, from_backend),
//!     EngineConfig::default(),
//!     bus.clone(),
//!     SessionHandlers::new(),
//! );
//!
//! let context = session.create_context("SELECT * FROM actor", None).await?;
//! session
//!     .submit_execution(&context, ExecutionRequest::query("SELECT * FROM actor"))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod accumulator;
pub mod config;
pub mod demux;
pub mod engine;
pub mod error;
pub mod event_handlers;
pub mod execution_context;
pub mod models;
pub mod query_shape;
pub mod registry;
pub mod request_id;
pub mod requisitions;
pub mod session;
pub mod timeouts;
mod util;

pub use accumulator::{IngestOptions, ResultAccumulator, ResultOrigin};
pub use config::EngineConfig;
pub use demux::{DemuxStats, ResponseDemux, RoutedFrame};
pub use engine::{EngineEvent, ExecutionEngine, ExecutionRequest, EXECUTE_COMMAND, STOPPED_MESSAGE};
pub use error::{Result, ShellLinkError};
pub use event_handlers::{CloseReason, SessionHandlers, TransportError};
pub use execution_context::{ContextId, ExecutionContext, LineRange};
pub use models::{
    ClientMessage, ColumnDataType, ColumnDescriptor, ColumnFlag, EngineOptions, LoadingState,
    MessageType, ResponseEnvelope, ResponsePayload, ResultKey, ResultKind, ResultSet,
    ResultStatus, RowPayload, RowRecord, TextEntry,
};
pub use query_shape::QueryShape;
pub use registry::{PageTarget, PendingRequest, RequestRegistry};
pub use request_id::RequestId;
pub use requisitions::{handler, JobEntry, RequisitionBus, RequisitionHandler};
pub use session::{Session, SessionHandle, SessionTransport};
pub use timeouts::{EngineTimeouts, EngineTimeoutsBuilder};
