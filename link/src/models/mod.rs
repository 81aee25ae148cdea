//! Data models for the shell-link engine.
//!
//! Wire frames exchanged with the backend session, result structures handed
//! to the rendering layer, and the engine option types.

pub mod client_message;
pub mod column_data_type;
pub mod column_descriptor;
pub mod column_flag;
pub mod engine_options;
pub mod loading_state;
pub mod message_type;
pub mod result_key;
pub mod result_kind;
pub mod result_set;
pub mod result_status;
pub mod row_record;
pub mod server_message;
pub mod text_entry;

#[cfg(test)]
mod tests;

pub use client_message::{ClientMessage, CANCEL_COMMAND};
pub use column_data_type::ColumnDataType;
pub use column_descriptor::ColumnDescriptor;
pub use column_flag::{ColumnFlag, ColumnFlags};
pub use engine_options::EngineOptions;
pub use loading_state::LoadingState;
pub use message_type::MessageType;
pub use result_key::ResultKey;
pub use result_kind::ResultKind;
pub use result_set::ResultSet;
pub use result_status::ResultStatus;
pub use row_record::{RowPayload, RowRecord};
pub use server_message::{ResponseEnvelope, ResponsePayload};
pub use text_entry::TextEntry;
