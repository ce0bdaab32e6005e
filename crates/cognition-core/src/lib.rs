//! Shared domain types for Cognition: sessions, messages, scopes, the core
//! event vocabulary, and the error kind every layer propagates.

mod cancel;
mod error;
mod events;
mod message;
mod scope;
mod session;
mod validate;

pub use cancel::CancelHandle;
pub use error::{CognitionError, Result};
pub use events::{CoreEvent, StreamEvent};
pub use message::{Message, NewMessage, Role, ToolCallRequest};
pub use scope::Scope;
pub use session::{Session, SessionConfig, SessionStatus};
pub use validate::{
    validate_message_content, validate_temperature, validate_title, validate_workspace_path,
};
