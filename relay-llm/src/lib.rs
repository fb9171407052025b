//! Model types, routing, and the language-model backend seam for Relay.
//!
//! The router is a pure function over the request; backends are registered
//! per provider at startup and looked up by model id at call time.

mod backend;
mod catalog;
mod error;
mod mock;
mod openai;
mod router;
mod types;

pub use backend::{BackendRegistry, LanguageModel, provider_for_model};
pub use catalog::{
    DEFAULT_CHAT_MODEL, ModelCatalog, ModelEntry, ROUTER_SENTINELS, chat_models,
};
pub use error::{LlmError, Result};
pub use mock::ScriptedBackend;
pub use openai::OpenAiCompatBackend;
pub use router::{RouteReason, RoutedModel, route};
pub use types::{
    Attachment, ChatMessage, ChatResponse, ExecutionMode, Role, ToolCall, ToolDefinition, Usage,
};
