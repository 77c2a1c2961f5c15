//! Chat Module
//!
//! Chat providers, the completion adapter and the services built on it.

pub mod adapter;
pub mod conversation;
pub mod hype;
pub mod provider;
pub mod providers;

pub use adapter::ChatCompletionAdapter;
pub use conversation::{ConversationReply, ConversationService};
pub use hype::{HypeChange, HypeRemover, HypeReport, HypeStrength};
pub use provider::{ChatMessage, ChatProvider, ChatRole, CompletionRequest, CompletionResponse};
