pub mod ollama;
pub mod provider;
pub mod types;

pub use provider::LlmProvider;
pub use types::{ChatMessage, LlmReply};
