//! The AI secretary agent: OpenAI chat wire types, the closed tool registry,
//! conversation-history sanitization, system prompt assembly, and the
//! bounded tool-calling loop.

pub mod history;
pub mod openai;
pub mod prompt;
pub mod secretary;
pub mod tools;

pub use openai::{ChatApi, ChatMessage, OpenAiChat};
pub use secretary::{AgentReply, Secretary};
pub use tools::{ToolContext, ToolId};
