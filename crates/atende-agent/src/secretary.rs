//! The bounded tool-calling loop.
//!
//! One inbound patient message drives at most [`MAX_TOOL_ITERATIONS`] round
//! trips to the chat API. Tools within one round execute sequentially, each
//! result appended as a role "tool" message before the next API call.

use std::sync::Arc;

use atende_core::{error::AtendeError, traits::SchedulingBackend};
use tracing::{debug, warn};

use crate::history::sanitize_history;
use crate::openai::{ChatApi, ChatMessage};
use crate::tools::{self, ToolContext};

/// Hard ceiling on chat API round trips per inbound message.
pub const MAX_TOOL_ITERATIONS: usize = 5;

/// Sent when the loop exhausts its iterations or the model returns no text.
pub const FALLBACK_MESSAGE: &str = "Desculpe, estou com dificuldades técnicas no momento. \
     Tente novamente em instantes ou entre em contato por telefone.";

/// Outcome of one conversation turn.
#[derive(Debug, Clone)]
pub struct AgentReply {
    pub text: String,
    /// Names of the tools executed during the turn, in order.
    pub tools_used: Vec<String>,
}

/// The AI secretary: owns the chat seam, borrows the scheduling backend
/// per turn.
pub struct Secretary {
    chat: Arc<dyn ChatApi>,
}

impl Secretary {
    pub fn new(chat: Arc<dyn ChatApi>) -> Self {
        Self { chat }
    }

    /// Run one turn: replay sanitized history plus the new user message,
    /// loop over tool calls until the model answers in text or the
    /// iteration ceiling is hit.
    ///
    /// Chat API failures propagate; tool failures do not (they are fed back
    /// to the model as error values).
    pub async fn respond(
        &self,
        system_prompt: &str,
        history: Vec<ChatMessage>,
        user_text: &str,
        backend: &dyn SchedulingBackend,
        ctx: &ToolContext,
    ) -> Result<AgentReply, AtendeError> {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(sanitize_history(history));
        messages.push(ChatMessage::user(user_text));

        let tool_defs = tools::tool_defs();
        let mut tools_used = Vec::new();

        for iteration in 0..MAX_TOOL_ITERATIONS {
            let reply = self.chat.chat(&messages, &tool_defs).await?;

            let Some(tool_calls) = reply.tool_calls.clone().filter(|c| !c.is_empty()) else {
                let text = reply
                    .content
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
                return Ok(AgentReply { text, tools_used });
            };

            debug!(
                "iteration {}: model requested {} tool call(s)",
                iteration + 1,
                tool_calls.len()
            );
            messages.push(reply);

            for call in &tool_calls {
                let result =
                    tools::execute(backend, &call.function.name, &call.function.arguments, ctx)
                        .await;
                tools_used.push(call.function.name.clone());
                messages.push(ChatMessage::tool(&call.id, result.to_string()));
            }
        }

        warn!(
            "tool loop exhausted after {MAX_TOOL_ITERATIONS} iterations for conversation {}",
            ctx.conversation_id
        );
        Ok(AgentReply {
            text: FALLBACK_MESSAGE.to_string(),
            tools_used,
        })
    }
}
