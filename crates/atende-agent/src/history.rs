//! Sanitization of stored conversation history before replay to the LLM.
//!
//! Chat APIs reject a history in which an assistant message requests tool
//! calls but the matching tool results are missing, or a tool result appears
//! with no preceding request. Stored history can end up in either state when
//! a turn was interrupted mid-loop, so everything after the last complete
//! exchange gets dropped.

use crate::openai::ChatMessage;

/// Drop any trailing incomplete tool exchange from `messages`.
///
/// The tail is valid once it is either a plain user/assistant message or an
/// assistant tool-call request followed by exactly one result per call.
/// Anything else (orphaned results, unanswered requests) gets truncated away,
/// repeating until the tail is clean.
pub fn sanitize_history(mut messages: Vec<ChatMessage>) -> Vec<ChatMessage> {
    loop {
        let tail_tools = messages
            .iter()
            .rev()
            .take_while(|m| m.role == "tool")
            .count();
        let run_start = messages.len() - tail_tools;

        if tail_tools > 0 {
            match run_start.checked_sub(1).map(|i| &messages[i]) {
                Some(m) if m.role == "assistant" && m.tool_call_count() == tail_tools => break,
                Some(m) if m.role == "assistant" && m.tool_call_count() > tail_tools => {
                    // Unanswered request: drop it together with its partial results.
                    messages.truncate(run_start - 1);
                }
                _ => {
                    // Results with no matching request.
                    messages.truncate(run_start);
                }
            }
        } else if messages
            .last()
            .map(|m| m.role == "assistant" && m.tool_call_count() > 0)
            .unwrap_or(false)
        {
            messages.pop();
        } else {
            break;
        }
    }

    messages
}
