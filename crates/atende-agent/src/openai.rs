//! OpenAI chat-completions wire layer with function calling.
//!
//! The HTTP call lives behind the [`ChatApi`] trait so the tool-calling loop
//! can be exercised against a mock endpoint in tests.

use async_trait::async_trait;
use atende_core::error::AtendeError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Bound on one chat-completions call.
const CHAT_TIMEOUT: Duration = Duration::from_secs(45);

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1500;

/// A single chat message in OpenAI format.
///
/// `content` is absent on assistant turns that only carry tool calls;
/// `tool_call_id` is set only on role "tool" results.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Tool result keyed by the tool call's id.
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "tool".into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.into()),
        }
    }

    /// Number of tool calls requested by this message.
    pub fn tool_call_count(&self) -> usize {
        self.tool_calls.as_ref().map(Vec::len).unwrap_or(0)
    }
}

/// A tool invocation requested by the model.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String,
    pub function: FunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, exactly as the API delivers it.
    pub arguments: String,
}

/// A tool definition in provider-agnostic format.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema for parameters.
    pub parameters: Value,
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Option<Vec<ChatChoice>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// Wrap tool defs in OpenAI's `{type: "function", function: {...}}` format.
fn to_openai_tools(defs: &[ToolDef]) -> Vec<Value> {
    defs.iter()
        .map(|d| {
            serde_json::json!({
                "type": "function",
                "function": {
                    "name": d.name,
                    "description": d.description,
                    "parameters": d.parameters,
                },
            })
        })
        .collect()
}

/// Chat-completion seam — one call, one assistant message back.
#[async_trait]
pub trait ChatApi: Send + Sync {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<ChatMessage, AtendeError>;
}

/// OpenAI chat-completions client.
pub struct OpenAiChat {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChat {
    /// Create from config values.
    pub fn from_config(base_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
            model,
        }
    }

    /// Basic availability check: list models.
    pub async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[async_trait]
impl ChatApi for OpenAiChat {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolDef],
    ) -> Result<ChatMessage, AtendeError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            tools: if tools.is_empty() {
                None
            } else {
                Some(to_openai_tools(tools))
            },
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!("openai: POST {url} model={} messages={}", self.model, messages.len());

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(CHAT_TIMEOUT)
            .send()
            .await
            .map_err(|e| AtendeError::Provider(format!("openai request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(AtendeError::Provider(
                    "openai rate limited: service temporarily unavailable".to_string(),
                ));
            }
            return Err(AtendeError::Provider(format!(
                "openai returned {status}: {text}"
            )));
        }

        let parsed: ChatCompletionResponse = resp
            .json()
            .await
            .map_err(|e| AtendeError::Provider(format!("openai: failed to parse response: {e}")))?;

        parsed
            .choices
            .and_then(|mut c| c.drain(..).next())
            .and_then(|c| c.message)
            .ok_or_else(|| AtendeError::Provider("openai: no choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_response_parsing() {
        let json = r#"{
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "buscar_paciente", "arguments": "{}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let msg = resp.choices.unwrap().remove(0).message.unwrap();
        assert_eq!(msg.tool_call_count(), 1);
        let tc = &msg.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.id, "call_1");
        assert_eq!(tc.function.name, "buscar_paciente");
    }

    #[test]
    fn test_text_response_parsing() {
        let json = r#"{"choices":[{"message":{"role":"assistant","content":"Olá!"}}]}"#;
        let resp: ChatCompletionResponse = serde_json::from_str(json).unwrap();
        let msg = resp.choices.unwrap().remove(0).message.unwrap();
        assert_eq!(msg.content.as_deref(), Some("Olá!"));
        assert_eq!(msg.tool_call_count(), 0);
    }

    #[test]
    fn test_request_serialization_skips_empty_fields() {
        let messages = vec![ChatMessage::system("s"), ChatMessage::user("u")];
        let body = ChatCompletionRequest {
            model: "gpt-4o",
            messages: &messages,
            tools: None,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
        let first = &json["messages"][0];
        assert!(first.get("tool_calls").is_none());
        assert!(first.get("tool_call_id").is_none());
    }

    #[test]
    fn test_to_openai_tools_wrapping() {
        let defs = vec![ToolDef {
            name: "buscar_paciente".into(),
            description: "Busca um paciente.".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
        }];
        let wrapped = to_openai_tools(&defs);
        assert_eq!(wrapped[0]["type"], "function");
        assert_eq!(wrapped[0]["function"]["name"], "buscar_paciente");
    }

    #[test]
    fn test_tool_message_round_trip() {
        let msg = ChatMessage::tool("call_9", r#"{"found":false}"#);
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_9");
        let back: ChatMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back.tool_call_id.as_deref(), Some("call_9"));
    }
}
