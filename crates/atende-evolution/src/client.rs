//! HTTP client for the Evolution messaging gateway.
//!
//! One plain request per call, no retries. The API key travels in the
//! `apikey` header and is never logged.

use async_trait::async_trait;
use atende_core::{
    envelope::MessageKey,
    error::AtendeError,
    traits::{MediaPayload, Messenger},
};
use serde_json::{json, Value};
use tracing::debug;

/// Evolution API client.
pub struct EvolutionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl EvolutionClient {
    /// Create from config values.
    pub fn from_config(base_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn request(
        &self,
        method: reqwest::Method,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, AtendeError> {
        let url = format!("{}{endpoint}", self.base_url.trim_end_matches('/'));
        debug!("evolution: {method} {endpoint}");

        let resp = self
            .client
            .request(method, &url)
            .header("apikey", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| AtendeError::Gateway(format!("request to {endpoint} failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(AtendeError::Gateway(format!(
                "evolution returned {status} for {endpoint}: {text}"
            )));
        }

        resp.json()
            .await
            .map_err(|e| AtendeError::Gateway(format!("failed to parse {endpoint} response: {e}")))
    }
}

#[async_trait]
impl Messenger for EvolutionClient {
    async fn send_text(&self, instance: &str, phone: &str, text: &str) -> Result<(), AtendeError> {
        let body = json!({
            "number": phone,
            "textMessage": { "text": text },
        });
        self.request(
            reqwest::Method::POST,
            &format!("/message/sendText/{instance}"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn send_presence(
        &self,
        instance: &str,
        phone: &str,
        composing: bool,
    ) -> Result<(), AtendeError> {
        let body = json!({
            "number": phone,
            "presence": if composing { "composing" } else { "paused" },
        });
        self.request(
            reqwest::Method::POST,
            &format!("/chat/updatePresence/{instance}"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn mark_as_read(&self, instance: &str, key: &MessageKey) -> Result<(), AtendeError> {
        let body = json!({
            "readMessages": [{
                "remoteJid": key.remote_jid,
                "fromMe": key.from_me,
                "id": key.id,
            }],
        });
        self.request(
            reqwest::Method::PUT,
            &format!("/chat/markMessageAsRead/{instance}"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn react_to_message(
        &self,
        instance: &str,
        key: &MessageKey,
        emoji: &str,
    ) -> Result<(), AtendeError> {
        let body = json!({
            "reactionMessage": {
                "key": {
                    "remoteJid": key.remote_jid,
                    "fromMe": key.from_me,
                    "id": key.id,
                },
                "reaction": emoji,
            },
        });
        self.request(
            reqwest::Method::POST,
            &format!("/message/sendReaction/{instance}"),
            &body,
        )
        .await?;
        Ok(())
    }

    async fn download_media(
        &self,
        instance: &str,
        message_id: &str,
    ) -> Result<MediaPayload, AtendeError> {
        let body = json!({
            "message": { "key": { "id": message_id } },
        });
        let value = self
            .request(
                reqwest::Method::POST,
                &format!("/chat/getBase64FromMediaMessage/{instance}"),
                &body,
            )
            .await?;

        serde_json::from_value(value)
            .map_err(|e| AtendeError::Gateway(format!("malformed media response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_payload_parsing() {
        let json = r#"{"base64": "AAAA", "mimetype": "audio/ogg; codecs=opus"}"#;
        let media: MediaPayload = serde_json::from_str(json).unwrap();
        assert_eq!(media.base64, "AAAA");
        assert_eq!(media.mimetype.as_deref(), Some("audio/ogg; codecs=opus"));
    }

    #[test]
    fn test_media_payload_without_mimetype() {
        let media: MediaPayload = serde_json::from_str(r#"{"base64": "AAAA"}"#).unwrap();
        assert!(media.mimetype.is_none());
    }

    #[test]
    fn test_presence_body_shape() {
        let body = json!({"number": "5511", "presence": "composing"});
        assert_eq!(body["presence"], "composing");
    }
}
