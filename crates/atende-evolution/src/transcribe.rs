//! Whisper transcription adapter for inbound voice messages.
//!
//! Availability beats accuracy here: the orchestrator must always have some
//! text to reason over, so any failure collapses to a fixed placeholder
//! instead of aborting the conversation turn.

use atende_core::error::AtendeError;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Bound on the whole transcription call.
const TRANSCRIBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shown to the LLM when a voice note could not be transcribed.
pub const TRANSCRIPTION_PLACEHOLDER: &str = "[Áudio recebido mas não foi possível transcrever]";

/// Shown when the clinic has audio handling disabled.
pub const TRANSCRIPTION_DISABLED: &str = "[Áudio recebido - transcrição não habilitada]";

#[derive(Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Pick a file extension Whisper accepts for the given mimetype.
fn extension_for(mimetype: &str) -> &'static str {
    if mimetype.contains("mp4") || mimetype.contains("m4a") {
        "m4a"
    } else if mimetype.contains("mp3") {
        "mp3"
    } else {
        "ogg"
    }
}

/// Transcribe base64 audio via the Whisper API.
pub async fn transcribe(
    client: &reqwest::Client,
    api_key: &str,
    base64_audio: &str,
    mimetype: &str,
) -> Result<String, AtendeError> {
    let audio_bytes = base64::engine::general_purpose::STANDARD
        .decode(base64_audio)
        .map_err(|e| AtendeError::Provider(format!("invalid base64 audio: {e}")))?;

    let ext = extension_for(mimetype);
    let part = reqwest::multipart::Part::bytes(audio_bytes)
        .file_name(format!("audio.{ext}"))
        .mime_str(mimetype)
        .map_err(|e| AtendeError::Provider(format!("whisper mime error: {e}")))?;

    let form = reqwest::multipart::Form::new()
        .text("model", "whisper-1")
        .text("language", "pt")
        .part("file", part);

    let resp = client
        .post("https://api.openai.com/v1/audio/transcriptions")
        .bearer_auth(api_key)
        .multipart(form)
        .timeout(TRANSCRIBE_TIMEOUT)
        .send()
        .await
        .map_err(|e| AtendeError::Provider(format!("whisper request failed: {e}")))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AtendeError::Provider(format!(
            "whisper API error {status}: {body}"
        )));
    }

    let result: WhisperResponse = resp
        .json()
        .await
        .map_err(|e| AtendeError::Provider(format!("whisper response parse failed: {e}")))?;

    Ok(result.text)
}

/// Owns the HTTP client and API key for repeated transcription calls.
pub struct Transcriber {
    client: reqwest::Client,
    api_key: String,
}

impl Transcriber {
    pub fn new(api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
        }
    }

    /// See [`transcribe_or_placeholder`].
    pub async fn transcribe_or_placeholder(&self, base64_audio: &str, mimetype: &str) -> String {
        transcribe_or_placeholder(&self.client, &self.api_key, base64_audio, mimetype).await
    }
}

/// Transcribe, mapping any failure or empty result to the placeholder text.
pub async fn transcribe_or_placeholder(
    client: &reqwest::Client,
    api_key: &str,
    base64_audio: &str,
    mimetype: &str,
) -> String {
    match transcribe(client, api_key, base64_audio, mimetype).await {
        Ok(text) if !text.trim().is_empty() => {
            debug!("audio transcribed: {} chars", text.len());
            text
        }
        Ok(_) => TRANSCRIPTION_PLACEHOLDER.to_string(),
        Err(e) => {
            warn!("audio transcription failed: {e}");
            TRANSCRIPTION_PLACEHOLDER.to_string()
        }
    }
}
