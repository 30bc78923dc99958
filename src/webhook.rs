//! The inbound webhook turn: gate, transcribe, converse, humanize, reply.
//!
//! Response policy: 401 for a bad API key, 200 for everything else. The
//! gateway retries non-2xx deliveries, and a retried turn would reach the
//! LLM twice, so even internal failures acknowledge the webhook.

use crate::humanize::{calculate_delay, detect_intent, reaction_emoji};
use crate::policy;
use crate::server::AppState;
use atende_agent::{
    prompt::build_system_prompt,
    secretary::FALLBACK_MESSAGE,
    tools::ToolContext,
    ChatMessage, Secretary,
};
use atende_core::{
    clinic::ClinicConfig,
    envelope::{extract_phone, MessageData, WebhookPayload},
    error::AtendeError,
};
use atende_evolution::transcribe::{TRANSCRIPTION_DISABLED, TRANSCRIPTION_PLACEHOLDER};
use atende_store::{AuditEntry, AuditLogger, AuditStatus};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Datelike, Local};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

pub async fn handle(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let api_key = headers
        .get("apikey")
        .or_else(|| headers.get("x-api-key"))
        .and_then(|v| v.to_str().ok());
    let source = source_ip(&headers);
    let (status, value) = process(&state, api_key, &source, &body).await;
    (status, Json(value))
}

/// Caller identity for rate tracking: first `x-forwarded-for` hop.
fn source_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn skip(reason: &str) -> (StatusCode, Value) {
    (StatusCode::OK, json!({"status": "ignored", "reason": reason}))
}

pub(crate) async fn process(
    state: &AppState,
    api_key: Option<&str>,
    source: &str,
    body: &[u8],
) -> (StatusCode, Value) {
    // No configured secret means no caller can authenticate.
    let expected = &state.config.server.webhook_api_key;
    if expected.is_empty() || api_key != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, json!({"error": "unauthorized"}));
    }

    state.rate.track(source);

    let Ok(payload) = serde_json::from_slice::<WebhookPayload>(body) else {
        return skip("invalid payload");
    };

    let instance = payload.instance.clone().unwrap_or_default();

    if !payload.is_message_event() {
        return skip("not a message event");
    }
    let Some(data) = payload.message_data() else {
        return skip("no message data");
    };
    if data.key.from_me {
        return skip("own message");
    }
    if data.is_group_or_status() {
        return skip("group or status");
    }
    if instance.is_empty() {
        return skip("missing instance");
    }
    let phone = extract_phone(&data.key.remote_jid);
    if phone.is_empty() {
        return skip("missing phone");
    }

    match run_turn(state, &instance, phone, data).await {
        Ok(value) => (StatusCode::OK, value),
        Err(e) => {
            error!("webhook turn failed for instance {instance}: {e}");
            (StatusCode::OK, json!({"status": "error", "error": e.to_string()}))
        }
    }
}

async fn run_turn(
    state: &AppState,
    instance: &str,
    phone: &str,
    data: &MessageData,
) -> Result<Value, AtendeError> {
    let started = Instant::now();

    let Some(clinic) = state.store.clinic_for_instance(instance).await? else {
        debug!("webhook for unregistered instance {instance}");
        return Ok(json!({"status": "ignored", "reason": "unknown instance"}));
    };

    if state.store.is_phone_blocked(instance, phone).await? {
        return Ok(json!({"status": "ignored", "reason": "blocked"}));
    }

    let text = data.text().map(str::to_string);
    if text.is_none() && !data.has_audio() {
        return Ok(json!({"status": "ignored", "reason": "unsupported message"}));
    }

    let now = Local::now();
    if !policy::is_within_work_hours(&clinic.settings, now.weekday(), now.time()) {
        if clinic.behavior.mark_as_read {
            if let Err(e) = state.messenger.mark_as_read(instance, &data.key).await {
                debug!("mark as read failed: {e}");
            }
        }
        let message = clinic.settings.out_of_hours_message.clone();
        if let Err(e) = state.messenger.send_text(instance, phone, &message).await {
            warn!("out-of-hours reply failed: {e}");
        }
        audit_turn(
            state,
            instance,
            phone,
            data,
            text.as_deref().unwrap_or("[áudio]"),
            None,
            None,
            &[],
            started,
            AuditStatus::Skipped,
            Some("out_of_hours"),
        )
        .await;
        return Ok(json!({"status": "out_of_hours"}));
    }

    if clinic.behavior.mark_as_read {
        if let Err(e) = state.messenger.mark_as_read(instance, &data.key).await {
            debug!("mark as read failed: {e}");
        }
    }

    let conversation = state
        .store
        .find_or_create_conversation(instance, phone, data.push_name.as_deref())
        .await?;

    if conversation.is_transferred() {
        debug!("conversation {} is with a human, staying silent", conversation.id);
        return Ok(json!({"status": "ignored", "reason": "transferred"}));
    }

    if !data.key.id.is_empty() && state.store.is_duplicate(&conversation.id, &data.key.id).await? {
        debug!("duplicate delivery of {} for conversation {}", data.key.id, conversation.id);
        return Ok(json!({"status": "ignored", "reason": "duplicate"}));
    }

    if conversation.messages_count >= clinic.settings.message_limit_per_conversation {
        if let Err(e) = state
            .messenger
            .send_text(instance, phone, policy::LIMIT_MESSAGE)
            .await
        {
            warn!("limit reply failed: {e}");
        }
        audit_turn(
            state,
            instance,
            phone,
            data,
            text.as_deref().unwrap_or("[áudio]"),
            Some(policy::LIMIT_MESSAGE),
            None,
            &[],
            started,
            AuditStatus::Skipped,
            Some("message_limit"),
        )
        .await;
        return Ok(json!({"status": "limit_reached"}));
    }

    // Resolved only now: media download and transcription are network
    // calls, so duplicates, transferred and over-limit conversations
    // must never pay for them.
    let user_text = match text {
        Some(t) => t,
        None => resolve_audio(state, instance, &clinic, data).await,
    };

    if let Some(keyword) = policy::match_human_keyword(&user_text, &clinic.settings.human_keywords) {
        info!("handoff keyword '{keyword}' in conversation {}", conversation.id);
        state.store.mark_transferred(&conversation.id).await?;
        let external_id = (!data.key.id.is_empty()).then_some(data.key.id.as_str());
        state
            .store
            .log_message(&conversation.id, "patient", &user_text, Some("transferencia"), external_id)
            .await?;
        state
            .messenger
            .send_text(instance, phone, policy::TRANSFER_MESSAGE)
            .await?;
        state
            .store
            .log_message(&conversation.id, "ai", policy::TRANSFER_MESSAGE, Some("transferencia"), None)
            .await?;
        audit_turn(
            state,
            instance,
            phone,
            data,
            &user_text,
            Some(policy::TRANSFER_MESSAGE),
            Some("transferencia"),
            &[],
            started,
            AuditStatus::Replied,
            None,
        )
        .await;
        return Ok(json!({"status": "transferred"}));
    }

    let typing = clinic.behavior.send_typing_indicator;
    if typing {
        if let Err(e) = state.messenger.send_presence(instance, phone, true).await {
            debug!("typing indicator failed: {e}");
        }
    }

    let history: Vec<ChatMessage> = state
        .store
        .recent_history(&conversation.id)
        .await?
        .into_iter()
        .map(|m| {
            if m.sender == "ai" {
                ChatMessage::assistant(m.content)
            } else {
                ChatMessage::user(m.content)
            }
        })
        .collect();

    let system_prompt = build_system_prompt(&clinic, phone, now.date_naive());
    let ctx = ToolContext {
        clinic_id: clinic.clinic_id.clone(),
        phone: phone.to_string(),
        conversation_id: conversation.id.clone(),
    };

    let secretary = Secretary::new(state.chat.clone());
    let reply = match secretary
        .respond(&system_prompt, history, &user_text, &state.store, &ctx)
        .await
    {
        Ok(reply) => reply,
        Err(e) => {
            warn!("agent failed for conversation {}: {e}", conversation.id);
            if typing {
                let _ = state.messenger.send_presence(instance, phone, false).await;
            }
            if let Err(send_err) = state
                .messenger
                .send_text(instance, phone, FALLBACK_MESSAGE)
                .await
            {
                warn!("fallback reply failed: {send_err}");
            }
            audit_turn(
                state,
                instance,
                phone,
                data,
                &user_text,
                Some(FALLBACK_MESSAGE),
                None,
                &[],
                started,
                AuditStatus::Error,
                Some(&e.to_string()),
            )
            .await;
            return Ok(json!({"status": "error", "error": e.to_string()}));
        }
    };

    let intent = detect_intent(&user_text, &reply.tools_used);
    let external_id = (!data.key.id.is_empty()).then_some(data.key.id.as_str());
    state
        .store
        .log_message(&conversation.id, "patient", &user_text, Some(intent.as_str()), external_id)
        .await?;
    state
        .store
        .log_message(&conversation.id, "ai", &reply.text, Some(intent.as_str()), None)
        .await?;

    if let Some(emoji) = reaction_emoji(intent, &clinic.behavior) {
        let messenger = state.messenger.clone();
        let instance = instance.to_string();
        let key = data.key.clone();
        let emoji = emoji.to_string();
        tokio::spawn(async move {
            if let Err(e) = messenger.react_to_message(&instance, &key, &emoji).await {
                debug!("reaction failed: {e}");
            }
        });
    }

    let delay = calculate_delay(&reply.text, &clinic.behavior);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    if typing {
        if let Err(e) = state.messenger.send_presence(instance, phone, false).await {
            debug!("typing indicator failed: {e}");
        }
    }

    state.messenger.send_text(instance, phone, &reply.text).await?;

    audit_turn(
        state,
        instance,
        phone,
        data,
        &user_text,
        Some(&reply.text),
        Some(intent.as_str()),
        &reply.tools_used,
        started,
        AuditStatus::Replied,
        None,
    )
    .await;

    Ok(json!({"status": "replied", "intent": intent.as_str()}))
}

/// Turn an audio message into text the agent can work with.
async fn resolve_audio(
    state: &AppState,
    instance: &str,
    clinic: &ClinicConfig,
    data: &MessageData,
) -> String {
    if !clinic.behavior.receive_audio_enabled || !clinic.behavior.transcribe_audio {
        return TRANSCRIPTION_DISABLED.to_string();
    }

    match state.messenger.download_media(instance, &data.key.id).await {
        Ok(media) => {
            let mimetype = media.mimetype.as_deref().unwrap_or("audio/ogg").to_string();
            state
                .transcriber
                .transcribe_or_placeholder(&media.base64, &mimetype)
                .await
        }
        Err(e) => {
            warn!("media download failed: {e}");
            TRANSCRIPTION_PLACEHOLDER.to_string()
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn audit_turn(
    state: &AppState,
    instance: &str,
    phone: &str,
    data: &MessageData,
    input_text: &str,
    output_text: Option<&str>,
    intent: Option<&str>,
    tools_used: &[String],
    started: Instant,
    status: AuditStatus,
    skip_reason: Option<&str>,
) {
    let entry = AuditEntry {
        instance_name: instance.to_string(),
        phone: phone.to_string(),
        contact_name: data.push_name.clone(),
        input_text: input_text.to_string(),
        output_text: output_text.map(String::from),
        intent: intent.map(String::from),
        tools_used: tools_used.to_vec(),
        processing_ms: Some(started.elapsed().as_millis() as i64),
        status,
        skip_reason: skip_reason.map(String::from),
    };
    if let Err(e) = AuditLogger::new(state.store.pool().clone()).log(&entry).await {
        warn!("audit write failed: {e}");
    }
}
