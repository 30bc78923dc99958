//! Per-clinic channel configuration.
//!
//! Owned and edited by clinic administrators elsewhere in the system; the
//! orchestrator reads it fresh on every request and never caches it, since
//! it may change between webhook calls.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configuration resolved for one messaging instance (one WhatsApp line).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicConfig {
    pub clinic_id: String,
    pub display_name: String,
    #[serde(default)]
    pub settings: ClinicSettings,
    #[serde(default)]
    pub behavior: BehaviorFlags,
}

/// Secretary settings: hours, limits, handoff keywords, canned texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClinicSettings {
    /// Work days keyed pt-BR style: dom, seg, ter, qua, qui, sex, sab.
    /// A missing key counts as a work day.
    #[serde(default)]
    pub work_days: HashMap<String, bool>,
    /// "HH:MM". Empty start/end means no hour restriction.
    #[serde(default)]
    pub work_hours_start: Option<String>,
    #[serde(default)]
    pub work_hours_end: Option<String>,
    #[serde(default = "default_out_of_hours_message")]
    pub out_of_hours_message: String,
    #[serde(default = "default_message_limit")]
    pub message_limit_per_conversation: i64,
    #[serde(default = "default_human_keywords")]
    pub human_keywords: Vec<String>,
    /// Free-form instructions appended to the system prompt.
    #[serde(default)]
    pub custom_instructions: Option<String>,
}

impl Default for ClinicSettings {
    fn default() -> Self {
        Self {
            work_days: HashMap::new(),
            work_hours_start: None,
            work_hours_end: None,
            out_of_hours_message: default_out_of_hours_message(),
            message_limit_per_conversation: default_message_limit(),
            human_keywords: default_human_keywords(),
            custom_instructions: None,
        }
    }
}

/// Behavior flags controlling the humanized-reply layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BehaviorFlags {
    #[serde(default)]
    pub mark_as_read: bool,
    #[serde(default)]
    pub send_typing_indicator: bool,
    #[serde(default)]
    pub react_to_messages: bool,
    #[serde(default)]
    pub receive_audio_enabled: bool,
    #[serde(default)]
    pub transcribe_audio: bool,
    #[serde(default)]
    pub response_cadence_enabled: bool,
    #[serde(default = "default_delay_min")]
    pub response_delay_min_ms: u64,
    #[serde(default = "default_delay_max")]
    pub response_delay_max_ms: u64,
    #[serde(default = "default_typing_speed")]
    pub typing_speed_cpm: u64,
    #[serde(default)]
    pub reaction_on_appointment: Option<String>,
    #[serde(default)]
    pub reaction_on_cancel: Option<String>,
    #[serde(default)]
    pub reaction_on_greeting: Option<String>,
}

impl Default for BehaviorFlags {
    fn default() -> Self {
        Self {
            mark_as_read: false,
            send_typing_indicator: false,
            react_to_messages: false,
            receive_audio_enabled: false,
            transcribe_audio: false,
            response_cadence_enabled: false,
            response_delay_min_ms: default_delay_min(),
            response_delay_max_ms: default_delay_max(),
            typing_speed_cpm: default_typing_speed(),
            reaction_on_appointment: None,
            reaction_on_cancel: None,
            reaction_on_greeting: None,
        }
    }
}

fn default_out_of_hours_message() -> String {
    "Olá! No momento estamos fora do horário de atendimento. Retornaremos em breve!".to_string()
}
fn default_message_limit() -> i64 {
    100
}
fn default_human_keywords() -> Vec<String> {
    vec![
        "atendente".into(),
        "humano".into(),
        "pessoa".into(),
        "falar com alguem".into(),
    ]
}
fn default_delay_min() -> u64 {
    1500
}
fn default_delay_max() -> u64 {
    4000
}
fn default_typing_speed() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let s: ClinicSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(s.message_limit_per_conversation, 100);
        assert!(s.human_keywords.contains(&"atendente".to_string()));
        assert!(s.work_hours_start.is_none());
        assert!(!s.out_of_hours_message.is_empty());
    }

    #[test]
    fn test_behavior_defaults() {
        let b: BehaviorFlags = serde_json::from_str("{}").unwrap();
        assert!(!b.response_cadence_enabled);
        assert_eq!(b.response_delay_min_ms, 1500);
        assert_eq!(b.response_delay_max_ms, 4000);
        assert_eq!(b.typing_speed_cpm, 300);
    }

    #[test]
    fn test_settings_round_trip() {
        let json = r#"{
            "work_days": {"dom": false, "sab": false},
            "work_hours_start": "08:00",
            "work_hours_end": "18:00",
            "message_limit_per_conversation": 50,
            "human_keywords": ["gerente"]
        }"#;
        let s: ClinicSettings = serde_json::from_str(json).unwrap();
        assert_eq!(s.work_days.get("dom"), Some(&false));
        assert_eq!(s.work_hours_start.as_deref(), Some("08:00"));
        assert_eq!(s.message_limit_per_conversation, 50);
        assert_eq!(s.human_keywords, vec!["gerente".to_string()]);
    }
}
