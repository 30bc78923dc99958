//! Humanized-reply layer: intent tagging, emoji reactions and typing
//! cadence. Everything here is advisory; no failure in this layer may
//! block the reply itself.

use atende_core::clinic::BehaviorFlags;
use std::time::Duration;

/// Coarse intent tag stored alongside messages and used to pick reactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    Agendamento,
    Cancelamento,
    Confirmacao,
    Remarcacao,
    Transferencia,
    Saudacao,
    Geral,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agendamento => "agendamento",
            Self::Cancelamento => "cancelamento",
            Self::Confirmacao => "confirmacao",
            Self::Remarcacao => "remarcacao",
            Self::Transferencia => "transferencia",
            Self::Saudacao => "saudacao",
            Self::Geral => "geral",
        }
    }
}

/// Classify a turn. Tools actually executed beat text guesses.
pub fn detect_intent(text: &str, tools_used: &[String]) -> Intent {
    for tool in tools_used {
        match tool.as_str() {
            "criar_agendamento" => return Intent::Agendamento,
            "cancelar_agendamento" => return Intent::Cancelamento,
            "confirmar_agendamento" => return Intent::Confirmacao,
            "remarcar_agendamento" => return Intent::Remarcacao,
            "transferir_para_humano" => return Intent::Transferencia,
            _ => {}
        }
    }

    let lowered = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lowered.contains(n));

    if has(&["cancelar", "desmarcar"]) {
        Intent::Cancelamento
    } else if has(&["remarcar", "mudar o hor", "trocar o hor"]) {
        Intent::Remarcacao
    } else if has(&["confirmar", "confirmo"]) {
        Intent::Confirmacao
    } else if has(&["marcar", "agendar", "consulta", "horário", "horario"]) {
        Intent::Agendamento
    } else if has(&["oi", "olá", "ola", "bom dia", "boa tarde", "boa noite"]) {
        Intent::Saudacao
    } else {
        Intent::Geral
    }
}

/// Reaction emoji for an intent, honoring the clinic's behavior flags.
pub fn reaction_emoji(intent: Intent, behavior: &BehaviorFlags) -> Option<&str> {
    if !behavior.react_to_messages {
        return None;
    }
    let emoji = match intent {
        Intent::Agendamento | Intent::Confirmacao => behavior.reaction_on_appointment.as_deref(),
        Intent::Cancelamento | Intent::Remarcacao => behavior.reaction_on_cancel.as_deref(),
        Intent::Saudacao => behavior.reaction_on_greeting.as_deref(),
        Intent::Transferencia | Intent::Geral => None,
    };
    emoji.filter(|e| !e.is_empty())
}

/// Typing delay proportional to reply length, clamped to the configured
/// window. Zero when cadence is disabled.
pub fn calculate_delay(reply: &str, behavior: &BehaviorFlags) -> Duration {
    if !behavior.response_cadence_enabled {
        return Duration::ZERO;
    }
    let cpm = behavior.typing_speed_cpm.max(1);
    let min = behavior.response_delay_min_ms;
    // Guard against min > max from a bad clinic config.
    let max = behavior.response_delay_max_ms.max(min);
    let ms = (reply.chars().count() as u64 * 60_000 / cpm).clamp(min, max);
    Duration::from_millis(ms)
}
