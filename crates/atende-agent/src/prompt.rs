//! System prompt assembly for the secretary persona.

use atende_core::clinic::ClinicConfig;
use chrono::NaiveDate;

/// Weekday name in pt-BR for the prompt header.
fn weekday_pt(date: NaiveDate) -> &'static str {
    use chrono::Datelike;
    match date.weekday() {
        chrono::Weekday::Mon => "segunda-feira",
        chrono::Weekday::Tue => "terça-feira",
        chrono::Weekday::Wed => "quarta-feira",
        chrono::Weekday::Thu => "quinta-feira",
        chrono::Weekday::Fri => "sexta-feira",
        chrono::Weekday::Sat => "sábado",
        chrono::Weekday::Sun => "domingo",
    }
}

/// Build the system prompt for one conversation turn.
///
/// The current date goes in so the model can resolve "amanhã" and "semana
/// que vem"; the phone goes in so it knows the patient lookup is already
/// anchored and must not ask for a number.
pub fn build_system_prompt(clinic: &ClinicConfig, phone: &str, today: NaiveDate) -> String {
    let mut prompt = format!(
        "Você é a secretária virtual da clínica {nome}. Atenda pacientes pelo WhatsApp \
         de forma cordial, natural e objetiva, sempre em português brasileiro.\n\n\
         Hoje é {dia}, {data}.\n\
         O telefone do paciente nesta conversa é {phone}; nunca pergunte o número dele.\n\n\
         Regras:\n\
         - Use as ferramentas disponíveis para consultar e alterar agendamentos. \
         Nunca invente horários, profissionais ou confirmações.\n\
         - Antes de criar, remarcar ou cancelar um agendamento, confirme os dados com o paciente.\n\
         - Se o paciente ainda não tem cadastro, colete o nome completo e cadastre-o.\n\
         - Se não conseguir resolver ou o paciente pedir, transfira para um atendente humano.\n\
         - Responda em mensagens curtas, como uma pessoa digitando no WhatsApp.",
        nome = clinic.display_name,
        dia = weekday_pt(today),
        data = today.format("%d/%m/%Y"),
        phone = phone,
    );

    if let (Some(start), Some(end)) = (
        clinic.settings.work_hours_start.as_deref(),
        clinic.settings.work_hours_end.as_deref(),
    ) {
        prompt.push_str(&format!(
            "\n\nHorário de atendimento da clínica: das {start} às {end}."
        ));
    }

    if let Some(custom) = clinic
        .settings
        .custom_instructions
        .as_deref()
        .filter(|s| !s.trim().is_empty())
    {
        prompt.push_str("\n\nInstruções da clínica:\n");
        prompt.push_str(custom);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clinic() -> ClinicConfig {
        ClinicConfig {
            clinic_id: "clinic-1".into(),
            display_name: "Sorriso Feliz".into(),
            settings: Default::default(),
            behavior: Default::default(),
        }
    }

    #[test]
    fn test_prompt_contains_clinic_date_and_phone() {
        let today = NaiveDate::from_ymd_opt(2026, 8, 29).unwrap();
        let prompt = build_system_prompt(&clinic(), "5511999990000", today);
        assert!(prompt.contains("Sorriso Feliz"));
        assert!(prompt.contains("sábado, 29/08/2026"));
        assert!(prompt.contains("5511999990000"));
    }

    #[test]
    fn test_prompt_includes_work_hours_when_set() {
        let mut c = clinic();
        c.settings.work_hours_start = Some("08:00".into());
        c.settings.work_hours_end = Some("18:00".into());
        let today = NaiveDate::from_ymd_opt(2026, 8, 31).unwrap();
        let prompt = build_system_prompt(&c, "5511", today);
        assert!(prompt.contains("das 08:00 às 18:00"));
    }

    #[test]
    fn test_custom_instructions_appended() {
        let mut c = clinic();
        c.settings.custom_instructions = Some("Não agende para o Dr. Paulo às sextas.".into());
        let today = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let prompt = build_system_prompt(&c, "5511", today);
        assert!(prompt.ends_with("Não agende para o Dr. Paulo às sextas."));
    }

    #[test]
    fn test_blank_custom_instructions_skipped() {
        let mut c = clinic();
        c.settings.custom_instructions = Some("   ".into());
        let today = NaiveDate::from_ymd_opt(2026, 9, 1).unwrap();
        let prompt = build_system_prompt(&c, "5511", today);
        assert!(!prompt.contains("Instruções da clínica"));
    }
}
