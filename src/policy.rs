//! Pure policy checks applied before any LLM work: work hours and the
//! human-handoff keyword scan.

use atende_core::clinic::ClinicSettings;
use chrono::{NaiveTime, Weekday};

/// Sent when a conversation reaches its message limit.
pub const LIMIT_MESSAGE: &str = "Você atingiu o limite de mensagens desta conversa. \
     Um atendente dará continuidade ao seu atendimento.";

/// Sent right after a keyword-triggered transfer.
pub const TRANSFER_MESSAGE: &str = "Entendi! Vou transferir você para um atendente humano. \
     Aguarde um momento, por favor.";

/// Day key pt-BR style, matching how clinic settings are stored.
fn day_key(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "dom",
        Weekday::Mon => "seg",
        Weekday::Tue => "ter",
        Weekday::Wed => "qua",
        Weekday::Thu => "qui",
        Weekday::Fri => "sex",
        Weekday::Sat => "sab",
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

/// Whether the clinic attends at this weekday and time.
///
/// A day missing from `work_days` counts as a work day, and unparsable
/// hour bounds impose no restriction. Misconfiguration keeps the
/// secretary answering rather than silently off.
pub fn is_within_work_hours(settings: &ClinicSettings, weekday: Weekday, time: NaiveTime) -> bool {
    if settings.work_days.get(day_key(weekday)) == Some(&false) {
        return false;
    }

    let bounds = settings
        .work_hours_start
        .as_deref()
        .zip(settings.work_hours_end.as_deref());
    let Some((start_raw, end_raw)) = bounds else {
        return true;
    };
    let (Some(start), Some(end)) = (parse_hhmm(start_raw), parse_hhmm(end_raw)) else {
        return true;
    };

    // Both bounds are inclusive: at 18:00 sharp an "08:00-18:00" clinic
    // still answers.
    time >= start && time <= end
}

/// Case-insensitive substring scan for a human-handoff keyword.
pub fn match_human_keyword<'a>(text: &str, keywords: &'a [String]) -> Option<&'a str> {
    let lowered = text.to_lowercase();
    keywords
        .iter()
        .filter(|k| !k.trim().is_empty())
        .find(|k| lowered.contains(&k.to_lowercase()))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(days: &[(&str, bool)], start: Option<&str>, end: Option<&str>) -> ClinicSettings {
        let mut s = ClinicSettings::default();
        s.work_days = days
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect::<HashMap<_, _>>();
        s.work_hours_start = start.map(String::from);
        s.work_hours_end = end.map(String::from);
        s
    }

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_day_off_is_closed() {
        let s = settings(&[("dom", false)], Some("08:00"), Some("18:00"));
        assert!(!is_within_work_hours(&s, Weekday::Sun, at(10, 0)));
        assert!(is_within_work_hours(&s, Weekday::Mon, at(10, 0)));
    }

    #[test]
    fn test_missing_day_counts_as_workday() {
        let s = settings(&[], Some("08:00"), Some("18:00"));
        assert!(is_within_work_hours(&s, Weekday::Sat, at(10, 0)));
    }

    #[test]
    fn test_hour_bounds_inclusive() {
        let s = settings(&[], Some("08:00"), Some("18:00"));
        assert!(is_within_work_hours(&s, Weekday::Mon, at(8, 0)));
        assert!(is_within_work_hours(&s, Weekday::Mon, at(18, 0)));
        assert!(!is_within_work_hours(&s, Weekday::Mon, at(18, 1)));
        assert!(!is_within_work_hours(&s, Weekday::Mon, at(7, 59)));
    }

    #[test]
    fn test_no_hours_means_always_open() {
        let s = settings(&[], None, None);
        assert!(is_within_work_hours(&s, Weekday::Mon, at(3, 0)));
    }

    #[test]
    fn test_unparsable_hours_impose_no_restriction() {
        let s = settings(&[], Some("morning"), Some("evening"));
        assert!(is_within_work_hours(&s, Weekday::Mon, at(3, 0)));
    }

    #[test]
    fn test_keyword_match_is_case_insensitive_substring() {
        let keywords = vec!["atendente".to_string(), "falar com alguem".to_string()];
        assert_eq!(
            match_human_keyword("Quero falar com um ATENDENTE agora", &keywords),
            Some("atendente")
        );
        assert_eq!(match_human_keyword("quero marcar consulta", &keywords), None);
    }

    #[test]
    fn test_blank_keywords_never_match() {
        let keywords = vec!["  ".to_string()];
        assert_eq!(match_human_keyword("qualquer coisa", &keywords), None);
    }
}
