use super::*;
use atende_core::traits::{NewAppointment, NewPatient, SchedulingBackend};
use chrono::{NaiveDate, NaiveTime};

async fn store() -> Store {
    Store::in_memory().await.unwrap()
}

async fn seed_instance(store: &Store) {
    store
        .upsert_instance("clinica-sorriso", "clinic-1", "Sorriso Feliz", "{}", "{}")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_migrations_apply_once() {
    let s = store().await;
    // Running again on the same pool must be a no-op.
    Store::run_migrations(s.pool()).await.unwrap();
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
        .fetch_one(s.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_clinic_for_unknown_instance_is_none() {
    let s = store().await;
    assert!(s.clinic_for_instance("ghost").await.unwrap().is_none());
}

#[tokio::test]
async fn test_clinic_config_json_columns() {
    let s = store().await;
    s.upsert_instance(
        "clinica-sorriso",
        "clinic-1",
        "Sorriso Feliz",
        r#"{"message_limit_per_conversation": 50}"#,
        r#"{"mark_as_read": true}"#,
    )
    .await
    .unwrap();

    let clinic = s
        .clinic_for_instance("clinica-sorriso")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(clinic.clinic_id, "clinic-1");
    assert_eq!(clinic.settings.message_limit_per_conversation, 50);
    assert!(clinic.behavior.mark_as_read);
    assert!(!clinic.behavior.send_typing_indicator);
}

#[tokio::test]
async fn test_malformed_settings_fall_back_to_defaults() {
    let s = store().await;
    s.upsert_instance("x", "clinic-1", "X", "not json", "{}")
        .await
        .unwrap();
    let clinic = s.clinic_for_instance("x").await.unwrap().unwrap();
    assert_eq!(clinic.settings.message_limit_per_conversation, 100);
}

#[tokio::test]
async fn test_blocklist() {
    let s = store().await;
    assert!(!s.is_phone_blocked("i", "5511999990000").await.unwrap());
    s.block_phone("i", "5511999990000", Some("spam")).await.unwrap();
    assert!(s.is_phone_blocked("i", "5511999990000").await.unwrap());
    // Other instances are unaffected.
    assert!(!s.is_phone_blocked("other", "5511999990000").await.unwrap());
}

#[tokio::test]
async fn test_conversation_is_stable_per_instance_and_phone() {
    let s = store().await;
    seed_instance(&s).await;

    let a = s
        .find_or_create_conversation("clinica-sorriso", "5511999990000", Some("Ana"))
        .await
        .unwrap();
    let b = s
        .find_or_create_conversation("clinica-sorriso", "5511999990000", None)
        .await
        .unwrap();
    assert_eq!(a.id, b.id);

    let other = s
        .find_or_create_conversation("clinica-sorriso", "5511888880000", None)
        .await
        .unwrap();
    assert_ne!(a.id, other.id);
}

#[tokio::test]
async fn test_transfer_is_sticky() {
    let s = store().await;
    let conv = s
        .find_or_create_conversation("i", "5511999990000", None)
        .await
        .unwrap();
    assert!(!conv.is_transferred());

    s.mark_transferred(&conv.id).await.unwrap();
    let again = s
        .find_or_create_conversation("i", "5511999990000", None)
        .await
        .unwrap();
    assert_eq!(again.id, conv.id);
    assert!(again.is_transferred());
}

#[tokio::test]
async fn test_message_count_increments() {
    let s = store().await;
    let conv = s
        .find_or_create_conversation("i", "5511999990000", None)
        .await
        .unwrap();
    s.log_message(&conv.id, "patient", "oi", None, Some("wamid.1"))
        .await
        .unwrap();
    s.log_message(&conv.id, "ai", "Olá!", Some("saudacao"), None)
        .await
        .unwrap();

    let again = s
        .find_or_create_conversation("i", "5511999990000", None)
        .await
        .unwrap();
    assert_eq!(again.messages_count, 2);
}

#[tokio::test]
async fn test_dedup_is_scoped_per_conversation() {
    let s = store().await;
    let a = s.find_or_create_conversation("i", "111", None).await.unwrap();
    let b = s.find_or_create_conversation("i", "222", None).await.unwrap();

    s.log_message(&a.id, "patient", "oi", None, Some("wamid.1"))
        .await
        .unwrap();

    assert!(s.is_duplicate(&a.id, "wamid.1").await.unwrap());
    // Same provider id in another conversation is a different message.
    assert!(!s.is_duplicate(&b.id, "wamid.1").await.unwrap());
}

#[tokio::test]
async fn test_recent_history_is_bounded_and_oldest_first() {
    let s = store().await;
    let conv = s.find_or_create_conversation("i", "111", None).await.unwrap();
    for i in 0..25 {
        s.log_message(&conv.id, "patient", &format!("msg {i}"), None, None)
            .await
            .unwrap();
    }

    let history = s.recent_history(&conv.id).await.unwrap();
    assert_eq!(history.len(), 20);
    assert_eq!(history.first().unwrap().content, "msg 5");
    assert_eq!(history.last().unwrap().content, "msg 24");
}

#[tokio::test]
async fn test_patient_lookup_and_registration() {
    let s = store().await;
    let missing = s
        .find_patient_by_phone("clinic-1", "5511999990000")
        .await
        .unwrap();
    assert_eq!(missing["encontrado"], false);

    let patient = NewPatient {
        name: "Ana Souza".into(),
        birth_date: NaiveDate::from_ymd_opt(1990, 3, 14),
        email: None,
    };
    let created = s
        .create_patient("clinic-1", "5511999990000", &patient)
        .await
        .unwrap();
    assert_eq!(created["cadastrado"], true);

    let found = s
        .find_patient_by_phone("clinic-1", "5511999990000")
        .await
        .unwrap();
    assert_eq!(found["encontrado"], true);
    assert_eq!(found["nome"], "Ana Souza");

    // Duplicate phone yields an error value, not a second row.
    let dup = s
        .create_patient("clinic-1", "5511999990000", &patient)
        .await
        .unwrap();
    assert!(dup["error"].is_string());
}

#[tokio::test]
async fn test_available_slots_exclude_booked() {
    let s = store().await;
    let professional_id = s
        .add_professional("clinic-1", "Dra. Clara", Some("ortodontia"), "08:00", "12:00")
        .await
        .unwrap();

    let patient = NewPatient {
        name: "Ana".into(),
        birth_date: None,
        email: None,
    };
    let created = s.create_patient("clinic-1", "111", &patient).await.unwrap();
    let patient_id = created["paciente_id"].as_str().unwrap().to_string();

    let date = NaiveDate::from_ymd_opt(2026, 9, 7).unwrap();
    let appointment = NewAppointment {
        patient_id,
        professional_id: professional_id.clone(),
        date,
        time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        procedure_name: None,
        notes: None,
    };
    s.create_appointment("clinic-1", &appointment).await.unwrap();

    let slots = s
        .available_slots("clinic-1", &professional_id, date, 60)
        .await
        .unwrap();
    let available: Vec<&str> = slots["disponiveis"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(available, vec!["08:00", "10:00", "11:00"]);
}

#[tokio::test]
async fn test_double_booking_rejected() {
    let s = store().await;
    let professional_id = s
        .add_professional("clinic-1", "Dra. Clara", None, "08:00", "18:00")
        .await
        .unwrap();
    let created = s
        .create_patient(
            "clinic-1",
            "111",
            &NewPatient {
                name: "Ana".into(),
                birth_date: None,
                email: None,
            },
        )
        .await
        .unwrap();

    let appointment = NewAppointment {
        patient_id: created["paciente_id"].as_str().unwrap().to_string(),
        professional_id,
        date: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
        time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        procedure_name: None,
        notes: None,
    };
    let first = s.create_appointment("clinic-1", &appointment).await.unwrap();
    assert_eq!(first["agendado"], true);

    let second = s.create_appointment("clinic-1", &appointment).await.unwrap();
    assert!(second["error"].is_string());
}

#[tokio::test]
async fn test_appointment_lifecycle() {
    let s = store().await;
    let professional_id = s
        .add_professional("clinic-1", "Dr. Beto", None, "08:00", "18:00")
        .await
        .unwrap();
    let created = s
        .create_patient(
            "clinic-1",
            "111",
            &NewPatient {
                name: "Ana".into(),
                birth_date: None,
                email: None,
            },
        )
        .await
        .unwrap();
    let patient_id = created["paciente_id"].as_str().unwrap().to_string();

    let appointment = NewAppointment {
        patient_id: patient_id.clone(),
        professional_id,
        date: NaiveDate::from_ymd_opt(2026, 9, 7).unwrap(),
        time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        procedure_name: Some("limpeza".into()),
        notes: None,
    };
    let booked = s.create_appointment("clinic-1", &appointment).await.unwrap();
    let appointment_id = booked["agendamento_id"].as_str().unwrap().to_string();

    let confirmed = s
        .confirm_appointment("clinic-1", &appointment_id)
        .await
        .unwrap();
    assert_eq!(confirmed["confirmado"], true);

    // Already confirmed, a second confirm is a domain miss.
    let again = s
        .confirm_appointment("clinic-1", &appointment_id)
        .await
        .unwrap();
    assert!(again["error"].is_string());

    let moved = s
        .reschedule_appointment(
            "clinic-1",
            &appointment_id,
            NaiveDate::from_ymd_opt(2026, 9, 8).unwrap(),
            NaiveTime::from_hms_opt(11, 0, 0).unwrap(),
            None,
        )
        .await
        .unwrap();
    assert_eq!(moved["remarcado"], true);

    let cancelled = s
        .cancel_appointment("clinic-1", &appointment_id, Some("paciente desistiu"))
        .await
        .unwrap();
    assert_eq!(cancelled["cancelado"], true);

    let listed = s
        .patient_appointments("clinic-1", &patient_id, true)
        .await
        .unwrap();
    assert!(listed["consultas"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_next_appointment_by_phone() {
    let s = store().await;
    let professional_id = s
        .add_professional("clinic-1", "Dr. Beto", None, "08:00", "18:00")
        .await
        .unwrap();
    let created = s
        .create_patient(
            "clinic-1",
            "5511999990000",
            &NewPatient {
                name: "Ana".into(),
                birth_date: None,
                email: None,
            },
        )
        .await
        .unwrap();
    let patient_id = created["paciente_id"].as_str().unwrap().to_string();

    let none = s.next_appointment("clinic-1", "5511999990000").await.unwrap();
    assert!(none["agendamento_id"].is_null());

    for (date, time) in [(2, 14), (1, 9)] {
        let appointment = NewAppointment {
            patient_id: patient_id.clone(),
            professional_id: professional_id.clone(),
            date: NaiveDate::from_ymd_opt(2099, 1, date).unwrap(),
            time: NaiveTime::from_hms_opt(time, 0, 0).unwrap(),
            procedure_name: None,
            notes: None,
        };
        s.create_appointment("clinic-1", &appointment).await.unwrap();
    }

    let next = s.next_appointment("clinic-1", "5511999990000").await.unwrap();
    assert_eq!(next["data"], "2099-01-01");
    assert_eq!(next["horario"], "09:00");
}

#[tokio::test]
async fn test_transfer_tool_marks_conversation() {
    let s = store().await;
    let conv = s.find_or_create_conversation("i", "111", None).await.unwrap();
    let result = s
        .transfer_to_human(&conv.id, "paciente pediu")
        .await
        .unwrap();
    assert_eq!(result["transferido"], true);

    let again = s.find_or_create_conversation("i", "111", None).await.unwrap();
    assert!(again.is_transferred());
}
