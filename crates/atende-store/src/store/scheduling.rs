//! Scheduling domain behind the tool registry.
//!
//! Results are JSON the LLM reads back to the patient, so field names and
//! messages are pt-BR. Domain misses ("not found", "slot taken") come back
//! as `error` values rather than `Err`, keeping the conversation alive.

use super::Store;
use async_trait::async_trait;
use atende_core::{
    error::AtendeError,
    traits::{NewAppointment, NewPatient, SchedulingBackend},
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::{json, Value};
use tracing::info;
use uuid::Uuid;

const TIME_FMT: &str = "%H:%M";

fn parse_stored_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .ok()
}

fn minute_of_day(t: NaiveTime) -> u32 {
    use chrono::Timelike;
    t.num_seconds_from_midnight() / 60
}

/// Half-open interval overlap on minutes since midnight.
fn overlaps(a0: u32, a_mins: u32, b0: u32, b_mins: u32) -> bool {
    a0 < b0 + b_mins && b0 < a0 + a_mins
}

impl Store {
    /// Register a professional. Used by provisioning and tests.
    pub async fn add_professional(
        &self,
        clinic_id: &str,
        name: &str,
        specialty: Option<&str>,
        schedule_start: &str,
        schedule_end: &str,
    ) -> Result<String, AtendeError> {
        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO professionals (id, clinic_id, name, specialty, schedule_start, schedule_end) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(clinic_id)
        .bind(name)
        .bind(specialty)
        .bind(schedule_start)
        .bind(schedule_end)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        Ok(id)
    }
}

#[async_trait]
impl SchedulingBackend for Store {
    async fn find_patient_by_phone(
        &self,
        clinic_id: &str,
        phone: &str,
    ) -> Result<Value, AtendeError> {
        let row: Option<(String, String, Option<String>, Option<String>)> = sqlx::query_as(
            "SELECT id, name, birth_date, email FROM patients \
             WHERE clinic_id = ? AND phone = ?",
        )
        .bind(clinic_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        Ok(match row {
            Some((id, name, birth_date, email)) => json!({
                "encontrado": true,
                "paciente_id": id,
                "nome": name,
                "data_nascimento": birth_date,
                "email": email,
            }),
            None => json!({
                "encontrado": false,
                "mensagem": "Paciente não cadastrado. Peça o nome completo para cadastrar.",
            }),
        })
    }

    async fn create_patient(
        &self,
        clinic_id: &str,
        phone: &str,
        patient: &NewPatient,
    ) -> Result<Value, AtendeError> {
        let existing: Option<(String,)> =
            sqlx::query_as("SELECT id FROM patients WHERE clinic_id = ? AND phone = ?")
                .bind(clinic_id)
                .bind(phone)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        if let Some((id,)) = existing {
            return Ok(json!({
                "error": "Já existe um paciente cadastrado com este telefone.",
                "paciente_id": id,
            }));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO patients (id, clinic_id, name, phone, birth_date, email) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(clinic_id)
        .bind(&patient.name)
        .bind(phone)
        .bind(patient.birth_date.map(|d| d.to_string()))
        .bind(&patient.email)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        info!("patient registered for clinic {clinic_id}");

        Ok(json!({"cadastrado": true, "paciente_id": id, "nome": patient.name}))
    }

    async fn list_professionals(&self, clinic_id: &str) -> Result<Value, AtendeError> {
        let rows: Vec<(String, String, Option<String>)> = sqlx::query_as(
            "SELECT id, name, specialty FROM professionals \
             WHERE clinic_id = ? AND active = 1 ORDER BY name",
        )
        .bind(clinic_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        let list: Vec<Value> = rows
            .into_iter()
            .map(|(id, name, specialty)| {
                json!({"profissional_id": id, "nome": name, "especialidade": specialty})
            })
            .collect();

        Ok(json!({"profissionais": list}))
    }

    async fn available_slots(
        &self,
        clinic_id: &str,
        professional_id: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Value, AtendeError> {
        let professional: Option<(String, String)> = sqlx::query_as(
            "SELECT schedule_start, schedule_end FROM professionals \
             WHERE id = ? AND clinic_id = ? AND active = 1",
        )
        .bind(professional_id)
        .bind(clinic_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        let Some((start_raw, end_raw)) = professional else {
            return Ok(json!({"error": "Profissional não encontrado."}));
        };

        let (Some(day_start), Some(day_end)) =
            (parse_stored_time(&start_raw), parse_stored_time(&end_raw))
        else {
            return Ok(json!({"error": "Agenda do profissional mal configurada."}));
        };

        let booked: Vec<(String, i64)> = sqlx::query_as(
            "SELECT time, duration_minutes FROM appointments \
             WHERE professional_id = ? AND date = ? AND status IN ('scheduled', 'confirmed')",
        )
        .bind(professional_id)
        .bind(date.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        let booked: Vec<(u32, u32)> = booked
            .into_iter()
            .filter_map(|(t, d)| parse_stored_time(&t).map(|t| (minute_of_day(t), d.max(0) as u32)))
            .collect();

        let duration = duration_minutes.max(1);
        let day_end = minute_of_day(day_end);
        let mut slots = Vec::new();
        let mut cursor = minute_of_day(day_start);
        while cursor + duration <= day_end {
            let taken = booked
                .iter()
                .any(|(t, d)| overlaps(cursor, duration, *t, *d));
            if !taken {
                slots.push(format!("{:02}:{:02}", cursor / 60, cursor % 60));
            }
            cursor += duration;
        }

        Ok(json!({
            "data": date.to_string(),
            "disponiveis": slots,
        }))
    }

    async fn create_appointment(
        &self,
        clinic_id: &str,
        appointment: &NewAppointment,
    ) -> Result<Value, AtendeError> {
        let conflict: Option<(String,)> = sqlx::query_as(
            "SELECT id FROM appointments \
             WHERE professional_id = ? AND date = ? AND time = ? \
             AND status IN ('scheduled', 'confirmed')",
        )
        .bind(&appointment.professional_id)
        .bind(appointment.date.to_string())
        .bind(appointment.time.format(TIME_FMT).to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        if conflict.is_some() {
            return Ok(json!({
                "error": "Este horário acabou de ser ocupado. Ofereça outro horário.",
            }));
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO appointments \
             (id, clinic_id, patient_id, professional_id, date, time, procedure_name, notes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(clinic_id)
        .bind(&appointment.patient_id)
        .bind(&appointment.professional_id)
        .bind(appointment.date.to_string())
        .bind(appointment.time.format(TIME_FMT).to_string())
        .bind(&appointment.procedure_name)
        .bind(&appointment.notes)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("insert failed: {e}")))?;

        info!("appointment {id} created for clinic {clinic_id}");

        Ok(json!({
            "agendado": true,
            "agendamento_id": id,
            "data": appointment.date.to_string(),
            "horario": appointment.time.format(TIME_FMT).to_string(),
        }))
    }

    async fn patient_appointments(
        &self,
        clinic_id: &str,
        patient_id: &str,
        include_past: bool,
    ) -> Result<Value, AtendeError> {
        let date_filter = if include_past {
            ""
        } else {
            " AND a.date >= date('now')"
        };
        let sql = format!(
            "SELECT a.id, a.date, a.time, a.status, a.procedure_name, p.name \
             FROM appointments a JOIN professionals p ON a.professional_id = p.id \
             WHERE a.clinic_id = ? AND a.patient_id = ? AND a.status != 'cancelled'{date_filter} \
             ORDER BY a.date, a.time"
        );

        let rows: Vec<(String, String, String, String, Option<String>, String)> =
            sqlx::query_as(&sql)
                .bind(clinic_id)
                .bind(patient_id)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        let list: Vec<Value> = rows
            .into_iter()
            .map(|(id, date, time, status, procedure, professional)| {
                json!({
                    "agendamento_id": id,
                    "data": date,
                    "horario": time,
                    "status": status,
                    "procedimento": procedure,
                    "profissional": professional,
                })
            })
            .collect();

        Ok(json!({"consultas": list}))
    }

    async fn next_appointment(&self, clinic_id: &str, phone: &str) -> Result<Value, AtendeError> {
        let row: Option<(String, String, String, Option<String>, String)> = sqlx::query_as(
            "SELECT a.id, a.date, a.time, a.procedure_name, pr.name \
             FROM appointments a \
             JOIN patients pa ON a.patient_id = pa.id \
             JOIN professionals pr ON a.professional_id = pr.id \
             WHERE a.clinic_id = ? AND pa.phone = ? \
             AND a.status IN ('scheduled', 'confirmed') \
             AND a.date >= date('now') \
             ORDER BY a.date, a.time LIMIT 1",
        )
        .bind(clinic_id)
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("query failed: {e}")))?;

        Ok(match row {
            Some((id, date, time, procedure, professional)) => json!({
                "agendamento_id": id,
                "data": date,
                "horario": time,
                "procedimento": procedure,
                "profissional": professional,
            }),
            None => json!({"mensagem": "Nenhum agendamento futuro encontrado."}),
        })
    }

    async fn reschedule_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
        new_date: NaiveDate,
        new_time: NaiveTime,
        notes: Option<&str>,
    ) -> Result<Value, AtendeError> {
        let result = sqlx::query(
            "UPDATE appointments SET date = ?, time = ?, \
             notes = COALESCE(?, notes), status = 'scheduled', updated_at = datetime('now') \
             WHERE id = ? AND clinic_id = ? AND status IN ('scheduled', 'confirmed')",
        )
        .bind(new_date.to_string())
        .bind(new_time.format(TIME_FMT).to_string())
        .bind(notes)
        .bind(appointment_id)
        .bind(clinic_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(json!({"error": "Agendamento não encontrado ou já encerrado."}));
        }

        Ok(json!({
            "remarcado": true,
            "nova_data": new_date.to_string(),
            "novo_horario": new_time.format(TIME_FMT).to_string(),
        }))
    }

    async fn cancel_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
        reason: Option<&str>,
    ) -> Result<Value, AtendeError> {
        let result = sqlx::query(
            "UPDATE appointments SET status = 'cancelled', \
             notes = COALESCE(?, notes), updated_at = datetime('now') \
             WHERE id = ? AND clinic_id = ? AND status IN ('scheduled', 'confirmed')",
        )
        .bind(reason)
        .bind(appointment_id)
        .bind(clinic_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(json!({"error": "Agendamento não encontrado ou já cancelado."}));
        }

        Ok(json!({"cancelado": true}))
    }

    async fn confirm_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
    ) -> Result<Value, AtendeError> {
        let result = sqlx::query(
            "UPDATE appointments SET status = 'confirmed', updated_at = datetime('now') \
             WHERE id = ? AND clinic_id = ? AND status = 'scheduled'",
        )
        .bind(appointment_id)
        .bind(clinic_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AtendeError::Store(format!("update failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(json!({"error": "Agendamento não encontrado ou já confirmado."}));
        }

        Ok(json!({"confirmado": true}))
    }

    async fn transfer_to_human(
        &self,
        conversation_id: &str,
        reason: &str,
    ) -> Result<Value, AtendeError> {
        self.mark_transferred(conversation_id).await?;
        info!("conversation {conversation_id} transferred to human: {reason}");

        Ok(json!({
            "transferido": true,
            "mensagem": "Conversa transferida para atendimento humano.",
        }))
    }
}
