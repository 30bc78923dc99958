use crate::{envelope::MessageKey, error::AtendeError};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::Value;

/// Messaging gateway seam — every outbound operation against the provider.
///
/// Implementations issue one plain request per call and never retry; the
/// caller decides which failures are fatal and which are best-effort.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Send a text message to a phone number. Fatal to the turn on failure.
    async fn send_text(&self, instance: &str, phone: &str, text: &str) -> Result<(), AtendeError>;

    /// Toggle the typing ("composing") indicator. Best-effort.
    async fn send_presence(
        &self,
        instance: &str,
        phone: &str,
        composing: bool,
    ) -> Result<(), AtendeError>;

    /// Mark an inbound message as read. Best-effort.
    async fn mark_as_read(&self, instance: &str, key: &MessageKey) -> Result<(), AtendeError>;

    /// React to an inbound message with an emoji. Best-effort.
    async fn react_to_message(
        &self,
        instance: &str,
        key: &MessageKey,
        emoji: &str,
    ) -> Result<(), AtendeError>;

    /// Download media content from a message as base64.
    async fn download_media(
        &self,
        instance: &str,
        message_id: &str,
    ) -> Result<MediaPayload, AtendeError>;
}

/// Media returned by [`Messenger::download_media`].
#[derive(Debug, Clone, Deserialize)]
pub struct MediaPayload {
    pub base64: String,
    #[serde(default)]
    pub mimetype: Option<String>,
}

/// New-patient registration arguments.
#[derive(Debug, Clone)]
pub struct NewPatient {
    pub name: String,
    pub birth_date: Option<NaiveDate>,
    pub email: Option<String>,
}

/// New-appointment arguments, all confirmed with the patient beforehand.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: String,
    pub professional_id: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub procedure_name: Option<String>,
    pub notes: Option<String>,
}

/// Domain operations behind the LLM tool registry.
///
/// Each method stands in for one stored procedure: the orchestrator consumes
/// this contract without knowing how scheduling is implemented. Results are
/// JSON values handed verbatim to the LLM as tool output.
#[async_trait]
pub trait SchedulingBackend: Send + Sync {
    async fn find_patient_by_phone(
        &self,
        clinic_id: &str,
        phone: &str,
    ) -> Result<Value, AtendeError>;

    async fn create_patient(
        &self,
        clinic_id: &str,
        phone: &str,
        patient: &NewPatient,
    ) -> Result<Value, AtendeError>;

    async fn list_professionals(&self, clinic_id: &str) -> Result<Value, AtendeError>;

    async fn available_slots(
        &self,
        clinic_id: &str,
        professional_id: &str,
        date: NaiveDate,
        duration_minutes: u32,
    ) -> Result<Value, AtendeError>;

    async fn create_appointment(
        &self,
        clinic_id: &str,
        appointment: &NewAppointment,
    ) -> Result<Value, AtendeError>;

    async fn patient_appointments(
        &self,
        clinic_id: &str,
        patient_id: &str,
        include_past: bool,
    ) -> Result<Value, AtendeError>;

    async fn next_appointment(&self, clinic_id: &str, phone: &str) -> Result<Value, AtendeError>;

    async fn reschedule_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
        new_date: NaiveDate,
        new_time: NaiveTime,
        notes: Option<&str>,
    ) -> Result<Value, AtendeError>;

    async fn cancel_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
        reason: Option<&str>,
    ) -> Result<Value, AtendeError>;

    async fn confirm_appointment(
        &self,
        clinic_id: &str,
        appointment_id: &str,
    ) -> Result<Value, AtendeError>;

    async fn transfer_to_human(
        &self,
        conversation_id: &str,
        reason: &str,
    ) -> Result<Value, AtendeError>;
}
