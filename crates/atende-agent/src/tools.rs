//! The closed registry of tools exposed to the LLM.
//!
//! Tool names are pt-BR verbs matching what the model sees in the schema.
//! Execution never fails the turn: argument and backend errors come back as
//! `{"error": ...}` JSON for the model to recover from in conversation.

use atende_core::{
    error::AtendeError,
    traits::{NewAppointment, NewPatient, SchedulingBackend},
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::openai::ToolDef;

/// Identity of the conversation a tool executes for.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub clinic_id: String,
    pub phone: String,
    pub conversation_id: String,
}

/// Every tool the secretary can invoke. Closed set; unknown names from the
/// model are rejected at dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolId {
    BuscarPaciente,
    CadastrarPaciente,
    ListarProfissionais,
    BuscarHorarios,
    CriarAgendamento,
    MinhasConsultas,
    ProximoAgendamento,
    RemarcarAgendamento,
    CancelarAgendamento,
    ConfirmarAgendamento,
    TransferirParaHumano,
}

impl ToolId {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "buscar_paciente" => Self::BuscarPaciente,
            "cadastrar_paciente" => Self::CadastrarPaciente,
            "listar_profissionais" => Self::ListarProfissionais,
            "buscar_horarios" => Self::BuscarHorarios,
            "criar_agendamento" => Self::CriarAgendamento,
            "minhas_consultas" => Self::MinhasConsultas,
            "proximo_agendamento" => Self::ProximoAgendamento,
            "remarcar_agendamento" => Self::RemarcarAgendamento,
            "cancelar_agendamento" => Self::CancelarAgendamento,
            "confirmar_agendamento" => Self::ConfirmarAgendamento,
            "transferir_para_humano" => Self::TransferirParaHumano,
            _ => return None,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BuscarPaciente => "buscar_paciente",
            Self::CadastrarPaciente => "cadastrar_paciente",
            Self::ListarProfissionais => "listar_profissionais",
            Self::BuscarHorarios => "buscar_horarios",
            Self::CriarAgendamento => "criar_agendamento",
            Self::MinhasConsultas => "minhas_consultas",
            Self::ProximoAgendamento => "proximo_agendamento",
            Self::RemarcarAgendamento => "remarcar_agendamento",
            Self::CancelarAgendamento => "cancelar_agendamento",
            Self::ConfirmarAgendamento => "confirmar_agendamento",
            Self::TransferirParaHumano => "transferir_para_humano",
        }
    }

    pub fn all() -> &'static [ToolId] {
        &[
            Self::BuscarPaciente,
            Self::CadastrarPaciente,
            Self::ListarProfissionais,
            Self::BuscarHorarios,
            Self::CriarAgendamento,
            Self::MinhasConsultas,
            Self::ProximoAgendamento,
            Self::RemarcarAgendamento,
            Self::CancelarAgendamento,
            Self::ConfirmarAgendamento,
            Self::TransferirParaHumano,
        ]
    }
}

/// Schemas handed to the LLM. The phone number is never a parameter; it
/// comes from the conversation context so the model cannot act on behalf
/// of another number.
pub fn tool_defs() -> Vec<ToolDef> {
    ToolId::all()
        .iter()
        .map(|id| {
            let (description, parameters) = schema_for(*id);
            ToolDef {
                name: id.name().to_string(),
                description: description.to_string(),
                parameters,
            }
        })
        .collect()
}

fn schema_for(id: ToolId) -> (&'static str, Value) {
    match id {
        ToolId::BuscarPaciente => (
            "Busca o cadastro do paciente pelo telefone desta conversa. Use antes de agendar.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        ToolId::CadastrarPaciente => (
            "Cadastra um novo paciente com o telefone desta conversa.",
            json!({
                "type": "object",
                "properties": {
                    "nome": {"type": "string", "description": "Nome completo do paciente"},
                    "data_nascimento": {"type": "string", "description": "Data de nascimento no formato AAAA-MM-DD"},
                    "email": {"type": "string", "description": "Email do paciente"}
                },
                "required": ["nome"]
            }),
        ),
        ToolId::ListarProfissionais => (
            "Lista os profissionais da clínica e suas especialidades.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        ToolId::BuscarHorarios => (
            "Busca horários disponíveis de um profissional em uma data.",
            json!({
                "type": "object",
                "properties": {
                    "profissional_id": {"type": "string", "description": "ID do profissional"},
                    "data": {"type": "string", "description": "Data no formato AAAA-MM-DD"},
                    "duracao_minutos": {"type": "integer", "description": "Duração da consulta em minutos"}
                },
                "required": ["profissional_id", "data"]
            }),
        ),
        ToolId::CriarAgendamento => (
            "Cria um agendamento. Confirme todos os dados com o paciente antes de chamar.",
            json!({
                "type": "object",
                "properties": {
                    "paciente_id": {"type": "string"},
                    "profissional_id": {"type": "string"},
                    "data": {"type": "string", "description": "Data no formato AAAA-MM-DD"},
                    "horario": {"type": "string", "description": "Horário no formato HH:MM"},
                    "procedimento": {"type": "string", "description": "Nome do procedimento"},
                    "observacoes": {"type": "string"}
                },
                "required": ["paciente_id", "profissional_id", "data", "horario"]
            }),
        ),
        ToolId::MinhasConsultas => (
            "Lista as consultas do paciente.",
            json!({
                "type": "object",
                "properties": {
                    "paciente_id": {"type": "string"},
                    "incluir_passadas": {"type": "boolean", "description": "Incluir consultas já realizadas"}
                },
                "required": ["paciente_id"]
            }),
        ),
        ToolId::ProximoAgendamento => (
            "Busca o próximo agendamento do paciente pelo telefone desta conversa.",
            json!({"type": "object", "properties": {}, "required": []}),
        ),
        ToolId::RemarcarAgendamento => (
            "Remarca um agendamento existente para nova data e horário.",
            json!({
                "type": "object",
                "properties": {
                    "agendamento_id": {"type": "string"},
                    "nova_data": {"type": "string", "description": "Nova data no formato AAAA-MM-DD"},
                    "novo_horario": {"type": "string", "description": "Novo horário no formato HH:MM"},
                    "observacoes": {"type": "string"}
                },
                "required": ["agendamento_id", "nova_data", "novo_horario"]
            }),
        ),
        ToolId::CancelarAgendamento => (
            "Cancela um agendamento existente.",
            json!({
                "type": "object",
                "properties": {
                    "agendamento_id": {"type": "string"},
                    "motivo": {"type": "string", "description": "Motivo do cancelamento"}
                },
                "required": ["agendamento_id"]
            }),
        ),
        ToolId::ConfirmarAgendamento => (
            "Confirma a presença do paciente em um agendamento.",
            json!({
                "type": "object",
                "properties": {
                    "agendamento_id": {"type": "string"}
                },
                "required": ["agendamento_id"]
            }),
        ),
        ToolId::TransferirParaHumano => (
            "Transfere a conversa para um atendente humano. Use quando o paciente pedir ou quando não conseguir ajudar.",
            json!({
                "type": "object",
                "properties": {
                    "motivo": {"type": "string", "description": "Motivo da transferência"}
                },
                "required": []
            }),
        ),
    }
}

#[derive(Deserialize)]
struct CadastrarArgs {
    nome: String,
    #[serde(default)]
    data_nascimento: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Deserialize)]
struct HorariosArgs {
    profissional_id: String,
    data: String,
    #[serde(default = "default_duration")]
    duracao_minutos: u32,
}

fn default_duration() -> u32 {
    60
}

#[derive(Deserialize)]
struct CriarArgs {
    paciente_id: String,
    profissional_id: String,
    data: String,
    horario: String,
    #[serde(default)]
    procedimento: Option<String>,
    #[serde(default)]
    observacoes: Option<String>,
}

#[derive(Deserialize)]
struct ConsultasArgs {
    paciente_id: String,
    #[serde(default)]
    incluir_passadas: bool,
}

#[derive(Deserialize)]
struct RemarcarArgs {
    agendamento_id: String,
    nova_data: String,
    novo_horario: String,
    #[serde(default)]
    observacoes: Option<String>,
}

#[derive(Deserialize)]
struct CancelarArgs {
    agendamento_id: String,
    #[serde(default)]
    motivo: Option<String>,
}

#[derive(Deserialize)]
struct ConfirmarArgs {
    agendamento_id: String,
}

#[derive(Deserialize)]
struct TransferirArgs {
    #[serde(default)]
    motivo: Option<String>,
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("data inválida: {s}"))
}

fn parse_time(s: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .map_err(|_| format!("horário inválido: {s}"))
}

fn parse_args<T: for<'de> Deserialize<'de>>(raw: &str) -> Result<T, String> {
    serde_json::from_str(raw).map_err(|e| format!("argumentos inválidos: {e}"))
}

/// Dispatch one tool call against the scheduling backend.
///
/// Always yields a JSON value for the model: domain errors, bad arguments
/// and unknown tool names all become an `error` field.
pub async fn execute(
    backend: &dyn SchedulingBackend,
    name: &str,
    raw_args: &str,
    ctx: &ToolContext,
) -> Value {
    let Some(id) = ToolId::from_name(name) else {
        warn!("model requested unknown tool: {name}");
        return json!({"error": format!("ferramenta desconhecida: {name}")});
    };
    debug!("executing tool {} for conversation {}", id.name(), ctx.conversation_id);

    match run_tool(backend, id, raw_args, ctx).await {
        Ok(value) => value,
        Err(ToolError::Args(msg)) => json!({"error": msg}),
        Err(ToolError::Backend(e)) => {
            warn!("tool {} failed: {e}", id.name());
            json!({"error": e.to_string()})
        }
    }
}

enum ToolError {
    Args(String),
    Backend(AtendeError),
}

impl From<AtendeError> for ToolError {
    fn from(e: AtendeError) -> Self {
        Self::Backend(e)
    }
}

impl From<String> for ToolError {
    fn from(msg: String) -> Self {
        Self::Args(msg)
    }
}

async fn run_tool(
    backend: &dyn SchedulingBackend,
    id: ToolId,
    raw_args: &str,
    ctx: &ToolContext,
) -> Result<Value, ToolError> {
    let value = match id {
        ToolId::BuscarPaciente => {
            backend
                .find_patient_by_phone(&ctx.clinic_id, &ctx.phone)
                .await?
        }
        ToolId::CadastrarPaciente => {
            let args: CadastrarArgs = parse_args(raw_args)?;
            let birth_date = match args.data_nascimento.as_deref() {
                Some(s) => Some(parse_date(s)?),
                None => None,
            };
            let patient = NewPatient {
                name: args.nome,
                birth_date,
                email: args.email,
            };
            backend
                .create_patient(&ctx.clinic_id, &ctx.phone, &patient)
                .await?
        }
        ToolId::ListarProfissionais => backend.list_professionals(&ctx.clinic_id).await?,
        ToolId::BuscarHorarios => {
            let args: HorariosArgs = parse_args(raw_args)?;
            let date = parse_date(&args.data)?;
            backend
                .available_slots(&ctx.clinic_id, &args.profissional_id, date, args.duracao_minutos)
                .await?
        }
        ToolId::CriarAgendamento => {
            let args: CriarArgs = parse_args(raw_args)?;
            let appointment = NewAppointment {
                patient_id: args.paciente_id,
                professional_id: args.profissional_id,
                date: parse_date(&args.data)?,
                time: parse_time(&args.horario)?,
                procedure_name: args.procedimento,
                notes: args.observacoes,
            };
            backend
                .create_appointment(&ctx.clinic_id, &appointment)
                .await?
        }
        ToolId::MinhasConsultas => {
            let args: ConsultasArgs = parse_args(raw_args)?;
            backend
                .patient_appointments(&ctx.clinic_id, &args.paciente_id, args.incluir_passadas)
                .await?
        }
        ToolId::ProximoAgendamento => {
            backend.next_appointment(&ctx.clinic_id, &ctx.phone).await?
        }
        ToolId::RemarcarAgendamento => {
            let args: RemarcarArgs = parse_args(raw_args)?;
            backend
                .reschedule_appointment(
                    &ctx.clinic_id,
                    &args.agendamento_id,
                    parse_date(&args.nova_data)?,
                    parse_time(&args.novo_horario)?,
                    args.observacoes.as_deref(),
                )
                .await?
        }
        ToolId::CancelarAgendamento => {
            let args: CancelarArgs = parse_args(raw_args)?;
            backend
                .cancel_appointment(&ctx.clinic_id, &args.agendamento_id, args.motivo.as_deref())
                .await?
        }
        ToolId::ConfirmarAgendamento => {
            let args: ConfirmarArgs = parse_args(raw_args)?;
            backend
                .confirm_appointment(&ctx.clinic_id, &args.agendamento_id)
                .await?
        }
        ToolId::TransferirParaHumano => {
            let args: TransferirArgs = parse_args(raw_args)?;
            let reason = args.motivo.unwrap_or_else(|| "solicitado pelo paciente".to_string());
            backend
                .transfer_to_human(&ctx.conversation_id, &reason)
                .await?
        }
    };
    Ok(value)
}
