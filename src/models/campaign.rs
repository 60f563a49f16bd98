// src/models/campaign.rs

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};

// =============================================================================
//  ENUMS (mapeiam os CREATE TYPE do banco)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "contact_source", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ContactSource {
    ContactList,
    CsvFile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "campaign_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Active,
    Paused,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "execution_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Idle,
    Running,
    Paused,
    Completed,
    Error,
}

impl ExecutionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Idle => "idle",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Error => "error",
        }
    }
}

/// Comandos que o usuário pode aplicar numa campanha.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CampaignCommand {
    Start,
    Pause,
    Resume,
    Stop,
}

impl CampaignCommand {
    /// Estados de execução a partir dos quais o comando é aceito.
    pub fn allowed_from(self) -> &'static [ExecutionStatus] {
        use ExecutionStatus::*;
        match self {
            CampaignCommand::Start => &[Idle, Paused, Error],
            CampaignCommand::Pause => &[Running],
            CampaignCommand::Resume => &[Paused],
            CampaignCommand::Stop => &[Idle, Running, Paused, Error],
        }
    }

    /// Estado resultante: (status, execution_status).
    pub fn target(self) -> (CampaignStatus, ExecutionStatus) {
        match self {
            CampaignCommand::Start | CampaignCommand::Resume => {
                (CampaignStatus::Active, ExecutionStatus::Running)
            }
            CampaignCommand::Pause => (CampaignStatus::Paused, ExecutionStatus::Paused),
            CampaignCommand::Stop => (CampaignStatus::Completed, ExecutionStatus::Completed),
        }
    }

    /// Chave de tradução do erro quando o comando não se aplica ao estado atual.
    pub fn rejection_key(self, current: ExecutionStatus) -> &'static str {
        match (self, current) {
            (CampaignCommand::Start, ExecutionStatus::Running) => "campaign_already_running",
            (_, ExecutionStatus::Completed) => "campaign_already_completed",
            (CampaignCommand::Pause, _) => "campaign_not_running",
            (CampaignCommand::Resume, _) => "campaign_not_paused",
            _ => "campaign_already_running",
        }
    }

    pub fn can_apply(self, current: ExecutionStatus) -> bool {
        self.allowed_from().contains(&current)
    }

    /// Lista SQL literal dos estados de origem, usada no UPDATE condicional.
    pub fn sql_from_list(self) -> String {
        self.allowed_from()
            .iter()
            .map(|s| format!("'{}'", s.as_str()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "call_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Pending,
    Queued,
    Calling,
    Answered,
    NoAnswer,
    Busy,
    Failed,
    DoNotCall,
    Completed,
}

impl CallStatus {
    fn stage(self) -> u8 {
        match self {
            CallStatus::Pending => 0,
            CallStatus::Queued => 1,
            CallStatus::Calling => 2,
            CallStatus::Answered
            | CallStatus::NoAnswer
            | CallStatus::Busy
            | CallStatus::Failed
            | CallStatus::DoNotCall => 3,
            CallStatus::Completed => 4,
        }
    }

    /// Resultado de uma tentativa de ligação (o que o discador reporta).
    pub fn is_attempt_result(self) -> bool {
        self.stage() == 3
    }

    /// Tentativas que podem voltar para a fila.
    pub fn is_retryable(self) -> bool {
        matches!(self, CallStatus::NoAnswer | CallStatus::Busy | CallStatus::Failed)
    }

    /// A máquina de estados só anda para frente:
    /// pending -> queued -> calling -> {resultado} -> completed.
    /// Uma falha de discagem pode sair direto de queued/calling para failed.
    pub fn can_transition_to(self, next: CallStatus) -> bool {
        match (self, next) {
            (CallStatus::Pending, CallStatus::Queued) => true,
            (CallStatus::Queued, CallStatus::Calling) => true,
            (CallStatus::Queued, CallStatus::Failed) => true,
            (CallStatus::Calling, n) => n.is_attempt_result(),
            (s, CallStatus::Completed) => s.is_attempt_result(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "call_outcome", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Interested,
    NotInterested,
    Callback,
    DoNotCall,
    Voicemail,
    WrongNumber,
}

/// Um resultado só é aceito quando a ligação foi atendida.
pub fn outcome_allowed(previous: CallStatus, next: CallStatus) -> bool {
    match next {
        CallStatus::Answered => true,
        CallStatus::Completed => previous == CallStatus::Answered,
        _ => false,
    }
}

// =============================================================================
//  CAMPANHA
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Campaign {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant: Option<String>,
    pub assistant_id: Option<Uuid>,
    #[schema(example = "Reativação de clientes")]
    pub name: String,
    pub contact_source: ContactSource,
    pub contact_list_id: Option<Uuid>,
    pub csv_file_id: Option<Uuid>,

    // 0 ou None = ilimitado
    pub daily_cap: Option<i32>,
    #[schema(example = json!(["monday", "wednesday", "friday"]))]
    pub calling_days: Vec<String>,
    #[schema(example = 9)]
    pub start_hour: i16,
    #[schema(example = 17)]
    pub end_hour: i16,
    pub campaign_prompt: Option<String>,

    pub status: CampaignStatus,
    pub execution_status: ExecutionStatus,

    // Contadores: só crescem, sempre via UPDATE atômico
    pub dials: i64,
    pub pickups: i64,
    pub do_not_call: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub callback: i64,
    pub total_calls_made: i64,
    pub total_calls_answered: i64,

    pub current_daily_calls: i32,
    pub daily_counter_date: Option<NaiveDate>,

    pub last_execution_at: Option<DateTime<Utc>>,
    pub next_call_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Limite diário efetivo; None = ilimitado.
    pub fn effective_daily_cap(&self) -> Option<i32> {
        self.daily_cap.filter(|cap| *cap > 0)
    }

    /// Quantas ligações ainda cabem hoje.
    pub fn remaining_today(&self) -> Option<i32> {
        self.effective_daily_cap()
            .map(|cap| (cap - self.current_daily_calls).max(0))
    }
}

const WEEKDAYS: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];

fn validate_calling_days(days: &[String]) -> Result<(), ValidationError> {
    // Sem dias a campanha nunca teria janela de discagem
    if days.is_empty() {
        return Err(ValidationError::new("required"));
    }
    if days.iter().all(|d| WEEKDAYS.contains(&d.trim().to_ascii_lowercase().as_str())) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_weekday"))
    }
}

// Regras entre campos: janela de horário e fonte de contatos
fn validate_campaign(payload: &CreateCampaignPayload) -> Result<(), ValidationError> {
    if payload.start_hour >= payload.end_hour {
        return Err(ValidationError::new("invalid_hours"));
    }
    match payload.contact_source {
        ContactSource::ContactList if payload.contact_list_id.is_none() => {
            Err(ValidationError::new("missing_contact_list"))
        }
        ContactSource::CsvFile if payload.csv_file_id.is_none() => {
            Err(ValidationError::new("missing_csv_file"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[validate(schema(function = "validate_campaign", skip_on_field_errors = false))]
pub struct CreateCampaignPayload {
    #[validate(length(min = 1, code = "required"))]
    #[schema(example = "Reativação de clientes")]
    pub name: String,
    pub assistant_id: Option<Uuid>,
    pub contact_source: ContactSource,
    pub contact_list_id: Option<Uuid>,
    pub csv_file_id: Option<Uuid>,
    #[validate(range(min = 0, code = "range"))]
    pub daily_cap: Option<i32>,
    #[validate(custom(function = "validate_calling_days"))]
    #[schema(example = json!(["monday", "tuesday"]))]
    pub calling_days: Vec<String>,
    #[validate(range(min = 0, max = 23, code = "range"))]
    pub start_hour: i16,
    #[validate(range(min = 0, max = 23, code = "range"))]
    pub end_hour: i16,
    pub campaign_prompt: Option<String>,
}

impl CreateCampaignPayload {
    pub fn normalized_days(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.calling_days
            .iter()
            .map(|d| d.trim().to_ascii_lowercase())
            .filter(|d| seen.insert(d.clone()))
            .collect()
    }
}

// =============================================================================
//  LIGAÇÕES
// =============================================================================

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignCall {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub tenant: Option<String>,
    pub contact_id: Option<Uuid>,
    pub contact_name: Option<String>,
    #[schema(example = "+5511999990000")]
    pub phone_number: String,
    pub email: Option<String>,
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
    pub retry_count: i32,
    pub max_retries: i32,
    pub call_duration: Option<i32>,
    pub notes: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CampaignCall {
    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

// Contato pronto para virar uma ligação
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct CallTarget {
    pub contact_id: Option<Uuid>,
    pub contact_name: Option<String>,
    pub phone_number: String,
    pub email: Option<String>,
}

// Corpo do callback do discador
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallResultPayload {
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
    pub call_duration: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CallSortField {
    #[default]
    CreatedAt,
    ScheduledAt,
    CompletedAt,
}

impl CallSortField {
    pub fn column(self) -> &'static str {
        match self {
            CallSortField::CreatedAt => "created_at",
            CallSortField::ScheduledAt => "scheduled_at",
            CallSortField::CompletedAt => "completed_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn keyword(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

pub const DEFAULT_CALLS_LIMIT: i64 = 50;
pub const MAX_CALLS_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct CallListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<CallStatus>,
    pub outcome: Option<CallOutcome>,
    pub sort_by: Option<CallSortField>,
    pub sort_order: Option<SortOrder>,
}

impl CallListQuery {
    pub fn effective_limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_CALLS_LIMIT).clamp(1, MAX_CALLS_LIMIT)
    }

    pub fn effective_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallPage {
    pub calls: Vec<CampaignCall>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

// =============================================================================
//  STATUS AGREGADO
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallStatusCounts {
    pub pending: i64,
    pub queued: i64,
    pub calling: i64,
    pub answered: i64,
    pub no_answer: i64,
    pub busy: i64,
    pub failed: i64,
    pub do_not_call: i64,
    pub completed: i64,
}

impl CallStatusCounts {
    pub fn add(&mut self, status: CallStatus, count: i64) {
        let slot = match status {
            CallStatus::Pending => &mut self.pending,
            CallStatus::Queued => &mut self.queued,
            CallStatus::Calling => &mut self.calling,
            CallStatus::Answered => &mut self.answered,
            CallStatus::NoAnswer => &mut self.no_answer,
            CallStatus::Busy => &mut self.busy,
            CallStatus::Failed => &mut self.failed,
            CallStatus::DoNotCall => &mut self.do_not_call,
            CallStatus::Completed => &mut self.completed,
        };
        *slot += count;
    }

    pub fn total(&self) -> i64 {
        self.pending
            + self.queued
            + self.calling
            + self.answered
            + self.no_answer
            + self.busy
            + self.failed
            + self.do_not_call
            + self.completed
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CallOutcomeCounts {
    pub interested: i64,
    pub not_interested: i64,
    pub callback: i64,
    pub do_not_call: i64,
    pub voicemail: i64,
    pub wrong_number: i64,
}

impl CallOutcomeCounts {
    pub fn add(&mut self, outcome: CallOutcome, count: i64) {
        let slot = match outcome {
            CallOutcome::Interested => &mut self.interested,
            CallOutcome::NotInterested => &mut self.not_interested,
            CallOutcome::Callback => &mut self.callback,
            CallOutcome::DoNotCall => &mut self.do_not_call,
            CallOutcome::Voicemail => &mut self.voicemail,
            CallOutcome::WrongNumber => &mut self.wrong_number,
        };
        *slot += count;
    }
}

/// Taxas em percentual (0–100), arredondadas em duas casas.
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRates {
    pub answer_rate: f64,
    pub success_rate: f64,
    pub interest_rate: f64,
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    let raw = part as f64 * 100.0 / whole as f64;
    (raw * 100.0).round() / 100.0
}

impl CampaignRates {
    /// answer = atendidas / discadas; success = interessados / atendidas;
    /// interest = (interessados + retornos) / atendidas.
    pub fn from_campaign(campaign: &Campaign) -> Self {
        let answered = campaign.total_calls_answered;
        Self {
            answer_rate: percent(answered, campaign.total_calls_made),
            success_rate: percent(campaign.interested, answered),
            interest_rate: percent(campaign.interested + campaign.callback, answered),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStatusReport {
    pub campaign: Campaign,
    pub calls_by_status: CallStatusCounts,
    pub calls_by_outcome: CallOutcomeCounts,
    pub total_calls: i64,
    pub rates: CampaignRates,
}

// =============================================================================
//  CONTADORES
// =============================================================================

/// Incrementos a aplicar nos contadores da campanha após um resultado de ligação.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub pickups: i64,
    pub total_calls_answered: i64,
    pub interested: i64,
    pub not_interested: i64,
    pub callback: i64,
    pub do_not_call: i64,
}

impl CounterDelta {
    /// Atendimento conta uma vez (calling -> answered); um resultado só conta
    /// se a ligação ainda não tinha um.
    pub fn for_result(
        previous: CallStatus,
        next: CallStatus,
        outcome: Option<CallOutcome>,
        had_outcome: bool,
    ) -> Self {
        let mut delta = CounterDelta::default();

        if next == CallStatus::Answered && previous != CallStatus::Answered {
            delta.pickups += 1;
            delta.total_calls_answered += 1;
        }
        if next == CallStatus::DoNotCall {
            delta.do_not_call += 1;
        }

        if let Some(outcome) = outcome.filter(|_| !had_outcome) {
            match outcome {
                CallOutcome::Interested => delta.interested += 1,
                CallOutcome::NotInterested => delta.not_interested += 1,
                CallOutcome::Callback => delta.callback += 1,
                CallOutcome::DoNotCall => delta.do_not_call += 1,
                CallOutcome::Voicemail | CallOutcome::WrongNumber => {}
            }
        }

        delta
    }

    pub fn is_empty(&self) -> bool {
        *self == CounterDelta::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_campaign() -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tenant: None,
            assistant_id: None,
            name: "Teste".into(),
            contact_source: ContactSource::ContactList,
            contact_list_id: Some(Uuid::new_v4()),
            csv_file_id: None,
            daily_cap: Some(10),
            calling_days: vec!["monday".into()],
            start_hour: 9,
            end_hour: 17,
            campaign_prompt: None,
            status: CampaignStatus::Active,
            execution_status: ExecutionStatus::Running,
            dials: 0,
            pickups: 0,
            do_not_call: 0,
            interested: 0,
            not_interested: 0,
            callback: 0,
            total_calls_made: 0,
            total_calls_answered: 0,
            current_daily_calls: 0,
            daily_counter_date: None,
            last_execution_at: None,
            next_call_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn commands_only_apply_from_their_source_states() {
        use ExecutionStatus::*;

        assert!(CampaignCommand::Start.can_apply(Idle));
        assert!(CampaignCommand::Start.can_apply(Paused));
        assert!(!CampaignCommand::Start.can_apply(Running));
        assert!(!CampaignCommand::Start.can_apply(Completed));

        assert!(CampaignCommand::Pause.can_apply(Running));
        assert!(!CampaignCommand::Pause.can_apply(Paused));

        assert!(CampaignCommand::Resume.can_apply(Paused));
        assert!(!CampaignCommand::Resume.can_apply(Idle));

        assert!(CampaignCommand::Stop.can_apply(Running));
        assert!(!CampaignCommand::Stop.can_apply(Completed));
    }

    #[test]
    fn rejection_keys_describe_the_current_state() {
        assert_eq!(
            CampaignCommand::Start.rejection_key(ExecutionStatus::Running),
            "campaign_already_running"
        );
        assert_eq!(
            CampaignCommand::Start.rejection_key(ExecutionStatus::Completed),
            "campaign_already_completed"
        );
        assert_eq!(
            CampaignCommand::Resume.rejection_key(ExecutionStatus::Running),
            "campaign_not_paused"
        );
        assert_eq!(
            CampaignCommand::Pause.rejection_key(ExecutionStatus::Idle),
            "campaign_not_running"
        );
    }

    #[test]
    fn sql_from_list_is_quoted() {
        assert_eq!(CampaignCommand::Pause.sql_from_list(), "'running'");
        assert_eq!(CampaignCommand::Start.sql_from_list(), "'idle', 'paused', 'error'");
    }

    #[test]
    fn call_lifecycle_only_moves_forward() {
        use CallStatus::*;

        assert!(Pending.can_transition_to(Queued));
        assert!(Queued.can_transition_to(Calling));
        assert!(Calling.can_transition_to(Answered));
        assert!(Calling.can_transition_to(Busy));
        assert!(Answered.can_transition_to(Completed));
        assert!(NoAnswer.can_transition_to(Completed));

        assert!(!Completed.can_transition_to(Pending));
        assert!(!Answered.can_transition_to(Calling));
        assert!(!Pending.can_transition_to(Answered));
        assert!(!Calling.can_transition_to(Completed));
        assert!(!Answered.can_transition_to(Busy));
    }

    #[test]
    fn outcome_requires_an_answered_call() {
        assert!(outcome_allowed(CallStatus::Calling, CallStatus::Answered));
        assert!(outcome_allowed(CallStatus::Answered, CallStatus::Completed));
        assert!(!outcome_allowed(CallStatus::NoAnswer, CallStatus::Completed));
        assert!(!outcome_allowed(CallStatus::Calling, CallStatus::Busy));
    }

    #[test]
    fn rates_are_percentages_of_the_right_base() {
        let mut campaign = sample_campaign();
        campaign.total_calls_made = 40;
        campaign.total_calls_answered = 10;
        campaign.interested = 3;
        campaign.callback = 1;

        let rates = CampaignRates::from_campaign(&campaign);
        assert_eq!(
            rates,
            CampaignRates { answer_rate: 25.0, success_rate: 30.0, interest_rate: 40.0 }
        );
    }

    #[test]
    fn rates_are_zero_without_calls() {
        let rates = CampaignRates::from_campaign(&sample_campaign());
        assert_eq!(rates, CampaignRates::default());
    }

    #[test]
    fn zero_daily_cap_means_unlimited() {
        let mut campaign = sample_campaign();
        campaign.daily_cap = Some(0);
        assert_eq!(campaign.remaining_today(), None);

        campaign.daily_cap = Some(5);
        campaign.current_daily_calls = 7;
        assert_eq!(campaign.remaining_today(), Some(0));
    }

    fn payload() -> CreateCampaignPayload {
        CreateCampaignPayload {
            name: "X".into(),
            assistant_id: None,
            contact_source: ContactSource::CsvFile,
            contact_list_id: None,
            csv_file_id: Some(Uuid::new_v4()),
            daily_cap: Some(10),
            calling_days: vec!["Monday".into(), "friday".into()],
            start_hour: 9,
            end_hour: 17,
            campaign_prompt: None,
        }
    }

    fn schema_codes(errors: &validator::ValidationErrors) -> Vec<String> {
        match errors.errors().get("__all__") {
            Some(validator::ValidationErrorsKind::Field(list)) => {
                list.iter().map(|e| e.code.to_string()).collect()
            }
            _ => vec![],
        }
    }

    #[test]
    fn valid_payload_passes_and_days_are_normalized() {
        let payload = payload();
        assert!(payload.validate().is_ok());
        assert_eq!(payload.normalized_days(), vec!["monday".to_string(), "friday".to_string()]);
    }

    #[test]
    fn payload_validation_catches_bad_hours_and_days() {
        let mut bad = payload();
        bad.calling_days = vec!["funday".into()];
        bad.start_hour = 18;
        bad.end_hour = 9;

        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("calling_days"));
        assert_eq!(schema_codes(&errors), vec!["invalid_hours".to_string()]);
    }

    #[test]
    fn empty_calling_days_are_rejected() {
        let mut bad = payload();
        bad.calling_days = vec![];

        let errors = bad.validate().unwrap_err();
        let codes: Vec<String> = errors.field_errors()["calling_days"]
            .iter()
            .map(|e| e.code.to_string())
            .collect();
        assert_eq!(codes, vec!["required".to_string()]);
    }

    #[test]
    fn repeated_days_are_removed_keeping_the_first_order() {
        let mut p = payload();
        p.calling_days = vec!["Monday".into(), "friday".into(), " monday ".into(), "FRIDAY".into()];
        assert_eq!(p.normalized_days(), vec!["monday".to_string(), "friday".to_string()]);
    }

    #[test]
    fn payload_validation_requires_the_source_reference() {
        let mut bad = payload();
        bad.csv_file_id = None;

        let errors = bad.validate().unwrap_err();
        assert_eq!(schema_codes(&errors), vec!["missing_csv_file".to_string()]);
    }

    #[test]
    fn call_counts_sum_up() {
        let mut counts = CallStatusCounts::default();
        counts.add(CallStatus::Pending, 4);
        counts.add(CallStatus::Answered, 2);
        counts.add(CallStatus::Pending, 1);
        assert_eq!(counts.pending, 5);
        assert_eq!(counts.total(), 7);
    }

    #[test]
    fn answered_call_bumps_pickups_once() {
        let first = CounterDelta::for_result(CallStatus::Calling, CallStatus::Answered, None, false);
        assert_eq!(first.pickups, 1);
        assert_eq!(first.total_calls_answered, 1);

        let closing = CounterDelta::for_result(
            CallStatus::Answered,
            CallStatus::Completed,
            Some(CallOutcome::Interested),
            false,
        );
        assert_eq!(
            closing,
            CounterDelta { interested: 1, ..CounterDelta::default() }
        );
    }

    #[test]
    fn outcome_is_not_counted_twice() {
        let delta = CounterDelta::for_result(
            CallStatus::Answered,
            CallStatus::Completed,
            Some(CallOutcome::Callback),
            true,
        );
        assert!(delta.is_empty());
    }

    #[test]
    fn do_not_call_status_bumps_its_counter() {
        let delta = CounterDelta::for_result(CallStatus::Calling, CallStatus::DoNotCall, None, false);
        assert_eq!(delta, CounterDelta { do_not_call: 1, ..CounterDelta::default() });
    }
}
