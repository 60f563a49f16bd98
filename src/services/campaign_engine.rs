// src/services/campaign_engine.rs

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use reqwest::Client;
use serde::Serialize;
use sqlx::PgPool;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::{
    common::{error::AppError, signature::sign_hex},
    db::CampaignRepository,
    models::campaign::{CallResultPayload, CallStatus, CallTarget, Campaign, CampaignCall, ContactSource},
    services::campaign_service::CampaignService,
};

const MIN_PHONE_LEN: usize = 7;
const DUE_CAMPAIGNS_PER_TICK: i64 = 50;

// =============================================================================
//  JANELA DE DISCAGEM
// =============================================================================

/// Dias e horas em que a campanha pode ligar, num fuso fixo.
/// A janela é [start_hour, end_hour) no horário local.
#[derive(Debug, Clone)]
pub struct DialingWindow {
    days: Vec<Weekday>,
    start_hour: u32,
    end_hour: u32,
    offset: FixedOffset,
}

impl DialingWindow {
    pub fn new(days: Vec<Weekday>, start_hour: u32, end_hour: u32, offset: FixedOffset) -> Self {
        Self { days, start_hour, end_hour, offset }
    }

    /// Nomes de dia desconhecidos são ignorados.
    pub fn from_campaign(campaign: &Campaign, offset: FixedOffset) -> Self {
        let days = campaign
            .calling_days
            .iter()
            .filter_map(|d| d.trim().parse::<Weekday>().ok())
            .collect();
        Self::new(
            days,
            campaign.start_hour.clamp(0, 23) as u32,
            campaign.end_hour.clamp(0, 24) as u32,
            offset,
        )
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.offset);
        self.days.contains(&local.weekday())
            && local.hour() >= self.start_hour
            && local.hour() < self.end_hour
    }

    /// `now` se a janela está aberta; senão a próxima abertura.
    /// `None` quando não há nenhum dia configurado.
    pub fn next_opening(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.contains(now) {
            return Some(now);
        }
        self.first_opening_after(now, 0)
    }

    /// Primeira abertura num dia local posterior ao de `now` (cota diária esgotada).
    pub fn next_day_opening(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.first_opening_after(now, 1)
    }

    fn first_opening_after(&self, now: DateTime<Utc>, from_day: i64) -> Option<DateTime<Utc>> {
        let local = now.with_timezone(&self.offset);
        (from_day..=7).find_map(|ahead| {
            let date = local.date_naive() + Duration::days(ahead);
            if !self.days.contains(&date.weekday()) {
                return None;
            }
            let opening = date.and_hms_opt(self.start_hour, 0, 0)?;
            let opening = self.offset.from_local_datetime(&opening).single()?;
            (opening > local).then(|| opening.with_timezone(&Utc))
        })
    }

    /// Data local "de hoje" para o contador diário.
    pub fn local_date(offset: FixedOffset, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&offset).date_naive()
    }
}

/// Limpa o telefone e aplica as regras de prefixo; descarta números curtos.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let has_plus = trimmed.starts_with('+');
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return None;
    }

    let phone = if has_plus {
        format!("+{}", digits)
    } else if digits.starts_with("44") {
        format!("+{}", digits)
    } else if let Some(rest) = digits.strip_prefix('0') {
        format!("+44{}", rest)
    } else if digits.len() == 10 && digits.starts_with('4') {
        format!("+44{}", digits)
    } else {
        digits
    };

    (phone.len() >= MIN_PHONE_LEN).then_some(phone)
}

/// Normaliza e remove telefones repetidos, mantendo a primeira ocorrência.
pub fn prepare_targets(raw: Vec<CallTarget>) -> Vec<CallTarget> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter_map(|target| {
            let phone = normalize_phone(&target.phone_number)?;
            seen.insert(phone.clone()).then(|| CallTarget { phone_number: phone, ..target })
        })
        .collect()
}

// =============================================================================
//  DISCADOR
// =============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DialRequest {
    pub call_id: Uuid,
    pub campaign_id: Uuid,
    pub assistant_id: Option<Uuid>,
    pub phone_number: String,
    pub contact_name: Option<String>,
    pub campaign_prompt: Option<String>,
}

impl DialRequest {
    pub fn new(campaign: &Campaign, call: &CampaignCall) -> Self {
        let phone_number = if call.phone_number.starts_with('+') {
            call.phone_number.clone()
        } else {
            format!("+{}", call.phone_number)
        };
        Self {
            call_id: call.id,
            campaign_id: campaign.id,
            assistant_id: campaign.assistant_id,
            phone_number,
            contact_name: call.contact_name.clone(),
            campaign_prompt: campaign.campaign_prompt.clone(),
        }
    }
}

/// Quem efetivamente faz a ligação. O resultado volta depois pelo callback.
#[async_trait]
pub trait CallDialer: Send + Sync {
    async fn dial(&self, request: &DialRequest) -> Result<(), AppError>;
}

/// Discador externo via HTTP, com o corpo assinado em `X-Signature`.
pub struct HttpDialer {
    client: Client,
    url: String,
    secret: Option<String>,
}

impl HttpDialer {
    pub fn new(url: String, secret: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(StdDuration::from_secs(10)).build()?;
        Ok(Self { client, url, secret })
    }
}

#[async_trait]
impl CallDialer for HttpDialer {
    async fn dial(&self, request: &DialRequest) -> Result<(), AppError> {
        let body = serde_json::to_vec(request).map_err(anyhow::Error::from)?;

        let mut http_request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json");
        if let Some(secret) = &self.secret {
            http_request = http_request.header("X-Signature", sign_hex(secret, &body));
        }

        let response = http_request
            .body(body)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Discador inacessível: {}", e))?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!("Discador respondeu {}", response.status()).into());
        }
        Ok(())
    }
}

// =============================================================================
//  MOTOR
// =============================================================================

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub tick: StdDuration,
    pub batch_size: i64,
    pub call_interval: Duration,
    pub utc_offset: FixedOffset,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub campaigns: usize,
    pub dialed: usize,
    pub failed: usize,
}

/// O que o motor lê e grava. Cada método é uma operação atômica no banco.
#[async_trait]
pub trait EngineStore: Send + Sync {
    async fn reset_daily_counters(&self, today: NaiveDate) -> Result<u64, AppError>;
    async fn due_campaigns(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Campaign>, AppError>;
    async fn schedule_next(&self, campaign_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError>;
    async fn mark_completed(&self, campaign_id: Uuid) -> Result<(), AppError>;
    async fn mark_error(&self, campaign_id: Uuid) -> Result<(), AppError>;
    async fn count_calls(&self, campaign_id: Uuid) -> Result<i64, AppError>;
    async fn count_open_calls(&self, campaign_id: Uuid) -> Result<i64, AppError>;

    /// Contatos brutos da origem configurada na campanha.
    async fn load_targets(&self, campaign: &Campaign) -> Result<Vec<CallTarget>, AppError>;

    async fn insert_pending_calls(
        &self,
        campaign: &Campaign,
        targets: &[CallTarget],
        scheduled_at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Reserva (pending -> queued) até `limit` ligações vencidas.
    async fn claim_due_calls(&self, campaign_id: Uuid, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignCall>, AppError>;

    /// `false` quando a ligação já não estava em `queued`.
    async fn mark_calling(&self, call_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>;
    async fn record_dial(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError>;

    /// Mesmo caminho do callback do discador (retries inclusos).
    async fn record_call_result(&self, call_id: Uuid, result: &CallResultPayload) -> Result<CampaignCall, AppError>;
}

/// Implementação sobre o Postgres.
pub struct PgEngineStore {
    repo: CampaignRepository,
    campaigns: CampaignService,
    pool: PgPool,
}

impl PgEngineStore {
    pub fn new(repo: CampaignRepository, campaigns: CampaignService, pool: PgPool) -> Self {
        Self { repo, campaigns, pool }
    }
}

#[async_trait]
impl EngineStore for PgEngineStore {
    async fn reset_daily_counters(&self, today: NaiveDate) -> Result<u64, AppError> {
        self.repo.reset_daily_counters(today).await
    }

    async fn due_campaigns(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Campaign>, AppError> {
        self.repo.due_campaigns(now, limit).await
    }

    async fn schedule_next(&self, campaign_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
        self.repo.schedule_next(campaign_id, at).await?;
        Ok(())
    }

    async fn mark_completed(&self, campaign_id: Uuid) -> Result<(), AppError> {
        self.repo.mark_completed(campaign_id).await?;
        Ok(())
    }

    async fn mark_error(&self, campaign_id: Uuid) -> Result<(), AppError> {
        self.repo.mark_error(campaign_id).await
    }

    async fn count_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        self.repo.count_calls(campaign_id).await
    }

    async fn count_open_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        self.repo.count_open_calls(campaign_id).await
    }

    async fn load_targets(&self, campaign: &Campaign) -> Result<Vec<CallTarget>, AppError> {
        match (campaign.contact_source, campaign.contact_list_id, campaign.csv_file_id) {
            (ContactSource::ContactList, Some(list_id), _) => self.repo.load_list_targets(list_id).await,
            (ContactSource::CsvFile, _, Some(file_id)) => self.repo.load_csv_targets(file_id).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn insert_pending_calls(
        &self,
        campaign: &Campaign,
        targets: &[CallTarget],
        scheduled_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        self.repo.insert_pending_calls(campaign, targets, scheduled_at).await
    }

    async fn claim_due_calls(&self, campaign_id: Uuid, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignCall>, AppError> {
        let mut tx = self.pool.begin().await?;
        let claimed = self.repo.claim_due_calls(&mut *tx, campaign_id, now, limit).await?;
        tx.commit().await?;
        Ok(claimed)
    }

    async fn mark_calling(&self, call_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        self.repo.mark_calling(call_id, now).await
    }

    async fn record_dial(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
        self.repo.record_dial(campaign_id, now).await
    }

    async fn record_call_result(&self, call_id: Uuid, result: &CallResultPayload) -> Result<CampaignCall, AppError> {
        self.campaigns.record_call_result(call_id, result).await
    }
}

#[derive(Clone)]
pub struct CampaignEngine {
    store: Arc<dyn EngineStore>,
    dialer: Arc<dyn CallDialer>,
    settings: EngineSettings,
}

impl CampaignEngine {
    pub fn new(store: Arc<dyn EngineStore>, dialer: Arc<dyn CallDialer>, settings: EngineSettings) -> Self {
        Self { store, dialer, settings }
    }

    /// Loop periódico; erros de uma rodada são logados e a próxima segue.
    pub async fn run(self) {
        let mut ticker = interval(self.settings.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            "📞 Motor de campanhas iniciado (tick: {:?}, lote: {})",
            self.settings.tick,
            self.settings.batch_size
        );

        loop {
            ticker.tick().await;
            match self.tick(Utc::now()).await {
                Ok(summary) if summary.campaigns > 0 => {
                    tracing::debug!("Rodada do motor: {:?}", summary);
                }
                Ok(_) => {}
                Err(e) => tracing::error!("Erro na rodada do motor de campanhas: {}", e),
            }
        }
    }

    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickSummary, AppError> {
        let today = DialingWindow::local_date(self.settings.utc_offset, now);
        let reset = self.store.reset_daily_counters(today).await?;
        if reset > 0 {
            tracing::info!("🔄 Contador diário zerado em {} campanhas", reset);
        }

        let due = self.store.due_campaigns(now, DUE_CAMPAIGNS_PER_TICK).await?;
        let mut summary = TickSummary { campaigns: due.len(), ..Default::default() };

        for campaign in &due {
            match self.run_campaign(campaign, now).await {
                Ok((dialed, failed)) => {
                    summary.dialed += dialed;
                    summary.failed += failed;
                }
                Err(e) => {
                    tracing::error!("❌ Campanha {} falhou: {}", campaign.id, e);
                    // Uma campanha com problema não pode travar as demais da rodada
                    if let Err(mark_err) = self.store.mark_error(campaign.id).await {
                        tracing::error!("Não foi possível marcar a campanha {} com erro: {}", campaign.id, mark_err);
                    }
                }
            }
        }

        Ok(summary)
    }

    async fn run_campaign(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<(usize, usize), AppError> {
        let window = DialingWindow::from_campaign(campaign, self.settings.utc_offset);

        if !window.contains(now) {
            self.defer(campaign, window.next_opening(now)).await?;
            return Ok((0, 0));
        }

        let remaining = campaign.remaining_today();
        if remaining == Some(0) {
            tracing::info!("Campanha {} atingiu a cota diária", campaign.id);
            self.defer(campaign, window.next_day_opening(now)).await?;
            return Ok((0, 0));
        }

        if self.store.count_calls(campaign.id).await? == 0 {
            let created = self.materialize_calls(campaign, now).await?;
            if created == 0 {
                tracing::warn!("Campanha {} não tem contatos com telefone válido", campaign.id);
                self.store.mark_completed(campaign.id).await?;
                return Ok((0, 0));
            }
        }

        let batch = remaining
            .map(|r| i64::from(r).min(self.settings.batch_size))
            .unwrap_or(self.settings.batch_size);

        let claimed = self.store.claim_due_calls(campaign.id, now, batch).await?;

        if claimed.is_empty() {
            if self.store.count_open_calls(campaign.id).await? == 0 {
                tracing::info!("✅ Campanha {} concluída", campaign.id);
                self.store.mark_completed(campaign.id).await?;
            } else {
                // Só restam retries agendados para mais tarde
                self.store.schedule_next(campaign.id, now + self.settings.call_interval).await?;
            }
            return Ok((0, 0));
        }

        let (mut dialed, mut failed) = (0, 0);
        for call in &claimed {
            if self.place_call(campaign, call, now).await? {
                dialed += 1;
            } else {
                failed += 1;
            }
        }

        self.store.schedule_next(campaign.id, now + self.settings.call_interval).await?;
        Ok((dialed, failed))
    }

    /// `Ok(false)` quando o discador recusou; a ligação segue as regras de retry.
    async fn place_call(&self, campaign: &Campaign, call: &CampaignCall, now: DateTime<Utc>) -> Result<bool, AppError> {
        if !self.store.mark_calling(call.id, now).await? {
            return Ok(false);
        }

        match self.dialer.dial(&DialRequest::new(campaign, call)).await {
            Ok(()) => {
                self.store.record_dial(campaign.id, now).await?;
                Ok(true)
            }
            Err(e) => {
                tracing::warn!("Falha ao discar {} ({}): {}", call.id, call.phone_number, e);
                let failure = CallResultPayload {
                    status: CallStatus::Failed,
                    outcome: None,
                    call_duration: None,
                    notes: Some(format!("dial error: {}", e)),
                };
                self.store.record_call_result(call.id, &failure).await?;
                Ok(false)
            }
        }
    }

    async fn materialize_calls(&self, campaign: &Campaign, now: DateTime<Utc>) -> Result<u64, AppError> {
        let targets = prepare_targets(self.store.load_targets(campaign).await?);
        let created = self.store.insert_pending_calls(campaign, &targets, now).await?;
        tracing::info!("📋 {} ligações criadas para a campanha {}", created, campaign.id);
        Ok(created)
    }

    async fn defer(&self, campaign: &Campaign, next: Option<DateTime<Utc>>) -> Result<(), AppError> {
        match next {
            Some(at) => self.store.schedule_next(campaign.id, at).await,
            None => Err(anyhow::anyhow!("campanha sem dias de discagem válidos").into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::campaign_service::plan_call_result;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    fn weekdays_9_to_17(offset_hours: i32) -> DialingWindow {
        DialingWindow::new(
            vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri],
            9,
            17,
            FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        )
    }

    // 2025-03-03 é segunda-feira
    #[test]
    fn window_contains_is_half_open() {
        let window = weekdays_9_to_17(0);
        assert!(window.contains(utc(2025, 3, 3, 9, 0)));
        assert!(window.contains(utc(2025, 3, 3, 16, 59)));
        assert!(!window.contains(utc(2025, 3, 3, 17, 0)));
        assert!(!window.contains(utc(2025, 3, 3, 8, 59)));
        // sábado
        assert!(!window.contains(utc(2025, 3, 8, 12, 0)));
    }

    #[test]
    fn next_opening_is_now_inside_the_window() {
        let now = utc(2025, 3, 3, 10, 30);
        assert_eq!(weekdays_9_to_17(0).next_opening(now), Some(now));
    }

    #[test]
    fn next_opening_same_day_before_start() {
        let window = weekdays_9_to_17(0);
        assert_eq!(window.next_opening(utc(2025, 3, 3, 7, 15)), Some(utc(2025, 3, 3, 9, 0)));
    }

    #[test]
    fn next_opening_skips_the_weekend() {
        let window = weekdays_9_to_17(0);
        // sexta depois do expediente -> segunda 09:00
        assert_eq!(window.next_opening(utc(2025, 3, 7, 18, 0)), Some(utc(2025, 3, 10, 9, 0)));
    }

    #[test]
    fn next_opening_respects_the_offset() {
        // UTC-3: 11:00 UTC = 08:00 local, abre às 09:00 local = 12:00 UTC
        let window = weekdays_9_to_17(-3);
        assert!(!window.contains(utc(2025, 3, 3, 11, 0)));
        assert_eq!(window.next_opening(utc(2025, 3, 3, 11, 0)), Some(utc(2025, 3, 3, 12, 0)));
    }

    #[test]
    fn next_day_opening_skips_today_even_inside_the_window() {
        let window = weekdays_9_to_17(0);
        assert_eq!(window.next_day_opening(utc(2025, 3, 3, 10, 0)), Some(utc(2025, 3, 4, 9, 0)));
    }

    #[test]
    fn single_day_window_wraps_to_next_week() {
        let window = DialingWindow::new(vec![Weekday::Mon], 9, 17, FixedOffset::east_opt(0).unwrap());
        assert_eq!(window.next_opening(utc(2025, 3, 3, 18, 0)), Some(utc(2025, 3, 10, 9, 0)));
    }

    #[test]
    fn no_days_means_no_opening() {
        let window = DialingWindow::new(vec![], 9, 17, FixedOffset::east_opt(0).unwrap());
        assert_eq!(window.next_opening(utc(2025, 3, 3, 10, 0)), None);
    }

    #[test]
    fn phones_are_normalized() {
        assert_eq!(normalize_phone("+1 (555) 123-4567").as_deref(), Some("+15551234567"));
        assert_eq!(normalize_phone("447700900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("07700 900123").as_deref(), Some("+447700900123"));
        assert_eq!(normalize_phone("4155550100").as_deref(), Some("+444155550100"));
        assert_eq!(normalize_phone("5551234567").as_deref(), Some("5551234567"));
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("n/a"), None);
    }

    #[test]
    fn targets_are_deduplicated_after_normalization() {
        let prepared = prepare_targets(vec![
            target("+1 555 123 4567"),
            target("+15551234567"),
            target("123"),
            target("+15550000000"),
        ]);

        let phones: Vec<&str> = prepared.iter().map(|t| t.phone_number.as_str()).collect();
        assert_eq!(phones, vec!["+15551234567", "+15550000000"]);
    }

    fn call_fixture(campaign_id: Uuid, phone: &str, status: CallStatus) -> CampaignCall {
        let now = Utc::now();
        CampaignCall {
            id: Uuid::new_v4(),
            campaign_id,
            tenant: None,
            contact_id: None,
            contact_name: None,
            phone_number: phone.into(),
            email: None,
            status,
            outcome: None,
            retry_count: 0,
            max_retries: 2,
            call_duration: None,
            notes: None,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    // Segunda a sexta, 09h-17h, sem limite diário
    fn campaign_fixture() -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            tenant: None,
            assistant_id: None,
            name: "c".into(),
            contact_source: ContactSource::CsvFile,
            contact_list_id: None,
            csv_file_id: Some(Uuid::new_v4()),
            daily_cap: None,
            calling_days: ["monday", "tuesday", "wednesday", "thursday", "friday"]
                .into_iter()
                .map(String::from)
                .collect(),
            start_hour: 9,
            end_hour: 17,
            campaign_prompt: Some("Be brief".into()),
            status: crate::models::campaign::CampaignStatus::Active,
            execution_status: crate::models::campaign::ExecutionStatus::Running,
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

    fn target(phone: &str) -> CallTarget {
        CallTarget {
            contact_id: None,
            contact_name: None,
            phone_number: phone.into(),
            email: None,
        }
    }

    #[test]
    fn dial_request_always_has_a_plus_prefix() {
        let campaign = campaign_fixture();
        let call = call_fixture(campaign.id, "5551234567", CallStatus::Queued);

        let request = DialRequest::new(&campaign, &call);
        assert_eq!(request.phone_number, "+5551234567");
        assert_eq!(request.campaign_prompt.as_deref(), Some("Be brief"));
    }

    // --- motor com armazenamento em memória ---

    #[derive(Default)]
    struct FakeEngineStore {
        campaigns: Vec<Campaign>,
        targets: Vec<CallTarget>,
        broken_source: Option<Uuid>,
        mark_error_fails: bool,
        calls: Mutex<Vec<CampaignCall>>,
        scheduled: Mutex<Vec<(Uuid, DateTime<Utc>)>>,
        completed: Mutex<Vec<Uuid>>,
        errored: Mutex<Vec<Uuid>>,
        dials: Mutex<Vec<Uuid>>,
    }

    fn is_open(status: CallStatus) -> bool {
        matches!(status, CallStatus::Pending | CallStatus::Queued | CallStatus::Calling)
    }

    #[async_trait]
    impl EngineStore for FakeEngineStore {
        async fn reset_daily_counters(&self, _today: NaiveDate) -> Result<u64, AppError> {
            Ok(0)
        }

        async fn due_campaigns(&self, _now: DateTime<Utc>, _limit: i64) -> Result<Vec<Campaign>, AppError> {
            Ok(self.campaigns.clone())
        }

        async fn schedule_next(&self, campaign_id: Uuid, at: DateTime<Utc>) -> Result<(), AppError> {
            self.scheduled.lock().unwrap().push((campaign_id, at));
            Ok(())
        }

        async fn mark_completed(&self, campaign_id: Uuid) -> Result<(), AppError> {
            self.completed.lock().unwrap().push(campaign_id);
            Ok(())
        }

        async fn mark_error(&self, campaign_id: Uuid) -> Result<(), AppError> {
            if self.mark_error_fails {
                return Err(anyhow::anyhow!("connection reset").into());
            }
            self.errored.lock().unwrap().push(campaign_id);
            Ok(())
        }

        async fn count_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
            let calls = self.calls.lock().unwrap();
            Ok(calls.iter().filter(|c| c.campaign_id == campaign_id).count() as i64)
        }

        async fn count_open_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
            let calls = self.calls.lock().unwrap();
            Ok(calls
                .iter()
                .filter(|c| c.campaign_id == campaign_id && is_open(c.status))
                .count() as i64)
        }

        async fn load_targets(&self, campaign: &Campaign) -> Result<Vec<CallTarget>, AppError> {
            if self.broken_source == Some(campaign.id) {
                return Err(anyhow::anyhow!("csv file missing").into());
            }
            Ok(self.targets.clone())
        }

        async fn insert_pending_calls(
            &self,
            campaign: &Campaign,
            targets: &[CallTarget],
            scheduled_at: DateTime<Utc>,
        ) -> Result<u64, AppError> {
            let mut calls = self.calls.lock().unwrap();
            for t in targets {
                let mut call = call_fixture(campaign.id, &t.phone_number, CallStatus::Pending);
                call.scheduled_at = Some(scheduled_at);
                calls.push(call);
            }
            Ok(targets.len() as u64)
        }

        async fn claim_due_calls(&self, campaign_id: Uuid, now: DateTime<Utc>, limit: i64) -> Result<Vec<CampaignCall>, AppError> {
            let mut calls = self.calls.lock().unwrap();
            Ok(calls
                .iter_mut()
                .filter(|c| {
                    c.campaign_id == campaign_id
                        && c.status == CallStatus::Pending
                        && c.scheduled_at.is_none_or(|at| at <= now)
                })
                .take(limit as usize)
                .map(|c| {
                    c.status = CallStatus::Queued;
                    c.clone()
                })
                .collect())
        }

        async fn mark_calling(&self, call_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
            let mut calls = self.calls.lock().unwrap();
            match calls.iter_mut().find(|c| c.id == call_id && c.status == CallStatus::Queued) {
                Some(call) => {
                    call.status = CallStatus::Calling;
                    call.started_at = Some(now);
                    Ok(true)
                }
                None => Ok(false),
            }
        }

        async fn record_dial(&self, campaign_id: Uuid, _now: DateTime<Utc>) -> Result<(), AppError> {
            self.dials.lock().unwrap().push(campaign_id);
            Ok(())
        }

        async fn record_call_result(&self, call_id: Uuid, result: &CallResultPayload) -> Result<CampaignCall, AppError> {
            let mut calls = self.calls.lock().unwrap();
            let call = calls
                .iter_mut()
                .find(|c| c.id == call_id)
                .ok_or_else(|| AppError::ResourceNotFound("Call".into()))?;

            let (update, _) = plan_call_result(call, result, Utc::now())?;
            call.status = update.status;
            call.outcome = update.outcome;
            call.notes = update.notes;
            call.scheduled_at = update.scheduled_at;
            call.completed_at = update.completed_at;
            if update.bump_retry {
                call.retry_count += 1;
            }
            Ok(call.clone())
        }
    }

    #[derive(Default)]
    struct FakeDialer {
        fail: bool,
        requests: Mutex<Vec<DialRequest>>,
    }

    #[async_trait]
    impl CallDialer for FakeDialer {
        async fn dial(&self, request: &DialRequest) -> Result<(), AppError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(anyhow::anyhow!("Discador respondeu 503").into());
            }
            Ok(())
        }
    }

    fn engine(store: Arc<FakeEngineStore>, dialer: Arc<FakeDialer>) -> CampaignEngine {
        let settings = EngineSettings {
            tick: StdDuration::from_secs(30),
            batch_size: 10,
            call_interval: Duration::minutes(2),
            utc_offset: FixedOffset::east_opt(0).unwrap(),
        };
        CampaignEngine::new(store, dialer, settings)
    }

    // Segunda-feira dentro do expediente
    fn monday_morning() -> DateTime<Utc> {
        utc(2025, 3, 3, 10, 0)
    }

    #[tokio::test]
    async fn tick_dials_claimed_calls_and_reschedules() {
        let campaign = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![campaign.clone()],
            targets: vec![target("+15551234567"), target("+1 555 123 4567"), target("+15550000000")],
            ..Default::default()
        });
        let dialer = Arc::new(FakeDialer::default());
        let now = monday_morning();

        let summary = engine(store.clone(), dialer.clone()).tick(now).await.unwrap();

        assert_eq!(summary, TickSummary { campaigns: 1, dialed: 2, failed: 0 });
        assert_eq!(*store.dials.lock().unwrap(), vec![campaign.id, campaign.id]);
        assert_eq!(*store.scheduled.lock().unwrap(), vec![(campaign.id, now + Duration::minutes(2))]);
        let phones: Vec<String> = dialer.requests.lock().unwrap().iter().map(|r| r.phone_number.clone()).collect();
        assert_eq!(phones, vec!["+15551234567", "+15550000000"]);
        assert!(store.calls.lock().unwrap().iter().all(|c| c.status == CallStatus::Calling));
    }

    #[tokio::test]
    async fn exhausted_daily_cap_waits_for_the_next_day_opening() {
        let mut campaign = campaign_fixture();
        campaign.daily_cap = Some(5);
        campaign.current_daily_calls = 5;
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![campaign.clone()],
            targets: vec![target("+15551234567")],
            ..Default::default()
        });
        let dialer = Arc::new(FakeDialer::default());

        let summary = engine(store.clone(), dialer.clone()).tick(monday_morning()).await.unwrap();

        assert_eq!(summary.dialed, 0);
        assert_eq!(*store.scheduled.lock().unwrap(), vec![(campaign.id, utc(2025, 3, 4, 9, 0))]);
        assert!(store.calls.lock().unwrap().is_empty());
        assert!(dialer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn outside_the_window_waits_for_the_next_opening() {
        let campaign = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![campaign.clone()],
            targets: vec![target("+15551234567")],
            ..Default::default()
        });
        let dialer = Arc::new(FakeDialer::default());

        // sábado
        engine(store.clone(), dialer.clone()).tick(utc(2025, 3, 8, 12, 0)).await.unwrap();

        assert_eq!(*store.scheduled.lock().unwrap(), vec![(campaign.id, utc(2025, 3, 10, 9, 0))]);
        assert!(dialer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn campaign_without_valid_phones_is_completed() {
        let campaign = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![campaign.clone()],
            targets: vec![target("123"), target("n/a")],
            ..Default::default()
        });
        let dialer = Arc::new(FakeDialer::default());

        engine(store.clone(), dialer.clone()).tick(monday_morning()).await.unwrap();

        assert_eq!(*store.completed.lock().unwrap(), vec![campaign.id]);
        assert!(store.calls.lock().unwrap().is_empty());
        assert!(dialer.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn dial_failure_sends_the_call_back_to_pending_with_a_retry() {
        let campaign = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![campaign.clone()],
            targets: vec![target("+15551234567")],
            ..Default::default()
        });
        let dialer = Arc::new(FakeDialer { fail: true, ..Default::default() });

        let summary = engine(store.clone(), dialer).tick(monday_morning()).await.unwrap();

        assert_eq!(summary, TickSummary { campaigns: 1, dialed: 0, failed: 1 });
        assert!(store.dials.lock().unwrap().is_empty());
        let calls = store.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].status, CallStatus::Pending);
        assert_eq!(calls[0].retry_count, 1);
        assert!(calls[0].scheduled_at.is_some());
        assert!(calls[0].notes.as_deref().is_some_and(|n| n.starts_with("dial error")));
    }

    #[tokio::test]
    async fn failing_campaign_is_marked_with_error() {
        let broken = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![broken.clone()],
            broken_source: Some(broken.id),
            ..Default::default()
        });

        let summary = engine(store.clone(), Arc::new(FakeDialer::default()))
            .tick(monday_morning())
            .await
            .unwrap();

        assert_eq!(summary.campaigns, 1);
        assert_eq!(*store.errored.lock().unwrap(), vec![broken.id]);
    }

    #[tokio::test]
    async fn mark_error_failure_does_not_stop_the_round() {
        let broken = campaign_fixture();
        let healthy = campaign_fixture();
        let store = Arc::new(FakeEngineStore {
            campaigns: vec![broken.clone(), healthy.clone()],
            targets: vec![target("+15551234567")],
            broken_source: Some(broken.id),
            mark_error_fails: true,
            ..Default::default()
        });

        let summary = engine(store.clone(), Arc::new(FakeDialer::default()))
            .tick(monday_morning())
            .await
            .unwrap();

        assert_eq!(summary, TickSummary { campaigns: 2, dialed: 1, failed: 0 });
        assert!(store.errored.lock().unwrap().is_empty());
        assert_eq!(*store.dials.lock().unwrap(), vec![healthy.id]);
    }
}
