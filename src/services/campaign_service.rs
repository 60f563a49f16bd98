// src/services/campaign_service.rs

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::{campaign_repo::CallUpdate, CampaignRepository},
    models::{
        auth::User,
        campaign::{
            outcome_allowed, CallListQuery, CallOutcomeCounts, CallPage, CallResultPayload,
            CallStatus, CallStatusCounts, Campaign, CampaignCall, CampaignCommand, CampaignRates,
            CampaignStatusReport, CounterDelta, CreateCampaignPayload,
        },
        plan::ResourceType,
    },
    services::plan_limit_service::PlanLimitService,
};

// Espera antes de uma nova tentativa de ligação sem sucesso
pub const RETRY_BACKOFF_MINUTES: i64 = 60;

#[derive(Clone)]
pub struct CampaignService {
    repo: CampaignRepository,
    limits: PlanLimitService,
    pool: PgPool,
}

impl CampaignService {
    pub fn new(repo: CampaignRepository, limits: PlanLimitService, pool: PgPool) -> Self {
        Self { repo, limits, pool }
    }

    // =========================================================================
    //  CAMPANHAS
    // =========================================================================

    pub async fn create(&self, user: &User, payload: &CreateCampaignPayload) -> Result<Campaign, AppError> {
        self.limits.enforce(user.id, ResourceType::CallCampaign).await?;

        // O tenant da campanha é sempre o do dono
        let campaign = self
            .repo
            .create(&self.pool, user.id, user.tenant.as_deref(), payload)
            .await?;
        tracing::info!("📣 Campanha {} criada por {}", campaign.id, user.id);
        Ok(campaign)
    }

    pub async fn list(&self, user: &User) -> Result<Vec<Campaign>, AppError> {
        self.repo.list_by_user(user.id).await
    }

    pub async fn get(&self, user: &User, id: Uuid) -> Result<Campaign, AppError> {
        self.repo
            .find_owned(id, user.id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Campaign".into()))
    }

    pub async fn apply_command(
        &self,
        user: &User,
        id: Uuid,
        command: CampaignCommand,
    ) -> Result<Campaign, AppError> {
        let current = self.get(user, id).await?;
        if !command.can_apply(current.execution_status) {
            return Err(AppError::BusinessRule(command.rejection_key(current.execution_status)));
        }

        match self
            .repo
            .apply_command(&self.pool, id, user.id, command, Utc::now())
            .await?
        {
            Some(campaign) => {
                tracing::info!(
                    "▶️ Campanha {}: {:?} ({} -> {})",
                    id,
                    command,
                    current.execution_status.as_str(),
                    campaign.execution_status.as_str()
                );
                Ok(campaign)
            }
            // Outra requisição mudou o estado entre a leitura e o UPDATE
            None => {
                let latest = self.get(user, id).await?;
                Err(AppError::BusinessRule(command.rejection_key(latest.execution_status)))
            }
        }
    }

    pub async fn reset_daily(&self, user: &User, id: Uuid) -> Result<Campaign, AppError> {
        self.repo
            .reset_daily(id, user.id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Campaign".into()))
    }

    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), AppError> {
        self.get(user, id).await?;

        if !self.repo.delete_if_not_running(id, user.id).await? {
            return Err(AppError::BusinessRule("campaign_running_delete"));
        }
        tracing::info!("🗑️ Campanha {} removida", id);
        Ok(())
    }

    pub async fn status_report(&self, user: &User, id: Uuid) -> Result<CampaignStatusReport, AppError> {
        let campaign = self.get(user, id).await?;

        let mut calls_by_status = CallStatusCounts::default();
        for (status, count) in self.repo.count_calls_by_status(id).await? {
            calls_by_status.add(status, count);
        }

        let mut calls_by_outcome = CallOutcomeCounts::default();
        for (outcome, count) in self.repo.count_calls_by_outcome(id).await? {
            calls_by_outcome.add(outcome, count);
        }

        let rates = CampaignRates::from_campaign(&campaign);
        Ok(CampaignStatusReport {
            total_calls: calls_by_status.total(),
            campaign,
            calls_by_status,
            calls_by_outcome,
            rates,
        })
    }

    pub async fn list_calls(&self, user: &User, id: Uuid, query: &CallListQuery) -> Result<CallPage, AppError> {
        self.get(user, id).await?;

        let (calls, total) = self.repo.list_calls(id, query).await?;
        Ok(CallPage {
            calls,
            total,
            limit: query.effective_limit(),
            offset: query.effective_offset(),
        })
    }

    // =========================================================================
    //  RESULTADO DE LIGAÇÃO
    // =========================================================================

    /// Aplica o resultado reportado pelo discador numa transação: trava a
    /// ligação, valida a transição, grava e incrementa os contadores.
    pub async fn record_call_result(
        &self,
        call_id: Uuid,
        result: &CallResultPayload,
    ) -> Result<CampaignCall, AppError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let call = self
            .repo
            .lock_call(&mut *tx, call_id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Call".into()))?;

        let (update, delta) = plan_call_result(&call, result, now)?;

        let updated = self
            .repo
            .update_call(&mut *tx, call.id, call.status, &update)
            .await?
            .ok_or(AppError::Conflict("call_transition_invalid"))?;

        if !delta.is_empty() {
            self.repo.bump_counters(&mut *tx, call.campaign_id, &delta).await?;
        }

        tx.commit().await?;

        tracing::debug!(
            "📞 Ligação {}: {:?} -> {:?} (tentativa {}/{})",
            call.id,
            call.status,
            updated.status,
            updated.retry_count,
            updated.max_retries
        );
        Ok(updated)
    }
}

/// Decide o que gravar para um resultado de ligação, sem tocar no banco.
/// Tentativas sem sucesso voltam para `pending` enquanto houver retries.
pub fn plan_call_result(
    call: &CampaignCall,
    result: &CallResultPayload,
    now: DateTime<Utc>,
) -> Result<(CallUpdate, CounterDelta), AppError> {
    let previous = call.status;
    let next = result.status;

    if !previous.can_transition_to(next) {
        return Err(AppError::BusinessRule("call_transition_invalid"));
    }
    if result.outcome.is_some() && !outcome_allowed(previous, next) {
        return Err(AppError::BusinessRule("call_outcome_not_allowed"));
    }

    let delta = CounterDelta::for_result(previous, next, result.outcome, call.outcome.is_some());

    let update = if next.is_retryable() && call.can_retry() {
        CallUpdate {
            status: CallStatus::Pending,
            outcome: None,
            call_duration: result.call_duration,
            notes: result.notes.clone(),
            bump_retry: true,
            scheduled_at: Some(now + Duration::minutes(RETRY_BACKOFF_MINUTES)),
            completed_at: None,
        }
    } else {
        CallUpdate {
            status: next,
            outcome: result.outcome,
            call_duration: result.call_duration,
            notes: result.notes.clone(),
            bump_retry: false,
            scheduled_at: None,
            // Atendida ainda pode estar em andamento
            completed_at: (next != CallStatus::Answered).then_some(now),
        }
    };

    Ok((update, delta))
}
