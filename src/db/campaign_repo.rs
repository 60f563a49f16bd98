// src/db/campaign_repo.rs

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::campaign::{
        CallListQuery, CallOutcome, CallStatus, CallTarget, Campaign, CampaignCall,
        CampaignCommand, CounterDelta, CreateCampaignPayload,
    },
};

const CAMPAIGN_COLUMNS: &str = r#"
    id, user_id, tenant, assistant_id, name, contact_source, contact_list_id, csv_file_id,
    daily_cap, calling_days, start_hour, end_hour, campaign_prompt, status, execution_status,
    dials, pickups, do_not_call, interested, not_interested, callback,
    total_calls_made, total_calls_answered, current_daily_calls, daily_counter_date,
    last_execution_at, next_call_at, created_at, updated_at
"#;

const CALL_COLUMNS: &str = r#"
    id, campaign_id, tenant, contact_id, contact_name, phone_number, email, status, outcome,
    retry_count, max_retries, call_duration, notes, scheduled_at, started_at, completed_at,
    created_at, updated_at
"#;

// Atualização de uma ligação já validada pelo serviço
#[derive(Debug, Clone)]
pub struct CallUpdate {
    pub status: CallStatus,
    pub outcome: Option<CallOutcome>,
    pub call_duration: Option<i32>,
    pub notes: Option<String>,
    pub bump_retry: bool,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct CampaignRepository {
    pool: PgPool,
}

impl CampaignRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  CAMPANHAS
    // =========================================================================

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        tenant: Option<&str>,
        payload: &CreateCampaignPayload,
    ) -> Result<Campaign, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO campaigns (
                user_id, tenant, assistant_id, name, contact_source, contact_list_id, csv_file_id,
                daily_cap, calling_days, start_hour, end_hour, campaign_prompt
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );

        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(user_id)
            .bind(tenant)
            .bind(payload.assistant_id)
            .bind(payload.name.trim())
            .bind(payload.contact_source)
            .bind(payload.contact_list_id)
            .bind(payload.csv_file_id)
            .bind(payload.daily_cap)
            .bind(payload.normalized_days())
            .bind(payload.start_hour)
            .bind(payload.end_hour)
            .bind(payload.campaign_prompt.as_deref())
            .fetch_one(executor)
            .await?;
        Ok(campaign)
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Campaign>, AppError> {
        let sql = format!(
            "SELECT {} FROM campaigns WHERE user_id = $1 ORDER BY created_at DESC",
            CAMPAIGN_COLUMNS
        );
        let campaigns = sqlx::query_as::<_, Campaign>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(campaigns)
    }

    pub async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            "SELECT {} FROM campaigns WHERE id = $1 AND user_id = $2",
            CAMPAIGN_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(campaign)
    }

    /// Aplica um comando só se o estado de execução atual permitir (compare-and-set).
    /// `None` significa que a campanha mudou de estado no meio do caminho.
    pub async fn apply_command<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        user_id: Uuid,
        command: CampaignCommand,
        now: DateTime<Utc>,
    ) -> Result<Option<Campaign>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let assignments = match command {
            CampaignCommand::Start => {
                "status = 'active', execution_status = 'running', next_call_at = $3, \
                 current_daily_calls = 0, daily_counter_date = NULL"
            }
            CampaignCommand::Resume => {
                "status = 'active', execution_status = 'running', next_call_at = $3"
            }
            CampaignCommand::Pause => "status = 'paused', execution_status = 'paused'",
            CampaignCommand::Stop => {
                "status = 'completed', execution_status = 'completed', next_call_at = NULL"
            }
        };

        let sql = format!(
            r#"
            UPDATE campaigns
            SET {}, updated_at = $3
            WHERE id = $1 AND user_id = $2 AND execution_status IN ({})
            RETURNING {}
            "#,
            assignments,
            command.sql_from_list(),
            CAMPAIGN_COLUMNS
        );

        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(now)
            .fetch_optional(executor)
            .await?;
        Ok(campaign)
    }

    pub async fn reset_daily(&self, id: Uuid, user_id: Uuid) -> Result<Option<Campaign>, AppError> {
        let sql = format!(
            r#"
            UPDATE campaigns
            SET current_daily_calls = 0, updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            CAMPAIGN_COLUMNS
        );
        let campaign = sqlx::query_as::<_, Campaign>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(campaign)
    }

    /// Apaga a campanha (e as ligações, em cascata) desde que não esteja rodando.
    pub async fn delete_if_not_running(&self, id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM campaigns WHERE id = $1 AND user_id = $2 AND execution_status <> 'running'",
        )
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_calls_by_status(&self, campaign_id: Uuid) -> Result<Vec<(CallStatus, i64)>, AppError> {
        let rows = sqlx::query_as::<_, (CallStatus, i64)>(
            "SELECT status, COUNT(*) FROM campaign_calls WHERE campaign_id = $1 GROUP BY status",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn count_calls_by_outcome(&self, campaign_id: Uuid) -> Result<Vec<(CallOutcome, i64)>, AppError> {
        let rows = sqlx::query_as::<_, (CallOutcome, i64)>(
            r#"
            SELECT outcome, COUNT(*) FROM campaign_calls
            WHERE campaign_id = $1 AND outcome IS NOT NULL
            GROUP BY outcome
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_calls(
        &self,
        campaign_id: Uuid,
        query: &CallListQuery,
    ) -> Result<(Vec<CampaignCall>, i64), AppError> {
        let sort = query.sort_by.unwrap_or_default();
        let order = query.sort_order.unwrap_or_default();

        // Coluna e direção vêm de enums fechados, nunca do texto do cliente
        let sql = format!(
            r#"
            SELECT {} FROM campaign_calls
            WHERE campaign_id = $1
              AND ($2::call_status IS NULL OR status = $2)
              AND ($3::call_outcome IS NULL OR outcome = $3)
            ORDER BY {} {} NULLS LAST, id
            LIMIT $4 OFFSET $5
            "#,
            CALL_COLUMNS,
            sort.column(),
            order.keyword()
        );

        let calls = sqlx::query_as::<_, CampaignCall>(&sql)
            .bind(campaign_id)
            .bind(query.status)
            .bind(query.outcome)
            .bind(query.effective_limit())
            .bind(query.effective_offset())
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM campaign_calls
            WHERE campaign_id = $1
              AND ($2::call_status IS NULL OR status = $2)
              AND ($3::call_outcome IS NULL OR outcome = $3)
            "#,
        )
        .bind(campaign_id)
        .bind(query.status)
        .bind(query.outcome)
        .fetch_one(&self.pool)
        .await?;

        Ok((calls, total))
    }

    // =========================================================================
    //  LIGAÇÕES (callback do discador)
    // =========================================================================

    /// Trava a linha da ligação até o fim da transação.
    pub async fn lock_call<'e, E>(&self, executor: E, call_id: Uuid) -> Result<Option<CampaignCall>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM campaign_calls WHERE id = $1 FOR UPDATE", CALL_COLUMNS);
        let call = sqlx::query_as::<_, CampaignCall>(&sql)
            .bind(call_id)
            .fetch_optional(executor)
            .await?;
        Ok(call)
    }

    /// Grava a atualização desde que o status ainda seja `expected`.
    pub async fn update_call<'e, E>(
        &self,
        executor: E,
        call_id: Uuid,
        expected: CallStatus,
        update: &CallUpdate,
    ) -> Result<Option<CampaignCall>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE campaign_calls SET
                status = $3,
                outcome = COALESCE($4, outcome),
                call_duration = COALESCE($5, call_duration),
                notes = COALESCE($6, notes),
                retry_count = retry_count + CASE WHEN $7 THEN 1 ELSE 0 END,
                scheduled_at = COALESCE($8, scheduled_at),
                completed_at = $9,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            CALL_COLUMNS
        );

        let call = sqlx::query_as::<_, CampaignCall>(&sql)
            .bind(call_id)
            .bind(expected)
            .bind(update.status)
            .bind(update.outcome)
            .bind(update.call_duration)
            .bind(update.notes.as_deref())
            .bind(update.bump_retry)
            .bind(update.scheduled_at)
            .bind(update.completed_at)
            .fetch_optional(executor)
            .await?;
        Ok(call)
    }

    /// Incrementos atômicos; nunca lê-modifica-escreve no Rust.
    pub async fn bump_counters<'e, E>(&self, executor: E, campaign_id: Uuid, delta: &CounterDelta) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                pickups = pickups + $2,
                total_calls_answered = total_calls_answered + $3,
                interested = interested + $4,
                not_interested = not_interested + $5,
                callback = callback + $6,
                do_not_call = do_not_call + $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(delta.pickups)
        .bind(delta.total_calls_answered)
        .bind(delta.interested)
        .bind(delta.not_interested)
        .bind(delta.callback)
        .bind(delta.do_not_call)
        .execute(executor)
        .await?;
        Ok(())
    }

    // =========================================================================
    //  MOTOR DE DISCAGEM
    // =========================================================================

    /// Zera o contador diário das campanhas cujo dia de contagem ficou para trás.
    pub async fn reset_daily_counters(&self, today: NaiveDate) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET current_daily_calls = 0, daily_counter_date = $1, updated_at = NOW()
            WHERE daily_counter_date IS DISTINCT FROM $1
              AND execution_status IN ('running', 'paused')
            "#,
        )
        .bind(today)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn due_campaigns(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Campaign>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM campaigns
            WHERE execution_status = 'running' AND next_call_at <= $1
            ORDER BY next_call_at ASC
            LIMIT $2
            "#,
            CAMPAIGN_COLUMNS
        );
        let campaigns = sqlx::query_as::<_, Campaign>(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(campaigns)
    }

    /// Reagenda a próxima rodada, só se a campanha continua rodando.
    pub async fn schedule_next(&self, campaign_id: Uuid, next_call_at: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns SET next_call_at = $2, updated_at = NOW()
            WHERE id = $1 AND execution_status = 'running'
            "#,
        )
        .bind(campaign_id)
        .bind(next_call_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_completed(&self, campaign_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = 'completed', execution_status = 'completed', next_call_at = NULL, updated_at = NOW()
            WHERE id = $1 AND execution_status = 'running'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_error(&self, campaign_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE campaigns SET execution_status = 'error', updated_at = NOW()
            WHERE id = $1 AND execution_status = 'running'
            "#,
        )
        .bind(campaign_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn count_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM campaign_calls WHERE campaign_id = $1")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_open_calls(&self, campaign_id: Uuid) -> Result<i64, AppError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM campaign_calls
            WHERE campaign_id = $1 AND status IN ('pending', 'queued', 'calling')
            "#,
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn load_list_targets(&self, list_id: Uuid) -> Result<Vec<CallTarget>, AppError> {
        let targets = sqlx::query_as::<_, CallTarget>(
            r#"
            SELECT id AS contact_id,
                   NULLIF(TRIM(first_name || ' ' || last_name), '') AS contact_name,
                   phone AS phone_number,
                   email
            FROM contacts
            WHERE list_id = $1 AND NOT do_not_call AND phone IS NOT NULL
            ORDER BY created_at
            "#,
        )
        .bind(list_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(targets)
    }

    pub async fn load_csv_targets(&self, csv_file_id: Uuid) -> Result<Vec<CallTarget>, AppError> {
        let targets = sqlx::query_as::<_, CallTarget>(
            r#"
            SELECT id AS contact_id,
                   NULLIF(TRIM(first_name || ' ' || last_name), '') AS contact_name,
                   phone AS phone_number,
                   email
            FROM csv_contacts
            WHERE csv_file_id = $1 AND NOT do_not_call AND phone IS NOT NULL
            ORDER BY created_at
            "#,
        )
        .bind(csv_file_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(targets)
    }

    /// Cria as ligações pendentes; telefones repetidos na campanha são ignorados.
    pub async fn insert_pending_calls(
        &self,
        campaign: &Campaign,
        targets: &[CallTarget],
        scheduled_at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        if targets.is_empty() {
            return Ok(0);
        }

        let contact_ids: Vec<Option<Uuid>> = targets.iter().map(|t| t.contact_id).collect();
        let names: Vec<Option<String>> = targets.iter().map(|t| t.contact_name.clone()).collect();
        let phones: Vec<String> = targets.iter().map(|t| t.phone_number.clone()).collect();
        let emails: Vec<Option<String>> = targets.iter().map(|t| t.email.clone()).collect();

        let result = sqlx::query(
            r#"
            INSERT INTO campaign_calls (
                campaign_id, tenant, contact_id, contact_name, phone_number, email, status, scheduled_at
            )
            SELECT $1, $2, t.contact_id, t.contact_name, t.phone_number, t.email, 'pending', $3
            FROM UNNEST($4::uuid[], $5::text[], $6::text[], $7::text[])
                AS t(contact_id, contact_name, phone_number, email)
            ON CONFLICT (campaign_id, phone_number) DO NOTHING
            "#,
        )
        .bind(campaign.id)
        .bind(campaign.tenant.as_deref())
        .bind(scheduled_at)
        .bind(contact_ids)
        .bind(names)
        .bind(phones)
        .bind(emails)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reserva até `limit` ligações vencidas (pending -> queued). Workers
    /// concorrentes nunca pegam a mesma linha.
    pub async fn claim_due_calls<'e, E>(
        &self,
        executor: E,
        campaign_id: Uuid,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<CampaignCall>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE campaign_calls SET status = 'queued', updated_at = $2
            WHERE id IN (
                SELECT id FROM campaign_calls
                WHERE campaign_id = $1
                  AND status = 'pending'
                  AND (scheduled_at IS NULL OR scheduled_at <= $2)
                ORDER BY scheduled_at NULLS FIRST, created_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {}
            "#,
            CALL_COLUMNS
        );
        let calls = sqlx::query_as::<_, CampaignCall>(&sql)
            .bind(campaign_id)
            .bind(now)
            .bind(limit)
            .fetch_all(executor)
            .await?;
        Ok(calls)
    }

    pub async fn mark_calling(&self, call_id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE campaign_calls SET status = 'calling', started_at = $2, updated_at = $2
            WHERE id = $1 AND status = 'queued'
            "#,
        )
        .bind(call_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Uma discagem entregue ao discador.
    pub async fn record_dial(&self, campaign_id: Uuid, now: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                dials = dials + 1,
                total_calls_made = total_calls_made + 1,
                current_daily_calls = current_daily_calls + 1,
                last_execution_at = $2,
                updated_at = $2
            WHERE id = $1
            "#,
        )
        .bind(campaign_id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
