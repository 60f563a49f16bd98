// src/db/plan_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::is_unique_violation, error::AppError},
    models::plan::{CreatePlanPayload, PlanConfig, ResourceType, UpdatePlanPayload},
};

const PLAN_COLUMNS: &str = r#"
    id, plan_key, tenant, name, price, minutes, pay_as_you_go, features,
    max_assistants, max_email_campaigns, max_call_campaigns, whitelabel_enabled,
    variant_id, is_active, display_order, created_at, updated_at
"#;

#[derive(Clone)]
pub struct PlanRepository {
    pool: PgPool,
}

impl PlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Plano exato para (chave, tenant). `tenant = None` procura o global.
    pub async fn find(&self, plan_key: &str, tenant: Option<&str>) -> Result<Option<PlanConfig>, AppError> {
        let sql = format!(
            "SELECT {} FROM plan_configs WHERE plan_key = $1 AND tenant IS NOT DISTINCT FROM $2",
            PLAN_COLUMNS
        );
        let plan = sqlx::query_as::<_, PlanConfig>(&sql)
            .bind(plan_key)
            .bind(tenant)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn find_by_variant(&self, variant_id: &str) -> Result<Option<PlanConfig>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM plan_configs
            WHERE variant_id = $1
            ORDER BY tenant NULLS FIRST
            LIMIT 1
            "#,
            PLAN_COLUMNS
        );
        let plan = sqlx::query_as::<_, PlanConfig>(&sql)
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn list_active(&self, tenant: Option<&str>) -> Result<Vec<PlanConfig>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM plan_configs
            WHERE is_active AND tenant IS NOT DISTINCT FROM $1
            ORDER BY display_order ASC, plan_key ASC
            "#,
            PLAN_COLUMNS
        );
        let plans = sqlx::query_as::<_, PlanConfig>(&sql)
            .bind(tenant)
            .fetch_all(&self.pool)
            .await?;
        Ok(plans)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        tenant: Option<&str>,
        payload: &CreatePlanPayload,
    ) -> Result<PlanConfig, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO plan_configs (
                plan_key, tenant, name, price, minutes, pay_as_you_go, features,
                max_assistants, max_email_campaigns, max_call_campaigns,
                whitelabel_enabled, variant_id, display_order
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {}
            "#,
            PLAN_COLUMNS
        );

        sqlx::query_as::<_, PlanConfig>(&sql)
            .bind(payload.plan_key.trim())
            .bind(tenant)
            .bind(&payload.name)
            .bind(payload.price)
            .bind(payload.minutes)
            .bind(payload.pay_as_you_go)
            .bind(&payload.features)
            .bind(payload.max_assistants)
            .bind(payload.max_email_campaigns)
            .bind(payload.max_call_campaigns)
            .bind(payload.whitelabel_enabled)
            .bind(payload.variant_id.as_deref())
            .bind(payload.display_order)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    return AppError::BusinessRule("plan_key_exists");
                }
                e.into()
            })
    }

    // Atualização parcial: campos ausentes mantêm o valor atual
    pub async fn update<'e, E>(
        &self,
        executor: E,
        plan_key: &str,
        tenant: Option<&str>,
        payload: &UpdatePlanPayload,
    ) -> Result<Option<PlanConfig>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE plan_configs SET
                name = COALESCE($3, name),
                price = COALESCE($4, price),
                minutes = COALESCE($5, minutes),
                pay_as_you_go = COALESCE($6, pay_as_you_go),
                features = COALESCE($7, features),
                max_assistants = COALESCE($8, max_assistants),
                max_email_campaigns = COALESCE($9, max_email_campaigns),
                max_call_campaigns = COALESCE($10, max_call_campaigns),
                whitelabel_enabled = COALESCE($11, whitelabel_enabled),
                variant_id = COALESCE($12, variant_id),
                is_active = COALESCE($13, is_active),
                display_order = COALESCE($14, display_order),
                updated_at = NOW()
            WHERE plan_key = $1 AND tenant IS NOT DISTINCT FROM $2
            RETURNING {}
            "#,
            PLAN_COLUMNS
        );

        let plan = sqlx::query_as::<_, PlanConfig>(&sql)
            .bind(plan_key)
            .bind(tenant)
            .bind(payload.name.as_deref())
            .bind(payload.price)
            .bind(payload.minutes)
            .bind(payload.pay_as_you_go)
            .bind(payload.features.as_ref())
            .bind(payload.max_assistants)
            .bind(payload.max_email_campaigns)
            .bind(payload.max_call_campaigns)
            .bind(payload.whitelabel_enabled)
            .bind(payload.variant_id.as_deref())
            .bind(payload.is_active)
            .bind(payload.display_order)
            .fetch_optional(executor)
            .await?;
        Ok(plan)
    }

    pub async fn delete<'e, E>(&self, executor: E, plan_key: &str, tenant: Option<&str>) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            "DELETE FROM plan_configs WHERE plan_key = $1 AND tenant IS NOT DISTINCT FROM $2",
        )
        .bind(plan_key)
        .bind(tenant)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Quantos recursos do tipo o usuário já possui.
    pub async fn count_resources(&self, user_id: Uuid, resource: ResourceType) -> Result<i64, AppError> {
        let table = match resource {
            ResourceType::Assistant => "assistants",
            ResourceType::EmailCampaign => "email_campaigns",
            ResourceType::CallCampaign => "campaigns",
        };
        let sql = format!("SELECT COUNT(*) FROM {} WHERE user_id = $1", table);
        let count: i64 = sqlx::query_scalar(&sql)
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
