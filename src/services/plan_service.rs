// src/services/plan_service.rs

use std::sync::Arc;

use sqlx::PgPool;

use crate::{
    common::{
        cache::{Clock, TtlCache},
        error::AppError,
        retry::{with_retry, RetryOptions},
    },
    db::PlanRepository,
    models::plan::{CreatePlanPayload, PlanConfig, UpdatePlanPayload},
};

type PlanKey = (String, Option<String>);

#[derive(Clone)]
pub struct PlanService {
    repo: PlanRepository,
    pool: PgPool,
    // Guarda também os "não encontrado" para não martelar o banco no fallback
    cache: TtlCache<PlanKey, Option<PlanConfig>>,
    retry: RetryOptions,
}

impl PlanService {
    pub fn new(repo: PlanRepository, pool: PgPool, ttl: chrono::Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            repo,
            pool,
            cache: TtlCache::new(ttl, clock),
            retry: RetryOptions::default(),
        }
    }

    /// Busca exata (chave, tenant) passando pelo cache.
    pub async fn find_plan(&self, plan_key: &str, tenant: Option<&str>) -> Result<Option<PlanConfig>, AppError> {
        let key = (plan_key.to_string(), tenant.map(str::to_string));
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let plan = with_retry(&self.retry, move || self.repo.find(plan_key, tenant)).await?;
        self.cache.insert(key, plan.clone());
        Ok(plan)
    }

    pub async fn find_by_variant(&self, variant_id: &str) -> Result<Option<PlanConfig>, AppError> {
        with_retry(&self.retry, move || self.repo.find_by_variant(variant_id)).await
    }

    pub async fn list_plans(&self, tenant: Option<&str>) -> Result<Vec<PlanConfig>, AppError> {
        let plans = with_retry(&self.retry, move || self.repo.list_active(tenant)).await?;
        if plans.is_empty() && tenant.is_some() {
            // Tenant sem planos próprios enxerga os globais
            return with_retry(&self.retry, move || self.repo.list_active(None)).await;
        }
        Ok(plans)
    }

    pub async fn create_plan(&self, tenant: Option<&str>, payload: &CreatePlanPayload) -> Result<PlanConfig, AppError> {
        let plan = self.repo.create(&self.pool, tenant, payload).await?;
        self.cache.invalidate_all();
        tracing::info!("📋 Plano '{}' criado (tenant: {:?})", plan.plan_key, plan.tenant);
        Ok(plan)
    }

    pub async fn update_plan(
        &self,
        plan_key: &str,
        tenant: Option<&str>,
        payload: &UpdatePlanPayload,
    ) -> Result<PlanConfig, AppError> {
        let plan = self
            .repo
            .update(&self.pool, plan_key, tenant, payload)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound(format!("Plan '{}'", plan_key)))?;
        self.cache.invalidate_all();
        Ok(plan)
    }

    pub async fn delete_plan(&self, plan_key: &str, tenant: Option<&str>) -> Result<(), AppError> {
        let deleted = self.repo.delete(&self.pool, plan_key, tenant).await?;
        if !deleted {
            return Err(AppError::ResourceNotFound(format!("Plan '{}'", plan_key)));
        }
        self.cache.invalidate_all();
        tracing::info!("🗑️ Plano '{}' removido (tenant: {:?})", plan_key, tenant);
        Ok(())
    }
}
