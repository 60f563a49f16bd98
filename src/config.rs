// src/config.rs

use std::{env, str::FromStr, sync::Arc, time::Duration};

use anyhow::Context;
use chrono::FixedOffset;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    common::{cache::SystemClock, i18n::I18nStore},
    db::{
        AssistantRepository, BillingRepository, CampaignRepository, PlanRepository, SupportRepository,
        UserRepository,
    },
    models::plan::LimitFailurePolicy,
    services::{
        assistant_service::AssistantService,
        auth::AuthService,
        billing_service::BillingService,
        campaign_engine::{CampaignEngine, EngineSettings, HttpDialer, PgEngineStore},
        campaign_service::CampaignService,
        plan_limit_service::{PgPlanLimitStore, PlanLimitService},
        plan_service::PlanService,
        support_service::SupportService,
    },
};

/// Configuração lida do ambiente (e do `.env`, se existir).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_max_connections: u32,

    pub plan_limit_on_error: LimitFailurePolicy,
    pub plan_cache_ttl: Duration,

    pub lemonsqueezy_webhook_secret: Option<String>,

    pub campaign_engine_enabled: bool,
    pub campaign_tick: Duration,
    pub campaign_batch_size: i64,
    pub campaign_call_interval: Duration,
    pub campaign_utc_offset: FixedOffset,
    pub dialer_url: Option<String>,
    pub dialer_secret: Option<String>,

    pub support_sweep: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let offset_minutes: i32 = parse_or("CAMPAIGN_UTC_OFFSET_MINUTES", 0)?;
        let campaign_utc_offset = FixedOffset::east_opt(offset_minutes * 60)
            .with_context(|| format!("CAMPAIGN_UTC_OFFSET_MINUTES fora do intervalo: {}", offset_minutes))?;

        let campaign_batch_size: i64 = parse_or("CAMPAIGN_BATCH_SIZE", 5)?;
        if campaign_batch_size < 1 {
            anyhow::bail!("CAMPAIGN_BATCH_SIZE deve ser maior que zero");
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,

            plan_limit_on_error: parse_or("PLAN_LIMIT_ON_ERROR", LimitFailurePolicy::Allow)?,
            plan_cache_ttl: Duration::from_secs(parse_or("PLAN_CACHE_TTL_SECS", 300)?),

            lemonsqueezy_webhook_secret: optional("LEMONSQUEEZY_WEBHOOK_SECRET"),

            campaign_engine_enabled: parse_or("CAMPAIGN_ENGINE_ENABLED", false)?,
            campaign_tick: Duration::from_secs(parse_or("CAMPAIGN_TICK_SECS", 30)?),
            campaign_batch_size,
            campaign_call_interval: Duration::from_secs(parse_or("CAMPAIGN_CALL_INTERVAL_SECS", 30)?),
            campaign_utc_offset,
            dialer_url: optional("DIALER_URL"),
            dialer_secret: optional("DIALER_SECRET"),

            support_sweep: Duration::from_secs(parse_or("SUPPORT_SWEEP_SECS", 60)?),
        })
    }

    pub fn engine_settings(&self) -> anyhow::Result<EngineSettings> {
        Ok(EngineSettings {
            tick: self.campaign_tick,
            batch_size: self.campaign_batch_size,
            call_interval: chrono::Duration::from_std(self.campaign_call_interval)
                .context("CAMPAIGN_CALL_INTERVAL_SECS inválido")?,
            utc_offset: self.campaign_utc_offset,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{} deve ser definida", key))
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match optional(key) {
        Some(raw) => parse_value(key, &raw),
        None => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| anyhow::anyhow!("Valor inválido para {} ('{}'): {}", key, raw, e))
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub config: Arc<AppConfig>,
    pub i18n_store: Arc<I18nStore>,

    pub auth_service: AuthService,
    pub plan_service: PlanService,
    pub plan_limit_service: PlanLimitService,
    pub assistant_service: AssistantService,
    pub campaign_service: CampaignService,
    pub support_service: SupportService,
    pub billing_service: BillingService,
    pub campaign_repo: CampaignRepository,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let db_pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
            .context("Falha ao conectar ao banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let i18n_store = Arc::new(I18nStore::load()?);

        // --- Monta o gráfico de dependências ---
        let user_repo = UserRepository::new(db_pool.clone());
        let plan_repo = PlanRepository::new(db_pool.clone());
        let campaign_repo = CampaignRepository::new(db_pool.clone());

        let auth_service = AuthService::new(user_repo.clone(), config.jwt_secret.clone(), db_pool.clone());

        let plan_cache_ttl = chrono::Duration::from_std(config.plan_cache_ttl)
            .context("PLAN_CACHE_TTL_SECS inválido")?;
        let plan_service = PlanService::new(plan_repo.clone(), db_pool.clone(), plan_cache_ttl, Arc::new(SystemClock));

        let limit_store = PgPlanLimitStore::new(user_repo.clone(), plan_service.clone(), plan_repo);
        let plan_limit_service = PlanLimitService::new(Arc::new(limit_store), config.plan_limit_on_error);

        let assistant_service = AssistantService::new(
            AssistantRepository::new(db_pool.clone()),
            plan_limit_service.clone(),
            db_pool.clone(),
        );
        let campaign_service =
            CampaignService::new(campaign_repo.clone(), plan_limit_service.clone(), db_pool.clone());
        let support_service =
            SupportService::new(SupportRepository::new(db_pool.clone()), user_repo.clone(), db_pool.clone());
        let billing_service = BillingService::new(
            BillingRepository::new(db_pool.clone()),
            user_repo,
            plan_service.clone(),
            config.lemonsqueezy_webhook_secret.clone(),
            db_pool.clone(),
        );

        Ok(Self {
            db_pool,
            config: Arc::new(config),
            i18n_store,
            auth_service,
            plan_service,
            plan_limit_service,
            assistant_service,
            campaign_service,
            support_service,
            billing_service,
            campaign_repo,
        })
    }

    /// Motor de discagem, se habilitado e com um discador configurado.
    pub fn campaign_engine(&self) -> anyhow::Result<Option<CampaignEngine>> {
        if !self.config.campaign_engine_enabled {
            return Ok(None);
        }
        let Some(url) = self.config.dialer_url.clone() else {
            tracing::warn!("CAMPAIGN_ENGINE_ENABLED sem DIALER_URL; motor de campanhas desligado");
            return Ok(None);
        };

        let dialer = HttpDialer::new(url, self.config.dialer_secret.clone())?;
        let store = PgEngineStore::new(
            self.campaign_repo.clone(),
            self.campaign_service.clone(),
            self.db_pool.clone(),
        );
        Ok(Some(CampaignEngine::new(
            Arc::new(store),
            Arc::new(dialer),
            self.config.engine_settings()?,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_use_the_default() {
        assert_eq!(parse_or::<u64>("AGENTDESK_TEST_UNSET_KEY", 42).unwrap(), 42);
    }

    #[test]
    fn bad_values_name_the_key() {
        let err = parse_value::<u64>("CAMPAIGN_TICK_SECS", "abc").unwrap_err();
        assert!(err.to_string().contains("CAMPAIGN_TICK_SECS"));
        assert!(parse_value::<bool>("CAMPAIGN_ENGINE_ENABLED", "sim").is_err());
    }

    #[test]
    fn failure_policy_is_parsed() {
        assert_eq!(
            parse_value::<LimitFailurePolicy>("PLAN_LIMIT_ON_ERROR", "deny").unwrap(),
            LimitFailurePolicy::Deny
        );
    }
}
