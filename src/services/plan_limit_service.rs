// src/services/plan_limit_service.rs

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    common::{
        error::AppError,
        retry::{with_retry, RetryOptions},
    },
    db::{PlanRepository, UserRepository},
    models::{
        auth::User,
        plan::{LimitFailurePolicy, PlanConfig, PlanLimitDecision, ResourceType},
    },
    services::plan_service::PlanService,
};

const FALLBACK_PLAN: &str = "free";

/// O que o limite de plano precisa ler do armazenamento.
#[async_trait]
pub trait PlanLimitStore: Send + Sync {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    /// Busca exata; `tenant = None` é o plano global.
    async fn find_plan(&self, plan_key: &str, tenant: Option<&str>) -> Result<Option<PlanConfig>, AppError>;

    async fn count_resources(&self, user_id: Uuid, resource: ResourceType) -> Result<i64, AppError>;
}

/// Implementação sobre o Postgres (planos passam pelo cache do PlanService).
pub struct PgPlanLimitStore {
    users: UserRepository,
    plans: PlanService,
    counts: PlanRepository,
    retry: RetryOptions,
}

impl PgPlanLimitStore {
    pub fn new(users: UserRepository, plans: PlanService, counts: PlanRepository) -> Self {
        Self { users, plans, counts, retry: RetryOptions::default() }
    }
}

#[async_trait]
impl PlanLimitStore for PgPlanLimitStore {
    async fn find_user(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        with_retry(&self.retry, move || self.users.find_by_id(user_id)).await
    }

    async fn find_plan(&self, plan_key: &str, tenant: Option<&str>) -> Result<Option<PlanConfig>, AppError> {
        self.plans.find_plan(plan_key, tenant).await
    }

    async fn count_resources(&self, user_id: Uuid, resource: ResourceType) -> Result<i64, AppError> {
        with_retry(&self.retry, move || self.counts.count_resources(user_id, resource)).await
    }
}

#[derive(Clone)]
pub struct PlanLimitService {
    store: Arc<dyn PlanLimitStore>,
    on_error: LimitFailurePolicy,
}

impl PlanLimitService {
    pub fn new(store: Arc<dyn PlanLimitStore>, on_error: LimitFailurePolicy) -> Self {
        Self { store, on_error }
    }

    /// Decide se o usuário pode criar mais um recurso do tipo. Nunca falha:
    /// erros internos viram a decisão configurada em `on_error`.
    pub async fn check_plan_limit(&self, user_id: Uuid, resource: ResourceType) -> PlanLimitDecision {
        match self.evaluate(user_id, resource).await {
            Ok(decision) => decision,
            Err(e) => {
                tracing::error!(
                    "Falha ao verificar limite de plano (usuário {}, recurso {:?}): {}",
                    user_id, resource, e
                );
                match self.on_error {
                    LimitFailurePolicy::Allow => PlanLimitDecision::allow(),
                    LimitFailurePolicy::Deny => {
                        PlanLimitDecision::deny("Unable to verify plan limits. Please try again later.")
                    }
                }
            }
        }
    }

    /// Igual a `check_plan_limit`, mas transforma a negação em erro HTTP.
    pub async fn enforce(&self, user_id: Uuid, resource: ResourceType) -> Result<(), AppError> {
        let decision = self.check_plan_limit(user_id, resource).await;
        if decision.allowed {
            return Ok(());
        }

        tracing::info!("⛔ Limite de plano: usuário {} bloqueado para {:?}", user_id, resource);
        Err(match decision.limit_reached {
            Some((limit, resource)) => AppError::PlanLimitReached {
                limit,
                resource: resource.display_name(),
            },
            None => AppError::PlanLimitDenied(decision.message.unwrap_or_default()),
        })
    }

    async fn evaluate(&self, user_id: Uuid, resource: ResourceType) -> Result<PlanLimitDecision, AppError> {
        let Some(user) = self.store.find_user(user_id).await? else {
            return Ok(PlanLimitDecision::deny("User not found"));
        };

        // Admin do tenant principal não tem limite
        if user.is_super_admin() {
            return Ok(PlanLimitDecision::allow());
        }

        // Sem plano nenhum não há limite definido
        let Some(plan) = self.resolve_plan(&user).await? else {
            tracing::warn!("Nenhum plano encontrado para o usuário {}, nem o '{}' global", user_id, FALLBACK_PLAN);
            return Ok(PlanLimitDecision::allow());
        };

        if plan.whitelabel_enabled {
            return Ok(PlanLimitDecision::allow());
        }

        let limit = match plan.limit_for(resource) {
            Some(limit) if limit > 0 => limit,
            _ => return Ok(PlanLimitDecision::allow()),
        };

        let current = self.store.count_resources(user_id, resource).await?;
        if current < i64::from(limit) {
            Ok(PlanLimitDecision::allow())
        } else {
            Ok(PlanLimitDecision::limit_reached(limit, resource))
        }
    }

    /// tenant + chave -> global + chave -> global "free".
    async fn resolve_plan(&self, user: &User) -> Result<Option<PlanConfig>, AppError> {
        let plan_key = user.plan_key();

        if let Some(tenant) = user.tenant.as_deref() {
            if let Some(plan) = self.store.find_plan(plan_key, Some(tenant)).await? {
                return Ok(Some(plan));
            }
        }

        if let Some(plan) = self.store.find_plan(plan_key, None).await? {
            return Ok(Some(plan));
        }

        if plan_key != FALLBACK_PLAN {
            tracing::warn!("Plano '{}' não encontrado; usando '{}'", plan_key, FALLBACK_PLAN);
        }
        self.store.find_plan(FALLBACK_PLAN, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::auth::UserRole;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeStore {
        user: Option<User>,
        plans: Vec<PlanConfig>,
        counts: HashMap<ResourceType, i64>,
        fail: bool,
    }

    #[async_trait]
    impl PlanLimitStore for FakeStore {
        async fn find_user(&self, _user_id: Uuid) -> Result<Option<User>, AppError> {
            if self.fail {
                return Err(anyhow::anyhow!("connection reset").into());
            }
            Ok(self.user.clone())
        }

        async fn find_plan(&self, plan_key: &str, tenant: Option<&str>) -> Result<Option<PlanConfig>, AppError> {
            Ok(self
                .plans
                .iter()
                .find(|p| p.plan_key == plan_key && p.tenant.as_deref() == tenant)
                .cloned())
        }

        async fn count_resources(&self, _user_id: Uuid, resource: ResourceType) -> Result<i64, AppError> {
            Ok(self.counts.get(&resource).copied().unwrap_or(0))
        }
    }

    fn user(plan: &str, role: UserRole, tenant: Option<&str>) -> User {
        User {
            id: Uuid::new_v4(),
            email: "ana@empresa.com".into(),
            name: None,
            password_hash: String::new(),
            role,
            plan: Some(plan.into()),
            tenant: tenant.map(str::to_string),
            is_active: true,
            subscription_id: None,
            minutes_limit: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn plan(key: &str, tenant: Option<&str>, max_assistants: Option<i32>) -> PlanConfig {
        PlanConfig {
            id: Uuid::new_v4(),
            plan_key: key.into(),
            tenant: tenant.map(str::to_string),
            name: key.into(),
            price: Decimal::ZERO,
            minutes: None,
            pay_as_you_go: false,
            features: vec![],
            max_assistants,
            max_email_campaigns: Some(1),
            max_call_campaigns: Some(1),
            whitelabel_enabled: false,
            variant_id: None,
            is_active: true,
            display_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn service(store: FakeStore, on_error: LimitFailurePolicy) -> PlanLimitService {
        PlanLimitService::new(Arc::new(store), on_error)
    }

    #[tokio::test]
    async fn zero_or_missing_limit_is_unlimited() {
        for limit in [Some(0), None] {
            let store = FakeStore {
                user: Some(user("starter", UserRole::User, None)),
                plans: vec![plan("starter", None, limit)],
                counts: HashMap::from([(ResourceType::Assistant, 10_000)]),
                ..Default::default()
            };
            let decision = service(store, LimitFailurePolicy::Allow)
                .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
                .await;
            assert!(decision.allowed, "limit {:?}", limit);
        }
    }

    #[tokio::test]
    async fn whitelabel_bypasses_every_limit() {
        let mut whitelabel = plan("starter", None, Some(1));
        whitelabel.whitelabel_enabled = true;
        let store = FakeStore {
            user: Some(user("starter", UserRole::User, None)),
            plans: vec![whitelabel],
            counts: HashMap::from([(ResourceType::Assistant, 50)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Deny)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn count_equal_to_limit_is_denied_with_message() {
        let store = FakeStore {
            user: Some(user("starter", UserRole::User, None)),
            plans: vec![plan("starter", None, Some(3))],
            counts: HashMap::from([(ResourceType::Assistant, 3)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;

        assert!(!decision.allowed);
        assert_eq!(
            decision.message.as_deref(),
            Some("Plan limit reached. Your current plan allows up to 3 agents.")
        );
        assert_eq!(decision.limit_reached, Some((3, ResourceType::Assistant)));
    }

    #[tokio::test]
    async fn below_limit_is_allowed() {
        let store = FakeStore {
            user: Some(user("starter", UserRole::User, None)),
            plans: vec![plan("starter", None, Some(3))],
            counts: HashMap::from([(ResourceType::Assistant, 2)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn admin_without_tenant_is_always_allowed() {
        let store = FakeStore {
            user: Some(user("free", UserRole::Admin, None)),
            plans: vec![plan("free", None, Some(1))],
            counts: HashMap::from([(ResourceType::Assistant, 9)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Deny)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn tenant_admin_is_still_limited() {
        let store = FakeStore {
            user: Some(user("free", UserRole::Admin, Some("acme"))),
            plans: vec![plan("free", None, Some(1))],
            counts: HashMap::from([(ResourceType::Assistant, 1)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert!(!decision.allowed);
    }

    #[tokio::test]
    async fn tenant_plan_wins_over_global_plan() {
        let store = FakeStore {
            user: Some(user("starter", UserRole::User, Some("acme"))),
            plans: vec![plan("starter", None, Some(1)), plan("starter", Some("acme"), Some(5))],
            counts: HashMap::from([(ResourceType::Assistant, 2)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert!(decision.allowed);
    }

    #[tokio::test]
    async fn unknown_plan_falls_back_to_global_free() {
        let store = FakeStore {
            user: Some(user("legacy-gold", UserRole::User, Some("acme"))),
            plans: vec![plan("free", None, Some(1))],
            counts: HashMap::from([(ResourceType::Assistant, 1)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert_eq!(decision.limit_reached, Some((1, ResourceType::Assistant)));
    }

    #[tokio::test]
    async fn no_plan_at_all_is_unlimited_even_when_failing_closed() {
        let store = FakeStore {
            user: Some(user("legacy-gold", UserRole::User, None)),
            counts: HashMap::from([(ResourceType::Assistant, 99)]),
            ..Default::default()
        };

        let decision = service(store, LimitFailurePolicy::Deny)
            .check_plan_limit(Uuid::new_v4(), ResourceType::Assistant)
            .await;
        assert_eq!(decision, PlanLimitDecision::allow());
    }

    #[tokio::test]
    async fn missing_user_is_denied() {
        let decision = service(FakeStore::default(), LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::CallCampaign)
            .await;
        assert_eq!(decision, PlanLimitDecision::deny("User not found"));
    }

    #[tokio::test]
    async fn failure_policy_decides_on_internal_errors() {
        let open = service(FakeStore { fail: true, ..Default::default() }, LimitFailurePolicy::Allow)
            .check_plan_limit(Uuid::new_v4(), ResourceType::EmailCampaign)
            .await;
        assert!(open.allowed);

        let closed = service(FakeStore { fail: true, ..Default::default() }, LimitFailurePolicy::Deny)
            .check_plan_limit(Uuid::new_v4(), ResourceType::EmailCampaign)
            .await;
        assert!(!closed.allowed);
    }

    #[tokio::test]
    async fn enforce_maps_limit_to_error() {
        let store = FakeStore {
            user: Some(user("starter", UserRole::User, None)),
            plans: vec![plan("starter", None, Some(1))],
            counts: HashMap::from([(ResourceType::CallCampaign, 1)]),
            ..Default::default()
        };

        let err = service(store, LimitFailurePolicy::Allow)
            .enforce(Uuid::new_v4(), ResourceType::CallCampaign)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppError::PlanLimitReached { limit: 1, resource: "call campaigns" }
        ));
    }
}
