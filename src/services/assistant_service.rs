// src/services/assistant_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    db::AssistantRepository,
    models::{
        assistant::{Assistant, CreateAssistantPayload, UpdateAssistantPayload},
        auth::User,
        plan::ResourceType,
    },
    services::plan_limit_service::PlanLimitService,
};

#[derive(Clone)]
pub struct AssistantService {
    repo: AssistantRepository,
    limits: PlanLimitService,
    pool: PgPool,
}

impl AssistantService {
    pub fn new(repo: AssistantRepository, limits: PlanLimitService, pool: PgPool) -> Self {
        Self { repo, limits, pool }
    }

    pub async fn list(&self, user: &User) -> Result<Vec<Assistant>, AppError> {
        self.repo.list_by_user(user.id).await
    }

    pub async fn get(&self, user: &User, id: Uuid) -> Result<Assistant, AppError> {
        self.repo
            .find_owned(id, user.id)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Assistant".into()))
    }

    // O limite é checado antes do INSERT; duas criações simultâneas no limite
    // podem passar juntas.
    pub async fn create(&self, user: &User, payload: &CreateAssistantPayload) -> Result<Assistant, AppError> {
        self.limits.enforce(user.id, ResourceType::Assistant).await?;

        let assistant = self
            .repo
            .create(&self.pool, user.id, user.tenant.as_deref(), payload)
            .await?;
        tracing::info!("🤖 Assistente {} criado para o usuário {}", assistant.id, user.id);
        Ok(assistant)
    }

    pub async fn update(
        &self,
        user: &User,
        id: Uuid,
        payload: &UpdateAssistantPayload,
    ) -> Result<Assistant, AppError> {
        self.repo
            .update(&self.pool, id, user.id, payload)
            .await?
            .ok_or_else(|| AppError::ResourceNotFound("Assistant".into()))
    }

    pub async fn delete(&self, user: &User, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete(&self.pool, id, user.id).await? {
            return Err(AppError::ResourceNotFound("Assistant".into()));
        }
        Ok(())
    }
}
