// src/db/assistant_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::assistant::{Assistant, CreateAssistantPayload, UpdateAssistantPayload},
};

const ASSISTANT_COLUMNS: &str =
    "id, user_id, tenant, name, prompt, voice, first_message, created_at, updated_at";

#[derive(Clone)]
pub struct AssistantRepository {
    pool: PgPool,
}

impl AssistantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<Assistant>, AppError> {
        let sql = format!(
            "SELECT {} FROM assistants WHERE user_id = $1 ORDER BY created_at DESC",
            ASSISTANT_COLUMNS
        );
        let assistants = sqlx::query_as::<_, Assistant>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(assistants)
    }

    pub async fn find_owned(&self, id: Uuid, user_id: Uuid) -> Result<Option<Assistant>, AppError> {
        let sql = format!(
            "SELECT {} FROM assistants WHERE id = $1 AND user_id = $2",
            ASSISTANT_COLUMNS
        );
        let assistant = sqlx::query_as::<_, Assistant>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(assistant)
    }

    pub async fn create<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        tenant: Option<&str>,
        payload: &CreateAssistantPayload,
    ) -> Result<Assistant, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO assistants (user_id, tenant, name, prompt, voice, first_message)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            ASSISTANT_COLUMNS
        );
        let assistant = sqlx::query_as::<_, Assistant>(&sql)
            .bind(user_id)
            .bind(tenant)
            .bind(payload.name.trim())
            .bind(payload.prompt.as_deref())
            .bind(payload.voice.as_deref())
            .bind(payload.first_message.as_deref())
            .fetch_one(executor)
            .await?;
        Ok(assistant)
    }

    pub async fn update<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        user_id: Uuid,
        payload: &UpdateAssistantPayload,
    ) -> Result<Option<Assistant>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE assistants SET
                name = COALESCE($3, name),
                prompt = COALESCE($4, prompt),
                voice = COALESCE($5, voice),
                first_message = COALESCE($6, first_message),
                updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            ASSISTANT_COLUMNS
        );
        let assistant = sqlx::query_as::<_, Assistant>(&sql)
            .bind(id)
            .bind(user_id)
            .bind(payload.name.as_deref().map(str::trim))
            .bind(payload.prompt.as_deref())
            .bind(payload.voice.as_deref())
            .bind(payload.first_message.as_deref())
            .fetch_optional(executor)
            .await?;
        Ok(assistant)
    }

    pub async fn delete<'e, E>(&self, executor: E, id: Uuid, user_id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM assistants WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
