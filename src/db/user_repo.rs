// src/db/user_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::auth::{User, UserSummary},
};

const USER_COLUMNS: &str = r#"
    id, email, name, password_hash, role, plan, tenant, is_active,
    subscription_id, minutes_limit, created_at, updated_at
"#;

// O repositório de usuários, responsável por todas as interações com a tabela 'users'
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // Busca um usuário pelo seu e-mail
    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE lower(email) = lower($1)", USER_COLUMNS);
        let maybe_user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    // Busca um usuário pelo seu ID
    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let maybe_user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe_user)
    }

    pub async fn find_summary<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<UserSummary>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let summary = sqlx::query_as::<_, UserSummary>(
            "SELECT id, name, email, tenant FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;
        Ok(summary)
    }

    // Cria um novo usuário no banco de dados
    // Com tratamento de erro específico para e-mails duplicados.
    pub async fn create_user<'e, E>(
        &self,
        executor: E,
        email: &str,
        password_hash: &str,
        name: Option<&str>,
    ) -> Result<User, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            "INSERT INTO users (email, password_hash, name) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .bind(password_hash)
            .bind(name)
            .fetch_one(executor)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(db_err) = &e {
                    if db_err.is_unique_violation() {
                        return match db_err.constraint() {
                            // O nome padrão que o Postgres cria para "UNIQUE" na coluna email
                            Some("users_email_key") => AppError::EmailAlreadyExists,
                            Some(other) => AppError::UniqueConstraintViolation(other.to_string()),
                            None => AppError::EmailAlreadyExists,
                        };
                    }
                }
                e.into()
            })?;

        Ok(user)
    }

    /// Aplica o plano comprado. Devolve `false` se o usuário não existe.
    pub async fn apply_subscription<'e, E>(
        &self,
        executor: E,
        user_id: Uuid,
        plan_key: &str,
        subscription_id: &str,
        minutes_limit: Option<i32>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET plan = $2,
                is_active = TRUE,
                subscription_id = $3,
                minutes_limit = COALESCE($4, minutes_limit),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id)
        .bind(plan_key)
        .bind(subscription_id)
        .bind(minutes_limit)
        .execute(executor)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
