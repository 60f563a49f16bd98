// src/db/support_repo.rs

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::{db_utils::is_unique_violation, error::AppError},
    models::support::{AuditAction, AuditLog, RequestMeta, SessionStatus, SupportSession},
};

const SESSION_COLUMNS: &str = r#"
    id, admin_user_id, target_user_id, reason, duration_minutes, token_hash,
    status, expires_at, started_at, ended_at
"#;

#[derive(Clone)]
pub struct SupportRepository {
    pool: PgPool,
}

impl SupportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Sessão ainda marcada como ativa para o par admin/alvo, se houver.
    pub async fn find_active_pair<'e, E>(
        &self,
        executor: E,
        admin_id: Uuid,
        target_id: Uuid,
    ) -> Result<Option<SupportSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            SELECT {} FROM support_sessions
            WHERE admin_user_id = $1 AND target_user_id = $2 AND status = 'active'
            ORDER BY started_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(admin_id)
            .bind(target_id)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        admin_id: Uuid,
        target_id: Uuid,
        reason: &str,
        duration_minutes: i32,
        token_hash: &str,
        started_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<SupportSession, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            INSERT INTO support_sessions (
                admin_user_id, target_user_id, reason, duration_minutes, token_hash,
                status, started_at, expires_at
            )
            VALUES ($1, $2, $3, $4, $5, 'active', $6, $7)
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(admin_id)
            .bind(target_id)
            .bind(reason)
            .bind(duration_minutes)
            .bind(token_hash)
            .bind(started_at)
            .bind(expires_at)
            .fetch_one(executor)
            .await
            .map_err(insert_error)?;
        Ok(session)
    }

    /// Trava a sessão até o fim da transação.
    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<SupportSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!("SELECT {} FROM support_sessions WHERE id = $1 FOR UPDATE", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    pub async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<SupportSession>, AppError> {
        let sql = format!("SELECT {} FROM support_sessions WHERE token_hash = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(token_hash)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<SupportSession>, AppError> {
        let sql = format!("SELECT {} FROM support_sessions WHERE id = $1", SESSION_COLUMNS);
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(session)
    }

    /// Encerra a sessão só se ela ainda estiver ativa (compare-and-set).
    pub async fn end_if_active<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        admin_id: Uuid,
        status: SessionStatus,
        ended_at: DateTime<Utc>,
    ) -> Result<Option<SupportSession>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let sql = format!(
            r#"
            UPDATE support_sessions SET status = $3, ended_at = $4
            WHERE id = $1 AND admin_user_id = $2 AND status = 'active'
            RETURNING {}
            "#,
            SESSION_COLUMNS
        );
        let session = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(id)
            .bind(admin_id)
            .bind(status)
            .bind(ended_at)
            .fetch_optional(executor)
            .await?;
        Ok(session)
    }

    /// Marca como expirada uma sessão ativa já vencida.
    pub async fn expire_one<'e, E>(&self, executor: E, id: Uuid, now: DateTime<Utc>) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE support_sessions SET status = 'expired', ended_at = expires_at
            WHERE id = $1 AND status = 'active' AND expires_at <= $2
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn expire_all_stale(&self, now: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE support_sessions SET status = 'expired', ended_at = expires_at
            WHERE status = 'active' AND expires_at <= $1
            "#,
        )
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn list_active_for_admin(
        &self,
        admin_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Vec<SupportSession>, AppError> {
        let sql = format!(
            r#"
            SELECT {} FROM support_sessions
            WHERE admin_user_id = $1 AND status = 'active' AND expires_at > $2
            ORDER BY started_at DESC
            "#,
            SESSION_COLUMNS
        );
        let sessions = sqlx::query_as::<_, SupportSession>(&sql)
            .bind(admin_id)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(sessions)
    }

    // =========================================================================
    //  AUDITORIA
    // =========================================================================

    pub async fn insert_audit<'e, E>(
        &self,
        executor: E,
        session: &SupportSession,
        action: AuditAction,
        resource: Option<(&str, String)>,
        details: Option<Value>,
        meta: &RequestMeta,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let (resource_type, resource_id) = match resource {
            Some((kind, id)) => (Some(kind), Some(id)),
            None => (None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO support_audit_logs (
                session_id, admin_user_id, target_user_id, action_type,
                resource_type, resource_id, details, ip_address, user_agent
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.admin_user_id)
        .bind(session.target_user_id)
        .bind(action.as_str())
        .bind(resource_type)
        .bind(resource_id)
        .bind(details)
        .bind(meta.ip_address.as_deref())
        .bind(meta.user_agent.as_deref())
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_audit_logs(&self, session_id: Uuid) -> Result<Vec<AuditLog>, AppError> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, session_id, admin_user_id, target_user_id, action_type, resource_type,
                   resource_id, details, ip_address, user_agent, created_at
            FROM support_audit_logs
            WHERE session_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }
}

// O índice parcial garante uma única sessão ativa por par, mesmo com
// dois `create` concorrentes que não acharam nada para travar.
fn insert_error(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        return AppError::Conflict("support_session_exists");
    }
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::db_utils::test_support::database_error;

    #[test]
    fn concurrent_insert_for_the_same_pair_is_a_conflict() {
        let err = insert_error(database_error("23505"));
        assert!(matches!(err, AppError::Conflict("support_session_exists")));
    }

    #[test]
    fn other_insert_failures_stay_database_errors() {
        assert!(matches!(insert_error(database_error("23503")), AppError::DatabaseError(_)));
        assert!(matches!(insert_error(sqlx::Error::PoolTimedOut), AppError::DatabaseError(_)));
    }
}
