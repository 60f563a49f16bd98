// src/services/support_service.rs

use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use rand::RngCore;
use serde_json::json;
use sqlx::PgPool;
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::{
    common::{error::AppError, signature::sha256_hex},
    db::{SupportRepository, UserRepository},
    models::{
        auth::{User, UserSummary},
        support::{
            AuditAction, AuditLog, CleanupResult, CreateSupportSessionPayload, CreatedSupportSession,
            EndReason, RequestMeta, SessionStatus, SupportSession, SupportSessionDetail, TokenValidation,
            DEFAULT_SESSION_MINUTES, MAX_SESSION_MINUTES, MIN_SESSION_MINUTES,
        },
    },
};

const TOKEN_BYTES: usize = 32;

#[derive(Clone)]
pub struct SupportService {
    repo: SupportRepository,
    users: UserRepository,
    pool: PgPool,
}

impl SupportService {
    pub fn new(repo: SupportRepository, users: UserRepository, pool: PgPool) -> Self {
        Self { repo, users, pool }
    }

    /// Abre uma sessão de suporte e devolve o token puro uma única vez.
    pub async fn create(
        &self,
        admin: &User,
        payload: &CreateSupportSessionPayload,
        meta: &RequestMeta,
    ) -> Result<CreatedSupportSession, AppError> {
        let duration_minutes = session_duration(payload.duration_minutes)?;
        if !admin.is_admin() {
            return Err(AppError::RoleRequired("admin"));
        }

        let target = self
            .users
            .find_by_id(payload.target_user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;
        if target.is_admin() {
            return Err(AppError::BusinessRule("support_target_admin"));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if let Some(existing) = self.repo.find_active_pair(&mut *tx, admin.id, target.id).await? {
            if existing.is_usable_at(now) {
                return Err(AppError::Conflict("support_session_exists"));
            }
            // Vencida mas ainda marcada como ativa
            self.repo.expire_one(&mut *tx, existing.id, now).await?;
        }

        let token = generate_token();
        let session = self
            .repo
            .insert(
                &mut *tx,
                admin.id,
                target.id,
                payload.reason.trim(),
                duration_minutes,
                &sha256_hex(&token),
                now,
                now + Duration::minutes(i64::from(duration_minutes)),
            )
            .await?;

        self.repo
            .insert_audit(
                &mut *tx,
                &session,
                AuditAction::SupportAccessStarted,
                None,
                Some(json!({ "reason": session.reason, "durationMinutes": duration_minutes })),
                meta,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            "🛟 Sessão de suporte {} aberta: admin {} -> usuário {} ({} min)",
            session.id,
            admin.id,
            target.id,
            duration_minutes
        );
        Ok(CreatedSupportSession { session, token })
    }

    /// O servidor é a fonte da verdade sobre a expiração.
    pub async fn validate_scoped_token(&self, token: &str) -> Result<TokenValidation, AppError> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(TokenValidation::invalid());
        }

        let Some(session) = self.repo.find_by_token_hash(&sha256_hex(token)).await? else {
            return Ok(TokenValidation::invalid());
        };

        let now = Utc::now();
        if session.is_stale_at(now) {
            self.repo.expire_one(&self.pool, session.id, now).await?;
        }
        Ok(session.validate_at(now))
    }

    pub async fn end(
        &self,
        admin: &User,
        session_id: Uuid,
        reason: EndReason,
        meta: &RequestMeta,
    ) -> Result<SupportSession, AppError> {
        let mut tx = self.pool.begin().await?;

        let locked = self.repo.lock_by_id(&mut *tx, session_id).await?;
        endable_session(locked, admin.id)?;

        let session = self
            .repo
            .end_if_active(&mut *tx, session_id, admin.id, reason.status(), Utc::now())
            .await?
            .ok_or_else(session_not_found)?;

        self.repo
            .insert_audit(&mut *tx, &session, reason.audit_action(), None, None, meta)
            .await?;

        tx.commit().await?;

        tracing::info!("🛟 Sessão de suporte {} encerrada ({:?})", session.id, reason);
        Ok(session)
    }

    pub async fn get_active(&self, admin: &User) -> Result<Vec<SupportSessionDetail>, AppError> {
        let now = Utc::now();
        let sessions = self.repo.list_active_for_admin(admin.id, now).await?;

        let admin_summary = self.users.find_summary(&self.pool, admin.id).await?;
        let mut details = Vec::with_capacity(sessions.len());
        for session in sessions {
            let target = self.users.find_summary(&self.pool, session.target_user_id).await?;
            details.push(SupportSessionDetail {
                remaining_seconds: session.remaining_seconds_at(now),
                admin: admin_summary.clone(),
                target,
                session,
            });
        }
        Ok(details)
    }

    /// Só o admin dono da sessão pode vê-la.
    pub async fn get(&self, admin: &User, session_id: Uuid) -> Result<SupportSessionDetail, AppError> {
        let session = self.owned_session(admin, session_id).await?;
        let now = Utc::now();

        Ok(SupportSessionDetail {
            remaining_seconds: session.remaining_seconds_at(now),
            admin: self.users.find_summary(&self.pool, session.admin_user_id).await?,
            target: self.users.find_summary(&self.pool, session.target_user_id).await?,
            session,
        })
    }

    pub async fn audit_logs(&self, admin: &User, session_id: Uuid) -> Result<Vec<AuditLog>, AppError> {
        self.owned_session(admin, session_id).await?;
        self.repo.list_audit_logs(session_id).await
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<CleanupResult, AppError> {
        let expired_sessions = self.repo.expire_all_stale(Utc::now()).await?;
        if expired_sessions > 0 {
            tracing::info!("🧹 {} sessões de suporte expiradas", expired_sessions);
        }
        Ok(CleanupResult { expired_sessions })
    }

    /// Dados do usuário alvo vistos com um token de suporte. Cada acesso é auditado.
    pub async fn get_user_for_scoped_access(
        &self,
        token: &str,
        target_user_id: Uuid,
        meta: &RequestMeta,
    ) -> Result<UserSummary, AppError> {
        let validation = self.validate_scoped_token(token).await?;
        if !validation.is_valid {
            return Err(AppError::InvalidToken);
        }
        if validation.target_user_id != Some(target_user_id) {
            return Err(AppError::Forbidden);
        }

        let session_id = validation.session_id.ok_or(AppError::InvalidToken)?;
        let session = self
            .repo
            .find_by_id(session_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let user = self
            .users
            .find_summary(&self.pool, target_user_id)
            .await?
            .ok_or(AppError::UserNotFound)?;

        self.repo
            .insert_audit(
                &self.pool,
                &session,
                AuditAction::UserViewed,
                Some(("user", target_user_id.to_string())),
                None,
                meta,
            )
            .await?;

        Ok(user)
    }

    /// Expira periodicamente as sessões vencidas.
    pub async fn run_sweeper(self, every: StdDuration) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = self.cleanup_expired_sessions().await {
                tracing::error!("Erro ao expirar sessões de suporte: {}", e);
            }
        }
    }

    async fn owned_session(&self, admin: &User, session_id: Uuid) -> Result<SupportSession, AppError> {
        self.repo
            .find_by_id(session_id)
            .await?
            .filter(|s| s.admin_user_id == admin.id)
            .ok_or_else(session_not_found)
    }
}

fn session_not_found() -> AppError {
    AppError::ResourceNotFound("Support session".into())
}

/// Só o admin dono encerra, e só enquanto a sessão está ativa. Sessões de
/// outro admin ou já encerradas respondem como inexistentes.
pub fn endable_session(session: Option<SupportSession>, admin_id: Uuid) -> Result<SupportSession, AppError> {
    session
        .filter(|s| s.admin_user_id == admin_id && s.status == SessionStatus::Active)
        .ok_or_else(session_not_found)
}

/// Duração em minutos, dentro de [15, 120]; ausente vale 30.
pub fn session_duration(requested: Option<i32>) -> Result<i32, AppError> {
    let minutes = requested.unwrap_or(DEFAULT_SESSION_MINUTES);
    if !(MIN_SESSION_MINUTES..=MAX_SESSION_MINUTES).contains(&minutes) {
        return Err(AppError::BusinessRule("support_duration_invalid"));
    }
    Ok(minutes)
}

/// 32 bytes aleatórios em hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
