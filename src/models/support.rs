// src/models/support.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::auth::UserSummary;

pub const MIN_SESSION_MINUTES: i32 = 15;
pub const MAX_SESSION_MINUTES: i32 = 120;
pub const DEFAULT_SESSION_MINUTES: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "support_session_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Expired,
    Revoked,
    Completed,
}

/// Motivo informado ao encerrar uma sessão.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    #[default]
    Completed,
    Revoked,
}

impl EndReason {
    pub fn status(self) -> SessionStatus {
        match self {
            EndReason::Completed => SessionStatus::Completed,
            EndReason::Revoked => SessionStatus::Revoked,
        }
    }

    pub fn audit_action(self) -> AuditAction {
        match self {
            EndReason::Completed => AuditAction::SupportAccessEnded,
            EndReason::Revoked => AuditAction::SupportAccessRevoked,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportSession {
    pub id: Uuid,
    pub admin_user_id: Uuid,
    pub target_user_id: Uuid,
    #[schema(example = "Cliente relatou erro na campanha")]
    pub reason: String,
    pub duration_minutes: i32,

    // Só o hash fica no banco; o token puro sai uma única vez na criação
    #[serde(skip_serializing)]
    #[schema(ignore)]
    pub token_hash: String,

    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl SupportSession {
    /// A sessão só vale enquanto está ativa e antes de `expires_at`,
    /// independente do que o cliente acha.
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now < self.expires_at
    }

    /// Ativa no banco mas já vencida.
    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now >= self.expires_at
    }

    pub fn validate_at(&self, now: DateTime<Utc>) -> TokenValidation {
        TokenValidation {
            is_valid: self.is_usable_at(now),
            session_id: Some(self.id),
            admin_user_id: Some(self.admin_user_id),
            target_user_id: Some(self.target_user_id),
            expires_at: Some(self.expires_at),
        }
    }

    pub fn remaining_seconds_at(&self, now: DateTime<Utc>) -> i64 {
        if !self.is_usable_at(now) {
            return 0;
        }
        (self.expires_at - now).num_seconds().max(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TokenValidation {
    pub is_valid: bool,
    pub session_id: Option<Uuid>,
    pub admin_user_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenValidation {
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            session_id: None,
            admin_user_id: None,
            target_user_id: None,
            expires_at: None,
        }
    }
}

// Sessão + token puro, devolvido só na criação
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedSupportSession {
    pub session: SupportSession,
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SupportSessionDetail {
    #[serde(flatten)]
    pub session: SupportSession,
    pub admin: Option<UserSummary>,
    pub target: Option<UserSummary>,
    pub remaining_seconds: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    SupportAccessStarted,
    SupportAccessEnded,
    SupportAccessRevoked,
    UserViewed,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::SupportAccessStarted => "support_access_started",
            AuditAction::SupportAccessEnded => "support_access_ended",
            AuditAction::SupportAccessRevoked => "support_access_revoked",
            AuditAction::UserViewed => "user_viewed",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub admin_user_id: Uuid,
    pub target_user_id: Option<Uuid>,
    #[schema(example = "support_access_started")]
    pub action_type: String,
    pub resource_type: Option<String>,
    pub resource_id: Option<String>,
    pub details: Option<Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Dados de auditoria de uma requisição
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

// O motivo é gravado sem espaços nas pontas; só espaços não vale
fn validate_reason(reason: &str) -> Result<(), ValidationError> {
    if reason.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSupportSessionPayload {
    pub target_user_id: Uuid,
    #[validate(custom(function = "validate_reason"))]
    #[schema(example = "Cliente relatou erro na campanha")]
    pub reason: String,
    #[schema(example = 30)]
    pub duration_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EndSupportSessionPayload {
    #[serde(default)]
    pub reason: EndReason,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateTokenPayload {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub expired_sessions: u64,
}
