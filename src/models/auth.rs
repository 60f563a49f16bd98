// src/models/auth.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Mapeia o CREATE TYPE user_role do banco
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    User,
}

// Representa um usuário vindo do banco de dados
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    #[schema(example = "ana@empresa.com")]
    pub email: String,
    pub name: Option<String>,

    #[serde(skip_serializing)] // IMPORTANTE para segurança
    #[schema(ignore)]
    pub password_hash: String,

    pub role: UserRole,

    // Chave do plano; None = "free"
    #[schema(example = "starter")]
    pub plan: Option<String>,

    // Slug do whitelabel; None = tenant principal
    #[schema(example = "acme")]
    pub tenant: Option<String>,

    pub is_active: bool,
    pub subscription_id: Option<String>,
    pub minutes_limit: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Administrador do tenant principal (sem whitelabel).
    pub fn is_super_admin(&self) -> bool {
        self.is_admin() && self.tenant.is_none()
    }

    pub fn plan_key(&self) -> &str {
        self.plan.as_deref().filter(|p| !p.is_empty()).unwrap_or("free")
    }
}

// Resumo exibido nas sessões de suporte
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: Option<String>,
    pub email: String,
    pub tenant: Option<String>,
}

// Dados para registro de um novo usuário
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterUserPayload {
    #[validate(email(code = "email"))]
    #[schema(example = "ana@empresa.com")]
    pub email: String,
    #[validate(length(min = 6, code = "length"))]
    #[schema(example = "segredo123")]
    pub password: String,
    #[schema(example = "Ana Souza")]
    pub name: Option<String>,
}

// Dados para login
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginUserPayload {
    #[validate(email(code = "email"))]
    pub email: String,
    #[validate(length(min = 6, code = "length"))]
    pub password: String,
}

// Resposta de autenticação com o token
#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
}

// Estrutura de dados ("claims") dentro do JWT
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,  // Subject (ID do usuário)
    pub exp: usize, // Expiration time (quando o token expira)
    pub iat: usize, // Issued At (quando o token foi criado)
}
