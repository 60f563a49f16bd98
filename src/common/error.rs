use std::collections::HashMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::common::i18n::I18nStore;
use crate::middleware::i18n::Locale;

// Erro de domínio. Cada variante vira uma chave de tradução em `to_api_error`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Requisição malformada: {0}")]
    BadRequest(String),

    #[error("E-mail já existe")]
    EmailAlreadyExists,

    #[error("Credenciais inválidas")]
    InvalidCredentials,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Usuário não encontrado")]
    UserNotFound,

    #[error("Acesso negado")]
    Forbidden,

    #[error("Papel necessário: {0}")]
    RoleRequired(&'static str),

    #[error("Limite do plano atingido: {limit} {resource}")]
    PlanLimitReached { limit: i32, resource: &'static str },

    #[error("Criação negada pelo plano: {0}")]
    PlanLimitDenied(String),

    #[error("Recurso não encontrado: {0}")]
    ResourceNotFound(String),

    #[error("Violação de unicidade: {0}")]
    UniqueConstraintViolation(String),

    // Regra de negócio violada; o conteúdo é a chave de tradução
    #[error("Regra de negócio: {0}")]
    BusinessRule(&'static str),

    #[error("Conflito: {0}")]
    Conflict(&'static str),

    #[error("Assinatura inválida")]
    InvalidSignature,

    #[error("Erro de banco de dados: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor: {0}")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de Bcrypt: {0}")]
    BcryptError(#[from] bcrypt::BcryptError),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

// Erro pronto para o cliente (status + mensagem já traduzida)
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "error": self.error,
        });
        if let Some(details) = self.details {
            body["details"] = details;
        }
        (self.status, Json(body)).into_response()
    }
}

impl AppError {
    /// Converte o erro de domínio numa resposta HTTP no idioma do cliente.
    /// Erros internos são logados e nunca expõem o detalhe original.
    pub fn to_api_error(&self, locale: &Locale, store: &I18nStore) -> ApiError {
        let lang = locale.0.as_str();
        let t = |key: &str, args: &[(&str, String)]| store.translate(lang, key, args);

        let (status, error) = match self {
            AppError::ValidationError(errors) => {
                let mut details: HashMap<String, Vec<String>> = HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages = field_errors
                        .iter()
                        .map(|e| t(&format!("validation.{}", e.code), &[]))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                return ApiError {
                    status: StatusCode::BAD_REQUEST,
                    error: t("validation_failed", &[]),
                    details: Some(json!(details)),
                };
            }
            AppError::BadRequest(reason) => {
                tracing::debug!("Requisição rejeitada: {}", reason);
                (StatusCode::BAD_REQUEST, t("bad_request", &[]))
            }
            AppError::EmailAlreadyExists => (StatusCode::CONFLICT, t("email_already_exists", &[])),
            AppError::InvalidCredentials => (StatusCode::UNAUTHORIZED, t("invalid_credentials", &[])),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, t("invalid_token", &[])),
            AppError::UserNotFound => (StatusCode::NOT_FOUND, t("user_not_found", &[])),
            AppError::Forbidden => (StatusCode::FORBIDDEN, t("forbidden", &[])),
            AppError::RoleRequired(role) => {
                (StatusCode::FORBIDDEN, t("role_required", &[("role", role.to_string())]))
            }
            AppError::PlanLimitReached { limit, resource } => (
                StatusCode::FORBIDDEN,
                t(
                    "plan_limit_reached",
                    &[("limit", limit.to_string()), ("resource", resource.to_string())],
                ),
            ),
            AppError::PlanLimitDenied(message) => (
                StatusCode::FORBIDDEN,
                t("plan_limit_denied", &[("message", message.clone())]),
            ),
            AppError::ResourceNotFound(resource) => (
                StatusCode::NOT_FOUND,
                t("resource_not_found", &[("resource", resource.clone())]),
            ),
            AppError::UniqueConstraintViolation(detail) => (
                StatusCode::CONFLICT,
                t("unique_violation", &[("detail", detail.clone())]),
            ),
            AppError::BusinessRule(key) => (StatusCode::BAD_REQUEST, t(*key, &[])),
            AppError::Conflict(key) => (StatusCode::CONFLICT, t(*key, &[])),
            AppError::InvalidSignature => (StatusCode::UNAUTHORIZED, t("invalid_signature", &[])),

            // Todos os outros erros (banco, bcrypt, jwt, anyhow) viram 500.
            e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, t("internal_error", &[]))
            }
        };

        ApiError { status, error, details: None }
    }
}
