// src/handlers/support.rs

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::bearer_token,
        i18n::Locale,
        rbac::{AdminRole, RequireRole},
    },
    models::{
        auth::UserSummary,
        support::{
            AuditLog, CleanupResult, CreateSupportSessionPayload, CreatedSupportSession,
            EndSupportSessionPayload, RequestMeta, SupportSession, SupportSessionDetail, TokenValidation,
            ValidateTokenPayload,
        },
    },
};

/// IP (primeiro do X-Forwarded-For) e User-Agent para a auditoria.
pub fn request_meta(headers: &HeaderMap) -> RequestMeta {
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        });
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    RequestMeta { ip_address, user_agent }
}

// =============================================================================
//  ÁREA 1: SESSÕES (ADMIN)
// =============================================================================

// POST /api/v1/support-access/support-sessions
#[utoipa::path(
    post,
    path = "/api/v1/support-access/support-sessions",
    tag = "Support Access",
    request_body = CreateSupportSessionPayload,
    responses(
        (status = 201, description = "Sessão criada; o token só é exibido aqui", body = CreatedSupportSession),
        (status = 400, description = "Duração inválida ou alvo administrador"),
        (status = 403, description = "Apenas administradores"),
        (status = 404, description = "Usuário alvo não encontrado"),
        (status = 409, description = "Já existe sessão ativa para o usuário")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_session(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    headers: HeaderMap,
    Json(payload): Json<CreateSupportSessionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let created = app_state
        .support_service
        .create(&admin, &payload, &request_meta(&headers))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(created)))
}

// POST /api/v1/support-access/support-sessions/{id}/end
#[utoipa::path(
    post,
    path = "/api/v1/support-access/support-sessions/{id}/end",
    tag = "Support Access",
    request_body = EndSupportSessionPayload,
    params(("id" = Uuid, Path, description = "ID da sessão")),
    responses(
        (status = 200, description = "Sessão encerrada", body = SupportSession),
        (status = 404, description = "Sessão inexistente, de outro admin ou já encerrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn end_session(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
    payload: Option<Json<EndSupportSessionPayload>>,
) -> Result<impl IntoResponse, ApiError> {
    let reason = payload.map(|Json(p)| p.reason).unwrap_or_default();

    let session = app_state
        .support_service
        .end(&admin, id, reason, &request_meta(&headers))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

// GET /api/v1/support-access/support-sessions/active
#[utoipa::path(
    get,
    path = "/api/v1/support-access/support-sessions/active",
    tag = "Support Access",
    responses((status = 200, description = "Sessões ativas do admin", body = Vec<SupportSessionDetail>)),
    security(("api_jwt" = []))
)]
pub async fn active_sessions(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = app_state
        .support_service
        .get_active(&admin)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(sessions))
}

// GET /api/v1/support-access/support-sessions/{id}
#[utoipa::path(
    get,
    path = "/api/v1/support-access/support-sessions/{id}",
    tag = "Support Access",
    params(("id" = Uuid, Path, description = "ID da sessão")),
    responses(
        (status = 200, description = "Sessão", body = SupportSessionDetail),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_session(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let session = app_state
        .support_service
        .get(&admin, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(session))
}

// GET /api/v1/support-access/support-sessions/{id}/audit-logs
#[utoipa::path(
    get,
    path = "/api/v1/support-access/support-sessions/{id}/audit-logs",
    tag = "Support Access",
    params(("id" = Uuid, Path, description = "ID da sessão")),
    responses((status = 200, description = "Trilha de auditoria", body = Vec<AuditLog>)),
    security(("api_jwt" = []))
)]
pub async fn session_audit_logs(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let logs = app_state
        .support_service
        .audit_logs(&admin, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(logs))
}

// POST /api/v1/support-access/cleanup-expired
#[utoipa::path(
    post,
    path = "/api/v1/support-access/cleanup-expired",
    tag = "Support Access",
    responses((status = 200, description = "Sessões vencidas marcadas como expiradas", body = CleanupResult)),
    security(("api_jwt" = []))
)]
pub async fn cleanup_expired(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(_admin, _): RequireRole<AdminRole>,
) -> Result<impl IntoResponse, ApiError> {
    let result = app_state
        .support_service
        .cleanup_expired_sessions()
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(result))
}

// =============================================================================
//  ÁREA 2: TOKEN DE SUPORTE
// =============================================================================

// POST /api/v1/support-access/validate-token
#[utoipa::path(
    post,
    path = "/api/v1/support-access/validate-token",
    tag = "Support Access",
    request_body = ValidateTokenPayload,
    responses((status = 200, description = "Resultado da validação", body = TokenValidation))
)]
pub async fn validate_token(
    State(app_state): State<AppState>,
    locale: Locale,
    Json(payload): Json<ValidateTokenPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let validation = app_state
        .support_service
        .validate_scoped_token(&payload.token)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(validation))
}

// GET /api/v1/support-access/scoped-user/{user_id}
#[utoipa::path(
    get,
    path = "/api/v1/support-access/scoped-user/{user_id}",
    tag = "Support Access",
    params(("user_id" = Uuid, Path, description = "Usuário alvo da sessão")),
    responses(
        (status = 200, description = "Dados do usuário alvo", body = UserSummary),
        (status = 401, description = "Token de suporte inválido ou expirado"),
        (status = 403, description = "O token é de outro usuário")
    ),
    security(("support_token" = []))
)]
pub async fn scoped_user(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(user_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = bearer_token(&headers)
        .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

    let user = app_state
        .support_service
        .get_user_for_scoped_access(&token, user_id, &request_meta(&headers))
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn meta_prefers_the_first_forwarded_address() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let meta = request_meta(&headers);
        assert_eq!(meta.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(meta.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn meta_falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.2"));
        assert_eq!(request_meta(&headers).ip_address.as_deref(), Some("10.0.0.2"));
        assert_eq!(request_meta(&HeaderMap::new()).user_agent, None);
    }
}
