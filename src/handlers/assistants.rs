// src/handlers/assistants.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::assistant::{Assistant, CreateAssistantPayload, UpdateAssistantPayload},
};

// GET /api/v1/assistants
#[utoipa::path(
    get,
    path = "/api/v1/assistants",
    tag = "Assistants",
    responses((status = 200, description = "Assistentes do usuário", body = Vec<Assistant>)),
    security(("api_jwt" = []))
)]
pub async fn list_assistants(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let assistants = app_state
        .assistant_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(assistants))
}

// POST /api/v1/assistants
#[utoipa::path(
    post,
    path = "/api/v1/assistants",
    tag = "Assistants",
    request_body = CreateAssistantPayload,
    responses(
        (status = 201, description = "Assistente criado", body = Assistant),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Limite do plano atingido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_assistant(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateAssistantPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let assistant = app_state
        .assistant_service
        .create(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(assistant)))
}

// GET /api/v1/assistants/{id}
#[utoipa::path(
    get,
    path = "/api/v1/assistants/{id}",
    tag = "Assistants",
    params(("id" = Uuid, Path, description = "ID do assistente")),
    responses(
        (status = 200, description = "Assistente", body = Assistant),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_assistant(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let assistant = app_state
        .assistant_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(assistant))
}

// PUT /api/v1/assistants/{id}
#[utoipa::path(
    put,
    path = "/api/v1/assistants/{id}",
    tag = "Assistants",
    request_body = UpdateAssistantPayload,
    params(("id" = Uuid, Path, description = "ID do assistente")),
    responses(
        (status = 200, description = "Assistente atualizado", body = Assistant),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_assistant(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAssistantPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let assistant = app_state
        .assistant_service
        .update(&user, id, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(assistant))
}

// DELETE /api/v1/assistants/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/assistants/{id}",
    tag = "Assistants",
    params(("id" = Uuid, Path, description = "ID do assistente")),
    responses(
        (status = 204, description = "Assistente removido"),
        (status = 404, description = "Não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_assistant(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .assistant_service
        .delete(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}
