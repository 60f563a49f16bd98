// src/handlers/campaigns.rs

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::{
        error::{ApiError, AppError},
        signature::check_signature,
    },
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::campaign::{
        CallListQuery, CallPage, CallResultPayload, Campaign, CampaignCall, CampaignCommand,
        CampaignStatusReport, CreateCampaignPayload,
    },
};

const SIGNATURE_HEADER: &str = "x-signature";

// =============================================================================
//  ÁREA 1: CADASTRO
// =============================================================================

// POST /api/v1/campaigns
#[utoipa::path(
    post,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    request_body = CreateCampaignPayload,
    responses(
        (status = 201, description = "Campanha criada como rascunho", body = Campaign),
        (status = 400, description = "Dados inválidos"),
        (status = 403, description = "Limite do plano atingido")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(payload): Json<CreateCampaignPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let campaign = app_state
        .campaign_service
        .create(&user, &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(campaign)))
}

// GET /api/v1/campaigns
#[utoipa::path(
    get,
    path = "/api/v1/campaigns",
    tag = "Campaigns",
    responses((status = 200, description = "Campanhas do usuário, mais novas primeiro", body = Vec<Campaign>)),
    security(("api_jwt" = []))
)]
pub async fn list_campaigns(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let campaigns = app_state
        .campaign_service
        .list(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(campaigns))
}

// GET /api/v1/campaigns/{id}
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 200, description = "Campanha", body = Campaign),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn get_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = app_state
        .campaign_service
        .get(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(campaign))
}

// DELETE /api/v1/campaigns/{id}
#[utoipa::path(
    delete,
    path = "/api/v1/campaigns/{id}",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 204, description = "Campanha e ligações removidas"),
        (status = 400, description = "Campanha em execução"),
        (status = 404, description = "Não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .campaign_service
        .delete(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  ÁREA 2: EXECUÇÃO
// =============================================================================

async fn run_command(
    app_state: AppState,
    locale: Locale,
    user: crate::models::auth::User,
    id: Uuid,
    command: CampaignCommand,
) -> Result<Json<Campaign>, ApiError> {
    let campaign = app_state
        .campaign_service
        .apply_command(&user, id, command)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(campaign))
}

// POST /api/v1/campaigns/{id}/start
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/start",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 200, description = "Campanha em execução", body = Campaign),
        (status = 400, description = "Já em execução ou concluída")
    ),
    security(("api_jwt" = []))
)]
pub async fn start_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_command(app_state, locale, user, id, CampaignCommand::Start).await
}

// POST /api/v1/campaigns/{id}/pause
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/pause",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 200, description = "Campanha pausada", body = Campaign),
        (status = 400, description = "Campanha não está em execução")
    ),
    security(("api_jwt" = []))
)]
pub async fn pause_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_command(app_state, locale, user, id, CampaignCommand::Pause).await
}

// POST /api/v1/campaigns/{id}/resume
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/resume",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 200, description = "Campanha retomada", body = Campaign),
        (status = 400, description = "Campanha não está pausada")
    ),
    security(("api_jwt" = []))
)]
pub async fn resume_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_command(app_state, locale, user, id, CampaignCommand::Resume).await
}

// POST /api/v1/campaigns/{id}/stop
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/stop",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses(
        (status = 200, description = "Campanha concluída", body = Campaign),
        (status = 400, description = "Campanha já concluída")
    ),
    security(("api_jwt" = []))
)]
pub async fn stop_campaign(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    run_command(app_state, locale, user, id, CampaignCommand::Stop).await
}

// POST /api/v1/campaigns/{id}/reset-daily
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/{id}/reset-daily",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses((status = 200, description = "Contador diário zerado", body = Campaign)),
    security(("api_jwt" = []))
)]
pub async fn reset_daily(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let campaign = app_state
        .campaign_service
        .reset_daily(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(campaign))
}

// =============================================================================
//  ÁREA 3: ACOMPANHAMENTO
// =============================================================================

// GET /api/v1/campaigns/{id}/status
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/status",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha")),
    responses((status = 200, description = "Situação agregada", body = CampaignStatusReport)),
    security(("api_jwt" = []))
)]
pub async fn campaign_status(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let report = app_state
        .campaign_service
        .status_report(&user, id)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(report))
}

// GET /api/v1/campaigns/{id}/calls
#[utoipa::path(
    get,
    path = "/api/v1/campaigns/{id}/calls",
    tag = "Campaigns",
    params(("id" = Uuid, Path, description = "ID da campanha"), CallListQuery),
    responses((status = 200, description = "Ligações paginadas", body = CallPage)),
    security(("api_jwt" = []))
)]
pub async fn list_calls(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Query(query): Query<CallListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = app_state
        .campaign_service
        .list_calls(&user, id, &query)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(page))
}

// =============================================================================
//  ÁREA 4: CALLBACK DO DISCADOR
// =============================================================================

// POST /api/v1/campaigns/calls/{call_id}/result
#[utoipa::path(
    post,
    path = "/api/v1/campaigns/calls/{call_id}/result",
    tag = "Campaigns",
    request_body = CallResultPayload,
    params(
        ("call_id" = Uuid, Path, description = "ID da ligação"),
        ("x-signature" = String, Header, description = "HMAC-SHA256 hex do corpo com DIALER_SECRET")
    ),
    responses(
        (status = 200, description = "Resultado registrado", body = CampaignCall),
        (status = 400, description = "Transição ou resultado inválido"),
        (status = 401, description = "Assinatura inválida"),
        (status = 409, description = "Ligação alterada por outra requisição")
    )
)]
pub async fn record_call_result(
    State(app_state): State<AppState>,
    locale: Locale,
    Path(call_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let to_api = |e: AppError| e.to_api_error(&locale, &app_state.i18n_store);

    let signature = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok());
    check_signature(app_state.config.dialer_secret.as_deref(), &body, signature).map_err(to_api)?;

    let payload: CallResultPayload = serde_json::from_slice(&body)
        .map_err(|e| to_api(AppError::BadRequest(format!("Resultado inválido: {}", e))))?;

    let call = app_state
        .campaign_service
        .record_call_result(call_id, &payload)
        .await
        .map_err(to_api)?;

    Ok(Json(call))
}
