// src/handlers/plans.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use validator::Validate;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{
        auth::AuthenticatedUser,
        i18n::Locale,
        rbac::{AdminRole, RequireRole},
        tenancy::TenantContext,
    },
    models::plan::{CreatePlanPayload, PlanConfig, PlanLimitDecision, PlanSummary, ResourceType, UpdatePlanPayload},
};

// GET /api/v1/plans
#[utoipa::path(
    get,
    path = "/api/v1/plans",
    tag = "Plans",
    params(
        ("x-tenant" = Option<String>, Header, description = "Slug do whitelabel; ausente ou 'main' = planos globais")
    ),
    responses(
        (status = 200, description = "Planos ativos", body = Vec<PlanSummary>)
    )
)]
pub async fn list_plans(
    State(app_state): State<AppState>,
    locale: Locale,
    tenant: TenantContext,
) -> Result<impl IntoResponse, ApiError> {
    let plans = app_state
        .plan_service
        .list_plans(tenant.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    let summaries: Vec<PlanSummary> = plans.into_iter().map(PlanSummary::from).collect();
    Ok(Json(summaries))
}

// POST /api/v1/plans
#[utoipa::path(
    post,
    path = "/api/v1/plans",
    tag = "Plans",
    request_body = CreatePlanPayload,
    responses(
        (status = 201, description = "Plano criado", body = PlanConfig),
        (status = 400, description = "Dados inválidos ou chave duplicada"),
        (status = 403, description = "Apenas administradores")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Json(payload): Json<CreatePlanPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    // O plano pertence ao tenant do administrador
    let plan = app_state
        .plan_service
        .create_plan(admin.tenant.as_deref(), &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok((StatusCode::CREATED, Json(plan)))
}

// PUT /api/v1/plans/{key}
#[utoipa::path(
    put,
    path = "/api/v1/plans/{key}",
    tag = "Plans",
    request_body = UpdatePlanPayload,
    params(("key" = String, Path, description = "Chave do plano")),
    responses(
        (status = 200, description = "Plano atualizado", body = PlanConfig),
        (status = 404, description = "Plano não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Path(key): Path<String>,
    Json(payload): Json<UpdatePlanPayload>,
) -> Result<impl IntoResponse, ApiError> {
    payload
        .validate()
        .map_err(|e| AppError::ValidationError(e).to_api_error(&locale, &app_state.i18n_store))?;

    let plan = app_state
        .plan_service
        .update_plan(&key, admin.tenant.as_deref(), &payload)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(plan))
}

// DELETE /api/v1/plans/{key}
#[utoipa::path(
    delete,
    path = "/api/v1/plans/{key}",
    tag = "Plans",
    params(("key" = String, Path, description = "Chave do plano")),
    responses(
        (status = 204, description = "Plano removido"),
        (status = 404, description = "Plano não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_plan(
    State(app_state): State<AppState>,
    locale: Locale,
    RequireRole(admin, _): RequireRole<AdminRole>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    app_state
        .plan_service
        .delete_plan(&key, admin.tenant.as_deref())
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(StatusCode::NO_CONTENT)
}

// GET /api/v1/plans/limits/{resource}
#[utoipa::path(
    get,
    path = "/api/v1/plans/limits/{resource}",
    tag = "Plans",
    params(("resource" = ResourceType, Path, description = "assistant, email_campaign ou call_campaign")),
    responses(
        (status = 200, description = "Se o usuário ainda pode criar o recurso", body = PlanLimitDecision)
    ),
    security(("api_jwt" = []))
)]
pub async fn check_limit(
    State(app_state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(resource): Path<ResourceType>,
) -> impl IntoResponse {
    Json(app_state.plan_limit_service.check_plan_limit(user.id, resource).await)
}
