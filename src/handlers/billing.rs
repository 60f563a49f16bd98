// src/handlers/billing.rs

use axum::{extract::State, response::IntoResponse, Json};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::billing::Invoice,
};

// GET /api/v1/billing/invoices
#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices",
    tag = "Billing",
    responses((status = 200, description = "Faturas do usuário", body = Vec<Invoice>)),
    security(("api_jwt" = []))
)]
pub async fn list_invoices(
    State(app_state): State<AppState>,
    locale: Locale,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let invoices = app_state
        .billing_service
        .list_invoices(&user)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(invoices))
}
