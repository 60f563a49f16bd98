// src/handlers/webhooks.rs

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};

use crate::{
    common::error::ApiError,
    config::AppState,
    middleware::i18n::Locale,
    models::billing::WebhookAck,
};

// POST /api/v1/webhooks/lemonsqueezy
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/lemonsqueezy",
    tag = "Billing",
    request_body(content = String, content_type = "application/json", description = "Evento LemonSqueezy (corpo cru)"),
    params(("x-signature" = String, Header, description = "HMAC-SHA256 hex do corpo")),
    responses(
        (status = 200, description = "Evento recebido", body = WebhookAck),
        (status = 400, description = "Corpo inválido"),
        (status = 401, description = "Assinatura ausente ou inválida")
    )
)]
pub async fn lemonsqueezy(
    State(app_state): State<AppState>,
    locale: Locale,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers.get("x-signature").and_then(|v| v.to_str().ok());

    let ack = app_state
        .billing_service
        .handle_webhook(&body, signature)
        .await
        .map_err(|e| e.to_api_error(&locale, &app_state.i18n_store))?;

    Ok(Json(ack))
}
