// src/handlers/contacts.rs

use axum::{response::IntoResponse, Json};

use crate::{
    middleware::auth::AuthenticatedUser,
    models::contact::CsvPreview,
    services::contact_import::parse_contact_csv,
};

// POST /api/v1/contacts/parse-csv
#[utoipa::path(
    post,
    path = "/api/v1/contacts/parse-csv",
    tag = "Contacts",
    request_body(content = String, content_type = "text/csv", description = "Conteúdo do arquivo CSV"),
    responses((status = 200, description = "Contatos reconhecidos no arquivo", body = CsvPreview)),
    security(("api_jwt" = []))
)]
pub async fn parse_csv(AuthenticatedUser(user): AuthenticatedUser, body: String) -> impl IntoResponse {
    let contacts = parse_contact_csv(&body);
    tracing::debug!("Usuário {} importou CSV com {} contatos válidos", user.id, contacts.len());

    Json(CsvPreview { total: contacts.len(), contacts })
}
