// src/models/assistant.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Assistant {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tenant: Option<String>,
    #[schema(example = "Recepcionista")]
    pub name: String,
    pub prompt: Option<String>,
    #[schema(example = "alloy")]
    pub voice: Option<String>,
    pub first_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateAssistantPayload {
    #[validate(length(min = 1, max = 120, code = "length"))]
    #[schema(example = "Recepcionista")]
    pub name: String,
    pub prompt: Option<String>,
    pub voice: Option<String>,
    pub first_message: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAssistantPayload {
    #[validate(length(min = 1, max = 120, code = "length"))]
    pub name: Option<String>,
    pub prompt: Option<String>,
    pub voice: Option<String>,
    pub first_message: Option<String>,
}
