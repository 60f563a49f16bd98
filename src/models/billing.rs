// src/models/billing.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    #[schema(example = "LS-123456")]
    pub id: String,
    pub user_id: Uuid,
    // Em centavos
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub invoice_number: Option<String>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Só os campos do evento que o webhook usa
#[derive(Debug, Deserialize)]
pub struct LemonSqueezyEvent {
    pub meta: EventMeta,
    pub data: EventData,
}

#[derive(Debug, Deserialize)]
pub struct EventMeta {
    pub event_name: String,
    #[serde(default)]
    pub custom_data: Option<CustomData>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomData {
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EventData {
    pub id: Value,
    #[serde(default)]
    pub attributes: EventAttributes,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventAttributes {
    pub user_email: Option<String>,
    pub user_name: Option<String>,
    pub status: Option<String>,
    pub currency: Option<String>,
    pub total: Option<i64>,
    // Identificador público do pedido (UUID)
    pub identifier: Option<String>,
    pub order_number: Option<Value>,
    pub variant_id: Option<Value>,
    #[serde(default)]
    pub first_order_item: Option<OrderItem>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderItem {
    pub variant_id: Option<Value>,
}

impl LemonSqueezyEvent {
    /// O id vem como string ou número dependendo do evento.
    pub fn object_id(&self) -> String {
        value_to_string(&self.data.id)
    }

    /// `variant_id` direto (assinaturas) ou do primeiro item (pedidos).
    pub fn variant_id(&self) -> Option<String> {
        let attrs = &self.data.attributes;
        attrs
            .variant_id
            .as_ref()
            .or_else(|| attrs.first_order_item.as_ref().and_then(|i| i.variant_id.as_ref()))
            .map(value_to_string)
            .filter(|v| !v.is_empty())
    }

    pub fn custom_user_id(&self) -> Option<Uuid> {
        self.meta
            .custom_data
            .as_ref()
            .and_then(|c| c.user_id.as_deref())
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handled: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_ids_from_numbers_or_strings() {
        let event: LemonSqueezyEvent = serde_json::from_value(json!({
            "meta": { "event_name": "order_created", "custom_data": { "user_id": "8a6e0804-2bd0-4672-b79d-d97027f9071a" } },
            "data": {
                "id": 1234,
                "attributes": {
                    "user_email": "ana@empresa.com",
                    "total": 2900,
                    "first_order_item": { "variant_id": 555 }
                }
            }
        }))
        .unwrap();

        assert_eq!(event.object_id(), "1234");
        assert_eq!(event.variant_id().as_deref(), Some("555"));
        assert!(event.custom_user_id().is_some());
    }

    #[test]
    fn subscription_variant_comes_from_attributes() {
        let event: LemonSqueezyEvent = serde_json::from_value(json!({
            "meta": { "event_name": "subscription_created" },
            "data": { "id": "sub_9", "attributes": { "variant_id": "777" } }
        }))
        .unwrap();

        assert_eq!(event.object_id(), "sub_9");
        assert_eq!(event.variant_id().as_deref(), Some("777"));
        assert_eq!(event.custom_user_id(), None);
    }
}
