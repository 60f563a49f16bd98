// src/services/billing_service.rs

use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{error::AppError, signature::check_signature},
    db::{billing_repo::NewInvoice, BillingRepository, UserRepository},
    models::{
        auth::User,
        billing::{Invoice, LemonSqueezyEvent, WebhookAck},
    },
    services::plan_service::PlanService,
};

const HANDLED_EVENTS: [&str; 2] = ["order_created", "subscription_created"];

#[derive(Clone)]
pub struct BillingService {
    repo: BillingRepository,
    users: UserRepository,
    plans: PlanService,
    webhook_secret: Option<String>,
    pool: PgPool,
}

impl BillingService {
    pub fn new(
        repo: BillingRepository,
        users: UserRepository,
        plans: PlanService,
        webhook_secret: Option<String>,
        pool: PgPool,
    ) -> Self {
        Self { repo, users, plans, webhook_secret, pool }
    }

    pub async fn list_invoices(&self, user: &User) -> Result<Vec<Invoice>, AppError> {
        self.repo.list_by_user(user.id).await
    }

    /// Verifica a assinatura do corpo cru e aplica o evento.
    pub async fn handle_webhook(&self, body: &[u8], signature: Option<&str>) -> Result<WebhookAck, AppError> {
        check_signature(self.webhook_secret.as_deref(), body, signature)?;

        let event: LemonSqueezyEvent = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Evento inválido: {}", e)))?;
        let event_name = event.meta.event_name.clone();

        if !HANDLED_EVENTS.contains(&event_name.as_str()) {
            tracing::debug!("Evento LemonSqueezy ignorado: {}", event_name);
            return Ok(WebhookAck { received: true, handled: None });
        }

        self.apply_purchase(&event).await?;
        Ok(WebhookAck { received: true, handled: Some(event_name) })
    }

    async fn apply_purchase(&self, event: &LemonSqueezyEvent) -> Result<(), AppError> {
        let Some(user) = self.resolve_user(event).await? else {
            tracing::warn!(
                "Compra {} sem usuário correspondente ({})",
                event.object_id(),
                event.meta.event_name
            );
            return Ok(());
        };

        let plan = match event.variant_id() {
            Some(variant) => self.plans.find_by_variant(&variant).await?,
            None => None,
        };

        let mut tx = self.pool.begin().await?;

        match &plan {
            Some(plan) => {
                self.users
                    .apply_subscription(&mut *tx, user.id, &plan.plan_key, &event.object_id(), plan.minutes)
                    .await?;
            }
            None => tracing::warn!(
                "Variante {:?} sem plano configurado; plano do usuário {} mantido",
                event.variant_id(),
                user.id
            ),
        }

        let invoice = self.repo.upsert_invoice(&mut *tx, &invoice_from_event(event, user.id)).await?;
        tx.commit().await?;

        tracing::info!(
            "💳 {} aplicado ao usuário {} (plano: {}, fatura: {})",
            event.meta.event_name,
            user.id,
            plan.as_ref().map(|p| p.plan_key.as_str()).unwrap_or("-"),
            invoice.id
        );
        Ok(())
    }

    async fn resolve_user(&self, event: &LemonSqueezyEvent) -> Result<Option<User>, AppError> {
        if let Some(user_id) = event.custom_user_id() {
            if let Some(user) = self.users.find_by_id(user_id).await? {
                return Ok(Some(user));
            }
        }
        match event.data.attributes.user_email.as_deref() {
            Some(email) if !email.trim().is_empty() => self.users.find_by_email(email.trim()).await,
            _ => Ok(None),
        }
    }
}

pub fn invoice_from_event(event: &LemonSqueezyEvent, user_id: Uuid) -> NewInvoice {
    let attrs = &event.data.attributes;
    NewInvoice {
        id: format!("LS-{}", event.object_id()),
        user_id,
        amount: attrs.total.unwrap_or(0),
        currency: attrs.currency.clone().unwrap_or_else(|| "USD".into()),
        status: attrs.status.clone().unwrap_or_else(|| "paid".into()),
        // O número da fatura é o `identifier` do pedido; eventos antigos só trazem `order_number`
        invoice_number: attrs.identifier.clone().filter(|id| !id.trim().is_empty()).or_else(|| {
            attrs.order_number.as_ref().map(|n| match n {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
        }),
        customer_email: attrs.user_email.clone(),
        customer_name: attrs.user_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn invoice_is_built_from_order_attributes() {
        let event: LemonSqueezyEvent = serde_json::from_value(json!({
            "meta": { "event_name": "order_created" },
            "data": {
                "id": "98765",
                "attributes": {
                    "user_email": "ana@empresa.com",
                    "user_name": "Ana",
                    "status": "paid",
                    "currency": "EUR",
                    "total": 4900,
                    "identifier": "12857045-6839-4982-9f06-fff757fd6a0c",
                    "order_number": 1042
                }
            }
        }))
        .unwrap();
        let user_id = Uuid::new_v4();

        let invoice = invoice_from_event(&event, user_id);
        assert_eq!(invoice.id, "LS-98765");
        assert_eq!(invoice.user_id, user_id);
        assert_eq!(invoice.amount, 4900);
        assert_eq!(invoice.currency, "EUR");
        assert_eq!(
            invoice.invoice_number.as_deref(),
            Some("12857045-6839-4982-9f06-fff757fd6a0c")
        );
        assert_eq!(invoice.customer_name.as_deref(), Some("Ana"));
    }

    #[test]
    fn missing_attributes_get_defaults() {
        let event: LemonSqueezyEvent = serde_json::from_value(json!({
            "meta": { "event_name": "subscription_created" },
            "data": { "id": 7 }
        }))
        .unwrap();

        let invoice = invoice_from_event(&event, Uuid::new_v4());
        assert_eq!(invoice.id, "LS-7");
        assert_eq!(invoice.amount, 0);
        assert_eq!(invoice.currency, "USD");
        assert_eq!(invoice.status, "paid");
        assert_eq!(invoice.invoice_number, None);
    }

    #[test]
    fn order_number_is_used_only_without_identifier() {
        let event: LemonSqueezyEvent = serde_json::from_value(json!({
            "meta": { "event_name": "order_created" },
            "data": { "id": "5", "attributes": { "order_number": 1042 } }
        }))
        .unwrap();

        let invoice = invoice_from_event(&event, Uuid::new_v4());
        assert_eq!(invoice.invoice_number.as_deref(), Some("1042"));
    }
}
