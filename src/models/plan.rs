// src/models/plan.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

// Configuração de plano. tenant = None é o plano global (padrão).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    pub id: Uuid,
    #[schema(example = "starter")]
    pub plan_key: String,
    pub tenant: Option<String>,
    #[schema(example = "Starter")]
    pub name: String,
    #[schema(example = "29.00")]
    pub price: Decimal,
    pub minutes: Option<i32>,
    pub pay_as_you_go: bool,
    pub features: Vec<String>,

    // 0 ou None = ilimitado
    pub max_assistants: Option<i32>,
    pub max_email_campaigns: Option<i32>,
    pub max_call_campaigns: Option<i32>,

    // Whitelabel ignora todos os limites
    pub whitelabel_enabled: bool,

    #[schema(example = "123456")]
    pub variant_id: Option<String>,
    pub is_active: bool,
    pub display_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlanConfig {
    pub fn limit_for(&self, resource: ResourceType) -> Option<i32> {
        match resource {
            ResourceType::Assistant => self.max_assistants,
            ResourceType::EmailCampaign => self.max_email_campaigns,
            ResourceType::CallCampaign => self.max_call_campaigns,
        }
    }
}

// Recursos controlados pelo plano
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Assistant,
    EmailCampaign,
    CallCampaign,
}

impl ResourceType {
    /// Nome usado na mensagem de limite atingido.
    pub fn display_name(self) -> &'static str {
        match self {
            ResourceType::Assistant => "agents",
            ResourceType::EmailCampaign => "email campaigns",
            ResourceType::CallCampaign => "call campaigns",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PlanLimitDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    // Preenchido quando a negação é por limite atingido
    #[serde(skip)]
    #[schema(ignore)]
    pub limit_reached: Option<(i32, ResourceType)>,
}

impl PlanLimitDecision {
    pub fn allow() -> Self {
        Self { allowed: true, message: None, limit_reached: None }
    }

    pub fn deny(message: impl Into<String>) -> Self {
        Self { allowed: false, message: Some(message.into()), limit_reached: None }
    }

    pub fn limit_reached(limit: i32, resource: ResourceType) -> Self {
        Self {
            allowed: false,
            message: Some(format!(
                "Plan limit reached. Your current plan allows up to {} {}.",
                limit, resource
            )),
            limit_reached: Some((limit, resource)),
        }
    }
}

/// O que o limite de plano responde quando a própria verificação falha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitFailurePolicy {
    #[default]
    Allow,
    Deny,
}

impl FromStr for LimitFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(Self::Allow),
            "deny" => Ok(Self::Deny),
            other => Err(anyhow::anyhow!("política de falha desconhecida: '{}'", other)),
        }
    }
}

// Item da listagem pública de planos
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub key: String,
    pub name: String,
    pub price: Decimal,
    pub minutes: Option<i32>,
    pub pay_as_you_go: bool,
    pub features: Vec<String>,
    pub whitelabel_enabled: bool,
}

impl From<PlanConfig> for PlanSummary {
    fn from(plan: PlanConfig) -> Self {
        Self {
            key: plan.plan_key,
            name: plan.name,
            price: plan.price,
            minutes: plan.minutes,
            pay_as_you_go: plan.pay_as_you_go,
            features: plan.features,
            whitelabel_enabled: plan.whitelabel_enabled,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatePlanPayload {
    #[validate(length(min = 1, code = "required"))]
    #[schema(example = "starter")]
    pub plan_key: String,
    #[validate(length(min = 1, code = "required"))]
    pub name: String,
    pub price: Decimal,
    #[validate(range(min = 0, code = "range"))]
    pub minutes: Option<i32>,
    #[serde(default)]
    pub pay_as_you_go: bool,
    #[serde(default)]
    pub features: Vec<String>,
    #[validate(range(min = 0, code = "range"))]
    pub max_assistants: Option<i32>,
    #[validate(range(min = 0, code = "range"))]
    pub max_email_campaigns: Option<i32>,
    #[validate(range(min = 0, code = "range"))]
    pub max_call_campaigns: Option<i32>,
    #[serde(default)]
    pub whitelabel_enabled: bool,
    pub variant_id: Option<String>,
    #[serde(default)]
    pub display_order: i32,
}

// Atualização parcial: só o que vier preenchido é alterado
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanPayload {
    #[validate(length(min = 1, code = "required"))]
    pub name: Option<String>,
    pub price: Option<Decimal>,
    #[validate(range(min = 0, code = "range"))]
    pub minutes: Option<i32>,
    pub pay_as_you_go: Option<bool>,
    pub features: Option<Vec<String>>,
    #[validate(range(min = 0, code = "range"))]
    pub max_assistants: Option<i32>,
    #[validate(range(min = 0, code = "range"))]
    pub max_email_campaigns: Option<i32>,
    #[validate(range(min = 0, code = "range"))]
    pub max_call_campaigns: Option<i32>,
    pub whitelabel_enabled: Option<bool>,
    pub variant_id: Option<String>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}
