// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Auth ---
        handlers::auth::register,
        handlers::auth::login,

        // --- Users ---
        handlers::auth::get_me,

        // --- Plans ---
        handlers::plans::list_plans,
        handlers::plans::create_plan,
        handlers::plans::update_plan,
        handlers::plans::delete_plan,
        handlers::plans::check_limit,

        // --- Assistants ---
        handlers::assistants::list_assistants,
        handlers::assistants::create_assistant,
        handlers::assistants::get_assistant,
        handlers::assistants::update_assistant,
        handlers::assistants::delete_assistant,

        // --- Campaigns ---
        handlers::campaigns::create_campaign,
        handlers::campaigns::list_campaigns,
        handlers::campaigns::get_campaign,
        handlers::campaigns::delete_campaign,
        handlers::campaigns::start_campaign,
        handlers::campaigns::pause_campaign,
        handlers::campaigns::resume_campaign,
        handlers::campaigns::stop_campaign,
        handlers::campaigns::reset_daily,
        handlers::campaigns::campaign_status,
        handlers::campaigns::list_calls,
        handlers::campaigns::record_call_result,

        // --- Support Access ---
        handlers::support::create_session,
        handlers::support::end_session,
        handlers::support::active_sessions,
        handlers::support::get_session,
        handlers::support::session_audit_logs,
        handlers::support::cleanup_expired,
        handlers::support::validate_token,
        handlers::support::scoped_user,

        // --- Contacts ---
        handlers::contacts::parse_csv,

        // --- Billing ---
        handlers::billing::list_invoices,
        handlers::webhooks::lemonsqueezy,
    ),
    components(
        schemas(
            // --- Auth ---
            models::auth::UserRole,
            models::auth::User,
            models::auth::UserSummary,
            models::auth::RegisterUserPayload,
            models::auth::LoginUserPayload,
            models::auth::AuthResponse,

            // --- Plans ---
            models::plan::PlanConfig,
            models::plan::PlanSummary,
            models::plan::ResourceType,
            models::plan::PlanLimitDecision,
            models::plan::CreatePlanPayload,
            models::plan::UpdatePlanPayload,

            // --- Assistants ---
            models::assistant::Assistant,
            models::assistant::CreateAssistantPayload,
            models::assistant::UpdateAssistantPayload,

            // --- Campaigns ---
            models::campaign::ContactSource,
            models::campaign::CampaignStatus,
            models::campaign::ExecutionStatus,
            models::campaign::Campaign,
            models::campaign::CreateCampaignPayload,
            models::campaign::CallStatus,
            models::campaign::CallOutcome,
            models::campaign::CampaignCall,
            models::campaign::CallResultPayload,
            models::campaign::CallSortField,
            models::campaign::SortOrder,
            models::campaign::CallPage,
            models::campaign::CallStatusCounts,
            models::campaign::CallOutcomeCounts,
            models::campaign::CampaignRates,
            models::campaign::CampaignStatusReport,

            // --- Support Access ---
            models::support::SessionStatus,
            models::support::EndReason,
            models::support::SupportSession,
            models::support::TokenValidation,
            models::support::CreatedSupportSession,
            models::support::SupportSessionDetail,
            models::support::AuditAction,
            models::support::AuditLog,
            models::support::CreateSupportSessionPayload,
            models::support::EndSupportSessionPayload,
            models::support::ValidateTokenPayload,
            models::support::CleanupResult,

            // --- Contacts ---
            models::contact::ContactStatus,
            models::contact::ParsedContact,
            models::contact::CsvPreview,

            // --- Billing ---
            models::billing::Invoice,
            models::billing::WebhookAck,
        )
    ),
    tags(
        (name = "Auth", description = "Autenticação e Registro"),
        (name = "Users", description = "Dados do Usuário"),
        (name = "Plans", description = "Planos e Limites"),
        (name = "Assistants", description = "Agentes de Voz"),
        (name = "Campaigns", description = "Campanhas de Ligação e Ligações"),
        (name = "Support Access", description = "Sessões de Suporte com Token Restrito"),
        (name = "Contacts", description = "Importação de Contatos"),
        (name = "Billing", description = "Faturas e Webhook LemonSqueezy")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
        // Token de suporte: mesmo formato Bearer, validado pelo hash
        components.add_security_scheme(
            "support_token",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/plans",
            "/api/v1/plans/limits/{resource}",
            "/api/v1/assistants/{id}",
            "/api/v1/campaigns/{id}/calls",
            "/api/v1/campaigns/calls/{call_id}/result",
            "/api/v1/support-access/support-sessions/{id}/end",
            "/api/v1/contacts/parse-csv",
            "/api/v1/webhooks/lemonsqueezy",
        ] {
            assert!(doc.paths.paths.contains_key(path), "{} ausente", path);
        }
    }
}
