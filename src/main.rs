//src/main.rs

use anyhow::Context;
use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::{AppConfig, AppState};
use crate::docs::ApiDoc;
use crate::middleware::auth::auth_guard;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = AppConfig::from_env().context("Configuração inválida")?;
    let bind_addr = config.bind_addr.clone();
    let app_state = AppState::new(config)
        .await
        .context("Falha ao inicializar o estado da aplicação")?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;

    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    spawn_background_jobs(&app_state)?;

    let app = build_router(app_state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Falha ao iniciar o listener TCP em {}", bind_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    tracing::info!("📚 Documentação em http://{}/swagger-ui", listener.local_addr()?);

    axum::serve(listener, app).await.context("Erro no servidor Axum")?;
    Ok(())
}

fn spawn_background_jobs(app_state: &AppState) -> anyhow::Result<()> {
    if let Some(engine) = app_state.campaign_engine()? {
        tokio::spawn(engine.run());
    }

    let sweeper = app_state.support_service.clone();
    tokio::spawn(sweeper.run_sweeper(app_state.config.support_sweep));
    Ok(())
}

fn build_router(app_state: AppState) -> Router {
    let guard = || axum_middleware::from_fn_with_state(app_state.clone(), auth_guard);

    // Rotas de autenticação (públicas)
    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login));

    let user_routes = Router::new()
        .route("/me", get(handlers::auth::get_me))
        .layer(guard());

    // A listagem de planos é pública; o resto exige admin
    let plan_routes = Router::new()
        .route("/", post(handlers::plans::create_plan))
        .route(
            "/{key}",
            put(handlers::plans::update_plan).delete(handlers::plans::delete_plan),
        )
        .route("/limits/{resource}", get(handlers::plans::check_limit))
        .layer(guard())
        .route("/", get(handlers::plans::list_plans));

    let assistant_routes = Router::new()
        .route(
            "/",
            get(handlers::assistants::list_assistants).post(handlers::assistants::create_assistant),
        )
        .route(
            "/{id}",
            get(handlers::assistants::get_assistant)
                .put(handlers::assistants::update_assistant)
                .delete(handlers::assistants::delete_assistant),
        )
        .layer(guard());

    let campaign_routes = Router::new()
        .route(
            "/",
            get(handlers::campaigns::list_campaigns).post(handlers::campaigns::create_campaign),
        )
        .route(
            "/{id}",
            get(handlers::campaigns::get_campaign).delete(handlers::campaigns::delete_campaign),
        )
        .route("/{id}/start", post(handlers::campaigns::start_campaign))
        .route("/{id}/pause", post(handlers::campaigns::pause_campaign))
        .route("/{id}/resume", post(handlers::campaigns::resume_campaign))
        .route("/{id}/stop", post(handlers::campaigns::stop_campaign))
        .route("/{id}/reset-daily", post(handlers::campaigns::reset_daily))
        .route("/{id}/status", get(handlers::campaigns::campaign_status))
        .route("/{id}/calls", get(handlers::campaigns::list_calls))
        .layer(guard())
        // Callback do discador: autenticado pela assinatura, não por JWT
        .route("/calls/{call_id}/result", post(handlers::campaigns::record_call_result));

    let support_routes = Router::new()
        .route("/support-sessions", post(handlers::support::create_session))
        .route("/support-sessions/active", get(handlers::support::active_sessions))
        .route("/support-sessions/{id}", get(handlers::support::get_session))
        .route("/support-sessions/{id}/end", post(handlers::support::end_session))
        .route(
            "/support-sessions/{id}/audit-logs",
            get(handlers::support::session_audit_logs),
        )
        .route("/cleanup-expired", post(handlers::support::cleanup_expired))
        .layer(guard())
        // Usam o token de suporte, não o JWT
        .route("/validate-token", post(handlers::support::validate_token))
        .route("/scoped-user/{user_id}", get(handlers::support::scoped_user));

    let contact_routes = Router::new()
        .route("/parse-csv", post(handlers::contacts::parse_csv))
        .layer(guard());

    let billing_routes = Router::new()
        .route("/invoices", get(handlers::billing::list_invoices))
        .layer(guard());

    let webhook_routes = Router::new()
        .route("/lemonsqueezy", post(handlers::webhooks::lemonsqueezy));

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/auth", auth_routes)
        .nest("/api/users", user_routes)
        .nest("/api/v1/plans", plan_routes)
        .nest("/api/v1/assistants", assistant_routes)
        .nest("/api/v1/campaigns", campaign_routes)
        .nest("/api/v1/support-access", support_routes)
        .nest("/api/v1/contacts", contact_routes)
        .nest("/api/v1/billing", billing_routes)
        .nest("/api/v1/webhooks", webhook_routes)
        .with_state(app_state)
}
