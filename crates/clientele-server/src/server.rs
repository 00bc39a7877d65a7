//! HTTP server wiring using Axum.

use anyhow::Context;
use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use clientele_auth::{AuthService, HmacIdentityTokenProvider};
use clientele_db::DbManager;
use clientele_db::repository::{
    SurrealAccountRepository, SurrealClientRepository, SurrealTenantRepository,
};
use surrealdb::engine::remote::ws::Client;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::clients;
use crate::config::{HttpConfig, ServerConfig};
use crate::email::Mailer;
use crate::routes::{self, AppState, Backend};
use crate::store::RefreshStore;

/// SurrealDB over WebSocket, SMTP or log email.
pub struct LiveBackend;

impl Backend for LiveBackend {
    type Tenants = SurrealTenantRepository<Client>;
    type Accounts = SurrealAccountRepository<Client>;
    type Store = RefreshStore<Client>;
    type Identity = HmacIdentityTokenProvider;
    type Email = Mailer;
    type Clients = SurrealClientRepository<Client>;
}

/// CORS policy admitting only the configured origins. `*` admits any.
pub fn cors_layer(http: &HttpConfig) -> anyhow::Result<CorsLayer> {
    let allow_origin = if http.cors_allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins = http
            .cors_allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin '{o}'"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

/// Build the Axum router with all routes.
pub fn build_router<B: Backend>(state: AppState<B>, http: &HttpConfig) -> anyhow::Result<Router> {
    let router = Router::new()
        .route("/health", get(routes::health_check))
        .route("/api/auth/register", post(routes::register::<B>))
        .route("/api/auth/login", post(routes::login::<B>))
        .route("/api/auth/refresh", post(routes::refresh::<B>))
        .route("/api/auth/confirm-email", get(routes::confirm_email::<B>))
        .route(
            "/api/auth/resend-confirmation",
            post(routes::resend_confirmation::<B>),
        )
        .route("/api/auth/logout", post(routes::logout::<B>))
        .route("/api/auth/me", get(routes::me::<B>))
        .route(
            "/api/clients",
            get(clients::list_clients::<B>).post(clients::create_client::<B>),
        )
        .route(
            "/api/clients/{id}",
            get(clients::get_client::<B>)
                .put(clients::update_client::<B>)
                .delete(clients::delete_client::<B>),
        )
        .layer(cors_layer(http)?)
        .layer(TraceLayer::new_for_http())
        .with_state(state);
    Ok(router)
}

/// Connect every collaborator. Fails if any of them is misconfigured.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState<LiveBackend>> {
    config.auth.validate()?;
    let db = DbManager::connect(&(&config.database).into()).await?;
    let client = db.client();

    let identity = HmacIdentityTokenProvider::new(
        config.auth.jwt_secret.as_bytes(),
        config.auth.confirmation_token_lifetime(),
    );
    let auth = AuthService::new(
        SurrealTenantRepository::new(client.clone()),
        SurrealAccountRepository::new(client.clone()),
        RefreshStore::new(config.refresh_store, client.clone()),
        identity,
        Mailer::from_config(&config.email)?,
        config.auth.clone(),
    )?;

    tracing::info!(refresh_store = ?config.refresh_store, "auth service ready");
    Ok(AppState::new(auth, SurrealClientRepository::new(client)))
}

/// Start the HTTP server.
pub async fn start(config: ServerConfig) -> anyhow::Result<()> {
    let state = build_state(&config).await?;
    let app = build_router(state, &config.http)?;

    let addr = config.http.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
