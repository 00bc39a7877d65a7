//! API route handlers for `/api/auth`.

use std::sync::Arc;

use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use axum::Json;
use clientele_auth::{
    AuthError, AuthService, ConfirmOutcome, EmailSender, IdentityTokenProvider, LoginOutput,
    RegisterInput, RegisterOutput, TokenBundle, UserProfile,
};
use clientele_core::repository::{
    AccountRepository, ClientRepository, RefreshTokenStore, TenantRepository,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// The concrete collaborators a running server is built from.
pub trait Backend: Send + Sync + 'static {
    type Tenants: TenantRepository + 'static;
    type Accounts: AccountRepository + Clone + 'static;
    type Store: RefreshTokenStore + Clone + 'static;
    type Identity: IdentityTokenProvider + 'static;
    type Email: EmailSender + 'static;
    type Clients: ClientRepository + 'static;
}

pub type BackendAuthService<B> = AuthService<
    <B as Backend>::Tenants,
    <B as Backend>::Accounts,
    <B as Backend>::Store,
    <B as Backend>::Identity,
    <B as Backend>::Email,
>;

/// Shared state for the HTTP server.
pub struct AppState<B: Backend> {
    pub auth: Arc<BackendAuthService<B>>,
    pub clients: Arc<B::Clients>,
}

impl<B: Backend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            auth: Arc::clone(&self.auth),
            clients: Arc::clone(&self.clients),
        }
    }
}

impl<B: Backend> AppState<B> {
    pub fn new(auth: BackendAuthService<B>, clients: B::Clients) -> Self {
        Self {
            auth: Arc::new(auth),
            clients: Arc::new(clients),
        }
    }
}

const RESEND_ACK: &str =
    "If the address belongs to an unconfirmed account, a confirmation email has been sent.";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// An [`AuthError`] on its way to the client.
#[derive(Debug)]
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::UserCreationFailed { .. } | AuthError::TenantOrphaned { .. } => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredRefreshToken
            | AuthError::TokenInvalid(_) => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotConfirmed => StatusCode::FORBIDDEN,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::SigningKeyMisconfigured | AuthError::Crypto(_) | AuthError::Core(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_internal() {
            tracing::error!(error = %self.0, "request failed");
        }
        let mut body = json!({
            "error": self.0.code(),
            "message": self.0.client_message(),
        });
        if matches!(self.0, AuthError::EmailNotConfirmed) {
            body["emailConfirmationRequired"] = json!(true);
        }
        (self.status(), Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Extractors and request bodies
// ---------------------------------------------------------------------------

/// Raw token from an `Authorization: Bearer` header.
pub struct BearerToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for BearerToken {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|t| Self(t.trim().to_string()))
            .filter(|t| !t.0.is_empty())
            .ok_or_else(|| AuthError::TokenInvalid("missing bearer token".into()).into())
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

#[derive(Deserialize)]
pub struct ResendRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmQuery {
    pub user_id: Uuid,
    pub token: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "clientele-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn register<B: Backend>(
    State(state): State<AppState<B>>,
    Json(input): Json<RegisterInput>,
) -> Result<Json<RegisterOutput>, ApiError> {
    Ok(Json(state.auth.register(input).await?))
}

pub async fn login<B: Backend>(
    State(state): State<AppState<B>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginOutput>, ApiError> {
    Ok(Json(state.auth.login(&req.email, &req.password).await?))
}

pub async fn refresh<B: Backend>(
    State(state): State<AppState<B>>,
    Json(req): Json<RefreshRequest>,
) -> Result<Json<TokenBundle>, ApiError> {
    Ok(Json(state.auth.refresh(&req.refresh_token).await?))
}

pub async fn confirm_email<B: Backend>(
    State(state): State<AppState<B>>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.auth.confirm_email(query.user_id, &query.token).await? {
        outcome @ (ConfirmOutcome::Confirmed | ConfirmOutcome::AlreadyConfirmed) => {
            Ok(Json(json!({ "outcome": outcome })))
        }
        ConfirmOutcome::UserNotFound => Err(AuthError::UserNotFound.into()),
        ConfirmOutcome::TokenInvalid => Err(ApiError(AuthError::TokenInvalid(
            "confirmation token rejected".into(),
        ))),
    }
}

pub async fn resend_confirmation<B: Backend>(
    State(state): State<AppState<B>>,
    Json(req): Json<ResendRequest>,
) -> Json<serde_json::Value> {
    // The answer never depends on whether the address is known.
    if let Err(e) = state.auth.resend_confirmation(&req.email).await {
        tracing::error!(error = %e, "resend confirmation failed");
    }
    Json(json!({ "message": RESEND_ACK }))
}

pub async fn logout<B: Backend>(
    State(state): State<AppState<B>>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some(token) = req.refresh_token.as_deref() {
        state.auth.logout(token).await?;
    }
    Ok(Json(json!({ "message": "logged out" })))
}

pub async fn me<B: Backend>(
    State(state): State<AppState<B>>,
    BearerToken(token): BearerToken,
) -> Result<Json<UserProfile>, ApiError> {
    let claims = state.auth.validate_access_token(&token)?;
    let account_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AuthError::TokenInvalid("subject is not an account id".into()))?;
    match state.auth.current_user(account_id).await {
        Ok(profile) => Ok(Json(profile)),
        Err(AuthError::UserNotFound) => {
            Err(AuthError::TokenInvalid("account no longer exists".into()).into())
        }
        Err(e) => Err(e.into()),
    }
}
