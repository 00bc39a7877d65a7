//! API route handlers for `/api/clients`.
//!
//! The tenant always comes from the caller's access token, never from
//! the request body or path.

use axum::Json;
use axum::extract::{FromRequestParts, Path, Query, State};
use axum::http::request::Parts;
use axum::http::{StatusCode, header::LOCATION};
use axum::response::{IntoResponse, Response};
use clientele_auth::AuthError;
use clientele_core::error::CoreError;
use clientele_core::models::client::{Client, ClientDetails};
use clientele_core::repository::{ClientRepository, PaginatedResult, Pagination};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::routes::{ApiError, AppState, Backend, BearerToken};

/// Largest page a client listing returns.
pub const MAX_PAGE_SIZE: u64 = 200;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ClientApiError {
    /// Missing, invalid or tenant-less access token.
    Unauthorized(ApiError),
    NotFound,
    Invalid(String),
    Internal(CoreError),
}

impl From<ApiError> for ClientApiError {
    fn from(e: ApiError) -> Self {
        Self::Unauthorized(e)
    }
}

impl From<CoreError> for ClientApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::NotFound { .. } => Self::NotFound,
            CoreError::Validation { message } => Self::Invalid(message),
            other => Self::Internal(other),
        }
    }
}

impl IntoResponse for ClientApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Unauthorized(e) => return e.into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "ClientNotFound",
                "client not found".to_string(),
            ),
            Self::Invalid(message) => (StatusCode::BAD_REQUEST, "ValidationFailed", message),
            Self::Internal(e) => {
                tracing::error!(error = %e, "client request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "ServerError",
                    "an unexpected error occurred".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Extractors and request bodies
// ---------------------------------------------------------------------------

/// Tenant id taken from a validated bearer access token.
#[derive(Debug, Clone, Copy)]
pub struct TenantScope(pub Uuid);

impl<B: Backend> FromRequestParts<AppState<B>> for TenantScope {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<B>,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(token) = BearerToken::from_request_parts(parts, state).await?;
        let claims = state.auth.validate_access_token(&token)?;
        Uuid::parse_str(&claims.tenant_id)
            .map(Self)
            .map_err(|_| AuthError::TokenInvalid("token carries no tenant".into()).into())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ListQuery {
    pub offset: Option<u64>,
    pub limit: Option<u64>,
}

impl ListQuery {
    fn pagination(&self) -> Pagination {
        let default = Pagination::default();
        Pagination {
            offset: self.offset.unwrap_or(default.offset),
            limit: self.limit.unwrap_or(default.limit).clamp(1, MAX_PAGE_SIZE),
        }
    }
}

/// Update body. `id` is optional; when present it must match the path.
#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(flatten)]
    pub details: ClientDetails,
}

#[derive(Debug, Serialize)]
pub struct ClientPage {
    pub items: Vec<Client>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

impl From<PaginatedResult<Client>> for ClientPage {
    fn from(page: PaginatedResult<Client>) -> Self {
        Self {
            items: page.items,
            total: page.total,
            offset: page.offset,
            limit: page.limit,
        }
    }
}

fn checked(details: ClientDetails) -> Result<ClientDetails, ClientApiError> {
    let details = details.normalized();
    details.validate()?;
    Ok(details)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn list_clients<B: Backend>(
    State(state): State<AppState<B>>,
    TenantScope(tenant_id): TenantScope,
    Query(query): Query<ListQuery>,
) -> Result<Json<ClientPage>, ClientApiError> {
    let page = state.clients.list(tenant_id, query.pagination()).await?;
    Ok(Json(page.into()))
}

pub async fn get_client<B: Backend>(
    State(state): State<AppState<B>>,
    TenantScope(tenant_id): TenantScope,
    Path(id): Path<Uuid>,
) -> Result<Json<Client>, ClientApiError> {
    Ok(Json(state.clients.get_by_id(tenant_id, id).await?))
}

pub async fn create_client<B: Backend>(
    State(state): State<AppState<B>>,
    TenantScope(tenant_id): TenantScope,
    Json(details): Json<ClientDetails>,
) -> Result<impl IntoResponse, ClientApiError> {
    let client = state.clients.create(tenant_id, checked(details)?).await?;
    tracing::info!(client_id = %client.id, %tenant_id, "client created");
    let location = format!("/api/clients/{}", client.id);
    Ok((StatusCode::CREATED, [(LOCATION, location)], Json(client)))
}

pub async fn update_client<B: Backend>(
    State(state): State<AppState<B>>,
    TenantScope(tenant_id): TenantScope,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<Json<Client>, ClientApiError> {
    if req.id.is_some_and(|body_id| body_id != id) {
        return Err(ClientApiError::Invalid("client id mismatch".into()));
    }
    let client = state
        .clients
        .update(tenant_id, id, checked(req.details)?)
        .await?;
    Ok(Json(client))
}

pub async fn delete_client<B: Backend>(
    State(state): State<AppState<B>>,
    TenantScope(tenant_id): TenantScope,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ClientApiError> {
    state.clients.delete(tenant_id, id).await?;
    tracing::info!(client_id = %id, %tenant_id, "client deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        let query = ListQuery {
            offset: Some(10),
            limit: Some(10_000),
        };
        let pagination = query.pagination();
        assert_eq!(pagination.offset, 10);
        assert_eq!(pagination.limit, MAX_PAGE_SIZE);

        assert_eq!(ListQuery::default().pagination().limit, 50);
        let zero = ListQuery {
            offset: None,
            limit: Some(0),
        };
        assert_eq!(zero.pagination().limit, 1);
    }

    #[test]
    fn core_errors_map_to_client_errors() {
        assert!(matches!(
            ClientApiError::from(CoreError::NotFound {
                entity: "client".into(),
                id: "x".into(),
            }),
            ClientApiError::NotFound
        ));
        assert!(matches!(
            ClientApiError::from(CoreError::validation("bad")),
            ClientApiError::Invalid(_)
        ));
        assert!(matches!(
            ClientApiError::from(CoreError::Database("down".into())),
            ClientApiError::Internal(_)
        ));
    }

    #[test]
    fn update_body_accepts_optional_id() {
        let req: UpdateClientRequest =
            serde_json::from_str(r#"{"firstName":"Jo","lastName":"Park","email":"jo@p.test"}"#)
                .unwrap();
        assert!(req.id.is_none());
        assert_eq!(req.details.first_name, "Jo");
    }
}
