//! HTTP-level tests for the auth and client routes, backed by in-memory
//! SurrealDB.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use clientele_auth::{AuthConfig, AuthService, EmailSender, HmacIdentityTokenProvider};
use clientele_db::repository::{
    SurrealAccountRepository, SurrealClientRepository, SurrealTenantRepository,
};
use clientele_server::config::{HttpConfig, RefreshStoreBackend};
use clientele_server::store::RefreshStore;
use clientele_server::{AppState, Backend, build_router};
use serde_json::{Value, json};
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use tokio::sync::Mutex;
use tower::ServiceExt;

/// Keeps the last message body so tests can follow confirmation links.
#[derive(Clone, Default)]
struct CapturingEmailSender {
    bodies: Arc<Mutex<Vec<String>>>,
}

impl CapturingEmailSender {
    async fn last_confirmation_path(&self) -> String {
        let bodies = self.bodies.lock().await;
        let body = bodies
            .iter()
            .rev()
            .find(|b| b.contains("confirm-email"))
            .unwrap();
        let start = body.find("/api/auth/confirm-email").unwrap();
        let end = start + body[start..].find('"').unwrap();
        body[start..end].replace("&amp;", "&")
    }
}

impl EmailSender for CapturingEmailSender {
    async fn send(&self, _to: &str, _subject: &str, html_body: &str) -> bool {
        self.bodies.lock().await.push(html_body.to_string());
        true
    }
}

struct TestBackend;

impl Backend for TestBackend {
    type Tenants = SurrealTenantRepository<Db>;
    type Accounts = SurrealAccountRepository<Db>;
    type Store = RefreshStore<Db>;
    type Identity = HmacIdentityTokenProvider;
    type Email = CapturingEmailSender;
    type Clients = SurrealClientRepository<Db>;
}

const FRONT_END: &str = "https://app.crm.test";

async fn app() -> (Router, CapturingEmailSender) {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clientele_db::run_migrations(&db).await.unwrap();

    let config = AuthConfig {
        jwt_secret: "api-test-secret-that-is-at-least-32-bytes".into(),
        public_base_url: "http://crm.test".into(),
        ..Default::default()
    };
    let email = CapturingEmailSender::default();
    let auth = AuthService::new(
        SurrealTenantRepository::new(db.clone()),
        SurrealAccountRepository::new(db.clone()),
        RefreshStore::new(RefreshStoreBackend::Database, db.clone()),
        HmacIdentityTokenProvider::new(config.jwt_secret.as_bytes(), config.confirmation_token_lifetime()),
        email.clone(),
        config,
    )
    .unwrap();

    let http = HttpConfig {
        cors_allowed_origins: vec![FRONT_END.into()],
        ..Default::default()
    };
    let state = AppState::<TestBackend>::new(auth, SurrealClientRepository::new(db));
    (build_router(state, &http).unwrap(), email)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn authed(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"));
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Register, confirm and log in a fresh tenant admin. Returns the access
/// token.
async fn signed_in(app: &Router, email: &CapturingEmailSender, address: &str) -> String {
    let mut input = registration();
    input["email"] = json!(address);
    let (status, _) = send(app, post_json("/api/auth/register", input)).await;
    assert_eq!(status, StatusCode::OK);

    let path = email.last_confirmation_path().await;
    let (status, _) = send(app, get(&path)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, login) = send(
        app,
        post_json(
            "/api/auth/login",
            json!({ "email": address, "password": "Pw123456!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    login["access_token"].as_str().unwrap().to_string()
}

fn new_client(first_name: &str) -> Value {
    json!({
        "title": "Ms",
        "firstName": first_name,
        "lastName": "Park",
        "email": format!("{}@clients.test", first_name.to_lowercase()),
        "phone": "0400 000 000",
        "dateOfBirth": "1985-06-30",
        "suburb": "Carlton"
    })
}

fn registration() -> Value {
    json!({
        "email": "amy@acme.test",
        "password": "Pw123456!",
        "firstName": "Amy",
        "lastName": "Lee",
        "tenantName": "Acme"
    })
}

fn credentials() -> Value {
    json!({ "email": "amy@acme.test", "password": "Pw123456!" })
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = app().await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn full_auth_flow_over_http() {
    let (app, email) = app().await;

    let (status, body) = send(&app, post_json("/api/auth/register", registration())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requiresEmailConfirmation"], true);
    assert_eq!(body["confirmationEmailSent"], true);
    let tenant_id = body["tenantId"].as_str().unwrap().to_string();

    let (status, body) = send(&app, post_json("/api/auth/login", credentials())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "EmailNotConfirmed");
    assert_eq!(body["emailConfirmationRequired"], true);

    let path = email.last_confirmation_path().await;
    let (status, body) = send(&app, get(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "Confirmed");

    let (status, body) = send(&app, get(&path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["outcome"], "AlreadyConfirmed");

    let (status, login) = send(&app, post_json("/api/auth/login", credentials())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(login["token_type"], "Bearer");
    assert_eq!(login["user"]["tenantId"], tenant_id.as_str());
    assert!(login["expires_in"].as_i64().unwrap() > 0);

    let access = login["access_token"].as_str().unwrap();
    let me = Request::get("/api/auth/me")
        .header(header::AUTHORIZATION, format!("Bearer {access}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, me).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "amy@acme.test");
    assert_eq!(body["firstName"], "Amy");

    let old_refresh = login["refresh_token"].clone();
    let (status, rotated) = send(
        &app,
        post_json("/api/auth/refresh", json!({ "refresh_token": old_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        post_json("/api/auth/refresh", json!({ "refresh_token": old_refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "InvalidOrExpiredRefreshToken");

    let (status, _) = send(
        &app,
        post_json(
            "/api/auth/logout",
            json!({ "refresh_token": rotated["refresh_token"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(
        &app,
        post_json(
            "/api/auth/refresh",
            json!({ "refresh_token": rotated["refresh_token"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_registration_is_a_conflict() {
    let (app, _) = app().await;
    send(&app, post_json("/api/auth/register", registration())).await;

    let (status, body) = send(&app, post_json("/api/auth/register", registration())).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "DuplicateEmail");
}

#[tokio::test]
async fn weak_password_is_a_bad_request() {
    let (app, _) = app().await;
    let mut input = registration();
    input["password"] = json!("short");

    let (status, body) = send(&app, post_json("/api/auth/register", input)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "UserCreationFailed");
}

#[tokio::test]
async fn unknown_email_and_wrong_password_share_a_response() {
    let (app, _) = app().await;
    send(&app, post_json("/api/auth/register", registration())).await;

    let (s1, b1) = send(
        &app,
        post_json(
            "/api/auth/login",
            json!({ "email": "amy@acme.test", "password": "Wrong123!" }),
        ),
    )
    .await;
    let (s2, b2) = send(
        &app,
        post_json(
            "/api/auth/login",
            json!({ "email": "ghost@acme.test", "password": "Wrong123!" }),
        ),
    )
    .await;
    assert_eq!(s1, StatusCode::UNAUTHORIZED);
    assert_eq!(s1, s2);
    assert_eq!(b1, b2);
}

#[tokio::test]
async fn confirm_with_bad_token_or_unknown_user() {
    let (app, _) = app().await;
    let (_, body) = send(&app, post_json("/api/auth/register", registration())).await;
    let account_id = body["accountId"].as_str().unwrap();

    let (status, _) = send(
        &app,
        get(&format!(
            "/api/auth/confirm-email?userId={account_id}&token=forged"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        get("/api/auth/confirm-email?userId=00000000-0000-4000-8000-000000000000&token=x"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "UserNotFound");
}

#[tokio::test]
async fn resend_always_acknowledges() {
    let (app, _) = app().await;
    let (status, for_unknown) = send(
        &app,
        post_json(
            "/api/auth/resend-confirmation",
            json!({ "email": "ghost@acme.test" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    send(&app, post_json("/api/auth/register", registration())).await;
    let (status, for_known) = send(
        &app,
        post_json(
            "/api/auth/resend-confirmation",
            json!({ "email": "amy@acme.test" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(for_unknown, for_known);
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let (app, _) = app().await;
    let (status, body) = send(&app, get("/api/auth/me")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TokenInvalid");

    let request = Request::get("/api/auth/me")
        .header(header::AUTHORIZATION, "Bearer not.a.jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn cors_admits_only_configured_origins() {
    let (app, _) = app().await;

    let allowed = Request::get("/health")
        .header(header::ORIGIN, FRONT_END)
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(allowed).await.unwrap();
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(FRONT_END)
    );

    let foreign = Request::get("/health")
        .header(header::ORIGIN, "https://evil.test")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(foreign).await.unwrap();
    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn client_routes_require_a_bearer_token() {
    let (app, _) = app().await;

    let (status, body) = send(&app, get("/api/clients")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "TokenInvalid");

    let (status, _) = send(&app, post_json("/api/clients", new_client("Jo"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = authed("GET", "/api/clients", "not.a.jwt", None);
    let (status, _) = send(&app, forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn client_crud_over_http() {
    let (app, email) = app().await;
    let token = signed_in(&app, &email, "amy@acme.test").await;

    let (status, created) = send(
        &app,
        authed("POST", "/api/clients", &token, Some(new_client("Jo"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["firstName"], "Jo");
    assert_eq!(created["dateOfBirth"], "1985-06-30");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(
        &app,
        authed("GET", &format!("/api/clients/{id}"), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, created);

    let mut changed = new_client("Joanne");
    changed["id"] = json!(id);
    let (status, updated) = send(
        &app,
        authed("PUT", &format!("/api/clients/{id}"), &token, Some(changed)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["firstName"], "Joanne");
    assert_eq!(updated["id"], id.as_str());

    let (status, page) = send(&app, authed("GET", "/api/clients", &token, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["items"][0]["firstName"], "Joanne");

    let (status, _) = send(
        &app,
        authed("DELETE", &format!("/api/clients/{id}"), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = send(
        &app,
        authed("GET", &format!("/api/clients/{id}"), &token, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "ClientNotFound");
}

#[tokio::test]
async fn clients_are_invisible_across_tenants() {
    let (app, email) = app().await;
    let owner = signed_in(&app, &email, "amy@acme.test").await;
    let other = signed_in(&app, &email, "bob@rival.test").await;

    let (_, created) = send(
        &app,
        authed("POST", "/api/clients", &owner, Some(new_client("Jo"))),
    )
    .await;
    let uri = format!("/api/clients/{}", created["id"].as_str().unwrap());

    let (status, _) = send(&app, authed("GET", &uri, &other, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        authed("PUT", &uri, &other, Some(new_client("Hijacked"))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, authed("DELETE", &uri, &other, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, page) = send(&app, authed("GET", "/api/clients", &other, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 0);

    let (status, still_there) = send(&app, authed("GET", &uri, &owner, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(still_there["firstName"], "Jo");
}

#[tokio::test]
async fn invalid_client_input_is_a_bad_request() {
    let (app, email) = app().await;
    let token = signed_in(&app, &email, "amy@acme.test").await;

    let mut missing_name = new_client("Jo");
    missing_name["firstName"] = json!("  ");
    let (status, body) = send(
        &app,
        authed("POST", "/api/clients", &token, Some(missing_name)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationFailed");

    let (_, created) = send(
        &app,
        authed("POST", "/api/clients", &token, Some(new_client("Jo"))),
    )
    .await;
    let mut mismatched = new_client("Jo");
    mismatched["id"] = json!("00000000-0000-4000-8000-000000000000");
    let (status, body) = send(
        &app,
        authed(
            "PUT",
            &format!("/api/clients/{}", created["id"].as_str().unwrap()),
            &token,
            Some(mismatched),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "client id mismatch");
}
