//! Router-level tests against the in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use careteam_auth::{
    config::{AuthConfig, Config},
    db::{memory::MemoryStore, AuthCodeStore, UserStore},
    models::user::{Role, UserRecord},
    services::{
        auth::AuthService,
        auth_code::{AuthCodes, LogCodeSender},
        invitations::InvitationService,
        password,
    },
    AppState,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

const PHONE: &str = "48123456789";
const INVITEE: &str = "48500500500";
const PASSWORD: &str = "Secret123";
const FRONTEND: &str = "http://care.test";

fn auth_config() -> AuthConfig {
    AuthConfig {
        bcrypt_cost: 4,
        lock_duration: Duration::from_secs(1),
        ..AuthConfig::with_secret("integration-secret")
    }
}

async fn add_user(store: &MemoryStore, phone: &str, roles: Vec<Role>) {
    store
        .insert_user(UserRecord {
            id: Uuid::new_v4(),
            phone_number: phone.into(),
            email: None,
            password_hash: password::hash(PASSWORD, 4).await.unwrap(),
            roles,
            confirmed: true,
            login_attempts: 0,
            lock_until: None,
            last_login: None,
        })
        .await;
}

async fn app_with_user(roles: Vec<Role>) -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    add_user(&store, PHONE, roles).await;

    let config = Arc::new(Config {
        database_url: None,
        auth: auth_config(),
        frontend_url: FRONTEND.into(),
        host: "127.0.0.1".into(),
        port: 0,
    });
    let codes = AuthCodes::new(&config.auth, store.clone(), Arc::new(LogCodeSender));
    let auth = Arc::new(AuthService::new(
        &config.auth,
        store.clone(),
        store.clone(),
        codes,
    ));
    let invitations = Arc::new(InvitationService::new(
        store.clone(),
        auth.clone(),
        config.auth.invite_token_lifetime,
    ));
    let state = AppState {
        auth,
        invitations,
        config,
    };
    (careteam_auth::router(state), store)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.expect("request");
    let status = resp.status();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).expect("parse JSON")
    };
    (status, json)
}

fn log_in_request(password: &str) -> Request<Body> {
    log_in_as_request(PHONE, password)
}

fn log_in_as_request(phone: &str, password: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/log-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "phoneNumber": phone, "password": password }).to_string(),
        ))
        .unwrap()
}

async fn log_in_as(app: &Router, phone: &str) -> String {
    let (status, body) = send(app, log_in_as_request(phone, PASSWORD)).await;
    assert_eq!(status, StatusCode::OK, "login failed: {body}");
    body["token"].as_str().expect("token").to_string()
}

async fn log_in(app: &Router) -> String {
    log_in_as(app, PHONE).await
}

async fn pending_code(store: &MemoryStore, phone: &str) -> String {
    let user = store
        .find_by_phone_number(phone)
        .await
        .unwrap()
        .expect("user");
    store
        .find_code(user.id)
        .await
        .unwrap()
        .expect("code issued")
        .code
}

fn invite_request(token: &str, phone: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/invitations")
        .header("x-auth-token", token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "phoneNumber": phone,
                "firstName": "Anna",
                "lastName": "Nowak",
                "resourceType": "RelatedPerson"
            })
            .to_string(),
        ))
        .unwrap()
}

fn accept_request(token: &str, invite_token: &str, invite_id: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(format!(
            "/invitations/accept?token={invite_token}&id={invite_id}"
        ))
        .header("x-auth-token", token)
        .body(Body::empty())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_store() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;
    let (status, body) = send(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn lockout_after_five_failures_then_recovers() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;

    for i in 1..=5 {
        let (status, body) = send(&app, log_in_request(&format!("wrong{i}"))).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "attempt {i}");
        assert_eq!(body["code"], "INVALID_CREDENTIALS");
    }

    // Correct password while locked.
    let (status, body) = send(&app, log_in_request(PASSWORD)).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
    assert_eq!(body["code"], "MAX_LOGIN_ATTEMPTS");

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let token = log_in(&app).await;
    assert_eq!(token.split('.').count(), 3);
}

#[tokio::test]
async fn unknown_phone_number_is_not_found() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;
    let req = Request::builder()
        .method("POST")
        .uri("/auth/log-in")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "phoneNumber": "48000000000", "password": PASSWORD }).to_string(),
        ))
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "USER_NOT_FOUND");
}

#[tokio::test]
async fn refresh_token_is_bound_to_client() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;
    let token = log_in(&app).await;

    let (status, bundle) = send(
        &app,
        get(&format!(
            "/auth2?grant_type=refresh_token&token={token}&client_id=web"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let refresh = bundle["refreshToken"].as_str().unwrap().to_string();
    assert!(bundle["authToken"].is_string());
    assert!(bundle["expires"].as_i64().unwrap() > chrono::Utc::now().timestamp_millis());

    let (status, body) = send(
        &app,
        get(&format!(
            "/auth2?grant_type=auth_token&token={refresh}&client_id=mobile"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_AUTH_TOKEN");

    let (status, body) = send(
        &app,
        get(&format!(
            "/auth2?grant_type=auth_token&token={refresh}&client_id=web"
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["authToken"].is_string());
    assert!(body["expiresIn"].is_i64());
}

#[tokio::test]
async fn auth2_rejects_unknown_grant_type() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;
    let (status, _) = send(&app, get("/auth2?grant_type=password&token=x&client_id=web")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn restore_then_change_password_consumes_token() {
    let (app, store) = app_with_user(vec![Role::Patient]).await;

    let (status, token_data) = send(&app, get(&format!("/auth/{PHONE}/restore-password"))).await;
    assert_eq!(status, StatusCode::OK);
    let token = token_data["token"].as_str().unwrap().to_string();
    let id = token_data["id"].as_str().unwrap().to_string();
    assert_eq!(store.token_count().await, 1);
    let code = pending_code(&store, PHONE).await;

    let change = |password: &str, code: &str| {
        Request::builder()
            .method("POST")
            .uri(format!(
                "/auth/{PHONE}/change-password?token={token}&id={id}"
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({ "password": password, "code": code }).to_string(),
            ))
            .unwrap()
    };

    let (status, body) = send(&app, change("NewSecret456", &code)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["token"].is_string());
    assert_eq!(store.token_count().await, 0);

    // Token was single-use.
    let (status, body) = send(&app, change("Another789", &code)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    let (status, _) = send(&app, log_in_request("NewSecret456")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn change_password_without_the_sent_code_is_refused() {
    let (app, store) = app_with_user(vec![Role::Patient]).await;

    let (_, token_data) = send(&app, get(&format!("/auth/{PHONE}/restore-password"))).await;
    let token = token_data["token"].as_str().unwrap().to_string();
    let id = token_data["id"].as_str().unwrap().to_string();
    let code = pending_code(&store, PHONE).await;
    let wrong = if code == "123456" { "654321" } else { "123456" };

    let change = |body: Value| {
        Request::builder()
            .method("POST")
            .uri(format!(
                "/auth/{PHONE}/change-password?token={token}&id={id}"
            ))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };

    let (status, body) = send(&app, change(json!({ "password": "Hijacked123" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INCORRECT_FORM_DATA");

    let (status, body) = send(
        &app,
        change(json!({ "password": "Hijacked123", "code": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "INVALID_AUTH_CODE");

    // The token survives a wrong code and the old password still works.
    assert_eq!(store.token_count().await, 1);
    let (status, _) = send(&app, log_in_request(PASSWORD)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        change(json!({ "password": "NewSecret456", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
}

#[tokio::test]
async fn invitations_require_auth_header() {
    let (app, _) = app_with_user(vec![Role::Patient]).await;
    let (status, body) = send(&app, get("/invitations")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INSUFFICIENT_PRIVILEGES");

    let req = Request::builder()
        .uri("/invitations")
        .header("x-auth-token", "not.a.token")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_AUTH_TOKEN");
}

#[tokio::test]
async fn invitation_link_redirects_and_is_accepted_once() {
    let (app, store) = app_with_user(vec![Role::Patient]).await;
    let token = log_in(&app).await;

    let (status, outcome) = send(&app, invite_request(&token, INVITEE)).await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert_eq!(outcome["invitation"]["phoneNumber"], INVITEE);
    let invite_token = outcome["token"].as_str().unwrap().to_string();
    let invite_id = outcome["id"].as_str().unwrap().to_string();

    let listing = Request::builder()
        .uri("/invitations")
        .header("x-auth-token", &token)
        .body(Body::empty())
        .unwrap();
    let (status, list) = send(&app, listing).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["firstName"], "Anna");

    // The invitee has no account yet.
    let resp = app
        .clone()
        .oneshot(get(&format!("/actions?token={invite_token}&id={invite_id}")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(
        location,
        format!("{FRONTEND}/register?token={invite_token}&id={invite_id}")
    );

    // The sender cannot redeem their own invitation.
    let (status, body) = send(&app, accept_request(&token, &invite_token, &invite_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");

    // Neither can some other member.
    add_user(&store, "48700700700", vec![Role::Nurse]).await;
    let stranger = log_in_as(&app, "48700700700").await;
    let (status, _) = send(&app, accept_request(&stranger, &invite_token, &invite_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(store.token_count().await, 1);

    add_user(&store, INVITEE, vec![Role::RelatedPerson]).await;
    let invitee = log_in_as(&app, INVITEE).await;
    let (status, body) = send(&app, accept_request(&invitee, &invite_token, &invite_id)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["invitation"]["phoneNumber"], INVITEE);

    let (status, body) = send(&app, accept_request(&invitee, &invite_token, &invite_id)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn self_invitation_is_not_allowed() {
    let (app, store) = app_with_user(vec![Role::Patient]).await;
    let token = log_in(&app).await;

    let (status, body) = send(&app, invite_request(&token, PHONE)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
    assert_eq!(store.token_count().await, 0);
}

#[tokio::test]
async fn existing_member_is_invited_without_token() {
    let (app, store) = app_with_user(vec![Role::Patient]).await;
    add_user(&store, INVITEE, vec![Role::RelatedPerson]).await;
    let token = log_in(&app).await;

    let (status, outcome) = send(&app, invite_request(&token, INVITEE)).await;
    assert_eq!(status, StatusCode::OK, "{outcome}");
    assert!(outcome.get("token").is_none());
    assert!(outcome.get("id").is_none());
    assert_eq!(store.token_count().await, 0);

    let invitee = log_in_as(&app, INVITEE).await;
    let listing = Request::builder()
        .uri("/invitations")
        .header("x-auth-token", &invitee)
        .body(Body::empty())
        .unwrap();
    let (status, list) = send(&app, listing).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["phoneNumber"], INVITEE);
}

#[tokio::test]
async fn admin_cannot_invite() {
    let (app, _) = app_with_user(vec![Role::Admin]).await;
    let token = log_in(&app).await;
    let req = Request::builder()
        .method("POST")
        .uri("/invitations")
        .header("x-auth-token", &token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({
                "phoneNumber": "48500500500",
                "firstName": "Anna",
                "lastName": "Nowak",
                "resourceType": "Practitioner"
            })
            .to_string(),
        ))
        .unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
