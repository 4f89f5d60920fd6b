//! End-to-end tests over the router, no network involved.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use keybound_dpop::{ProofKeyPair, issue_proof};
use keybound_server::{AppState, ServerConfig, router};

const ORIGIN: &str = "http://localhost:8080";

fn app() -> Router {
    let config = ServerConfig {
        notify_interval_ms: 20,
        ..ServerConfig::default()
    };
    router(AppState::new(config))
}

fn sign_in_request(username: &str, password: &str) -> Request<Body> {
    json_post(
        "/api/sign-in",
        &json!({ "username": username, "password": password }),
    )
}

fn json_post(path: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn me_without_credentials_is_unauthorized() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_credentials_are_rejected() {
    let response = app()
        .oneshot(sign_in_request("admin@com", "wrong"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn dpop_scheme_without_proof_header_is_bad_request() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(AUTHORIZATION, "DPoP some-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn garbage_proof_is_bad_request() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(AUTHORIZATION, "DPoP some-token")
                .header("DPoP", "not-a-jwt")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

/// Full token flow: sign in with a proof, call `/api/me` with a second
/// proof bound to the issued token.
#[tokio::test]
async fn proof_bound_token_flow() {
    let app = app();
    let key_pair = ProofKeyPair::generate().unwrap();

    let sign_in_proof =
        issue_proof(&key_pair, "POST", &format!("{ORIGIN}/api/sign-in"), None).unwrap();
    let mut request = sign_in_request("admin@com", "123");
    request
        .headers_mut()
        .insert("DPoP", sign_in_proof.parse().unwrap());

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "DPoP");
    let token = body["token"].as_str().unwrap().to_string();

    let me_proof = issue_proof(
        &key_pair,
        "GET",
        &format!("{ORIGIN}/api/me"),
        Some(&token),
    )
    .unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(AUTHORIZATION, format!("DPoP {token}"))
                .header("DPoP", me_proof.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "kevin.dockx@gmail.com");

    // Replaying the identical proof must fail.
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(AUTHORIZATION, format!("DPoP {token}"))
                .header("DPoP", me_proof)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// A valid proof from a different key than the token is bound to must
/// not authenticate.
#[tokio::test]
async fn token_bound_to_another_key_is_rejected() {
    let app = app();
    let holder = ProofKeyPair::generate().unwrap();
    let impostor = ProofKeyPair::generate().unwrap();

    let sign_in_proof =
        issue_proof(&holder, "POST", &format!("{ORIGIN}/api/sign-in"), None).unwrap();
    let mut request = sign_in_request("admin@com", "123");
    request
        .headers_mut()
        .insert("DPoP", sign_in_proof.parse().unwrap());
    let response = app.clone().oneshot(request).await.unwrap();
    let token = body_json(response).await["token"]
        .as_str()
        .unwrap()
        .to_string();

    let stolen_proof = issue_proof(
        &impostor,
        "GET",
        &format!("{ORIGIN}/api/me"),
        Some(&token),
    )
    .unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(AUTHORIZATION, format!("DPoP {token}"))
                .header("DPoP", stolen_proof)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn bearer_token_endpoint_issues_a_token() {
    let response = app()
        .oneshot(json_post(
            "/api/sign-in-token",
            &json!({ "username": "admin@com", "password": "123" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert!(!body["token"].as_str().unwrap().is_empty());
}

/// Cookie flow: sign in, call `/api/me` with the cookie, sign out, and
/// observe the cookie no longer authenticates.
#[tokio::test]
async fn cookie_session_flow() {
    let app = app();

    let response = app
        .clone()
        .oneshot(sign_in_request("admin@com", "123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let set_cookie = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    assert!(set_cookie.contains("HttpOnly"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["user"]["email"], "kevin.dockx@gmail.com");
    assert_eq!(body["user"]["firstName"], "Kevin");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/sign-out")
                .header(COOKIE, cookie.clone())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// Removing a session out-of-band invalidates the cookie that pointed
/// at it.
#[tokio::test]
async fn remove_session_invalidates_the_cookie() {
    let app = app();

    let response = app
        .clone()
        .oneshot(sign_in_request("admin@com", "123"))
        .await
        .unwrap();
    let cookie = response
        .headers()
        .get(SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = app
        .clone()
        .oneshot(json_post(
            "/api/remove-session",
            &json!({ "key": "kevin.dockx@gmail.com" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/me")
                .header(COOKIE, cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn anonymous_expiry_stream_reports_expired() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/api/notifications/sse")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "text/event-stream");

    let mut body = response.into_body();
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("no event within a second")
        .unwrap()
        .unwrap();
    let chunk = frame.into_data().unwrap();
    let text = String::from_utf8(chunk.to_vec()).unwrap();
    assert!(text.contains("event: cookieExpired"));
    assert!(text.contains("\"cookieExpired\":true"));
}
