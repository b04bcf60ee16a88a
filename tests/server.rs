mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;
use tower::ServiceExt;
use voyant_hub::auth;
use voyant_hub::config::Settings;
use voyant_hub::constants::GROUP_REVIEWER;
use voyant_hub::server::{create_router, AppState};
use voyant_hub::types::TranslationStatus;

const PASSWORD: &str = "correct-horse-battery";

fn app() -> Router {
    let db = common::db();
    let fr = common::locale(&db, "fr", "French");
    let de = common::locale(&db, "de", "German");
    let unit = common::unit(&db, "ui", "hello", "Hello");
    common::approved(&db, &unit, &fr, "Bonjour");
    common::approved(&db, &unit, &de, "Hallo");

    auth::create_user(&db, "admin", "admin@example.com", Some(PASSWORD), true).unwrap();
    let rev = auth::create_user(&db, "rev", "", Some(PASSWORD), false).unwrap();
    db.add_user_to_group(rev.id, GROUP_REVIEWER).unwrap();
    db.assign_locale(rev.id, fr.id).unwrap();

    let settings = Settings::from_lookup(|_| None).unwrap();
    create_router(AppState::new(db, settings, None))
}

fn basic(username: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{username}:{PASSWORD}")))
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(header::HOST, "localhost");
    if let Some(user) = user {
        builder = builder.header(header::AUTHORIZATION, basic(user));
    }
    builder.body(Body::empty()).unwrap()
}

fn post_json(uri: &str, user: &str, body: &str) -> Request<Body> {
    json_request("POST", uri, user, body)
}

fn patch_json(uri: &str, user: &str, body: &str) -> Request<Body> {
    json_request("PATCH", uri, user, body)
}

fn json_request(method: &str, uri: &str, user: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, basic(user))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    hyper::body::to_bytes(response.into_body()).await.unwrap().to_vec()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn health_check_answers_for_allowed_hosts() {
    let response = app().oneshot(get("/health", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "voyant_hub");
}

#[tokio::test]
async fn unknown_host_is_rejected() {
    let request = Request::builder()
        .uri("/health")
        .header(header::HOST, "evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Invalid HTTP_HOST header");
}

#[tokio::test]
async fn api_requires_credentials() {
    let response = app().oneshot(get("/api/translations", None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));

    let request = Request::builder()
        .uri("/api/translations")
        .header(header::HOST, "localhost")
        .header(header::AUTHORIZATION, format!("Basic {}", STANDARD.encode("rev:wrong")))
        .body(Body::empty())
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reviewer_listing_is_scoped_to_assigned_locales() {
    let response = app().oneshot(get("/api/translations", Some("rev"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rows = body_json(response).await;
    let rows = rows.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["locale_code"], "fr");
    assert_eq!(rows[0]["approved_text"], "Bonjour");

    let response = app().oneshot(get("/api/translations", Some("admin"))).await.unwrap();
    assert_eq!(body_json(response).await.as_array().unwrap().len(), 2);

    let response = app()
        .oneshot(get("/api/translations?has_qa_warnings=maybe", Some("admin")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn approve_action_is_forbidden_for_reviewers() {
    let response = app()
        .oneshot(post_json("/api/translations/actions/approve", "rev", r#"{"ids": [1]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app()
        .oneshot(post_json("/api/translations/actions/flag", "rev", r#"{"ids": [1, 2]}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["selected"], 1);
    assert_eq!(body["changed"], 1);
}

#[tokio::test]
async fn reviewer_patch_cannot_approve() {
    let request = patch_json(
        "/api/translations/1",
        "rev",
        r#"{"status": "APPROVED", "reviewer_text": "Salut"}"#,
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["translation"]["status"], TranslationStatus::InReview.as_str());
    assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn locale_export_streams_csv() {
    let response = app()
        .oneshot(get("/api/locales/fr/export.csv", Some("rev")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"voyant_fr.csv\""
    );
    let text = String::from_utf8(body_bytes(response).await).unwrap();
    let mut lines = text.lines();
    assert!(lines.next().unwrap().starts_with("location,message_id,source_en"));
    assert!(lines.next().unwrap().starts_with("ui,hello,Hello,fr,Bonjour,APPROVED,"));

    let response = app()
        .oneshot(get("/api/locales/de/export.csv", Some("rev")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app()
        .oneshot(get("/api/locales/xx/export.csv", Some("admin")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn patch_with_unknown_references_is_a_client_error() {
    let bodies = [
        r#"{"locale_id": 999}"#,
        r#"{"reviewer_id": 999}"#,
        r#"{"string_unit_id": 999}"#,
    ];
    for body in bodies {
        let response = app()
            .oneshot(patch_json("/api/translations/1", "admin", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
        let error = body_json(response).await["error"].as_str().unwrap().to_string();
        assert!(error.contains("999 does not exist"), "{error}");
    }

    // Moving the French row onto German collides with the existing German row.
    let response = app()
        .oneshot(patch_json("/api/translations/1", "admin", r#"{"locale_id": 2}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}

#[tokio::test]
async fn malformed_requests_get_json_errors() {
    let response = app()
        .oneshot(patch_json("/api/translations/1", "admin", r#"{"status": 5"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let response = app()
        .oneshot(patch_json("/api/translations/1", "admin", r#"{"status": "DONE"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"].is_string());

    let response = app()
        .oneshot(get("/api/translations/abc", Some("admin")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());

    let response = app()
        .oneshot(post_json("/api/translations/actions/flag", "admin", "ids=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["error"].is_string());
}
