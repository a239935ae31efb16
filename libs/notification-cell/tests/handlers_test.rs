use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use notification_cell::router::notification_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockTableRows, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    notification_routes(Arc::new(config))
}

fn mock_config(mock_server: &MockServer) -> AppConfig {
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    config
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_list_my_notifications() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("user_id", format!("eq.{}", user.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockTableRows::notification(
                &Uuid::new_v4().to_string(),
                &user.id,
                "booking",
                "sent",
                None,
            )
        ])))
        .mount(&mock_server)
        .await;

    let config = mock_config(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], json!(1));
}

#[tokio::test]
async fn test_failed_listing_requires_admin() {
    let mock_server = MockServer::start().await;
    let user = TestUser::patient("patient@example.com");

    let config = mock_config(&mock_server);
    let token = JwtTestUtils::create_test_token(&user, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/failed")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_failed_listing_for_admin() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/notifications"))
        .and(query_param("status", "eq.failed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = mock_config(&mock_server);
    let token = JwtTestUtils::create_test_token(&admin, &config.supabase_jwt_secret, Some(24));
    let app = create_test_app(config);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/failed")
                .header("Authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_rejected() {
    let mock_server = MockServer::start().await;
    let app = create_test_app(mock_config(&mock_server));

    let response = app
        .oneshot(Request::builder().method("GET").uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
