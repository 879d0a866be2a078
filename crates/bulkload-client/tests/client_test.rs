//! Integration tests for the users API client against a wiremock server.
//!
//! Tests cover:
//! - Authorization header and request shapes for all four operations
//! - Pass-through of non-2xx statuses and the rate-limit reset header
//! - Connection failures surfacing as transport errors

use bulkload_client::{
    ApiAuth, ApiCredentials, ClientError, NewUser, PasswordHash, TransportRetry, UsersClient,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HASH: &str = "$2a$10$rwh3vH166HCH/NT9XV5FYuqaMqvAPULkbiQzkTCWo5XDcvzpk8Tna";

/// Helper: create a `UsersClient` pointing at a wiremock server with SSWS auth.
fn ssws_client(server: &MockServer) -> UsersClient {
    UsersClient::with_http_client(
        &format!("{}/api/v1", server.uri()),
        ApiAuth::new(ApiCredentials::Ssws {
            token: "test-token-123".to_string(),
        }),
        reqwest::Client::new(),
        TransportRetry::new(0),
    )
    .unwrap()
}

#[tokio::test]
async fn test_get_user_sends_ssws_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/isaac@example.com"))
        .and(header("Authorization", "SSWS test-token-123"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "00u1"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = ssws_client(&server)
        .get_user("isaac@example.com")
        .await
        .unwrap();

    assert!(response.is_ok());
    assert!(response.body.contains("00u1"));
}

#[tokio::test]
async fn test_bearer_credentials_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/a@example.com"))
        .and(header("Authorization", "Bearer access-xyz"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = UsersClient::with_http_client(
        &format!("{}/api/v1", server.uri()),
        ApiAuth::new(ApiCredentials::Bearer {
            token: "access-xyz".to_string(),
        }),
        reqwest::Client::new(),
        TransportRetry::new(0),
    )
    .unwrap();

    let response = client.get_user("a@example.com").await.unwrap();
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_rate_limited_response_carries_reset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v1/users/a@example.com"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("X-Rate-Limit-Reset", "1700000042")
                .set_body_json(json!({
                    "errorCode": "E0000047",
                    "errorCauses": [{"errorSummary": "API call exceeded rate limit"}]
                })),
        )
        .mount(&server)
        .await;

    let response = ssws_client(&server).get_user("a@example.com").await.unwrap();

    assert!(response.is_rate_limited());
    assert_eq!(response.rate_limit_reset, Some(1_700_000_042));
    assert_eq!(response.error_details("").code, "E0000047");
}

#[tokio::test]
async fn test_deactivate_and_delete_paths() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users/a@example.com/deactivate"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/users/a@example.com"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = ssws_client(&server);
    assert!(client.deactivate_user("a@example.com").await.unwrap().is_ok());
    assert_eq!(client.delete_user("a@example.com").await.unwrap().status, 204);
}

#[tokio::test]
async fn test_create_user_posts_payload_with_activate() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users"))
        .and(query_param("activate", "true"))
        .and(header("Content-Type", "application/json"))
        .and(body_partial_json(json!({
            "profile": {"login": "isaac@example.com", "firstName": "Isaac"},
            "credentials": {"password": {"hash": {
                "algorithm": "BCRYPT",
                "workFactor": 10,
                "salt": "rwh3vH166HCH/NT9XV5FYu"
            }}}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "00u2"})))
        .expect(1)
        .mount(&server)
        .await;

    let user = NewUser::new("isaac@example.com", PasswordHash::from_bcrypt(HASH).unwrap())
        .with_profile_field("firstName", "Isaac");

    let response = ssws_client(&server).create_user(&user, true).await.unwrap();
    assert!(response.is_ok());
}

#[tokio::test]
async fn test_create_user_rejection_is_not_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "errorCode": "E0000001",
            "errorCauses": [{"errorSummary": "bad login"}]
        })))
        .mount(&server)
        .await;

    let user = NewUser::new("x", PasswordHash::from_bcrypt(HASH).unwrap());
    let response = ssws_client(&server).create_user(&user, true).await.unwrap();

    assert_eq!(response.status, 400);
    let details = response.error_details("");
    assert_eq!(details.code, "E0000001");
    assert_eq!(details.cause, "bad login");
}

#[tokio::test]
async fn test_connection_refused_is_transport_error() {
    let client = UsersClient::with_http_client(
        "http://127.0.0.1:1/api/v1",
        ApiAuth::new(ApiCredentials::Ssws {
            token: "t".to_string(),
        }),
        reqwest::Client::new(),
        TransportRetry::new(0),
    )
    .unwrap();

    let err = client.get_user("a@example.com").await.unwrap_err();
    assert!(err.is_connect());
    assert!(matches!(err, ClientError::Transport(_)));
}
