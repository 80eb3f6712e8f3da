//! Integration tests for the token-endpoint surface of the flow manager:
//! code exchange and token refresh against a scripted local endpoint.

use core_auth::{AttemptSecret, AuthError, ClientConfig, OAuthFlowManager};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A local token endpoint that plays back one scripted response per
/// connection, in order, repeating the last one when the script runs out.
async fn spawn_scripted_endpoint(script: Vec<(u16, String)>) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let url = format!(
        "http://127.0.0.1:{}/token",
        listener.local_addr().unwrap().port()
    );
    let hits = Arc::new(AtomicUsize::new(0));
    let hits_inner = Arc::clone(&hits);

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let hit = hits_inner.fetch_add(1, Ordering::SeqCst);
            let (status, body) = script
                .get(hit)
                .or_else(|| script.last())
                .cloned()
                .unwrap_or((500, String::new()));

            let mut buffer = vec![0u8; 8192];
            let _ = socket.read(&mut buffer).await;

            let reason = match status {
                200 => "OK",
                400 => "Bad Request",
                _ => "Internal Server Error",
            };
            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (url, hits)
}

fn manager_for(token_url: &str) -> OAuthFlowManager {
    let client = ClientConfig {
        client_id: "integration-client".to_string(),
        client_secret: Some("integration-secret".to_string()),
        auth_uri: "https://provider.example/auth".to_string(),
        token_uri: token_url.to_string(),
    };
    OAuthFlowManager::new(client.into_oauth_config(
        "http://localhost:8080/oauth/callback",
        vec!["https://www.googleapis.com/auth/documents".to_string()],
    ))
}

fn token_body(access: &str, refresh: Option<&str>) -> String {
    match refresh {
        Some(refresh) => format!(
            r#"{{"access_token": "{}", "refresh_token": "{}", "expires_in": 3600, "token_type": "Bearer"}}"#,
            access, refresh
        ),
        None => format!(
            r#"{{"access_token": "{}", "expires_in": 3600, "token_type": "Bearer"}}"#,
            access
        ),
    }
}

#[tokio::test]
async fn exchange_returns_token_on_success() {
    let (url, hits) =
        spawn_scripted_endpoint(vec![(200, token_body("exchanged", Some("granted")))]).await;
    let manager = manager_for(&url);
    let secret = AttemptSecret::generate();

    let token = manager
        .exchange_code("4/code", secret.state(), &secret)
        .await
        .unwrap();

    assert_eq!(token.access_token, "exchanged");
    assert_eq!(token.refresh_token.as_deref(), Some("granted"));
    assert!(!token.is_expired());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn exchange_surfaces_endpoint_rejection_without_retry() {
    let (url, hits) = spawn_scripted_endpoint(vec![(
        400,
        r#"{"error": "invalid_grant"}"#.to_string(),
    )])
    .await;
    let manager = manager_for(&url);
    let secret = AttemptSecret::generate();

    let err = manager
        .exchange_code("4/stale", secret.state(), &secret)
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Exchange(_)));
    assert!(err.to_string().contains("invalid_grant"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_fails_immediately_on_client_error() {
    let (url, hits) = spawn_scripted_endpoint(vec![(
        400,
        r#"{"error": "invalid_grant", "error_description": "Token revoked"}"#.to_string(),
    )])
    .await;
    let manager = manager_for(&url);

    let err = manager.refresh_token("revoked-refresh").await.unwrap_err();

    assert!(matches!(err, AuthError::Refresh(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn refresh_retries_server_errors_until_success() {
    let (url, hits) = spawn_scripted_endpoint(vec![
        (500, r#"{"error": "backend_error"}"#.to_string()),
        (500, r#"{"error": "backend_error"}"#.to_string()),
        (200, token_body("refreshed", None)),
    ])
    .await;
    let manager = manager_for(&url);

    let token = manager.refresh_token("still-good").await.unwrap();

    assert_eq!(token.access_token, "refreshed");
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn refresh_keeps_previous_refresh_token_when_not_rotated() {
    let (url, _hits) = spawn_scripted_endpoint(vec![(200, token_body("refreshed", None))]).await;
    let manager = manager_for(&url);

    let token = manager.refresh_token("carried-forward").await.unwrap();

    assert_eq!(token.refresh_token.as_deref(), Some("carried-forward"));
}

#[tokio::test]
async fn refresh_gives_up_after_persistent_server_errors() {
    let (url, hits) =
        spawn_scripted_endpoint(vec![(503, r#"{"error": "unavailable"}"#.to_string())]).await;
    let manager = manager_for(&url);

    let err = manager.refresh_token("any").await.unwrap_err();

    assert!(matches!(err, AuthError::Refresh(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}
