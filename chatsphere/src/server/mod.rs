//! ChatSphere server - hosts the `/api/ask` proxy.
//!
//! Architecture:
//! - One local server runs per user (PID/port files under ~/.chatsphere)
//! - The server holds no conversation state; every request is self-contained
//! - Chat clients either point at an explicit URL or auto-start this server
//!
//! Endpoints:
//! - POST /api/ask - Forward a message to the upstream model (other methods get 405)
//! - GET /health - Liveness check

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::Method,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ProxyConfig;
use crate::proxy::{AskError, Proxy};

/// Server state file locations.
const SERVER_DIR: &str = ".chatsphere";
const PID_FILE: &str = "server.pid";
const PORT_FILE: &str = "server.port";

/// Port used when the client has to start a server itself.
pub const DEFAULT_PORT: u16 = 58231;

/// Shared server state.
pub struct ServerState {
    proxy: Proxy,
}

/// Build the application router.
pub fn router(proxy: Proxy) -> Router {
    let state = Arc::new(ServerState { proxy });

    Router::new()
        .route("/api/ask", any(ask_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// === Server Lifecycle ===

/// Start the server and block until it exits.
pub async fn start_server(port: u16, config: ProxyConfig) -> Result<()> {
    if config.api_key().is_none() {
        tracing::warn!("no upstream API key configured; /api/ask will answer 500");
    }

    let proxy = Proxy::new(config).context("Failed to build upstream HTTP client")?;
    tracing::info!(
        upstream = %proxy.config().api_url,
        model = %proxy.config().model,
        "proxy configured"
    );

    let server_dir = get_server_dir()?;
    std::fs::create_dir_all(&server_dir)?;

    let pid = std::process::id();
    std::fs::write(server_dir.join(PID_FILE), pid.to_string())?;
    std::fs::write(server_dir.join(PORT_FILE), port.to_string())?;

    let app = router(proxy);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    tracing::info!("ChatSphere server listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let served = axum::serve(listener, app).await.context("Server error");

    let _ = std::fs::remove_file(server_dir.join(PID_FILE));
    let _ = std::fs::remove_file(server_dir.join(PORT_FILE));

    served
}

fn get_server_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    Ok(home.join(SERVER_DIR))
}

/// Port of a live local server, if one is running.
pub fn get_server_port() -> Option<u16> {
    let server_dir = get_server_dir().ok()?;
    let pid_file = server_dir.join(PID_FILE);
    let port_file = server_dir.join(PORT_FILE);

    let pid: u32 = std::fs::read_to_string(pid_file).ok()?.trim().parse().ok()?;

    #[cfg(unix)]
    {
        use std::process::Command;
        let alive = Command::new("kill")
            .args(["-0", &pid.to_string()])
            .output()
            .is_ok_and(|o| o.status.success());
        if !alive {
            return None;
        }
    }
    #[cfg(not(unix))]
    let _ = pid;

    std::fs::read_to_string(port_file).ok()?.trim().parse().ok()
}

/// Start `chatsphere serve` in the background. The child inherits this
/// process's environment, including the upstream API key.
pub fn spawn_server_daemon(port: u16) -> Result<()> {
    use std::process::{Command, Stdio};

    let exe = std::env::current_exe()?;

    Command::new(&exe)
        .args(["serve", "--port", &port.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .context("Failed to spawn server daemon")?;

    std::thread::sleep(std::time::Duration::from_millis(500));
    Ok(())
}

/// Base URL of a running local server, starting one if needed.
pub fn ensure_server_running() -> Result<String> {
    if let Some(port) = get_server_port() {
        return Ok(local_url(port));
    }

    tracing::info!(port = DEFAULT_PORT, "no running server found, starting one");
    spawn_server_daemon(DEFAULT_PORT)?;

    for _ in 0..20 {
        if let Some(p) = get_server_port() {
            return Ok(local_url(p));
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    anyhow::bail!("Server failed to start")
}

fn local_url(port: u16) -> String {
    format!("http://127.0.0.1:{port}")
}

// === Handlers ===

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy" }))
}

async fn ask_handler(
    State(state): State<Arc<ServerState>>,
    method: Method,
    body: Bytes,
) -> Response {
    if method != Method::POST {
        return AskError::MethodNotAllowed.into_response();
    }

    match state.proxy.ask(&body).await {
        Ok(reply) => Json(reply).into_response(),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{body_partial_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_url: &str) -> ProxyConfig {
        ProxyConfig {
            api_key: Some("test-key".to_string()),
            api_url: api_url.to_string(),
            ..Default::default()
        }
    }

    async fn call(app: Router, method: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri("/api/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn upstream_replying(content: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": content}}]
            })))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_non_post_methods_rejected() {
        for verb in ["GET", "PUT", "DELETE", "PATCH"] {
            let app = router(Proxy::new(config("http://127.0.0.1:9")).unwrap());
            let (status, body) = call(app, verb, "").await;
            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{verb}");
            assert!(body["error"].is_string());
        }
    }

    #[tokio::test]
    async fn test_missing_message_is_bad_request() {
        let app = router(Proxy::new(config("http://127.0.0.1:9")).unwrap());
        let (status, body) = call(app, "POST", r#"{"history": []}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Bad Request - No message content provided.");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_server_error() {
        let app = router(Proxy::new(ProxyConfig::default()).unwrap());
        for body in [r#"{"message": "hello"}"#, "{}", "garbage"] {
            let (status, _) = call(app.clone(), "POST", body).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[tokio::test]
    async fn test_creator_query_skips_upstream() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&upstream)
            .await;

        let app = router(Proxy::new(config(&upstream.uri())).unwrap());
        let (status, body) = call(app, "POST", r#"{"message": "Who Made You?"}"#).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["reply"],
            "I was created by Lucky Tiwari, a Full Stack Developer & Owner of ChatSphere AI."
        );
        assert_eq!(body["displayInfo"]["name"], "Lucky Tiwari");
    }

    #[tokio::test]
    async fn test_hello_reply_is_cleaned() {
        let upstream = upstream_replying("**Hi** there").await;
        let app = router(Proxy::new(config(&upstream.uri())).unwrap());

        let (status, body) = call(app, "POST", r#"{"message": "hello"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"reply": "Hi there"}));
    }

    #[tokio::test]
    async fn test_raw_replies_when_cleanup_disabled() {
        let upstream = upstream_replying("**Hi** there").await;
        let app = router(
            Proxy::new(ProxyConfig {
                clean_replies: false,
                ..config(&upstream.uri())
            })
            .unwrap(),
        );

        let (_, body) = call(app, "POST", r#"{"message": "hello"}"#).await;
        assert_eq!(body["reply"], "**Hi** there");
    }

    #[tokio::test]
    async fn test_history_forwarded_with_ai_role_normalized() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({
                "model": "llama3-8b-8192",
                "max_tokens": 1024,
                "messages": [
                    {"role": "system", "content": "You are a helpful AI assistant."},
                    {"role": "assistant", "content": "Hello Guest!"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&upstream)
            .await;

        let app = router(
            Proxy::new(ProxyConfig {
                reply_style: crate::config::ReplyStyle::Plain,
                ..config(&upstream.uri())
            })
            .unwrap(),
        );
        let body = r#"{"message": "hi", "history": [{"role": "ai", "content": "Hello Guest!"}]}"#;
        let (status, json) = call(app, "POST", body).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["reply"], "ok");
    }

    #[tokio::test]
    async fn test_upstream_error_status_forwarded() {
        let upstream = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"message": "Rate limit reached"}
            })))
            .mount(&upstream)
            .await;

        let app = router(Proxy::new(config(&upstream.uri())).unwrap());
        let (status, body) = call(app, "POST", r#"{"message": "hello"}"#).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "Upstream API Error: Rate limit reached");
        assert_eq!(body["details"]["error"]["message"], "Rate limit reached");
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_server_error() {
        // Port 9 (discard) is not listening in test environments.
        let app = router(Proxy::new(config("http://127.0.0.1:9")).unwrap());
        let (status, body) = call(app, "POST", r#"{"message": "hello"}"#).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            body["error"],
            "Internal Server Error - Failed to process AI request."
        );
    }

    #[tokio::test]
    async fn test_health() {
        let app = router(Proxy::new(ProxyConfig::default()).unwrap());
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
