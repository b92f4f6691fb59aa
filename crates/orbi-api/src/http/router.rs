//! Axum router configuration with middleware.
//!
//! API routes live under `/api/`. Middleware: CORS (any origin), tracing.
//!
//! When the configured front-end `dist` directory exists, unknown paths are
//! served from it, falling back to `index.html` for client-side routing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let web_dir = state.config.web_dir.clone();

    let api_routes = Router::new()
        .route("/messages", get(handlers::messages::list_messages))
        .route("/messages/{hash}", get(handlers::messages::get_message))
        .route("/chat/new", post(handlers::chat::new_chat))
        .route("/sessions", get(handlers::sessions::list_sessions));

    let mut router = Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if !web_dir.is_empty() && std::path::Path::new(&web_dir).exists() {
        let index_path = std::path::Path::new(&web_dir).join("index.html");
        let serve_dir = ServeDir::new(&web_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
        tracing::info!(path = %web_dir, "SPA static file serving enabled");
    }

    router
}

/// GET /health - Liveness probe (no auth required).
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use orbi_core::chat::repository::MessageStore;
    use orbi_infra::crypto::init_data::InitDataVerifier;
    use orbi_types::config::RelayConfig;
    use secrecy::SecretString;
    use tower::ServiceExt;

    use crate::http::extractors::auth::INIT_DATA_HEADER;

    const BOT_TOKEN: &str = "123456:TEST-TOKEN";

    async fn test_state(dir: &tempfile::TempDir, web_dir: &str) -> AppState {
        let config = RelayConfig {
            web_dir: web_dir.to_string(),
            ..Default::default()
        };
        AppState::init(dir.path().to_path_buf(), config)
            .await
            .unwrap()
            .with_bot_token(&SecretString::from(BOT_TOKEN))
            .unwrap()
    }

    fn init_data_for(user_json: &str) -> String {
        InitDataVerifier::new(&SecretString::from(BOT_TOKEN))
            .unwrap()
            .sign(&[("auth_date", "1700000000"), ("user", user_json)])
            .unwrap()
    }

    fn init_data(user_id: i64) -> String {
        init_data_for(&format!(r#"{{"id":{user_id},"first_name":"Ada"}}"#))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn with_identity(method: Method, uri: &str, init_data: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(INIT_DATA_HEADER, init_data)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 100_000).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let resp = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
    }

    #[tokio::test]
    async fn test_get_message_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, "").await;
        let hash = state.store.create_body("Hi! How can I help?").await.unwrap();
        let app = build_router(state);

        let resp = app.oneshot(get(&format!("/api/messages/{hash}"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        assert_eq!(body["hash"], hash.as_str());
        assert_eq!(body["content"], "Hi! How can I help?");
        assert!(body["createdAt"].is_string());
    }

    #[tokio::test]
    async fn test_get_unknown_message_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let resp = app.clone().oneshot(get("/api/messages/deadbeef")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Message not found");
        assert!(body["details"].is_string());

        let resp = app.oneshot(get("/api/messages/not-a-hash")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_messages_requires_identity() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let resp = app.clone().oneshot(get("/api/messages")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let tampered = init_data(7).replace("Ada", "Eve");
        let resp = app
            .oneshot(with_identity(Method::GET, "/api/messages", &tampered))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_init_data_without_usable_user_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let resp = app
            .oneshot(with_identity(Method::GET, "/api/messages", &init_data_for("not json")))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_messages_one_per_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, "").await;
        let s1 = state.store.create_session(7).await.unwrap();
        state.store.record_exchange(s1.id, "q1", "a1").await.unwrap();
        state.store.record_exchange(s1.id, "q2", "a2").await.unwrap();
        let s2 = state.store.create_session(7).await.unwrap();
        state.store.record_exchange(s2.id, "q3", "a3").await.unwrap();
        let app = build_router(state);

        let resp = app
            .clone()
            .oneshot(with_identity(Method::GET, "/api/messages", &init_data(7)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let contents: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|b| b["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["a3", "a1"]);

        let resp = app
            .oneshot(with_identity(Method::GET, "/api/messages", &init_data(8)))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_new_chat_deactivates_all_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, "").await;
        state.store.create_session(7).await.unwrap();
        let store = state.store.clone();
        let app = build_router(state);

        let resp = app
            .oneshot(with_identity(Method::POST, "/api/chat/new", &init_data(7)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        assert!(body_json(resp).await["message"].is_string());
        assert!(store.get_active_session(7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir, "").await;
        let first = state.store.create_session(7).await.unwrap();
        let second = state.store.create_session(7).await.unwrap();
        let app = build_router(state);

        let resp = app
            .oneshot(with_identity(Method::GET, "/api/sessions", &init_data(7)))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = body_json(resp).await;
        let sessions = body.as_array().unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0]["id"], second.id);
        assert_eq!(sessions[0]["isActive"], true);
        assert_eq!(sessions[1]["id"], first.id);
        assert_eq!(sessions[1]["isActive"], false);
    }

    #[tokio::test]
    async fn test_cors_preflight() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let req = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/messages")
            .header("origin", "https://example.org")
            .header("access-control-request-method", "GET")
            .header("access-control-request-headers", INIT_DATA_HEADER)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_spa_fallback_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        let web = tempfile::tempdir().unwrap();
        std::fs::write(web.path().join("index.html"), "<html>orbi</html>").unwrap();
        let app = build_router(test_state(&dir, web.path().to_str().unwrap()).await);

        let resp = app.oneshot(get("/message/abcdef01")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        assert_eq!(&bytes[..], b"<html>orbi</html>");
    }

    #[tokio::test]
    async fn test_unknown_route_without_web_dir_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir, "").await);

        let resp = app.oneshot(get("/nonexistent")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
