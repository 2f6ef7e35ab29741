//! HTTP surface.
//!
//! Routes:
//! - `GET /` health check
//! - `GET|POST {base}/prototype` sensor snapshot retrieval and ingestion
//! - `POST {base}/users/operations` account operations
//!
//! Anything else answers 404 with the standard failure envelope.

mod error;
mod prototype;
mod users;

use std::sync::{Arc, Mutex};
use std::time::Instant;

use axum::extract::{OriginalUri, Request};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::logging::REQUEST_TARGET;
use crate::pipeline::PrototypeService;
use crate::storage::JsonFileStore;
use crate::users::UserStore;

pub use error::ApiError;

/// Shared handler state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Sensor pipeline.
    pub prototype: Arc<PrototypeService>,
    /// Account database. The connection is not `Sync`, so access is serialized.
    pub users: Arc<Mutex<UserStore>>,
}

impl AppState {
    /// Bundle the services the handlers need.
    #[must_use]
    pub fn new(prototype: PrototypeService, users: UserStore) -> Self {
        Self {
            prototype: Arc::new(prototype),
            users: Arc::new(Mutex::new(users)),
        }
    }
}

/// Successful response envelope.
#[derive(Debug, Serialize)]
struct Envelope<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    data: T,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: None,
            data,
        })
    }

    fn with_message(message: &'static str, data: T) -> Json<Self> {
        Json(Self {
            success: true,
            message: Some(message),
            data,
        })
    }
}

#[derive(Debug, Serialize)]
struct Health {
    success: bool,
    message: &'static str,
    timestamp: String,
    version: &'static str,
}

/// Build the router with API routes mounted under `base_path`.
pub fn app(state: AppState, base_path: &str) -> Router {
    let api = Router::new()
        .route(
            "/prototype",
            get(prototype::current).post(prototype::ingest),
        )
        .route("/users/operations", post(users::operations));

    let router = Router::new().route("/", get(health));
    let router = if base_path == "/" {
        router.merge(api)
    } else {
        router.nest(base_path, api)
    };

    router
        .fallback(not_found)
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Open the stores named in `config` and serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if a store cannot be opened or the listener cannot bind.
pub async fn serve(config: &Config) -> Result<()> {
    let documents = JsonFileStore::from_config(config)?;
    info!(
        "Sensor documents at {} and {}",
        documents.snapshot_path().display(),
        documents.log_path().display()
    );
    let prototype = PrototypeService::from_config(Arc::new(documents), config);
    let users = UserStore::open(config.users_database_path())?;
    let state = AppState::new(prototype, users);

    let listener = TcpListener::bind(config.server.bind).await?;
    info!(
        "SafeDrive backend listening on {} (API under {})",
        listener.local_addr()?,
        config.server.base_path
    );

    axum::serve(listener, app(state, &config.server.base_path))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C, running until killed: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn health() -> Json<Health> {
    Json(Health {
        success: true,
        message: "SafeDrive Backend API is running!",
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn not_found(OriginalUri(uri): OriginalUri) -> Response {
    debug!("No route for {}", uri);
    ApiError::new(StatusCode::NOT_FOUND, format!("Route {uri} not found")).into_response()
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        target: REQUEST_TARGET,
        "{} {} -> {} ({:?})",
        method,
        uri,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::DisplayZone;
    use crate::storage::{MemoryStore, RetentionPolicy};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::FixedOffset;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let prototype = PrototypeService::new(
            Arc::new(MemoryStore::new()),
            RetentionPolicy::unlimited(),
            DisplayZone::Fixed(FixedOffset::east_opt(0).unwrap()),
        );
        AppState::new(prototype, UserStore::open_in_memory().unwrap())
    }

    async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let router = app(test_state(), "/api");
        let (status, body) = send(&router, "GET", "/", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let router = app(test_state(), "/api");
        let (status, body) = send(&router, "GET", "/api/nope?x=1", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Route /api/nope?x=1 not found");
    }

    #[tokio::test]
    async fn test_get_before_any_ingestion() {
        let router = app(test_state(), "/api");
        let (status, body) = send(&router, "GET", "/api/prototype", None).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Failed to read current prototype data");
    }

    #[tokio::test]
    async fn test_post_then_get() {
        let router = app(test_state(), "/api");

        let (status, body) = send(
            &router,
            "POST",
            "/api/prototype",
            Some(json!({"gripStatus": "Loose", "bpm": 130, "carStatus": "moving"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Prototype data updated successfully");
        assert_eq!(body["data"]["overallStatus"], "ALERT");
        assert_eq!(body["data"]["notificationsCreated"], 2);

        let (status, body) = send(&router, "GET", "/api/prototype", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["gripStatus"], "Loose");
        let issues: Vec<_> = body["data"]["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["issues"][0].as_str().unwrap().to_string())
            .collect();
        assert_eq!(issues, vec!["Abnormal BPM: 130", "Loose Grip"]);
    }

    #[tokio::test]
    async fn test_post_invalid_json() {
        let router = app(test_state(), "/api");
        let request = Request::builder()
            .method("POST")
            .uri("/api/prototype")
            .header("content-type", "application/json")
            .body(Body::from("{"))
            .unwrap();

        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_root_base_path() {
        let router = app(test_state(), "/");
        let (status, _) = send(
            &router,
            "POST",
            "/prototype",
            Some(json!({"eyesStatus": "Open"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_user_operations_flow() {
        let router = app(test_state(), "/api");

        let (status, body) = send(
            &router,
            "POST",
            "/api/users/operations",
            Some(json!({
                "action": "create",
                "data": {"name": "Ana", "email": "ana@example.com", "password": "pw"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["type"], "user_created");

        let (status, body) = send(
            &router,
            "POST",
            "/api/users/operations",
            Some(json!({
                "action": "create",
                "data": {"name": "Ana", "email": "ana@example.com", "password": "pw"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "User with this email already exists");

        let (status, body) = send(
            &router,
            "POST",
            "/api/users/operations",
            Some(json!({
                "action": "login",
                "data": {"email": "ana@example.com", "password": "wrong"}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn test_user_operations_invalid_action() {
        let router = app(test_state(), "/api");
        let (status, body) = send(
            &router,
            "POST",
            "/api/users/operations",
            Some(json!({"action": "purge"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["error"],
            "Invalid action. Use: 'getAll', 'create', 'login', 'getById', 'update', or 'delete'"
        );
    }
}
