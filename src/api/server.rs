//! HTTP server: shared state, router and lifecycle.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use super::{board, rules, tasks};
use crate::automation::{AutomationEngine, GeneratedLinks};
use crate::config::default_columns;
use crate::db::Database;
use crate::error::ApiError;

/// Header carrying the caller's user id, set by the upstream auth layer.
pub const USER_HEADER: &str = "x-user-id";

/// State shared across handlers.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Database>,
    automation: AutomationEngine,
    automation_enabled: bool,
    default_columns: Arc<[String]>,
}

impl AppState {
    pub fn new(db: Arc<Database>, automation: AutomationEngine) -> Self {
        Self {
            db,
            automation,
            automation_enabled: true,
            default_columns: default_columns().into(),
        }
    }

    /// Columns created for a user whose board is empty. Empty disables seeding.
    pub fn with_default_columns(mut self, titles: Vec<String>) -> Self {
        self.default_columns = titles.into();
        self
    }

    pub fn default_columns(&self) -> &[String] {
        &self.default_columns
    }

    /// Turn rule evaluation on task writes on or off.
    pub fn with_automation_enabled(mut self, enabled: bool) -> Self {
        self.automation_enabled = enabled;
        self
    }

    pub fn db(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn automation(&self) -> &AutomationEngine {
        &self.automation
    }

    /// Run the user's rules against `content`.
    ///
    /// Automation is best-effort: a failure is logged and yields no links so
    /// the task write still goes through.
    pub async fn generate_links(
        &self,
        user_id: &str,
        content: &str,
        known: &[String],
    ) -> GeneratedLinks {
        if !self.automation_enabled {
            return GeneratedLinks::default();
        }
        match self.automation.execute_tracked(content, user_id, known).await {
            Ok(generated) => generated,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Automation failed, saving task without generated links");
                GeneratedLinks::default()
            }
        }
    }
}

/// The caller's user id, taken from [`USER_HEADER`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub String);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|user_id| !user_id.is_empty())
            .map(|user_id| CurrentUser(user_id.to_string()))
            .ok_or_else(ApiError::unauthorized)
    }
}

/// Health check response.
#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint.
async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// API root - returns available endpoints.
async fn api_root() -> impl IntoResponse {
    Json(serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/api/health",
            "board": "/api/board",
            "columns": "/api/columns",
            "column": "/api/columns/{column_id}",
            "tasks": "/api/tasks",
            "automations": "/api/automations",
        }
    }))
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api", get(api_root))
        .route("/api/health", get(health))
        // Board
        .route("/api/board", get(board::get_board))
        .route("/api/columns", post(board::create_column))
        .route(
            "/api/columns/{column_id}",
            put(board::update_column).delete(board::delete_column),
        )
        // Tasks
        .route("/api/tasks", post(tasks::create_task))
        .route(
            "/api/tasks/{task_id}",
            put(tasks::update_task).delete(tasks::delete_task),
        )
        // Automation rules
        .route(
            "/api/automations",
            get(rules::list_rules).post(rules::create_rule),
        )
        .route(
            "/api/automations/{rule_id}",
            put(rules::update_rule).delete(rules::delete_rule),
        )
        .route("/api/automations/cache/clear", post(rules::clear_cache))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Handle for a running server.
pub struct ServerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server is bound to.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.task.await {
            warn!("Server task ended abnormally: {}", e);
        }
    }
}

/// Bind `addr` and serve the API in a background task.
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<ServerHandle> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Kanban API listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Kanban API shutting down");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(ServerHandle {
        shutdown_tx: Some(shutdown_tx),
        addr: bound_addr,
        task,
    })
}
