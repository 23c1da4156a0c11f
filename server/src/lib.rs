//! Tasklane Server
//!
//! REST API for the Tasklane task manager providing:
//! - User registration and login
//! - JWT access and refresh token management with one-time-use rotation
//! - Argon2id password hashing
//! - Owner-scoped task CRUD, ordering, time tracking, and statistics
//!
//! # Configuration
//!
//! All configuration is loaded from environment variables:
//! - `ACCESS_TOKEN_SECRET` - Secret for signing access tokens (required, min 32 chars)
//! - `REFRESH_TOKEN_SECRET` - Distinct secret for refresh tokens (required, min 32 chars)
//! - `ACCESS_TOKEN_EXPIRATION` - Access token lifetime in seconds (default: 900)
//! - `REFRESH_TOKEN_EXPIRATION` - Refresh token lifetime in seconds (default: 604800)
//! - `BIND_ADDR` - Listen address (default: "127.0.0.1:5000")
//! - `FRONTEND_URL` - Allowed CORS origin (default: any)
//! - `APP_ENV` - Set to "production" to hide error details

pub mod auth;
pub mod config;
pub mod error;
pub mod extractors;
pub mod models;
pub mod store;
pub mod tasks;

pub use auth::AuthService;
pub use config::Config;
pub use error::ApiError;
pub use extractors::CurrentUser;
pub use tasks::TaskService;

use crate::store::{TaskStore, TokenStore, UserStore};

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Aggregated services container, shared as router state
pub struct Services {
    pub auth: AuthService,
    pub tasks: TaskService,
    pub config: Config,
    started_at: Instant,
}

impl Services {
    pub fn new(config: Config) -> Self {
        let users = Arc::new(UserStore::new());
        let tokens = Arc::new(TokenStore::new());
        let task_store = Arc::new(TaskStore::new());

        Self {
            auth: AuthService::new(&config, users, tokens),
            tasks: TaskService::new(task_store),
            config,
            started_at: Instant::now(),
        }
    }

    /// Seconds since the services were constructed
    pub fn uptime(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

/// Build the full application router
pub fn app(services: Arc<Services>) -> Router {
    // Public routes (no authentication required)
    let public = Router::new()
        .route("/api/auth/register", post(auth::handlers::register))
        .route("/api/auth/login", post(auth::handlers::login))
        .route("/api/auth/refresh", post(auth::handlers::refresh));

    // Protected routes (require a valid bearer access token)
    let protected = Router::new()
        .route("/api/auth/logout", post(auth::handlers::logout))
        .route("/api/auth/profile", get(auth::handlers::profile))
        .route(
            "/api/tasks",
            get(tasks::handlers::list_tasks).post(tasks::handlers::create_task),
        )
        // Literal route: must never be captured by /api/tasks/:id.
        .route(
            "/api/tasks/stats/summary",
            get(tasks::handlers::stats_summary),
        )
        .route(
            "/api/tasks/:id",
            get(tasks::handlers::get_task)
                .put(tasks::handlers::update_task)
                .delete(tasks::handlers::delete_task),
        )
        .route(
            "/api/tasks/:id/position",
            patch(tasks::handlers::update_position),
        )
        .route("/api/tasks/:id/time", patch(tasks::handlers::update_time))
        .layer(axum_middleware::from_fn_with_state(
            services.clone(),
            auth::middleware::require_auth,
        ));

    let cors = cors_layer(&services.config);

    Router::new()
        .route("/api/health", get(health))
        .merge(public)
        .merge(protected)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(services)
}

fn cors_layer(config: &Config) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match config
        .frontend_origin
        .as_deref()
        .and_then(|origin| origin.parse::<HeaderValue>().ok())
    {
        Some(origin) => layer.allow_origin(origin),
        None => layer.allow_origin(Any),
    }
}

/// GET /api/health
async fn health(
    axum::extract::State(services): axum::extract::State<Arc<Services>>,
) -> impl IntoResponse {
    Json(json!({
        "success": true,
        "message": "Server is running",
        "timestamp": chrono::Utc::now(),
        "uptime": services.uptime(),
    }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "success": false,
            "error": "Endpoint not found",
        })),
    )
}
