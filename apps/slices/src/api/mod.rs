//! # Slices HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! Mounted under `/api/slices`:
//!
//! - `GET  /` - All slices
//! - `POST /` - Insert a slice (201, or 409 if the ID exists)
//! - `GET  /sample`, `/sample/{amount}` - Random slices (default 3)
//! - `GET  /withInstances`, `/withReferences`, `/withoutReferences`, `/liked`
//! - `GET  /{ids}` - Reference closure of one ID or a comma-separated list
//! - `GET  /{id}/refs` - Closure without the seed
//! - `POST /{id}/upvote`, `/{id}/downvote`, `/{id}/like`
//! - `GET  /search/{word}?size=N` - Search service passthrough
//!
//! Plus `GET /health`.
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `SLICES_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all (default: localhost only)
//! - `SLICES_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `SLICES_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, ConflictResponse, ErrorResponse, HealthResponse, LikeResponse, SearchQuery,
    VoteResponse,
};

use crate::config::{ResolverConfig, SlicesConfig};
use crate::search::{SearchError, SearchGateway};
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use slices_core::{SliceError, SliceStore};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Maximum accepted request body (2 MiB).
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the injected store, the search client and the
/// per-request resolution bounds.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SliceStore>,
    pub search: SearchGateway,
    pub resolver: ResolverConfig,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn SliceStore>, search: SearchGateway, resolver: ResolverConfig) -> Self {
        Self {
            store,
            search,
            resolver,
        }
    }

    /// Build state from a loaded configuration.
    pub fn from_config(
        store: Arc<dyn SliceStore>,
        config: &SlicesConfig,
    ) -> Result<Self, SearchError> {
        let search = SearchGateway::new(&config.search)?;
        Ok(Self::new(store, search, config.resolver.clone()))
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer from `SLICES_CORS_ORIGINS`.
///
/// - `*`: any origin
/// - unset, or no valid entry: localhost only
/// - otherwise: the listed origins
fn build_cors_layer() -> CorsLayer {
    match std::env::var("SLICES_CORS_ORIGINS").ok().as_deref() {
        Some("*") => {
            tracing::warn!("CORS: allowing ALL origins (SLICES_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed: Vec<HeaderValue> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .filter_map(|origin| match origin.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(e) => {
                        tracing::warn!("CORS: invalid origin '{}': {}", origin, e);
                        None
                    }
                })
                .collect();

            if allowed.is_empty() {
                tracing::warn!("CORS: no valid origins in SLICES_CORS_ORIGINS, using localhost");
                build_localhost_cors()
            } else {
                tracing::info!("CORS: allowing {} configured origin(s)", allowed.len());
                cors_for(allowed)
            }
        }
        None => build_localhost_cors(),
    }
}

fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|s| s.parse::<HeaderValue>().ok())
    .collect();
    cors_for(origins)
}

fn cors_for(origins: Vec<HeaderValue>) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Routes relative to `/api/slices`.
fn slice_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_handler).post(handlers::insert_handler),
        )
        .route("/sample", get(handlers::sample_default_handler))
        .route("/sample/{amount}", get(handlers::sample_handler))
        .route("/withInstances", get(handlers::with_instances_handler))
        .route("/withReferences", get(handlers::with_references_handler))
        .route(
            "/withoutReferences",
            get(handlers::without_references_handler),
        )
        .route("/liked", get(handlers::liked_handler))
        .route("/search/{word}", get(handlers::search_handler))
        .route("/{slice_id}", get(handlers::resolve_handler))
        .route("/{slice_id}/refs", get(handlers::refs_handler))
        .route("/{slice_id}/upvote", post(handlers::upvote_handler))
        .route("/{slice_id}/downvote", post(handlers::downvote_handler))
        .route("/{slice_id}/like", post(handlers::like_handler))
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing
/// 2. CORS
/// 3. Body limit
/// 4. Rate limiting (if enabled)
/// 5. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication disabled; set SLICES_API_KEY to require a Bearer token"
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .nest("/api/slices", slice_routes());

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Bind `addr` and serve until the process stops.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), SliceError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| SliceError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Slices HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| SliceError::IoError(format!("Server error: {}", e)))
}
