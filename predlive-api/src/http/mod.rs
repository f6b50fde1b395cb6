// Module: http
// Server-push subscriptions and broadcast publishing over HTTP

pub mod broadcast;
pub mod debug;
pub mod diagnostics;
pub mod error;
pub mod events;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use predlive_core::config::{BroadcastConfig, CorsConfig};
use predlive_hub::StreamHub;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use error::{AppError, AppResult};

/// Preflight responses may be cached for a day
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<StreamHub>,
    pub broadcast: Arc<BroadcastConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(hub: Arc<StreamHub>, broadcast: BroadcastConfig) -> Self {
        Self {
            hub,
            broadcast: Arc::new(broadcast),
        }
    }
}

/// Create the HTTP router with all routes
pub fn create_router(state: AppState, cors: &CorsConfig) -> Router {
    Router::new()
        // Health check and registry inspection
        .merge(debug::create_debug_router())
        // Publish, plus the primary subscription path
        .merge(broadcast::create_broadcast_router())
        // Subscription aliases
        .merge(events::create_events_router())
        // Canned producers for overlay checks
        .merge(diagnostics::create_diagnostics_router())
        .layer(create_cors_layer(cors))
        .layer(TraceLayer::new_for_http())
        // Apply state to all routes (must be last)
        .with_state(state)
}

/// Build the CORS layer; an empty origin list allows any origin
fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let allow_origin = if config.allowed_origins.is_empty() {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|origin| match HeaderValue::from_str(origin) {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(CORS_MAX_AGE)
}
