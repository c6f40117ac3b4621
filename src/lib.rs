//! Session tracker: server-side session lifecycle with pluggable stores,
//! login reconciliation and preference resolution.
//!
//! The library exposes the router; `main.rs` only wires stores and config.

pub mod audit;
pub mod config;
pub mod credentials;
pub mod error;
pub mod middleware;
pub mod preferences;
pub mod profile;
pub mod routes;
pub mod session;
pub mod types;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::credentials::CredentialService;
use crate::profile::AnyProfileStore;
use crate::session::AnyStore;
use crate::session::manager::SessionManager;

/// Shared application state available to all route handlers.
pub struct AppState {
    pub config: Config,
    pub credentials: CredentialService,
    pub sessions: SessionManager<AnyStore>,
    pub profiles: Arc<AnyProfileStore>,
}

impl AppState {
    pub fn new(config: Config, sessions: AnyStore, profiles: AnyProfileStore) -> Self {
        let credentials = CredentialService::new(&config.jwt_secret, config.token_ttl);
        let sessions = SessionManager::new(Arc::new(sessions), config.session_ttl);
        Self {
            config,
            credentials,
            sessions,
            profiles: Arc::new(profiles),
        }
    }
}

fn cors_layer(config: &Config) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    match config.frontend_url.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        Err(_) => {
            tracing::warn!(url = %config.frontend_url, "FRONTEND_URL is not a valid origin; CORS disabled");
            cors
        }
    }
}

/// Build the Axum router with all middleware and routes.
pub fn create_app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route(
            "/session",
            post(routes::session::init_session)
                .get(routes::session::get_session)
                .delete(routes::session::destroy_session),
        )
        .route("/session/page", post(routes::session::log_page))
        .route("/session/action", post(routes::session::log_action))
        .route("/session/user-session", get(routes::session::user_session))
        .route(
            "/preferences",
            post(routes::preferences::save_preferences).get(routes::preferences::get_preferences),
        )
        .route("/auth/register", post(routes::auth::register))
        .route("/auth/login", post(routes::auth::login));

    let prefix = state.config.api_prefix.trim_matches('/');
    let router = Router::new().route("/health", get(routes::health::health));
    let router = if prefix.is_empty() {
        router.merge(api)
    } else {
        router.nest(&format!("/{prefix}"), api)
    };

    router
        .layer(cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
