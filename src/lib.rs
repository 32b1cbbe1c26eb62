pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use middleware::auth::AUTH_HEADER;
use services::{auth::AuthService, invitations::InvitationService};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub invitations: Arc<InvitationService>,
    pub config: Arc<Config>,
}

pub fn router(state: AppState) -> Router {
    // Allow the frontend origin; localhost is always allowed for development.
    let frontend = state.config.frontend_url.trim_end_matches('/').to_string();
    let cors_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(o) = origin.to_str() else {
            return false;
        };
        o.starts_with("http://localhost") || o.starts_with("http://127.0.0.1") || o == frontend
    });

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(AllowHeaders::list([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(AUTH_HEADER),
        ]))
        .allow_origin(cors_origin);

    Router::new()
        .route("/health", get(routes::health::health_check))
        // Session
        .route("/auth/log-in", post(routes::auth::log_in))
        .route(
            "/auth/{phone_number}/restore-password",
            get(routes::auth::restore_password),
        )
        .route(
            "/auth/{phone_number}/change-password",
            post(routes::auth::change_password),
        )
        .route("/auth2", get(routes::auth2::token))
        // Action links
        .route("/actions", get(routes::invitations::action))
        // Invitations
        .route(
            "/invitations",
            get(routes::invitations::list_invitations).post(routes::invitations::invite_member),
        )
        .route(
            "/invitations/accept",
            post(routes::invitations::accept_invitation),
        )
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
