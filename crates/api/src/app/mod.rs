//! HTTP application wiring (Axum router + shared state).
//!
//! - `services.rs`: backend wiring (org/user stores, sessions, authenticator)
//! - `routes/`: handlers, one file per area
//! - `dto.rs`: request bodies and the form-or-JSON extractor
//! - `errors.rs`: JSON error responses

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use gatehouse_auth::Authenticator;
use gatehouse_infra::{Registrar, UserStore};

use crate::{middleware, tenant};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// State shared by every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<Authenticator>,
    pub users: Arc<dyn UserStore>,
    pub registrar: Arc<dyn Registrar>,
}

impl AppState {
    pub fn new(auth: Arc<Authenticator>, services: &services::Services) -> Self {
        Self {
            auth,
            users: services.users.clone(),
            registrar: services.registrar.clone(),
        }
    }
}

/// Build the full HTTP router.
pub fn build_app(state: AppState) -> Router {
    let guest_only = from_fn_with_state(state.clone(), middleware::guest);
    let guarded = from_fn_with_state(state.clone(), middleware::guard);
    let tenant_scoped = from_fn_with_state(state.clone(), tenant::resolve_tenant);

    // Guest-only pages; the login submission is also tenant-scoped.
    let guests = Router::new()
        .route(
            "/login",
            get(routes::session::show_login).merge(post(routes::session::login).route_layer(tenant_scoped)),
        )
        .route(
            "/register",
            get(routes::registration::show).post(routes::registration::register),
        )
        .route_layer(guest_only);

    let protected = Router::new()
        .route("/home", get(routes::system::home))
        .route("/whoami", get(routes::system::whoami))
        .route("/logout", delete(routes::session::logout))
        .route_layer(guarded);

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(guests)
        .merge(protected)
        .layer(from_fn_with_state(state.clone(), middleware::session_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
