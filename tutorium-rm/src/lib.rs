//! tutorium-rm library - Resource Management module
//!
//! Management-facing resource analytics and allocation for the tutoring
//! platform: tutor workload overview, inefficiency detection, optimization
//! plan generation, and the approval-gated change applier.

use std::sync::Arc;

use axum::Router;
use tower_http::trace::TraceLayer;
use tutorium_common::notify::Notifier;
use tutorium_common::store::DocumentStore;

pub mod api;
pub mod optimizer;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Document store backing all collections
    pub store: Arc<dyn DocumentStore>,
    /// Fire-and-forget notification sink
    pub notifier: Notifier,
}

impl AppState {
    /// Create new application state over a store
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let notifier = Notifier::new(store.clone());
        Self { store, notifier }
    }
}

/// Build application router
///
/// Health endpoint is public; the resource endpoints require the
/// management role.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    // Protected routes (management role required)
    let protected = Router::new()
        .route("/api/management/resources/overview", get(api::get_overview))
        .route(
            "/api/management/resources/inefficiencies",
            get(api::get_inefficiencies),
        )
        .route("/api/management/resources/optimize", post(api::optimize))
        .route("/api/management/resources/apply", post(api::apply_plan))
        .route(
            "/api/management/resources/manual-override",
            post(api::manual_override_change),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::require_management,
        ));

    // Public routes (no role gate)
    let public = Router::new().merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
