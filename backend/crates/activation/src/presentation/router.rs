//! Activation Router
//!
//! Paths are relative; the binary nests these routers under `/api`.

use crate::application::config::ActivationConfig;
use crate::infra::postgres::PgActivationRepository;
use crate::presentation::handlers::{self, ActivationAppState, ActivationStore};
use crate::presentation::middleware::require_admin_key;
use axum::{
    Router, middleware,
    routing::{any, get, post},
};
use std::sync::Arc;

/// Create the activation router with PostgreSQL repository
pub fn activation_router(repo: PgActivationRepository, config: ActivationConfig) -> Router {
    activation_router_generic(repo, config)
}

/// Create a generic activation router for any repository implementation
pub fn activation_router_generic<R>(repo: R, config: ActivationConfig) -> Router
where
    R: ActivationStore,
{
    let config = Arc::new(config);
    let state = ActivationAppState {
        repo: Arc::new(repo),
        config: config.clone(),
    };

    let admin = Router::new()
        .route(
            "/batches",
            get(handlers::list_batches::<R>).post(handlers::generate_batch::<R>),
        )
        .route("/codes", get(handlers::list_codes::<R>))
        .route("/codes/revoke", post(handlers::revoke_code::<R>))
        .route("/activations", get(handlers::list_activations::<R>))
        .route("/analytics", get(handlers::analytics::<R>))
        .route("/fraud", get(handlers::fraud_report::<R>))
        .route("/fraud/unban", post(handlers::unban_device::<R>))
        .route_layer(middleware::from_fn_with_state(config, require_admin_key));

    Router::new()
        .route("/activate", post(handlers::activate::<R>))
        .nest("/admin", admin)
        .with_state(state)
}

/// Router mounted when persistence was unreachable at startup
pub fn unavailable_router() -> Router {
    Router::new()
        .route("/activate", any(handlers::unavailable))
        .route("/admin", any(handlers::unavailable))
        .route("/admin/{*rest}", any(handlers::unavailable))
}
