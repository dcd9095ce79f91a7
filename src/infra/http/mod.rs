mod middleware;
mod preview;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::application::{editors::EditorDirectory, preview::PreviewService};

use self::middleware::{log_responses, resolve_actor, set_request_context};

pub use self::middleware::{EDITOR_KEY_HEADER, RequestContext};

/// Path of the render call; handed to clients in the bootstrap payload.
pub const AJAX_PATH: &str = "/ajax";
pub const BOOTSTRAP_PATH: &str = "/ajax/bootstrap";
pub const EMBED_PATH: &str = "/embed";
pub const HEALTH_PATH: &str = "/_health";

#[derive(Clone)]
pub struct HttpState {
    pub preview: Arc<PreviewService>,
    pub editors: Arc<EditorDirectory>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(AJAX_PATH, post(preview::render))
        .route(BOOTSTRAP_PATH, get(preview::bootstrap))
        .route(EMBED_PATH, get(preview::embed))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            resolve_actor,
        ))
        .route(HEALTH_PATH, get(preview::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
