use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    application::error::{ErrorReport, HttpError},
    domain::actors::Actor,
};

use super::HttpState;

pub const EDITOR_KEY_HEADER: &str = "x-toric-key";

const SOURCE: &str = "infra::http::middleware";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

/// Resolve the [`Actor`] behind a request. No credentials means anonymous;
/// a key that matches no editor is rejected outright.
pub async fn resolve_actor(
    State(state): State<HttpState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let actor = match presented_key(request.headers()) {
        None => Actor::Anonymous,
        Some(key) => match state.editors.authenticate(&key) {
            Some(editor) => editor,
            None => {
                return HttpError::new(
                    SOURCE,
                    StatusCode::UNAUTHORIZED,
                    "Unknown editor key",
                    "presented key matches no configured editor",
                )
                .into_response();
            }
        },
    };

    request.extensions_mut().insert(actor.clone());
    let mut response = next.run(request).await;
    response.extensions_mut().insert(actor);
    response
}

fn presented_key(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| raw.strip_prefix("Bearer "));
    let key = bearer.or_else(|| {
        headers
            .get(EDITOR_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
    })?;
    let key = key.trim();
    (!key.is_empty()).then(|| key.to_string())
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let actor = response
            .extensions()
            .get::<Actor>()
            .map(Actor::to_string)
            .unwrap_or_else(|| "unresolved".to_string());
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target: "toric::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor = %actor,
                "request failed",
            );
        } else {
            warn!(
                target: "toric::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                actor = %actor,
                "client request error",
            );
        }
    }

    response
}
