use axum::{
    Extension, Form, Json,
    extract::{Query, State},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    application::{error::ErrorReport, preview::PreviewError},
    domain::{
        actors::Actor,
        preview::{PreviewCall, RESULT_HEADER, RenderFailure, RenderResult, ResultKind},
    },
};

use super::{AJAX_PATH, HttpState};

const SOURCE: &str = "infra::http::preview";
const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

impl IntoResponse for PreviewError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut response = (status, Json(self.public_message())).into_response();
        ErrorReport::from_error(SOURCE, status, &self).attach(&mut response);
        response
    }
}

pub(super) async fn bootstrap(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
) -> Response {
    match state.preview.bootstrap(&actor, AJAX_PATH) {
        Ok(bootstrap) => Json(bootstrap).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn render(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
    Form(call): Form<PreviewCall>,
) -> Response {
    let result = match state.preview.handle(&actor, &call) {
        Ok(result) => result,
        Err(err) => return err.into_response(),
    };

    let kind = result.kind().as_str();
    match result {
        RenderResult::Markup(markup) => (
            StatusCode::OK,
            [(CONTENT_TYPE.as_str(), HTML_CONTENT_TYPE), (RESULT_HEADER, kind)],
            markup,
        )
            .into_response(),
        RenderResult::Failure(RenderFailure::EmptyInput) => (
            StatusCode::OK,
            [(CONTENT_TYPE.as_str(), TEXT_CONTENT_TYPE), (RESULT_HEADER, kind)],
            state.preview.policy().empty_message.clone(),
        )
            .into_response(),
        RenderResult::Failure(RenderFailure::Renderer(reason)) => {
            let status = StatusCode::UNPROCESSABLE_ENTITY;
            let mut response =
                (status, [(RESULT_HEADER, ResultKind::Error.as_str())], Json(&reason))
                    .into_response();
            ErrorReport::from_message(SOURCE, status, reason).attach(&mut response);
            response
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct EmbedQuery {
    value: Option<String>,
}

pub(super) async fn embed(
    State(state): State<HttpState>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<EmbedQuery>,
) -> Response {
    match state.preview.embed(&actor, query.value.as_deref()) {
        Ok(markup) => Html(markup).into_response(),
        Err(err) => err.into_response(),
    }
}

pub(super) async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}
