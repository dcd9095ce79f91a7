use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Method, Request, StatusCode,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::Response,
};
use time::Duration;
use toric::application::editors::{EditorDirectory, hash_key};
use toric::application::preview::{PreviewPolicy, PreviewService};
use toric::application::render::{SvgSanitizer, SymbolRenderer};
use toric::application::tokens::TokenService;
use toric::domain::actors::{AccessMode, Actor};
use toric::domain::preview::{PreviewBootstrap, RESULT_HEADER};
use toric::domain::symbology::SymbologySpec;
use toric::infra::http::{EDITOR_KEY_HEADER, HttpState, build_router};
use tower::ServiceExt;

const SECRET: &str = "integration-secret-0123456789abcdef";
const EDITOR_KEY: &str = "ada-editor-key";
const ACTION: &str = "toric_admin";

struct TestApp {
    router: Router,
    preview: Arc<PreviewService>,
}

fn app(access_mode: AccessMode) -> TestApp {
    let tokens = TokenService::new(SECRET, Duration::hours(1)).expect("token service");
    let preview = Arc::new(PreviewService::new(
        tokens,
        Arc::new(SymbolRenderer),
        SvgSanitizer::new(),
        SymbologySpec::default(),
        PreviewPolicy {
            access_mode,
            ..PreviewPolicy::default()
        },
    ));
    let editors = EditorDirectory::new()
        .with_hashed_key("ada", &hex::encode(hash_key(EDITOR_KEY)))
        .expect("editor directory");

    let router = build_router(HttpState {
        preview: Arc::clone(&preview),
        editors: Arc::new(editors),
    });
    TestApp { router, preview }
}

fn form(fields: &[(&str, &str)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn render_request(key: Option<&str>, fields: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri("/ajax")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(key) = key {
        builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
    }
    builder
        .body(Body::from(form(fields)))
        .expect("request should build")
}

fn get_request(uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(Method::GET).uri(uri);
    if let Some(key) = key {
        builder = builder.header(EDITOR_KEY_HEADER, key);
    }
    builder.body(Body::empty()).expect("request should build")
}

async fn send(router: &Router, request: Request<Body>) -> Response {
    router
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn result_kind(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(RESULT_HEADER)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn bootstrap_nonce_renders_markup() {
    let app = app(AccessMode::Private);

    let response = send(&app.router, get_request("/ajax/bootstrap", Some(EDITOR_KEY))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bootstrap: PreviewBootstrap =
        serde_json::from_str(&body_text(response).await).expect("bootstrap json");
    assert_eq!(bootstrap.ajax_url, "/ajax");
    assert_eq!(bootstrap.action, ACTION);

    let response = send(
        &app.router,
        render_request(
            Some(EDITOR_KEY),
            &[
                ("action", bootstrap.action.as_str()),
                ("nonce", bootstrap.nonce.as_str()),
                ("value", "HELLO"),
            ],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(result_kind(&response), Some("markup"));
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/html"));

    let body = body_text(response).await;
    assert!(body.starts_with("<svg"));
    assert!(body.contains("<desc>HELLO</desc>"));
    assert!(!body.contains("<path"));
}

#[tokio::test]
async fn missing_nonce_is_rejected_with_a_json_message() {
    let app = app(AccessMode::Private);

    let response = send(
        &app.router,
        render_request(Some(EDITOR_KEY), &[("action", ACTION), ("value", "HELLO")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(response).await, r#""No nonce found""#);
}

#[tokio::test]
async fn forged_nonce_is_rejected() {
    let app = app(AccessMode::Both);
    let anonymous_nonce = app.preview.issue_token(&Actor::Anonymous);

    for nonce in ["v1.0.00", anonymous_nonce.as_str()] {
        let response = send(
            &app.router,
            render_request(
                Some(EDITOR_KEY),
                &[("action", ACTION), ("nonce", nonce), ("value", "HELLO")],
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::FORBIDDEN, "nonce `{nonce}`");
        assert_eq!(body_text(response).await, r#""Nonce verification failed""#);
    }
}

#[tokio::test]
async fn blank_value_returns_the_neutral_message() {
    let app = app(AccessMode::Private);
    let nonce = app.preview.issue_token(&Actor::editor("ada"));

    let response = send(
        &app.router,
        render_request(
            Some(EDITOR_KEY),
            &[("action", ACTION), ("nonce", nonce.as_str()), ("value", "  \n ")],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(result_kind(&response), Some("empty"));
    assert_eq!(body_text(response).await, "Please enter details");
}

#[tokio::test]
async fn renderer_rejection_is_unprocessable() {
    let app = app(AccessMode::Private);
    let nonce = app.preview.issue_token(&Actor::editor("ada"));
    let oversized = "x".repeat(3000);

    let response = send(
        &app.router,
        render_request(
            Some(EDITOR_KEY),
            &[("action", ACTION), ("nonce", nonce.as_str()), ("value", oversized.as_str())],
        ),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(result_kind(&response), Some("error"));
    let message: String =
        serde_json::from_str(&body_text(response).await).expect("json string body");
    assert!(message.starts_with("unable to encode data"));
}

#[tokio::test]
async fn oversized_input_and_unknown_actions_are_rejected() {
    let app = app(AccessMode::Private);
    let nonce = app.preview.issue_token(&Actor::editor("ada"));

    let huge = "x".repeat(5000);
    let response = send(
        &app.router,
        render_request(
            Some(EDITOR_KEY),
            &[("action", ACTION), ("nonce", nonce.as_str()), ("value", huge.as_str())],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = send(
        &app.router,
        render_request(
            Some(EDITOR_KEY),
            &[("action", "delete_everything"), ("nonce", nonce.as_str()), ("value", "HELLO")],
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_editor_key_is_unauthorized() {
    let app = app(AccessMode::Private);

    let response = send(&app.router, get_request("/ajax/bootstrap", Some("mallory"))).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn access_mode_decides_who_may_preview() {
    let private = app(AccessMode::Private);
    let response = send(&private.router, get_request("/ajax/bootstrap", None)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let public = app(AccessMode::Public);
    let response = send(&public.router, get_request("/ajax/bootstrap", Some(EDITOR_KEY))).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let response = send(&public.router, get_request("/ajax/bootstrap", None)).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn embed_wraps_rendered_markup() {
    let app = app(AccessMode::Public);

    let response = send(&app.router, get_request("/embed?value=HELLO", None)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.starts_with(r#"<div class="toric shortcode-output"><svg"#));
    assert!(body.ends_with("</div>"));
}

#[tokio::test]
async fn health_ignores_credentials() {
    let app = app(AccessMode::Private);

    let response = send(&app.router, get_request("/_health", Some("mallory"))).await;

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}
