//! Render endpoint core: admit the actor, check the anti-forgery token, render
//! and sanitize. Each call is a single pass with no shared mutable state.

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use metrics::{counter, histogram};
use thiserror::Error;
use tracing::debug;

use crate::application::render::{CodeRenderer, SvgSanitizer, escape_text};
use crate::application::tokens::{TokenError, TokenService};
use crate::domain::actors::{AccessMode, Actor};
use crate::domain::preview::{PreviewBootstrap, PreviewCall, RenderFailure, RenderResult};
use crate::domain::symbology::SymbologySpec;

pub const METRIC_PREVIEW_REQUESTS: &str = "toric_preview_requests_total";
pub const METRIC_PREVIEW_RENDER_MS: &str = "toric_preview_render_ms";

pub const DEFAULT_ACTION: &str = "toric_admin";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "Failed to retrieve the code. Update the code or Refresh the page";
pub const DEFAULT_EMPTY_MESSAGE: &str = "Please enter details";
pub const DEFAULT_MAX_INPUT_BYTES: usize = 4096;

/// Deployment-level knobs of the preview surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewPolicy {
    pub action: String,
    pub empty_message: String,
    pub error_message: String,
    pub max_input_bytes: usize,
    pub access_mode: AccessMode,
}

impl Default for PreviewPolicy {
    fn default() -> Self {
        Self {
            action: DEFAULT_ACTION.to_string(),
            empty_message: DEFAULT_EMPTY_MESSAGE.to_string(),
            error_message: DEFAULT_ERROR_MESSAGE.to_string(),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            access_mode: AccessMode::default(),
        }
    }
}

/// Terminal rejections of a render call. None of them reach the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("{actor} is not admitted in {mode} access mode")]
    Forbidden { actor: String, mode: AccessMode },
    #[error("no anti-forgery token presented")]
    NoToken,
    #[error("anti-forgery token rejected")]
    TokenInvalid(#[source] TokenError),
    #[error("input of {len} bytes exceeds the {limit} byte limit")]
    InputTooLarge { len: usize, limit: usize },
}

impl PreviewError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownAction(_) => StatusCode::BAD_REQUEST,
            Self::Forbidden { .. } | Self::NoToken | Self::TokenInvalid(_) => {
                StatusCode::FORBIDDEN
            }
            Self::InputTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    /// Message safe to return to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "Unknown action",
            Self::Forbidden { .. } => "Preview is not available for this account",
            Self::NoToken => "No nonce found",
            Self::TokenInvalid(_) => "Nonce verification failed",
            Self::InputTooLarge { .. } => "Input is too large",
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Self::UnknownAction(_) => "unknown_action",
            Self::Forbidden { .. } => "forbidden",
            Self::NoToken => "no_token",
            Self::TokenInvalid(_) => "token_invalid",
            Self::InputTooLarge { .. } => "too_large",
        }
    }
}

#[derive(Clone)]
pub struct PreviewService {
    tokens: TokenService,
    renderer: Arc<dyn CodeRenderer>,
    sanitizer: Arc<SvgSanitizer>,
    spec: SymbologySpec,
    policy: PreviewPolicy,
}

impl PreviewService {
    pub fn new(
        tokens: TokenService,
        renderer: Arc<dyn CodeRenderer>,
        sanitizer: SvgSanitizer,
        spec: SymbologySpec,
        policy: PreviewPolicy,
    ) -> Self {
        Self {
            tokens,
            renderer,
            sanitizer: Arc::new(sanitizer),
            spec,
            policy,
        }
    }

    pub fn policy(&self) -> &PreviewPolicy {
        &self.policy
    }

    /// Token for `actor` bound to the configured action.
    pub fn issue_token(&self, actor: &Actor) -> String {
        self.tokens.issue(actor, &self.policy.action)
    }

    /// Values a page hands to its preview client at render time.
    pub fn bootstrap(
        &self,
        actor: &Actor,
        ajax_url: impl Into<String>,
    ) -> Result<PreviewBootstrap, PreviewError> {
        self.admit(actor).inspect_err(record_rejection)?;
        Ok(PreviewBootstrap {
            ajax_url: ajax_url.into(),
            action: self.policy.action.clone(),
            nonce: self.issue_token(actor),
            code_retrieval_error_message: self.policy.error_message.clone(),
        })
    }

    /// One pass through the render endpoint.
    pub fn handle(&self, actor: &Actor, call: &PreviewCall) -> Result<RenderResult, PreviewError> {
        self.check_call(actor, call).inspect_err(record_rejection)?;

        let value = call.value.as_deref().unwrap_or_default();
        self.check_size(value).inspect_err(record_rejection)?;

        Ok(self.render_markup(value))
    }

    /// Public embed: no token, still subject to the access mode.
    pub fn embed(&self, actor: &Actor, value: Option<&str>) -> Result<String, PreviewError> {
        self.admit(actor).inspect_err(record_rejection)?;
        let value = value.unwrap_or_default();
        self.check_size(value).inspect_err(record_rejection)?;

        let inner = match self.render_markup(value) {
            RenderResult::Markup(markup) => markup,
            RenderResult::Failure(RenderFailure::EmptyInput) => {
                escape_text(&self.policy.empty_message)
            }
            RenderResult::Failure(RenderFailure::Renderer(reason)) => format!(
                r#"<div class="toric preview-error">{}</div>"#,
                escape_text(&reason)
            ),
        };
        Ok(format!(r#"<div class="toric shortcode-output">{inner}</div>"#))
    }

    /// Trim, render under the fixed symbology and sanitize. Empty input never
    /// reaches the renderer.
    pub fn render_markup(&self, value: &str) -> RenderResult {
        let data = value.trim();
        if data.is_empty() {
            record_outcome("empty");
            return RenderResult::Failure(RenderFailure::EmptyInput);
        }

        let started_at = Instant::now();
        let rendered = self.renderer.render(&self.spec, data);
        histogram!(METRIC_PREVIEW_RENDER_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        match rendered {
            Ok(markup) => {
                record_outcome("markup");
                RenderResult::Markup(self.sanitizer.clean(&markup))
            }
            Err(err) => {
                debug!(
                    target: "toric::application::preview",
                    symbology = %self.spec.symbology,
                    error = %err,
                    "renderer rejected input"
                );
                record_outcome("render_error");
                RenderResult::Failure(RenderFailure::Renderer(err.to_string()))
            }
        }
    }

    fn admit(&self, actor: &Actor) -> Result<(), PreviewError> {
        let mode = self.policy.access_mode;
        if mode.admits(actor) {
            Ok(())
        } else {
            Err(PreviewError::Forbidden {
                actor: actor.to_string(),
                mode,
            })
        }
    }

    fn check_call(&self, actor: &Actor, call: &PreviewCall) -> Result<(), PreviewError> {
        self.admit(actor)?;

        let action = call.action.as_deref().unwrap_or_default();
        if action != self.policy.action {
            return Err(PreviewError::UnknownAction(action.to_string()));
        }

        let nonce = call
            .nonce
            .as_deref()
            .map(str::trim)
            .filter(|nonce| !nonce.is_empty())
            .ok_or(PreviewError::NoToken)?;

        self.tokens
            .verify(nonce, actor, &self.policy.action)
            .map_err(PreviewError::TokenInvalid)
    }

    fn check_size(&self, value: &str) -> Result<(), PreviewError> {
        let len = value.trim().len();
        let limit = self.policy.max_input_bytes;
        if len > limit {
            return Err(PreviewError::InputTooLarge { len, limit });
        }
        Ok(())
    }
}

fn record_outcome(outcome: &'static str) {
    counter!(METRIC_PREVIEW_REQUESTS, "outcome" => outcome).increment(1);
}

fn record_rejection(err: &PreviewError) {
    record_outcome(err.outcome());
}
