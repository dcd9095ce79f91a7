//! Types shared by the render endpoint and the preview controller.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Response header that tells clients how to interpret a render reply body.
pub const RESULT_HEADER: &str = "x-toric-result";

/// Monotonic identifier the preview controller assigns to each issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One user input event that the controller turns into a render call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub id: RequestId,
    pub input: String,
}

/// Form payload of a render call.
///
/// Every field is optional on the wire so the endpoint can tell a missing
/// token apart from a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl PreviewCall {
    pub fn new(action: impl Into<String>, nonce: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            action: Some(action.into()),
            nonce: Some(nonce.into()),
            value: Some(value.into()),
        }
    }
}

/// Why a render produced no markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderFailure {
    /// The trimmed input was empty; a neutral state, not an error.
    EmptyInput,
    /// The external renderer rejected the input.
    Renderer(String),
}

impl Display for RenderFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput => f.write_str("please enter details"),
            Self::Renderer(reason) => f.write_str(reason),
        }
    }
}

/// Outcome of a single pass through the render endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    /// Sanitized SVG fragment.
    Markup(String),
    Failure(RenderFailure),
}

impl RenderResult {
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Markup(_) => ResultKind::Markup,
            Self::Failure(RenderFailure::EmptyInput) => ResultKind::Empty,
            Self::Failure(RenderFailure::Renderer(_)) => ResultKind::Error,
        }
    }
}

/// Envelope tag carried in [`RESULT_HEADER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Markup,
    Empty,
    Error,
}

impl ResultKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Markup => "markup",
            Self::Empty => "empty",
            Self::Error => "error",
        }
    }
}

impl FromStr for ResultKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "markup" => Ok(Self::Markup),
            "empty" => Ok(Self::Empty),
            "error" => Ok(Self::Error),
            _ => Err(()),
        }
    }
}

/// Values a page hands to its preview client when it is rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewBootstrap {
    pub ajax_url: String,
    pub action: String,
    pub nonce: String,
    pub code_retrieval_error_message: String,
}
