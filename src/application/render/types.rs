use thiserror::Error;

use crate::domain::symbology::SymbologySpec;

/// Reasons a renderer refuses to produce a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RendererError {
    #[error("unable to encode data: {0}")]
    Encoding(String),
    #[error("invalid raw matrix: {reason}")]
    InvalidMatrix { reason: String },
}

impl RendererError {
    pub fn invalid_matrix(reason: impl Into<String>) -> Self {
        Self::InvalidMatrix {
            reason: reason.into(),
        }
    }
}

/// External symbol renderer: turns data into SVG markup under a fixed
/// [`SymbologySpec`]. The output is sanitized by the caller.
pub trait CodeRenderer: Send + Sync {
    fn render(&self, spec: &SymbologySpec, data: &str) -> Result<String, RendererError>;
}
