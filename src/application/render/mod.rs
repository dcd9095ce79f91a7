//! Symbol rendering: data in, SVG fragment out.
//!
//! The encoders only produce a module matrix; serialization to SVG is shared
//! and emits nothing outside the sanitizer's allow-list.

mod escape;
mod matrix;
mod qr;
mod raw;
mod sanitize;
mod types;

pub use escape::escape_text;
pub use sanitize::SvgSanitizer;
pub use types::{CodeRenderer, RendererError};

use crate::domain::symbology::{Symbology, SymbologySpec};

/// Default renderer backed by the `qrcode` crate and the raw-matrix parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolRenderer;

impl CodeRenderer for SymbolRenderer {
    fn render(&self, spec: &SymbologySpec, data: &str) -> Result<String, RendererError> {
        let matrix = match spec.symbology {
            Symbology::QrCode { ec_level } => qr::encode(data, ec_level)?,
            Symbology::Raw2d => raw::parse(data)?,
        };
        Ok(matrix.to_svg(spec, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_qr_symbols_inside_the_allow_list() {
        let svg = SymbolRenderer
            .render(&SymbologySpec::default(), "HELLO")
            .expect("renders");

        assert!(svg.starts_with("<svg"));
        assert!(svg.contains("<desc>HELLO</desc>"));

        let cleaned = SvgSanitizer::new().clean(&svg);
        assert_eq!(cleaned.matches("<rect").count(), svg.matches("<rect").count());
        assert!(cleaned.contains("viewBox="));
        assert!(cleaned.contains(r#"<g id="bars" fill="black""#));
    }

    #[test]
    fn renders_raw_matrices() {
        let spec = SymbologySpec {
            symbology: Symbology::Raw2d,
            ..SymbologySpec::default()
        };
        let svg = SymbolRenderer.render(&spec, "101,010").expect("renders");

        assert!(svg.contains(r#"<g id="bars""#));
        assert_eq!(svg.matches("<rect").count(), 1 + 3);
    }

    #[test]
    fn surfaces_raw_matrix_errors() {
        let spec = SymbologySpec {
            symbology: Symbology::Raw2d,
            ..SymbologySpec::default()
        };
        assert!(matches!(
            SymbolRenderer.render(&spec, "10,1"),
            Err(RendererError::InvalidMatrix { .. })
        ));
    }
}
