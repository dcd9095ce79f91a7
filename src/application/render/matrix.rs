use std::fmt::Write as _;

use super::escape::escape_text;
use crate::domain::symbology::SymbologySpec;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Row-major grid of dark (`true`) and light modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ModuleMatrix {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl ModuleMatrix {
    /// `cells.len()` must equal `width * height`.
    pub(super) fn new(width: usize, height: usize, cells: Vec<bool>) -> Self {
        debug_assert_eq!(cells.len(), width * height);
        Self {
            width,
            height,
            cells,
        }
    }

    #[cfg(test)]
    pub(super) fn width(&self) -> usize {
        self.width
    }

    fn is_dark(&self, x: usize, y: usize) -> bool {
        self.cells[y * self.width + x]
    }

    /// Horizontal runs of dark modules as `(x, y, length)`.
    fn dark_runs(&self) -> Vec<(usize, usize, usize)> {
        let mut runs = Vec::new();
        for y in 0..self.height {
            let mut x = 0;
            while x < self.width {
                if !self.is_dark(x, y) {
                    x += 1;
                    continue;
                }
                let start = x;
                while x < self.width && self.is_dark(x, y) {
                    x += 1;
                }
                runs.push((start, y, x - start));
            }
        }
        runs
    }

    /// Serialize as an SVG fragment made only of `svg`, `desc`, `rect` and `g`.
    pub(super) fn to_svg(&self, spec: &SymbologySpec, description: &str) -> String {
        let unit = spec.module_size as usize;
        let padding = spec.padding;
        let total_width = (self.width + (padding.left + padding.right) as usize) * unit;
        let total_height = (self.height + (padding.top + padding.bottom) as usize) * unit;
        let offset_x = padding.left as usize * unit;
        let offset_y = padding.top as usize * unit;

        let mut svg = String::with_capacity(256 + self.cells.len() * 8);
        let _ = write!(
            svg,
            r#"<svg xmlns="{SVG_NAMESPACE}" version="1.1" width="{total_width}" height="{total_height}" viewBox="0 0 {total_width} {total_height}">"#
        );
        let _ = write!(svg, "<desc>{}</desc>", escape_text(description));
        let _ = write!(
            svg,
            r#"<rect x="0" y="0" width="{total_width}" height="{total_height}" fill="{}" stroke="none" stroke-width="0" stroke-linecap="square"/>"#,
            spec.background
        );
        let _ = write!(
            svg,
            r#"<g id="bars" fill="{}" stroke="none" stroke-width="0" stroke-linecap="square">"#,
            spec.foreground
        );
        for (x, y, len) in self.dark_runs() {
            let _ = write!(
                svg,
                r#"<rect x="{}" y="{}" width="{}" height="{unit}"/>"#,
                offset_x + x * unit,
                offset_y + y * unit,
                len * unit
            );
        }
        svg.push_str("</g></svg>");
        svg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::symbology::Padding;

    fn spec(module_size: u32, padding: u32) -> SymbologySpec {
        SymbologySpec {
            module_size,
            padding: Padding::uniform(padding),
            ..SymbologySpec::default()
        }
    }

    #[test]
    fn merges_adjacent_dark_modules_into_runs() {
        let matrix = ModuleMatrix::new(4, 2, vec![true, true, false, true, false, false, false, false]);
        assert_eq!(matrix.dark_runs(), vec![(0, 0, 2), (3, 0, 1)]);
    }

    #[test]
    fn scales_and_offsets_by_padding() {
        let matrix = ModuleMatrix::new(1, 1, vec![true]);
        let svg = matrix.to_svg(&spec(4, 1), "x");

        assert!(svg.contains(r#"width="12" height="12" viewBox="0 0 12 12""#));
        assert!(svg.contains(r#"<rect x="4" y="4" width="4" height="4"/>"#));
    }

    #[test]
    fn escapes_description_text() {
        let matrix = ModuleMatrix::new(1, 1, vec![false]);
        let svg = matrix.to_svg(&spec(1, 0), "<script>");

        assert!(!svg.contains("<script>"));
        assert!(svg.contains("&lt;script&gt;"));
    }
}
