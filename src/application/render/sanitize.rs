use std::collections::{HashMap, HashSet};

use ammonia::Builder as AmmoniaBuilder;

const SVG_ATTRIBUTES: [&str; 6] = ["xmlns", "width", "height", "viewBox", "viewbox", "version"];
const RECT_ATTRIBUTES: [&str; 8] = [
    "x",
    "y",
    "width",
    "height",
    "fill",
    "stroke",
    "stroke-width",
    "stroke-linecap",
];
const GROUP_ATTRIBUTES: [&str; 5] = ["id", "fill", "stroke", "stroke-width", "stroke-linecap"];

/// Allow-list sanitizer for rendered symbols. Anything outside `svg`,
/// `desc`, `rect` and `g` with geometry, color and stroke attributes is
/// stripped; script-capable content is dropped together with its text.
pub struct SvgSanitizer {
    builder: AmmoniaBuilder<'static>,
}

impl SvgSanitizer {
    pub fn new() -> Self {
        Self {
            builder: build_svg_sanitizer(),
        }
    }

    pub fn clean(&self, markup: &str) -> String {
        self.builder.clean(markup).to_string()
    }
}

impl Default for SvgSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn build_svg_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();

    builder.tags(HashSet::from(["svg", "desc", "rect", "g"]));
    builder.generic_attributes(HashSet::new());
    builder.tag_attributes(HashMap::from([
        ("svg", HashSet::from(SVG_ATTRIBUTES)),
        ("desc", HashSet::new()),
        ("rect", HashSet::from(RECT_ATTRIBUTES)),
        ("g", HashSet::from(GROUP_ATTRIBUTES)),
    ]));
    builder.link_rel(None);

    builder
}
