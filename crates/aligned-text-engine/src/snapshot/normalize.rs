use std::fmt::Write as _;

use serde::Serialize;

use crate::layer::{Layer, LayerId, SegmentTag, SegmentView};

const PREVIEW_WIDTH: usize = 40;

#[derive(Debug, Serialize)]
pub struct Snap {
    pub layer: LayerId,
    pub underlying: Option<LayerId>,
    pub text: String,
    pub segments: Vec<SegmentSnap>,
}

#[derive(Debug, Serialize)]
pub struct SegmentSnap {
    pub kind: String,
    pub span: (usize, usize),
    pub underlying: Option<(usize, usize)>,
    pub text: String,
}

/// Extracts text for a segment, truncating to `max` bytes (on a character
/// boundary) with "..." suffix if needed.
fn preview(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut cut = max;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &text[..cut])
}

fn snap_segment(view: &SegmentView) -> SegmentSnap {
    SegmentSnap {
        kind: view.kind.to_string(),
        span: (view.span.start, view.span.end),
        underlying: view.underlying.map(|span| (span.start, span.end)),
        text: preview(&view.text, PREVIEW_WIDTH),
    }
}

/// Every segment of `layer`, sentinels included, in chain order.
pub fn normalize(layer: &Layer) -> Snap {
    Snap {
        layer: layer.id(),
        underlying: layer.underlying().map(Layer::id),
        text: layer.text().to_string(),
        segments: layer.structure().iter().map(snap_segment).collect(),
    }
}

/// Renders the chain as one line per segment:
///
/// ```text
/// anchor 0..0
/// oblique 0..5 <- 0..5 "Hello"
/// base 5..6 ";"
/// anchor 6..6
/// ```
pub fn render(layer: &Layer) -> String {
    let mut out = String::new();
    for view in layer.structure() {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = write!(out, "{} {}..{}", view.kind, view.span.start, view.span.end);
        if let Some(below) = view.underlying {
            let _ = write!(out, " <- {}..{}", below.start, below.end);
        }
        if view.kind != SegmentTag::Anchor && !view.text.is_empty() {
            let _ = write!(out, " {:?}", preview(&view.text, PREVIEW_WIDTH));
        }
    }
    out
}
