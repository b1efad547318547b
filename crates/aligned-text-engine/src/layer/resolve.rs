//! Offset translation between a layer and the layers below it.
//!
//! Resolution is exact on untouched text and snaps on edited text: text
//! inserted by a layer has no counterpart below and collapses onto the gap it
//! was inserted into, while text deleted by a layer resolves upwards to the
//! point where it used to be. Neither direction ever fails on valid input.

use super::segment::{Chain, SegmentKey, SegmentKind};
use super::{Layer, LayerNode};
use crate::error::{AlignError, Result};
use crate::interval::Interval;

/// An oblique segment as seen from both sides.
#[derive(Debug, Clone, Copy)]
struct ObliqueSpan {
    below: Interval,
    start: usize,
}

impl ObliqueSpan {
    fn end(self) -> usize {
        self.start + self.below.len()
    }
}

/// Underlying start of an oblique segment; `None` for anything else.
fn below_start(below: &LayerNode, chain: &Chain, key: SegmentKey) -> Option<usize> {
    match chain.kind(key) {
        SegmentKind::Oblique { start, .. } => Some(below.start_of(*start)),
        _ => None,
    }
}

fn below_end(below: &LayerNode, chain: &Chain, key: SegmentKey) -> Option<usize> {
    match chain.kind(key) {
        SegmentKind::Oblique { end, .. } => Some(below.start_of(*end)),
        _ => None,
    }
}

impl LayerNode {
    fn resolve_start(&self, below: &LayerNode, pos: usize) -> usize {
        let chain = self.chain.borrow();
        let (key, start) = self.covering(&chain, pos);
        if let Some(offset) = below_start(below, &chain, key) {
            return offset + (pos - start);
        }
        // Owned text has no counterpart below: use the end of the nearest
        // view to the left.
        std::iter::successors(chain.prev(key), |&key| chain.prev(key))
            .find_map(|key| below_end(below, &chain, key))
            .unwrap_or(0)
    }

    /// `pos` must be greater than zero; the covering segment is looked up at
    /// `pos - 1` so a run starting exactly at `pos` is never included.
    fn resolve_end(&self, below: &LayerNode, pos: usize) -> usize {
        let chain = self.chain.borrow();
        let (key, start) = self.covering(&chain, pos - 1);
        if let Some(offset) = below_start(below, &chain, key) {
            return offset + (pos - start);
        }
        std::iter::successors(chain.next(key), |&key| chain.next(key))
            .find_map(|key| below_start(below, &chain, key))
            .unwrap_or_else(|| below.length())
    }

    fn oblique_spans(&self) -> Vec<ObliqueSpan> {
        let chain = self.chain.borrow();
        chain
            .iter()
            .filter_map(|key| match chain.kind(key) {
                SegmentKind::Oblique { start, end } => Some(ObliqueSpan {
                    below: self.oblique_span(*start, *end),
                    start: self.start_of(key),
                }),
                _ => None,
            })
            .collect()
    }
}

fn map_start(spans: &[ObliqueSpan], pos: usize, length: usize) -> usize {
    if let Some(span) = spans.iter().find(|span| span.below.contains(pos)) {
        return span.start + (pos - span.below.start);
    }
    // Deleted below-text snaps forward to the next surviving view.
    if let Some(span) = spans.iter().find(|span| span.below.start >= pos) {
        return span.start;
    }
    spans.last().map_or(length, |span| span.end())
}

fn map_end(spans: &[ObliqueSpan], pos: usize) -> usize {
    if let Some(span) = spans
        .iter()
        .find(|span| span.below.start < pos && pos <= span.below.end)
    {
        return span.start + (pos - span.below.start);
    }
    if let Some(span) = spans.iter().rev().find(|span| span.below.end <= pos) {
        return span.end();
    }
    spans.first().map_or(0, |span| span.start)
}

fn inversion(start: usize, end: usize) -> AlignError {
    if cfg!(debug_assertions) {
        panic!("resolved interval is inverted: [{start}, {end})");
    }
    AlignError::ResolveInversion { start, end }
}

impl Layer {
    /// Translates `interval` from this layer to its underlying layer.
    ///
    /// Unedited text maps one to one. Text owned by this layer collapses to
    /// the gap it occupies between views of the layer below, so an interval
    /// spanning a deletion covers the deleted text too.
    pub fn resolve(&self, interval: Interval) -> Result<Interval> {
        let below = self.underlying().ok_or(AlignError::NoUnderlying)?;
        self.check_span(interval)?;
        let start = self.node.resolve_start(&below.node, interval.start);
        let end = if interval.is_empty() {
            start
        } else {
            self.node.resolve_end(&below.node, interval.end)
        };
        if end < start {
            return Err(inversion(start, end));
        }
        log::trace!(
            "layer {}: resolved {interval} to [{start}, {end})",
            self.node.id
        );
        Ok(Interval::new(start, end))
    }

    /// Translates `interval` from the underlying layer up into this layer.
    ///
    /// Positions inside deleted text snap to where that text used to be; an
    /// interval lying entirely in deleted text becomes an empty interval.
    pub fn inverse_resolve(&self, interval: Interval) -> Result<Interval> {
        let below = self.underlying().ok_or(AlignError::NoUnderlying)?;
        below.check_span(interval)?;
        let spans = self.node.oblique_spans();
        let start = map_start(&spans, interval.start, self.length());
        let end = if interval.is_empty() {
            start
        } else {
            map_end(&spans, interval.end).max(start)
        };
        Ok(Interval::new(start, end))
    }

    /// Resolves `interval` down through every layer until `target`.
    pub fn resolve_to(&self, target: &Layer, interval: Interval) -> Result<Interval> {
        let path = self.path_to(target)?;
        if path.is_empty() {
            self.check_span(interval)?;
        }
        path.iter()
            .try_fold(interval, |interval, layer| layer.resolve(interval))
    }

    /// Resolves `interval` down to the bottom of the stack.
    pub fn resolve_to_base(&self, interval: Interval) -> Result<Interval> {
        let base = self.base();
        self.resolve_to(&base, interval)
    }

    /// Maps `interval` from `source` (a layer below this one) up into this
    /// layer.
    pub fn inverse_resolve_from(&self, source: &Layer, interval: Interval) -> Result<Interval> {
        let path = self.path_to(source)?;
        if path.is_empty() {
            self.check_span(interval)?;
        }
        path.iter()
            .rev()
            .try_fold(interval, |interval, layer| layer.inverse_resolve(interval))
    }

    /// The bottom-most layer of the stack this layer sits on.
    #[must_use]
    pub fn base(&self) -> Layer {
        let mut layer = self;
        while let Some(below) = layer.underlying() {
            layer = below;
        }
        layer.clone()
    }

    /// Layers from `self` (inclusive) down to `target` (exclusive).
    fn path_to(&self, target: &Layer) -> Result<Vec<Layer>> {
        let mut path = Vec::new();
        let mut layer = self;
        while layer.id() != target.id() {
            path.push(layer.clone());
            layer = layer.underlying().ok_or(AlignError::NotInChain)?;
        }
        Ok(path)
    }
}
