//! # Layers
//!
//! A [`Layer`] is one version of a text, stored as a chain of segments:
//!
//! - **base** segments own literal text,
//! - **oblique** segments are views onto a range of the underlying layer,
//!   delimited by two anchors of that layer,
//! - **anchors** are zero-width markers that other layers can point at.
//!
//! A base layer is built from raw text. [`Layer::derive_from`] builds a new
//! layer on top of an existing one; it starts as a single oblique segment
//! spanning the whole underlying text. Edits on the derived layer replace
//! parts of that view with owned text while untouched parts keep pointing at
//! the layer below, which is what lets offsets travel between layers (see
//! [`Layer::resolve`] and [`Layer::inverse_resolve`]).
//!
//! ```text
//! base:    |"Hello, World!"|
//! derived: |oblique[0..5)|oblique[6..13)|      text: "Hello World!"
//! ```
//!
//! Layers are cheap reference-counted handles. A derived layer keeps its
//! underlying layer alive; the underlying layer only keeps a weak entry for
//! each derived layer so it can invalidate their caches when it changes.
//! Layers are single-threaded (`!Send`).

mod cache;
mod resolve;
pub(crate) mod segment;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use slotmap::SecondaryMap;

use crate::edits::Edit;
use crate::error::{AlignError, Result};
use crate::interval::Interval;

use cache::{Dependents, LayerCache};
use segment::{Chain, SegmentKey, SegmentKind};
pub use segment::SegmentTag;

/// Process-unique identity of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LayerId(u64);

impl LayerId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to one segment of a layer.
///
/// Handles stay valid while other segments are edited; a handle to a segment
/// that was removed reports [`AlignError::StaleSegment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentRef {
    layer: LayerId,
    key: SegmentKey,
}

impl SegmentRef {
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

/// Handle to an anchor. Two handles compare equal iff they denote the same
/// anchor of the same layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Anchor {
    layer: LayerId,
    key: SegmentKey,
}

impl Anchor {
    #[must_use]
    pub fn layer(&self) -> LayerId {
        self.layer
    }
}

impl From<Anchor> for SegmentRef {
    fn from(anchor: Anchor) -> Self {
        Self {
            layer: anchor.layer,
            key: anchor.key,
        }
    }
}

/// Materialized description of one segment, for inspection and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentView {
    pub kind: SegmentTag,
    /// Span in this layer's coordinates.
    pub span: Interval,
    /// Span in the underlying layer, for oblique segments.
    pub underlying: Option<Interval>,
    pub text: String,
}

pub(crate) struct LayerNode {
    pub(crate) id: LayerId,
    pub(crate) underlying: Option<Layer>,
    pub(crate) chain: RefCell<Chain>,
    pub(crate) cache: LayerCache,
    pub(crate) dependents: Dependents,
}

impl Drop for LayerNode {
    fn drop(&mut self) {
        if let Some(underlying) = &self.underlying {
            underlying.node.dependents.deregister(self.id);
            log::debug!(
                "layer {} dropped, deregistered from layer {}",
                self.id,
                underlying.node.id
            );
        }
    }
}

impl LayerNode {
    fn ensure_offsets(&self) {
        if self.cache.offsets.borrow().is_some() {
            return;
        }
        // Oblique lengths read the underlying offsets, so those go first.
        if let Some(underlying) = &self.underlying {
            underlying.node.ensure_offsets();
        }
        let chain = self.chain.borrow();
        let mut offsets = SecondaryMap::with_capacity(chain.segment_count());
        let mut pos = 0;
        for key in chain.iter() {
            offsets.insert(key, pos);
            pos += self.segment_len(&chain, key);
        }
        self.cache.offsets.replace(Some(offsets));
    }

    /// Start offset of a segment known to be in the chain.
    pub(crate) fn start_of(&self, key: SegmentKey) -> usize {
        self.ensure_offsets();
        self.cache
            .offsets
            .borrow()
            .as_ref()
            .map_or(0, |offsets| offsets[key])
    }

    pub(crate) fn length(&self) -> usize {
        let tail = self.chain.borrow().tail();
        self.start_of(tail)
    }

    fn segment_len(&self, chain: &Chain, key: SegmentKey) -> usize {
        match chain.kind(key) {
            SegmentKind::Base(text) => text.len(),
            SegmentKind::Anchor => 0,
            SegmentKind::Oblique { start, end } => self.oblique_span(*start, *end).len(),
        }
    }

    /// Underlying span covered by an oblique segment.
    fn oblique_span(&self, start: SegmentKey, end: SegmentKey) -> Interval {
        match &self.underlying {
            Some(underlying) => {
                let span = Interval::new(
                    underlying.node.start_of(start),
                    underlying.node.start_of(end),
                );
                debug_assert!(
                    span.start <= span.end,
                    "oblique segment ends before it starts"
                );
                span
            }
            None => unreachable!("oblique segment in base layer {}", self.id),
        }
    }

    pub(crate) fn text(&self) -> Rc<str> {
        if let Some(text) = self.cache.text.borrow().as_ref() {
            return Rc::clone(text);
        }
        let below = self.underlying.as_ref().map(|underlying| underlying.node.text());
        let mut out = String::with_capacity(self.length());
        let chain = self.chain.borrow();
        for key in chain.iter() {
            match chain.kind(key) {
                SegmentKind::Base(text) => out.push_str(text),
                SegmentKind::Oblique { start, end } => {
                    if let Some(below) = &below {
                        out.push_str(&below[self.oblique_span(*start, *end).as_range()]);
                    }
                }
                SegmentKind::Anchor => {}
            }
        }
        let text: Rc<str> = out.into();
        self.cache.text.replace(Some(Rc::clone(&text)));
        text
    }

    /// First segment starting exactly at `pos`, else the segment that
    /// strictly covers it, with its start offset.
    fn locate(&self, pos: usize) -> (SegmentKey, usize) {
        let chain = self.chain.borrow();
        let mut cursor = chain.next(chain.head());
        while let Some(key) = cursor {
            let start = self.start_of(key);
            if start == pos || (start < pos && pos < start + self.segment_len(&chain, key)) {
                return (key, start);
            }
            cursor = chain.next(key);
        }
        let tail = chain.tail();
        (tail, self.start_of(tail))
    }

    /// Content-bearing segment covering `pos`, or the tail at the end.
    pub(crate) fn covering(&self, chain: &Chain, pos: usize) -> (SegmentKey, usize) {
        for key in chain.iter() {
            let start = self.start_of(key);
            let len = self.segment_len(chain, key);
            if len > 0 && start <= pos && pos < start + len {
                return (key, start);
            }
        }
        let tail = chain.tail();
        (tail, self.start_of(tail))
    }

    /// Splits `key` (starting at `start`) so that a segment begins at `pos`
    /// and returns that segment.
    fn split_segment(&self, key: SegmentKey, start: usize, pos: usize) -> Result<SegmentKey> {
        let (oblique, len) = {
            let chain = self.chain.borrow();
            let oblique = match chain.kind(key) {
                SegmentKind::Anchor if pos == start => return Ok(key),
                SegmentKind::Anchor => {
                    return Err(AlignError::SplitMisaligned {
                        position: pos,
                        anchor_position: start,
                    });
                }
                SegmentKind::Base(_) => None,
                SegmentKind::Oblique { start, end } => Some((*start, *end)),
            };
            (oblique, self.segment_len(&chain, key))
        };
        if pos == start {
            return Ok(key);
        }
        if pos < start || pos >= start + len {
            return Err(AlignError::OutOfBounds {
                position: pos,
                length: self.length(),
            });
        }

        let suffix = match (oblique, &self.underlying) {
            (Some((below_start, below_end)), Some(underlying)) => {
                let below_pos = underlying.node.start_of(below_start) + (pos - start);
                // Mutates (and invalidates) the layer below; our chain must
                // not be borrowed while that happens.
                let middle = underlying.node.anchor_at(below_pos)?;
                let mut chain = self.chain.borrow_mut();
                chain.set_oblique_end(key, middle);
                chain.insert_after(
                    key,
                    SegmentKind::Oblique {
                        start: middle,
                        end: below_end,
                    },
                )
            }
            _ => self.chain.borrow_mut().split_base(key, pos - start),
        };
        log::trace!("layer {}: split segment at {pos}", self.id);
        self.invalidate();
        Ok(suffix)
    }

    /// Makes sure a segment boundary exists at `pos` and returns the first
    /// segment after it.
    fn split_at(&self, pos: usize) -> Result<SegmentKey> {
        let (key, start) = self.locate(pos);
        self.split_segment(key, start, pos)
    }

    /// Anchor at `pos`, created if needed. `pos` must already be validated.
    pub(crate) fn anchor_at(&self, pos: usize) -> Result<SegmentKey> {
        if pos == 0 {
            return Ok(self.chain.borrow().head());
        }
        let cut = self.split_at(pos)?;
        if self.chain.borrow().kind(cut).is_anchor() {
            return Ok(cut);
        }
        let anchor = self.chain.borrow_mut().insert_before(cut, SegmentKind::Anchor);
        log::trace!("layer {}: new anchor at {pos}", self.id);
        self.invalidate();
        Ok(anchor)
    }

    fn view(&self, chain: &Chain, key: SegmentKey) -> SegmentView {
        let start = self.start_of(key);
        let (underlying, text) = match chain.kind(key) {
            SegmentKind::Base(text) => (None, text.clone()),
            SegmentKind::Anchor => (None, String::new()),
            SegmentKind::Oblique { start, end } => {
                let span = self.oblique_span(*start, *end);
                let text = self
                    .underlying
                    .as_ref()
                    .map(|underlying| underlying.node.text()[span.as_range()].to_string())
                    .unwrap_or_default();
                (Some(span), text)
            }
        };
        SegmentView {
            kind: chain.kind(key).kind_tag(),
            span: Interval::new(start, start + self.segment_len(chain, key)),
            underlying,
            text,
        }
    }
}

/// One version of a text; see the [module documentation](self).
#[derive(Clone)]
pub struct Layer {
    node: Rc<LayerNode>,
}

impl Layer {
    /// A base layer holding `text`.
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let mut chain = Chain::new();
        if !text.is_empty() {
            let tail = chain.tail();
            chain.insert_before(tail, SegmentKind::Base(text));
        }
        let node = Rc::new(LayerNode {
            id: LayerId::next(),
            underlying: None,
            chain: RefCell::new(chain),
            cache: LayerCache::default(),
            dependents: Dependents::default(),
        });
        log::debug!("created base layer {}", node.id);
        Self { node }
    }

    /// A layer on top of `underlying`, initially showing its whole text.
    pub fn derive_from(underlying: &Layer) -> Self {
        let (below_head, below_tail) = {
            let chain = underlying.node.chain.borrow();
            (chain.head(), chain.tail())
        };
        let mut chain = Chain::new();
        let tail = chain.tail();
        chain.insert_before(
            tail,
            SegmentKind::Oblique {
                start: below_head,
                end: below_tail,
            },
        );
        let node = Rc::new(LayerNode {
            id: LayerId::next(),
            underlying: Some(underlying.clone()),
            chain: RefCell::new(chain),
            cache: LayerCache::default(),
            dependents: Dependents::default(),
        });
        underlying
            .node
            .dependents
            .register(node.id, Rc::downgrade(&node));
        log::debug!("derived layer {} from layer {}", node.id, underlying.node.id);
        Self { node }
    }

    /// Derives a new layer and applies `edits` to it.
    pub fn rewrite(&self, edits: impl IntoIterator<Item = Edit>) -> Result<Layer> {
        let mut derived = Layer::derive_from(self);
        derived.apply_edits(edits)?;
        Ok(derived)
    }

    #[must_use]
    pub fn id(&self) -> LayerId {
        self.node.id
    }

    #[must_use]
    pub fn underlying(&self) -> Option<&Layer> {
        self.node.underlying.as_ref()
    }

    #[must_use]
    pub fn is_base(&self) -> bool {
        self.node.underlying.is_none()
    }

    /// Number of live layers derived directly from this one.
    #[must_use]
    pub fn dependent_count(&self) -> usize {
        self.node.dependents.len()
    }

    /// The full text of this layer. Cached until the next change here or
    /// in any layer below.
    #[must_use]
    pub fn text(&self) -> Rc<str> {
        self.node.text()
    }

    #[must_use]
    pub fn length(&self) -> usize {
        self.node.length()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length() == 0
    }

    pub fn text_range(&self, interval: Interval) -> Result<String> {
        self.check_edit_span(interval)?;
        Ok(self.text()[interval.as_range()].to_string())
    }

    pub fn insert(&mut self, pos: usize, text: &str) -> Result<()> {
        self.check_edit_position(pos)?;
        if text.is_empty() {
            return Ok(());
        }
        let cut = self.node.split_at(pos)?;
        self.node
            .chain
            .borrow_mut()
            .insert_before(cut, SegmentKind::Base(text.to_owned()));
        log::trace!("layer {}: inserted {} bytes at {pos}", self.node.id, text.len());
        self.node.invalidate();
        Ok(())
    }

    pub fn delete(&mut self, start: usize, end: usize) -> Result<()> {
        self.replace(start, end, "")
    }

    /// Replaces `[start, end)` with `text`.
    ///
    /// Content segments inside the range are dropped; anchors inside it are
    /// kept because derived layers may still point at them. An empty `text`
    /// deletes the range.
    pub fn replace(&mut self, start: usize, end: usize, text: &str) -> Result<()> {
        self.check_edit_span(Interval::new(start, end))?;
        if start == end {
            return self.insert(start, text);
        }
        let first = self.node.split_at(start)?;
        let boundary = self.node.split_at(end)?;
        {
            let mut chain = self.node.chain.borrow_mut();
            let mut cursor = Some(first);
            while let Some(key) = cursor {
                if key == boundary {
                    break;
                }
                cursor = chain.next(key);
                if !chain.kind(key).is_anchor() {
                    chain.remove(key)?;
                }
            }
            if !text.is_empty() {
                chain.insert_before(boundary, SegmentKind::Base(text.to_owned()));
            }
            chain.prune_empty();
        }
        log::trace!(
            "layer {}: replaced [{start}, {end}) with {} bytes",
            self.node.id,
            text.len()
        );
        self.node.invalidate();
        Ok(())
    }

    /// Applies edits expressed in this layer's current coordinates.
    ///
    /// Edits are applied right to left so that earlier ones keep their
    /// offsets. Overlapping or out-of-range edits are rejected before
    /// anything changes. Returns the number of edits applied.
    pub fn apply_edits(&mut self, edits: impl IntoIterator<Item = Edit>) -> Result<usize> {
        let mut edits: Vec<Edit> = edits.into_iter().collect();
        edits.sort_by_key(|edit| edit.span);
        for pair in edits.windows(2) {
            if pair[0].span.end > pair[1].span.start {
                return Err(AlignError::OverlappingEdits {
                    first: pair[0].span,
                    second: pair[1].span,
                });
            }
        }
        for edit in &edits {
            self.check_edit_span(edit.span)?;
        }
        for edit in edits.iter().rev() {
            self.replace(edit.span.start, edit.span.end, &edit.replacement)?;
        }
        Ok(edits.len())
    }

    /// The anchor at `pos`, creating it if necessary. `0` is always the
    /// head sentinel.
    pub fn get_anchor(&mut self, pos: usize) -> Result<Anchor> {
        self.check_edit_position(pos)?;
        let key = self.node.anchor_at(pos)?;
        Ok(Anchor {
            layer: self.node.id,
            key,
        })
    }

    /// Current offset of an anchor of this layer.
    pub fn anchor_position(&self, anchor: &Anchor) -> Result<usize> {
        let key = self.key_of(SegmentRef::from(*anchor))?;
        Ok(self.node.start_of(key))
    }

    /// The segment covering `pos`.
    ///
    /// With `include_anchors`, an anchor sitting exactly at `pos` is
    /// returned instead. `pos == length()` yields the tail sentinel.
    pub fn segment_at(&self, pos: usize, include_anchors: bool) -> Result<SegmentRef> {
        self.check_position(pos)?;
        let chain = self.node.chain.borrow();
        let key = chain
            .iter()
            .find(|&key| {
                include_anchors
                    && chain.kind(key).is_anchor()
                    && self.node.start_of(key) == pos
            })
            .unwrap_or_else(|| self.node.covering(&chain, pos).0);
        Ok(self.segment_ref(key))
    }

    pub fn segment(&self, segment: SegmentRef) -> Result<SegmentView> {
        let key = self.key_of(segment)?;
        let chain = self.node.chain.borrow();
        Ok(self.node.view(&chain, key))
    }

    /// Content-bearing segments in order, anchors skipped.
    #[must_use]
    pub fn segments(&self) -> Vec<SegmentView> {
        self.structure()
            .into_iter()
            .filter(|view| view.kind != SegmentTag::Anchor)
            .collect()
    }

    /// Every segment of the chain in order, sentinels and anchors included.
    #[must_use]
    pub fn structure(&self) -> Vec<SegmentView> {
        let chain = self.node.chain.borrow();
        chain.iter().map(|key| self.node.view(&chain, key)).collect()
    }

    /// Next content-bearing segment after `segment`.
    pub fn next_segment(&self, segment: SegmentRef) -> Result<Option<SegmentRef>> {
        let key = self.key_of(segment)?;
        let chain = self.node.chain.borrow();
        let next = std::iter::successors(chain.next(key), |&key| chain.next(key))
            .find(|&key| !chain.kind(key).is_anchor());
        Ok(next.map(|key| self.segment_ref(key)))
    }

    /// Previous content-bearing segment before `segment`.
    pub fn previous_segment(&self, segment: SegmentRef) -> Result<Option<SegmentRef>> {
        let key = self.key_of(segment)?;
        let chain = self.node.chain.borrow();
        let prev = std::iter::successors(chain.prev(key), |&key| chain.prev(key))
            .find(|&key| !chain.kind(key).is_anchor());
        Ok(prev.map(|key| self.segment_ref(key)))
    }

    /// Splits `segment` so that a segment starts at `pos`, returning it.
    ///
    /// Splitting at a segment's own start returns the segment unchanged.
    /// Anchors can only be "split" at their own position.
    pub fn split(&mut self, segment: SegmentRef, pos: usize) -> Result<SegmentRef> {
        let key = self.key_of(segment)?;
        let start = self.node.start_of(key);
        if !self.node.chain.borrow().kind(key).is_anchor() {
            self.check_edit_position(pos)?;
        }
        let suffix = self.node.split_segment(key, start, pos)?;
        Ok(self.segment_ref(suffix))
    }

    /// Removes one content segment from the chain.
    ///
    /// Anchors cannot be removed this way; use [`Layer::replace`] for span
    /// edits, which keeps anchors intact.
    pub fn remove_segment(&mut self, segment: SegmentRef) -> Result<()> {
        let key = self.key_of(segment)?;
        {
            let mut chain = self.node.chain.borrow_mut();
            chain.remove(key)?;
            chain.prune_empty();
        }
        self.node.invalidate();
        Ok(())
    }

    fn segment_ref(&self, key: SegmentKey) -> SegmentRef {
        SegmentRef {
            layer: self.node.id,
            key,
        }
    }

    fn key_of(&self, segment: SegmentRef) -> Result<SegmentKey> {
        if segment.layer != self.node.id {
            return Err(AlignError::ForeignSegment);
        }
        if !self.node.chain.borrow().contains(segment.key) {
            return Err(AlignError::StaleSegment);
        }
        Ok(segment.key)
    }

    fn check_position(&self, pos: usize) -> Result<()> {
        let length = self.length();
        if pos > length {
            return Err(AlignError::OutOfBounds {
                position: pos,
                length,
            });
        }
        Ok(())
    }

    /// Bounds check plus the UTF-8 boundary check needed before splitting.
    fn check_edit_position(&self, pos: usize) -> Result<()> {
        self.check_position(pos)?;
        if !self.text().is_char_boundary(pos) {
            return Err(AlignError::NotCharBoundary { position: pos });
        }
        Ok(())
    }

    pub(crate) fn check_span(&self, interval: Interval) -> Result<()> {
        if interval.start > interval.end {
            return Err(AlignError::InvalidInterval {
                start: interval.start,
                end: interval.end,
            });
        }
        self.check_position(interval.end)
    }

    fn check_edit_span(&self, interval: Interval) -> Result<()> {
        self.check_span(interval)?;
        self.check_edit_position(interval.start)?;
        self.check_edit_position(interval.end)
    }

    #[cfg(test)]
    pub(crate) fn is_clean(&self) -> bool {
        self.node.cache.is_clean()
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layer")
            .field("id", &self.node.id)
            .field("underlying", &self.underlying().map(Layer::id))
            .field("text", &self.text())
            .finish()
    }
}
