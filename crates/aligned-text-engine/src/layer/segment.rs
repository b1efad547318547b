//! Segment arena and the doubly linked chain threaded through it.
//!
//! Segments live in a [`SlotMap`] so that a [`SegmentKey`] stays valid while
//! neighbours are split, inserted or removed. Links between segments are keys,
//! and an oblique segment refers to anchors of the underlying layer by their
//! keys in that layer's arena.

use serde::Serialize;
use slotmap::SlotMap;

use crate::error::{AlignError, Result};

slotmap::new_key_type! {
    /// Stable handle of a segment inside one layer's arena.
    pub struct SegmentKey;
}

/// What a segment holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SegmentKind {
    /// Literal text owned by this layer.
    Base(String),
    /// View of the underlying layer between two of its anchors.
    Oblique { start: SegmentKey, end: SegmentKey },
    /// Zero-width marker.
    Anchor,
}

impl SegmentKind {
    pub(crate) fn is_anchor(&self) -> bool {
        matches!(self, SegmentKind::Anchor)
    }

    pub(crate) fn kind_tag(&self) -> SegmentTag {
        match self {
            SegmentKind::Base(_) => SegmentTag::Base,
            SegmentKind::Oblique { .. } => SegmentTag::Oblique,
            SegmentKind::Anchor => SegmentTag::Anchor,
        }
    }
}

/// Public, data-free description of a segment variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SegmentTag {
    Base,
    Oblique,
    Anchor,
}

impl std::fmt::Display for SegmentTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SegmentTag::Base => "base",
            SegmentTag::Oblique => "oblique",
            SegmentTag::Anchor => "anchor",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
pub(crate) struct Segment {
    pub(crate) kind: SegmentKind,
    prev: Option<SegmentKey>,
    next: Option<SegmentKey>,
}

/// Segments of one layer, bounded by head and tail sentinel anchors.
#[derive(Debug)]
pub(crate) struct Chain {
    arena: SlotMap<SegmentKey, Segment>,
    head: SegmentKey,
    tail: SegmentKey,
}

impl Chain {
    /// An empty chain holding only the two sentinels.
    pub(crate) fn new() -> Self {
        let mut arena = SlotMap::with_key();
        let head = arena.insert(Segment {
            kind: SegmentKind::Anchor,
            prev: None,
            next: None,
        });
        let tail = arena.insert(Segment {
            kind: SegmentKind::Anchor,
            prev: Some(head),
            next: None,
        });
        arena[head].next = Some(tail);
        Self { arena, head, tail }
    }

    pub(crate) fn head(&self) -> SegmentKey {
        self.head
    }

    pub(crate) fn tail(&self) -> SegmentKey {
        self.tail
    }

    pub(crate) fn contains(&self, key: SegmentKey) -> bool {
        self.arena.contains_key(key)
    }

    pub(crate) fn kind(&self, key: SegmentKey) -> &SegmentKind {
        &self.arena[key].kind
    }

    pub(crate) fn next(&self, key: SegmentKey) -> Option<SegmentKey> {
        self.arena[key].next
    }

    pub(crate) fn prev(&self, key: SegmentKey) -> Option<SegmentKey> {
        self.arena[key].prev
    }

    /// Number of segments including the sentinels.
    pub(crate) fn segment_count(&self) -> usize {
        self.arena.len()
    }

    /// Walks the chain from head to tail, sentinels included.
    pub(crate) fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cursor: Some(self.head),
        }
    }

    /// Links a new segment in front of `at`. `at` must not be the head.
    pub(crate) fn insert_before(&mut self, at: SegmentKey, kind: SegmentKind) -> SegmentKey {
        debug_assert_ne!(at, self.head, "nothing may precede the head sentinel");
        let prev = self.arena[at].prev;
        let key = self.arena.insert(Segment {
            kind,
            prev,
            next: Some(at),
        });
        self.arena[at].prev = Some(key);
        if let Some(prev) = prev {
            self.arena[prev].next = Some(key);
        }
        key
    }

    /// Links a new segment behind `at`. `at` must not be the tail.
    pub(crate) fn insert_after(&mut self, at: SegmentKey, kind: SegmentKind) -> SegmentKey {
        debug_assert_ne!(at, self.tail, "nothing may follow the tail sentinel");
        let next = self.arena[at].next;
        let key = self.arena.insert(Segment {
            kind,
            prev: Some(at),
            next,
        });
        self.arena[at].next = Some(key);
        if let Some(next) = next {
            self.arena[next].prev = Some(key);
        }
        key
    }

    /// Unlinks a content segment and frees its slot.
    ///
    /// Anchors are load-bearing for dependent layers and are never removed.
    pub(crate) fn remove(&mut self, key: SegmentKey) -> Result<SegmentKind> {
        let segment = self.arena.get(key).ok_or(AlignError::StaleSegment)?;
        if segment.kind.is_anchor() {
            return Err(AlignError::UnsupportedAnchorDeletion);
        }
        let (prev, next) = (segment.prev, segment.next);
        if let Some(prev) = prev {
            self.arena[prev].next = next;
        }
        if let Some(next) = next {
            self.arena[next].prev = prev;
        }
        self.arena
            .remove(key)
            .map(|segment| segment.kind)
            .ok_or(AlignError::StaleSegment)
    }

    /// Splits a base segment `at` bytes into its text. The prefix keeps the
    /// key; the suffix becomes a new segment whose key is returned.
    pub(crate) fn split_base(&mut self, key: SegmentKey, at: usize) -> SegmentKey {
        let suffix = match &mut self.arena[key].kind {
            SegmentKind::Base(text) => text.split_off(at),
            other => unreachable!("split_base called on {:?}", other.kind_tag()),
        };
        self.insert_after(key, SegmentKind::Base(suffix))
    }

    /// Points an oblique segment's end at a different underlying anchor.
    pub(crate) fn set_oblique_end(&mut self, key: SegmentKey, new_end: SegmentKey) {
        if let SegmentKind::Oblique { end, .. } = &mut self.arena[key].kind {
            *end = new_end;
        }
    }

    /// Drops base segments that no longer hold any text.
    pub(crate) fn prune_empty(&mut self) -> usize {
        let empty: Vec<SegmentKey> = self
            .iter()
            .filter(|&key| matches!(self.kind(key), SegmentKind::Base(text) if text.is_empty()))
            .collect();
        for &key in &empty {
            // Base segments are never anchors, so removal cannot fail.
            let _ = self.remove(key);
        }
        empty.len()
    }
}

pub(crate) struct ChainIter<'a> {
    chain: &'a Chain,
    cursor: Option<SegmentKey>,
}

impl Iterator for ChainIter<'_> {
    type Item = SegmentKey;

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        self.cursor = self.chain.next(key);
        Some(key)
    }
}
