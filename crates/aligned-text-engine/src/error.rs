use thiserror::Error;

use crate::interval::Interval;

/// Errors raised by layer mutation and offset resolution.
///
/// Everything except [`AlignError::ResolveInversion`] is a recoverable
/// error caused by a bad argument. `ResolveInversion` is a defect in the
/// structure itself; debug builds panic before it is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignError {
    #[error("offset {position} is out of bounds (layer length: {length})")]
    OutOfBounds { position: usize, length: usize },

    #[error("interval start {start} is after its end {end}")]
    InvalidInterval { start: usize, end: usize },

    #[error("offset {position} is not on a UTF-8 character boundary")]
    NotCharBoundary { position: usize },

    #[error("cannot split anchor at {anchor_position} at offset {position}")]
    SplitMisaligned {
        position: usize,
        anchor_position: usize,
    },

    #[error("anchors cannot be removed from a layer")]
    UnsupportedAnchorDeletion,

    #[error("resolved end {end} precedes resolved start {start}")]
    ResolveInversion { start: usize, end: usize },

    #[error("segment handle no longer refers to a segment of this layer")]
    StaleSegment,

    #[error("segment handle belongs to a different layer")]
    ForeignSegment,

    #[error("layer has no underlying layer")]
    NoUnderlying,

    #[error("layer is not part of this layer's underlying chain")]
    NotInChain,

    #[error("edits {first} and {second} overlap")]
    OverlappingEdits { first: Interval, second: Interval },
}

pub type Result<T> = std::result::Result<T, AlignError>;
