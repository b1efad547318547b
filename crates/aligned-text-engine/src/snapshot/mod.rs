//! # Snapshot Testing Support
//!
//! Debug views of a layer's segment chain for tests and diagnostics.
//!
//! ## Modules
//!
//! - **`normalize`**: converts a layer into a stable, serializable `Snap`
//!   and renders it as one line per segment for `insta` snapshots
//! - **`invariants`**: runtime checks for chain correctness (sentinels,
//!   contiguous spans, oblique views matching the layer below, no empty base
//!   segments)
//!
//! None of this is meant for production use; the rendering format may change
//! whenever it helps a test read better.

pub mod invariants;
pub mod normalize;

pub use invariants::check as invariants;
pub use normalize::{SegmentSnap, Snap, normalize, render};
