//! # aligned-text-engine
//!
//! Layered text alignment: rewrite a text (escape, normalize, reshape it)
//! while every offset in the rewritten text stays traceable to the offset it
//! came from in the original, and back.
//!
//! ## Architecture Overview
//!
//! ```text
//! raw text → base Layer ← derived Layer ← derived Layer ...
//!                       (oblique views)  (oblique views)
//! ```
//!
//! ### 1. Segments ([`layer`] module)
//!
//! Each layer is a doubly linked chain of segments kept in an arena: base
//! segments own text, oblique segments view a range of the layer below
//! through two of its anchors, anchors are zero-width markers.
//!
//! ### 2. Editing
//!
//! [`Layer::insert`], [`Layer::delete`] and [`Layer::replace`] split the
//! chain at the edit boundaries and splice in owned text. Anchors inside an
//! edited range always survive, so views from layers above stay valid.
//! [`Layer::apply_edits`] applies a batch of [`Edit`]s given in the layer's
//! pre-edit coordinates.
//!
//! ### 3. Resolution
//!
//! [`Layer::resolve`] maps an interval down to the underlying layer and
//! [`Layer::inverse_resolve`] maps one up. Both are exact on untouched text
//! and snap deterministically around edits.
//!
//! ### 4. Change propagation
//!
//! Text and segment offsets are cached per layer. Any change clears the
//! caches of the changed layer and of every layer derived from it; caches are
//! rebuilt bottom-up on the next read.
//!
//! ## Quick Start
//!
//! ```
//! use aligned_text_engine::{Interval, Layer};
//!
//! let base = Layer::new("Hello, World!");
//! let mut derived = Layer::derive_from(&base);
//! derived.delete(5, 6).unwrap();
//! assert_eq!(&*derived.text(), "Hello World!");
//!
//! // " World" in the derived layer came from [6, 12) in the original.
//! assert_eq!(derived.resolve(Interval::new(5, 11)), Ok(Interval::new(6, 12)));
//! // The deleted comma maps to the point where it used to be.
//! assert_eq!(derived.inverse_resolve(Interval::new(5, 6)), Ok(Interval::point(5)));
//! ```

pub mod edits;
pub mod error;
pub mod interval;
pub mod layer;
pub mod snapshot;

// Re-export key types for easier usage
pub use edits::Edit;
pub use error::{AlignError, Result};
pub use interval::Interval;
pub use layer::{Anchor, Layer, LayerId, SegmentRef, SegmentTag, SegmentView};
