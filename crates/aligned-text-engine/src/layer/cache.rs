//! Lazily computed views of a layer and the registry used to invalidate them.
//!
//! A layer caches its concatenated text and the start offset of every segment.
//! Both are dropped wholesale on any structural change and rebuilt on the
//! next read. Because oblique segments read through to the underlying layer,
//! a change also clears the caches of every layer derived from it.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use slotmap::SecondaryMap;

use super::LayerId;
use super::LayerNode;
use super::segment::SegmentKey;

#[derive(Debug, Default)]
pub(crate) struct LayerCache {
    pub(crate) text: RefCell<Option<Rc<str>>>,
    pub(crate) offsets: RefCell<Option<SecondaryMap<SegmentKey, usize>>>,
}

impl LayerCache {
    pub(crate) fn clear(&self) {
        self.text.replace(None);
        self.offsets.replace(None);
    }

    #[cfg(test)]
    pub(crate) fn is_clean(&self) -> bool {
        self.text.borrow().is_some() && self.offsets.borrow().is_some()
    }
}

/// Non-owning registry of the layers derived from one layer.
#[derive(Debug, Default)]
pub(crate) struct Dependents {
    entries: RefCell<BTreeMap<LayerId, Weak<LayerNode>>>,
}

impl Dependents {
    pub(crate) fn register(&self, id: LayerId, layer: Weak<LayerNode>) {
        self.entries.borrow_mut().insert(id, layer);
    }

    pub(crate) fn deregister(&self, id: LayerId) {
        self.entries.borrow_mut().remove(&id);
    }

    /// Dependents that are still alive. Entries whose layer is gone are
    /// skipped; they disappear once that layer finishes dropping.
    pub(crate) fn live(&self) -> Vec<Rc<LayerNode>> {
        self.entries
            .borrow()
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }
}

impl LayerNode {
    /// Clears this layer's caches and those of everything derived from it.
    pub(crate) fn invalidate(&self) {
        log::trace!("invalidating caches of layer {}", self.id);
        self.cache.clear();
        // Collected first so that no registry borrow is held while
        // dependents run (or drop and deregister themselves).
        let dependents = self.dependents.live();
        for dependent in dependents {
            dependent.invalidate();
        }
    }
}
