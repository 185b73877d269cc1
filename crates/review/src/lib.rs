//! Review state for one open document: the region store with its
//! selection, and the undo/redo history layered on top of it.

pub mod history;
pub mod selection;
pub mod store;

pub use history::{History, Snapshot, DEFAULT_UNDO_LIMIT};
pub use selection::{GroupIndex, Selection};
pub use store::RegionStore;

use shield_core::Region;

/// Region store plus history. The store never looks at the history
/// stacks; only [`ReviewState`] moves snapshots between the two.
#[derive(Debug, Clone, Default)]
pub struct ReviewState {
    store: RegionStore,
    history: History,
}

impl ReviewState {
    pub fn new(undo_limit: usize) -> Self {
        Self {
            store: RegionStore::default(),
            history: History::with_limit(undo_limit),
        }
    }

    pub fn store(&self) -> &RegionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut RegionStore {
        &mut self.store
    }

    pub fn regions(&self) -> &[Region] {
        self.store.regions()
    }

    /// Snapshot the current regions. Call right before mutating them.
    pub fn push_undo(&mut self) {
        self.history.push(self.store.regions());
    }

    /// Restore the previous snapshot; `false` if there was none.
    pub fn undo(&mut self) -> bool {
        match self.history.undo(self.store.regions()) {
            Some(snapshot) => {
                self.store.set_regions(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.history.redo(self.store.regions()) {
            Some(snapshot) => {
                self.store.set_regions(snapshot);
                true
            }
            None => false,
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Start over with a fresh region list: history and selection are dropped.
    pub fn reset(&mut self, regions: Vec<Region>) {
        self.history.clear();
        self.store.clear_selection();
        self.store.set_regions(regions);
    }
}
