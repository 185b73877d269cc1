//! Bounded undo/redo history of region snapshots.
//!
//! Each entry is a full structural copy of the region list. History is
//! linear: pushing a new snapshot discards everything that could have
//! been redone.

use std::collections::VecDeque;

use shield_core::Region;

pub const DEFAULT_UNDO_LIMIT: usize = 50;

/// One frozen copy of the whole region list.
pub type Snapshot = Vec<Region>;

#[derive(Debug, Clone)]
pub struct History {
    undo_stack: VecDeque<Snapshot>,
    redo_stack: VecDeque<Snapshot>,
    limit: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::with_limit(DEFAULT_UNDO_LIMIT)
    }
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// A limit of zero is treated as one.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Record `current` as the state to return to. Clears the redo stack.
    pub fn push(&mut self, current: &[Region]) {
        push_capped(&mut self.undo_stack, current.to_vec(), self.limit);
        self.redo_stack.clear();
        log::debug!(
            "[History] push ({} regions), undo depth {}",
            current.len(),
            self.undo_stack.len()
        );
    }

    /// Pop the latest snapshot, parking `current` on the redo stack.
    /// Returns `None` and leaves both stacks alone when there is nothing to undo.
    pub fn undo(&mut self, current: &[Region]) -> Option<Snapshot> {
        let snapshot = self.undo_stack.pop_back()?;
        push_capped(&mut self.redo_stack, current.to_vec(), self.limit);
        log::debug!("[History] undo, {} left", self.undo_stack.len());
        Some(snapshot)
    }

    pub fn redo(&mut self, current: &[Region]) -> Option<Snapshot> {
        let snapshot = self.redo_stack.pop_back()?;
        push_capped(&mut self.undo_stack, current.to_vec(), self.limit);
        log::debug!("[History] redo, {} left", self.redo_stack.len());
        Some(snapshot)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Oldest snapshot still held, if any.
    pub fn oldest(&self) -> Option<&Snapshot> {
        self.undo_stack.front()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        log::debug!("[History] cleared");
    }
}

fn push_capped(stack: &mut VecDeque<Snapshot>, snapshot: Snapshot, limit: usize) {
    stack.push_back(snapshot);
    while stack.len() > limit {
        stack.pop_front();
    }
}
