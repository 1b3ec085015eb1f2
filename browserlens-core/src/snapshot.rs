//! C5 — Snapshot Store: holds the single most recent `StateTree` a
//! session has produced, §4.5. Deliberately minimal — one slot, no
//! history — since nothing downstream needs more than "the last tree we
//! emitted a ref map for".

use crate::model::StateTree;

#[derive(Default)]
pub struct SnapshotStore {
    current: Option<StateTree>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self { current: None }
    }

    pub fn get(&self) -> Option<&StateTree> {
        self.current.as_ref()
    }

    pub fn put(&mut self, tree: StateTree) {
        self.current = Some(tree);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }
}
