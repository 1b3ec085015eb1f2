//! C4 — Reference Manager: assigns the session-stable `@eN` refs that
//! make `StateTree` nodes addressable across steps, §4.4.
//!
//! Ref reuse rides on the same matching the differ uses to build its
//! `Delta` (`differ::compute_match`), so this module and `differ` agree
//! on which new-tree node *is* which old-tree node without running the
//! alignment twice.

use crate::differ::{self, MatchOutcome};
use crate::model::{Node, Ref, StateTree, ROOT_REF};

/// Outcome of one `RefManager::assign` call. `outcome` is handed to
/// `differ::build_delta` by the caller; `None` on a session's first
/// observation, when there is no prior tree to align against.
pub struct RefAssignment {
    pub outcome: Option<MatchOutcome>,
    pub compacted: bool,
}

/// Hands out `@eN` refs and reuses them across steps for matched nodes.
/// `cap` bounds the total number of distinct refs a session may hand
/// out before a full renumbering (`compact`) kicks in, §4.4's
/// `RefOverflow` policy — handled internally, never surfaced as an
/// error to the caller.
pub struct RefManager {
    next_id: u32,
    cap: u32,
}

impl RefManager {
    pub fn new(cap: u32) -> Self {
        Self {
            next_id: ROOT_REF.0 + 1,
            cap,
        }
    }

    /// Assigns refs into `new_tree`, reusing `old_tree`'s refs for nodes
    /// the matcher pairs up and minting fresh ones for everything else.
    /// The tree root always gets `ROOT_REF`.
    pub fn assign(&mut self, new_tree: &mut StateTree, old_tree: Option<&StateTree>) -> RefAssignment {
        new_tree.root.node_ref = Some(ROOT_REF);

        let outcome = match old_tree {
            None => {
                assign_fresh_recursive(&mut new_tree.root, &mut self.next_id);
                None
            }
            Some(old) => {
                let outcome = differ::compute_match(old, new_tree);
                for (old_path, new_path) in &outcome.pairs {
                    let old_ref = differ::node_at(&old.root, old_path).node_ref;
                    differ::node_at_mut(&mut new_tree.root, new_path).node_ref = old_ref;
                }
                for path in &outcome.added {
                    let node = differ::node_at_mut(&mut new_tree.root, path);
                    assign_fresh_recursive(node, &mut self.next_id);
                }
                Some(outcome)
            }
        };

        let compacted = if self.next_id as u64 > self.cap as u64 {
            self.compact(new_tree);
            true
        } else {
            false
        };

        RefAssignment { outcome, compacted }
    }

    /// Full renumbering of every node currently in `tree`, discarding
    /// any correspondence to refs used in prior steps. The orchestrator
    /// treats a compaction as forcing a full (non-delta) emission for
    /// that step, since old refs the caller may be holding are no
    /// longer valid.
    fn compact(&mut self, tree: &mut StateTree) {
        self.next_id = ROOT_REF.0 + 1;
        tree.root.node_ref = Some(ROOT_REF);
        renumber(&mut tree.root, &mut self.next_id);
    }
}

fn assign_fresh_recursive(node: &mut Node, next_id: &mut u32) {
    if node.node_ref.is_none() {
        node.node_ref = Some(Ref(*next_id));
        *next_id += 1;
    }
    for child in &mut node.children {
        assign_fresh_recursive(child, next_id);
    }
}

fn renumber(node: &mut Node, next_id: &mut u32) {
    for child in &mut node.children {
        child.node_ref = Some(Ref(*next_id));
        *next_id += 1;
        renumber(child, next_id);
    }
}
