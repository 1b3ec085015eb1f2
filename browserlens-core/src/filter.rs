//! C7 — Semantic Filter: drops cosmetic noise from a `Delta` before
//! emission, §4.7. Filters are capability objects — `Arc<dyn Fn(...)
//! -> bool>` — the same pattern the router uses for representation
//! choice, rather than a trait hierarchy, since a predicate is the
//! entire contract here.

use crate::differ::{Changed, Delta, FieldChange};
use crate::model::{Node, Role, StateTree};
use std::sync::Arc;

/// The piece of a `Delta` a predicate is being asked to judge.
pub enum FilterTarget<'a> {
    Changed(&'a Changed),
}

/// Read-only context a predicate may need beyond the changed entry
/// itself — ancestor lookups require the tree the change happened in.
/// `old_tree` is carried alongside `new_tree` solely so the carousel/
/// tablist reorder pre-pass can tell whether a sibling vanished from a
/// parent — `Delta.removed` is a flat ref list with no parent linkage.
pub struct FilterContext<'a> {
    pub new_tree: &'a StateTree,
    pub old_tree: Option<&'a StateTree>,
}

fn find_in<'a>(root: &'a Node, r: crate::model::Ref) -> Option<&'a Node> {
    if root.node_ref == Some(r) {
        return Some(root);
    }
    root.children.iter().find_map(|c| find_in(c, r))
}

fn ancestors_in<'a>(root: &'a Node, r: crate::model::Ref) -> Vec<&'a Node> {
    fn walk<'a>(node: &'a Node, r: crate::model::Ref, path: &mut Vec<&'a Node>) -> bool {
        if node.node_ref == Some(r) {
            return true;
        }
        for child in &node.children {
            path.push(node);
            if walk(child, r, path) {
                return true;
            }
            path.pop();
        }
        false
    }
    let mut path = Vec::new();
    walk(root, r, &mut path);
    path
}

impl FilterContext<'_> {
    fn find(&self, r: crate::model::Ref) -> Option<&Node> {
        find_in(&self.new_tree.root, r)
    }

    fn ancestors_of(&self, r: crate::model::Ref) -> Vec<&Node> {
        ancestors_in(&self.new_tree.root, r)
    }
}

pub type FilterPredicate = Arc<dyn Fn(&FilterTarget<'_>, &FilterContext<'_>) -> bool + Send + Sync>;

fn is_name_or_value_only(field: &FieldChange) -> bool {
    matches!(field, FieldChange::Name { .. } | FieldChange::Value { .. })
}

/// Role `status`/`timer`/`marquee`, name/value only.
fn live_region_role_filter() -> FilterPredicate {
    Arc::new(|target, ctx| {
        let FilterTarget::Changed(c) = target;
        if !is_name_or_value_only(&c.field) {
            return false;
        }
        match ctx.find(c.node_ref) {
            Some(node) => matches!(node.role, Role::Status | Role::Timer | Role::Marquee),
            None => false,
        }
    })
}

/// Node is a descendant of a `status`-rooted live region, name/value
/// only. `role="status"` carries an implicit `aria-live="polite"` per
/// ARIA; the closed `StateFlag` vocabulary here has no live-region slot
/// of its own, so ancestor role is the operative check.
fn aria_live_ancestor_filter() -> FilterPredicate {
    Arc::new(|target, ctx| {
        let FilterTarget::Changed(c) = target;
        if !is_name_or_value_only(&c.field) {
            return false;
        }
        ctx.ancestors_of(c.node_ref)
            .iter()
            .any(|a| a.role == Role::Status)
    })
}

/// State toggle on a `progressbar`.
fn progressbar_state_filter() -> FilterPredicate {
    Arc::new(|target, ctx| {
        let FilterTarget::Changed(c) = target;
        if !matches!(c.field, FieldChange::State { .. }) {
            return false;
        }
        matches!(ctx.find(c.node_ref).map(|n| &n.role), Some(Role::Progressbar))
    })
}

/// A `vision-region`'s only tracked fields are `name`/`value`/`state`/
/// `level` (§3); `bounds` is not one of them, so a "bounds-only change
/// with a byte-identical vision-token" can never actually appear in
/// `delta.changed`. Kept as an always-false stub for API completeness
/// of the default filter list.
fn vision_region_bounds_only_filter() -> FilterPredicate {
    Arc::new(|_target, _ctx| false)
}

/// Default predicate list matching §4.7's five rules (the carousel/
/// tablist reorder rule is handled separately in `discard_pure_reorders`
/// since it requires aggregate reasoning across all `moved` entries
/// sharing a parent, not a single-item predicate).
pub fn default_filters() -> Vec<FilterPredicate> {
    vec![
        live_region_role_filter(),
        aria_live_ancestor_filter(),
        progressbar_state_filter(),
        vision_region_bounds_only_filter(),
    ]
}

/// Drops `moved` entries that are pure reorders inside a `carousel` or
/// `tablist` parent: every moved child shares the same old and new
/// parent, and no sibling was added or removed there, so the set of
/// child identities under that parent is unchanged.
fn discard_pure_reorders(delta: &mut Delta, ctx: &FilterContext<'_>) -> usize {
    use std::collections::HashMap;

    let mut by_new_parent: HashMap<crate::model::Ref, Vec<usize>> = HashMap::new();
    for (i, m) in delta.moved.iter().enumerate() {
        if m.old_parent == m.new_parent {
            by_new_parent.entry(m.new_parent).or_default().push(i);
        }
    }

    let mut discard_idxs = Vec::new();
    for (parent_ref, idxs) in by_new_parent {
        let parent = match ctx.find(parent_ref) {
            Some(p) => p,
            None => continue,
        };
        if !matches!(parent.role, Role::Carousel | Role::Tablist) {
            continue;
        }
        let any_sibling_added = delta.added.iter().any(|a| a.parent == parent_ref);
        let any_sibling_removed = match ctx.old_tree {
            Some(old) => delta
                .removed
                .iter()
                .any(|r| ancestors_in(&old.root, *r).iter().any(|a| a.node_ref == Some(parent_ref))),
            None => !delta.removed.is_empty(),
        };
        if !any_sibling_added && !any_sibling_removed {
            discard_idxs.extend(idxs);
        }
    }

    discard_idxs.sort_unstable();
    discard_idxs.dedup();
    let discarded = discard_idxs.len();
    for &idx in discard_idxs.iter().rev() {
        delta.moved.remove(idx);
    }
    discarded
}

/// Applies the reorder pre-pass, then the per-item predicate list, to
/// `delta` in place. Discarded entries are tallied into
/// `unchanged_summary.noise`; nothing else about the delta changes.
pub fn apply(
    delta: &mut Delta,
    predicates: &[FilterPredicate],
    new_tree: &StateTree,
    old_tree: Option<&StateTree>,
) {
    let ctx = FilterContext { new_tree, old_tree };

    delta.unchanged_summary.noise += discard_pure_reorders(delta, &ctx);

    let mut keep = Vec::with_capacity(delta.changed.len());
    let mut noise = 0usize;
    for c in delta.changed.drain(..) {
        let target = FilterTarget::Changed(&c);
        let discard = predicates.iter().any(|p| p(&target, &ctx));
        if discard {
            noise += 1;
        } else {
            keep.push(c);
        }
    }
    delta.changed = keep;
    delta.unchanged_summary.noise += noise;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::differ::{AddedSubtree, Changed, FieldChange, Moved};
    use crate::model::{Node, Origin, Ref, StateFlag};

    fn node_with_ref(role: Role, name: &str, r: u32) -> Node {
        let mut n = Node::new(role, Origin::A11y).with_name(name);
        n.node_ref = Some(Ref(r));
        n
    }

    #[test]
    fn status_name_change_is_filtered_as_noise() {
        let tree = StateTree::new(
            Node::new(Role::Document, Origin::A11y).with_children(vec![node_with_ref(Role::Status, "Saved", 1)]),
        );
        let mut delta = Delta::default();
        delta.changed.push(Changed {
            node_ref: Ref(1),
            field: FieldChange::Name {
                old: "Saving".into(),
                new: "Saved".into(),
            },
        });

        apply(&mut delta, &default_filters(), &tree, None);

        assert!(delta.changed.is_empty());
        assert_eq!(delta.unchanged_summary.noise, 1);
    }

    #[test]
    fn progressbar_state_toggle_is_filtered() {
        let tree = StateTree::new(
            Node::new(Role::Document, Origin::A11y)
                .with_children(vec![node_with_ref(Role::Progressbar, "", 1)]),
        );
        let mut delta = Delta::default();
        delta.changed.push(Changed {
            node_ref: Ref(1),
            field: FieldChange::State {
                old: Default::default(),
                new: [StateFlag::Expanded].into_iter().collect(),
            },
        });

        apply(&mut delta, &default_filters(), &tree, None);
        assert!(delta.changed.is_empty());
    }

    #[test]
    fn button_disabled_state_change_survives_filtering() {
        let tree = StateTree::new(
            Node::new(Role::Document, Origin::A11y).with_children(vec![node_with_ref(Role::Button, "Buy", 1)]),
        );
        let mut delta = Delta::default();
        delta.changed.push(Changed {
            node_ref: Ref(1),
            field: FieldChange::State {
                old: Default::default(),
                new: [StateFlag::Disabled].into_iter().collect(),
            },
        });

        apply(&mut delta, &default_filters(), &tree, None);
        assert_eq!(delta.changed.len(), 1);
        assert_eq!(delta.unchanged_summary.noise, 0);
    }

    #[test]
    fn carousel_reorder_with_unchanged_children_is_discarded() {
        let mut carousel = node_with_ref(Role::Carousel, "Slides", 1);
        carousel.children = vec![node_with_ref(Role::Listitem, "A", 2), node_with_ref(Role::Listitem, "B", 3)];
        let tree = StateTree::new(Node::new(Role::Document, Origin::A11y).with_children(vec![carousel]));

        let mut delta = Delta::default();
        delta.moved.push(Moved {
            node_ref: Ref(2),
            old_parent: Ref(1),
            new_parent: Ref(1),
        });
        delta.moved.push(Moved {
            node_ref: Ref(3),
            old_parent: Ref(1),
            new_parent: Ref(1),
        });

        apply(&mut delta, &default_filters(), &tree, None);
        assert!(delta.moved.is_empty());
    }

    #[test]
    fn reorder_in_a_carousel_with_an_added_sibling_is_kept() {
        let mut carousel = node_with_ref(Role::Carousel, "Slides", 1);
        carousel.children = vec![node_with_ref(Role::Listitem, "A", 2)];
        let tree = StateTree::new(Node::new(Role::Document, Origin::A11y).with_children(vec![carousel]));

        let mut delta = Delta::default();
        delta.moved.push(Moved {
            node_ref: Ref(2),
            old_parent: Ref(1),
            new_parent: Ref(1),
        });
        delta.added.push(AddedSubtree {
            parent: Ref(1),
            position_hint: 1,
            subtree: node_with_ref(Role::Listitem, "C", 4),
        });

        apply(&mut delta, &default_filters(), &tree, None);
        assert_eq!(delta.moved.len(), 1);
    }
}
