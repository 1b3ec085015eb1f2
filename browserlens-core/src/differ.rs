//! C6 — Tree Differ: aligns two `StateTree`s and emits a typed `Delta`,
//! §4.6. Matching runs in two global passes over both trees: an exact
//! anchor pass keyed on the identity tuple, then a bounded fuzzy pass
//! for whatever anchor matching couldn't place. The identity tuple's
//! `parent_role` component is just the parent's *role*, not its exact
//! node identity, which is what lets pass A catch reparenting (§8 S6)
//! without any special-casing: a node keeps matching as long as its own
//! role/name/level/parent-role are unchanged, even if the concrete
//! container it sits under was swapped for a same-role one.

use crate::model::{Node, Ref, Role, StateFlag, StateTree, ROOT_REF};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Index path from a tree's root to a node, e.g. `[0, 2]` = root's first
/// child's third child.
pub type NodePath = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddedSubtree {
    pub parent: Ref,
    pub position_hint: usize,
    pub subtree: Node,
}

/// One changed field on a matched node. Typed per field rather than a
/// generic `(old, new): (String, String)` pair so callers don't have to
/// parse state-set or level changes back out of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field")]
pub enum FieldChange {
    Name {
        old: String,
        new: String,
    },
    Value {
        old: Option<String>,
        new: Option<String>,
    },
    State {
        old: std::collections::BTreeSet<StateFlag>,
        new: std::collections::BTreeSet<StateFlag>,
    },
    Level {
        old: Option<i32>,
        new: Option<i32>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Changed {
    #[serde(rename = "ref")]
    pub node_ref: Ref,
    #[serde(flatten)]
    pub field: FieldChange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Moved {
    #[serde(rename = "ref")]
    pub node_ref: Ref,
    pub old_parent: Ref,
    pub new_parent: Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CauseHint {
    Navigation,
    Mutation,
    Focus,
    Input,
    Unknown,
}

/// Structural roll-up of nodes the differ found stable, §3. `noise` is
/// filled in by the semantic filter (§4.7), not by the differ itself.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnchangedSummary {
    pub by_role: BTreeMap<String, usize>,
    pub noise: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub added: Vec<AddedSubtree>,
    pub removed: Vec<Ref>,
    pub changed: Vec<Changed>,
    pub moved: Vec<Moved>,
    pub unchanged_summary: UnchangedSummary,
    pub cause_hint: Option<CauseHint>,
}

/// The result of matching two trees: which node paths pair up, and which
/// are unmatched on either side. Shared between the reference manager
/// (which needs it to decide ref reuse) and the differ (which needs it
/// to build the typed `Delta`), so the matching algorithm runs once per
/// step rather than twice.
#[derive(Debug, Clone, Default)]
pub struct MatchOutcome {
    pub pairs: Vec<(NodePath, NodePath)>,
    /// Maximal added new-tree paths: a path is included here only if its
    /// own parent matched something, so a whole new subtree is reported
    /// once rather than once per descendant.
    pub added: Vec<NodePath>,
    /// Every unmatched old-tree path, not just maximal ones — `removed`
    /// on `Delta` is a flat ref list, so each vanished node needs its
    /// own entry regardless of nesting.
    pub removed: Vec<NodePath>,
}

pub(crate) fn node_at<'a>(root: &'a Node, path: &[usize]) -> &'a Node {
    path.iter().fold(root, |n, &i| &n.children[i])
}

pub(crate) fn node_at_mut<'a>(root: &'a mut Node, path: &[usize]) -> &'a mut Node {
    path.iter().fold(root, |n, &i| &mut n.children[i])
}

fn is_hidden(node: &Node) -> bool {
    node.state.contains(&StateFlag::Hidden)
}

type Identity = (Role, String, Role, Option<i32>);

fn identity(node: &Node, parent_role: &Role) -> Identity {
    (
        node.role.clone(),
        node.name.clone(),
        parent_role.clone(),
        node.level,
    )
}

struct Flat<'a> {
    path: NodePath,
    node: &'a Node,
    parent_role: Role,
}

/// Pre-order flattening of every visible (non-hidden) descendant of
/// `root`, root itself excluded — it's always paired separately.
fn flatten(root: &Node) -> Vec<Flat<'_>> {
    fn walk<'a>(node: &'a Node, path: &mut NodePath, parent_role: &Role, out: &mut Vec<Flat<'a>>) {
        for (i, child) in node.children.iter().enumerate() {
            if is_hidden(child) {
                continue;
            }
            path.push(i);
            out.push(Flat {
                path: path.clone(),
                node: child,
                parent_role: parent_role.clone(),
            });
            walk(child, path, &child.role, out);
            path.pop();
        }
    }
    let mut out = Vec::new();
    let mut path = Vec::new();
    walk(root, &mut path, &root.role, &mut out);
    out
}

/// Matches two full trees. The roots themselves are always paired (both
/// are the synthetic document node, §3 invariant 5).
pub fn compute_match(old: &StateTree, new: &StateTree) -> MatchOutcome {
    let old_flat = flatten(&old.root);
    let new_flat = flatten(&new.root);

    let mut by_identity: HashMap<Identity, VecDeque<usize>> = HashMap::new();
    for (idx, f) in old_flat.iter().enumerate() {
        by_identity
            .entry(identity(f.node, &f.parent_role))
            .or_default()
            .push_back(idx);
    }

    let mut matched_old = vec![false; old_flat.len()];
    let mut matched_new = vec![false; new_flat.len()];
    let mut pairs: Vec<(usize, usize)> = vec![];

    // Pass A: global anchor matching on the identity tuple. Draining a
    // FIFO per identity gives positional tie-breaking for free, including
    // the empty-name case (§4.6, "Numeric & edge-case rules").
    for (nidx, f) in new_flat.iter().enumerate() {
        let key = identity(f.node, &f.parent_role);
        if let Some(oidx) = by_identity.get_mut(&key).and_then(|q| q.pop_front()) {
            matched_old[oidx] = true;
            matched_new[nidx] = true;
            pairs.push((oidx, nidx));
        }
    }

    // Pass B: bounded fuzzy match over whatever pass A left behind.
    let old_remaining: Vec<usize> = (0..old_flat.len()).filter(|&i| !matched_old[i]).collect();
    let new_remaining: Vec<usize> = (0..new_flat.len()).filter(|&j| !matched_new[j]).collect();
    for (oi, ni) in fuzzy_match(&old_remaining, &new_remaining, &old_flat, &new_flat) {
        let oidx = old_remaining[oi];
        let nidx = new_remaining[ni];
        matched_old[oidx] = true;
        matched_new[nidx] = true;
        pairs.push((oidx, nidx));
    }

    let removed: Vec<NodePath> = (0..old_flat.len())
        .filter(|&i| !matched_old[i])
        .map(|i| old_flat[i].path.clone())
        .collect();

    let unmatched_new_paths: HashSet<NodePath> = (0..new_flat.len())
        .filter(|&j| !matched_new[j])
        .map(|j| new_flat[j].path.clone())
        .collect();
    let added: Vec<NodePath> = unmatched_new_paths
        .iter()
        .filter(|p| {
            let parent = &p[..p.len() - 1];
            parent.is_empty() || !unmatched_new_paths.contains(parent)
        })
        .cloned()
        .collect();

    MatchOutcome {
        pairs: pairs
            .into_iter()
            .map(|(oi, ni)| (old_flat[oi].path.clone(), new_flat[ni].path.clone()))
            .collect(),
        added,
        removed,
    }
}

/// Cost table from §4.6. `None` means the pair is ineligible to match
/// (cost would be ≥ 3, or role and name both disagree).
fn pair_cost(u: &Node, v: &Node) -> Option<u32> {
    let mut cost = if u.role == v.role {
        if u.name == v.name {
            0
        } else {
            let dist = strsim::levenshtein(&u.name, &v.name);
            let prefix = u.name.starts_with(v.name.as_str()) || v.name.starts_with(u.name.as_str());
            if dist <= 2 || prefix {
                1
            } else {
                2
            }
        }
    } else if u.name == v.name && !u.name.is_empty() {
        2
    } else {
        return None;
    };
    if u.level != v.level {
        cost += 1;
    }
    if cost >= 3 {
        None
    } else {
        Some(cost)
    }
}

/// Greedy min-cost assignment over the whole remaining pool, followed by
/// a bounded local-search refinement (pairwise swaps that lower total
/// cost) within each group of old siblings sharing a parent, when that
/// group has at most 16 members — the "Hungarian refinement" of §4.6,
/// implemented as 2-opt rather than a full Kuhn-Munkres solve since the
/// group size this runs over is capped small by construction.
fn fuzzy_match(
    old_idxs: &[usize],
    new_idxs: &[usize],
    old_flat: &[Flat<'_>],
    new_flat: &[Flat<'_>],
) -> Vec<(usize, usize)> {
    if old_idxs.is_empty() || new_idxs.is_empty() {
        return Vec::new();
    }

    let mut candidates: Vec<(u32, usize, usize)> = Vec::new();
    for (oi, &oidx) in old_idxs.iter().enumerate() {
        for (ni, &nidx) in new_idxs.iter().enumerate() {
            if let Some(c) = pair_cost(old_flat[oidx].node, new_flat[nidx].node) {
                candidates.push((c, oi, ni));
            }
        }
    }
    candidates.sort_by_key(|&(c, _, _)| c);

    let mut used_old = vec![false; old_idxs.len()];
    let mut used_new = vec![false; new_idxs.len()];
    let mut assigned: Vec<(usize, usize)> = Vec::new();
    for (_, oi, ni) in candidates {
        if !used_old[oi] && !used_new[ni] {
            used_old[oi] = true;
            used_new[ni] = true;
            assigned.push((oi, ni));
        }
    }

    let mut buckets: HashMap<NodePath, Vec<usize>> = HashMap::new();
    for (k, &(oi, _)) in assigned.iter().enumerate() {
        let path = &old_flat[old_idxs[oi]].path;
        let parent = path[..path.len() - 1].to_vec();
        buckets.entry(parent).or_default().push(k);
    }
    for members in buckets.values() {
        if members.len() <= 16 {
            refine(members, &mut assigned, old_idxs, new_idxs, old_flat, new_flat);
        }
    }

    assigned
}

fn refine(
    members: &[usize],
    assigned: &mut [(usize, usize)],
    old_idxs: &[usize],
    new_idxs: &[usize],
    old_flat: &[Flat<'_>],
    new_flat: &[Flat<'_>],
) {
    let cost = |oi: usize, ni: usize| pair_cost(old_flat[old_idxs[oi]].node, new_flat[new_idxs[ni]].node);
    let mut improved = true;
    while improved {
        improved = false;
        for a in 0..members.len() {
            for b in (a + 1)..members.len() {
                let (i, j) = (members[a], members[b]);
                let (oi_i, ni_i) = assigned[i];
                let (oi_j, ni_j) = assigned[j];
                let current = cost(oi_i, ni_i).unwrap_or(u32::MAX) as i64
                    + cost(oi_j, ni_j).unwrap_or(u32::MAX) as i64;
                if let (Some(c1), Some(c2)) = (cost(oi_i, ni_j), cost(oi_j, ni_i)) {
                    if (c1 as i64 + c2 as i64) < current {
                        assigned[i] = (oi_i, ni_j);
                        assigned[j] = (oi_j, ni_i);
                        improved = true;
                    }
                }
            }
        }
    }
}

/// Builds the typed `Delta` from a completed match. Refs on both trees
/// must already be assigned (the reference manager runs before this,
/// consuming the same `MatchOutcome`).
pub fn build_delta(old: &StateTree, new: &StateTree, outcome: &MatchOutcome) -> Delta {
    let mut delta = Delta::default();
    let mut by_role: BTreeMap<String, usize> = BTreeMap::new();

    for (old_path, new_path) in &outcome.pairs {
        let old_node = node_at(&old.root, old_path);
        let new_node = node_at(&new.root, new_path);
        let node_ref = new_node.node_ref.unwrap_or(ROOT_REF);

        let old_parent_ref = node_at(&old.root, &old_path[..old_path.len() - 1])
            .node_ref
            .unwrap_or(ROOT_REF);
        let new_parent_ref = node_at(&new.root, &new_path[..new_path.len() - 1])
            .node_ref
            .unwrap_or(ROOT_REF);

        let mut any_change = false;
        if old_node.name != new_node.name {
            delta.changed.push(Changed {
                node_ref,
                field: FieldChange::Name {
                    old: old_node.name.clone(),
                    new: new_node.name.clone(),
                },
            });
            any_change = true;
        }
        if old_node.value != new_node.value {
            delta.changed.push(Changed {
                node_ref,
                field: FieldChange::Value {
                    old: old_node.value.clone(),
                    new: new_node.value.clone(),
                },
            });
            any_change = true;
        }
        if old_node.state != new_node.state {
            delta.changed.push(Changed {
                node_ref,
                field: FieldChange::State {
                    old: old_node.state.clone(),
                    new: new_node.state.clone(),
                },
            });
            any_change = true;
        }
        if old_node.level != new_node.level {
            delta.changed.push(Changed {
                node_ref,
                field: FieldChange::Level {
                    old: old_node.level,
                    new: new_node.level,
                },
            });
            any_change = true;
        }

        let moved = old_parent_ref != new_parent_ref;
        if moved {
            delta.moved.push(Moved {
                node_ref,
                old_parent: old_parent_ref,
                new_parent: new_parent_ref,
            });
        }

        if !any_change && !moved {
            *by_role.entry(new_node.role.as_str().to_string()).or_insert(0) += 1;
        }
    }

    for path in &outcome.added {
        let node = node_at(&new.root, path);
        let parent_ref = node_at(&new.root, &path[..path.len() - 1])
            .node_ref
            .unwrap_or(ROOT_REF);
        delta.added.push(AddedSubtree {
            parent: parent_ref,
            position_hint: *path.last().unwrap(),
            subtree: node.clone(),
        });
    }

    for path in &outcome.removed {
        if let Some(r) = node_at(&old.root, path).node_ref {
            delta.removed.push(r);
        }
    }

    delta.unchanged_summary.by_role = by_role;
    delta
}

/// Heuristic `cause_hint` derivation (§3; §9 leaves the exact heuristics
/// unspecified beyond "URL change, large additions near root, etc.").
/// Navigation beats everything else; beyond that, a few cheap checks on
/// the delta's own shape.
pub fn infer_cause_hint(delta: &Delta, old_url_origin: &str, new_url_origin: &str) -> Option<CauseHint> {
    if old_url_origin != new_url_origin {
        return Some(CauseHint::Navigation);
    }
    let empty = delta.added.is_empty()
        && delta.removed.is_empty()
        && delta.changed.is_empty()
        && delta.moved.is_empty();
    if empty {
        return None;
    }
    let near_root_additions = delta.added.iter().filter(|a| a.parent == ROOT_REF).count();
    if delta.added.len() >= 2 || near_root_additions >= 1 {
        return Some(CauseHint::Mutation);
    }
    let focus_changed = delta.changed.iter().any(|c| {
        matches!(&c.field, FieldChange::State { new, .. } if new.contains(&StateFlag::Focused))
    });
    if focus_changed {
        return Some(CauseHint::Focus);
    }
    if delta.changed.iter().any(|c| matches!(c.field, FieldChange::Value { .. })) {
        return Some(CauseHint::Input);
    }
    Some(CauseHint::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Origin, StateTree};
    use pretty_assertions::assert_eq;

    fn leaf(role: Role, name: &str, r: u32) -> Node {
        let mut n = Node::new(role, Origin::A11y).with_name(name);
        n.node_ref = Some(Ref(r));
        n
    }

    fn tree(root_children: Vec<Node>) -> StateTree {
        let mut root = Node::new(Role::Document, Origin::A11y).with_children(root_children);
        root.node_ref = Some(ROOT_REF);
        StateTree::new(root)
    }

    #[test]
    fn anchor_matching_reuses_refs_for_identical_siblings() {
        let old = tree(vec![leaf(Role::Button, "Go", 1)]);
        let new = tree(vec![leaf(Role::Button, "Go", 1)]);
        let outcome = compute_match(&old, &new);
        assert_eq!(outcome.pairs.len(), 1);
        assert!(outcome.added.is_empty());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn value_change_is_reported_as_changed_not_moved() {
        let mut old_leaf = leaf(Role::Textbox, "Search", 1);
        old_leaf.value = Some(String::new());
        let mut new_leaf = leaf(Role::Textbox, "Search", 1);
        new_leaf.value = Some("laptop".to_string());

        let old = tree(vec![old_leaf]);
        let new = tree(vec![new_leaf]);
        let outcome = compute_match(&old, &new);
        let delta = build_delta(&old, &new, &outcome);

        assert_eq!(delta.changed.len(), 1);
        assert!(delta.moved.is_empty());
        match &delta.changed[0].field {
            FieldChange::Value { old, new } => {
                assert_eq!(old.as_deref(), Some(""));
                assert_eq!(new.as_deref(), Some("laptop"));
            }
            other => panic!("expected a Value change, got {other:?}"),
        }
    }

    #[test]
    fn fuzzy_match_tolerates_small_name_edits() {
        let old = tree(vec![leaf(Role::Button, "Submit order", 5)]);
        let new = tree(vec![leaf(Role::Button, "Submit orde", 0)]);
        let outcome = compute_match(&old, &new);
        assert_eq!(outcome.pairs.len(), 1);
        assert!(outcome.added.is_empty());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn unrelated_siblings_are_added_and_removed_not_matched() {
        let old = tree(vec![leaf(Role::Button, "Delete account", 1)]);
        let new = tree(vec![leaf(Role::Link, "Pricing", 0)]);
        let outcome = compute_match(&old, &new);
        assert_eq!(outcome.added.len(), 1);
        assert_eq!(outcome.removed.len(), 1);
    }

    #[test]
    fn reparenting_is_reported_as_moved_with_same_ref() {
        // Both containers already exist on both sides (anchor-matched by
        // role+name+parent), so only the link itself is genuinely unmatched
        // noise for pass A/B to resolve — isolates reparenting from the
        // separate "new container appears" case covered by the modal test.
        let mut nav = Node::new(Role::Generic, Origin::A11y).with_name("nav");
        nav.node_ref = Some(Ref(10));
        nav.children = vec![leaf(Role::Link, "Cart (0)", 2)];
        let mut sidebar = Node::new(Role::Generic, Origin::A11y).with_name("sidebar");
        sidebar.node_ref = Some(Ref(11));
        let old = tree(vec![nav, sidebar]);

        let mut nav2 = Node::new(Role::Generic, Origin::A11y).with_name("nav");
        nav2.node_ref = Some(Ref(10));
        let mut sidebar2 = Node::new(Role::Generic, Origin::A11y).with_name("sidebar");
        sidebar2.node_ref = Some(Ref(11));
        sidebar2.children = vec![leaf(Role::Link, "Cart (0)", 2)];
        let new = tree(vec![nav2, sidebar2]);

        let outcome = compute_match(&old, &new);
        let delta = build_delta(&old, &new, &outcome);

        assert_eq!(delta.moved.len(), 1);
        assert_eq!(delta.moved[0].node_ref, Ref(2));
        assert_eq!(delta.moved[0].old_parent, Ref(10));
        assert_eq!(delta.moved[0].new_parent, Ref(11));
        assert!(delta.added.is_empty());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn modal_appears_as_a_single_added_subtree_under_the_matched_root() {
        let old = tree(vec![leaf(Role::Main, "", 1)]);
        let mut dialog = Node::new(Role::Dialog, Origin::A11y);
        dialog.children = vec![leaf(Role::Heading, "Confirm", 0), leaf(Role::Button, "Yes", 0)];
        let new = tree(vec![leaf(Role::Main, "", 1), dialog]);

        let outcome = compute_match(&old, &new);
        let delta = build_delta(&old, &new, &outcome);

        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].subtree.role, Role::Dialog);
        assert_eq!(delta.added[0].subtree.children.len(), 2);
        assert!(delta.changed.is_empty());
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn hidden_nodes_are_excluded_from_both_trees() {
        let mut hidden_old = leaf(Role::Button, "Ghost", 9);
        hidden_old.state.insert(StateFlag::Hidden);
        let old = tree(vec![hidden_old, leaf(Role::Button, "Go", 1)]);

        let mut hidden_new = leaf(Role::Button, "Ghost", 9);
        hidden_new.state.insert(StateFlag::Hidden);
        let new = tree(vec![hidden_new, leaf(Role::Button, "Go", 1)]);

        let outcome = compute_match(&old, &new);
        assert_eq!(outcome.pairs.len(), 1);
        assert!(outcome.added.is_empty());
        assert!(outcome.removed.is_empty());
    }

    #[test]
    fn stable_nodes_are_tallied_into_unchanged_summary() {
        let old = tree(vec![leaf(Role::Button, "Go", 1), leaf(Role::Link, "Home", 2)]);
        let new = tree(vec![leaf(Role::Button, "Go", 1), leaf(Role::Link, "Home", 2)]);
        let outcome = compute_match(&old, &new);
        let delta = build_delta(&old, &new, &outcome);

        assert!(delta.changed.is_empty());
        assert_eq!(delta.unchanged_summary.by_role.get("button"), Some(&1));
        assert_eq!(delta.unchanged_summary.by_role.get("link"), Some(&1));
    }

    #[test]
    fn navigation_change_wins_cause_hint_over_everything_else() {
        let delta = Delta::default();
        let hint = infer_cause_hint(&delta, "https://a.com", "https://b.com");
        assert_eq!(hint, Some(CauseHint::Navigation));
    }
}
