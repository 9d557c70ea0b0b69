//! Tree Differ
//!
//! Compares the committed tree against a freshly rendered one and emits the
//! minimal patch. The contract: replaying the patch against the old tree
//! yields a tree structurally equal to the new one, for every input pair
//! including empty-to-nonempty and nonempty-to-empty.
//!
//! # Algorithm
//!
//! At each matching position:
//!
//! - If node identity (tag, key) differs, emit remove + insert of the full
//!   new subtree; nothing below the point of replacement is diffed.
//! - If identity matches, diff attributes (update only values that actually
//!   changed, remove vanished ones), then reconcile children: match by
//!   explicit key first, else type and position. Removals are emitted
//!   right-to-left so earlier indices stay valid, then a left-to-right pass
//!   emits moves for matched children that changed position and inserts for
//!   new ones, recursing into matched pairs.
//!
//! The emission order mirrors patch application exactly: every op's indices
//! refer to the tree as the previous ops left it.

use smallvec::SmallVec;

use crate::tree::Node;

use super::patch::{Path, PatchOp};

/// Compute the patch transforming `old` into `new`.
pub fn diff(old: Option<&Node>, new: Option<&Node>) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_at(&mut ops, SmallVec::new(), old, new);
    ops
}

fn diff_at(ops: &mut Vec<PatchOp>, path: Path, old: Option<&Node>, new: Option<&Node>) {
    match (old, new) {
        (None, None) => {}
        (None, Some(new)) => ops.push(PatchOp::Insert {
            path,
            node: new.clone(),
        }),
        (Some(_), None) => ops.push(PatchOp::Remove { path }),
        (Some(old), Some(new)) => {
            if !old.identity_matches(new) {
                ops.push(PatchOp::Remove { path: path.clone() });
                ops.push(PatchOp::Insert {
                    path,
                    node: new.clone(),
                });
                return;
            }
            diff_attrs(ops, &path, old, new);
            diff_children(ops, path, old, new);
        }
    }
}

/// Emit updates for attributes whose value changed, and removals for
/// attributes no longer present.
fn diff_attrs(ops: &mut Vec<PatchOp>, path: &Path, old: &Node, new: &Node) {
    for (name, value) in &new.attrs {
        if old.attrs.get(name) != Some(value) {
            ops.push(PatchOp::UpdateAttr {
                path: path.clone(),
                name: name.clone(),
                value: Some(value.clone()),
            });
        }
    }
    for name in old.attrs.keys() {
        if !new.attrs.contains_key(name) {
            ops.push(PatchOp::UpdateAttr {
                path: path.clone(),
                name: name.clone(),
                value: None,
            });
        }
    }
}

/// Matching decision for one new child.
#[derive(Clone, Copy)]
enum Match {
    /// Index into the old child list.
    Old(usize),
    /// No surviving counterpart; the child is inserted.
    Fresh,
}

fn diff_children(ops: &mut Vec<PatchOp>, path: Path, old: &Node, new: &Node) {
    let old_children = &old.children;
    let new_children = &new.children;

    // Match new children to old: explicit key first, else type+position.
    let mut old_taken = vec![false; old_children.len()];
    let mut matches = vec![Match::Fresh; new_children.len()];

    for (j, new_child) in new_children.iter().enumerate() {
        if new_child.key.is_some() {
            let found = old_children.iter().enumerate().position(|(i, old_child)| {
                !old_taken[i] && old_child.identity_matches(new_child)
            });
            if let Some(i) = found {
                old_taken[i] = true;
                matches[j] = Match::Old(i);
            }
        }
    }
    for (j, new_child) in new_children.iter().enumerate() {
        if new_child.key.is_none() {
            if let Some(old_child) = old_children.get(j) {
                if !old_taken[j] && old_child.key.is_none() && old_child.tag == new_child.tag {
                    old_taken[j] = true;
                    matches[j] = Match::Old(j);
                }
            }
        }
    }

    // Working view of the old child list as patch application mutates it.
    // Entries are old-list indices; usize::MAX marks a freshly inserted
    // child.
    const FRESH: usize = usize::MAX;
    let mut work: Vec<usize> = (0..old_children.len()).collect();

    // Remove unmatched old children, right to left.
    for position in (0..work.len()).rev() {
        if !old_taken[work[position]] {
            let mut child_path = path.clone();
            child_path.push(position as u32);
            ops.push(PatchOp::Remove { path: child_path });
            work.remove(position);
        }
    }

    // Left-to-right: move survivors into place, insert fresh children,
    // recurse into matched pairs.
    for (j, new_child) in new_children.iter().enumerate() {
        match matches[j] {
            Match::Old(old_index) => {
                // Matched entries survive the removal pass. Should the work
                // list ever disagree, emit the child as fresh; patch
                // verification catches the inconsistency and the session
                // falls back to a full-tree resend.
                let Some(position) = work.iter().position(|&entry| entry == old_index) else {
                    let mut child_path = path.clone();
                    child_path.push(j as u32);
                    ops.push(PatchOp::Insert {
                        path: child_path,
                        node: new_child.clone(),
                    });
                    work.insert(j, FRESH);
                    continue;
                };
                if position != j {
                    ops.push(PatchOp::Move {
                        parent: path.clone(),
                        from: position as u32,
                        to: j as u32,
                    });
                    let entry = work.remove(position);
                    work.insert(j, entry);
                }
                let mut child_path = path.clone();
                child_path.push(j as u32);
                diff_at(ops, child_path, Some(&old_children[old_index]), Some(new_child));
            }
            Match::Fresh => {
                let mut child_path = path.clone();
                child_path.push(j as u32);
                ops.push(PatchOp::Insert {
                    path: child_path,
                    node: new_child.clone(),
                });
                work.insert(j, FRESH);
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
