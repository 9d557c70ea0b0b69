//! Patch Operations
//!
//! A patch is an ordered sequence of operations over the committed tree.
//! Paths are child-index vectors from the root; an empty path addresses the
//! root itself. The remote renderer applies a patch batch atomically, so
//! the server never reasons about partial application.
//!
//! [`apply`] replays a patch against a local tree. It exists for two
//! reasons: tests assert the differ's round-trip invariant with it, and the
//! session uses it to verify a patch before shipping (falling back to a
//! full-tree resend when verification fails).

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::tree::{AttrValue, Node};

/// A child-index path from the root. Empty = the root node.
pub type Path = SmallVec<[u32; 8]>;

/// One operation over the committed tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum PatchOp {
    /// Insert a full subtree so that it ends up at `path`.
    Insert { path: Path, node: Node },

    /// Remove the subtree at `path`.
    Remove { path: Path },

    /// Set (`Some`) or remove (`None`) one attribute of the node at `path`.
    UpdateAttr {
        path: Path,
        name: String,
        value: Option<AttrValue>,
    },

    /// Move the child of `parent` at index `from` to index `to`.
    Move { parent: Path, from: u32, to: u32 },
}

/// Errors from replaying a patch.
#[derive(Debug, Error, PartialEq)]
pub enum PatchError {
    /// A path did not resolve to an existing node.
    #[error("path {0:?} does not resolve to a node")]
    BadPath(Vec<u32>),

    /// An insert or move index was past the end of the child list.
    #[error("index {index} out of range at {path:?}")]
    IndexOutOfRange { path: Vec<u32>, index: u32 },

    /// Inserting at the root of a non-empty tree.
    #[error("cannot insert at occupied root")]
    RootOccupied,
}

/// Replay `ops` against `tree` in order.
pub fn apply(tree: &mut Option<Node>, ops: &[PatchOp]) -> Result<(), PatchError> {
    for op in ops {
        apply_one(tree, op)?;
    }
    Ok(())
}

fn apply_one(tree: &mut Option<Node>, op: &PatchOp) -> Result<(), PatchError> {
    match op {
        PatchOp::Insert { path, node } => insert_at(tree, path, node.clone()),
        PatchOp::Remove { path } => remove_at(tree, path),
        PatchOp::UpdateAttr { path, name, value } => {
            let target = resolve_mut(tree, path)?;
            match value {
                Some(value) => {
                    target.attrs.insert(name.clone(), value.clone());
                }
                None => {
                    target.attrs.shift_remove(name);
                }
            }
            Ok(())
        }
        PatchOp::Move { parent, from, to } => {
            let target = resolve_mut(tree, parent)?;
            let len = target.children.len() as u32;
            if *from >= len || *to >= len {
                return Err(PatchError::IndexOutOfRange {
                    path: parent.to_vec(),
                    index: (*from).max(*to),
                });
            }
            let child = target.children.remove(*from as usize);
            target.children.insert(*to as usize, child);
            Ok(())
        }
    }
}

fn insert_at(tree: &mut Option<Node>, path: &Path, node: Node) -> Result<(), PatchError> {
    let Some((&index, parent_path)) = path.split_last() else {
        if tree.is_some() {
            return Err(PatchError::RootOccupied);
        }
        *tree = Some(node);
        return Ok(());
    };

    let parent = resolve_mut_slice(tree, parent_path, path)?;
    if index as usize > parent.children.len() {
        return Err(PatchError::IndexOutOfRange {
            path: path.to_vec(),
            index,
        });
    }
    parent.children.insert(index as usize, node);
    Ok(())
}

fn remove_at(tree: &mut Option<Node>, path: &Path) -> Result<(), PatchError> {
    let Some((&index, parent_path)) = path.split_last() else {
        if tree.take().is_none() {
            return Err(PatchError::BadPath(Vec::new()));
        }
        return Ok(());
    };

    let parent = resolve_mut_slice(tree, parent_path, path)?;
    if index as usize >= parent.children.len() {
        return Err(PatchError::IndexOutOfRange {
            path: path.to_vec(),
            index,
        });
    }
    parent.children.remove(index as usize);
    Ok(())
}

fn resolve_mut<'a>(tree: &'a mut Option<Node>, path: &Path) -> Result<&'a mut Node, PatchError> {
    resolve_mut_slice(tree, path, path)
}

fn resolve_mut_slice<'a>(
    tree: &'a mut Option<Node>,
    path: &[u32],
    full_path: &Path,
) -> Result<&'a mut Node, PatchError> {
    let mut current = tree
        .as_mut()
        .ok_or_else(|| PatchError::BadPath(full_path.to_vec()))?;
    for &index in path {
        current = current
            .children
            .get_mut(index as usize)
            .ok_or_else(|| PatchError::BadPath(full_path.to_vec()))?;
    }
    Ok(current)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
