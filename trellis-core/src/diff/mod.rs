//! Tree Diffing and Patches
//!
//! This module turns an (old committed tree, new rendered tree) pair into
//! an ordered patch batch, and can replay patches locally. The round-trip
//! invariant (replaying `diff(old, new)` against `old` yields `new`) is
//! the correctness contract the sync layer depends on.

mod differ;
mod patch;

pub use differ::diff;
pub use patch::{apply, PatchError, PatchOp, Path};
