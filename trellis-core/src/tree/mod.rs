//! Component Tree and Render Pass
//!
//! This module implements the server-side component tree: the authoring
//! interface components are written against, the rendered [`Node`] value
//! the differ consumes, and the render pass that keeps a live instance tree
//! in sync with reactive state.
//!
//! # Flow
//!
//! A session mounts a root component, which renders into attributes and
//! children; child components mount recursively. After a write batch, the
//! scheduler hands the render pass an ordered list of dirty computations
//! and only those subtrees are re-invoked. The resulting tree snapshot is
//! what the differ compares against the committed tree.

mod component;
mod node;
mod render;

pub use component::{Child, Component, RenderCtx, Rendered};
pub use node::{AttrValue, Node};
pub use render::{RenderPolicy, RenderTree};
