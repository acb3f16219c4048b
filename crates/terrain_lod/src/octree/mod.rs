//! Octree module for LOD-based spatial subdivision.
//!
//! Unlike a leaf set keyed by coordinates, the scheduler keeps an explicit
//! tree: every node carries generation state, a cached cull classification
//! and possibly a chunk. Nodes live in an arena ([`Octree`]) and link to each
//! other by [`NodeId`].
//!
//! # LOD Convention
//!
//! Level 0 = root (coarsest, one cell), higher level = finer.
//!
//! ```text
//! node_size(L) = root_size / 2^L
//! ```
//!
//! # Module Structure
//!
//! - [`key`]: `NodeKey` - integer address and world placement
//! - [`node`]: `OctreeNode` - per-node state
//! - [`arena`]: `Octree` - storage, structure edits, geometry propagation
//! - [`lod`]: `LodThresholds` - subdivide/fade/collapse distances
//! - [`budget`]: `FrameBudget` - per-frame structural edit limits

pub mod arena;
pub mod budget;
pub mod key;
pub mod lod;
pub mod node;

pub use arena::{DestroyedSubtree, InvariantViolation, NodeId, Octree};
pub use budget::FrameBudget;
pub use key::NodeKey;
pub use lod::{LodTable, LodThresholds};
pub use node::{CullState, NodeState, OctreeNode};
