//! Octree - arena storage for the LOD tree.
//!
//! Nodes live in a flat slot vector. Parent and child links are [`NodeId`]s
//! (slot index + generation), so removing a subtree never leaves a dangling
//! reference: a removed slot bumps its generation and any stale id simply
//! stops resolving.
//!
//! The arena also owns the resident chunk counter. Every chunk enters through
//! [`Octree::attach_chunk`] and leaves through [`Octree::release_chunk`] or
//! [`Octree::destroy_children`], so the counter is an exact allocation count.

use smallvec::SmallVec;
use thiserror::Error;

use super::key::NodeKey;
use super::lod::LodTable;
use super::node::{CullState, NodeState, OctreeNode};
use crate::chunk::{Chunk, ChunkHandle, ChunkMesh};
use crate::config::TerrainConfig;
use crate::density::{DensityField, ISO_LEVEL};

/// Stable reference to an arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
  pub index: u32,
  pub generation: u32,
}

struct Slot {
  generation: u32,
  node: Option<OctreeNode>,
}

/// Outcome of [`Octree::destroy_children`].
#[derive(Debug, Default)]
pub struct DestroyedSubtree {
  /// Chunks released from the removed descendants.
  pub released_chunks: usize,
  /// Ids of removed nodes (they no longer resolve).
  pub removed: Vec<NodeId>,
  /// Outstanding tickets of removed nodes.
  pub pending: Vec<(NodeId, u64)>,
}

/// A structural invariant found broken by [`Octree::validate`].
#[derive(Clone, Debug, Error, PartialEq)]
pub enum InvariantViolation {
  #[error("node {0:?} holds a chunk without being ready, tested and non-empty")]
  ChunkWithoutGeometry(NodeKey),
  #[error("node {0:?} lists a child that does not resolve")]
  DanglingChild(NodeKey),
  #[error("child {child:?} does not point back to {parent:?}")]
  BrokenParentLink { parent: NodeKey, child: NodeKey },
  #[error("resident counter {counter} disagrees with {actual} attached chunks")]
  ResidentMismatch { counter: usize, actual: usize },
}

pub struct Octree {
  slots: Vec<Slot>,
  free: Vec<u32>,
  root: NodeId,
  len: usize,
  resident_chunks: usize,
  next_handle: u64,
}

impl Octree {
  /// Tree holding only the root node.
  pub fn new_root(config: &TerrainConfig) -> Self {
    let mut tree = Self {
      slots: Vec::new(),
      free: Vec::new(),
      root: NodeId {
        index: 0,
        generation: 0,
      },
      len: 0,
      resident_chunks: 0,
      next_handle: 0,
    };
    tree.root = tree.insert(OctreeNode::new(NodeKey::ROOT, None, config));
    tree
  }

  #[inline]
  pub fn root(&self) -> NodeId {
    self.root
  }

  fn insert(&mut self, node: OctreeNode) -> NodeId {
    self.len += 1;
    if let Some(index) = self.free.pop() {
      let slot = &mut self.slots[index as usize];
      slot.node = Some(node);
      return NodeId {
        index,
        generation: slot.generation,
      };
    }
    let index = self.slots.len() as u32;
    self.slots.push(Slot {
      generation: 0,
      node: Some(node),
    });
    NodeId {
      index,
      generation: 0,
    }
  }

  fn remove(&mut self, id: NodeId) -> Option<OctreeNode> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    let node = slot.node.take()?;
    slot.generation = slot.generation.wrapping_add(1);
    self.free.push(id.index);
    self.len -= 1;
    Some(node)
  }

  #[inline]
  pub fn get(&self, id: NodeId) -> Option<&OctreeNode> {
    let slot = self.slots.get(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    slot.node.as_ref()
  }

  #[inline]
  pub fn get_mut(&mut self, id: NodeId) -> Option<&mut OctreeNode> {
    let slot = self.slots.get_mut(id.index as usize)?;
    if slot.generation != id.generation {
      return None;
    }
    slot.node.as_mut()
  }

  #[inline]
  pub fn contains(&self, id: NodeId) -> bool {
    self.get(id).is_some()
  }

  /// Number of live nodes.
  #[inline]
  pub fn len(&self) -> usize {
    self.len
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len == 0
  }

  /// Live nodes in slot order.
  pub fn iter(&self) -> impl Iterator<Item = (NodeId, &OctreeNode)> {
    self.slots.iter().enumerate().filter_map(|(index, slot)| {
      slot.node.as_ref().map(|node| {
        (
          NodeId {
            index: index as u32,
            generation: slot.generation,
          },
          node,
        )
      })
    })
  }

  /// Find a live node by key, walking down from the root.
  pub fn find(&self, key: NodeKey) -> Option<NodeId> {
    let mut id = self.root;
    for depth in (0..key.level).rev() {
      let children = self.get(id)?.children?;
      let octant = ((key.x >> depth) & 1)
        | (((key.y >> depth) & 1) << 1)
        | (((key.z >> depth) & 1) << 2);
      id = children[octant as usize];
    }
    let node = self.get(id)?;
    (node.key == key).then_some(id)
  }

  // ===========================================================================
  // Structure
  // ===========================================================================

  /// Allocate the 8 octants of `id`.
  ///
  /// Refused (returns `None`) when the node already has children or its
  /// geometry is not confirmed non-empty.
  pub fn create_children(&mut self, id: NodeId, config: &TerrainConfig) -> Option<[NodeId; 8]> {
    let key = {
      let node = self.get(id)?;
      if node.children.is_some() {
        return None;
      }
      node.key
    };
    if !self.has_confirmed_geometry(id) {
      return None;
    }

    let children: [NodeId; 8] = std::array::from_fn(|octant| {
      self.insert(OctreeNode::new(key.child(octant as u8), Some(id), config))
    });
    if let Some(node) = self.get_mut(id) {
      node.children = Some(children);
    }
    Some(children)
  }

  /// Remove every descendant of `id`, releasing their chunks.
  ///
  /// Iterative: an explicit stack keeps call depth constant for any tree
  /// height.
  pub fn destroy_children(&mut self, id: NodeId) -> DestroyedSubtree {
    let mut out = DestroyedSubtree::default();
    let Some(children) = self.get_mut(id).and_then(|node| node.children.take()) else {
      return out;
    };

    let mut stack: SmallVec<[NodeId; 64]> = SmallVec::new();
    stack.extend(children);
    while let Some(child) = stack.pop() {
      let Some(node) = self.remove(child) else {
        continue;
      };
      if node.chunk.is_some() {
        self.resident_chunks -= 1;
        out.released_chunks += 1;
      }
      if let Some(ticket) = node.pending {
        out.pending.push((child, ticket));
      }
      if let Some(grandchildren) = node.children {
        stack.extend(grandchildren);
      }
      out.removed.push(child);
    }
    out
  }

  // ===========================================================================
  // Geometry status
  // ===========================================================================

  /// Walk up from `id` to the first geometry-tested node and report whether
  /// it has geometry. Untested all the way up means the root: true.
  pub fn has_confirmed_geometry(&self, id: NodeId) -> bool {
    let mut current = Some(id);
    while let Some(cid) = current {
      let Some(node) = self.get(cid) else {
        return false;
      };
      if node.geometry_tested {
        return node.has_geometry;
      }
      current = node.parent;
    }
    true
  }

  /// Record the geometry test result for `id` and propagate upward.
  ///
  /// A parent gains geometry if any child has it; a parent becomes confirmed
  /// empty (and drops its chunk) only when all 8 children are tested empty.
  pub fn update_geometry_status(&mut self, id: NodeId, has_geometry: bool, epoch: u64) {
    let Some(node) = self.get_mut(id) else {
      return;
    };
    node.geometry_tested = true;
    node.has_geometry = has_geometry;
    node.tested_epoch = epoch;
    node.retest_requested = false;
    node.retry = false;
    let mut parent = node.parent;

    while let Some(pid) = parent {
      let Some(p) = self.get(pid) else {
        return;
      };
      let next = p.parent;
      if has_geometry {
        if p.has_geometry {
          return;
        }
        if let Some(p) = self.get_mut(pid) {
          p.has_geometry = true;
        }
      } else {
        let Some(children) = p.children else {
          return;
        };
        let all_empty = children.iter().all(|c| {
          self
            .get(*c)
            .is_some_and(|n| n.geometry_tested && !n.has_geometry)
        });
        if !all_empty {
          return;
        }
        self.release_chunk(pid);
        if let Some(p) = self.get_mut(pid) {
          p.geometry_tested = true;
          p.has_geometry = false;
          p.tested_epoch = epoch;
        }
      }
      parent = next;
    }
  }

  /// Density cull test: 5 samples (center and 4 tetrahedral corners).
  ///
  /// A sample is strongly positive when `density - 0.5` exceeds the field's
  /// Lipschitz bound times the half diagonal; at that margin the whole cube
  /// is guaranteed on one side of the surface. Cached in `cull_state` until
  /// [`force_retest`](Self::force_retest).
  pub fn cull_test<F: DensityField + ?Sized>(
    &mut self,
    id: NodeId,
    field: &F,
    seed: u32,
    iso_bias: f32,
  ) -> CullState {
    let Some(node) = self.get_mut(id) else {
      return CullState::Unknown;
    };
    if node.cull_state != CullState::Unknown {
      return node.cull_state;
    }

    let bounds = node.bounds();
    let corners = bounds.corners();
    let margin = field.lipschitz() * bounds.half_diagonal();
    let samples = [node.center, corners[0], corners[3], corners[5], corners[6]];

    let mut all_inside = true;
    let mut all_outside = true;
    for p in samples {
      let v = field.density_at(p, seed, iso_bias) - ISO_LEVEL;
      all_inside &= v > margin;
      all_outside &= v < -margin;
    }

    node.cull_state = if all_inside {
      CullState::Inside
    } else if all_outside {
      CullState::Outside
    } else {
      CullState::Intersects
    };
    node.cull_state
  }

  /// Clear the sticky test so the next traversal regenerates the node.
  pub fn force_retest(&mut self, id: NodeId) {
    if let Some(node) = self.get_mut(id) {
      node.retest_requested = true;
      node.cull_state = CullState::Unknown;
    }
  }

  // ===========================================================================
  // LOD decisions
  // ===========================================================================

  pub fn should_subdivide(&self, id: NodeId, max_level: u32, lod: &LodTable) -> bool {
    let Some(node) = self.get(id) else {
      return false;
    };
    node.level < max_level
      && node.distance_to_camera < lod.get(node.level).subdivide
      && self.has_confirmed_geometry(id)
  }

  /// True when the node has children and the camera is at least
  /// `collapse_distance` away.
  pub fn should_collapse(&self, id: NodeId, collapse_distance: f32) -> bool {
    self
      .get(id)
      .is_some_and(|node| node.children.is_some() && node.distance_to_camera >= collapse_distance)
  }

  /// All 8 children have a settled generation result.
  pub fn children_settled(&self, id: NodeId) -> bool {
    let Some(children) = self.get(id).and_then(|n| n.children) else {
      return false;
    };
    children
      .iter()
      .all(|c| self.get(*c).is_some_and(|n| n.is_settled()))
  }

  /// Leaves render their chunk; internal nodes keep rendering theirs until
  /// every child has settled.
  pub fn should_render(&self, id: NodeId) -> bool {
    let Some(node) = self.get(id) else {
      return false;
    };
    if node.chunk.is_none() {
      return false;
    }
    node.is_leaf() || !self.children_settled(id)
  }

  // ===========================================================================
  // Chunks
  // ===========================================================================

  /// Store a generated mesh on `id`, replacing any previous chunk.
  pub fn attach_chunk(&mut self, id: NodeId, mesh: ChunkMesh) -> Option<ChunkHandle> {
    if !self.contains(id) {
      return None;
    }
    self.release_chunk(id);
    let handle = ChunkHandle(self.next_handle);
    self.next_handle += 1;
    let node = self.get_mut(id)?;
    node.chunk = Some(Chunk { handle, mesh });
    node.state = NodeState::Ready;
    self.resident_chunks += 1;
    Some(handle)
  }

  /// Drop the chunk of `id`. Returns whether one was present.
  pub fn release_chunk(&mut self, id: NodeId) -> bool {
    let released = self
      .get_mut(id)
      .and_then(|node| node.chunk.take())
      .is_some();
    if released {
      self.resident_chunks -= 1;
    }
    released
  }

  /// Chunks currently attached to live nodes.
  #[inline]
  pub fn resident_chunks(&self) -> usize {
    self.resident_chunks
  }

  // ===========================================================================
  // Invariants
  // ===========================================================================

  /// Check the structural invariants of the whole tree.
  pub fn validate(&self) -> Result<(), InvariantViolation> {
    let mut actual = 0;
    for (id, node) in self.iter() {
      if node.chunk.is_some() {
        actual += 1;
        if node.state != NodeState::Ready || !node.geometry_tested || !node.has_geometry {
          return Err(InvariantViolation::ChunkWithoutGeometry(node.key));
        }
      }
      if let Some(children) = node.children {
        for child in children {
          let Some(c) = self.get(child) else {
            return Err(InvariantViolation::DanglingChild(node.key));
          };
          if c.parent != Some(id) {
            return Err(InvariantViolation::BrokenParentLink {
              parent: node.key,
              child: c.key,
            });
          }
        }
      }
    }
    if actual != self.resident_chunks {
      return Err(InvariantViolation::ResidentMismatch {
        counter: self.resident_chunks,
        actual,
      });
    }
    Ok(())
  }
}

#[cfg(test)]
#[path = "arena_test.rs"]
mod arena_test;
