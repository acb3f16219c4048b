use glam::Vec3;

use super::*;
use crate::bounds::Aabb;
use crate::density::SphereDensity;

fn config() -> TerrainConfig {
  TerrainConfig {
    planet_radius: 100.0,
    root_size_multiplier: 1.25,
    grid_resolution: 8,
    lod_levels: 4,
    ..Default::default()
  }
}

fn mesh() -> ChunkMesh {
  ChunkMesh {
    vertices: Vec::new(),
    indices: vec![0, 1, 2],
    bounds: Aabb::new(Vec3::ZERO, Vec3::ONE),
    is_empty: false,
  }
}

/// Mark `id` generated with geometry and attach a chunk.
fn make_ready(tree: &mut Octree, id: NodeId) {
  tree.attach_chunk(id, mesh());
  tree.update_geometry_status(id, true, 0);
}

fn make_empty(tree: &mut Octree, id: NodeId) {
  if let Some(node) = tree.get_mut(id) {
    node.state = NodeState::Ready;
  }
  tree.update_geometry_status(id, false, 0);
}

// =========================================================================
// Arena
// =========================================================================

#[test]
fn test_new_root() {
  let tree = Octree::new_root(&config());
  assert_eq!(tree.len(), 1);
  let root = tree.get(tree.root()).expect("root");
  assert_eq!(root.key, NodeKey::ROOT);
  assert_eq!(root.size, 250.0);
  assert_eq!(root.center, Vec3::ZERO);
  assert!(root.parent.is_none());
  assert_eq!(root.state, NodeState::Empty);
}

/// Removed slots are reused, but old ids never resolve to the new node.
#[test]
fn test_stale_id_does_not_alias() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  let first = tree.create_children(root, &config).expect("root may subdivide");
  tree.destroy_children(root);
  let second = tree.create_children(root, &config).expect("root may subdivide");

  for old in first {
    assert!(tree.get(old).is_none(), "stale id {:?} resolved", old);
  }
  for new in second {
    assert!(tree.contains(new));
  }
}

#[test]
fn test_find_by_key() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  let children = tree.create_children(root, &config).expect("children");
  let key = NodeKey::ROOT.child(5);
  assert_eq!(tree.find(key), Some(children[5]));
  assert_eq!(tree.find(key.child(0)), None);
  assert_eq!(tree.find(NodeKey::ROOT), Some(root));
}

// =========================================================================
// Structure
// =========================================================================

/// Children are created all 8 at once, half size, linked both ways.
#[test]
fn test_create_children_exactly_eight() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  let children = tree.create_children(root, &config).expect("children");

  assert_eq!(tree.len(), 9);
  for (octant, child) in children.iter().enumerate() {
    let node = tree.get(*child).expect("child");
    assert_eq!(node.parent, Some(root));
    assert_eq!(node.size, 125.0);
    assert_eq!(node.level, 1);
    assert_eq!(node.key.octant() as usize, octant);
  }
  assert!(tree.validate().is_ok());
}

#[test]
fn test_create_children_refused_twice() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  assert!(tree.create_children(root, &config).is_some());
  assert!(tree.create_children(root, &config).is_none());
  assert_eq!(tree.len(), 9);
}

/// A node inside confirmed-empty space cannot subdivide.
#[test]
fn test_create_children_requires_confirmed_geometry() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  let children = tree.create_children(root, &config).expect("children");
  make_empty(&mut tree, children[0]);

  assert!(tree.create_children(children[0], &config).is_none());
  assert!(tree.get(children[0]).expect("child").children.is_none());
}

/// Destroying a subtree returns the allocation counter to its earlier value.
#[test]
fn test_destroy_children_releases_exactly_subtree() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  make_ready(&mut tree, root);
  let baseline = tree.resident_chunks();
  assert_eq!(baseline, 1);

  let children = tree.create_children(root, &config).expect("children");
  for child in children {
    make_ready(&mut tree, child);
  }
  let grandchildren = tree.create_children(children[3], &config).expect("grandchildren");
  for gc in grandchildren {
    make_ready(&mut tree, gc);
  }
  if let Some(node) = tree.get_mut(grandchildren[1]) {
    node.pending = Some(77);
  }
  assert_eq!(tree.resident_chunks(), 1 + 8 + 8);

  let destroyed = tree.destroy_children(root);
  assert_eq!(destroyed.released_chunks, 16);
  assert_eq!(destroyed.removed.len(), 16);
  assert_eq!(destroyed.pending, vec![(grandchildren[1], 77)]);
  assert_eq!(tree.resident_chunks(), baseline);
  assert_eq!(tree.len(), 1);
  assert!(tree.get(root).expect("root").children.is_none());
  assert!(tree.validate().is_ok());
}

/// A deep chain is destroyed without recursion.
#[test]
fn test_destroy_deep_chain() {
  let config = TerrainConfig {
    lod_levels: 16,
    ..config()
  };
  let mut tree = Octree::new_root(&config);
  let mut id = tree.root();
  for _ in 0..15 {
    let children = tree.create_children(id, &config).expect("children");
    id = children[0];
  }
  assert_eq!(tree.len(), 1 + 15 * 8);
  let destroyed = tree.destroy_children(tree.root());
  assert_eq!(destroyed.removed.len(), 15 * 8);
  assert_eq!(tree.len(), 1);
}

// =========================================================================
// Geometry status
// =========================================================================

#[test]
fn test_confirmed_geometry_defaults_true_at_root() {
  let tree = Octree::new_root(&config());
  assert!(tree.has_confirmed_geometry(tree.root()));
}

/// Untested nodes inherit the answer of the nearest tested ancestor.
#[test]
fn test_confirmed_geometry_walks_up() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  make_ready(&mut tree, root);
  let children = tree.create_children(root, &config).expect("children");
  assert!(tree.has_confirmed_geometry(children[2]));

  make_empty(&mut tree, children[2]);
  assert!(!tree.has_confirmed_geometry(children[2]));
  assert!(tree.has_confirmed_geometry(children[3]));
}

#[test]
fn test_geometry_propagates_up() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  let children = tree.create_children(root, &config).expect("children");
  make_ready(&mut tree, children[4]);
  assert!(tree.get(root).expect("root").has_geometry);
}

/// A parent is confirmed empty only when all 8 children are tested empty.
#[test]
fn test_parent_confirmed_empty_after_all_children() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  make_ready(&mut tree, root);
  let children = tree.create_children(root, &config).expect("children");

  for child in &children[..7] {
    make_empty(&mut tree, *child);
  }
  let parent = tree.get(root).expect("root");
  assert!(parent.has_geometry);
  assert!(parent.chunk.is_some());

  make_empty(&mut tree, children[7]);
  let parent = tree.get(root).expect("root");
  assert!(parent.geometry_tested);
  assert!(!parent.has_geometry);
  assert!(parent.chunk.is_none(), "confirmed-empty parent drops its chunk");
  assert_eq!(tree.resident_chunks(), 0);
  assert!(tree.validate().is_ok());
}

// =========================================================================
// Cull test
// =========================================================================

#[test]
fn test_cull_test_classifies_sphere_regions() {
  let config = TerrainConfig {
    planet_radius: 100.0,
    root_size_multiplier: 4.0,
    lod_levels: 6,
    ..config()
  };
  let sphere = SphereDensity::at_origin(100.0);
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  assert_eq!(tree.cull_test(root, &sphere, 0, 0.0), CullState::Intersects);

  // Level-3 nodes are 100 wide; the one at the far corner is pure air.
  let mut id = root;
  for _ in 0..3 {
    id = tree.create_children(id, &config).expect("children")[7];
  }
  assert_eq!(tree.cull_test(id, &sphere, 0, 0.0), CullState::Outside);

  // Walk towards the center for a level-5 node buried in rock.
  let mut id = tree.get(root).and_then(|n| n.children).expect("children")[0];
  for _ in 0..4 {
    id = tree.create_children(id, &config).expect("children")[7];
  }
  let node = tree.get(id).expect("node");
  assert_eq!(node.size, 25.0);
  assert!(node.center.length() < 30.0, "center {:?}", node.center);
  assert_eq!(tree.cull_test(id, &sphere, 0, 0.0), CullState::Inside);
}

/// The classification is cached until explicitly invalidated.
#[test]
fn test_cull_test_cached_until_forced() {
  let config = config();
  let sphere = SphereDensity::at_origin(100.0);
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  assert_eq!(tree.cull_test(root, &sphere, 0, 0.0), CullState::Intersects);

  // A huge bias would make everything solid, but the cached answer stands.
  assert_eq!(tree.cull_test(root, &sphere, 0, 10_000.0), CullState::Intersects);

  tree.force_retest(root);
  assert!(tree.get(root).expect("root").retest_requested);
  assert_eq!(tree.cull_test(root, &sphere, 0, 10_000.0), CullState::Inside);
}

// =========================================================================
// LOD decisions and rendering
// =========================================================================

#[test]
fn test_should_subdivide_and_collapse() {
  let config = config();
  let lod = LodTable::new(&config);
  let mut tree = Octree::new_root(&config);
  let root = tree.root();

  tree.get_mut(root).expect("root").distance_to_camera = 100.0;
  assert!(tree.should_subdivide(root, config.max_level(), &lod));
  assert!(!tree.should_subdivide(root, 0, &lod), "max level reached");

  tree.get_mut(root).expect("root").distance_to_camera = 10_000.0;
  assert!(!tree.should_subdivide(root, config.max_level(), &lod));
  assert!(!tree.should_collapse(root, 500.0), "no children yet");

  tree.create_children(root, &config);
  assert!(tree.should_collapse(root, 500.0));
  tree.get_mut(root).expect("root").distance_to_camera = 499.0;
  assert!(!tree.should_collapse(root, 500.0));
}

#[test]
fn test_should_render_until_children_settle() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  make_ready(&mut tree, root);
  assert!(tree.should_render(root), "leaf with chunk renders");

  let children = tree.create_children(root, &config).expect("children");
  assert!(tree.should_render(root), "children still generating");

  for child in &children[..7] {
    make_ready(&mut tree, *child);
  }
  assert!(tree.should_render(root));
  make_empty(&mut tree, children[7]);
  assert!(!tree.should_render(root), "all children settled");
  assert!(tree.should_render(children[0]));
  assert!(!tree.should_render(children[7]), "empty child has no chunk");
}

#[test]
fn test_validate_detects_chunk_without_geometry() {
  let config = config();
  let mut tree = Octree::new_root(&config);
  let root = tree.root();
  make_ready(&mut tree, root);
  if let Some(node) = tree.get_mut(root) {
    node.has_geometry = false;
  }
  assert!(matches!(
    tree.validate(),
    Err(InvariantViolation::ChunkWithoutGeometry(_))
  ));
}
