use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use glam::Vec3;

use super::*;
use crate::density::SphereDensity;

fn node(i: u32) -> NodeId {
  NodeId {
    index: i,
    generation: 0,
  }
}

/// 16^3 node straddling the surface of a radius-10 sphere.
fn surface_job() -> GenerationJob {
  GenerationJob {
    origin: Vec3::splat(-12.0),
    size: 24.0,
    resolution: 8,
    seed: 0,
    iso_bias: 0.0,
    level: 0,
    planet_center: Vec3::ZERO,
    planet_radius: 10.0,
  }
}

struct PanickingField;

impl DensityField for PanickingField {
  fn density(&self, _x: f32, _y: f32, _z: f32, _seed: u32, _bias: f32) -> f32 {
    panic!("density exploded")
  }

  fn lipschitz(&self) -> f32 {
    1.0
  }
}

/// Sphere that spins until `open` is set.
struct GatedField {
  open: AtomicBool,
}

impl DensityField for GatedField {
  fn density(&self, x: f32, y: f32, z: f32, seed: u32, bias: f32) -> f32 {
    while !self.open.load(Ordering::Acquire) {
      std::thread::yield_now();
    }
    SphereDensity::at_origin(10.0).density(x, y, z, seed, bias)
  }

  fn lipschitz(&self) -> f32 {
    1.0
  }
}

fn sphere() -> Arc<dyn DensityField> {
  Arc::new(SphereDensity::at_origin(10.0))
}

/// Poll a threaded pool until `count` results arrive or a deadline passes.
fn poll_until(pool: &mut WorkerPool, count: usize) -> Vec<GenerationResult> {
  let deadline = Instant::now() + Duration::from_secs(10);
  let mut results = Vec::new();
  while results.len() < count && Instant::now() < deadline {
    results.extend(pool.poll());
    std::thread::sleep(Duration::from_millis(1));
  }
  results
}

// =========================================================================
// Deferred mode
// =========================================================================

#[test]
fn test_deferred_runs_only_on_tick() {
  let mut pool = WorkerPool::new(PoolMode::Deferred, 2, sphere()).expect("pool");
  pool.spawn(node(0), 10, surface_job());
  pool.spawn(node(1), 11, surface_job());
  assert_eq!(pool.in_flight(), 2);
  assert_eq!(pool.idle_workers(), 0);

  assert!(pool.poll().is_empty(), "nothing runs before tick");
  assert_eq!(pool.tick(), 2);

  let mut results = pool.poll();
  results.sort_by_key(|r| r.ticket);
  assert_eq!(results.len(), 2);
  assert_eq!(results[0].node, node(0));
  assert_eq!(results[0].ticket, 10);
  let mesh = results[0].outcome.as_ref().expect("mesh");
  assert!(!mesh.is_empty);
  assert_eq!(pool.in_flight(), 0);
  assert_eq!(pool.idle_workers(), 2);
}

#[test]
fn test_panic_becomes_error() {
  let mut pool = WorkerPool::new(PoolMode::Deferred, 1, Arc::new(PanickingField)).expect("pool");
  pool.spawn(node(3), 1, surface_job());
  pool.tick();
  let results = pool.poll();
  assert_eq!(results.len(), 1);
  match &results[0].outcome {
    Err(GenerationError::Panicked(msg)) => assert!(msg.contains("density exploded"), "{}", msg),
    other => panic!("expected panic error, got {:?}", other),
  }
}

#[test]
fn test_cancel_all_discards_results() {
  let mut pool = WorkerPool::new(PoolMode::Deferred, 4, sphere()).expect("pool");
  pool.spawn(node(0), 1, surface_job());
  pool.spawn(node(1), 2, surface_job());
  assert_eq!(pool.cancel_all(), 2);
  assert_eq!(pool.tick(), 0);
  assert!(pool.poll().is_empty());
  assert_eq!(pool.in_flight(), 0);
}

// =========================================================================
// Threaded mode
// =========================================================================

#[test]
fn test_threaded_delivers_results() {
  let mut pool = WorkerPool::new(PoolMode::Threaded, 2, sphere()).expect("pool");
  for i in 0..4 {
    pool.spawn(node(i), i as u64, surface_job());
  }
  let results = poll_until(&mut pool, 4);
  assert_eq!(results.len(), 4);
  for result in &results {
    assert!(result.outcome.is_ok());
  }
  assert_eq!(pool.in_flight(), 0);
}

/// Identical jobs yield identical meshes regardless of which worker ran them.
#[test]
fn test_threaded_results_deterministic() {
  let mut pool = WorkerPool::new(PoolMode::Threaded, 3, sphere()).expect("pool");
  for i in 0..3 {
    pool.spawn(node(i), i as u64, surface_job());
  }
  let results = poll_until(&mut pool, 3);
  assert_eq!(results.len(), 3);
  let meshes: Vec<&ChunkMesh> = results
    .iter()
    .map(|r| r.outcome.as_ref().expect("mesh"))
    .collect();
  for mesh in &meshes[1..] {
    assert_eq!(mesh.indices, meshes[0].indices);
    assert_eq!(mesh.vertices, meshes[0].vertices);
  }
}

/// A cancelled job keeps its slot until its thread is actually free, and its
/// result is never delivered.
#[test]
fn test_cancelled_threaded_job_holds_slot_until_done() {
  let field = Arc::new(GatedField {
    open: AtomicBool::new(false),
  });
  let mut pool = WorkerPool::new(PoolMode::Threaded, 1, field.clone()).expect("pool");
  pool.spawn(node(0), 1, surface_job());
  assert_eq!(pool.cancel_all(), 1);
  assert_eq!(pool.in_flight(), 0);
  assert_eq!(pool.abandoned(), 1);
  assert!(pool.poll().is_empty());
  assert_eq!(pool.idle_workers(), 0, "thread still busy");

  field.open.store(true, Ordering::Release);
  let deadline = Instant::now() + Duration::from_secs(10);
  while pool.abandoned() > 0 && Instant::now() < deadline {
    assert!(pool.poll().is_empty(), "cancelled result delivered");
    std::thread::sleep(Duration::from_millis(1));
  }
  assert_eq!(pool.abandoned(), 0);
  assert_eq!(pool.idle_workers(), 1);
}
