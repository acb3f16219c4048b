use std::sync::Arc;

use super::*;
use crate::density::SphereDensity;
use crate::octree::NodeKey;
use crate::task::pool::PoolMode;

fn config() -> TerrainConfig {
  TerrainConfig {
    max_workers: 2,
    ..Default::default()
  }
}

fn scheduler(workers: usize) -> TaskScheduler {
  let config = config();
  let pool = WorkerPool::new(
    PoolMode::Deferred,
    workers,
    Arc::new(SphereDensity::at_origin(10.0)),
  )
  .expect("pool");
  TaskScheduler::new(&config, pool)
}

fn request(s: &mut TaskScheduler, i: u32, level: u32, priority: f32, essential: bool) -> GenerationRequest {
  GenerationRequest {
    node: NodeId {
      index: i,
      generation: 0,
    },
    key: NodeKey::new(i, 0, 0, level),
    level,
    center: Vec3::ZERO,
    priority,
    is_visible: true,
    is_essential: essential,
    speculative: false,
    timestamp: Instant::now(),
    ticket: s.issue_ticket(),
  }
}

fn job() -> GenerationJob {
  GenerationJob {
    origin: Vec3::splat(-12.0),
    size: 24.0,
    resolution: 4,
    seed: 0,
    iso_bias: 0.0,
    level: 0,
    planet_center: Vec3::ZERO,
    planet_radius: 10.0,
  }
}

#[test]
fn test_tickets_are_unique() {
  let mut s = scheduler(1);
  let a = s.issue_ticket();
  let b = s.issue_ticket();
  assert_ne!(a, b);
}

/// Essential work dispatches before any regular work, whatever the priority.
#[test]
fn test_essential_dispatched_first() {
  let mut s = scheduler(1);
  let regular = request(&mut s, 1, 1, 1.0e9, false);
  let essential = request(&mut s, 2, 1, 1.0, true);
  s.submit(regular).expect("queued");
  s.submit(essential).expect("queued");

  let mut order = Vec::new();
  let stats = s.dispatch(|r| {
    order.push(r.node.index);
    Some(job())
  });
  assert_eq!(stats.dispatched, 1, "one worker slot");
  assert_eq!(order, vec![2]);
  assert_eq!(s.queued_len(), 1);
}

/// Dispatch stops at the worker limit and resumes once results are polled.
#[test]
fn test_dispatch_bounded_by_workers() {
  let mut s = scheduler(2);
  for i in 0..5 {
    let r = request(&mut s, i, 2, i as f32, false);
    s.submit(r).expect("queued");
  }
  assert_eq!(s.dispatch(|_| Some(job())).dispatched, 2);
  assert_eq!(s.dispatch(|_| Some(job())).dispatched, 0, "all slots busy");

  s.tick();
  assert_eq!(s.poll_completions().len(), 2);
  assert_eq!(s.dispatch(|_| Some(job())).dispatched, 2);
  assert_eq!(s.queued_len(), 1);
}

#[test]
fn test_dropped_requests_do_not_use_slots() {
  let mut s = scheduler(1);
  for i in 0..3 {
    let r = request(&mut s, i, 2, i as f32, false);
    s.submit(r).expect("queued");
  }
  // Highest priority (node 2) is stale.
  let stats = s.dispatch(|r| (r.node.index != 2).then(job));
  assert_eq!(stats, DispatchStats { dispatched: 1, dropped: 1 });
}

/// An essential request moves a queued regular request for the same node.
#[test]
fn test_essential_supersedes_regular() {
  let mut s = scheduler(1);
  let regular = request(&mut s, 5, 1, 10.0, false);
  let essential = request(&mut s, 5, 1, 1.0, true);
  let essential_ticket = essential.ticket;
  s.submit(regular).expect("queued");
  assert!(matches!(s.submit(essential), Ok(Admission::Replaced(_))));
  assert_eq!(s.regular().len(), 0);
  assert_eq!(s.essential().len(), 1);
  assert_eq!(s.queued(NodeId { index: 5, generation: 0 }).map(|r| r.ticket), Some(essential_ticket));

  let again = request(&mut s, 5, 1, 1.0e6, false);
  assert_eq!(s.submit(again), Ok(Admission::Ignored));
}

#[test]
fn test_cancel_and_cancel_all() {
  let mut s = scheduler(1);
  for i in 0..3 {
    let r = request(&mut s, i, 2, 1.0, i == 0);
    s.submit(r).expect("queued");
  }
  assert!(s.cancel(NodeId { index: 0, generation: 0 }).is_some());
  assert!(s.cancel(NodeId { index: 0, generation: 0 }).is_none());
  s.dispatch(|_| Some(job()));
  assert!(!s.is_idle());
  assert_eq!(s.cancel_all().len(), 1);
  assert!(s.is_idle());
}

/// When the essential queue is full, an upgrade that fails leaves the node's
/// regular request in place, even past the regular soft limit.
#[test]
fn test_rejected_upgrade_keeps_regular_request() {
  let mut config = config();
  config.queue.essential_capacity = 8;
  config.queue.soft_limit = 4;
  config.queue.hard_limit = 16;
  let pool = WorkerPool::new(
    PoolMode::Deferred,
    1,
    Arc::new(SphereDensity::at_origin(10.0)),
  )
  .expect("pool");
  let mut s = TaskScheduler::new(&config, pool);

  for i in 0..8 {
    let r = request(&mut s, i, 1, 1.0e9, true);
    s.submit(r).expect("essential queued");
  }
  let mut background = request(&mut s, 99, 3, -100.0, false);
  background.is_visible = false;
  let background_ticket = background.ticket;
  s.submit(background).expect("regular queued");
  for i in 100..105 {
    let r = request(&mut s, i, 3, 10.0, false);
    s.submit(r).expect("visible queued");
  }
  assert!(s.regular().len() > config.queue.soft_limit);

  let upgrade = request(&mut s, 99, 3, 1.0, true);
  assert_eq!(s.submit(upgrade), Err(TaskError::QueueSaturated));

  let node = NodeId { index: 99, generation: 0 };
  assert_eq!(s.queued(node).map(|r| r.ticket), Some(background_ticket));
  assert_eq!(s.regular().len(), 6);
}
