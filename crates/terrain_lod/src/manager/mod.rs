//! ChunkManager - the per-frame spatial scheduler.
//!
//! Owns the octree, the two request queues and the worker pool, and drives
//! them from the main thread once per frame:
//!
//! ```text
//! update(camera)
//!   ├─ apply completions        (completion.rs)
//!   ├─ bootstrap step           (bootstrap.rs)   until root + 8 children ready
//!   │  or traversal             (traversal.rs)   subdivide / collapse / request
//!   ├─ speculative prefetch     (speculative.rs)
//!   ├─ reprioritize + expire
//!   ├─ dispatch to idle workers
//!   └─ resident budget          (traversal.rs)
//! ```
//!
//! All tree mutation happens here. Workers only ever see a plain
//! [`GenerationJob`] and hand back a [`ChunkMesh`](crate::chunk::ChunkMesh).

mod bootstrap;
mod camera;
mod completion;
mod render;
mod speculative;
mod traversal;

pub use bootstrap::BootstrapPhase;
pub use camera::CameraState;
pub use render::RenderItem;

use std::sync::Arc;

use glam::Vec3;
use web_time::Instant;

use crate::config::TerrainConfig;
use crate::culling::{Culler, HorizonOccluder, Visibility};
use crate::density::DensityField;
use crate::error::{SchedulerError, TaskError};
use crate::extract::GenerationJob;
use crate::metrics::{FrameReport, SchedulerMetrics};
use crate::octree::{LodTable, NodeId, NodeState, Octree, OctreeNode};
use crate::task::{Admission, GenerationRequest, PoolMode, TaskScheduler, WorkerPool};

/// Per-update scratch shared by the stages.
struct Frame {
  culler: Culler,
  camera: Vec3,
  now: Instant,
  report: FrameReport,
}

/// How a node enters the queues.
#[derive(Clone, Copy, Debug, Default)]
struct RequestKind {
  visible: bool,
  essential: bool,
  speculative: bool,
}

pub struct ChunkManager {
  config: TerrainConfig,
  field: Arc<dyn DensityField>,
  mode: PoolMode,
  octree: Octree,
  lod: LodTable,
  scheduler: TaskScheduler,
  bootstrap: BootstrapPhase,
  /// Bumped whenever the density snapshot changes.
  epoch: u64,
  frame_id: u64,
  last_camera: Option<Vec3>,
  velocity: Vec3,
  metrics: SchedulerMetrics,
}

impl ChunkManager {
  /// Manager on a threaded worker pool.
  pub fn new(config: TerrainConfig, field: Arc<dyn DensityField>) -> Result<Self, SchedulerError> {
    Self::with_pool_mode(config, field, PoolMode::Threaded)
  }

  pub fn with_pool_mode(
    config: TerrainConfig,
    field: Arc<dyn DensityField>,
    mode: PoolMode,
  ) -> Result<Self, SchedulerError> {
    config.validate()?;
    let pool = WorkerPool::new(mode, config.effective_workers(), Arc::clone(&field))?;
    tracing::info!(
      levels = config.lod_levels,
      root_size = config.root_size(),
      workers = pool.workers(),
      "chunk manager created"
    );
    Ok(Self {
      octree: Octree::new_root(&config),
      lod: LodTable::new(&config),
      scheduler: TaskScheduler::new(&config, pool),
      config,
      field,
      mode,
      bootstrap: BootstrapPhase::Root,
      epoch: 0,
      frame_id: 0,
      last_camera: None,
      velocity: Vec3::ZERO,
      metrics: SchedulerMetrics::new(),
    })
  }

  // ===========================================================================
  // Frame
  // ===========================================================================

  /// Run one scheduling step for `camera`. `dt` is the frame time in seconds,
  /// used for the camera velocity estimate.
  #[tracing::instrument(skip_all, name = "chunk_manager::update")]
  pub fn update(&mut self, camera: &CameraState, dt: f32) -> FrameReport {
    let start = Instant::now();
    self.frame_id += 1;
    self.track_velocity(camera.position, dt);

    let horizon = HorizonOccluder::new(self.config.planet_center_vec(), self.config.occluder_radius());
    let mut frame = Frame {
      culler: Culler::new(camera.view_projection, camera.position, Some(horizon)),
      camera: camera.position,
      now: start,
      report: FrameReport {
        frame_id: self.frame_id,
        camera_speed: self.velocity.length(),
        ..Default::default()
      },
    };

    self.apply_completions(&mut frame);
    if self.bootstrap != BootstrapPhase::Complete {
      self.bootstrap_step(&mut frame);
    }
    if self.bootstrap == BootstrapPhase::Complete {
      self.traverse(&mut frame);
      self.prefetch(&mut frame);
    }

    for (request, reason) in self.scheduler.reprioritize(frame.camera, frame.now) {
      self.drop_request(&request, reason, &mut frame);
    }

    let octree = &self.octree;
    let config = &self.config;
    let stats = self.scheduler.dispatch(|request| {
      let node = octree.get(request.node)?;
      (node.pending == Some(request.ticket)).then(|| job_for(node, config))
    });
    frame.report.dispatched = stats.dispatched;

    self.enforce_resident_budget(&mut frame);

    let mut report = frame.report;
    report.bootstrapped = self.is_bootstrapped();
    report.queued_essential = self.scheduler.essential().len();
    report.queued_regular = self.scheduler.regular().len();
    report.in_flight = self.scheduler.pool().in_flight();
    report.resident_chunks = self.octree.resident_chunks();
    report.nodes = self.octree.len();
    report.update_us = start.elapsed().as_micros() as u64;
    self.metrics.record_frame(&report);

    tracing::trace!(
      submitted = report.submitted,
      completed = report.completed,
      queued = report.queued_essential + report.queued_regular,
      in_flight = report.in_flight,
      resident = report.resident_chunks,
      "frame"
    );
    report
  }

  fn track_velocity(&mut self, position: Vec3, dt: f32) {
    self.velocity = match self.last_camera {
      Some(previous) if dt > 0.0 => (position - previous) / dt,
      _ => Vec3::ZERO,
    };
    self.last_camera = Some(position);
  }

  /// Run deferred jobs now (no-op on a threaded pool). Results are applied by
  /// the next [`update`](Self::update).
  pub fn run_pending_jobs(&mut self) -> usize {
    self.scheduler.tick()
  }

  // ===========================================================================
  // Configuration transitions
  // ===========================================================================

  /// Replace the configuration: cancels all work, rebuilds the tree from a
  /// fresh root and restarts the bootstrap.
  pub fn regenerate(&mut self, config: TerrainConfig) -> Result<(), SchedulerError> {
    config.validate()?;
    let pool = WorkerPool::new(self.mode, config.effective_workers(), Arc::clone(&self.field))?;
    let cancelled = self.scheduler.cancel_all().len();
    tracing::info!(cancelled, epoch = self.epoch + 1, "regenerating terrain");

    self.scheduler = TaskScheduler::new(&config, pool);
    self.octree = Octree::new_root(&config);
    self.lod = LodTable::new(&config);
    self.config = config;
    self.epoch += 1;
    self.bootstrap = BootstrapPhase::Root;
    Ok(())
  }

  /// Change the iso bias. Outstanding work is abandoned; tested-empty nodes
  /// are re-tested against the new surface as the traversal reaches them.
  pub fn set_iso_bias(&mut self, iso_bias: f32) {
    if self.config.iso_bias == iso_bias {
      return;
    }
    self.config.iso_bias = iso_bias;
    self.epoch += 1;
    self.scheduler.cancel_all();
    let pending: Vec<(NodeId, u64)> = self
      .octree
      .iter()
      .filter_map(|(id, node)| node.pending.map(|ticket| (id, ticket)))
      .collect();
    for (id, ticket) in pending {
      self.clear_pending(id, ticket);
    }
    tracing::debug!(iso_bias, epoch = self.epoch, "iso bias changed");
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  #[inline]
  pub fn is_bootstrapped(&self) -> bool {
    self.bootstrap == BootstrapPhase::Complete
  }

  #[inline]
  pub fn bootstrap_phase(&self) -> BootstrapPhase {
    self.bootstrap
  }

  #[inline]
  pub fn octree(&self) -> &Octree {
    &self.octree
  }

  #[inline]
  pub fn config(&self) -> &TerrainConfig {
    &self.config
  }

  #[inline]
  pub fn stats(&self) -> &SchedulerMetrics {
    &self.metrics
  }

  #[inline]
  pub fn scheduler(&self) -> &TaskScheduler {
    &self.scheduler
  }

  #[inline]
  pub fn lod_table(&self) -> &LodTable {
    &self.lod
  }

  #[inline]
  pub fn epoch(&self) -> u64 {
    self.epoch
  }

  /// Estimated camera velocity from the last two updates.
  #[inline]
  pub fn camera_velocity(&self) -> Vec3 {
    self.velocity
  }

  // ===========================================================================
  // Shared helpers
  // ===========================================================================

  /// Distance and memoized visibility of `id` for this frame.
  fn observe(&mut self, id: NodeId, frame: &Frame) -> Visibility {
    let frame_id = self.frame_id;
    let Some(node) = self.octree.get_mut(id) else {
      return Visibility::Outside;
    };
    node.distance_to_camera = node.center.distance(frame.camera);
    let visibility = match node.visibility_for(frame_id) {
      Some(vis) => vis,
      None => {
        let vis = frame.culler.classify(&node.bounds());
        node.visibility = Some((frame_id, vis));
        vis
      }
    };
    node.is_visible = visibility.is_visible();
    visibility
  }

  /// Resolve `id` with the density cull test. Returns true when the node was
  /// settled as homogeneous without a worker.
  fn prefilter(&mut self, id: NodeId, frame: &mut Frame) -> bool {
    let cull = self
      .octree
      .cull_test(id, self.field.as_ref(), self.config.seed, self.config.iso_bias);
    if !cull.is_homogeneous() {
      return false;
    }
    self.octree.release_chunk(id);
    if let Some(node) = self.octree.get_mut(id) {
      node.state = NodeState::Ready;
    }
    self.octree.update_geometry_status(id, false, self.epoch);
    frame.report.prefiltered += 1;
    true
  }

  /// Queue generation for `id` unless it already has a request in flight.
  ///
  /// A visible request for a node whose queued request is not visible
  /// replaces it with the upgraded one. Returns true for a new admission.
  fn request_generation(&mut self, id: NodeId, kind: RequestKind, frame: &mut Frame) -> bool {
    let Some(node) = self.octree.get(id) else {
      return false;
    };
    if let Some(ticket) = node.pending {
      let upgrade = kind.visible
        && self
          .scheduler
          .queued(id)
          .is_some_and(|queued| queued.ticket == ticket && !queued.is_visible);
      if !upgrade {
        return false;
      }
    }

    let request = GenerationRequest {
      node: id,
      key: node.key,
      level: node.level,
      center: node.center,
      priority: self.scheduler.params().compute(
        node.level,
        kind.visible,
        kind.speculative,
        node.center.distance(frame.camera),
      ),
      is_visible: kind.visible,
      is_essential: kind.essential,
      speculative: kind.speculative,
      timestamp: frame.now,
      ticket: self.scheduler.issue_ticket(),
    };
    let ticket = request.ticket;
    let key = request.key;

    match self.scheduler.submit(request) {
      Ok(Admission::Queued) => {
        self.mark_pending(id, ticket);
        frame.report.submitted += 1;
        true
      }
      Ok(Admission::QueuedWithEviction(evicted)) => {
        self.drop_request(&evicted, TaskError::Evicted, frame);
        self.mark_pending(id, ticket);
        frame.report.submitted += 1;
        true
      }
      Ok(Admission::Replaced(_)) => {
        self.mark_pending(id, ticket);
        false
      }
      Ok(Admission::Ignored) => false,
      // Backpressure; the traversal offers it again next frame.
      Err(err) => {
        tracing::trace!(?key, %err, "request refused");
        frame.report.rejected += 1;
        false
      }
    }
  }

  /// A queued request left the queues without running. The node goes back
  /// to rest so a later traversal can ask again.
  fn drop_request(&mut self, request: &GenerationRequest, reason: TaskError, frame: &mut Frame) {
    tracing::debug!(key = ?request.key, %reason, "request dropped");
    match reason {
      TaskError::Expired { .. } => frame.report.expired += 1,
      TaskError::Evicted => frame.report.evicted += 1,
      _ => {}
    }
    self.clear_pending(request.node, request.ticket);
  }

  fn mark_pending(&mut self, id: NodeId, ticket: u64) {
    if let Some(node) = self.octree.get_mut(id) {
      node.pending = Some(ticket);
      if node.chunk.is_none() {
        node.state = NodeState::Generating;
      }
    }
  }

  /// Forget the outstanding request `ticket` on `id`, if it is still the
  /// current one.
  fn clear_pending(&mut self, id: NodeId, ticket: u64) {
    let Some(node) = self.octree.get_mut(id) else {
      return;
    };
    if node.pending != Some(ticket) {
      return;
    }
    node.pending = None;
    node.state = idle_state(node);
  }
}

/// Resting state of a node with no outstanding request.
fn idle_state(node: &OctreeNode) -> NodeState {
  if node.retry {
    NodeState::Empty
  } else if node.chunk.is_some() || node.geometry_tested && !node.has_geometry {
    NodeState::Ready
  } else if node.children.is_some() && node.has_geometry {
    NodeState::Subdivided
  } else {
    NodeState::Empty
  }
}

/// Plain job parameters for `node` under `config`.
fn job_for(node: &OctreeNode, config: &TerrainConfig) -> GenerationJob {
  GenerationJob {
    origin: node.key.min_corner(config),
    size: node.size,
    resolution: config.grid_resolution,
    seed: config.seed,
    iso_bias: config.iso_bias,
    level: node.level,
    planet_center: config.planet_center_vec(),
    planet_radius: config.planet_radius,
  }
}
