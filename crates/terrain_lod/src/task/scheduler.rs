//! TaskScheduler - two request queues in front of the worker pool.
//!
//! Following the stage pattern: Submit → Dispatch → Poll
//!
//! The essential queue (bootstrap and gap-filling work, level-then-priority
//! order) always drains before the regular queue. Dispatch stops when every
//! worker slot is busy; a slot frees up once its result has been polled.

use glam::Vec3;
use web_time::Instant;

use super::pool::{GenerationResult, WorkerPool};
use super::queue::{Admission, QueueLimits, QueueOrdering, TaskQueue};
use super::request::{GenerationRequest, PriorityParams};
use crate::config::TerrainConfig;
use crate::error::TaskError;
use crate::extract::GenerationJob;
use crate::octree::NodeId;

/// Counts from one [`TaskScheduler::dispatch`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
  pub dispatched: usize,
  /// Popped but no longer wanted by their node.
  pub dropped: usize,
}

pub struct TaskScheduler {
  essential: TaskQueue,
  regular: TaskQueue,
  pool: WorkerPool,
  params: PriorityParams,
  next_ticket: u64,
}

impl TaskScheduler {
  pub fn new(config: &TerrainConfig, pool: WorkerPool) -> Self {
    Self {
      essential: TaskQueue::new(
        QueueOrdering::LevelThenPriority,
        QueueLimits::essential(&config.queue),
      ),
      regular: TaskQueue::new(QueueOrdering::Priority, QueueLimits::regular(&config.queue)),
      pool,
      params: PriorityParams::from_config(config),
      next_ticket: 1,
    }
  }

  /// Fresh ticket for a new request.
  pub fn issue_ticket(&mut self) -> u64 {
    let ticket = self.next_ticket;
    self.next_ticket += 1;
    ticket
  }

  #[inline]
  pub fn params(&self) -> &PriorityParams {
    &self.params
  }

  /// Route a request to its queue.
  ///
  /// An essential request supersedes a regular one for the same node; a
  /// regular request never displaces an essential one.
  pub fn submit(&mut self, request: GenerationRequest) -> Result<Admission, TaskError> {
    if request.is_essential {
      let superseded = self.regular.remove(request.node);
      return match self.essential.submit(request) {
        Ok(Admission::Queued) => Ok(match superseded {
          Some(old) => Admission::Replaced(old),
          None => Admission::Queued,
        }),
        Err(err) => {
          if let Some(old) = superseded {
            self.regular.restore(old);
          }
          Err(err)
        }
        other => other,
      };
    }
    if self.essential.contains(request.node) {
      return Ok(Admission::Ignored);
    }
    self.regular.submit(request)
  }

  /// Remove any queued request for `node`.
  pub fn cancel(&mut self, node: NodeId) -> Option<GenerationRequest> {
    self
      .essential
      .remove(node)
      .or_else(|| self.regular.remove(node))
  }

  pub fn queued(&self, node: NodeId) -> Option<&GenerationRequest> {
    self.essential.get(node).or_else(|| self.regular.get(node))
  }

  /// Re-score all queued requests for the camera and return expired ones.
  pub fn reprioritize(&mut self, camera: Vec3, now: Instant) -> Vec<(GenerationRequest, TaskError)> {
    let mut expired = self.essential.reprioritize(camera, now, &self.params);
    expired.extend(self.regular.reprioritize(camera, now, &self.params));
    expired
  }

  /// Hand requests to idle workers in strict priority order, essential
  /// first.
  ///
  /// `make_job` turns a request into a job, or returns `None` when the node
  /// no longer wants it.
  pub fn dispatch<F>(&mut self, mut make_job: F) -> DispatchStats
  where
    F: FnMut(&GenerationRequest) -> Option<GenerationJob>,
  {
    let mut stats = DispatchStats::default();
    while self.pool.idle_workers() > 0 {
      let Some(request) = self.essential.pop().or_else(|| self.regular.pop()) else {
        break;
      };
      match make_job(&request) {
        Some(job) => {
          tracing::trace!(
            key = ?request.key,
            priority = request.priority,
            essential = request.is_essential,
            "dispatch"
          );
          self.pool.spawn(request.node, request.ticket, job);
          stats.dispatched += 1;
        }
        None => stats.dropped += 1,
      }
    }
    stats
  }

  /// Finished jobs since the last poll.
  pub fn poll_completions(&mut self) -> Vec<GenerationResult> {
    self.pool.poll()
  }

  /// Run deferred jobs (no-op for a threaded pool).
  pub fn tick(&mut self) -> usize {
    self.pool.tick()
  }

  /// Drop all queued requests and abandon in-flight jobs.
  pub fn cancel_all(&mut self) -> Vec<GenerationRequest> {
    let mut dropped = self.essential.drain();
    dropped.extend(self.regular.drain());
    self.pool.cancel_all();
    dropped
  }

  #[inline]
  pub fn queued_len(&self) -> usize {
    self.essential.len() + self.regular.len()
  }

  pub fn is_idle(&self) -> bool {
    self.queued_len() == 0 && self.pool.in_flight() == 0
  }

  #[inline]
  pub fn essential(&self) -> &TaskQueue {
    &self.essential
  }

  #[inline]
  pub fn regular(&self) -> &TaskQueue {
    &self.regular
  }

  #[inline]
  pub fn pool(&self) -> &WorkerPool {
    &self.pool
  }
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod scheduler_test;
