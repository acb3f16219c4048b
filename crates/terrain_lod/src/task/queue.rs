//! Bounded priority queue of generation requests.
//!
//! Entries are kept sorted so the best request sits at the end of the vector
//! and `pop` is O(1). A membership set enforces one request per node.
//!
//! Admission control:
//! - a second request for a queued node replaces it only with a higher
//!   priority, otherwise it is ignored
//! - past `soft_limit`, background requests below `background_threshold` are
//!   rejected
//! - at `hard_limit`, the lowest non-visible request is evicted, but only for
//!   a strictly higher-priority arrival

use std::cmp::Ordering;
use std::collections::HashSet;

use glam::Vec3;
use web_time::Instant;

use super::request::{GenerationRequest, PriorityParams};
use crate::config::QueueConfig;
use crate::error::TaskError;
use crate::octree::NodeId;

/// Sort order of a queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueOrdering {
  /// Strict priority.
  Priority,
  /// Coarser level first, then priority. Used for essential work so
  /// ancestors always land before descendants.
  LevelThenPriority,
}

/// Outcome of a successful [`TaskQueue::submit`].
#[derive(Clone, Debug, PartialEq)]
pub enum Admission {
  Queued,
  /// Replaced a lower-priority request for the same node.
  Replaced(GenerationRequest),
  /// A request for the node with equal or higher priority is already queued.
  Ignored,
  /// Queued after evicting the returned request.
  QueuedWithEviction(GenerationRequest),
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueueLimits {
  pub soft_limit: usize,
  pub hard_limit: usize,
  pub background_threshold: f32,
  pub max_age_ms: u64,
}

impl QueueLimits {
  /// Limits of the regular queue.
  pub fn regular(config: &QueueConfig) -> Self {
    Self {
      soft_limit: config.soft_limit,
      hard_limit: config.hard_limit,
      background_threshold: config.background_threshold,
      max_age_ms: config.max_task_age_ms,
    }
  }

  /// Limits of the essential queue: a single hard capacity.
  pub fn essential(config: &QueueConfig) -> Self {
    Self {
      soft_limit: config.essential_capacity,
      hard_limit: config.essential_capacity,
      background_threshold: f32::NEG_INFINITY,
      max_age_ms: config.max_task_age_ms,
    }
  }
}

pub struct TaskQueue {
  ordering: QueueOrdering,
  limits: QueueLimits,
  /// Sorted ascending by rank; the best entry is last.
  entries: Vec<GenerationRequest>,
  members: HashSet<NodeId>,
}

impl TaskQueue {
  pub fn new(ordering: QueueOrdering, limits: QueueLimits) -> Self {
    Self {
      ordering,
      limits,
      entries: Vec::with_capacity(limits.hard_limit),
      members: HashSet::with_capacity(limits.hard_limit),
    }
  }

  /// Rank comparison; `Greater` dispatches first.
  fn rank(&self, a: &GenerationRequest, b: &GenerationRequest) -> Ordering {
    match self.ordering {
      QueueOrdering::Priority => a.priority.total_cmp(&b.priority),
      QueueOrdering::LevelThenPriority => b
        .level
        .cmp(&a.level)
        .then_with(|| a.priority.total_cmp(&b.priority)),
    }
  }

  fn insert_sorted(&mut self, request: GenerationRequest) {
    let at = self
      .entries
      .partition_point(|e| self.rank(e, &request) != Ordering::Greater);
    self.members.insert(request.node);
    self.entries.insert(at, request);
  }

  fn take_at(&mut self, index: usize) -> GenerationRequest {
    let request = self.entries.remove(index);
    self.members.remove(&request.node);
    request
  }

  /// Offer a request to the queue.
  ///
  /// Returns `Err(TaskError::QueueSaturated)` when admission control rejects
  /// it; that is backpressure, not a failure.
  pub fn submit(&mut self, request: GenerationRequest) -> Result<Admission, TaskError> {
    if self.members.contains(&request.node) {
      let Some(index) = self.entries.iter().position(|e| e.node == request.node) else {
        return Ok(Admission::Ignored);
      };
      if request.priority <= self.entries[index].priority {
        return Ok(Admission::Ignored);
      }
      let old = self.take_at(index);
      self.insert_sorted(request);
      return Ok(Admission::Replaced(old));
    }

    let background = !request.is_visible && !request.is_essential;
    if self.entries.len() >= self.limits.soft_limit
      && background
      && request.priority < self.limits.background_threshold
    {
      return Err(TaskError::QueueSaturated);
    }

    if self.entries.len() >= self.limits.hard_limit {
      let victim = self
        .entries
        .iter()
        .enumerate()
        .filter(|(_, e)| !e.is_visible)
        .min_by(|(_, a), (_, b)| a.priority.total_cmp(&b.priority))
        .map(|(i, e)| (i, e.priority));
      return match victim {
        Some((index, priority)) if priority < request.priority => {
          let evicted = self.take_at(index);
          self.insert_sorted(request);
          Ok(Admission::QueuedWithEviction(evicted))
        }
        _ => Err(TaskError::QueueSaturated),
      };
    }

    self.insert_sorted(request);
    Ok(Admission::Queued)
  }

  /// Put back a request this queue admitted earlier and just gave up.
  ///
  /// Skips admission control: the slot it frees on removal is still free, so
  /// the hard limit holds.
  pub(crate) fn restore(&mut self, request: GenerationRequest) {
    if self.members.contains(&request.node) {
      return;
    }
    self.insert_sorted(request);
  }

  /// Take the best request.
  pub fn pop(&mut self) -> Option<GenerationRequest> {
    let request = self.entries.pop()?;
    self.members.remove(&request.node);
    Some(request)
  }

  /// Best request without removing it.
  pub fn peek(&self) -> Option<&GenerationRequest> {
    self.entries.last()
  }

  pub fn remove(&mut self, node: NodeId) -> Option<GenerationRequest> {
    if !self.members.contains(&node) {
      return None;
    }
    let index = self.entries.iter().position(|e| e.node == node)?;
    Some(self.take_at(index))
  }

  pub fn get(&self, node: NodeId) -> Option<&GenerationRequest> {
    if !self.members.contains(&node) {
      return None;
    }
    self.entries.iter().find(|e| e.node == node)
  }

  /// Recompute every priority for the new camera position, re-sort, and
  /// return non-essential requests older than the max age, each paired with
  /// its [`TaskError::Expired`].
  pub fn reprioritize(
    &mut self,
    camera: Vec3,
    now: Instant,
    params: &PriorityParams,
  ) -> Vec<(GenerationRequest, TaskError)> {
    let max_age = self.limits.max_age_ms;
    let (expired, mut kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.entries)
      .into_iter()
      .partition(|e| !e.is_essential && e.age_ms(now) > max_age);

    for request in &mut kept {
      let distance = request.center.distance(camera);
      request.priority = params.compute(request.level, request.is_visible, request.speculative, distance);
    }
    kept.sort_by(|a, b| self.rank(a, b));

    for request in &expired {
      self.members.remove(&request.node);
    }
    self.entries = kept;
    expired
      .into_iter()
      .map(|request| {
        let age_ms = request.age_ms(now);
        (request, TaskError::Expired { age_ms })
      })
      .collect()
  }

  /// Remove everything.
  pub fn drain(&mut self) -> Vec<GenerationRequest> {
    self.members.clear();
    std::mem::take(&mut self.entries)
  }

  pub fn iter(&self) -> impl Iterator<Item = &GenerationRequest> {
    self.entries.iter().rev()
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.entries.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  #[inline]
  pub fn contains(&self, node: NodeId) -> bool {
    self.members.contains(&node)
  }

  #[inline]
  pub fn limits(&self) -> &QueueLimits {
    &self.limits
  }

  /// Fill ratio relative to the hard limit.
  pub fn fill(&self) -> f32 {
    if self.limits.hard_limit == 0 {
      return 1.0;
    }
    self.entries.len() as f32 / self.limits.hard_limit as f32
  }
}

#[cfg(test)]
#[path = "queue_test.rs"]
mod queue_test;
