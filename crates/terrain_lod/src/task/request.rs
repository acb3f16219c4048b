//! Generation requests and the priority function.
//!
//! ```text
//! base     = LEVEL_STEP * (levels - level)
//!          + (level == 0 ? ROOT_BONUS : 0)
//!          + (visible ? VISIBLE_BAND : 0)
//!          - (speculative ? SPECULATIVE_TIER : 0)
//! priority = base - min(distance^2 * scale, cap)
//! ```
//!
//! `cap <= MAX_DISTANCE_PENALTY` keeps the bands apart: the weakest visible
//! request still outranks the strongest background one.

use glam::Vec3;
use web_time::Instant;

use crate::config::TerrainConfig;
use crate::octree::{NodeId, NodeKey};

/// Added to every visible request.
pub const VISIBLE_BAND: f32 = 1_000_000.0;
/// Added to the root request.
pub const ROOT_BONUS: f32 = 100_000.0;
/// Per-level step, coarser levels rank higher.
pub const LEVEL_STEP: f32 = 10_000.0;
/// Subtracted from predictive requests.
pub const SPECULATIVE_TIER: f32 = 500_000.0;
/// Largest permitted distance penalty cap.
pub const MAX_DISTANCE_PENALTY: f32 = 500_000.0;

/// A node's claim on a worker.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
  pub node: NodeId,
  pub key: NodeKey,
  pub level: u32,
  /// Node center, kept for re-prioritization as the camera moves.
  pub center: Vec3,
  pub priority: f32,
  pub is_visible: bool,
  /// Bootstrap or gap-filling work; never expires.
  pub is_essential: bool,
  /// Predicted ahead of the camera.
  pub speculative: bool,
  pub timestamp: Instant,
  /// Matches `OctreeNode::pending` while the request is wanted.
  pub ticket: u64,
}

impl GenerationRequest {
  /// Milliseconds spent waiting since `timestamp`.
  pub fn age_ms(&self, now: Instant) -> u64 {
    now.saturating_duration_since(self.timestamp).as_millis() as u64
  }
}

/// Inputs of the priority function.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriorityParams {
  pub lod_levels: u32,
  pub distance_penalty_scale: f32,
  pub distance_penalty_cap: f32,
}

impl PriorityParams {
  pub fn from_config(config: &TerrainConfig) -> Self {
    Self {
      lod_levels: config.lod_levels,
      distance_penalty_scale: config.queue.distance_penalty_scale,
      distance_penalty_cap: config.queue.distance_penalty_cap.min(MAX_DISTANCE_PENALTY),
    }
  }

  #[inline]
  pub fn compute(&self, level: u32, visible: bool, speculative: bool, distance: f32) -> f32 {
    compute_priority(self, level, visible, speculative, distance)
  }
}

/// Priority of a request; higher is dispatched first.
pub fn compute_priority(
  params: &PriorityParams,
  level: u32,
  visible: bool,
  speculative: bool,
  distance: f32,
) -> f32 {
  let mut base = LEVEL_STEP * params.lod_levels.saturating_sub(level) as f32;
  if level == 0 {
    base += ROOT_BONUS;
  }
  if visible {
    base += VISIBLE_BAND;
  }
  if speculative {
    base -= SPECULATIVE_TIER;
  }
  let penalty = (distance * distance * params.distance_penalty_scale)
    .min(params.distance_penalty_cap)
    .max(0.0);
  base - penalty
}

#[cfg(test)]
mod tests {
  use super::*;

  fn params() -> PriorityParams {
    PriorityParams {
      lod_levels: 16,
      distance_penalty_scale: 0.01,
      distance_penalty_cap: MAX_DISTANCE_PENALTY,
    }
  }

  /// Any visible request outranks any background request.
  #[test]
  fn test_visible_band_dominates() {
    let p = params();
    let weakest_visible = compute_priority(&p, 15, true, false, 1.0e9);
    let strongest_background = compute_priority(&p, 0, false, false, 0.0);
    assert!(
      weakest_visible > strongest_background,
      "{} <= {}",
      weakest_visible,
      strongest_background
    );
  }

  #[test]
  fn test_root_and_coarse_levels_rank_higher() {
    let p = params();
    let root = compute_priority(&p, 0, true, false, 10.0);
    let level1 = compute_priority(&p, 1, true, false, 10.0);
    let level5 = compute_priority(&p, 5, true, false, 10.0);
    assert!(root - level1 > ROOT_BONUS);
    assert!(level1 > level5);
  }

  #[test]
  fn test_distance_penalty_capped() {
    let p = PriorityParams {
      distance_penalty_cap: 1000.0,
      ..params()
    };
    let near = compute_priority(&p, 3, false, false, 0.0);
    let far = compute_priority(&p, 3, false, false, 1.0e6);
    assert_eq!(near - far, 1000.0);
    let mid = compute_priority(&p, 3, false, false, 100.0);
    assert_eq!(near - mid, 100.0);
  }

  #[test]
  fn test_speculative_below_background() {
    let p = params();
    let speculative = compute_priority(&p, 4, false, true, 0.0);
    let background = compute_priority(&p, 4, false, false, 0.0);
    assert_eq!(background - speculative, SPECULATIVE_TIER);
  }

  #[test]
  fn test_config_cap_is_clamped() {
    let mut config = TerrainConfig::default();
    config.queue.distance_penalty_cap = 5.0e6;
    let p = PriorityParams::from_config(&config);
    assert_eq!(p.distance_penalty_cap, MAX_DISTANCE_PENALTY);
  }
}
