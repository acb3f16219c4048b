//! Per-level subdivide/collapse distances.
//!
//! ```text
//! subdivide      = size * lod_distance_factor
//! fade_out_start = subdivide
//! fade_out_end   = subdivide * (1 + fade_overlap_factor)
//! collapse       = fade_out_end + collapse_margin_factor * size
//! ```
//!
//! With `fade_overlap_factor > 0` the collapse distance is always strictly
//! greater than the subdivide distance, so a camera resting on the boundary
//! cannot make a node oscillate.

use crate::config::TerrainConfig;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LodThresholds {
  pub subdivide: f32,
  pub fade_out_start: f32,
  pub fade_out_end: f32,
  pub collapse: f32,
}

impl LodThresholds {
  pub fn for_size(size: f32, config: &TerrainConfig) -> Self {
    let subdivide = size * config.lod_distance_factor;
    let fade_out_end = subdivide * (1.0 + config.fade_overlap_factor);
    Self {
      subdivide,
      fade_out_start: subdivide,
      fade_out_end,
      collapse: fade_out_end + config.collapse_margin_factor * size,
    }
  }

  pub fn for_level(level: u32, config: &TerrainConfig) -> Self {
    Self::for_size(config.node_size(level), config)
  }

  /// Cross-fade weight of the coarse node: 1 inside `fade_out_start`,
  /// 0 beyond `fade_out_end`.
  pub fn fade(&self, distance: f32) -> f32 {
    let span = self.fade_out_end - self.fade_out_start;
    if span <= 0.0 {
      return if distance < self.fade_out_start { 1.0 } else { 0.0 };
    }
    1.0 - ((distance - self.fade_out_start) / span).clamp(0.0, 1.0)
  }
}

/// Thresholds for every level, computed once per configuration snapshot.
#[derive(Clone, Debug)]
pub struct LodTable {
  levels: Vec<LodThresholds>,
}

impl LodTable {
  pub fn new(config: &TerrainConfig) -> Self {
    Self {
      levels: (0..config.lod_levels)
        .map(|level| LodThresholds::for_level(level, config))
        .collect(),
    }
  }

  #[inline]
  pub fn get(&self, level: u32) -> &LodThresholds {
    &self.levels[(level as usize).min(self.levels.len() - 1)]
  }

  pub fn len(&self) -> usize {
    self.levels.len()
  }

  pub fn is_empty(&self) -> bool {
    self.levels.is_empty()
  }
}
