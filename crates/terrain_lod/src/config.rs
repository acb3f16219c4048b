//! TerrainConfig - immutable configuration snapshot for one world-generation
//! cycle.
//!
//! The scheduler receives the config by value at construction and never
//! mutates it. Changing parameters is an explicit transition through
//! [`ChunkManager::regenerate`](crate::ChunkManager::regenerate) or
//! [`ChunkManager::set_iso_bias`](crate::ChunkManager::set_iso_bias).
//!
//! # Sizing
//!
//! ```text
//! root_size      = 2 * planet_radius * root_size_multiplier
//! node_size(L)   = root_size / 2^L          (L = 0 is the root)
//! voxel_size(L)  = node_size(L) / grid_resolution
//! ```

use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::octree::FrameBudget;

/// Root configuration for the terrain scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
  /// Voxels per node edge (N). Workers sample `(N + 2)^3` density values.
  pub grid_resolution: u32,
  /// Number of LOD levels. The finest level is `lod_levels - 1`.
  pub lod_levels: u32,
  /// Nominal planet radius in world units.
  pub planet_radius: f32,
  /// Planet center in world space.
  pub planet_center: [f32; 3],
  /// Root edge length relative to the planet diameter.
  pub root_size_multiplier: f32,
  /// Horizon occluder radius as a fraction of `planet_radius`.
  /// Must not exceed the lowest terrain point or visible ground gets culled.
  pub occluder_radius_factor: f32,
  /// A node subdivides when closer than `size * lod_distance_factor`.
  pub lod_distance_factor: f32,
  /// Width of the fade band relative to the subdivide distance.
  pub fade_overlap_factor: f32,
  /// Collapse safety margin as a fraction of the node size.
  pub collapse_margin_factor: f32,
  /// Requested worker count, capped by available hardware parallelism.
  pub max_workers: usize,
  /// Resident chunk budget.
  pub max_resident_chunks: usize,
  /// World seed forwarded to the density field.
  pub seed: u32,
  /// Iso-level bias forwarded to the density field.
  pub iso_bias: f32,
  /// Queue limits and priority tuning.
  pub queue: QueueConfig,
  /// Speculative generation ahead of a fast-moving camera.
  pub prefetch: PrefetchConfig,
  /// Per-frame subdivision/collapse limits.
  pub budget: FrameBudget,
}

/// Queue limits and priority tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
  /// Capacity of the essential (bootstrap / gap-filling) queue.
  pub essential_capacity: usize,
  /// Above this length, low-priority background submissions are rejected.
  pub soft_limit: usize,
  /// The regular queue never grows beyond this length.
  pub hard_limit: usize,
  /// Non-essential requests older than this are dropped.
  pub max_task_age_ms: u64,
  /// Background requests below this priority are rejected past the soft limit.
  pub background_threshold: f32,
  /// Multiplier on squared camera distance.
  pub distance_penalty_scale: f32,
  /// Upper bound of the distance penalty.
  pub distance_penalty_cap: f32,
}

/// Speculative generation ahead of a fast-moving camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
  pub enabled: bool,
  /// Camera speed (world units per second) above which prefetch kicks in.
  pub speed_threshold: f32,
  /// Extrapolation multiplier: `future = position + velocity * lookahead`.
  pub lookahead_seconds: f32,
  /// Prefetch only while the regular queue is below this fill ratio.
  pub max_queue_fill: f32,
  /// Cap on speculative submissions per frame.
  pub max_requests_per_frame: usize,
}

impl Default for TerrainConfig {
  fn default() -> Self {
    Self {
      grid_resolution: 32,
      lod_levels: 6,
      planet_radius: 1000.0,
      planet_center: [0.0; 3],
      root_size_multiplier: 1.25,
      occluder_radius_factor: 0.9,
      lod_distance_factor: 2.0,
      fade_overlap_factor: 0.35,
      collapse_margin_factor: 0.25,
      max_workers: 4,
      max_resident_chunks: 4096,
      seed: 1337,
      iso_bias: 0.0,
      queue: QueueConfig::default(),
      prefetch: PrefetchConfig::default(),
      budget: FrameBudget::default(),
    }
  }
}

impl Default for QueueConfig {
  fn default() -> Self {
    Self {
      essential_capacity: 64,
      soft_limit: 256,
      hard_limit: 512,
      max_task_age_ms: 4000,
      background_threshold: 0.0,
      distance_penalty_scale: 0.01,
      distance_penalty_cap: 50_000.0,
    }
  }
}

impl Default for PrefetchConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      speed_threshold: 50.0,
      lookahead_seconds: 1.5,
      max_queue_fill: 0.6,
      max_requests_per_frame: 8,
    }
  }
}

impl TerrainConfig {
  /// Parse and validate a TOML document. Missing fields take defaults.
  pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
    let config: TerrainConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
  }

  /// Load and validate a TOML configuration file.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    Self::from_toml_str(&text)
  }

  /// Check every field against its permitted range.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(2..=128).contains(&self.grid_resolution) {
      return Err(ConfigError::out_of_range(
        "grid_resolution",
        "in 2..=128",
        self.grid_resolution,
      ));
    }
    if !(1..=16).contains(&self.lod_levels) {
      return Err(ConfigError::out_of_range(
        "lod_levels",
        "in 1..=16",
        self.lod_levels,
      ));
    }
    if !(self.planet_radius > 0.0) {
      return Err(ConfigError::out_of_range(
        "planet_radius",
        "positive",
        self.planet_radius,
      ));
    }
    if !(self.root_size_multiplier >= 1.0) {
      return Err(ConfigError::out_of_range(
        "root_size_multiplier",
        ">= 1.0",
        self.root_size_multiplier,
      ));
    }
    if !(0.0..=1.0).contains(&self.occluder_radius_factor) {
      return Err(ConfigError::out_of_range(
        "occluder_radius_factor",
        "in 0.0..=1.0",
        self.occluder_radius_factor,
      ));
    }
    if !(self.lod_distance_factor > 0.0) {
      return Err(ConfigError::out_of_range(
        "lod_distance_factor",
        "positive",
        self.lod_distance_factor,
      ));
    }
    if !(self.fade_overlap_factor > 0.1 && self.fade_overlap_factor < 0.8) {
      return Err(ConfigError::out_of_range(
        "fade_overlap_factor",
        "in (0.1, 0.8)",
        self.fade_overlap_factor,
      ));
    }
    if !(self.collapse_margin_factor >= 0.0) {
      return Err(ConfigError::out_of_range(
        "collapse_margin_factor",
        ">= 0.0",
        self.collapse_margin_factor,
      ));
    }
    if self.max_workers == 0 {
      return Err(ConfigError::out_of_range("max_workers", ">= 1", 0));
    }
    if self.max_resident_chunks == 0 {
      return Err(ConfigError::out_of_range("max_resident_chunks", ">= 1", 0));
    }
    if self.queue.essential_capacity < 8 {
      return Err(ConfigError::out_of_range(
        "queue.essential_capacity",
        ">= 8",
        self.queue.essential_capacity,
      ));
    }
    if self.queue.soft_limit == 0 || self.queue.soft_limit > self.queue.hard_limit {
      return Err(ConfigError::out_of_range(
        "queue.soft_limit",
        "in 1..=hard_limit",
        self.queue.soft_limit,
      ));
    }
    if !(self.queue.distance_penalty_cap >= 0.0) {
      return Err(ConfigError::out_of_range(
        "queue.distance_penalty_cap",
        ">= 0.0",
        self.queue.distance_penalty_cap,
      ));
    }
    if !(0.0..=1.0).contains(&self.prefetch.max_queue_fill) {
      return Err(ConfigError::out_of_range(
        "prefetch.max_queue_fill",
        "in 0.0..=1.0",
        self.prefetch.max_queue_fill,
      ));
    }
    Ok(())
  }

  /// Edge length of the root node.
  #[inline]
  pub fn root_size(&self) -> f32 {
    2.0 * self.planet_radius * self.root_size_multiplier
  }

  /// Edge length of a node at `level`.
  #[inline]
  pub fn node_size(&self, level: u32) -> f32 {
    self.root_size() / (1u64 << level) as f32
  }

  /// Voxel edge length at `level`.
  #[inline]
  pub fn voxel_size(&self, level: u32) -> f32 {
    self.node_size(level) / self.grid_resolution as f32
  }

  /// Finest subdivision level.
  #[inline]
  pub fn max_level(&self) -> u32 {
    self.lod_levels.saturating_sub(1)
  }

  #[inline]
  pub fn planet_center_vec(&self) -> Vec3 {
    Vec3::from_array(self.planet_center)
  }

  /// Radius of the opaque horizon sphere.
  #[inline]
  pub fn occluder_radius(&self) -> f32 {
    self.planet_radius * self.occluder_radius_factor
  }

  /// Worker count after the hardware cap.
  pub fn effective_workers(&self) -> usize {
    let hardware = std::thread::available_parallelism()
      .map(|n| n.get())
      .unwrap_or(1);
    self.max_workers.min(hardware).max(1)
  }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
