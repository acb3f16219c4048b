//! terrain_lod - adaptive octree LOD scheduling for volumetric planets
//!
//! This crate decides, every frame, which pieces of a planet-sized density
//! field to mesh and at what resolution, and schedules that work on a
//! bounded pool of worker threads. It is engine independent: the host feeds
//! camera snapshots in and reads chunk meshes out.
//!
//! # Features
//!
//! - **Octree LOD**: distance-driven subdivision with hysteresis, so a camera
//!   resting on a boundary never makes nodes flicker
//! - **Geometry propagation**: nodes tested empty are never subdivided;
//!   emptiness is confirmed upward only when all 8 children agree
//! - **Culling**: view frustum plus horizon occlusion against the planet
//!   sphere, and a 5-sample density test that skips homogeneous nodes
//! - **Scheduling**: bounded, deduplicating priority queues with admission
//!   control, eviction and expiry, plus speculative prefetch along the
//!   camera's path
//! - **Surface Nets**: chunk meshes via `fast-surface-nets`, with central
//!   difference normals and slope/altitude material weights
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use terrain_lod::{CameraState, ChunkManager, PlanetDensity, TerrainConfig};
//!
//! let config = TerrainConfig::default();
//! let field = Arc::new(PlanetDensity::new(config.planet_center_vec(), config.planet_radius));
//! let mut manager = ChunkManager::new(config, field)?;
//!
//! let camera = CameraState::looking_at(eye, glam::Vec3::ZERO, 1.0, 16.0 / 9.0, 0.1, 1.0e5);
//! let report = manager.update(&camera, 1.0 / 60.0);
//! for item in manager.renderables() {
//!     upload(item.handle, item.mesh.vertex_bytes(), item.mesh.index_bytes());
//! }
//! ```

pub mod bounds;
pub mod chunk;
pub mod config;
pub mod culling;
pub mod density;
pub mod error;
pub mod extract;
pub mod manager;
pub mod metrics;
pub mod octree;
pub mod task;

// Re-export commonly used items
pub use bounds::Aabb;
pub use chunk::{Chunk, ChunkHandle, ChunkMesh, ChunkVertex};
pub use config::{PrefetchConfig, QueueConfig, TerrainConfig};
pub use culling::{Culler, Frustum, HorizonOccluder, Visibility};
pub use density::{DensityField, PlanetDensity, SphereDensity, ISO_LEVEL};
pub use error::{ConfigError, GenerationError, SchedulerError, TaskError};
pub use extract::{generate_chunk, GenerationJob};
pub use manager::{BootstrapPhase, CameraState, ChunkManager, RenderItem};
pub use metrics::{FrameReport, RollingWindow, SchedulerMetrics};
pub use octree::{FrameBudget, LodThresholds, NodeId, NodeKey, NodeState, Octree, OctreeNode};
pub use task::{GenerationRequest, PoolMode, TaskQueue, TaskScheduler, WorkerPool};
