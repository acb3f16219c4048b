//! Chunk generation: sample density, extract the isosurface, shade vertices.
//!
//! Runs on worker threads. A [`GenerationJob`] carries plain parameters only,
//! the result is a [`ChunkMesh`] of plain data. Nothing here touches tree
//! state.
//!
//! # Sampling layout
//!
//! ```text
//! voxel   = size / N
//! samples = (N + 2)^3, spacing `voxel`, starting at the node min corner
//! covers  = [min, max + voxel]   (size plus one voxel)
//! ```
//!
//! Surface nets skips faces on the positive boundary, so the extra sample
//! layer closes the seam against the +X/+Y/+Z neighbour at the same level.

use fast_surface_nets::ndshape::{RuntimeShape, Shape};
use fast_surface_nets::{surface_nets, SurfaceNetsBuffer};
use glam::Vec3;

use crate::bounds::Aabb;
use crate::chunk::{ChunkMesh, ChunkVertex};
use crate::density::{DensityField, ISO_LEVEL};
use crate::error::GenerationError;

/// Plain parameters for one generation task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GenerationJob {
  /// Minimum corner of the node.
  pub origin: Vec3,
  /// Node edge length.
  pub size: f32,
  /// Voxels per edge (N).
  pub resolution: u32,
  pub seed: u32,
  pub iso_bias: f32,
  pub level: u32,
  /// Planet center and radius for slope/altitude material weights.
  pub planet_center: Vec3,
  pub planet_radius: f32,
}

impl GenerationJob {
  #[inline]
  pub fn voxel_size(&self) -> f32 {
    self.size / self.resolution as f32
  }

  /// Samples per axis.
  #[inline]
  pub fn sample_count(&self) -> u32 {
    self.resolution + 2
  }

  /// Region covered by the samples.
  pub fn extraction_bounds(&self) -> Aabb {
    let v = self.voxel_size();
    Aabb::new(self.origin, self.origin + Vec3::splat(self.size + v))
  }
}

/// Generate the mesh for one node.
///
/// Returns [`GenerationError::NonFiniteDensity`] if the field yields NaN or
/// infinity anywhere in the sampled volume.
pub fn generate_chunk<F: DensityField + ?Sized>(
  job: &GenerationJob,
  field: &F,
) -> Result<ChunkMesh, GenerationError> {
  let n = job.sample_count();
  let voxel = job.voxel_size();
  let shape = RuntimeShape::<u32, 3>::new([n, n, n]);
  let mut sdf = vec![0.0f32; shape.usize()];

  for z in 0..n {
    for y in 0..n {
      for x in 0..n {
        let p = job.origin + Vec3::new(x as f32, y as f32, z as f32) * voxel;
        let d = field.density(p.x, p.y, p.z, job.seed, job.iso_bias);
        if !d.is_finite() {
          return Err(GenerationError::NonFiniteDensity {
            x: p.x,
            y: p.y,
            z: p.z,
          });
        }
        // Surface nets wants negative inside.
        sdf[shape.linearize([x, y, z]) as usize] = ISO_LEVEL - d;
      }
    }
  }

  if is_homogeneous(&sdf) {
    return Ok(ChunkMesh::empty(job.extraction_bounds()));
  }

  let mut buffer = SurfaceNetsBuffer::default();
  surface_nets(&sdf, &shape, [0; 3], [n - 1; 3], &mut buffer);

  if buffer.indices.is_empty() {
    return Ok(ChunkMesh::empty(job.extraction_bounds()));
  }

  let mut bounds = Aabb::empty();
  let vertices = buffer
    .positions
    .iter()
    .map(|local| {
      let p = job.origin + Vec3::from_array(*local) * voxel;
      bounds.encapsulate(p);
      let normal = estimate_normal(field, p, voxel * 0.5, job);
      ChunkVertex {
        position: p.to_array(),
        normal: normal.to_array(),
        material_weights: material_weights(p, normal, job),
      }
    })
    .collect();

  Ok(ChunkMesh {
    vertices,
    indices: buffer.indices,
    bounds,
    is_empty: false,
  })
}

/// True when every sample has the same sign (no surface crossing).
#[inline]
fn is_homogeneous(sdf: &[f32]) -> bool {
  let first = sdf[0] < 0.0;
  sdf.iter().all(|&v| (v < 0.0) == first)
}

/// Outward normal from central differences of the density field.
///
/// Density grows inward, so the normal is the negated gradient.
pub fn estimate_normal<F: DensityField + ?Sized>(
  field: &F,
  p: Vec3,
  step: f32,
  job: &GenerationJob,
) -> Vec3 {
  let sample = |q: Vec3| field.density(q.x, q.y, q.z, job.seed, job.iso_bias);
  let dx = sample(p + Vec3::X * step) - sample(p - Vec3::X * step);
  let dy = sample(p + Vec3::Y * step) - sample(p - Vec3::Y * step);
  let dz = sample(p + Vec3::Z * step) - sample(p - Vec3::Z * step);
  let gradient = -Vec3::new(dx, dy, dz);

  if gradient.length_squared() < 1e-12 {
    // Fallback to the planet's up vector.
    return (p - job.planet_center).try_normalize().unwrap_or(Vec3::Y);
  }
  gradient.normalize()
}

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
  let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
  t * t * (3.0 - 2.0 * t)
}

/// Material weights from slope and altitude: rock, grass, sand, snow.
///
/// Altitude is measured relative to `planet_radius` in units of 2% of it.
pub fn material_weights(p: Vec3, normal: Vec3, job: &GenerationJob) -> [f32; 4] {
  let offset = p - job.planet_center;
  let up = offset.try_normalize().unwrap_or(Vec3::Y);
  let flatness = normal.dot(up).max(0.0);
  let band = (job.planet_radius * 0.02).max(f32::EPSILON);
  let altitude = (offset.length() - job.planet_radius) / band;

  let rock = 1.0 - smoothstep(0.6, 0.85, flatness);
  let soft = 1.0 - rock;
  let sand = soft * (1.0 - smoothstep(-0.5, 0.0, altitude));
  let snow = soft * smoothstep(1.0, 1.5, altitude);
  let grass = (soft - sand - snow).max(0.0);

  let mut weights = [rock, grass, sand, snow];
  let sum: f32 = weights.iter().sum();
  if sum > 0.0001 {
    let inv_sum = 1.0 / sum;
    for w in &mut weights {
      *w *= inv_sum;
    }
  } else {
    weights = [1.0, 0.0, 0.0, 0.0];
  }
  weights
}

#[cfg(test)]
#[path = "extract_test.rs"]
mod extract_test;
