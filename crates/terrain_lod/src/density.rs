//! Scalar density fields.
//!
//! A density field is a pure function of world position, seed and iso bias.
//! Values above [`ISO_LEVEL`] are solid, values below are air. Implementations
//! hold no interior mutability, so one field is shared by every worker through
//! an `Arc` without locking.

use glam::Vec3;
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

/// Isovalue separating solid from air.
pub const ISO_LEVEL: f32 = 0.5;

/// Pure scalar field sampled by the workers and by the node cull test.
pub trait DensityField: Send + Sync {
  /// Density at a world position. Must be deterministic for equal inputs.
  fn density(&self, x: f32, y: f32, z: f32, seed: u32, iso_bias: f32) -> f32;

  /// Upper bound of the gradient magnitude.
  ///
  /// The cull test uses it to turn 5 point samples into a conservative
  /// statement about a whole box.
  fn lipschitz(&self) -> f32;

  #[inline]
  fn density_at(&self, p: Vec3, seed: u32, iso_bias: f32) -> f32 {
    self.density(p.x, p.y, p.z, seed, iso_bias)
  }
}

// =============================================================================
// Sphere
// =============================================================================

/// Solid ball. Density falls off linearly with distance from the surface.
///
/// `density = 0.5 + (radius - |p - center|) + iso_bias`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphereDensity {
  pub center: Vec3,
  pub radius: f32,
}

impl SphereDensity {
  pub fn new(center: Vec3, radius: f32) -> Self {
    Self { center, radius }
  }

  /// Sphere at the origin.
  pub fn at_origin(radius: f32) -> Self {
    Self::new(Vec3::ZERO, radius)
  }
}

impl DensityField for SphereDensity {
  #[inline]
  fn density(&self, x: f32, y: f32, z: f32, _seed: u32, iso_bias: f32) -> f32 {
    let dist = (Vec3::new(x, y, z) - self.center).length();
    ISO_LEVEL + (self.radius - dist) + iso_bias
  }

  fn lipschitz(&self) -> f32 {
    1.0
  }
}

// =============================================================================
// Planet
// =============================================================================

/// Bound on the gradient of one Perlin octave per unit frequency, after the
/// generator's output scaling. Loose on purpose: the cull test only needs it
/// to be an upper bound.
const PERLIN_SLOPE: f64 = 12.0;

/// Octave cap of the fBm generator.
const MAX_OCTAVES: usize = 32;

/// Span of the per-seed domain offset, in noise lattice cells.
const SEED_OFFSET_CELLS: f64 = 1024.0;

/// Sphere with fBm Perlin displacement of its surface.
///
/// The Perlin tables are built once from the planet's own seed. A density
/// call with a different `seed` samples the same generator at a domain
/// offset derived from that seed, so one field serves any world seed
/// without rebuilding tables.
#[derive(Clone, Debug)]
pub struct PlanetDensity {
  pub center: Vec3,
  pub radius: f32,
  /// Peak displacement of the surface in world units.
  pub amplitude: f32,
  seed: u32,
  frequency: f64,
  octaves: usize,
  lacunarity: f64,
  persistence: f64,
  noise: Fbm<Perlin>,
}

impl PlanetDensity {
  /// Planet with displacement proportional to its radius.
  pub fn new(center: Vec3, radius: f32) -> Self {
    let frequency = 4.0 / radius.max(f32::EPSILON) as f64;
    let mut planet = Self {
      center,
      radius,
      amplitude: radius * 0.04,
      seed: 0,
      frequency,
      octaves: 5,
      lacunarity: 2.0,
      persistence: 0.5,
      noise: Fbm::<Perlin>::new(0),
    };
    planet.rebuild();
    planet
  }

  pub fn with_amplitude(mut self, amplitude: f32) -> Self {
    self.amplitude = amplitude;
    self
  }

  pub fn with_octaves(mut self, octaves: u32) -> Self {
    self.octaves = (octaves as usize).clamp(1, MAX_OCTAVES);
    self.rebuild();
    self
  }

  /// Seed the Perlin tables. Calls with this seed sample them unshifted.
  pub fn with_seed(mut self, seed: u32) -> Self {
    self.seed = seed;
    self.rebuild();
    self
  }

  #[inline]
  pub fn seed(&self) -> u32 {
    self.seed
  }

  fn rebuild(&mut self) {
    self.noise = Fbm::<Perlin>::new(self.seed)
      .set_octaves(self.octaves)
      .set_frequency(self.frequency)
      .set_lacunarity(self.lacunarity)
      .set_persistence(self.persistence);
  }

  /// World-space shift for `seed`; zero for the planet's own seed.
  fn seed_offset(&self, seed: u32) -> [f64; 3] {
    let key = seed ^ self.seed;
    if key == 0 {
      return [0.0; 3];
    }
    let cells = |salt: u32| {
      let h = key.wrapping_mul(0x9E37_79B1).rotate_left(salt) ^ salt.wrapping_mul(0x85EB_CA6B);
      (h as f64 / u32::MAX as f64) * SEED_OFFSET_CELLS / self.frequency
    };
    [cells(7), cells(13), cells(21)]
  }

  /// Fractal surface noise in `[-1, 1]` at `p` relative to the center.
  fn surface_noise(&self, p: Vec3, seed: u32) -> f32 {
    let [ox, oy, oz] = self.seed_offset(seed);
    let value = self
      .noise
      .get([p.x as f64 + ox, p.y as f64 + oy, p.z as f64 + oz]);
    value.clamp(-1.0, 1.0) as f32
  }
}

impl DensityField for PlanetDensity {
  fn density(&self, x: f32, y: f32, z: f32, seed: u32, iso_bias: f32) -> f32 {
    let p = Vec3::new(x, y, z) - self.center;
    let height = self.radius + self.amplitude * self.surface_noise(p, seed);
    ISO_LEVEL + (height - p.length()) + iso_bias
  }

  fn lipschitz(&self) -> f32 {
    // Normalized by the amplitudes of octaves 1..=n, the smaller of the
    // sums fBm may divide by.
    let mut norm = 0.0;
    let mut slope = 0.0;
    let mut amp = 1.0;
    let mut freq = self.frequency;
    for _ in 0..self.octaves {
      slope += amp * freq;
      amp *= self.persistence;
      norm += amp;
      freq *= self.lacunarity;
    }
    if norm <= 0.0 {
      return 1.0 + (self.amplitude as f64 * PERLIN_SLOPE * self.frequency) as f32;
    }
    1.0 + (self.amplitude as f64 * PERLIN_SLOPE * slope / norm) as f32
  }
}

#[cfg(test)]
#[path = "density_test.rs"]
mod density_test;
