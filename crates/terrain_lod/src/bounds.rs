//! Axis-aligned bounding box used for node extents, extraction bounds and
//! culling.

use glam::Vec3;

/// Axis-aligned bounding box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
	/// Minimum corner (inclusive).
	pub min: Vec3,
	/// Maximum corner (inclusive).
	pub max: Vec3,
}

impl Aabb {
	/// Create a new AABB from min and max corners.
	///
	/// # Panics
	/// Debug-asserts that min <= max on all axes.
	pub fn new(min: Vec3, max: Vec3) -> Self {
		debug_assert!(
			min.x <= max.x && min.y <= max.y && min.z <= max.z,
			"AABB min must be <= max on all axes"
		);
		Self { min, max }
	}

	/// Create a cube from its center and edge length.
	pub fn from_center_size(center: Vec3, size: f32) -> Self {
		let half = Vec3::splat(size * 0.5);
		Self {
			min: center - half,
			max: center + half,
		}
	}

	/// Inverted box, ready for [`encapsulate`](Self::encapsulate).
	pub fn empty() -> Self {
		Self {
			min: Vec3::splat(f32::INFINITY),
			max: Vec3::splat(f32::NEG_INFINITY),
		}
	}

	/// Expand to include a point.
	#[inline]
	pub fn encapsulate(&mut self, point: Vec3) {
		self.min = self.min.min(point);
		self.max = self.max.max(point);
	}

	/// Check if min <= max on all axes.
	#[inline]
	pub fn is_valid(&self) -> bool {
		self.min.cmple(self.max).all()
	}

	/// Check if this AABB overlaps with another (boundary contact counts).
	#[inline]
	pub fn overlaps(&self, other: &Aabb) -> bool {
		self.min.cmple(other.max).all() && self.max.cmpge(other.min).all()
	}

	/// Check if this AABB contains a point.
	#[inline]
	pub fn contains_point(&self, point: Vec3) -> bool {
		point.cmpge(self.min).all() && point.cmple(self.max).all()
	}

	/// Get the size of the AABB (max - min).
	#[inline]
	pub fn size(&self) -> Vec3 {
		self.max - self.min
	}

	/// Get the center of the AABB.
	#[inline]
	pub fn center(&self) -> Vec3 {
		(self.min + self.max) * 0.5
	}

	/// Half the length of the main diagonal.
	#[inline]
	pub fn half_diagonal(&self) -> f32 {
		self.size().length() * 0.5
	}

	/// The 8 corners, bit 0 = +X, bit 1 = +Y, bit 2 = +Z.
	pub fn corners(&self) -> [Vec3; 8] {
		std::array::from_fn(|i| {
			Vec3::new(
				if i & 1 != 0 { self.max.x } else { self.min.x },
				if i & 2 != 0 { self.max.y } else { self.min.y },
				if i & 4 != 0 { self.max.z } else { self.min.z },
			)
		})
	}
}
