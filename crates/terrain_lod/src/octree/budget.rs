//! Per-frame caps on structural tree edits.
//!
//! A camera jump can make hundreds of nodes eligible for subdivision or
//! collapse in the same update. The traversal counts what it has done and
//! stops editing once a cap is hit; the rest is picked up next frame.

use serde::{Deserialize, Serialize};

/// Caps on subdivisions and collapses per update. A cap of 0 disables it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameBudget {
	pub max_subdivisions: usize,
	pub max_collapses: usize,
}

impl FrameBudget {
	pub const DEFAULT: Self = Self {
		max_subdivisions: 32,
		max_collapses: 32,
	};

	pub const UNLIMITED: Self = Self {
		max_subdivisions: 0,
		max_collapses: 0,
	};

	/// `performed` subdivisions so far this frame; may one more happen?
	#[inline]
	pub fn can_subdivide(&self, performed: usize) -> bool {
		within(self.max_subdivisions, performed)
	}

	#[inline]
	pub fn can_collapse(&self, performed: usize) -> bool {
		within(self.max_collapses, performed)
	}
}

impl Default for FrameBudget {
	fn default() -> Self {
		Self::DEFAULT
	}
}

#[inline]
fn within(cap: usize, performed: usize) -> bool {
	cap == 0 || performed < cap
}
