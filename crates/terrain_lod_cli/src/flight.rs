//! Scripted camera path: one orbit at altitude, then a spiral dive.

use glam::Vec3;
use terrain_lod::{CameraState, TerrainConfig};

/// Orbit radius as a multiple of the planet radius.
const ORBIT_ALTITUDE: f32 = 3.0;
/// Closest approach as a multiple of the planet radius.
const DIVE_ALTITUDE: f32 = 1.08;

pub struct FlightPath {
	center: Vec3,
	radius: f32,
	speed: f32,
	frames: usize,
	aspect: f32,
}

impl FlightPath {
	pub fn new(config: &TerrainConfig, speed: f32, frames: usize) -> Self {
		Self {
			center: config.planet_center_vec(),
			radius: config.planet_radius,
			speed,
			frames: frames.max(1),
			aspect: 16.0 / 9.0,
		}
	}

	/// Camera at `frame` for a fixed frame time `dt`.
	///
	/// First half orbits at constant altitude, second half descends linearly
	/// to the dive altitude while continuing around the planet.
	pub fn camera(&self, frame: usize, dt: f32) -> CameraState {
		let progress = frame as f32 / self.frames as f32;
		let altitude = if progress < 0.5 {
			ORBIT_ALTITUDE
		} else {
			let t = (progress - 0.5) * 2.0;
			ORBIT_ALTITUDE + (DIVE_ALTITUDE - ORBIT_ALTITUDE) * t
		};
		let orbit = self.radius * altitude;

		// Arc length travelled at `speed` along the orbit.
		let angle = self.speed * dt * frame as f32 / (self.radius * ORBIT_ALTITUDE);
		let offset = Vec3::new(angle.cos(), 0.25 * angle.sin(), angle.sin()).normalize() * orbit;
		let eye = self.center + offset;

		// Look slightly ahead of the planet center once low.
		let ahead = Vec3::new(-angle.sin(), 0.0, angle.cos()) * self.radius * (1.0 - altitude / ORBIT_ALTITUDE);
		let near = (orbit - self.radius).max(1.0) * 0.01;
		CameraState::looking_at(eye, self.center + ahead, 60f32.to_radians(), self.aspect, near, orbit * 4.0)
	}
}
