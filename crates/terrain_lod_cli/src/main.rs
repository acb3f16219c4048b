//! Headless flythrough driver for the terrain LOD scheduler.
//!
//! Flies a scripted camera around and into a procedural planet, runs the
//! scheduler every frame and prints a summary of what it did.
//!
//! ```text
//! RUST_LOG=terrain_lod=debug terrain_flythrough --config terrain.toml --frames 600
//! ```

mod flight;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use terrain_lod::{ChunkManager, FrameReport, PlanetDensity, PoolMode, TerrainConfig};
use tracing_subscriber::EnvFilter;

use flight::FlightPath;

/// Headless flythrough for the terrain LOD scheduler.
#[derive(Parser, Debug)]
#[command(name = "terrain_flythrough")]
#[command(about = "Runs the LOD scheduler along a scripted camera path")]
struct Args {
	/// Path to configuration TOML file (defaults are used when omitted).
	#[arg(short, long)]
	config: Option<PathBuf>,

	/// Number of frames to simulate.
	#[arg(short, long, default_value_t = 600)]
	frames: usize,

	/// Camera speed in world units per second.
	#[arg(short, long, default_value_t = 80.0)]
	speed: f32,

	/// Fixed frame time in seconds.
	#[arg(long, default_value_t = 0.016)]
	dt: f32,

	/// Run generation jobs on the main thread between frames.
	#[arg(long)]
	deferred: bool,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.init();

	let args = Args::parse();

	let config = match &args.config {
		Some(path) => TerrainConfig::load(path)
			.with_context(|| format!("Failed to load config: {}", path.display()))?,
		None => TerrainConfig::default(),
	};

	let field = Arc::new(PlanetDensity::new(config.planet_center_vec(), config.planet_radius).with_seed(config.seed));
	let mode = if args.deferred {
		PoolMode::Deferred
	} else {
		PoolMode::Threaded
	};
	let path = FlightPath::new(&config, args.speed, args.frames);
	let mut manager =
		ChunkManager::with_pool_mode(config, field, mode).context("Failed to start scheduler")?;

	tracing::info!(frames = args.frames, speed = args.speed, ?mode, "flythrough started");

	let mut peak = FrameReport::default();
	for frame in 0..args.frames {
		let camera = path.camera(frame, args.dt);
		let report = manager.update(&camera, args.dt);
		if args.deferred {
			manager.run_pending_jobs();
		}

		peak.resident_chunks = peak.resident_chunks.max(report.resident_chunks);
		peak.nodes = peak.nodes.max(report.nodes);
		peak.queued_regular = peak.queued_regular.max(report.queued_regular);
		peak.update_us = peak.update_us.max(report.update_us);

		if frame % 60 == 0 {
			tracing::info!(
				frame,
				altitude = (camera.position - manager.config().planet_center_vec()).length(),
				resident = report.resident_chunks,
				queued = report.queued_essential + report.queued_regular,
				in_flight = report.in_flight,
				rendered = manager.renderables().len(),
				"progress"
			);
		}
	}

	print_summary(&manager, &peak);
	Ok(())
}

fn print_summary(manager: &ChunkManager, peak: &FrameReport) {
	let stats = manager.stats();
	println!("\nFlythrough summary");
	println!("  frames:              {}", stats.frames);
	println!("  bootstrapped:        {}", manager.is_bootstrapped());
	println!("  requests submitted:  {}", stats.submitted);
	println!("    speculative:       {}", stats.speculative);
	println!("    rejected:          {}", stats.rejected);
	println!("    evicted:           {}", stats.evicted);
	println!("    expired:           {}", stats.expired);
	println!("  jobs dispatched:     {}", stats.dispatched);
	println!("  completed:           {}", stats.completed);
	println!("    stale:             {}", stats.stale);
	println!("    failed:            {}", stats.failed);
	println!("  prefiltered:         {}", stats.prefiltered);
	println!("  subdivisions:        {}", stats.subdivisions);
	println!("  collapses:           {}", stats.collapses);
	println!("  budget releases:     {}", stats.budget_releases);
	println!(
		"  resident chunks:     {} (peak {})",
		manager.octree().resident_chunks(),
		peak.resident_chunks
	);
	println!("  nodes:               {} (peak {})", manager.octree().len(), peak.nodes);
	println!("  peak regular queue:  {}", peak.queued_regular);
	println!(
		"  generation time:     {:.0} us avg",
		stats.generation_us.average()
	);
	println!(
		"  update time:         {:.0} us avg, {} us peak",
		stats.update_us.average(),
		peak.update_us
	);
}
