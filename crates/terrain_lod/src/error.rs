//! Error types for configuration loading, task scheduling and chunk
//! generation.
//!
//! Nothing in the scheduler is fatal: task and generation errors are reported
//! back to the main thread, the owning node is reset and the next traversal
//! retries it.

use thiserror::Error;

/// Failure to load or validate a [`TerrainConfig`](crate::TerrainConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The configuration file could not be read.
  #[error("failed to read terrain config: {0}")]
  Io(#[from] std::io::Error),

  /// The configuration text is not valid TOML for `TerrainConfig`.
  #[error("failed to parse terrain config: {0}")]
  Parse(#[from] toml::de::Error),

  /// A field is outside its permitted range.
  #[error("{field} must be {expected}, got {value}")]
  OutOfRange {
    field: &'static str,
    expected: &'static str,
    value: String,
  },
}

impl ConfigError {
  pub(crate) fn out_of_range(
    field: &'static str,
    expected: &'static str,
    value: impl ToString,
  ) -> Self {
    Self::OutOfRange {
      field,
      expected,
      value: value.to_string(),
    }
  }
}

/// Reason a generation request did not produce geometry.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum TaskError {
  /// The density field or the extractor failed on the worker.
  #[error("worker failed: {0}")]
  WorkerFailure(String),

  /// The request waited in the queue longer than the configured max age.
  #[error("task expired after {age_ms} ms in queue")]
  Expired { age_ms: u64 },

  /// The request was preempted by a strictly higher-priority arrival.
  #[error("task evicted by a higher-priority request")]
  Evicted,

  /// Admission control rejected the request (transient backpressure).
  #[error("queue saturated")]
  QueueSaturated,
}

/// Failure raised while generating a chunk on a worker.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GenerationError {
  /// The density field returned NaN or infinity.
  #[error("density field returned a non-finite value at ({x}, {y}, {z})")]
  NonFiniteDensity { x: f32, y: f32, z: f32 },

  /// The job panicked; the payload message is preserved.
  #[error("generation job panicked: {0}")]
  Panicked(String),

  /// The worker dropped its result channel without answering.
  #[error("worker disconnected before delivering a result")]
  Disconnected,
}

impl From<GenerationError> for TaskError {
  fn from(err: GenerationError) -> Self {
    TaskError::WorkerFailure(err.to_string())
  }
}

/// Failure to construct or rebuild a [`ChunkManager`](crate::ChunkManager).
#[derive(Debug, Error)]
pub enum SchedulerError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error("failed to build worker pool: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
}
