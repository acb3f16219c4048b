//! Generation requests, admission control and the worker pool.
//!
//! # Module Structure
//!
//! - [`request`]: `GenerationRequest` and the priority function
//! - [`queue`]: `TaskQueue` - bounded, deduplicating priority queue
//! - [`pool`]: `WorkerPool` - fixed-size rayon pool, one channel per job
//! - [`scheduler`]: `TaskScheduler` - essential + regular queues over the pool

pub mod pool;
pub mod queue;
pub mod request;
pub mod scheduler;

pub use pool::{GenerationResult, PoolMode, WorkerPool};
pub use queue::{Admission, QueueLimits, QueueOrdering, TaskQueue};
pub use request::{compute_priority, GenerationRequest, PriorityParams};
pub use scheduler::{DispatchStats, TaskScheduler};
