//! Fixed-size worker pool for chunk generation.
//!
//! Every dispatched job gets its own `bounded(1)` channel. The main thread
//! polls the receivers with `try_recv` and never blocks. Dropping a receiver
//! is the cancellation mechanism: the worker still finishes, its send fails
//! and the result is discarded.
//!
//! ```text
//! Main Thread                       Workers (rayon pool)
//! ┌────────────────┐
//! │ spawn(job)     │──────────────► generate_chunk()
//! └────────────────┘                      │
//! ┌────────────────┐                      │ send
//! │ poll()         │◄─────────────────────┘
//! └────────────────┘
//! ```
//!
//! [`PoolMode::Deferred`] keeps jobs until [`WorkerPool::tick`], which runs
//! them in parallel on the caller. Tests and single-threaded hosts use it for
//! deterministic completion points.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{self as channel, Receiver, Sender, TryRecvError};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use web_time::Instant;

use crate::chunk::ChunkMesh;
use crate::density::DensityField;
use crate::error::GenerationError;
use crate::extract::{generate_chunk, GenerationJob};
use crate::octree::NodeId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PoolMode {
  /// Jobs run on a dedicated rayon pool.
  #[default]
  Threaded,
  /// Jobs run during [`WorkerPool::tick`].
  Deferred,
}

/// A finished job as delivered to the main thread.
#[derive(Debug)]
pub struct GenerationResult {
  pub node: NodeId,
  pub ticket: u64,
  pub outcome: Result<ChunkMesh, GenerationError>,
  /// Wall time spent on the worker, microseconds.
  pub elapsed_us: u64,
}

struct InFlight {
  node: NodeId,
  ticket: u64,
  receiver: Receiver<GenerationResult>,
}

struct DeferredJob {
  node: NodeId,
  ticket: u64,
  job: GenerationJob,
  sender: Sender<GenerationResult>,
}

pub struct WorkerPool {
  mode: PoolMode,
  workers: usize,
  pool: Option<ThreadPool>,
  field: Arc<dyn DensityField>,
  in_flight: Vec<InFlight>,
  deferred: Vec<DeferredJob>,
  /// Cancelled threaded jobs still occupying a thread. Each keeps its slot
  /// until the worker answers or hangs up.
  abandoned: Vec<Receiver<GenerationResult>>,
}

impl WorkerPool {
  /// Create a pool of `workers` slots.
  pub fn new(
    mode: PoolMode,
    workers: usize,
    field: Arc<dyn DensityField>,
  ) -> Result<Self, ThreadPoolBuildError> {
    let workers = workers.max(1);
    let pool = match mode {
      PoolMode::Threaded => Some(
        ThreadPoolBuilder::new()
          .num_threads(workers)
          .thread_name(|i| format!("terrain-gen-{}", i))
          .build()?,
      ),
      PoolMode::Deferred => None,
    };
    tracing::debug!(?mode, workers, "worker pool created");
    Ok(Self {
      mode,
      workers,
      pool,
      field,
      in_flight: Vec::with_capacity(workers),
      deferred: Vec::new(),
      abandoned: Vec::new(),
    })
  }

  #[inline]
  pub fn mode(&self) -> PoolMode {
    self.mode
  }

  #[inline]
  pub fn workers(&self) -> usize {
    self.workers
  }

  /// Jobs dispatched whose results have not been polled yet.
  #[inline]
  pub fn in_flight(&self) -> usize {
    self.in_flight.len()
  }

  /// Cancelled jobs whose threads have not finished yet.
  #[inline]
  pub fn abandoned(&self) -> usize {
    self.abandoned.len()
  }

  #[inline]
  pub fn idle_workers(&self) -> usize {
    self
      .workers
      .saturating_sub(self.in_flight.len() + self.abandoned.len())
  }

  /// Jobs waiting for [`tick`](Self::tick) in deferred mode.
  #[inline]
  pub fn deferred_len(&self) -> usize {
    self.deferred.len()
  }

  /// Hand a job to a worker. Callers check [`idle_workers`](Self::idle_workers)
  /// first; the pool itself does not refuse work.
  pub fn spawn(&mut self, node: NodeId, ticket: u64, job: GenerationJob) {
    let (sender, receiver) = channel::bounded(1);
    self.in_flight.push(InFlight {
      node,
      ticket,
      receiver,
    });

    match &self.pool {
      Some(pool) => {
        let field = Arc::clone(&self.field);
        pool.spawn(move || {
          let result = run_job(node, ticket, &job, field.as_ref());
          // Receiver dropped = cancelled
          let _ = sender.send(result);
        });
      }
      None => self.deferred.push(DeferredJob {
        node,
        ticket,
        job,
        sender,
      }),
    }
  }

  /// Run deferred jobs in parallel on the caller. Returns the number run.
  pub fn tick(&mut self) -> usize {
    if self.deferred.is_empty() {
      return 0;
    }
    let jobs = std::mem::take(&mut self.deferred);
    let count = jobs.len();
    let field = self.field.as_ref();
    jobs.into_par_iter().for_each(|deferred| {
      let result = run_job(deferred.node, deferred.ticket, &deferred.job, field);
      let _ = deferred.sender.send(result);
    });
    count
  }

  /// Collect finished jobs without blocking.
  ///
  /// A worker that hung up without answering is reported as
  /// [`GenerationError::Disconnected`].
  pub fn poll(&mut self) -> Vec<GenerationResult> {
    self
      .abandoned
      .retain(|receiver| matches!(receiver.try_recv(), Err(TryRecvError::Empty)));

    let mut finished = Vec::new();
    self.in_flight.retain(|task| match task.receiver.try_recv() {
      Ok(result) => {
        finished.push(result);
        false
      }
      Err(TryRecvError::Empty) => true,
      Err(TryRecvError::Disconnected) => {
        finished.push(GenerationResult {
          node: task.node,
          ticket: task.ticket,
          outcome: Err(GenerationError::Disconnected),
          elapsed_us: 0,
        });
        false
      }
    });
    finished
  }

  /// Abandon every in-flight and deferred job. Returns how many were
  /// cancelled.
  ///
  /// Deferred jobs never ran and free their slots at once. Threaded jobs
  /// cannot be stopped: they move to the abandoned list and hold their slot
  /// until [`poll`](Self::poll) sees them finish, so new work never queues
  /// up behind stale work on a busy thread.
  pub fn cancel_all(&mut self) -> usize {
    let cancelled = self.in_flight.len();
    let running = std::mem::take(&mut self.in_flight);
    if self.pool.is_some() {
      self
        .abandoned
        .extend(running.into_iter().map(|task| task.receiver));
    }
    self.deferred.clear();
    cancelled
  }
}

/// Execute one job, converting a panic into a [`GenerationError`].
fn run_job(node: NodeId, ticket: u64, job: &GenerationJob, field: &dyn DensityField) -> GenerationResult {
  let _span = tracing::info_span!("generate_chunk", level = job.level).entered();
  let start = Instant::now();
  let outcome = match panic::catch_unwind(AssertUnwindSafe(|| generate_chunk(job, field))) {
    Ok(result) => result,
    Err(payload) => Err(GenerationError::Panicked(panic_message(payload.as_ref()))),
  };
  GenerationResult {
    node,
    ticket,
    outcome,
    elapsed_us: start.elapsed().as_micros() as u64,
  }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_string()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "unknown panic".to_string()
  }
}

#[cfg(test)]
#[path = "pool_test.rs"]
mod pool_test;
