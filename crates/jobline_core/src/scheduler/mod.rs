//! Parallel batch-job scheduler.
//!
//! A job's index range is split into contiguous chunks that run concurrently
//! on a fixed rayon pool. Dependencies are plain [`JobHandle`]s: a job starts
//! only after every handle it depends on has completed, and fails without
//! running if any of them failed.
//!
//! Submission is where access conflicts are caught. A job whose declared
//! buffers clash with an in-flight job on the same store (write against read
//! or write) is rejected with [`ScheduleError::OverlappingWriteViolation`]
//! unless that in-flight job is among its transitive dependencies. The
//! in-flight list belongs to the store, so the rule holds across schedulers.

mod dispatch;
mod partition;

pub use partition::partition;

use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::handle::{JobHandle, JobId};
use crate::job::{JobDescriptor, JobShape};
use crate::store::EntityStateStore;
use dispatch::PreparedJob;
use jobline_metrics::{CounterSnapshot, JobCounters};
use parking_lot::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

pub struct Scheduler {
    pool: Arc<rayon::ThreadPool>,
    config: SchedulerConfig,
    counters: Arc<JobCounters>,
}

impl Scheduler {
    /// Build the worker pool described by `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, ScheduleError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_threads)
            .thread_name(|index| format!("jobline-worker-{index}"))
            .build()?;
        tracing::debug!(workers = pool.current_num_threads(), "scheduler started");

        Ok(Self {
            pool: Arc::new(pool),
            config,
            counters: Arc::new(JobCounters::new()),
        })
    }

    /// Default configuration with a fixed worker count.
    pub fn with_threads(worker_threads: usize) -> Result<Self, ScheduleError> {
        Self::new(SchedulerConfig {
            worker_threads,
            ..SchedulerConfig::default()
        })
    }

    pub fn worker_count(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    /// Chunk length used by [`schedule`](Self::schedule): the job's own hint,
    /// otherwise the configured default for its shape.
    pub fn resolve_batch_size(&self, job: &JobDescriptor) -> usize {
        job.batch_hint().unwrap_or(match job.shape() {
            JobShape::PerIndex => self.config.batch_size,
            JobShape::Pairwise => self.config.pairwise_batch_size,
        })
    }

    /// Submit `job` with its resolved batch size.
    pub fn schedule(
        &self,
        store: &mut EntityStateStore,
        job: JobDescriptor,
        dependencies: &[JobHandle],
    ) -> Result<JobHandle, ScheduleError> {
        let batch_size = self.resolve_batch_size(&job);
        self.submit(store, job, batch_size, dependencies)
    }

    /// Submit `job` split into chunks of `batch_size` indices.
    ///
    /// Returns immediately with a pending handle. Taking the store mutably
    /// ends any outstanding borrows of its buffers; the store stays locked
    /// against direct access until the job settles.
    pub fn submit(
        &self,
        store: &mut EntityStateStore,
        job: JobDescriptor,
        batch_size: usize,
        dependencies: &[JobHandle],
    ) -> Result<JobHandle, ScheduleError> {
        if job.access().is_empty() {
            return Err(ScheduleError::EmptyAccess {
                job: job.name().to_string(),
            });
        }
        if batch_size == 0 {
            return Err(ScheduleError::InvalidBatchSize {
                job: job.name().to_string(),
            });
        }
        if job.len() > store.len() {
            return Err(ScheduleError::RangeOutOfBounds {
                job: job.name().to_string(),
                len: job.len(),
                store_len: store.len(),
            });
        }

        let shared = Arc::clone(store.shared());
        let mut in_flight = shared.in_flight();
        if let Err(err) = in_flight.check(job.name(), job.access(), dependencies) {
            tracing::warn!(%err, "rejected job");
            return Err(err);
        }

        let id = JobId::next();
        let chunks = partition(job.len(), batch_size);
        let (name, access, kernel) = job.into_parts();
        let handle = JobHandle::pending(id, name.clone(), dependencies.to_vec());
        in_flight.register(handle.clone(), access.clone());
        let lease = store.lease();
        drop(in_flight);

        self.counters.record_submit();
        tracing::debug!(
            job = %id,
            %name,
            store = store.id().raw(),
            chunks = chunks.len(),
            batch_size,
            dependencies = dependencies.len(),
            "submitted"
        );

        let prepared = Arc::new(PreparedJob {
            id,
            name,
            access,
            kernel,
            buffers: Arc::clone(&shared),
            chunks,
            handle: handle.clone(),
            lease: Mutex::new(Some(lease)),
            remaining: AtomicUsize::new(0),
            failure: Mutex::new(None),
            counters: Arc::clone(&self.counters),
        });
        prepared.launch(&self.pool, dependencies);

        Ok(handle)
    }
}
