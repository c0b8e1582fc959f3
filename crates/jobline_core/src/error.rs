//! Error types for the store, scheduler, handles and tick orchestration.
//!
//! Structural problems (capacity, conflicting access, bad batch sizes) are
//! reported synchronously by the call that caused them. Faults inside a job's
//! kernel are recorded on the job's handle and surface at the next wait as a
//! [`JobFailure`].

use crate::handle::JobId;
use crate::store::BufferId;
use std::ops::Range;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by [`EntityStateStore`](crate::store::EntityStateStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store is full ({capacity} entities reserved)")]
    CapacityExceeded { capacity: usize },

    #[error("entity index {index} out of bounds (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("{outstanding} job(s) still hold the store's buffers")]
    BuffersInFlight { outstanding: usize },

    #[error("cannot shrink capacity to {requested} below {len} live entities")]
    ShrinkBelowLength { requested: usize, len: usize },
}

/// Errors raised while submitting a job to the [`Scheduler`](crate::scheduler::Scheduler).
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("job '{job}' does not access any buffers")]
    EmptyAccess { job: String },

    #[error("job '{job}' requested a batch size of zero")]
    InvalidBatchSize { job: String },

    #[error("job '{job}' covers {len} indices but the store holds {store_len}")]
    RangeOutOfBounds {
        job: String,
        len: usize,
        store_len: usize,
    },

    #[error("job '{job}' conflicts with in-flight job '{conflicting}' ({conflicting_id}) on the {buffer} buffer without depending on it")]
    OverlappingWriteViolation {
        buffer: BufferId,
        job: String,
        conflicting: String,
        conflicting_id: JobId,
    },

    #[error("failed to build worker pool: {0}")]
    PoolBuild(#[from] rayon::ThreadPoolBuildError),
}

/// Misuse of a chunk's buffer views inside a kernel.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("job '{job}' did not declare {access} access to the {buffer} buffer")]
    Undeclared {
        job: String,
        buffer: BufferId,
        access: &'static str,
    },

    #[error("job '{job}' writes the {buffer} buffer and may only see its own chunk of it")]
    ReadOfWrittenBuffer { job: String, buffer: BufferId },

    #[error("job '{job}' already borrowed the {buffer} buffer for writing in this chunk")]
    AlreadyBorrowed { job: String, buffer: BufferId },
}

/// Error returned by a job kernel.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error("{0}")]
    Fault(String),
}

impl KernelError {
    pub fn fault(message: impl Into<String>) -> Self {
        Self::Fault(message.into())
    }
}

/// Why a job ended in the failed state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FailureReason {
    #[error("kernel fault: {0}")]
    Kernel(String),

    #[error("kernel panicked: {0}")]
    Panic(String),

    #[error("an upstream job failed")]
    Upstream,
}

/// A job finished in the failed state.
///
/// For kernel faults `chunk` names the first failing chunk. For jobs that
/// never ran because a dependency failed, `upstream` carries that
/// dependency's failure.
#[derive(Debug, Error, Clone)]
#[error("job '{job}' ({id}) failed: {reason}")]
pub struct JobFailure {
    pub id: JobId,
    pub job: String,
    pub chunk: Option<Range<usize>>,
    pub reason: FailureReason,
    #[source]
    pub upstream: Option<Box<JobFailure>>,
}

impl JobFailure {
    pub(crate) fn in_chunk(id: JobId, job: &str, chunk: Range<usize>, reason: FailureReason) -> Self {
        Self {
            id,
            job: job.to_string(),
            chunk: Some(chunk),
            reason,
            upstream: None,
        }
    }

    pub(crate) fn upstream(id: JobId, job: &str, cause: JobFailure) -> Self {
        Self {
            id,
            job: job.to_string(),
            chunk: None,
            reason: FailureReason::Upstream,
            upstream: Some(Box::new(cause)),
        }
    }

    /// The failure that started the chain.
    pub fn root_cause(&self) -> &JobFailure {
        let mut current = self;
        while let Some(next) = current.upstream.as_deref() {
            current = next;
        }
        current
    }
}

/// Errors raised while waiting on handles.
#[derive(Debug, Error, Clone)]
pub enum WaitError {
    #[error(transparent)]
    Failed(#[from] JobFailure),

    #[error("job '{job}' ({id}) did not settle within {waited:?}")]
    Deadlock {
        id: JobId,
        job: String,
        waited: Duration,
    },
}

/// Errors raised by [`SimulationStep`](crate::step::SimulationStep).
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Wait(#[from] WaitError),

    #[error("previous tick is still waiting on job '{job}' ({id})")]
    Stalled { id: JobId, job: String },
}

impl From<JobFailure> for StepError {
    fn from(failure: JobFailure) -> Self {
        StepError::Wait(WaitError::Failed(failure))
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
