//! Jobline Core
//!
//! Parallel batch jobs over struct-of-arrays entity state:
//! - Entity state store (one contiguous buffer per attribute)
//! - Job descriptors with declared read/write buffer sets
//! - Dependency handles and the chunked worker-pool scheduler
//! - Per-tick physics chain and its orchestration
//! - Deterministic time, math and configuration

pub mod config;
pub mod error;
pub mod handle;
pub mod job;
pub mod math;
pub mod scheduler;
pub mod step;
pub mod store;
pub mod time;
pub mod watchdog;

pub use config::JoblineConfig;
pub use error::{
    AccessError, ConfigError, FailureReason, JobFailure, KernelError, ScheduleError, StepError,
    StoreError, WaitError,
};
pub use handle::{wait_all, JobHandle, JobId, JobStatus};
pub use job::{Chunk, ChunkMut, JobDescriptor, JobShape};
pub use scheduler::Scheduler;
pub use step::{FrameView, RenderSync, SimulationStep, StepState, TickParams, TickReport};
pub use store::{BufferId, EntityInit, EntityStateStore};
pub use watchdog::Watchdog;

pub use glam;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
