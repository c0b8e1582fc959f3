// dispatch.rs - Running one submitted job on the worker pool
//
// A job waits on its dependency gate, then fans its chunks out to the pool.
// The last chunk to finish releases the store lease and settles the handle,
// which in turn opens the gates of any downstream jobs.

use crate::error::{FailureReason, JobFailure, KernelError};
use crate::handle::{DependencyGate, JobHandle, JobId};
use crate::job::{AccessSet, Chunk, Kernel};
use crate::store::{SharedBuffers, StoreLease};
use jobline_metrics::JobCounters;
use parking_lot::Mutex;
use rayon::ThreadPool;
use std::any::Any;
use std::ops::Range;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub(crate) struct PreparedJob {
    pub id: JobId,
    pub name: String,
    pub access: AccessSet,
    pub kernel: Arc<Kernel>,
    pub buffers: Arc<SharedBuffers>,
    pub chunks: Vec<Range<usize>>,
    pub handle: JobHandle,
    pub lease: Mutex<Option<StoreLease>>,
    pub remaining: AtomicUsize,
    pub failure: Mutex<Option<JobFailure>>,
    pub counters: Arc<JobCounters>,
}

impl PreparedJob {
    /// Start once every dependency settles; abort if any of them failed.
    pub fn launch(self: Arc<Self>, pool: &Arc<ThreadPool>, dependencies: &[JobHandle]) {
        let pool = Arc::clone(pool);
        DependencyGate::wire(dependencies, move |upstream| match upstream {
            None => self.start(&pool),
            Some(cause) => self.abort(cause),
        });
    }

    fn start(self: Arc<Self>, pool: &ThreadPool) {
        if self.chunks.is_empty() {
            self.finish();
            return;
        }

        self.handle.mark_running();
        self.remaining.store(self.chunks.len(), Ordering::Release);
        tracing::trace!(job = %self.id, name = %self.name, chunks = self.chunks.len(), "dispatching");

        for index in 0..self.chunks.len() {
            let job = Arc::clone(&self);
            pool.spawn(move || job.run_chunk(index));
        }
    }

    fn run_chunk(&self, index: usize) {
        let range = self.chunks[index].clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut chunk = Chunk::new(&self.name, range.clone(), &self.buffers, &self.access);
            (self.kernel)(&mut chunk)
        }));

        let reason = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(KernelError::Access(err))) => Some(FailureReason::Kernel(err.to_string())),
            Ok(Err(KernelError::Fault(message))) => Some(FailureReason::Kernel(message)),
            Err(payload) => Some(FailureReason::Panic(panic_message(payload.as_ref()))),
        };
        self.counters.record_chunk(reason.is_none());

        match reason {
            None => tracing::trace!(job = %self.id, start = range.start, end = range.end, "chunk done"),
            Some(reason) => {
                tracing::warn!(
                    job = %self.id,
                    name = %self.name,
                    start = range.start,
                    end = range.end,
                    %reason,
                    "chunk failed"
                );
                self.failure
                    .lock()
                    .get_or_insert_with(|| JobFailure::in_chunk(self.id, &self.name, range, reason));
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.finish();
        }
    }

    fn finish(&self) {
        let failure = self.failure.lock().take();
        // The store must be usable again by the time any waiter wakes.
        drop(self.lease.lock().take());

        match failure {
            None => {
                tracing::trace!(job = %self.id, name = %self.name, "complete");
                self.handle.settle(Ok(()));
            }
            Some(failure) => {
                self.counters.record_job_failure();
                self.handle.settle(Err(failure));
            }
        }
    }

    fn abort(&self, cause: JobFailure) {
        drop(self.lease.lock().take());
        tracing::warn!(job = %self.id, name = %self.name, upstream = %cause.job, "skipped after upstream failure");
        self.counters.record_job_failure();
        self.handle
            .settle(Err(JobFailure::upstream(self.id, &self.name, cause)));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
