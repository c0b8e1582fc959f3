//! Lock-free job and chunk counters shared with worker threads

use crate::CounterSnapshot;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct JobCounters {
    jobs_submitted: AtomicU64,
    jobs_failed: AtomicU64,
    chunks_run: AtomicU64,
    chunks_failed: AtomicU64,
}

impl JobCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_submit(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_job_failure(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chunk(&self, ok: bool) {
        self.chunks_run.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.chunks_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            chunks_run: self.chunks_run.load(Ordering::Relaxed),
            chunks_failed: self.chunks_failed.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.jobs_submitted.store(0, Ordering::Relaxed);
        self.jobs_failed.store(0, Ordering::Relaxed);
        self.chunks_run.store(0, Ordering::Relaxed);
        self.chunks_failed.store(0, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_failed_chunks_separately() {
        let counters = JobCounters::new();
        counters.record_submit();
        counters.record_chunk(true);
        counters.record_chunk(false);
        counters.record_job_failure();

        let snap = counters.snapshot();
        assert_eq!(snap.jobs_submitted, 1);
        assert_eq!(snap.chunks_run, 2);
        assert_eq!(snap.chunks_failed, 1);
        assert_eq!(snap.jobs_failed, 1);

        counters.reset();
        assert_eq!(counters.snapshot(), CounterSnapshot::default());
    }
}
