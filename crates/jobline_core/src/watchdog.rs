//! Bounded waiting for hosts that must not hang.
//!
//! The scheduler itself never times out: a job that never settles blocks its
//! waiters forever. A [`Watchdog`] turns that into a [`WaitError::Deadlock`]
//! after a fixed limit. The stuck job keeps its lease, so the store stays
//! locked until it eventually settles.

use crate::error::WaitError;
use crate::handle::JobHandle;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct Watchdog {
    limit: Duration,
}

impl Watchdog {
    pub fn new(limit: Duration) -> Self {
        Self { limit }
    }

    pub fn from_millis(limit_ms: u64) -> Self {
        Self::new(Duration::from_millis(limit_ms))
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Wait for `handle`, giving up after the limit.
    pub fn wait(&self, handle: &JobHandle) -> Result<(), WaitError> {
        match handle.wait_timeout(self.limit) {
            Some(outcome) => outcome.map_err(WaitError::from),
            None => Err(self.deadlock(handle, self.limit)),
        }
    }

    /// Wait for every handle with one shared deadline. Reports the first
    /// failure in list order, or the first handle still unsettled at the
    /// deadline.
    pub fn wait_all(&self, handles: &[JobHandle]) -> Result<(), WaitError> {
        let started = Instant::now();
        let deadline = started + self.limit;
        let mut first_failure = None;

        for handle in handles {
            let left = deadline.saturating_duration_since(Instant::now());
            match handle.wait_timeout(left) {
                Some(Ok(())) => {}
                Some(Err(failure)) => {
                    first_failure.get_or_insert(failure);
                }
                None => return Err(self.deadlock(handle, started.elapsed())),
            }
        }
        first_failure.map_or(Ok(()), |failure| Err(failure.into()))
    }

    fn deadlock(&self, handle: &JobHandle, waited: Duration) -> WaitError {
        tracing::error!(
            job = %handle.id(),
            name = handle.name(),
            waited_ms = waited.as_millis() as u64,
            "job did not settle before the watchdog limit"
        );
        WaitError::Deadlock {
            id: handle.id(),
            job: handle.name().to_string(),
            waited,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::JobId;

    #[test]
    fn stuck_handle_reports_deadlock() {
        let watchdog = Watchdog::from_millis(20);
        let stuck = JobHandle::pending(JobId::next(), "stuck", Vec::new());

        let err = watchdog.wait(&stuck).unwrap_err();
        assert!(matches!(err, WaitError::Deadlock { ref job, .. } if job == "stuck"));

        stuck.settle(Ok(()));
        assert!(watchdog.wait(&stuck).is_ok());
    }

    #[test]
    fn wait_all_passes_through_settled_handles() {
        let watchdog = Watchdog::from_millis(20);
        let done = JobHandle::completed();
        let stuck = JobHandle::pending(JobId::next(), "stuck", Vec::new());

        assert!(watchdog.wait_all(std::slice::from_ref(&done)).is_ok());
        assert!(matches!(
            watchdog.wait_all(&[done, stuck]),
            Err(WaitError::Deadlock { .. })
        ));
    }
}
