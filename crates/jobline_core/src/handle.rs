//! Completion tokens for submitted jobs.
//!
//! A [`JobHandle`] moves through `Pending → Running → Complete`, or ends in
//! `Failed`. Handles are cheap to clone and are the only way to express
//! ordering between jobs: the scheduler starts a job's chunks only after every
//! handle it depends on has settled successfully. There is no cancellation;
//! once submitted, work runs to completion.

use crate::error::JobFailure;
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

static NEXT_JOB_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier assigned to every handle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64);

impl JobId {
    pub(crate) fn next() -> Self {
        Self(NEXT_JOB_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Return the raw value backing this id.
    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    #[inline]
    pub fn is_settled(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

type Continuation = Box<dyn FnOnce(Result<(), &JobFailure>) + Send>;

struct HandleInner {
    status: JobStatus,
    failure: Option<JobFailure>,
    continuations: Vec<Continuation>,
    // Unsettled upstream handles, used for conflict checks. Cleared on settle.
    upstream: Vec<JobHandle>,
}

struct HandleState {
    id: JobId,
    name: String,
    inner: Mutex<HandleInner>,
    settled: Condvar,
}

/// Token for one submitted job (or a barrier over other handles).
#[derive(Clone)]
pub struct JobHandle {
    state: Arc<HandleState>,
}

impl JobHandle {
    pub(crate) fn pending(id: JobId, name: impl Into<String>, upstream: Vec<JobHandle>) -> Self {
        Self {
            state: Arc::new(HandleState {
                id,
                name: name.into(),
                inner: Mutex::new(HandleInner {
                    status: JobStatus::Pending,
                    failure: None,
                    continuations: Vec::new(),
                    upstream,
                }),
                settled: Condvar::new(),
            }),
        }
    }

    /// An already-satisfied handle.
    pub fn completed() -> Self {
        let handle = Self::pending(JobId::next(), "completed", Vec::new());
        handle.settle(Ok(()));
        handle
    }

    /// A new pending handle that settles once `parent` settles.
    ///
    /// Jobs that depend on the returned handle never start before `parent`
    /// is Complete; if `parent` fails the chained handle fails too.
    pub fn chain(parent: &JobHandle) -> Self {
        Self::barrier(format!("chain({})", parent.name()), std::slice::from_ref(parent))
    }

    /// A handle that settles once every handle in `handles` has settled.
    pub fn combine(handles: &[JobHandle]) -> Self {
        Self::barrier("combine", handles)
    }

    fn barrier(name: impl Into<String>, parents: &[JobHandle]) -> Self {
        let barrier = Self::pending(JobId::next(), name, parents.to_vec());
        let target = barrier.clone();
        DependencyGate::wire(parents, move |upstream| match upstream {
            None => target.settle(Ok(())),
            Some(cause) => {
                let failure = JobFailure::upstream(target.id(), target.name(), cause);
                target.settle(Err(failure));
            }
        });
        barrier
    }

    #[inline]
    pub fn id(&self) -> JobId {
        self.state.id
    }

    pub fn name(&self) -> &str {
        &self.state.name
    }

    pub fn status(&self) -> JobStatus {
        self.state.inner.lock().status
    }

    /// Non-blocking poll. Idempotent: repeated calls on a finished handle
    /// keep returning `true`.
    pub fn is_complete(&self) -> bool {
        self.status() == JobStatus::Complete
    }

    pub fn is_failed(&self) -> bool {
        self.status() == JobStatus::Failed
    }

    pub fn is_settled(&self) -> bool {
        self.status().is_settled()
    }

    /// The recorded failure, if the handle failed.
    pub fn failure(&self) -> Option<JobFailure> {
        self.state.inner.lock().failure.clone()
    }

    /// Block until the handle settles.
    pub fn wait(&self) -> Result<(), JobFailure> {
        let mut inner = self.state.inner.lock();
        while !inner.status.is_settled() {
            self.state.settled.wait(&mut inner);
        }
        match &inner.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    /// Block until the handle settles or `timeout` elapses.
    ///
    /// Returns `None` on timeout. Used by the watchdog; the scheduler itself
    /// never times out.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<(), JobFailure>> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.state.inner.lock();
        while !inner.status.is_settled() {
            if self.state.settled.wait_until(&mut inner, deadline).timed_out() {
                if !inner.status.is_settled() {
                    return None;
                }
                break;
            }
        }
        Some(match &inner.failure {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        })
    }

    pub(crate) fn mark_running(&self) {
        let mut inner = self.state.inner.lock();
        if inner.status == JobStatus::Pending {
            inner.status = JobStatus::Running;
        }
    }

    /// Move to Complete or Failed, wake waiters and run continuations.
    ///
    /// A second settle is ignored.
    pub(crate) fn settle(&self, outcome: Result<(), JobFailure>) {
        let (continuations, failure) = {
            let mut inner = self.state.inner.lock();
            if inner.status.is_settled() {
                tracing::warn!(job = %self.state.id, "ignoring second settle");
                return;
            }
            match outcome {
                Ok(()) => inner.status = JobStatus::Complete,
                Err(failure) => {
                    inner.status = JobStatus::Failed;
                    inner.failure = Some(failure);
                }
            }
            inner.upstream.clear();
            (std::mem::take(&mut inner.continuations), inner.failure.clone())
        };
        self.state.settled.notify_all();

        for continuation in continuations {
            continuation(failure.as_ref().map_or(Ok(()), Err));
        }
    }

    /// Run `f` once the handle settles; immediately if it already has.
    pub(crate) fn on_settled<F>(&self, f: F)
    where
        F: FnOnce(Result<(), &JobFailure>) + Send + 'static,
    {
        let failure = {
            let mut inner = self.state.inner.lock();
            if !inner.status.is_settled() {
                inner.continuations.push(Box::new(f));
                return;
            }
            inner.failure.clone()
        };
        f(failure.as_ref().map_or(Ok(()), Err));
    }

    /// Upstream handles that have not settled yet.
    pub(crate) fn upstream(&self) -> Vec<JobHandle> {
        self.state.inner.lock().upstream.clone()
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.state.id)
            .field("name", &self.state.name)
            .field("status", &self.status())
            .finish()
    }
}

/// Block until every handle settles and report the first failure, in list order.
pub fn wait_all(handles: &[JobHandle]) -> Result<(), JobFailure> {
    let mut first = None;
    for handle in handles {
        if let Err(failure) = handle.wait() {
            first.get_or_insert(failure);
        }
    }
    first.map_or(Ok(()), Err)
}

/// Fires a callback once every dependency has settled.
///
/// The callback receives the first upstream failure, if any.
pub(crate) struct DependencyGate {
    remaining: AtomicUsize,
    failure: Mutex<Option<JobFailure>>,
    on_open: Mutex<Option<Box<dyn FnOnce(Option<JobFailure>) + Send>>>,
}

impl DependencyGate {
    pub(crate) fn wire<F>(dependencies: &[JobHandle], on_open: F)
    where
        F: FnOnce(Option<JobFailure>) + Send + 'static,
    {
        // One extra arrival for the wiring itself, so the gate cannot open
        // while continuations are still being registered.
        let gate = Arc::new(Self {
            remaining: AtomicUsize::new(dependencies.len() + 1),
            failure: Mutex::new(None),
            on_open: Mutex::new(Some(Box::new(on_open))),
        });

        for dependency in dependencies {
            let gate = Arc::clone(&gate);
            dependency.on_settled(move |outcome| {
                if let Err(failure) = outcome {
                    gate.failure.lock().get_or_insert_with(|| failure.clone());
                }
                gate.arrive();
            });
        }
        gate.arrive();
    }

    fn arrive(&self) {
        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let failure = self.failure.lock().take();
            if let Some(on_open) = self.on_open.lock().take() {
                on_open(failure);
            }
        }
    }
}
