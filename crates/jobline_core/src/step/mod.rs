//! Per-tick orchestration.
//!
//! A [`SimulationStep`] drives one tick through three states:
//!
//! ```text
//! Idle ──▶ Scheduling ──▶ AwaitingCompletion ──▶ Idle
//! ```
//!
//! While scheduling it submits the physics chain, each job depending on the
//! previous one's handle:
//!
//! ```text
//! force_accumulation ──▶ integration ──▶ boundary_constraint? ──▶ orientation?
//! ```
//!
//! It then waits on the last handle exactly once and hands the settled
//! buffers to the render-sync collaborator. Intermediate handles are never
//! waited on; the dependency edges alone order the phases.

mod kernels;
mod params;
mod sync;

pub use kernels::{
    boundary_constraint, force_accumulation, integration, orientation, BOUNDARY_CONSTRAINT,
    FORCE_ACCUMULATION, INTEGRATION, ORIENTATION,
};
pub use params::{Boundary, TickParams};
pub use sync::{FrameView, RenderSync};

use crate::config::SchedulerConfig;
use crate::error::{StepError, WaitError};
use crate::handle::{self, JobHandle};
use crate::job::JobDescriptor;
use crate::scheduler::Scheduler;
use crate::store::EntityStateStore;
use crate::time::SimulationTime;
use crate::watchdog::Watchdog;
use jobline_metrics::{PhaseProfiler, TickTimer};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StepState {
    Idle,
    Scheduling,
    AwaitingCompletion,
}

/// Summary of one completed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// 1-based number of the tick that just finished.
    pub tick: u64,
    pub entities: usize,
    pub jobs: usize,
    /// Simulated seconds after this tick.
    pub elapsed: f64,
}

pub struct SimulationStep {
    state: StepState,
    time: SimulationTime,
    watchdog: Option<Watchdog>,
    // Terminal handle of a tick abandoned by the watchdog.
    stalled: Option<JobHandle>,
    profiler: PhaseProfiler,
    timer: TickTimer,
}

impl Default for SimulationStep {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationStep {
    pub fn new() -> Self {
        Self {
            state: StepState::Idle,
            time: SimulationTime::new(),
            watchdog: None,
            stalled: None,
            profiler: PhaseProfiler::new(),
            timer: TickTimer::new(120),
        }
    }

    /// Step with a watchdog when the scheduler config sets a limit.
    pub fn from_config(config: &SchedulerConfig) -> Self {
        let step = Self::new();
        match config.watchdog_ms {
            Some(limit_ms) => step.with_watchdog(Watchdog::from_millis(limit_ms)),
            None => step,
        }
    }

    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn state(&self) -> StepState {
        self.state
    }

    pub fn time(&self) -> &SimulationTime {
        &self.time
    }

    pub fn profiler(&self) -> &PhaseProfiler {
        &self.profiler
    }

    pub fn timer(&self) -> &TickTimer {
        &self.timer
    }

    /// Clear accumulated phase timings.
    pub fn reset_profile(&mut self) {
        self.profiler.reset();
    }

    /// Run one tick without a render-sync collaborator.
    pub fn tick(
        &mut self,
        scheduler: &Scheduler,
        store: &mut EntityStateStore,
        params: &TickParams,
    ) -> Result<TickReport, StepError> {
        self.tick_with_sync(scheduler, store, params, &mut |_: &FrameView<'_>| {})
    }

    /// Run one tick, then hand the settled positions and rotations to `sync`.
    pub fn tick_with_sync<S>(
        &mut self,
        scheduler: &Scheduler,
        store: &mut EntityStateStore,
        params: &TickParams,
        sync: &mut S,
    ) -> Result<TickReport, StepError>
    where
        S: RenderSync + ?Sized,
    {
        let jobs = tick_jobs(store.len(), params);
        self.run_chain(scheduler, store, jobs, params.delta_time, sync)
    }

    /// Run `jobs` as one tick, each depending on the one before it.
    ///
    /// A fault inside any job fails the tick with the last job's
    /// [`JobFailure`] (its `root_cause()` names the job that faulted). Buffer
    /// contents are then undefined for that tick and simulated time does not
    /// advance.
    ///
    /// [`JobFailure`]: crate::error::JobFailure
    pub fn run_chain<S>(
        &mut self,
        scheduler: &Scheduler,
        store: &mut EntityStateStore,
        jobs: Vec<JobDescriptor>,
        delta_time: f32,
        sync: &mut S,
    ) -> Result<TickReport, StepError>
    where
        S: RenderSync + ?Sized,
    {
        self.check_stalled()?;
        self.timer.begin();
        let result = self.run_timed(scheduler, store, jobs, delta_time, sync);
        self.timer.end(result.is_ok());
        result
    }

    fn run_timed<S>(
        &mut self,
        scheduler: &Scheduler,
        store: &mut EntityStateStore,
        jobs: Vec<JobDescriptor>,
        delta_time: f32,
        sync: &mut S,
    ) -> Result<TickReport, StepError>
    where
        S: RenderSync + ?Sized,
    {
        self.state = StepState::Scheduling;
        let scheduled = self
            .profiler
            .time_phase("scheduling", || schedule_chain(scheduler, store, jobs));
        let (terminal, jobs) = match scheduled {
            Ok(scheduled) => scheduled,
            Err(err) => {
                self.state = StepState::Idle;
                return Err(err);
            }
        };

        self.state = StepState::AwaitingCompletion;
        let watchdog = self.watchdog;
        let outcome = self.profiler.time_phase("awaiting", || match watchdog {
            Some(watchdog) => watchdog.wait(&terminal),
            None => terminal.wait().map_err(WaitError::from),
        });
        self.state = StepState::Idle;

        let tick = self.time.tick_count() + 1;
        match outcome {
            Ok(()) => {}
            Err(err @ WaitError::Deadlock { .. }) => {
                self.stalled = Some(terminal);
                return Err(err.into());
            }
            Err(WaitError::Failed(failure)) => {
                tracing::warn!(tick, root = %failure.root_cause(), "tick failed");
                return Err(failure.into());
            }
        }

        let frame = FrameView {
            tick,
            positions: store.positions()?,
            rotations: store.rotations()?,
        };
        self.profiler.time_phase("sync", || sync.sync(&frame));

        self.time.advance(delta_time);
        tracing::trace!(tick, entities = store.len(), jobs, "tick complete");

        Ok(TickReport {
            tick,
            entities: store.len(),
            jobs,
            elapsed: self.time.elapsed(),
        })
    }

    fn check_stalled(&mut self) -> Result<(), StepError> {
        let Some(handle) = &self.stalled else {
            return Ok(());
        };
        if !handle.is_settled() {
            return Err(StepError::Stalled {
                id: handle.id(),
                job: handle.name().to_string(),
            });
        }
        tracing::debug!(job = %handle.id(), status = ?handle.status(), "stalled tick settled");
        self.stalled = None;
        Ok(())
    }
}

/// Descriptors for one tick, in dependency order.
pub fn tick_jobs(len: usize, params: &TickParams) -> Vec<JobDescriptor> {
    let mut jobs = vec![
        force_accumulation(len, params),
        integration(len, params.delta_time),
    ];
    if let Some(boundary) = params.boundary {
        jobs.push(boundary_constraint(len, boundary));
    }
    if let Some(turn_speed) = params.turn_speed {
        jobs.push(orientation(len, turn_speed, params.delta_time));
    }
    jobs
}

fn schedule_chain(
    scheduler: &Scheduler,
    store: &mut EntityStateStore,
    jobs: Vec<JobDescriptor>,
) -> Result<(JobHandle, usize), StepError> {
    let mut submitted: Vec<JobHandle> = Vec::with_capacity(jobs.len());

    for job in jobs {
        let dependencies = submitted.last().cloned().into_iter().collect::<Vec<_>>();
        match scheduler.schedule(store, job, &dependencies) {
            Ok(handle) => submitted.push(handle),
            Err(err) => {
                // Jobs already in flight must finish before the store is
                // handed back; their outcome is irrelevant to the error.
                let _ = handle::wait_all(&submitted);
                return Err(err.into());
            }
        }
    }

    let jobs = submitted.len();
    let terminal = submitted.pop().unwrap_or_else(JobHandle::completed);
    Ok((terminal, jobs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureReason, KernelError, ScheduleError};
    use crate::handle::JobId;
    use crate::store::{BufferId, EntityInit};
    use glam::{Quat, Vec3};

    fn scheduler() -> Scheduler {
        Scheduler::with_threads(4).unwrap()
    }

    #[test]
    fn single_entity_falls_under_gravity() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(1);
        store.append(EntityInit::at(Vec3::new(0.0, 10.0, 0.0))).unwrap();

        let params = TickParams {
            delta_time: 0.5,
            ..TickParams::default()
        };
        let mut step = SimulationStep::new();
        let report = step.tick(&scheduler, &mut store, &params).unwrap();

        assert_eq!(report.tick, 1);
        assert_eq!(report.jobs, 2);
        let entity = store.at(0).unwrap();
        assert_eq!(entity.force, Vec3::new(0.0, -9.8, 0.0));
        assert!((entity.velocity - Vec3::new(0.0, -4.9, 0.0)).length() < 1e-6);
        assert!((entity.position.y - (10.0 - 2.45)).abs() < 1e-5);
        assert_eq!(step.state(), StepState::Idle);
        assert_eq!(step.time().tick_count(), 1);
    }

    #[test]
    fn full_chain_hands_frame_to_sync() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(64);
        for i in 0..64 {
            store
                .append(EntityInit::at(Vec3::new(i as f32, 0.01, 0.0)).with_velocity(Vec3::X))
                .unwrap();
        }

        let params = TickParams {
            delta_time: 0.1,
            boundary: Some(Boundary::floor(0.0, 0.9)),
            turn_speed: Some(5.0),
            ..TickParams::default()
        };
        let mut step = SimulationStep::new();
        let mut frames = Vec::new();
        let mut sync = |frame: &FrameView<'_>| {
            assert!(frame.positions.iter().all(|p| p.y >= 0.0));
            frames.push((frame.tick, frame.len()));
        };

        for _ in 0..3 {
            let report = step
                .tick_with_sync(&scheduler, &mut store, &params, &mut sync)
                .unwrap();
            assert_eq!(report.jobs, 4);
        }
        assert_eq!(frames, vec![(1, 64), (2, 64), (3, 64)]);
        assert!(store.is_idle());
        assert_ne!(store.rotations().unwrap()[0], Quat::IDENTITY);
    }

    #[test]
    fn floor_contact_bounces_upward() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(1);
        store
            .append(EntityInit::at(Vec3::new(0.0, 0.05, 0.0)).with_velocity(Vec3::new(0.0, -1.0, 0.0)))
            .unwrap();

        let params = TickParams {
            delta_time: 0.1,
            gravity: Vec3::ZERO,
            boundary: Some(Boundary::floor(0.0, 0.9)),
            ..TickParams::default()
        };
        SimulationStep::new()
            .tick(&scheduler, &mut store, &params)
            .unwrap();

        let entity = store.at(0).unwrap();
        assert_eq!(entity.position.y, 0.0);
        assert!((entity.velocity.y - 0.9).abs() < 1e-6);
    }

    #[test]
    fn schedule_conflict_aborts_tick_and_leaves_step_idle() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(8);
        for _ in 0..8 {
            store.append(EntityInit::default()).unwrap();
        }

        // An unrelated writer of positions that cannot start yet.
        let gate = JobHandle::pending(JobId::next(), "gate", Vec::new());
        let foreign = JobDescriptor::new("teleport", 8, |_| Ok(())).writes([BufferId::Position]);
        let foreign = scheduler
            .submit(&mut store, foreign, 8, std::slice::from_ref(&gate))
            .unwrap();

        let mut step = SimulationStep::new();
        let err = step
            .tick(&scheduler, &mut store, &TickParams::default())
            .unwrap_err();
        assert!(matches!(
            err,
            StepError::Schedule(ScheduleError::OverlappingWriteViolation { .. })
        ));
        assert_eq!(step.state(), StepState::Idle);
        assert_eq!(step.time().tick_count(), 0);

        gate.settle(Ok(()));
        foreign.wait().unwrap();
        assert!(step.tick(&scheduler, &mut store, &TickParams::default()).is_ok());
    }

    #[test]
    fn fault_in_chain_fails_tick_without_advancing() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(4);
        for _ in 0..4 {
            store.append(EntityInit::default()).unwrap();
        }

        let bad = JobDescriptor::new("bad_forces", 4, |_| Err(KernelError::fault("nope")))
            .writes([BufferId::Force]);
        let mut step = SimulationStep::new();
        let err = step
            .run_chain(
                &scheduler,
                &mut store,
                vec![bad, integration(4, 0.1)],
                0.1,
                &mut |_: &FrameView<'_>| panic!("sync must not run for a failed tick"),
            )
            .unwrap_err();

        let StepError::Wait(WaitError::Failed(failure)) = err else {
            panic!("expected a job failure, got {err:?}");
        };
        assert_eq!(failure.job, INTEGRATION);
        assert_eq!(failure.reason, FailureReason::Upstream);
        assert_eq!(failure.root_cause().job, "bad_forces");
        assert!(store.is_idle());
        assert_eq!(step.time().tick_count(), 0);
        assert_eq!(step.state(), StepState::Idle);
    }

    #[test]
    fn every_tick_closes_its_timing() {
        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(4);
        for _ in 0..4 {
            store.append(EntityInit::default()).unwrap();
        }
        let mut step = SimulationStep::new();

        let bad = JobDescriptor::new("bad_forces", 4, |_| Err(KernelError::fault("nope")))
            .writes([BufferId::Force]);
        let mut no_sync = |_: &FrameView<'_>| {};
        assert!(step
            .run_chain(&scheduler, &mut store, vec![bad], 0.1, &mut no_sync)
            .is_err());
        assert!(!step.timer().is_open());

        let empty = JobDescriptor::new("no_access", 4, |_| Ok(()));
        assert!(step
            .run_chain(&scheduler, &mut store, vec![empty], 0.1, &mut no_sync)
            .is_err());
        assert!(!step.timer().is_open());

        step.tick(&scheduler, &mut store, &TickParams::default()).unwrap();
        assert!(!step.timer().is_open());
        if cfg!(feature = "metrics") {
            assert_eq!(step.timer().failed_ticks(), 2);
            assert_eq!(step.timer().samples(), 1);
        }
    }

    #[test]
    fn stalled_tick_blocks_until_terminal_settles() {
        let mut step = SimulationStep::new();
        let stuck = JobHandle::pending(JobId::next(), "orientation", Vec::new());
        step.stalled = Some(stuck.clone());

        let scheduler = scheduler();
        let mut store = EntityStateStore::allocate(1);
        store.append(EntityInit::default()).unwrap();

        let err = step
            .tick(&scheduler, &mut store, &TickParams::default())
            .unwrap_err();
        assert!(matches!(err, StepError::Stalled { ref job, .. } if job == "orientation"));

        stuck.settle(Ok(()));
        assert!(step.tick(&scheduler, &mut store, &TickParams::default()).is_ok());
    }

    #[test]
    fn watchdog_config_is_applied() {
        let config = SchedulerConfig {
            watchdog_ms: Some(250),
            ..SchedulerConfig::default()
        };
        let step = SimulationStep::from_config(&config);
        assert_eq!(
            step.watchdog.map(|w| w.limit()),
            Some(std::time::Duration::from_millis(250))
        );
        assert!(SimulationStep::from_config(&SchedulerConfig::default())
            .watchdog
            .is_none());
    }
}
