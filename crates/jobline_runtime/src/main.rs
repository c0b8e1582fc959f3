//! Jobline Runtime
//!
//! Headless binary that runs the configured scenario for a fixed number of
//! ticks and logs per-tick summaries and metrics.
//!
//! Usage: `jobline [config.json]`. Log verbosity follows `RUST_LOG`.

mod spawn;

use anyhow::{Context, Result};
use glam::Vec3;
use jobline_core::{
    EntityStateStore, FrameView, JoblineConfig, Scheduler, SimulationStep, TickParams,
};
use tracing_subscriber::EnvFilter;

const REPORT_EVERY: u64 = 60;

/// Render-side stand-in: tracks the population's bounds and centroid.
#[derive(Default)]
struct FrameSummary {
    tick: u64,
    centroid: Vec3,
    lowest: f32,
}

impl FrameSummary {
    fn record(&mut self, frame: &FrameView<'_>) {
        self.tick = frame.tick;
        if frame.is_empty() {
            return;
        }
        let sum: Vec3 = frame.positions.iter().copied().sum();
        self.centroid = sum / frame.len() as f32;
        self.lowest = frame
            .positions
            .iter()
            .map(|p| p.y)
            .fold(f32::INFINITY, f32::min);
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Jobline v{}", jobline_core::VERSION);

    let config = match std::env::args().nth(1) {
        Some(path) => JoblineConfig::load(&path)
            .with_context(|| format!("loading config from {path}"))?,
        None => JoblineConfig::default(),
    };

    let scheduler = Scheduler::new(config.scheduler.clone()).context("starting worker pool")?;
    let mut store = EntityStateStore::allocate(config.simulation.capacity);
    let spawned = spawn::populate(&mut store, &config.simulation).context("spawning entities")?;
    tracing::info!(
        scenario = ?config.simulation.scenario,
        entities = spawned,
        workers = scheduler.worker_count(),
        "simulation ready"
    );

    let params = TickParams::from_config(&config);
    let mut step = SimulationStep::from_config(&config.scheduler);
    let mut summary = FrameSummary::default();
    let mut sync = |frame: &FrameView<'_>| summary.record(frame);

    for _ in 0..config.simulation.ticks {
        let report = step
            .tick_with_sync(&scheduler, &mut store, &params, &mut sync)
            .context("tick failed")?;

        if report.tick % REPORT_EVERY == 0 {
            let timer = step.timer();
            let profiler = step.profiler();
            let ms = |phase| profiler.get_timing(phase).as_secs_f64() * 1000.0;
            tracing::info!(
                tick = report.tick,
                sim_seconds = report.elapsed,
                tps = timer.ticks_per_second(),
                tick_ms = timer.tick_time_ms(),
                last_tick_ms = timer.last_tick_ms(),
                slowest_tick_ms = timer.tick_time_range_ms().1,
                scheduling_ms = ms("scheduling"),
                awaiting_ms = ms("awaiting"),
                sync_ms = ms("sync"),
                "progress"
            );
            step.reset_profile();
        }
    }

    let counters = scheduler.counters();
    tracing::info!(
        ticks = step.time().tick_count(),
        last_synced = summary.tick,
        centroid = ?summary.centroid,
        lowest_y = summary.lowest,
        jobs = counters.jobs_submitted,
        chunks = counters.chunks_run,
        failed_chunks = counters.chunks_failed,
        "simulation finished"
    );

    Ok(())
}
