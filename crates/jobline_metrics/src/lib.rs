//! Jobline Metrics - Common utilities for scheduler and tick tracking
//!
//! Provides zero-cost abstractions for metrics collection that completely
//! vanish in production builds via feature flags.
//!
//! # Feature Flags
//!
//! - `metrics` - Enable metrics collection (default: disabled)
//!
//! # Usage
//!
//! ```ignore
//! use jobline_metrics::{JobCounters, TickTimer};
//!
//! let mut timer = TickTimer::new(60); // Track last 60 ticks
//! timer.begin();
//! // ... run one tick ...
//! timer.end(true);
//! println!("tick: {:.2}ms", timer.tick_time_ms());
//! ```
//!
//! In production builds (without `metrics` feature), all instrumentation
//! is compiled out to zero overhead. `JobCounters` is `Sync` in both modes so
//! it can be shared with worker threads behind an `Arc`.

#[cfg(feature = "metrics")]
mod job_counters;
#[cfg(feature = "metrics")]
mod phase_profiler;
#[cfg(feature = "metrics")]
mod ring_buffer;
#[cfg(feature = "metrics")]
mod tick_timer;

#[cfg(feature = "metrics")]
pub use job_counters::JobCounters;
#[cfg(feature = "metrics")]
pub use phase_profiler::PhaseProfiler;
#[cfg(feature = "metrics")]
pub use ring_buffer::RingBuffer;
#[cfg(feature = "metrics")]
pub use tick_timer::TickTimer;

/// Point-in-time copy of the job counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub jobs_submitted: u64,
    pub jobs_failed: u64,
    pub chunks_run: u64,
    pub chunks_failed: u64,
}

// ============================================================================
// No-op stubs when metrics disabled
// ============================================================================

#[cfg(not(feature = "metrics"))]
pub struct TickTimer;

#[cfg(not(feature = "metrics"))]
impl TickTimer {
    pub fn new(_capacity: usize) -> Self { Self }
    pub fn begin(&mut self) {}
    pub fn end(&mut self, _completed: bool) {}
    pub fn is_open(&self) -> bool { false }
    pub fn ticks_per_second(&self) -> f64 { 0.0 }
    pub fn tick_time_ms(&self) -> f64 { 0.0 }
    pub fn last_tick_ms(&self) -> f64 { 0.0 }
    pub fn tick_time_range_ms(&self) -> (f64, f64) { (0.0, 0.0) }
    pub fn samples(&self) -> usize { 0 }
    pub fn failed_ticks(&self) -> u64 { 0 }
}

#[cfg(not(feature = "metrics"))]
pub struct RingBuffer<T>(std::marker::PhantomData<T>);

#[cfg(not(feature = "metrics"))]
impl<T> RingBuffer<T> {
    pub fn new(_capacity: usize) -> Self { Self(std::marker::PhantomData) }
    pub fn push(&mut self, _value: T) {}
    pub fn len(&self) -> usize { 0 }
    pub fn is_empty(&self) -> bool { true }
}

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct JobCounters;

#[cfg(not(feature = "metrics"))]
impl JobCounters {
    pub fn new() -> Self { Self }
    pub fn record_submit(&self) {}
    pub fn record_job_failure(&self) {}
    pub fn record_chunk(&self, _ok: bool) {}
    pub fn snapshot(&self) -> CounterSnapshot { CounterSnapshot::default() }
    pub fn reset(&self) {}
}

#[cfg(not(feature = "metrics"))]
#[derive(Default)]
pub struct PhaseProfiler;

#[cfg(not(feature = "metrics"))]
impl PhaseProfiler {
    pub fn new() -> Self { Self }
    pub fn time_phase<F, R>(&mut self, _name: &'static str, f: F) -> R where F: FnOnce() -> R { f() }
    pub fn get_timing(&self, _name: &str) -> std::time::Duration { std::time::Duration::ZERO }
    pub fn reset(&mut self) {}
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, std::time::Duration)> + '_ { std::iter::empty() }
}
