//! Wall-clock timing of whole ticks

use super::ring_buffer::RingBuffer;
use std::time::{Duration, Instant};

/// Rolling window over completed ticks, plus a count of ticks that failed.
///
/// Each tick is opened with [`begin`](Self::begin) and closed with
/// [`end`](Self::end). Only completed ticks enter the window, so a failing
/// tick never skews the reported rate.
pub struct TickTimer {
    open: Option<Instant>,
    completed: RingBuffer<Duration>,
    failed: u64,
}

impl TickTimer {
    pub fn new(window: usize) -> Self {
        Self {
            open: None,
            completed: RingBuffer::new(window),
            failed: 0,
        }
    }

    /// Open a tick. Calling this again before `end` restarts the measurement.
    pub fn begin(&mut self) {
        self.open = Some(Instant::now());
    }

    /// Close the open tick. Does nothing if no tick is open.
    pub fn end(&mut self, completed: bool) {
        let Some(started) = self.open.take() else {
            return;
        };
        if completed {
            self.completed.push(started.elapsed());
        } else {
            self.failed += 1;
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn ticks_per_second(&self) -> f64 {
        let avg = self.tick_time_ms();
        if avg > 0.0 {
            1000.0 / avg
        } else {
            0.0
        }
    }

    pub fn tick_time_ms(&self) -> f64 {
        millis(self.completed.average())
    }

    pub fn last_tick_ms(&self) -> f64 {
        self.completed.latest().map_or(0.0, millis)
    }

    pub fn tick_time_range_ms(&self) -> (f64, f64) {
        let (min, max) = self.completed.min_max();
        (millis(min), millis(max))
    }

    /// Completed ticks currently in the window.
    pub fn samples(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_ticks(&self) -> u64 {
        self.failed
    }
}

fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_ticks_stay_out_of_the_window() {
        let mut timer = TickTimer::new(4);
        timer.begin();
        assert!(timer.is_open());
        timer.end(false);
        assert!(!timer.is_open());
        assert_eq!(timer.samples(), 0);
        assert_eq!(timer.failed_ticks(), 1);
        assert_eq!(timer.ticks_per_second(), 0.0);

        timer.begin();
        std::thread::sleep(Duration::from_millis(2));
        timer.end(true);
        assert_eq!(timer.samples(), 1);
        assert!(timer.last_tick_ms() >= 2.0);
        assert_eq!(timer.tick_time_range_ms().0, timer.last_tick_ms());
    }

    #[test]
    fn end_without_begin_is_ignored() {
        let mut timer = TickTimer::new(4);
        timer.end(true);
        timer.end(false);
        assert_eq!(timer.samples(), 0);
        assert_eq!(timer.failed_ticks(), 0);
    }

    #[test]
    fn window_keeps_recent_ticks() {
        let mut timer = TickTimer::new(2);
        for _ in 0..5 {
            timer.begin();
            timer.end(true);
        }
        assert_eq!(timer.samples(), 2);
    }
}
