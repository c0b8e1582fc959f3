//! Simulation time
//!
//! Fixed 60Hz default tick with explicit per-tick delta.

/// Default simulation tick rate.
pub const TICK_RATE_HZ: u32 = 60;
/// Default seconds per tick.
pub const TICK_SECONDS: f32 = 1.0 / TICK_RATE_HZ as f32;

/// Simulated time advanced once per completed tick.
#[derive(Debug, Clone, Default)]
pub struct SimulationTime {
    tick_count: u64,
    elapsed: f64,
}

impl SimulationTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Simulated seconds since the first tick.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn advance(&mut self, delta_time: f32) {
        self.tick_count += 1;
        self.elapsed += f64::from(delta_time);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_delta() {
        let mut time = SimulationTime::new();
        time.advance(0.5);
        time.advance(TICK_SECONDS);
        assert_eq!(time.tick_count(), 2);
        assert!((time.elapsed() - (0.5 + f64::from(TICK_SECONDS))).abs() < 1e-9);
    }
}
