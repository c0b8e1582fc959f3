//! Configuration loaded once at startup.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoblineConfig {
    pub scheduler: SchedulerConfig,
    pub simulation: SimulationConfig,
    pub physics: PhysicsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Worker threads in the pool. 0 picks one per logical core.
    pub worker_threads: usize,
    /// Default chunk length for per-index jobs.
    pub batch_size: usize,
    /// Default chunk length for pairwise jobs.
    pub pairwise_batch_size: usize,
    /// Deadlock watchdog limit in milliseconds. Unset disables the watchdog.
    pub watchdog_ms: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            batch_size: 64,
            pairwise_batch_size: 8,
            watchdog_ms: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scenario {
    /// Particles dropped in a column that bounce on the floor.
    #[default]
    Sand,
    /// Randomly placed bodies attracting each other.
    Stars,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Maximum entity count; buffers are reserved for this many up front.
    pub capacity: usize,
    /// Entities spawned by the runtime before the first tick.
    pub spawn: usize,
    /// Seconds per tick.
    pub delta_time: f32,
    /// Ticks the runtime executes.
    pub ticks: u64,
    /// Seed for deterministic spawning.
    pub seed: u64,
    pub scenario: Scenario,
    /// Spawn radius used by the stars scenario.
    pub spawn_radius: f32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            capacity: 20_000,
            spawn: 500,
            delta_time: crate::time::TICK_SECONDS,
            ticks: 600,
            seed: 1_851_936_439,
            scenario: Scenario::Sand,
            spawn_radius: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Uniform acceleration applied to every entity.
    pub gravity: [f32; 3],
    /// Pairwise attraction constant. 0 skips the N-body term.
    pub gravitational_constant: f32,
    /// Distance added in quadrature to avoid singular forces.
    pub softening: f32,
    /// Enables the boundary pass.
    pub boundary: bool,
    pub floor_y: f32,
    /// Fraction of velocity kept when bouncing off a boundary.
    pub restitution: f32,
    /// Half extents of an optional box around `bounds_center`.
    pub bounds: Option<[f32; 3]>,
    pub bounds_center: [f32; 3],
    /// Enables the orientation pass with this turn rate (per second).
    pub turn_speed: Option<f32>,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, -9.8, 0.0],
            gravitational_constant: 0.0,
            softening: 0.1,
            boundary: true,
            floor_y: 0.0,
            restitution: 0.9,
            bounds: None,
            bounds_center: [0.0; 3],
            turn_speed: None,
        }
    }
}

impl JoblineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scheduler.batch_size == 0 || self.scheduler.pairwise_batch_size == 0 {
            return Err(ConfigError::Invalid("batch sizes must be non-zero".into()));
        }
        if self.simulation.spawn > self.simulation.capacity {
            return Err(ConfigError::Invalid(format!(
                "spawn count {} exceeds capacity {}",
                self.simulation.spawn, self.simulation.capacity
            )));
        }
        if !(self.simulation.delta_time.is_finite() && self.simulation.delta_time > 0.0) {
            return Err(ConfigError::Invalid("delta_time must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.physics.restitution) {
            return Err(ConfigError::Invalid("restitution must be within [0, 1]".into()));
        }
        if let Some(bounds) = self.physics.bounds {
            if bounds.iter().any(|h| !(h.is_finite() && *h > 0.0)) {
                return Err(ConfigError::Invalid("bounds must be positive half extents".into()));
            }
        }
        Ok(())
    }
}
