//! Deterministic initial populations for the built-in scenarios.

use glam::Vec3;
use jobline_core::config::{Scenario, SimulationConfig};
use jobline_core::math::DeterministicRng;
use jobline_core::{EntityInit, EntityStateStore, StoreError};

const SAND_COLUMN_HALF_WIDTH: f32 = 1.0;
const SAND_DROP_HEIGHT: (f32, f32) = (5.0, 15.0);
const STAR_MASS: (f32, f32) = (0.1, 1.0);
const STAR_DRIFT: f32 = 0.5;

/// Fill `store` with `config.spawn` entities for the configured scenario.
pub fn populate(store: &mut EntityStateStore, config: &SimulationConfig) -> Result<usize, StoreError> {
    let mut rng = DeterministicRng::new(config.seed);
    for _ in 0..config.spawn {
        let init = match config.scenario {
            Scenario::Sand => sand(&mut rng),
            Scenario::Stars => star(&mut rng, config.spawn_radius),
        };
        store.append(init)?;
    }
    Ok(store.len())
}

fn sand(rng: &mut DeterministicRng) -> EntityInit {
    let w = SAND_COLUMN_HALF_WIDTH;
    EntityInit::at(Vec3::new(
        rng.range_f32(-w, w),
        rng.range_f32(SAND_DROP_HEIGHT.0, SAND_DROP_HEIGHT.1),
        rng.range_f32(-w, w),
    ))
}

fn star(rng: &mut DeterministicRng, radius: f32) -> EntityInit {
    EntityInit::at(rng.vec3_in_cube(radius))
        .with_velocity(rng.vec3_in_cube(STAR_DRIFT))
        .with_mass(rng.range_f32(STAR_MASS.0, STAR_MASS.1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_population() {
        let config = SimulationConfig {
            spawn: 32,
            scenario: Scenario::Stars,
            ..SimulationConfig::default()
        };
        let mut a = EntityStateStore::allocate(32);
        let mut b = EntityStateStore::allocate(32);
        assert_eq!(populate(&mut a, &config).unwrap(), 32);
        populate(&mut b, &config).unwrap();

        assert_eq!(a.positions().unwrap(), b.positions().unwrap());
        assert_eq!(a.masses().unwrap(), b.masses().unwrap());
        assert!(a.masses().unwrap().iter().all(|&m| m >= 0.1));
    }

    #[test]
    fn sand_starts_above_the_floor_at_rest() {
        let config = SimulationConfig {
            spawn: 16,
            ..SimulationConfig::default()
        };
        let mut store = EntityStateStore::allocate(16);
        populate(&mut store, &config).unwrap();
        assert!(store.positions().unwrap().iter().all(|p| p.y >= 5.0));
        assert!(store.velocities().unwrap().iter().all(|v| *v == Vec3::ZERO));
    }

    #[test]
    fn spawn_beyond_capacity_stops_at_capacity() {
        let config = SimulationConfig {
            spawn: 4,
            ..SimulationConfig::default()
        };
        let mut store = EntityStateStore::allocate(3);
        assert!(matches!(
            populate(&mut store, &config),
            Err(StoreError::CapacityExceeded { capacity: 3 })
        ));
        assert_eq!(store.len(), 3);
    }
}
