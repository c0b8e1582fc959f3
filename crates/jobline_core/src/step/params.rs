use crate::config::JoblineConfig;
use crate::time::TICK_SECONDS;
use glam::Vec3;

/// Read-only inputs for one tick, captured into the job descriptors when
/// they are built. Kernels never read ambient state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickParams {
    pub delta_time: f32,
    /// Acceleration applied to every entity (force is `mass * gravity`).
    pub gravity: Vec3,
    /// Pairwise attraction constant; zero or less skips the N-body term.
    pub gravitational_constant: f32,
    pub softening: f32,
    pub boundary: Option<Boundary>,
    /// Turn rate for the orientation pass; `None` skips the pass.
    pub turn_speed: Option<f32>,
}

impl Default for TickParams {
    fn default() -> Self {
        Self {
            delta_time: TICK_SECONDS,
            gravity: Vec3::new(0.0, -9.8, 0.0),
            gravitational_constant: 0.0,
            softening: 0.1,
            boundary: None,
            turn_speed: None,
        }
    }
}

impl TickParams {
    pub fn from_config(config: &JoblineConfig) -> Self {
        let physics = &config.physics;
        let boundary = physics.boundary.then(|| Boundary {
            floor_y: physics.floor_y,
            restitution: physics.restitution,
            half_extents: physics.bounds.map(Vec3::from),
            center: Vec3::from(physics.bounds_center),
        });

        Self {
            delta_time: config.simulation.delta_time,
            gravity: Vec3::from(physics.gravity),
            gravitational_constant: physics.gravitational_constant,
            softening: physics.softening,
            boundary,
            turn_speed: physics.turn_speed,
        }
    }

    #[inline]
    pub fn is_pairwise(&self) -> bool {
        self.gravitational_constant > 0.0
    }
}

/// Floor plane plus an optional axis-aligned box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Boundary {
    pub floor_y: f32,
    /// Fraction of the normal velocity kept after a bounce.
    pub restitution: f32,
    pub half_extents: Option<Vec3>,
    pub center: Vec3,
}

impl Boundary {
    pub fn floor(floor_y: f32, restitution: f32) -> Self {
        Self {
            floor_y,
            restitution,
            half_extents: None,
            center: Vec3::ZERO,
        }
    }

    pub fn with_box(mut self, center: Vec3, half_extents: Vec3) -> Self {
        self.center = center;
        self.half_extents = Some(half_extents);
        self
    }

    /// Clamp `position` inside the boundary and reflect the velocity component
    /// that carried it out.
    pub fn apply(&self, position: &mut Vec3, velocity: &mut Vec3) {
        if position.y < self.floor_y {
            position.y = self.floor_y;
            if velocity.y < 0.0 {
                velocity.y = -velocity.y * self.restitution;
            }
        }

        let Some(half) = self.half_extents else {
            return;
        };
        let min = self.center - half;
        let max = self.center + half;
        for axis in 0..3 {
            if position[axis] < min[axis] {
                position[axis] = min[axis];
                if velocity[axis] < 0.0 {
                    velocity[axis] = -velocity[axis] * self.restitution;
                }
            } else if position[axis] > max[axis] {
                position[axis] = max[axis];
                if velocity[axis] > 0.0 {
                    velocity[axis] = -velocity[axis] * self.restitution;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_bounce_reflects_and_damps() {
        let floor = Boundary::floor(0.0, 0.9);
        let mut p = Vec3::new(1.0, -0.5, 0.0);
        let mut v = Vec3::new(2.0, -10.0, 0.0);
        floor.apply(&mut p, &mut v);
        assert_eq!(p, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(v, Vec3::new(2.0, 9.0, 0.0));
    }

    #[test]
    fn box_clamps_each_axis() {
        let bounds = Boundary::floor(-100.0, 0.5).with_box(Vec3::ZERO, Vec3::splat(10.0));
        let mut p = Vec3::new(12.0, 0.0, -11.0);
        let mut v = Vec3::new(4.0, 1.0, -2.0);
        bounds.apply(&mut p, &mut v);
        assert_eq!(p, Vec3::new(10.0, 0.0, -10.0));
        assert_eq!(v, Vec3::new(-2.0, 1.0, 1.0));
    }

    #[test]
    fn from_config_maps_physics_section() {
        let mut config = JoblineConfig::default();
        config.physics.bounds = Some([5.0, 6.0, 7.0]);
        config.physics.turn_speed = Some(2.0);
        let params = TickParams::from_config(&config);

        let boundary = params.boundary.unwrap();
        assert_eq!(boundary.restitution, 0.9);
        assert_eq!(boundary.half_extents, Some(Vec3::new(5.0, 6.0, 7.0)));
        assert_eq!(params.turn_speed, Some(2.0));
        assert!(!params.is_pairwise());

        config.physics.boundary = false;
        assert!(TickParams::from_config(&config).boundary.is_none());
    }
}
