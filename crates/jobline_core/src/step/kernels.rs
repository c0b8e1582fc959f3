// kernels.rs - Job descriptors for the per-tick physics chain
//
// Each builder captures its tick parameters by value, so a descriptor is a
// self-contained unit of work that can be submitted without touching any
// shared state besides the declared buffers.

use super::params::Boundary;
use super::TickParams;
use crate::job::JobDescriptor;
use crate::store::{BufferId, Force, Mass, Position, Rotation, Velocity};
use glam::{Quat, Vec3};

pub const FORCE_ACCUMULATION: &str = "force_accumulation";
pub const INTEGRATION: &str = "integration";
pub const BOUNDARY_CONSTRAINT: &str = "boundary_constraint";
pub const ORIENTATION: &str = "orientation";

/// `F = m * g`, plus pairwise attraction when the gravitational constant is
/// positive. The pairwise form reads every position and is flagged as such.
pub fn force_accumulation(len: usize, params: &TickParams) -> JobDescriptor {
    let gravity = params.gravity;

    if !params.is_pairwise() {
        return JobDescriptor::new(FORCE_ACCUMULATION, len, move |chunk| {
            let masses = chunk.read::<Mass>()?;
            let mut forces = chunk.write::<Force>()?;
            for (i, force) in forces.iter_mut() {
                *force = gravity * masses[i];
            }
            Ok(())
        })
        .reads([BufferId::Mass])
        .writes([BufferId::Force]);
    }

    let g = params.gravitational_constant;
    let softening_sq = params.softening * params.softening;
    JobDescriptor::new(FORCE_ACCUMULATION, len, move |chunk| {
        let positions = chunk.read::<Position>()?;
        let masses = chunk.read::<Mass>()?;
        let mut forces = chunk.write::<Force>()?;

        for (i, force) in forces.iter_mut() {
            let (p_i, m_i) = (positions[i], masses[i]);
            let mut total = gravity * m_i;
            for (j, (&p_j, &m_j)) in positions.iter().zip(masses).enumerate() {
                if j == i {
                    continue;
                }
                let r = p_j - p_i;
                let dist_sq = r.length_squared() + softening_sq;
                if dist_sq > 0.0 {
                    total += r * (g * m_i * m_j / (dist_sq * dist_sq.sqrt()));
                }
            }
            *force = total;
        }
        Ok(())
    })
    .reads([BufferId::Position, BufferId::Mass])
    .writes([BufferId::Force])
    .pairwise()
}

/// Semi-implicit Euler: velocity first, then position with the new velocity.
/// Non-positive mass is treated as immovable.
pub fn integration(len: usize, delta_time: f32) -> JobDescriptor {
    JobDescriptor::new(INTEGRATION, len, move |chunk| {
        let forces = chunk.read::<Force>()?;
        let masses = chunk.read::<Mass>()?;
        let mut velocities = chunk.write::<Velocity>()?;
        let mut positions = chunk.write::<Position>()?;

        for i in chunk.range() {
            let inv_mass = if masses[i] > 0.0 { masses[i].recip() } else { 0.0 };
            velocities[i] += forces[i] * inv_mass * delta_time;
            positions[i] += velocities[i] * delta_time;
        }
        Ok(())
    })
    .reads([BufferId::Force, BufferId::Mass])
    .writes([BufferId::Velocity, BufferId::Position])
}

pub fn boundary_constraint(len: usize, boundary: Boundary) -> JobDescriptor {
    JobDescriptor::new(BOUNDARY_CONSTRAINT, len, move |chunk| {
        let mut positions = chunk.write::<Position>()?;
        let mut velocities = chunk.write::<Velocity>()?;
        for i in chunk.range() {
            boundary.apply(&mut positions[i], &mut velocities[i]);
        }
        Ok(())
    })
    .writes([BufferId::Position, BufferId::Velocity])
}

/// Turn each rotation toward its velocity by `turn_speed * dt` (clamped to a
/// full turn). Entities at rest keep their rotation.
pub fn orientation(len: usize, turn_speed: f32, delta_time: f32) -> JobDescriptor {
    let t = (turn_speed * delta_time).clamp(0.0, 1.0);
    JobDescriptor::new(ORIENTATION, len, move |chunk| {
        let velocities = chunk.read::<Velocity>()?;
        let mut rotations = chunk.write::<Rotation>()?;
        for (i, rotation) in rotations.iter_mut() {
            let Some(heading) = velocities[i].try_normalize() else {
                continue;
            };
            let target = Quat::from_rotation_arc(Vec3::Z, heading);
            *rotation = rotation.slerp(target, t).normalize();
        }
        Ok(())
    })
    .reads([BufferId::Velocity])
    .writes([BufferId::Rotation])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobShape;
    use crate::scheduler::Scheduler;
    use crate::store::{EntityInit, EntityStateStore};

    fn run(store: &mut EntityStateStore, job: JobDescriptor) {
        let scheduler = Scheduler::with_threads(2).unwrap();
        scheduler.schedule(store, job, &[]).unwrap().wait().unwrap();
    }

    #[test]
    fn uniform_gravity_scales_with_mass() {
        let mut store = EntityStateStore::allocate(2);
        store.append(EntityInit::default()).unwrap();
        store.append(EntityInit::default().with_mass(3.0)).unwrap();

        let job = force_accumulation(2, &TickParams::default());
        assert_eq!(job.shape(), JobShape::PerIndex);
        run(&mut store, job);

        let forces = store.forces().unwrap();
        assert_eq!(forces[0], Vec3::new(0.0, -9.8, 0.0));
        assert_eq!(forces[1], Vec3::new(0.0, -9.8 * 3.0, 0.0));
    }

    #[test]
    fn pairwise_bodies_attract_each_other() {
        let mut store = EntityStateStore::allocate(2);
        store.append(EntityInit::at(Vec3::new(-1.0, 0.0, 0.0))).unwrap();
        store.append(EntityInit::at(Vec3::new(1.0, 0.0, 0.0))).unwrap();

        let params = TickParams {
            gravity: Vec3::ZERO,
            gravitational_constant: 1.0,
            softening: 0.0,
            ..TickParams::default()
        };
        let job = force_accumulation(2, &params);
        assert_eq!(job.shape(), JobShape::Pairwise);
        run(&mut store, job);

        // G * m * m / d^2 with d = 2
        let forces = store.forces().unwrap();
        assert!((forces[0].x - 0.25).abs() < 1e-6);
        assert!((forces[1].x + 0.25).abs() < 1e-6);
        assert_eq!(forces[0].y, 0.0);
    }

    #[test]
    fn orientation_faces_velocity() {
        let mut store = EntityStateStore::allocate(2);
        store.append(EntityInit::default().with_velocity(Vec3::X)).unwrap();
        store.append(EntityInit::default()).unwrap();

        run(&mut store, orientation(2, 100.0, 1.0));

        let rotations = store.rotations().unwrap();
        assert!((rotations[0] * Vec3::Z - Vec3::X).length() < 1e-5);
        assert_eq!(rotations[1], Quat::IDENTITY);
    }

    #[test]
    fn immovable_mass_only_moves_by_velocity() {
        let mut store = EntityStateStore::allocate(1);
        store
            .append(EntityInit::default().with_mass(0.0).with_velocity(Vec3::X))
            .unwrap();
        *store.at_mut(0).unwrap().force = Vec3::splat(100.0);

        run(&mut store, integration(1, 0.5));

        let record = store.at(0).unwrap();
        assert_eq!(record.velocity, Vec3::X);
        assert_eq!(record.position, Vec3::new(0.5, 0.0, 0.0));
    }
}
