//! Struct-of-arrays entity state.
//!
//! An [`EntityStateStore`] owns one contiguous buffer per attribute
//! (position, velocity, mass, force, rotation). The entity index *is* its
//! identity: there is no ID indirection, and every buffer always has the same
//! length. Storage is reserved once for the domain's maximum entity count and
//! never grows implicitly.
//!
//! Jobs borrow the buffers through a lease taken at submission. While any
//! lease is outstanding the store refuses both structural changes and direct
//! element access with [`StoreError::BuffersInFlight`]; waiting on the
//! terminal job handle of a tick releases every lease for that tick.

mod attribute;
mod buffers;
mod in_flight;

pub use attribute::{Attribute, BufferId, Force, Mass, Position, Rotation, Velocity};
pub use buffers::StoreId;
pub(crate) use buffers::{SharedBuffers, StoreLease};

use crate::error::StoreError;
use buffers::Row;
use glam::{Quat, Vec3};
use std::sync::Arc;

/// Initial values supplied by the entity lifecycle manager.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EntityInit {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub rotation: Quat,
}

impl EntityInit {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }
}

impl Default for EntityInit {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            mass: 1.0,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Copy of every attribute of one entity.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EntityRecord {
    pub position: Vec3,
    pub velocity: Vec3,
    pub mass: f32,
    pub force: Vec3,
    pub rotation: Quat,
}

/// Mutable views of every attribute of one entity.
pub struct EntityMut<'a> {
    pub position: &'a mut Vec3,
    pub velocity: &'a mut Vec3,
    pub mass: &'a mut f32,
    pub force: &'a mut Vec3,
    pub rotation: &'a mut Quat,
}

/// Owner of the attribute buffers for one simulation domain.
pub struct EntityStateStore {
    buffers: Arc<SharedBuffers>,
    capacity: usize,
    len: usize,
}

impl EntityStateStore {
    /// Reserve storage for `capacity` entities in every buffer.
    pub fn allocate(capacity: usize) -> Self {
        tracing::debug!(capacity, "allocating entity state store");
        Self {
            buffers: SharedBuffers::with_capacity(capacity),
            capacity,
            len: 0,
        }
    }

    pub fn id(&self) -> StoreId {
        self.buffers.id()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of submitted jobs that still hold a lease on the buffers.
    pub fn outstanding_jobs(&self) -> usize {
        self.buffers.outstanding()
    }

    /// Whether no job currently holds a lease on the buffers.
    pub fn is_idle(&self) -> bool {
        self.outstanding_jobs() == 0
    }

    fn ensure_idle(&self) -> Result<(), StoreError> {
        match self.buffers.outstanding() {
            0 => Ok(()),
            outstanding => Err(StoreError::BuffersInFlight { outstanding }),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), StoreError> {
        if index < self.len {
            Ok(())
        } else {
            Err(StoreError::IndexOutOfBounds {
                index,
                len: self.len,
            })
        }
    }

    /// Add one entity and return its index.
    ///
    /// Fails with [`StoreError::CapacityExceeded`] once `capacity` entities
    /// exist; the store is left unchanged.
    pub fn append(&mut self, init: EntityInit) -> Result<usize, StoreError> {
        self.ensure_idle()?;
        if self.len >= self.capacity {
            return Err(StoreError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let index = self.len;
        // SAFETY: no lease outstanding and `&mut self` excludes other access.
        unsafe {
            self.buffers.push_row(Row {
                position: init.position,
                velocity: init.velocity,
                mass: init.mass,
                force: Vec3::ZERO,
                rotation: init.rotation,
            });
        }
        self.len += 1;
        Ok(index)
    }

    /// Remove an entity by moving the last entity into its slot.
    ///
    /// Returns the previous index of the entity that moved, if any. Callers
    /// that map indices to presentation objects must remap that index.
    pub fn swap_remove(&mut self, index: usize) -> Result<Option<usize>, StoreError> {
        self.ensure_idle()?;
        self.check_index(index)?;

        let last = self.len - 1;
        // SAFETY: no lease outstanding, index checked above.
        unsafe { self.buffers.swap_remove_row(index) };
        self.len -= 1;
        Ok((index != last).then_some(last))
    }

    /// Read every attribute of one entity.
    pub fn at(&self, index: usize) -> Result<EntityRecord, StoreError> {
        self.ensure_idle()?;
        self.check_index(index)?;
        // SAFETY: no lease outstanding, so no job is writing.
        unsafe {
            Ok(EntityRecord {
                position: self.buffers.position.as_slice()[index],
                velocity: self.buffers.velocity.as_slice()[index],
                mass: self.buffers.mass.as_slice()[index],
                force: self.buffers.force.as_slice()[index],
                rotation: self.buffers.rotation.as_slice()[index],
            })
        }
    }

    /// Mutable views of every attribute of one entity.
    pub fn at_mut(&mut self, index: usize) -> Result<EntityMut<'_>, StoreError> {
        self.ensure_idle()?;
        self.check_index(index)?;
        // SAFETY: no lease outstanding; the returned borrow ties up `&mut self`.
        let row = unsafe { self.buffers.row_mut(index) };
        Ok(EntityMut {
            position: row.position,
            velocity: row.velocity,
            mass: row.mass,
            force: row.force,
            rotation: row.rotation,
        })
    }

    /// Whole-buffer read access, e.g. for render sync after a tick.
    pub fn buffer<A: Attribute>(&self) -> Result<&[A::Value], StoreError> {
        self.ensure_idle()?;
        // SAFETY: no lease outstanding, so no job is writing.
        Ok(unsafe { A::column(&self.buffers).as_slice() })
    }

    pub fn positions(&self) -> Result<&[Vec3], StoreError> {
        self.buffer::<Position>()
    }

    pub fn velocities(&self) -> Result<&[Vec3], StoreError> {
        self.buffer::<Velocity>()
    }

    pub fn masses(&self) -> Result<&[f32], StoreError> {
        self.buffer::<Mass>()
    }

    pub fn forces(&self) -> Result<&[Vec3], StoreError> {
        self.buffer::<Force>()
    }

    pub fn rotations(&self) -> Result<&[Quat], StoreError> {
        self.buffer::<Rotation>()
    }

    /// Change reserved capacity. Never drops live entities.
    pub fn resize(&mut self, capacity: usize) -> Result<(), StoreError> {
        self.ensure_idle()?;
        if capacity < self.len {
            return Err(StoreError::ShrinkBelowLength {
                requested: capacity,
                len: self.len,
            });
        }
        // SAFETY: no lease outstanding.
        unsafe { self.buffers.set_capacity(capacity) };
        tracing::debug!(from = self.capacity, to = capacity, "resized entity state store");
        self.capacity = capacity;
        Ok(())
    }

    /// Drop every entity and give the storage back.
    pub fn release(&mut self) -> Result<(), StoreError> {
        self.ensure_idle()?;
        // SAFETY: no lease outstanding.
        unsafe { self.buffers.release_all() };
        tracing::debug!(released = self.len, "released entity state store");
        self.len = 0;
        self.capacity = 0;
        Ok(())
    }

    pub(crate) fn shared(&self) -> &Arc<SharedBuffers> {
        &self.buffers
    }

    pub(crate) fn lease(&self) -> StoreLease {
        StoreLease::acquire(&self.buffers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sand(y: f32) -> EntityInit {
        EntityInit::at(Vec3::new(0.0, y, 0.0))
    }

    #[test]
    fn append_beyond_capacity_fails_without_growing() {
        let mut store = EntityStateStore::allocate(10);
        for i in 0..10 {
            assert_eq!(store.append(sand(i as f32)).unwrap(), i);
        }

        let err = store.append(sand(99.0)).unwrap_err();
        assert!(matches!(err, StoreError::CapacityExceeded { capacity: 10 }));
        assert_eq!(store.len(), 10);
        assert_eq!(store.positions().unwrap().len(), 10);
        assert_eq!(store.masses().unwrap().len(), 10);
    }

    #[test]
    fn at_mut_writes_every_buffer() {
        let mut store = EntityStateStore::allocate(2);
        store.append(sand(1.0)).unwrap();

        {
            let entity = store.at_mut(0).unwrap();
            *entity.velocity = Vec3::X;
            *entity.mass = 4.0;
            *entity.force = Vec3::Y;
        }

        let record = store.at(0).unwrap();
        assert_eq!(record.velocity, Vec3::X);
        assert_eq!(record.mass, 4.0);
        assert_eq!(record.force, Vec3::Y);
        assert_eq!(record.rotation, Quat::IDENTITY);
        assert!(store.at(1).is_err());
    }

    #[test]
    fn swap_remove_keeps_buffers_aligned() {
        let mut store = EntityStateStore::allocate(4);
        for (y, m) in [(0.0, 1.0), (1.0, 2.0), (2.0, 3.0)] {
            store.append(sand(y).with_mass(m)).unwrap();
        }

        assert_eq!(store.swap_remove(0).unwrap(), Some(2));
        assert_eq!(store.len(), 2);
        let moved = store.at(0).unwrap();
        assert_eq!(moved.position.y, 2.0);
        assert_eq!(moved.mass, 3.0);

        assert_eq!(store.swap_remove(1).unwrap(), None);
        assert_eq!(store.velocities().unwrap().len(), 1);
    }

    #[test]
    fn resize_refuses_to_drop_entities() {
        let mut store = EntityStateStore::allocate(4);
        store.append(sand(0.0)).unwrap();
        store.append(sand(1.0)).unwrap();

        assert!(matches!(
            store.resize(1),
            Err(StoreError::ShrinkBelowLength { requested: 1, len: 2 })
        ));
        store.resize(8).unwrap();
        assert_eq!(store.capacity(), 8);

        store.release().unwrap();
        assert!(store.is_empty());
        assert!(matches!(
            store.append(sand(0.0)),
            Err(StoreError::CapacityExceeded { capacity: 0 })
        ));
    }

    #[test]
    fn outstanding_lease_blocks_access() {
        let mut store = EntityStateStore::allocate(2);
        store.append(sand(0.0)).unwrap();

        let lease = store.lease();
        assert!(matches!(
            store.positions(),
            Err(StoreError::BuffersInFlight { outstanding: 1 })
        ));
        assert!(store.append(sand(1.0)).is_err());
        drop(lease);

        assert!(store.is_idle());
        assert_eq!(store.append(sand(1.0)).unwrap(), 1);
    }
}
