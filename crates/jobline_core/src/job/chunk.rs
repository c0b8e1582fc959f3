use super::AccessSet;
use crate::error::AccessError;
use crate::store::{Attribute, SharedBuffers};
use std::ops::{Index, IndexMut, Range};

/// Buffer views handed to a kernel for one contiguous index range.
///
/// Read-declared buffers are visible in full, so pairwise kernels can look at
/// every other entity. Write-declared buffers are visible only over this
/// chunk's range, which keeps concurrent chunks of one job disjoint.
pub struct Chunk<'a> {
    job: &'a str,
    range: Range<usize>,
    buffers: &'a SharedBuffers,
    access: &'a AccessSet,
    borrowed: u8,
}

impl<'a> Chunk<'a> {
    pub(crate) fn new(
        job: &'a str,
        range: Range<usize>,
        buffers: &'a SharedBuffers,
        access: &'a AccessSet,
    ) -> Self {
        Self {
            job,
            range,
            buffers,
            access,
            borrowed: 0,
        }
    }

    /// Name of the job this chunk belongs to.
    pub fn job(&self) -> &str {
        self.job
    }

    /// Global entity indices covered by this chunk.
    #[inline]
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Whole read-only view of a read-declared buffer.
    pub fn read<A: Attribute>(&self) -> Result<&'a [A::Value], AccessError> {
        if self.access.writes(A::BUFFER) {
            return Err(AccessError::ReadOfWrittenBuffer {
                job: self.job.to_string(),
                buffer: A::BUFFER,
            });
        }
        if !self.access.reads(A::BUFFER) {
            return Err(AccessError::Undeclared {
                job: self.job.to_string(),
                buffer: A::BUFFER,
                access: "read",
            });
        }
        // SAFETY: the scheduler never runs a writer of this buffer
        // concurrently with this job, and the store holds a lease.
        Ok(unsafe { A::column(self.buffers).as_slice() })
    }

    /// Mutable view of a write-declared buffer over this chunk's range.
    ///
    /// Each buffer can be borrowed once per chunk.
    pub fn write<A: Attribute>(&mut self) -> Result<ChunkMut<'a, A::Value>, AccessError> {
        if !self.access.writes(A::BUFFER) {
            return Err(AccessError::Undeclared {
                job: self.job.to_string(),
                buffer: A::BUFFER,
                access: "write",
            });
        }
        let bit = A::BUFFER.bit();
        if self.borrowed & bit != 0 {
            return Err(AccessError::AlreadyBorrowed {
                job: self.job.to_string(),
                buffer: A::BUFFER,
            });
        }
        self.borrowed |= bit;

        // SAFETY: chunk ranges of one job are disjoint, no other job touches
        // this buffer concurrently, and this chunk hands the range out once.
        let data = unsafe { A::column(self.buffers).slice_mut(self.range.clone()) };
        Ok(ChunkMut {
            start: self.range.start,
            data,
        })
    }
}

/// Mutable chunk view indexed by global entity index.
pub struct ChunkMut<'a, T> {
    start: usize,
    data: &'a mut [T],
}

impl<'a, T> ChunkMut<'a, T> {
    pub fn range(&self) -> Range<usize> {
        self.start..self.start + self.data.len()
    }

    pub fn as_slice(&self) -> &[T] {
        &*self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut *self.data
    }

    /// Iterate `(global_index, value)` pairs.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, &mut T)> + '_ {
        let start = self.start;
        self.data
            .iter_mut()
            .enumerate()
            .map(move |(offset, value)| (start + offset, value))
    }
}

impl<T> Index<usize> for ChunkMut<'_, T> {
    type Output = T;

    #[inline]
    fn index(&self, index: usize) -> &T {
        &self.data[index - self.start]
    }
}

impl<T> IndexMut<usize> for ChunkMut<'_, T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut T {
        &mut self.data[index - self.start]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BufferId, EntityInit, EntityStateStore, Force, Mass, Position, Velocity};
    use glam::Vec3;

    fn store_with(n: usize) -> EntityStateStore {
        let mut store = EntityStateStore::allocate(n);
        for i in 0..n {
            store
                .append(EntityInit::at(Vec3::splat(i as f32)).with_mass(i as f32))
                .unwrap();
        }
        store
    }

    fn access(reads: &[BufferId], writes: &[BufferId]) -> AccessSet {
        let mut set = AccessSet::new();
        set.set_reads(reads.iter().copied());
        set.set_writes(writes.iter().copied());
        set
    }

    #[test]
    fn write_view_uses_global_indices() {
        let store = store_with(6);
        let set = access(&[BufferId::Mass], &[BufferId::Velocity]);
        let mut chunk = Chunk::new("t", 2..5, store.shared(), &set);

        let mass = chunk.read::<Mass>().unwrap();
        let mut vel = chunk.write::<Velocity>().unwrap();
        assert_eq!(mass.len(), 6);
        assert_eq!(vel.range(), 2..5);
        for i in chunk.range() {
            vel[i] = Vec3::splat(mass[i]);
        }
        drop(vel);

        let velocities = store.velocities().unwrap();
        assert_eq!(velocities[1], Vec3::ZERO);
        assert_eq!(velocities[4], Vec3::splat(4.0));
    }

    #[test]
    fn undeclared_and_repeated_access_is_refused() {
        let store = store_with(2);
        let set = access(&[BufferId::Mass], &[BufferId::Force]);
        let mut chunk = Chunk::new("t", 0..2, store.shared(), &set);

        assert!(matches!(
            chunk.read::<Position>(),
            Err(AccessError::Undeclared { access: "read", .. })
        ));
        assert!(matches!(
            chunk.read::<Force>(),
            Err(AccessError::ReadOfWrittenBuffer { .. })
        ));
        assert!(matches!(
            chunk.write::<Velocity>(),
            Err(AccessError::Undeclared { access: "write", .. })
        ));

        let _force = chunk.write::<Force>().unwrap();
        assert!(matches!(
            chunk.write::<Force>(),
            Err(AccessError::AlreadyBorrowed { .. })
        ));
    }
}
