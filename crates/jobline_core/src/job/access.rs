use crate::store::BufferId;

/// Read and write buffer sets declared by a job.
///
/// A buffer named in both sets is kept only as a write: the job sees its own
/// chunk of that buffer through the write view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet {
    reads: Vec<BufferId>,
    writes: Vec<BufferId>,
    read_mask: u8,
    write_mask: u8,
}

impl AccessSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the read-only buffer set.
    pub fn set_reads<I>(&mut self, buffers: I)
    where
        I: IntoIterator<Item = BufferId>,
    {
        self.reads = buffers.into_iter().collect();
        self.rebuild();
    }

    /// Replace the write buffer set.
    pub fn set_writes<I>(&mut self, buffers: I)
    where
        I: IntoIterator<Item = BufferId>,
    {
        self.writes = buffers.into_iter().collect();
        self.rebuild();
    }

    pub fn add_read(&mut self, buffer: BufferId) {
        self.reads.push(buffer);
        self.rebuild();
    }

    pub fn add_write(&mut self, buffer: BufferId) {
        self.writes.push(buffer);
        self.rebuild();
    }

    /// Read-only buffers, sorted.
    pub fn read_buffers(&self) -> &[BufferId] {
        &self.reads
    }

    /// Written buffers, sorted.
    pub fn write_buffers(&self) -> &[BufferId] {
        &self.writes
    }

    #[inline]
    pub fn reads(&self, buffer: BufferId) -> bool {
        self.read_mask & buffer.bit() != 0
    }

    #[inline]
    pub fn writes(&self, buffer: BufferId) -> bool {
        self.write_mask & buffer.bit() != 0
    }

    /// Whether the set touches any buffer at all.
    pub fn is_empty(&self) -> bool {
        self.read_mask | self.write_mask == 0
    }

    /// First buffer on which running `self` and `other` concurrently would race:
    /// written by one side and read or written by the other.
    pub fn conflict_with(&self, other: &AccessSet) -> Option<BufferId> {
        let touched_self = self.read_mask | self.write_mask;
        let touched_other = other.read_mask | other.write_mask;
        let clash = (self.write_mask & touched_other) | (other.write_mask & touched_self);
        BufferId::ALL
            .into_iter()
            .find(|buffer| clash & buffer.bit() != 0)
    }

    fn rebuild(&mut self) {
        self.writes.sort_unstable();
        self.writes.dedup();
        self.write_mask = mask_of(&self.writes);

        let write_mask = self.write_mask;
        self.reads.retain(|b| write_mask & b.bit() == 0);
        self.reads.sort_unstable();
        self.reads.dedup();
        self.read_mask = mask_of(&self.reads);
    }
}

fn mask_of(buffers: &[BufferId]) -> u8 {
    buffers.iter().fold(0, |mask, b| mask | b.bit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(reads: &[BufferId], writes: &[BufferId]) -> AccessSet {
        let mut set = AccessSet::new();
        set.set_reads(reads.iter().copied());
        set.set_writes(writes.iter().copied());
        set
    }

    #[test]
    fn written_buffers_drop_out_of_reads() {
        let set = access(
            &[BufferId::Velocity, BufferId::Mass, BufferId::Mass],
            &[BufferId::Velocity],
        );
        assert_eq!(set.read_buffers(), &[BufferId::Mass]);
        assert_eq!(set.write_buffers(), &[BufferId::Velocity]);
        assert!(set.writes(BufferId::Velocity));
        assert!(!set.reads(BufferId::Velocity));
    }

    #[test]
    fn shared_reads_do_not_conflict() {
        let a = access(&[BufferId::Mass], &[BufferId::Force]);
        let b = access(&[BufferId::Mass], &[BufferId::Rotation]);
        assert_eq!(a.conflict_with(&b), None);
    }

    #[test]
    fn write_against_read_or_write_conflicts() {
        let force = access(&[BufferId::Position, BufferId::Mass], &[BufferId::Force]);
        let integrate = access(&[BufferId::Force], &[BufferId::Position, BufferId::Velocity]);
        assert_eq!(force.conflict_with(&integrate), Some(BufferId::Position));
        assert_eq!(integrate.conflict_with(&force), Some(BufferId::Position));

        let writer = access(&[], &[BufferId::Velocity]);
        assert_eq!(writer.conflict_with(&writer.clone()), Some(BufferId::Velocity));
    }
}
