use super::{AccessSet, Chunk};
use crate::error::KernelError;
use crate::store::BufferId;
use std::fmt;
use std::ops::Range;
use std::sync::Arc;

/// Transform run once per chunk. It iterates `chunk.range()` and computes the
/// write-declared buffers from the read-declared ones.
pub type Kernel = dyn Fn(&mut Chunk<'_>) -> Result<(), KernelError> + Send + Sync;

/// How a job's per-index work relates to the other indices.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum JobShape {
    /// Index `i` only reads index `i` (integration, force fields).
    #[default]
    PerIndex,
    /// Index `i` reads every other index (N-body gravity). Batches narrowly.
    Pairwise,
}

/// One data-parallel unit of work over the index range `[0, len)`.
#[derive(Clone)]
pub struct JobDescriptor {
    name: String,
    len: usize,
    batch_hint: Option<usize>,
    shape: JobShape,
    access: AccessSet,
    kernel: Arc<Kernel>,
}

impl JobDescriptor {
    /// Create a per-index job over `len` entities.
    pub fn new<F>(name: impl Into<String>, len: usize, kernel: F) -> Self
    where
        F: Fn(&mut Chunk<'_>) -> Result<(), KernelError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            len,
            batch_hint: None,
            shape: JobShape::PerIndex,
            access: AccessSet::new(),
            kernel: Arc::new(kernel),
        }
    }

    /// Replace the read-only buffer set for this job.
    pub fn reads<I>(mut self, buffers: I) -> Self
    where
        I: IntoIterator<Item = BufferId>,
    {
        self.access.set_reads(buffers);
        self
    }

    /// Replace the write buffer set for this job.
    pub fn writes<I>(mut self, buffers: I) -> Self
    where
        I: IntoIterator<Item = BufferId>,
    {
        self.access.set_writes(buffers);
        self
    }

    /// Append a single read buffer.
    pub fn add_read(&mut self, buffer: BufferId) {
        self.access.add_read(buffer);
    }

    /// Append a single write buffer.
    pub fn add_write(&mut self, buffer: BufferId) {
        self.access.add_write(buffer);
    }

    /// Flag the job as reading every index per index.
    pub fn pairwise(mut self) -> Self {
        self.shape = JobShape::Pairwise;
        self
    }

    /// Preferred chunk length, used when the caller does not pass one.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_hint = Some(batch_size);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn range(&self) -> Range<usize> {
        0..self.len
    }

    pub fn shape(&self) -> JobShape {
        self.shape
    }

    pub fn batch_hint(&self) -> Option<usize> {
        self.batch_hint
    }

    pub fn access(&self) -> &AccessSet {
        &self.access
    }

    pub fn read_buffers(&self) -> &[BufferId] {
        self.access.read_buffers()
    }

    pub fn write_buffers(&self) -> &[BufferId] {
        self.access.write_buffers()
    }

    pub(crate) fn into_parts(self) -> (String, AccessSet, Arc<Kernel>) {
        (self.name, self.access, self.kernel)
    }
}

impl fmt::Debug for JobDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDescriptor")
            .field("name", &self.name)
            .field("len", &self.len)
            .field("shape", &self.shape)
            .field("batch_hint", &self.batch_hint)
            .field("reads", &self.access.read_buffers())
            .field("writes", &self.access.write_buffers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_records_shape_and_access() {
        let job = JobDescriptor::new("gravity", 12, |_chunk| Ok(()))
            .reads([BufferId::Position, BufferId::Mass])
            .writes([BufferId::Force])
            .pairwise()
            .batch_size(4);

        assert_eq!(job.name(), "gravity");
        assert_eq!(job.range(), 0..12);
        assert_eq!(job.shape(), JobShape::Pairwise);
        assert_eq!(job.batch_hint(), Some(4));
        assert_eq!(job.read_buffers(), &[BufferId::Position, BufferId::Mass]);
        assert_eq!(job.write_buffers(), &[BufferId::Force]);
        assert!(format!("{job:?}").contains("Pairwise"));
    }
}
