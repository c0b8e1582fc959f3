//! Job descriptors: what a unit of parallel work reads, writes and runs.

mod access;
mod chunk;
mod descriptor;

pub use access::AccessSet;
pub use chunk::{Chunk, ChunkMut};
pub use descriptor::{JobDescriptor, JobShape, Kernel};
