use std::ops::Range;

/// Split `[0, len)` into contiguous chunks of `batch_size`; the last chunk may
/// be shorter. `batch_size` must be non-zero.
pub fn partition(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    debug_assert!(batch_size > 0);
    (0..len)
        .step_by(batch_size.max(1))
        .map(|start| start..(start + batch_size).min(len))
        .collect()
}
