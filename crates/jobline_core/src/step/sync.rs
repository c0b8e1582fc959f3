use glam::{Quat, Vec3};

/// Settled state of one tick, handed to the presentation side.
///
/// Index `i` in both slices is entity `i` in the store; the receiver maps
/// indices to its own presentation objects.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub tick: u64,
    pub positions: &'a [Vec3],
    pub rotations: &'a [Quat],
}

impl FrameView<'_> {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

/// Receives the final positions and rotations after each tick.
pub trait RenderSync {
    fn sync(&mut self, frame: &FrameView<'_>);
}

impl<F> RenderSync for F
where
    F: FnMut(&FrameView<'_>),
{
    fn sync(&mut self, frame: &FrameView<'_>) {
        self(frame)
    }
}
