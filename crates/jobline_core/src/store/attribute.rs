use super::buffers::{Column, SharedBuffers};
use glam::{Quat, Vec3};
use std::fmt;

/// Identifies one attribute buffer of an [`EntityStateStore`](super::EntityStateStore).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BufferId {
    Position,
    Velocity,
    Mass,
    Force,
    Rotation,
}

impl BufferId {
    pub const ALL: [BufferId; 5] = [
        BufferId::Position,
        BufferId::Velocity,
        BufferId::Mass,
        BufferId::Force,
        BufferId::Rotation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            BufferId::Position => "position",
            BufferId::Velocity => "velocity",
            BufferId::Mass => "mass",
            BufferId::Force => "force",
            BufferId::Rotation => "rotation",
        }
    }

    #[inline]
    pub(crate) fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed marker for one attribute buffer.
///
/// Jobs name buffers through these markers (`chunk.read::<Mass>()`) so the
/// element type is checked at compile time while access is still validated
/// against the descriptor's declared [`BufferId`] set at run time.
pub trait Attribute: Send + Sync + 'static {
    type Value: Copy + Send + Sync + 'static;
    const BUFFER: BufferId;

    #[doc(hidden)]
    fn column(buffers: &SharedBuffers) -> &Column<Self::Value>;
}

macro_rules! define_attribute {
    ($(#[$meta:meta])* $name:ident, $value:ty, $field:ident) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug)]
        pub struct $name;

        impl Attribute for $name {
            type Value = $value;
            const BUFFER: BufferId = BufferId::$name;

            #[inline]
            fn column(buffers: &SharedBuffers) -> &Column<$value> {
                &buffers.$field
            }
        }
    };
}

define_attribute!(
    /// World-space position.
    Position, Vec3, position
);
define_attribute!(
    /// Linear velocity in units per second.
    Velocity, Vec3, velocity
);
define_attribute!(
    /// Scalar mass. Zero marks an immovable entity.
    Mass, f32, mass
);
define_attribute!(
    /// Force accumulated for the current tick.
    Force, Vec3, force
);
define_attribute!(
    /// Orientation read by render sync.
    Rotation, Quat, rotation
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_bits_are_distinct() {
        let mut seen = 0u8;
        for id in BufferId::ALL {
            assert_eq!(seen & id.bit(), 0, "{id} shares a bit");
            seen |= id.bit();
        }
        assert_eq!(seen.count_ones() as usize, BufferId::ALL.len());
    }

    #[test]
    fn markers_name_their_buffer() {
        assert_eq!(Position::BUFFER, BufferId::Position);
        assert_eq!(Rotation::BUFFER.to_string(), "rotation");
    }
}
