// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Handles into the world's arenas.
//!
//! Part, physical and force handles are generational `slotmap` keys: a
//! handle that outlives its object fails lookup instead of aliasing a
//! reused slot.

use slotmap::new_key_type;

new_key_type! {
    /// Handle of a [`crate::part::Part`] in a [`crate::physical::PhysicalGraph`].
    pub struct PartId;
    /// Handle of a [`crate::physical::Physical`] in a [`crate::physical::PhysicalGraph`].
    pub struct PhysicalId;
    /// Handle of an [`crate::force::ExternalForce`] registered with a world.
    pub struct ForceId;
}

/// Index of a collision layer.
///
/// Layer 0 always exists and collides with itself.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct LayerId(pub u32);

impl LayerId {
    /// The layer every world starts with.
    pub const DEFAULT: Self = Self(0);

    /// Position of the layer in the world's layer list.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
