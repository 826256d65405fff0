// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use crate::math::{Position, Rotation, Vec3};

/// Relative coordinate frame: an offset plus an orientation.
///
/// Used for attachments between parts, for hard-constraint attach points, and
/// anywhere a frame is expressed relative to another frame.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct CFrame {
    /// Offset of the frame origin in the parent frame.
    pub position: Vec3,
    /// Orientation of the frame in the parent frame.
    pub rotation: Rotation,
}

impl CFrame {
    /// The identity frame.
    pub const IDENTITY: Self = Self { position: Vec3::ZERO, rotation: Rotation::IDENTITY };

    /// Builds a frame from offset and rotation.
    pub const fn new(position: Vec3, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Pure translation.
    pub const fn from_translation(position: Vec3) -> Self {
        Self { position, rotation: Rotation::IDENTITY }
    }

    /// Pure rotation.
    pub const fn from_rotation(rotation: Rotation) -> Self {
        Self { position: Vec3::ZERO, rotation }
    }

    /// Maps a point expressed in this frame into the parent frame.
    pub fn local_to_global(&self, v: &Vec3) -> Vec3 {
        self.position + self.rotation.local_to_global(v)
    }

    /// Maps a parent-frame point into this frame.
    pub fn global_to_local(&self, v: &Vec3) -> Vec3 {
        self.rotation.global_to_local(&(*v - self.position))
    }

    /// Rotates a local direction into the parent frame (no translation).
    pub fn local_to_relative(&self, v: &Vec3) -> Vec3 {
        self.rotation.local_to_global(v)
    }

    /// Composes `self ∘ local`: `local` is expressed in this frame.
    pub fn local_to_global_cframe(&self, local: &Self) -> Self {
        Self {
            position: self.local_to_global(&local.position),
            rotation: self.rotation.local_to_global_rotation(&local.rotation),
        }
    }

    /// Expresses a parent-frame `global` relative to this frame.
    pub fn global_to_local_cframe(&self, global: &Self) -> Self {
        Self {
            position: self.global_to_local(&global.position),
            rotation: self.rotation.global_to_local_rotation(&global.rotation),
        }
    }

    /// Inverse frame: `self.local_to_global_cframe(&self.inverse()) == IDENTITY`.
    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self { position: -rotation.local_to_global(&self.position), rotation }
    }
}

/// Absolute coordinate frame anchored at a world [`Position`].
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct GlobalCFrame {
    /// World-space origin of the frame.
    pub position: Position,
    /// World-space orientation of the frame.
    pub rotation: Rotation,
}

impl GlobalCFrame {
    /// Builds a frame from position and rotation.
    pub const fn new(position: Position, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    /// Frame at `position` with identity rotation.
    pub const fn from_position(position: Position) -> Self {
        Self { position, rotation: Rotation::IDENTITY }
    }

    /// Maps a local point into world space.
    pub fn local_to_global(&self, v: &Vec3) -> Position {
        self.position + self.rotation.local_to_global(v)
    }

    /// Maps a world point into this frame.
    pub fn global_to_local(&self, p: &Position) -> Vec3 {
        self.rotation.global_to_local(&(*p - self.position))
    }

    /// Rotates a local direction into world orientation.
    pub fn local_to_relative(&self, v: &Vec3) -> Vec3 {
        self.rotation.local_to_global(v)
    }

    /// Rotates a world direction into this frame's orientation.
    pub fn relative_to_local(&self, v: &Vec3) -> Vec3 {
        self.rotation.global_to_local(v)
    }

    /// Places a frame expressed relative to this one in world space.
    pub fn local_to_global_cframe(&self, local: &CFrame) -> Self {
        Self {
            position: self.local_to_global(&local.position),
            rotation: self.rotation.local_to_global_rotation(&local.rotation),
        }
    }

    /// Expresses a world frame relative to this one.
    pub fn global_to_local_cframe(&self, global: &Self) -> CFrame {
        CFrame {
            position: self.global_to_local(&global.position),
            rotation: self.rotation.global_to_local_rotation(&global.rotation),
        }
    }

    /// Translates the frame by `offset`.
    pub fn translated(&self, offset: Vec3) -> Self {
        Self { position: self.position + offset, rotation: self.rotation }
    }
}
