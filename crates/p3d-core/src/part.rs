// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Parts: the atomic solid objects of a world.

use p3d_geom::{Bounds, GlobalCFrame, Mat3, Position, Vec3};

use crate::ident::{LayerId, PhysicalId};
use crate::inertia::MassProperties;
use crate::shape::Shape;

/// Surface and material properties of a part.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartProperties {
    /// Mass per unit volume.
    pub density: f64,
    /// Friction coefficient.
    pub friction: f64,
    /// Restitution coefficient.
    pub bouncyness: f64,
    /// Velocity a perfectly gripping object resting on this part would have
    /// (a conveyor belt surface).
    pub conveyor_effect: Vec3,
}

impl Default for PartProperties {
    fn default() -> Self {
        Self { density: 1.0, friction: 0.5, bouncyness: 0.3, conveyor_effect: Vec3::ZERO }
    }
}

impl PartProperties {
    /// Default surface with the given density.
    pub fn with_density(density: f64) -> Self {
        Self { density, ..Self::default() }
    }
}

/// A solid with a shape, a placement and material properties.
///
/// `parent` is a non-owning back-reference to the physical whose rigid body
/// lists this part; `None` for free parts and terrain.
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    /// Geometry.
    pub shape: Shape,
    /// Material.
    pub properties: PartProperties,
    pub(crate) cframe: GlobalCFrame,
    pub(crate) parent: Option<PhysicalId>,
    pub(crate) layer: LayerId,
    pub(crate) is_terrain: bool,
}

impl Part {
    /// Free part in the default layer.
    pub fn new(shape: Shape, cframe: GlobalCFrame, properties: PartProperties) -> Self {
        Self { shape, properties, cframe, parent: None, layer: LayerId::DEFAULT, is_terrain: false }
    }

    /// Placement in world space.
    pub fn cframe(&self) -> &GlobalCFrame {
        &self.cframe
    }

    /// World-space origin of the part.
    pub fn position(&self) -> Position {
        self.cframe.position
    }

    /// Owning physical, if attached to one.
    pub fn parent(&self) -> Option<PhysicalId> {
        self.parent
    }

    /// Collision layer.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Whether the part is static terrain.
    pub fn is_terrain(&self) -> bool {
        self.is_terrain
    }

    /// `volume × density`.
    pub fn mass(&self) -> f64 {
        self.shape.volume() * self.properties.density
    }

    /// Centre of mass in world space.
    pub fn center_of_mass(&self) -> Position {
        self.cframe.local_to_global(&self.shape.center_of_mass())
    }

    /// Inertia around the centre of mass, local axes.
    pub fn inertia(&self) -> Mat3 {
        self.shape.inertia() * self.properties.density
    }

    /// Mass properties in the part's own frame.
    pub fn mass_properties(&self) -> MassProperties {
        MassProperties { mass: self.mass(), center_of_mass: self.shape.center_of_mass(), inertia: self.inertia() }
    }

    /// World-space axis-aligned bounds.
    pub fn bounds(&self) -> Bounds {
        self.shape.local_bounds().transformed(&self.cframe)
    }
}
