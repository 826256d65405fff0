// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Sample world used by `p3d demo`.

use std::sync::Arc;

use p3d_core::{
    Constraint, ExternalForce, HardConstraint, LayerId, Motion, PartProperties, PhysicalConstraint, PolyhedronShape,
    Shape, ShapeClass, World, WorldConfig,
};
use p3d_geom::{CFrame, GlobalCFrame, Position, Rotation, Vec3};
use tracing::debug;

const TILE: f64 = 4.0;

/// Terrain grid of boxes and shared wedges, `towers` articulated structures
/// and one sphere in a ghost layer tied to the first tower by a bar.
pub(crate) fn build_demo_world(config: WorldConfig, terrain: u32, towers: u32) -> World {
    let mut world = World::new(config);
    let ghosts = world.create_layer(false, true);
    world.set_layers_collide(ghosts, LayerId::DEFAULT, false);

    let wedge = ShapeClass::Polyhedron(Arc::new(PolyhedronShape::wedge()));
    let ground = PartProperties { friction: 0.9, ..PartProperties::default() };
    for i in 0..terrain {
        for j in 0..terrain {
            let shape = if (i + j) % 2 == 0 {
                Shape::cuboid(TILE, 1.0, TILE)
            } else {
                Shape::new(wedge.clone(), TILE, 1.0, TILE)
            };
            let at = Position::new(f64::from(i) * TILE, -0.5, f64::from(j) * TILE);
            let tile = world.create_part(shape, GlobalCFrame::from_position(at), ground);
            world.add_terrain_part(tile);
        }
    }

    let mut first_wheel = None;
    for k in 0..towers {
        let frame =
            GlobalCFrame::new(Position::new(f64::from(k) * 6.0, 2.0, 2.0), Rotation::rot_y(0.3 * f64::from(k)));
        let base = world.create_part(Shape::cuboid(2.0, 1.0, 2.0), frame, PartProperties::with_density(2.0));
        let lid = world.create_part(Shape::cuboid(2.0, 0.2, 2.0), frame, PartProperties::default());
        let wheel = world.create_part(Shape::cylinder(0.5, 0.3), frame, PartProperties::default());
        let ball = world.create_part(Shape::sphere(0.4), frame, PartProperties::default());
        world.add_part(base);
        world.attach_part(base, lid, CFrame::from_translation(Vec3::new(0.0, 0.6, 0.0)));
        world.attach_part_with_constraint(
            base,
            wheel,
            HardConstraint::ConstantSpeedMotor { speed: 1.5, current_angle: 0.0 },
            CFrame::from_translation(Vec3::new(1.2, 0.0, 0.0)),
            CFrame::IDENTITY,
        );
        world.attach_part_with_constraint(
            wheel,
            ball,
            HardConstraint::SinusoidalPiston { min_value: 0.1, max_value: 0.6, period: 2.0, current_step_in_period: 0.0 },
            CFrame::IDENTITY,
            CFrame::from_translation(Vec3::new(0.0, 0.0, -0.2)),
        );
        if let Some(root) = world.part(base).and_then(|p| p.parent()) {
            world.set_motion(root, Motion::with_velocity(Vec3::new(0.0, 0.0, 0.5)));
        }
        first_wheel = first_wheel.or_else(|| world.part(wheel).and_then(|p| p.parent()));
    }

    let ghost_frame = GlobalCFrame::from_position(Position::new(0.0, 6.0, 2.0));
    let ghost = world.create_part(Shape::sphere(1.0), ghost_frame, PartProperties::default());
    world.add_part_to_layer(ghost, ghosts);
    let ghost_phys = world.part(ghost).and_then(|p| p.parent());
    if let (Some(phys_a), Some(phys_b)) = (first_wheel, ghost_phys) {
        world.add_constraint_group(vec![PhysicalConstraint {
            phys_a,
            phys_b,
            constraint: Constraint::Bar { attach_a: Vec3::ZERO, attach_b: Vec3::ZERO, length: 4.0 },
        }]);
    }

    world.add_external_force(ExternalForce::earth_gravity());
    world.optimize_terrain();
    world.advance_age(1);
    debug!(physicals = world.physicals().len(), "built demo world");
    world
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use p3d_core::PartsFilter;

    use super::*;

    #[test]
    fn demo_world_is_valid() {
        let world = build_demo_world(WorldConfig::default(), 3, 2);
        world.validate().unwrap();
        assert_eq!(world.iter_parts(PartsFilter::Terrain).count(), 9);
        // Two towers plus the ghost sphere.
        assert_eq!(world.physicals().len(), 3);
        assert_eq!(world.constraint_groups().len(), 1);
    }

    #[test]
    fn empty_demo_has_only_the_ghost() {
        let world = build_demo_world(WorldConfig::default(), 0, 0);
        assert_eq!(world.physicals().len(), 1);
        assert!(world.constraint_groups().is_empty());
    }
}
