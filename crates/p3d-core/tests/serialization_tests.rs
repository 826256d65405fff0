// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Whole-world round trips and malformed-stream handling.

use std::sync::Arc;

use approx::assert_relative_eq;
use p3d_core::serialization::{from_bytes, to_bytes, CURRENT_VERSION};
use p3d_core::{
    Constraint, DeserializationSession, ExternalForce, HardConstraint, LayerId, Motion, PartProperties, PartsFilter,
    PhysicalConstraint, PolyhedronShape, SerializationError, SerializationSession, Shape, ShapeClass, World,
};
use p3d_geom::{CFrame, GlobalCFrame, Position, Rotation, Vec3};
use proptest::prelude::*;

fn sample_world() -> World {
    let mut w = World::default();
    let ghosts = w.create_layer(false, true);
    w.set_layers_collide(ghosts, LayerId::DEFAULT, false);

    let wedge = ShapeClass::Polyhedron(Arc::new(PolyhedronShape::wedge()));
    for i in 0..3 {
        let t = w.create_part(
            Shape::new(wedge.clone(), 4.0, 1.0, 4.0),
            GlobalCFrame::from_position(Position::new(f64::from(i) * 4.0, -1.0, 0.0)),
            PartProperties { friction: 0.9, ..PartProperties::default() },
        );
        w.add_terrain_part(t);
    }

    let frame = GlobalCFrame::new(Position::new(0.0, 3.0, 0.0), Rotation::rot_y(0.4));
    let base = w.create_part(Shape::cuboid(2.0, 1.0, 2.0), frame, PartProperties::with_density(3.0));
    let lid = w.create_part(Shape::cuboid(2.0, 0.2, 2.0), frame, PartProperties::default());
    let wheel = w.create_part(Shape::cylinder(0.5, 0.3), frame, PartProperties::default());
    let ball = w.create_part(Shape::sphere(0.4), frame, PartProperties::default());
    w.add_part(base);
    w.attach_part(base, lid, CFrame::from_translation(Vec3::new(0.0, 0.6, 0.0)));
    w.attach_part_with_constraint(
        base,
        wheel,
        HardConstraint::ConstantSpeedMotor { speed: 3.0, current_angle: 0.25 },
        CFrame::from_translation(Vec3::new(1.2, 0.0, 0.0)),
        CFrame::IDENTITY,
    );
    w.attach_part_with_constraint(
        wheel,
        ball,
        HardConstraint::SinusoidalPiston { min_value: 0.1, max_value: 0.5, period: 2.0, current_step_in_period: 0.5 },
        CFrame::IDENTITY,
        CFrame::from_translation(Vec3::new(0.0, 0.0, -0.2)),
    );
    let root = w.part(base).and_then(|p| p.parent()).unwrap();
    w.set_motion(root, Motion::with_velocity(Vec3::new(1.0, 0.0, 0.5)));

    let ghost_frame = GlobalCFrame::from_position(Position::new(8.0, 3.0, 0.0));
    let ghost = w.create_part(Shape::sphere(1.0), ghost_frame, PartProperties::default());
    w.add_part_to_layer(ghost, ghosts);
    let ghost_phys = w.part(ghost).and_then(|p| p.parent()).unwrap();
    let wheel_phys = w.part(wheel).and_then(|p| p.parent()).unwrap();
    w.add_constraint_group(vec![PhysicalConstraint {
        phys_a: wheel_phys,
        phys_b: ghost_phys,
        constraint: Constraint::Bar { attach_a: Vec3::ZERO, attach_b: Vec3::UNIT_X, length: 2.5 },
    }]);
    w.add_external_force(ExternalForce::earth_gravity());
    w.advance_age(17);
    w
}

fn sorted_positions(world: &World, filter: PartsFilter) -> Vec<[f64; 3]> {
    let mut out: Vec<[f64; 3]> =
        world.iter_parts(filter).map(|id| world.part(id).unwrap().position().to_array()).collect();
    out.sort_by(|a, b| a.partial_cmp(b).unwrap());
    out
}

#[test]
fn world_round_trip_preserves_structure() {
    let original = sample_world();
    let bytes = to_bytes(&original).unwrap();
    let copy = from_bytes(&bytes).unwrap();
    copy.validate().unwrap();

    assert_eq!(copy.age(), 17);
    assert_eq!(copy.layer_count(), 2);
    assert_eq!(copy.layer_matrix(), original.layer_matrix());
    assert_eq!(copy.physicals().len(), original.physicals().len());
    assert_eq!(copy.iter_parts(PartsFilter::All).count(), original.iter_parts(PartsFilter::All).count());
    assert_eq!(copy.external_forces().count(), 1);

    let before = sorted_positions(&original, PartsFilter::All);
    let after = sorted_positions(&copy, PartsFilter::All);
    for (a, b) in before.iter().zip(&after) {
        for k in 0..3 {
            assert_relative_eq!(a[k], b[k], epsilon = 1e-9);
        }
    }

    // Polyhedral terrain shares one class instance after decoding too.
    let classes: Vec<ShapeClass> =
        copy.iter_parts(PartsFilter::Terrain).map(|id| copy.part(id).unwrap().shape.class.clone()).collect();
    assert_eq!(classes.len(), 3);
    let ShapeClass::Polyhedron(first) = &classes[0] else { panic!("terrain lost its polyhedron") };
    assert!(classes.iter().all(|c| matches!(c, ShapeClass::Polyhedron(p) if Arc::ptr_eq(p, first))));

    // Constraint topology: the bar still joins the wheel's physical to the
    // ghost sphere's.
    let group = &copy.constraint_groups()[0];
    let c = group.constraints[0];
    assert!(matches!(c.constraint, Constraint::Bar { length, .. } if (length - 2.5).abs() < 1e-12));
    let shape_of = |phys| {
        let main = copy.physical(phys).unwrap().rigid_body().main_part();
        copy.part(main).unwrap().shape.class.name()
    };
    assert_eq!(shape_of(c.phys_a), "cylinder");
    assert_eq!(shape_of(c.phys_b), "sphere");

    // Tree iteration order may differ, the encoded size may not.
    assert_eq!(to_bytes(&copy).unwrap().len(), bytes.len());
}

#[test]
fn round_trip_keeps_motion_and_mass() {
    let original = sample_world();
    let copy = from_bytes(&to_bytes(&original).unwrap()).unwrap();
    let heaviest = |w: &World| {
        w.physicals()
            .iter()
            .map(|&r| w.physical(r).unwrap().motorized().unwrap().clone())
            .max_by(|a, b| a.total_mass_properties().mass.partial_cmp(&b.total_mass_properties().mass).unwrap())
            .unwrap()
    };
    let (a, b) = (heaviest(&original), heaviest(&copy));
    assert_eq!(a.motion, b.motion);
    assert_relative_eq!(a.total_mass_properties().mass, b.total_mass_properties().mass, epsilon = 1e-9);
}

#[test]
fn incremented_version_is_a_format_error() {
    let mut bytes = to_bytes(&sample_world()).unwrap();
    bytes[..4].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
    match from_bytes(&bytes) {
        Err(SerializationError::VersionMismatch { expected, found }) => {
            assert_eq!(expected, CURRENT_VERSION);
            assert_eq!(found, CURRENT_VERSION + 1);
        }
        other => panic!("expected version mismatch, got {other:?}"),
    }
}

#[test]
fn every_truncation_fails_cleanly() {
    let bytes = to_bytes(&sample_world()).unwrap();
    for len in (0..bytes.len()).step_by(7) {
        assert!(from_bytes(&bytes[..len]).is_err(), "prefix of {len} bytes decoded");
    }
}

#[test]
fn known_classes_shrink_the_registry() {
    let wedge = ShapeClass::Polyhedron(Arc::new(PolyhedronShape::wedge()));
    let mut w = World::default();
    let t = w.create_part(Shape::new(wedge.clone(), 1.0, 1.0, 1.0), GlobalCFrame::default(), PartProperties::default());
    w.add_terrain_part(t);

    let plain = to_bytes(&w).unwrap();
    let mut lean = Vec::new();
    SerializationSession::with_known_classes(vec![wedge.clone()]).serialize_world(&w, &mut lean).unwrap();
    assert!(lean.len() < plain.len());

    let mut input = lean.as_slice();
    let copy = DeserializationSession::new().with_known_classes(vec![wedge.clone()]).deserialize_world(&mut input).unwrap();
    let id = copy.iter_parts(PartsFilter::Terrain).next().unwrap();
    let ShapeClass::Polyhedron(p) = &copy.part(id).unwrap().shape.class else { panic!("not a polyhedron") };
    let ShapeClass::Polyhedron(q) = &wedge else { unreachable!() };
    assert!(Arc::ptr_eq(p, q));

    // Without the known class the id is unresolvable.
    let mut input = lean.as_slice();
    let err = DeserializationSession::new().deserialize_world(&mut input).unwrap_err();
    assert!(matches!(err, SerializationError::UnknownSharedObject { id: 3, registered: 3 }));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn garbage_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..256)) {
        let _ = from_bytes(&bytes);
    }

    #[test]
    fn garbage_after_a_valid_header_never_panics(tail in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut bytes = CURRENT_VERSION.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&tail);
        let _ = from_bytes(&bytes);
    }
}
