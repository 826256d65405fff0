// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! World-level behaviour: structures, layers, terrain and queries.

use core::f64::consts::FRAC_PI_2;

use approx::assert_relative_eq;
use p3d_core::{
    BoundsFilter, HardConstraint, LayerConfig, LayerId, PartId, PartProperties, PartsFilter, Shape, VisibilityFilter, World,
    WorldConfig,
};
use p3d_geom::{Bounds, CFrame, GlobalCFrame, Position, Vec3};

fn checked_world() -> World {
    World::new(WorldConfig { validate_after_mutation: true, ..WorldConfig::default() })
}

fn cube(world: &mut World, x: f64, y: f64, z: f64) -> PartId {
    world.create_part(
        Shape::cuboid(1.0, 1.0, 1.0),
        GlobalCFrame::from_position(Position::new(x, y, z)),
        PartProperties::default(),
    )
}

#[test]
fn configured_layers_are_created_after_default() {
    let config = WorldConfig {
        layers: vec![LayerConfig { name: "debris".into(), collides_internally: false, collides_with_others: true }],
        ..WorldConfig::default()
    };
    let world = World::new(config);
    assert_eq!(world.layer_count(), 2);
    assert_eq!(world.layer(LayerId(1)).unwrap().name(), "debris");
    assert!(!world.layers_collide(LayerId(1), LayerId(1)));
    assert!(world.layers_collide(LayerId(0), LayerId(1)));
}

#[test]
fn unknown_layers_never_collide() {
    let mut w = checked_world();
    assert!(!w.layers_collide(LayerId(5), LayerId::DEFAULT));
    assert!(!w.layers_collide(LayerId::DEFAULT, LayerId(5)));
    let before = w.layer_matrix().clone();
    w.set_layers_collide(LayerId(5), LayerId::DEFAULT, true);
    assert_eq!(w.layer_matrix(), &before);
    assert!(w.layers_collide(LayerId::DEFAULT, LayerId::DEFAULT));
}

#[test]
fn rejected_attach_keeps_part_free() {
    let mut w = checked_world();
    let a = cube(&mut w, 0.0, 0.0, 0.0);
    let b = cube(&mut w, 1.0, 0.0, 0.0);
    let c = cube(&mut w, 2.0, 0.0, 0.0);
    w.add_part(a);
    assert!(w.attach_part_with_constraint(a, b, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY));
    assert!(!w.attach_part(c, b, CFrame::IDENTITY));
    assert_eq!(w.part(c).unwrap().parent(), None);
    assert!(w.add_terrain_part(c));
    w.validate().unwrap();
}

#[test]
fn constrained_structure_moves_as_one() {
    let mut w = checked_world();
    let base = cube(&mut w, 0.0, 0.0, 0.0);
    let arm = cube(&mut w, 0.0, 0.0, 0.0);
    let weld = cube(&mut w, 0.0, 0.0, 0.0);
    w.add_part(base);
    let motor = HardConstraint::ConstantSpeedMotor { speed: 1.0, current_angle: 0.0 };
    assert!(w.attach_part_with_constraint(
        base,
        arm,
        motor,
        CFrame::from_translation(Vec3::new(0.0, 0.0, 1.0)),
        CFrame::from_translation(Vec3::new(2.0, 0.0, 0.0)),
    ));
    assert!(w.attach_part(arm, weld, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0))));
    assert_eq!(w.physicals().len(), 1);
    assert_eq!(w.iter_parts(PartsFilter::Free).count(), 3);

    // arm main part sits at attach_on_parent ∘ attach_on_child⁻¹.
    let arm_pos = w.part(arm).unwrap().position();
    assert_relative_eq!(arm_pos.x(), -2.0, epsilon = 1e-12);
    assert_relative_eq!(arm_pos.z(), 1.0, epsilon = 1e-12);

    w.set_part_cframe(base, GlobalCFrame::from_position(Position::new(10.0, 0.0, 0.0)));
    let weld_pos = w.part(weld).unwrap().position();
    assert_relative_eq!(weld_pos.x(), 9.0, epsilon = 1e-12);

    w.advance_hard_constraints(FRAC_PI_2);
    let arm_pos = w.part(arm).unwrap().position();
    // Rotating the motor a quarter turn swings the arm offset from -X to -Y.
    assert_relative_eq!(arm_pos.x(), 10.0, epsilon = 1e-9);
    assert_relative_eq!(arm_pos.y(), -2.0, epsilon = 1e-9);
    w.validate().unwrap();
}

#[test]
fn terrain_is_static_and_optimisable() {
    let mut w = checked_world();
    for i in 0..40 {
        let t = cube(&mut w, f64::from(i % 8) * 1.5, 0.0, f64::from(i / 8) * 1.5);
        assert!(w.add_terrain_part(t));
    }
    let probe = cube(&mut w, 3.0, 0.5, 3.0);
    w.add_part(probe);
    let mut before = 0;
    w.for_each_colliding_pair(|_, _| before += 1);
    w.optimize_terrain();
    let mut after = 0;
    w.for_each_colliding_pair(|_, _| after += 1);
    assert_eq!(before, after);
    assert!(before > 0);
    assert_eq!(w.iter_parts(PartsFilter::Terrain).count(), 40);
    w.validate().unwrap();
}

#[test]
fn terrain_parts_cannot_join_structures() {
    let mut w = checked_world();
    let t = cube(&mut w, 0.0, 0.0, 0.0);
    let p = cube(&mut w, 0.0, 0.0, 0.0);
    w.add_terrain_part(t);
    w.add_part(p);
    assert!(!w.attach_part(p, t, CFrame::IDENTITY));
    assert!(!w.add_part(t));
    assert!(w.remove_part(t));
    assert!(!w.part(t).unwrap().is_terrain());
    w.validate().unwrap();
}

#[test]
fn spatial_filters_select_parts() {
    let mut w = checked_world();
    let near = cube(&mut w, 0.0, 0.0, -5.0);
    let far = cube(&mut w, 0.0, 0.0, -500.0);
    let behind = cube(&mut w, 0.0, 0.0, 5.0);
    for p in [near, far, behind] {
        w.add_part(p);
    }
    let view =
        VisibilityFilter::for_window(Position::ORIGIN, Vec3::new(0.0, 0.0, -1.0), Vec3::UNIT_Y, FRAC_PI_2, 1.0, 100.0);
    let mut seen = Vec::new();
    w.for_each_part_filtered(&view, |id, _| seen.push(id));
    assert_eq!(seen, vec![near]);

    let region = BoundsFilter::new(Bounds::new(Position::new(-1.0, -1.0, 4.0), Position::new(1.0, 1.0, 6.0)));
    let mut seen = Vec::new();
    w.for_each_part_filtered(&region, |id, _| seen.push(id));
    assert_eq!(seen, vec![behind]);
}

#[test]
fn point_queries_drop_parts_straddling_the_frustum() {
    let mut w = checked_world();
    let inside = cube(&mut w, 0.0, 0.0, -5.0);
    let straddling = cube(&mut w, 5.3, 0.0, -5.0);
    w.add_part(inside);
    w.add_part(straddling);
    let view =
        VisibilityFilter::for_window(Position::ORIGIN, Vec3::new(0.0, 0.0, -1.0), Vec3::UNIT_Y, FRAC_PI_2, 1.0, 100.0);
    let mut touched = Vec::new();
    w.for_each_part_filtered(&view, |id, _| touched.push(id));
    touched.sort_unstable();
    let mut both = vec![inside, straddling];
    both.sort_unstable();
    assert_eq!(touched, both);

    let mut centred = Vec::new();
    w.for_each_part_centered_in(&view, |id, _| centred.push(id));
    assert_eq!(centred, vec![inside]);
}

#[test]
fn mass_properties_follow_attachment() {
    let mut w = checked_world();
    let a = cube(&mut w, 0.0, 0.0, 0.0);
    let b = cube(&mut w, 0.0, 0.0, 0.0);
    w.add_part(a);
    w.attach_part(a, b, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0)));
    let root = w.part(a).unwrap().parent().unwrap();
    let total = *w.physical(root).unwrap().motorized().unwrap().total_mass_properties();
    assert_relative_eq!(total.mass, 2.0, epsilon = 1e-12);
    assert_relative_eq!(total.center_of_mass.x(), 0.5, epsilon = 1e-12);
}
