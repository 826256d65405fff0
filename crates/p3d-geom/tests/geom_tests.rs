// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
//! Integration tests for bounds and coordinate frames.

use approx::assert_relative_eq;
use core::f64::consts::FRAC_PI_2;
use p3d_geom::{BoundingBox, Bounds, CFrame, GlobalCFrame, Mat3, Position, Rotation, Vec3};
use proptest::prelude::*;

fn unit_box_at(x: f64) -> Bounds {
    Bounds::new(Position::new(x, 0.0, 0.0), Position::new(x + 1.0, 1.0, 1.0))
}

fn assert_vec_close(a: Vec3, b: Vec3) {
    assert!((a - b).length() < 1e-9, "{a:?} != {b:?}");
}

#[test]
fn cost_is_sum_of_extents() {
    let b = Bounds::new(Position::new(-1.0, 0.0, 2.0), Position::new(1.0, 3.0, 6.0));
    assert_relative_eq!(b.cost(), 2.0 + 3.0 + 4.0);
    assert_relative_eq!(Bounds::from_point(Position::ORIGIN).cost(), 0.0);
}

#[test]
fn union_is_tightest_and_contains_both() {
    let a = unit_box_at(0.0);
    let b = unit_box_at(2.0);
    let u = a.union(&b);
    assert_eq!(u.min(), Position::new(0.0, 0.0, 0.0));
    assert_eq!(u.max(), Position::new(3.0, 1.0, 1.0));
    assert!(u.contains(&a));
    assert!(u.contains(&b));
    assert!(!a.contains(&u));
}

#[test]
fn touching_faces_intersect() {
    let a = unit_box_at(0.0);
    let b = unit_box_at(1.0);
    let c = unit_box_at(1.5);
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
    assert!(b.intersects(&c));
}

#[test]
#[should_panic(expected = "invalid bounds")]
fn inverted_bounds_panic() {
    let _ = Bounds::new(Position::new(1.0, 0.0, 0.0), Position::new(0.0, 1.0, 1.0));
}

#[test]
fn rotated_box_bounds_cover_all_corners() {
    let local = BoundingBox::from_half_extents(Vec3::new(2.0, 0.5, 0.5));
    let frame = GlobalCFrame::new(Position::new(10.0, 0.0, 0.0), Rotation::rot_z(FRAC_PI_2));
    let world = local.transformed(&frame);
    assert_relative_eq!(world.min().x(), 9.5, epsilon = 1e-9);
    assert_relative_eq!(world.max().x(), 10.5, epsilon = 1e-9);
    assert_relative_eq!(world.min().y(), -2.0, epsilon = 1e-9);
    assert_relative_eq!(world.max().y(), 2.0, epsilon = 1e-9);
}

#[test]
fn cframe_inverse_round_trips() {
    let cf = CFrame::new(Vec3::new(1.0, -2.0, 3.0), Rotation::from_axis_angle(Vec3::new(1.0, 1.0, 0.0), 0.7));
    let id = cf.local_to_global_cframe(&cf.inverse());
    assert_vec_close(id.position, Vec3::ZERO);
    assert!(id.rotation.as_mat3().max_abs_diff(&Mat3::IDENTITY) < 1e-12);

    let p = Vec3::new(0.3, 0.2, -5.0);
    assert_vec_close(cf.global_to_local(&cf.local_to_global(&p)), p);
}

#[test]
fn global_cframe_relative_frames_compose() {
    let parent = GlobalCFrame::new(Position::new(5.0, 0.0, 0.0), Rotation::rot_y(0.4));
    let child = CFrame::new(Vec3::new(0.0, 1.0, 0.0), Rotation::rot_x(1.1));
    let placed = parent.local_to_global_cframe(&child);
    let back = parent.global_to_local_cframe(&placed);
    assert_vec_close(back.position, child.position);
    assert!(back.rotation.as_mat3().max_abs_diff(&child.rotation.as_mat3()) < 1e-12);
}

#[test]
fn skew_squared_matches_cross_twice() {
    let v = Vec3::new(1.0, 2.0, 3.0);
    let w = Vec3::new(-0.5, 4.0, 0.25);
    let expected = v.cross(&v.cross(&w));
    assert_vec_close(Mat3::skew_symmetric_squared(&v).mul_vec(&w), expected);
}

proptest! {
    #[test]
    fn axis_angle_rotations_are_orthonormal(
        x in -1.0f64..1.0, y in -1.0f64..1.0, z in -1.0f64..1.0, angle in -6.3f64..6.3
    ) {
        let r = Rotation::from_axis_angle(Vec3::new(x, y, z), angle);
        prop_assert!(r.is_orthonormal(1e-9));
    }

    #[test]
    fn union_contains_both_operands(
        a in prop::array::uniform3(-100.0f64..100.0),
        b in prop::array::uniform3(-100.0f64..100.0),
        ea in prop::array::uniform3(0.0f64..10.0),
        eb in prop::array::uniform3(0.0f64..10.0),
    ) {
        let ba = Bounds::from_center_half_extents(Position::from(a), Vec3::from(ea));
        let bb = Bounds::from_center_half_extents(Position::from(b), Vec3::from(eb));
        let u = ba.union(&bb);
        prop_assert!(u.contains(&ba) && u.contains(&bb));
        prop_assert!(u.cost() >= ba.cost().max(bb.cost()));
    }
}
