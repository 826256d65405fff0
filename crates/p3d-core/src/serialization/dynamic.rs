// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Discriminant-tagged encoding for closed families of concrete types.
//!
//! Each family lists its decoders explicitly; a stream naming a discriminant
//! that is not in the table fails with
//! [`SerializationError::UnknownDiscriminant`].

use std::sync::Arc;

use p3d_geom::Vec3;

use super::codec::{capped, Reader, Writer};
use super::SerializationError;
use crate::constraint::{Constraint, HardConstraint};
use crate::force::ExternalForce;
use crate::shape::{PolyhedronShape, ShapeClass};

/// Decoder for one concrete type of a family.
pub type DecodeFn<T> = fn(&mut Reader<'_>) -> Result<T, SerializationError>;

/// A family of concrete types written as `u32 discriminant, payload`.
pub trait DynamicCodec: Sized + 'static {
    /// Family name used in errors.
    const CATEGORY: &'static str;
    /// `(discriminant, decoder)` for every concrete type.
    const DECODERS: &'static [(u32, DecodeFn<Self>)];

    /// Discriminant of `self`'s concrete type; `None` for members that are
    /// predefined on both ends and never written.
    fn discriminant(&self) -> Option<u32>;

    /// Writes the type-specific payload (no discriminant).
    fn encode_payload(&self, writer: &mut Writer<'_>) -> Result<(), SerializationError>;
}

/// Writes the discriminant, then the payload.
pub fn write_dynamic<T: DynamicCodec>(writer: &mut Writer<'_>, value: &T) -> Result<(), SerializationError> {
    let discriminant = value.discriminant().ok_or(SerializationError::Predefined { category: T::CATEGORY })?;
    writer.write_u32_le(discriminant)?;
    value.encode_payload(writer)
}

/// Reads a discriminant and dispatches to its decoder.
pub fn read_dynamic<T: DynamicCodec>(reader: &mut Reader<'_>) -> Result<T, SerializationError> {
    let discriminant = reader.read_u32_le()?;
    let (_, decode) = T::DECODERS
        .iter()
        .find(|(d, _)| *d == discriminant)
        .ok_or(SerializationError::UnknownDiscriminant { category: T::CATEGORY, discriminant })?;
    decode(reader)
}

// ---- shape classes ----------------------------------------------------

fn decode_polyhedron(r: &mut Reader<'_>) -> Result<ShapeClass, SerializationError> {
    let vertex_count = r.read_len()?;
    let triangle_count = r.read_len()?;
    let mut vertices = Vec::with_capacity(capped(vertex_count));
    for _ in 0..vertex_count {
        let v = [r.read_f32_le()?, r.read_f32_le()?, r.read_f32_le()?];
        if v.iter().any(|c| !c.is_finite()) {
            return Err(SerializationError::InvalidValue("non-finite polyhedron vertex"));
        }
        vertices.push(v);
    }
    let mut triangles = Vec::with_capacity(capped(triangle_count));
    for _ in 0..triangle_count {
        triangles.push([r.read_u32_le()?, r.read_u32_le()?, r.read_u32_le()?]);
    }
    let shape = PolyhedronShape::new(vertices, triangles)
        .map_err(|_| SerializationError::InvalidValue("malformed polyhedron"))?;
    Ok(ShapeClass::Polyhedron(Arc::new(shape)))
}

impl DynamicCodec for ShapeClass {
    const CATEGORY: &'static str = "shape class";
    const DECODERS: &'static [(u32, DecodeFn<Self>)] = &[(0, decode_polyhedron)];

    /// Builtin classes are predefined in every session and never reach the
    /// registry.
    fn discriminant(&self) -> Option<u32> {
        match self {
            Self::Polyhedron(_) => Some(0),
            Self::Box | Self::Sphere | Self::Cylinder => None,
        }
    }

    fn encode_payload(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        let Self::Polyhedron(poly) = self else {
            return Err(SerializationError::InvalidValue("builtin shape classes are predefined"));
        };
        w.write_len(poly.vertices().len())?;
        w.write_len(poly.triangles().len())?;
        for v in poly.vertices() {
            for &c in v {
                w.write_f32_le(c)?;
            }
        }
        for t in poly.triangles() {
            for &i in t {
                w.write_u32_le(i)?;
            }
        }
        Ok(())
    }
}

// ---- hard constraints -------------------------------------------------

fn read_sinusoid(r: &mut Reader<'_>) -> Result<[f64; 4], SerializationError> {
    let values = [r.read_f64_le()?, r.read_f64_le()?, r.read_f64_le()?, r.read_f64_le()?];
    if values.iter().any(|v| !v.is_finite()) {
        return Err(SerializationError::InvalidValue("non-finite constraint parameter"));
    }
    Ok(values)
}

fn decode_fixed(_: &mut Reader<'_>) -> Result<HardConstraint, SerializationError> {
    Ok(HardConstraint::Fixed)
}

fn decode_constant_speed_motor(r: &mut Reader<'_>) -> Result<HardConstraint, SerializationError> {
    let speed = r.read_f64_le()?;
    let current_angle = r.read_f64_le()?;
    if !speed.is_finite() || !current_angle.is_finite() {
        return Err(SerializationError::InvalidValue("non-finite constraint parameter"));
    }
    Ok(HardConstraint::ConstantSpeedMotor { speed, current_angle })
}

fn decode_sinusoidal_piston(r: &mut Reader<'_>) -> Result<HardConstraint, SerializationError> {
    let [min_value, max_value, period, current_step_in_period] = read_sinusoid(r)?;
    Ok(HardConstraint::SinusoidalPiston { min_value, max_value, period, current_step_in_period })
}

fn decode_sinusoidal_motor(r: &mut Reader<'_>) -> Result<HardConstraint, SerializationError> {
    let [min_value, max_value, period, current_step_in_period] = read_sinusoid(r)?;
    Ok(HardConstraint::SinusoidalMotor { min_value, max_value, period, current_step_in_period })
}

impl DynamicCodec for HardConstraint {
    const CATEGORY: &'static str = "hard constraint";
    const DECODERS: &'static [(u32, DecodeFn<Self>)] = &[
        (0, decode_fixed),
        (1, decode_constant_speed_motor),
        (2, decode_sinusoidal_piston),
        (3, decode_sinusoidal_motor),
    ];

    fn discriminant(&self) -> Option<u32> {
        Some(match self {
            Self::Fixed => 0,
            Self::ConstantSpeedMotor { .. } => 1,
            Self::SinusoidalPiston { .. } => 2,
            Self::SinusoidalMotor { .. } => 3,
        })
    }

    fn encode_payload(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        match *self {
            Self::Fixed => Ok(()),
            Self::ConstantSpeedMotor { speed, current_angle } => {
                w.write_f64_le(speed)?;
                w.write_f64_le(current_angle)
            }
            Self::SinusoidalPiston { min_value, max_value, period, current_step_in_period }
            | Self::SinusoidalMotor { min_value, max_value, period, current_step_in_period } => {
                for v in [min_value, max_value, period, current_step_in_period] {
                    w.write_f64_le(v)?;
                }
                Ok(())
            }
        }
    }
}

// ---- soft constraints -------------------------------------------------

fn decode_ball(r: &mut Reader<'_>) -> Result<Constraint, SerializationError> {
    Ok(Constraint::Ball { attach_a: r.read()?, attach_b: r.read()? })
}

fn decode_hinge(r: &mut Reader<'_>) -> Result<Constraint, SerializationError> {
    Ok(Constraint::Hinge { attach_a: r.read()?, axis_a: r.read()?, attach_b: r.read()?, axis_b: r.read()? })
}

fn decode_bar(r: &mut Reader<'_>) -> Result<Constraint, SerializationError> {
    let attach_a: Vec3 = r.read()?;
    let attach_b: Vec3 = r.read()?;
    let length = r.read_f64_le()?;
    if !length.is_finite() || length < 0.0 {
        return Err(SerializationError::InvalidValue("bar length must be finite and non-negative"));
    }
    Ok(Constraint::Bar { attach_a, attach_b, length })
}

impl DynamicCodec for Constraint {
    const CATEGORY: &'static str = "constraint";
    const DECODERS: &'static [(u32, DecodeFn<Self>)] = &[(0, decode_ball), (1, decode_hinge), (2, decode_bar)];

    fn discriminant(&self) -> Option<u32> {
        Some(match self {
            Self::Ball { .. } => 0,
            Self::Hinge { .. } => 1,
            Self::Bar { .. } => 2,
        })
    }

    fn encode_payload(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        match self {
            Self::Ball { attach_a, attach_b } => {
                w.write(attach_a)?;
                w.write(attach_b)
            }
            Self::Hinge { attach_a, axis_a, attach_b, axis_b } => {
                w.write(attach_a)?;
                w.write(axis_a)?;
                w.write(attach_b)?;
                w.write(axis_b)
            }
            Self::Bar { attach_a, attach_b, length } => {
                w.write(attach_a)?;
                w.write(attach_b)?;
                w.write_f64_le(*length)
            }
        }
    }
}

// ---- external forces --------------------------------------------------

fn decode_directional_gravity(r: &mut Reader<'_>) -> Result<ExternalForce, SerializationError> {
    Ok(ExternalForce::DirectionalGravity { gravity: r.read()? })
}

impl DynamicCodec for ExternalForce {
    const CATEGORY: &'static str = "external force";
    const DECODERS: &'static [(u32, DecodeFn<Self>)] = &[(0, decode_directional_gravity)];

    fn discriminant(&self) -> Option<u32> {
        match self {
            Self::DirectionalGravity { .. } => Some(0),
        }
    }

    fn encode_payload(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        match self {
            Self::DirectionalGravity { gravity } => w.write(gravity),
        }
    }
}
