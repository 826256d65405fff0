// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Little-endian scalar codec over byte streams.

use std::io::{self, Read, Write};

use p3d_geom::{CFrame, GlobalCFrame, Mat3, Position, Rotation, Vec3};

use super::SerializationError;
use crate::motion::Motion;
use crate::part::PartProperties;

/// Types with a fixed binary layout.
pub trait Encode {
    /// Append `self` to the stream.
    fn encode(&self, writer: &mut Writer<'_>) -> Result<(), SerializationError>;
}

/// Mirror of [`Encode`].
pub trait Decode: Sized {
    /// Read one value from the stream.
    fn decode(reader: &mut Reader<'_>) -> Result<Self, SerializationError>;
}

/// Writer for little-endian scalars.
pub struct Writer<'a> {
    out: &'a mut dyn Write,
}

impl<'a> Writer<'a> {
    /// Writer appending to `out`.
    pub fn new(out: &'a mut dyn Write) -> Self {
        Self { out }
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), SerializationError> {
        self.out.write_all(bytes).map_err(SerializationError::Io)
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), SerializationError> {
        self.put(&[value])
    }

    /// Write a little-endian u32.
    pub fn write_u32_le(&mut self, value: u32) -> Result<(), SerializationError> {
        self.put(&value.to_le_bytes())
    }

    /// Write a little-endian i32.
    pub fn write_i32_le(&mut self, value: i32) -> Result<(), SerializationError> {
        self.put(&value.to_le_bytes())
    }

    /// Write a little-endian u64.
    pub fn write_u64_le(&mut self, value: u64) -> Result<(), SerializationError> {
        self.put(&value.to_le_bytes())
    }

    /// Write a little-endian f32.
    pub fn write_f32_le(&mut self, value: f32) -> Result<(), SerializationError> {
        self.put(&value.to_le_bytes())
    }

    /// Write a little-endian f64.
    pub fn write_f64_le(&mut self, value: f64) -> Result<(), SerializationError> {
        self.put(&value.to_le_bytes())
    }

    /// Write a collection length as u32.
    pub fn write_len(&mut self, len: usize) -> Result<(), SerializationError> {
        let len = u32::try_from(len).map_err(|_| SerializationError::InvalidValue("collection too large"))?;
        self.write_u32_le(len)
    }

    /// Write a boolean as one byte.
    pub fn write_bool(&mut self, value: bool) -> Result<(), SerializationError> {
        self.write_u8(u8::from(value))
    }

    /// Encode any [`Encode`] value.
    pub fn write<T: Encode + ?Sized>(&mut self, value: &T) -> Result<(), SerializationError> {
        value.encode(self)
    }
}

/// Reader for little-endian scalars.
pub struct Reader<'a> {
    input: &'a mut dyn Read,
}

impl<'a> Reader<'a> {
    /// Reader consuming `input`.
    pub fn new(input: &'a mut dyn Read) -> Self {
        Self { input }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], SerializationError> {
        let mut raw = [0u8; N];
        match self.input.read_exact(&mut raw) {
            Ok(()) => Ok(raw),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(SerializationError::UnexpectedEnd),
            Err(err) => Err(SerializationError::Io(err)),
        }
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a little-endian u32.
    pub fn read_u32_le(&mut self) -> Result<u32, SerializationError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Read a little-endian i32.
    pub fn read_i32_le(&mut self) -> Result<i32, SerializationError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Read a little-endian u64.
    pub fn read_u64_le(&mut self) -> Result<u64, SerializationError> {
        Ok(u64::from_le_bytes(self.take()?))
    }

    /// Read a little-endian f32.
    pub fn read_f32_le(&mut self) -> Result<f32, SerializationError> {
        Ok(f32::from_le_bytes(self.take()?))
    }

    /// Read a little-endian f64.
    pub fn read_f64_le(&mut self) -> Result<f64, SerializationError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Read a u32 collection length.
    pub fn read_len(&mut self) -> Result<usize, SerializationError> {
        Ok(self.read_u32_le()? as usize)
    }

    /// Read a one-byte boolean; anything but 0 or 1 is rejected.
    pub fn read_bool(&mut self) -> Result<bool, SerializationError> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationError::InvalidValue("boolean byte out of range")),
        }
    }

    /// Decode any [`Decode`] value.
    pub fn read<T: Decode>(&mut self) -> Result<T, SerializationError> {
        T::decode(self)
    }
}

/// Upper bound for `Vec::with_capacity` on untrusted lengths.
pub(crate) fn capped(len: usize) -> usize {
    len.min(1024)
}

fn finite(value: f64) -> Result<f64, SerializationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(SerializationError::InvalidValue("non-finite float"))
    }
}

impl Encode for Vec3 {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        for c in self.to_array() {
            w.write_f64_le(c)?;
        }
        Ok(())
    }
}

impl Decode for Vec3 {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self::new(finite(r.read_f64_le()?)?, finite(r.read_f64_le()?)?, finite(r.read_f64_le()?)?))
    }
}

impl Encode for Position {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write(&self.to_vec())
    }
}

impl Decode for Position {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self::from(r.read::<Vec3>()?))
    }
}

impl Encode for Rotation {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        for row in self.as_mat3().rows() {
            for c in row {
                w.write_f64_le(c)?;
            }
        }
        Ok(())
    }
}

impl Decode for Rotation {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        let mut rows = [[0.0; 3]; 3];
        for row in &mut rows {
            for c in row.iter_mut() {
                *c = finite(r.read_f64_le()?)?;
            }
        }
        let rotation = Self::from_matrix_unchecked(Mat3::from_rows(rows));
        if rotation.is_orthonormal(1e-6) {
            Ok(rotation)
        } else {
            Err(SerializationError::InvalidValue("rotation is not orthonormal"))
        }
    }
}

impl Encode for CFrame {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write(&self.position)?;
        w.write(&self.rotation)
    }
}

impl Decode for CFrame {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self::new(r.read()?, r.read()?))
    }
}

impl Encode for GlobalCFrame {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write(&self.position)?;
        w.write(&self.rotation)
    }
}

impl Decode for GlobalCFrame {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self::new(r.read()?, r.read()?))
    }
}

impl Encode for Motion {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write(&self.velocity)?;
        w.write(&self.acceleration)?;
        w.write(&self.angular_velocity)?;
        w.write(&self.angular_acceleration)
    }
}

impl Decode for Motion {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            velocity: r.read()?,
            acceleration: r.read()?,
            angular_velocity: r.read()?,
            angular_acceleration: r.read()?,
        })
    }
}

impl Encode for PartProperties {
    fn encode(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write_f64_le(self.density)?;
        w.write_f64_le(self.friction)?;
        w.write_f64_le(self.bouncyness)?;
        w.write(&self.conveyor_effect)
    }
}

impl Decode for PartProperties {
    fn decode(r: &mut Reader<'_>) -> Result<Self, SerializationError> {
        Ok(Self {
            density: finite(r.read_f64_le()?)?,
            friction: finite(r.read_f64_le()?)?,
            bouncyness: finite(r.read_f64_le()?)?,
            conveyor_effect: r.read()?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn scalars_are_little_endian() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        w.write_u32_le(0x0102_0304).unwrap();
        w.write_i32_le(-2).unwrap();
        assert_eq!(buf, [4, 3, 2, 1, 0xfe, 0xff, 0xff, 0xff]);
    }

    #[test]
    fn short_input_is_unexpected_end() {
        let mut input: &[u8] = &[1, 2, 3];
        let mut r = Reader::new(&mut input);
        assert!(matches!(r.read_u32_le(), Err(SerializationError::UnexpectedEnd)));
    }

    #[test]
    fn skewed_rotation_is_rejected() {
        let mut buf = Vec::new();
        let mut w = Writer::new(&mut buf);
        for v in [2.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0] {
            w.write_f64_le(v).unwrap();
        }
        let mut input = buf.as_slice();
        let err = Reader::new(&mut input).read::<Rotation>().unwrap_err();
        assert!(matches!(err, SerializationError::InvalidValue(_)));
    }

    #[test]
    fn frames_survive_the_stream() {
        let frame = CFrame::new(Vec3::new(1.0, -2.0, 3.5), Rotation::rot_z(0.3));
        let mut buf = Vec::new();
        Writer::new(&mut buf).write(&frame).unwrap();
        assert_eq!(buf.len(), 12 * 8);
        let mut input = buf.as_slice();
        assert_eq!(Reader::new(&mut input).read::<CFrame>().unwrap(), frame);
    }
}
