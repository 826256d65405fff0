// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Registry of shape classes shared between many parts.
//!
//! Ids `0..predefined` name classes both ends already know (the builtins,
//! then any classes the session was created with) and are never written.
//! Every other class gets the next id the first time it is included.

use std::sync::Arc;

use super::codec::{capped, Reader, Writer};
use super::dynamic::{read_dynamic, write_dynamic};
use super::SerializationError;
use crate::shape::ShapeClass;

/// Ids of the builtin classes, in order.
pub const BUILTIN_CLASSES: [ShapeClass; 3] = [ShapeClass::Box, ShapeClass::Sphere, ShapeClass::Cylinder];

/// Identity used for dedup: builtins by kind, polyhedra by allocation.
fn same_class(a: &ShapeClass, b: &ShapeClass) -> bool {
    match (a, b) {
        (ShapeClass::Polyhedron(x), ShapeClass::Polyhedron(y)) => Arc::ptr_eq(x, y),
        (ShapeClass::Box, ShapeClass::Box)
        | (ShapeClass::Sphere, ShapeClass::Sphere)
        | (ShapeClass::Cylinder, ShapeClass::Cylinder) => true,
        _ => false,
    }
}

fn predefined_with(known: &[ShapeClass]) -> Vec<ShapeClass> {
    BUILTIN_CLASSES.iter().cloned().chain(known.iter().cloned()).collect()
}

/// Encode side: collects classes, then writes the registry.
#[derive(Debug, Clone)]
pub struct SharedObjectSerializer {
    predefined: Vec<ShapeClass>,
    dynamic: Vec<ShapeClass>,
}

impl SharedObjectSerializer {
    /// Registry that already knows the builtins plus `known`.
    pub fn new(known: &[ShapeClass]) -> Self {
        Self { predefined: predefined_with(known), dynamic: Vec::new() }
    }

    /// Registers `class` if neither predefined nor already included.
    pub fn include(&mut self, class: &ShapeClass) {
        let seen = self.predefined.iter().chain(&self.dynamic).any(|c| same_class(c, class));
        if !seen {
            self.dynamic.push(class.clone());
        }
    }

    /// Id of an included or predefined class.
    pub fn id_of(&self, class: &ShapeClass) -> Result<u32, SerializationError> {
        let index = self
            .predefined
            .iter()
            .chain(&self.dynamic)
            .position(|c| same_class(c, class))
            .ok_or(SerializationError::InvalidValue("shape class was not collected"))?;
        u32::try_from(index).map_err(|_| SerializationError::InvalidValue("too many shape classes"))
    }

    /// Number of classes that will be written.
    pub fn dynamic_len(&self) -> usize {
        self.dynamic.len()
    }

    /// Writes the dynamic entries in id order.
    pub fn write_registry(&self, w: &mut Writer<'_>) -> Result<(), SerializationError> {
        w.write_len(self.dynamic.len())?;
        for class in &self.dynamic {
            write_dynamic(w, class)?;
        }
        Ok(())
    }
}

/// Decode side: resolves ids read from the body.
#[derive(Debug, Clone)]
pub struct SharedObjectDeserializer {
    classes: Vec<ShapeClass>,
}

impl SharedObjectDeserializer {
    /// Registry that already knows the builtins plus `known`.
    pub fn new(known: &[ShapeClass]) -> Self {
        Self { classes: predefined_with(known) }
    }

    /// Reads the dynamic entries written by [`SharedObjectSerializer::write_registry`].
    pub fn read_registry(&mut self, r: &mut Reader<'_>) -> Result<(), SerializationError> {
        let count = r.read_len()?;
        self.classes.reserve(capped(count));
        for _ in 0..count {
            let class = read_dynamic(r)?;
            self.classes.push(class);
        }
        Ok(())
    }

    /// Class with id `id`.
    pub fn get(&self, id: u32) -> Result<ShapeClass, SerializationError> {
        self.classes
            .get(id as usize)
            .cloned()
            .ok_or(SerializationError::UnknownSharedObject { id, registered: self.classes.len() })
    }
}
