// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Encode and decode sessions for whole worlds and loose part lists.

use std::io::{Read, Write};

use p3d_geom::{CFrame, GlobalCFrame};
use slotmap::SecondaryMap;
use tracing::{debug, info};

use super::codec::{capped, Reader, Writer};
use super::dynamic::{read_dynamic, write_dynamic};
use super::shared::{SharedObjectDeserializer, SharedObjectSerializer};
use super::{SerializationError, CURRENT_VERSION};
use crate::config::WorldConfig;
use crate::constraint::{HardPhysicalConnection, PhysicalConstraint};
use crate::ident::{LayerId, PartId, PhysicalId};
use crate::part::{Part, PartProperties};
use crate::physical::PhysicalGraph;
use crate::shape::{Shape, ShapeClass};
use crate::world::{LayerMatrix, World};

/// Encodes worlds and part lists.
///
/// Classes passed to [`Self::with_known_classes`] are assumed present on the
/// decode side (same order) and are not written.
#[derive(Debug, Clone, Default)]
pub struct SerializationSession {
    known: Vec<ShapeClass>,
}

impl SerializationSession {
    /// Session knowing only the builtin classes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that also treats `known` as predefined.
    pub fn with_known_classes(known: Vec<ShapeClass>) -> Self {
        Self { known }
    }

    fn write_header(&self, w: &mut Writer<'_>, shared: &SharedObjectSerializer) -> Result<(), SerializationError> {
        w.write_i32_le(CURRENT_VERSION)?;
        shared.write_registry(w)
    }

    /// Writes `world` to `out`.
    pub fn serialize_world(&self, world: &World, out: &mut dyn Write) -> Result<(), SerializationError> {
        let graph = world.graph();
        let mut shared = SharedObjectSerializer::new(&self.known);
        let terrain: Vec<Vec<PartId>> = (0..world.layer_count())
            .map(|i| {
                world
                    .layer(LayerId(i as u32))
                    .map(|l| l.terrain_tree().iter().map(|(p, _)| p).collect())
                    .unwrap_or_default()
            })
            .collect();
        for &part in terrain.iter().flatten() {
            shared.include(&part_ref(graph, part)?.shape.class);
        }
        for &root in world.physicals() {
            for part in graph.structure_parts(root) {
                shared.include(&part_ref(graph, part)?.shape.class);
            }
        }

        let mut w = Writer::new(out);
        self.write_header(&mut w, &shared)?;
        w.write_u64_le(world.age())?;

        let matrix = world.layer_matrix();
        w.write_len(matrix.len())?;
        for &flag in matrix.flags() {
            w.write_bool(flag)?;
        }

        for layer in &terrain {
            w.write_len(layer.len())?;
            for &part in layer {
                let p = part_ref(graph, part)?;
                w.write(p.cframe())?;
                write_part_data(&mut w, &shared, p)?;
            }
        }

        let mut indices: SecondaryMap<PhysicalId, u32> = SecondaryMap::new();
        w.write_len(world.physicals().len())?;
        for &root in world.physicals() {
            let motion = graph.motion(root).copied().unwrap_or_default();
            let main = main_part_of(graph, root)?;
            w.write(&motion)?;
            w.write(main.cframe())?;
            write_physical(&mut w, &shared, graph, root, &mut indices)?;
        }

        let groups = world.constraint_groups();
        w.write_len(groups.len())?;
        for group in groups {
            w.write_len(group.constraints.len())?;
            for c in &group.constraints {
                for phys in [c.phys_a, c.phys_b] {
                    let index = indices
                        .get(phys)
                        .copied()
                        .ok_or(SerializationError::InvalidValue("constraint references a physical outside the world"))?;
                    w.write_u32_le(index)?;
                }
                write_dynamic(&mut w, &c.constraint)?;
            }
        }

        let forces: Vec<_> = world.external_forces().map(|(_, f)| *f).collect();
        w.write_len(forces.len())?;
        for force in &forces {
            write_dynamic(&mut w, force)?;
        }

        info!(
            physicals = indices.len(),
            terrain = terrain.iter().map(Vec::len).sum::<usize>(),
            classes = shared.dynamic_len(),
            "serialized world"
        );
        Ok(())
    }

    /// Writes loose parts (frame, shape and material only).
    pub fn serialize_parts<'p>(
        &self,
        parts: impl IntoIterator<Item = &'p Part>,
        out: &mut dyn Write,
    ) -> Result<(), SerializationError> {
        let parts: Vec<&Part> = parts.into_iter().collect();
        let mut shared = SharedObjectSerializer::new(&self.known);
        for p in &parts {
            shared.include(&p.shape.class);
        }
        let mut w = Writer::new(out);
        self.write_header(&mut w, &shared)?;
        w.write_len(parts.len())?;
        for p in &parts {
            w.write(p.cframe())?;
            write_part_data(&mut w, &shared, p)?;
        }
        debug!(parts = parts.len(), "serialized parts");
        Ok(())
    }
}

fn part_ref(graph: &PhysicalGraph, part: PartId) -> Result<&Part, SerializationError> {
    graph.part(part).ok_or(SerializationError::InvalidValue("dangling part handle"))
}

fn main_part_of(graph: &PhysicalGraph, physical: PhysicalId) -> Result<&Part, SerializationError> {
    let phys = graph.physical(physical).ok_or(SerializationError::InvalidValue("dangling physical handle"))?;
    part_ref(graph, phys.rigid_body().main_part())
}

fn write_part_data(w: &mut Writer<'_>, shared: &SharedObjectSerializer, part: &Part) -> Result<(), SerializationError> {
    w.write_u32_le(shared.id_of(&part.shape.class)?)?;
    w.write_f64_le(part.shape.width)?;
    w.write_f64_le(part.shape.height)?;
    w.write_f64_le(part.shape.depth)?;
    w.write(&part.properties)
}

fn write_physical(
    w: &mut Writer<'_>,
    shared: &SharedObjectSerializer,
    graph: &PhysicalGraph,
    physical: PhysicalId,
    indices: &mut SecondaryMap<PhysicalId, u32>,
) -> Result<(), SerializationError> {
    let next = u32::try_from(indices.len()).map_err(|_| SerializationError::InvalidValue("too many physicals"))?;
    indices.insert(physical, next);
    let phys = graph.physical(physical).ok_or(SerializationError::InvalidValue("dangling physical handle"))?;
    let body = phys.rigid_body();

    let main = part_ref(graph, body.main_part())?;
    w.write_u32_le(main.layer().0)?;
    write_part_data(w, shared, main)?;
    w.write_len(body.attached_parts().len())?;
    for attached in body.attached_parts() {
        let p = part_ref(graph, attached.part)?;
        w.write(&attached.attachment)?;
        w.write_u32_le(p.layer().0)?;
        write_part_data(w, shared, p)?;
    }

    w.write_len(phys.children().len())?;
    for &child in phys.children() {
        let connection = graph
            .physical(child)
            .and_then(|c| c.connection())
            .ok_or(SerializationError::InvalidValue("child physical without a connection"))?;
        w.write(&connection.attach_on_child)?;
        w.write(&connection.attach_on_parent)?;
        write_dynamic(w, &connection.constraint)?;
        write_physical(w, shared, graph, child, indices)?;
    }
    Ok(())
}

/// Decodes worlds and part lists.
#[derive(Debug, Clone, Default)]
pub struct DeserializationSession {
    known: Vec<ShapeClass>,
    config: WorldConfig,
}

impl DeserializationSession {
    /// Session knowing only the builtin classes; decoded worlds use the
    /// default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that also treats `known` as predefined.
    pub fn with_known_classes(mut self, known: Vec<ShapeClass>) -> Self {
        self.known = known;
        self
    }

    /// Configuration given to decoded worlds. Layers always come from the
    /// stream; `config.layers` is ignored.
    pub fn with_config(mut self, config: WorldConfig) -> Self {
        self.config = config;
        self
    }

    fn read_header(&self, r: &mut Reader<'_>) -> Result<SharedObjectDeserializer, SerializationError> {
        let found = r.read_i32_le()?;
        if found != CURRENT_VERSION {
            return Err(SerializationError::VersionMismatch { expected: CURRENT_VERSION, found });
        }
        let mut shared = SharedObjectDeserializer::new(&self.known);
        shared.read_registry(r)?;
        Ok(shared)
    }

    /// Reads a world written by [`SerializationSession::serialize_world`]
    /// into a fresh [`World`].
    pub fn deserialize_world(&self, input: &mut dyn Read) -> Result<World, SerializationError> {
        let mut r = Reader::new(input);
        let shared = self.read_header(&mut r)?;
        let age = r.read_u64_le()?;

        let layer_count = r.read_len()?;
        if layer_count == 0 {
            return Err(SerializationError::InvalidValue("a world has at least one layer"));
        }
        let flag_count = layer_count
            .checked_mul(layer_count + 1)
            .map(|n| n / 2)
            .ok_or(SerializationError::InvalidValue("layer count too large"))?;
        let mut flags = Vec::with_capacity(capped(flag_count));
        for _ in 0..flag_count {
            flags.push(r.read_bool()?);
        }
        let matrix = LayerMatrix::from_flags(layer_count, flags)
            .ok_or(SerializationError::InvalidValue("layer matrix size mismatch"))?;

        let mut world = World::new(WorldConfig { layers: Vec::new(), ..self.config.clone() });
        world.replace_layer_matrix(matrix);
        world.set_age(age);

        for layer in 0..layer_count {
            let count = r.read_len()?;
            for _ in 0..count {
                let cframe: GlobalCFrame = r.read()?;
                let (shape, properties) = read_part_data(&mut r, &shared)?;
                let part = world.create_part(shape, cframe, properties);
                if !world.add_terrain_part_to_layer(part, LayerId(layer as u32)) {
                    return Err(SerializationError::InvalidValue("terrain part rejected"));
                }
            }
        }

        let mut table: Vec<PhysicalId> = Vec::new();
        let physical_count = r.read_len()?;
        for _ in 0..physical_count {
            let motion = r.read()?;
            let main_cframe: GlobalCFrame = r.read()?;
            let graph = world.graph_mut();
            let root = read_physical(&mut r, &shared, graph, main_cframe, &mut table, layer_count)?;
            graph.update_positions_from(root);
            graph.refresh_physical_properties(root);
            graph.set_motion(root, motion);
            let main = graph.physical(root).map(|p| p.rigid_body().main_part());
            if !main.is_some_and(|part| world.add_part(part)) {
                return Err(SerializationError::InvalidValue("physical rejected"));
            }
        }

        let group_count = r.read_len()?;
        for _ in 0..group_count {
            let n = r.read_len()?;
            let mut constraints = Vec::with_capacity(capped(n));
            for _ in 0..n {
                let phys_a = lookup(&table, r.read_u32_le()?)?;
                let phys_b = lookup(&table, r.read_u32_le()?)?;
                constraints.push(PhysicalConstraint { phys_a, phys_b, constraint: read_dynamic(&mut r)? });
            }
            if !world.add_constraint_group(constraints) {
                return Err(SerializationError::InvalidValue("constraint group rejected"));
            }
        }

        let force_count = r.read_len()?;
        for _ in 0..force_count {
            world.add_external_force(read_dynamic(&mut r)?);
        }

        info!(
            physicals = table.len(),
            parts = world.graph().part_count(),
            layers = layer_count,
            "deserialized world"
        );
        Ok(world)
    }

    /// Reads parts written by [`SerializationSession::serialize_parts`].
    pub fn deserialize_parts(&self, input: &mut dyn Read) -> Result<Vec<Part>, SerializationError> {
        let mut r = Reader::new(input);
        let shared = self.read_header(&mut r)?;
        let count = r.read_len()?;
        let mut parts = Vec::with_capacity(capped(count));
        for _ in 0..count {
            let cframe: GlobalCFrame = r.read()?;
            let (shape, properties) = read_part_data(&mut r, &shared)?;
            parts.push(Part::new(shape, cframe, properties));
        }
        debug!(parts = parts.len(), "deserialized parts");
        Ok(parts)
    }
}

fn lookup(table: &[PhysicalId], index: u32) -> Result<PhysicalId, SerializationError> {
    table
        .get(index as usize)
        .copied()
        .ok_or(SerializationError::InvalidPhysicalIndex { index, count: table.len() })
}

fn read_layer(r: &mut Reader<'_>, layer_count: usize) -> Result<LayerId, SerializationError> {
    let id = r.read_u32_le()?;
    if id as usize >= layer_count {
        return Err(SerializationError::InvalidLayer { id, count: layer_count });
    }
    Ok(LayerId(id))
}

fn read_part_data(
    r: &mut Reader<'_>,
    shared: &SharedObjectDeserializer,
) -> Result<(Shape, PartProperties), SerializationError> {
    let class = shared.get(r.read_u32_le()?)?;
    let mut dims = [0.0; 3];
    for d in &mut dims {
        *d = r.read_f64_le()?;
        if !d.is_finite() || *d < 0.0 {
            return Err(SerializationError::InvalidValue("shape dimension must be finite and non-negative"));
        }
    }
    let [width, height, depth] = dims;
    Ok((Shape::new(class, width, height, depth), r.read()?))
}

fn read_physical(
    r: &mut Reader<'_>,
    shared: &SharedObjectDeserializer,
    graph: &mut PhysicalGraph,
    main_cframe: GlobalCFrame,
    table: &mut Vec<PhysicalId>,
    layer_count: usize,
) -> Result<PhysicalId, SerializationError> {
    let layer = read_layer(r, layer_count)?;
    let (shape, properties) = read_part_data(r, shared)?;
    let main = graph.create_part(shape, main_cframe, properties);
    graph.set_part_layer(main, layer);
    let physical = graph.ensure_has_parent(main).ok_or(SerializationError::InvalidValue("part rejected"))?;
    table.push(physical);

    let attached = r.read_len()?;
    for _ in 0..attached {
        let attachment: CFrame = r.read()?;
        let layer = read_layer(r, layer_count)?;
        let (shape, properties) = read_part_data(r, shared)?;
        let part = graph.create_part(shape, main_cframe.local_to_global_cframe(&attachment), properties);
        graph.set_part_layer(part, layer);
        graph.weld(physical, part, attachment);
    }

    let children = r.read_len()?;
    for _ in 0..children {
        let attach_on_child: CFrame = r.read()?;
        let attach_on_parent: CFrame = r.read()?;
        let constraint = read_dynamic(r)?;
        let connection = HardPhysicalConnection { attach_on_child, attach_on_parent, constraint };
        let child_cframe = main_cframe.local_to_global_cframe(&connection.relative_cframe_to_parent());
        let child = read_physical(r, shared, graph, child_cframe, table, layer_count)?;
        graph.connect_child(physical, child, connection);
    }
    Ok(physical)
}

/// Serializes `world` with a fresh default session.
pub fn to_bytes(world: &World) -> Result<Vec<u8>, SerializationError> {
    let mut buf = Vec::new();
    SerializationSession::new().serialize_world(world, &mut buf)?;
    Ok(buf)
}

/// Deserializes a world with a fresh default session.
pub fn from_bytes(bytes: &[u8]) -> Result<World, SerializationError> {
    let mut input = bytes;
    DeserializationSession::new().deserialize_world(&mut input)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use p3d_geom::{Position, Vec3};

    fn cube(x: f64) -> Part {
        Part::new(
            Shape::cuboid(1.0, 2.0, 3.0),
            GlobalCFrame::from_position(Position::new(x, 0.0, 0.0)),
            PartProperties::with_density(2.5),
        )
    }

    #[test]
    fn empty_world_header_layout() {
        let bytes = to_bytes(&World::default()).unwrap();
        let mut expected = Vec::new();
        expected.extend_from_slice(&CURRENT_VERSION.to_le_bytes());
        expected.extend_from_slice(&0u32.to_le_bytes()); // registry
        expected.extend_from_slice(&0u64.to_le_bytes()); // age
        expected.extend_from_slice(&1u32.to_le_bytes()); // layers
        expected.push(1); // default layer collides with itself
        expected.extend_from_slice(&0u32.to_le_bytes()); // terrain
        expected.extend_from_slice(&0u32.to_le_bytes()); // physicals
        expected.extend_from_slice(&0u32.to_le_bytes()); // groups
        expected.extend_from_slice(&0u32.to_le_bytes()); // forces
        assert_eq!(bytes, expected);
    }

    #[test]
    fn parts_round_trip() {
        let parts = [cube(0.0), cube(4.0)];
        let mut buf = Vec::new();
        SerializationSession::new().serialize_parts(&parts, &mut buf).unwrap();
        let mut input = buf.as_slice();
        let back = DeserializationSession::new().deserialize_parts(&mut input).unwrap();
        assert_eq!(back, parts);
    }

    #[test]
    fn version_is_checked_before_anything_else() {
        let mut bytes = to_bytes(&World::default()).unwrap();
        bytes[..4].copy_from_slice(&(CURRENT_VERSION + 1).to_le_bytes());
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, SerializationError::VersionMismatch { expected: 2, found: 3 }));
    }

    #[test]
    fn constraint_indices_are_range_checked() {
        let mut w = World::default();
        let a = w.create_part(Shape::cuboid(1.0, 1.0, 1.0), GlobalCFrame::default(), PartProperties::default());
        w.add_part(a);
        let mut bytes = to_bytes(&w).unwrap();
        // Replace the empty group list with one group naming physical 5.
        let tail = bytes.len() - 8;
        bytes.truncate(tail);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&5u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&Vec3::ZERO.to_array().map(f64::to_le_bytes).concat());
        bytes.extend_from_slice(&Vec3::ZERO.to_array().map(f64::to_le_bytes).concat());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, SerializationError::InvalidPhysicalIndex { index: 5, count: 1 }));
    }
}
