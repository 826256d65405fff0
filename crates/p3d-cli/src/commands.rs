// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Subcommand implementations.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use comfy_table::{presets::UTF8_FULL, Table};
use p3d_core::serialization::CURRENT_VERSION;
use p3d_core::{
    ConfigService, DeserializationSession, FsConfigStore, PartsFilter, SerializationSession, World, WorldConfig,
};
use serde::Serialize;
use tracing::info;

use crate::demo::build_demo_world;

pub(crate) fn load_config(dir: Option<&Path>) -> Result<WorldConfig> {
    let Some(dir) = dir else {
        return Ok(WorldConfig::default());
    };
    let store = FsConfigStore::at(dir).with_context(|| format!("failed to open config dir {}", dir.display()))?;
    ConfigService::new(store).load_world_config().context("failed to load world config")
}

fn load_world(path: &Path, config: &WorldConfig) -> Result<World> {
    let bytes = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let world = DeserializationSession::new()
        .with_config(config.clone())
        .deserialize_world(&mut bytes.as_slice())
        .with_context(|| format!("failed to decode {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "loaded world");
    Ok(world)
}

fn save_world(path: &Path, world: &World) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    SerializationSession::new()
        .serialize_world(world, &mut out)
        .with_context(|| format!("failed to encode {}", path.display()))?;
    out.flush().with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct LayerSummary {
    id: u32,
    name: String,
    collides_internally: bool,
    free_parts: usize,
    terrain_parts: usize,
    terrain_depth: usize,
    terrain_cost: f64,
}

#[derive(Debug, Serialize)]
struct WorldSummary {
    version: i32,
    age: u64,
    physicals: usize,
    free_parts: usize,
    terrain_parts: usize,
    free_mass: f64,
    shape_classes: BTreeMap<&'static str, usize>,
    constraint_groups: usize,
    external_forces: Vec<&'static str>,
    layers: Vec<LayerSummary>,
}

impl WorldSummary {
    fn of(world: &World) -> Self {
        let mut shape_classes = BTreeMap::new();
        for id in world.iter_parts(PartsFilter::All) {
            if let Some(part) = world.part(id) {
                *shape_classes.entry(part.shape.class.name()).or_insert(0) += 1;
            }
        }
        let free_mass = world.iter_parts(PartsFilter::Free).filter_map(|id| world.part(id)).map(|p| p.mass()).sum();
        let layers = world
            .layers()
            .map(|(id, layer)| LayerSummary {
                id: id.0,
                name: layer.name().to_owned(),
                collides_internally: world.layers_collide(id, id),
                free_parts: layer.free_tree().len(),
                terrain_parts: layer.terrain_tree().len(),
                terrain_depth: layer.terrain_tree().depth(),
                terrain_cost: layer.terrain_tree().total_cost(),
            })
            .collect();
        Self {
            version: CURRENT_VERSION,
            age: world.age(),
            physicals: world.physicals().len(),
            free_parts: world.iter_parts(PartsFilter::Free).count(),
            terrain_parts: world.iter_parts(PartsFilter::Terrain).count(),
            free_mass,
            shape_classes,
            constraint_groups: world.constraint_groups().len(),
            external_forces: world.external_forces().map(|(_, f)| f.name()).collect(),
            layers,
        }
    }

    fn tables(&self) -> (Table, Table) {
        let mut overview = Table::new();
        overview.load_preset(UTF8_FULL).set_header(vec!["property", "value"]);
        overview.add_row(vec!["format version".to_owned(), self.version.to_string()]);
        overview.add_row(vec!["age".to_owned(), self.age.to_string()]);
        overview.add_row(vec!["physicals".to_owned(), self.physicals.to_string()]);
        overview.add_row(vec!["free parts".to_owned(), self.free_parts.to_string()]);
        overview.add_row(vec!["terrain parts".to_owned(), self.terrain_parts.to_string()]);
        overview.add_row(vec!["free mass".to_owned(), format!("{:.3}", self.free_mass)]);
        for (class, count) in &self.shape_classes {
            overview.add_row(vec![format!("shape: {class}"), count.to_string()]);
        }
        overview.add_row(vec!["constraint groups".to_owned(), self.constraint_groups.to_string()]);
        overview.add_row(vec!["external forces".to_owned(), self.external_forces.join(", ")]);

        let mut layers = Table::new();
        layers.load_preset(UTF8_FULL).set_header(vec![
            "layer",
            "name",
            "self-collide",
            "free",
            "terrain",
            "terrain depth",
            "terrain cost",
        ]);
        for l in &self.layers {
            layers.add_row(vec![
                l.id.to_string(),
                l.name.clone(),
                l.collides_internally.to_string(),
                l.free_parts.to_string(),
                l.terrain_parts.to_string(),
                l.terrain_depth.to_string(),
                format!("{:.2}", l.terrain_cost),
            ]);
        }
        (overview, layers)
    }
}

pub(crate) fn inspect(path: &Path, config: &WorldConfig, json: bool) -> Result<()> {
    let world = load_world(path, config)?;
    let summary = WorldSummary::of(&world);
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        let (overview, layers) = summary.tables();
        println!("{overview}");
        println!("{layers}");
    }
    Ok(())
}

pub(crate) fn validate(path: &Path, config: &WorldConfig) -> Result<()> {
    let world = load_world(path, config)?;
    if let Err(violation) = world.validate() {
        bail!("{}: world invariant violated: {violation}", path.display());
    }
    println!(
        "{}: ok ({} physicals, {} parts)",
        path.display(),
        world.physicals().len(),
        world.iter_parts(PartsFilter::All).count()
    );
    Ok(())
}

fn terrain_cost(world: &World) -> f64 {
    world.layers().map(|(_, layer)| layer.terrain_tree().total_cost()).sum()
}

pub(crate) fn optimize(input: &Path, out: &Path, mut config: WorldConfig, passes: Option<u32>) -> Result<()> {
    if let Some(passes) = passes {
        config.terrain_optimization_passes = passes;
    }
    let mut world = load_world(input, &config)?;
    let before = terrain_cost(&world);
    world.optimize_terrain();
    let after = terrain_cost(&world);
    save_world(out, &world)?;
    println!(
        "terrain cost {before:.2} -> {after:.2} after {} passes, written to {}",
        config.terrain_optimization_passes,
        out.display()
    );
    Ok(())
}

pub(crate) fn demo(out: &Path, config: WorldConfig, terrain: u32, towers: u32) -> Result<()> {
    let world = build_demo_world(config, terrain, towers);
    save_world(out, &world)?;
    println!(
        "wrote {} ({} physicals, {} terrain parts)",
        out.display(),
        world.physicals().len(),
        world.iter_parts(PartsFilter::Terrain).count()
    );
    Ok(())
}
