// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! p3d-core: broad-phase spatial index and object graph of the P3D physics
//! engine.
//!
//! A [`World`] owns parts (shaped solids), groups them into physicals (rigid
//! bodies joined by hard constraints) and indexes every part in a
//! per-layer [`BoundsTree`]. The tree keeps each physical's parts together as
//! an atomic group so queries and colliding-pair enumeration never have to
//! look inside a structure to skip self-collisions.
//!
//! The narrow phase, the constraint solver and the integrator live
//! elsewhere; this crate supplies them with candidate pairs, mass properties
//! and a consistent object graph.
#![forbid(unsafe_code)]

/// Dynamic bounding-volume hierarchy with grouped objects.
pub mod bounds_tree;
/// World configuration and its storage port.
pub mod config;
/// Hard and soft constraints.
pub mod constraint;
/// Invariant-violation reports.
pub mod error;
/// Spatial filters for tree queries.
pub mod filter;
/// External force fields.
pub mod force;
/// Arena handles.
pub mod ident;
/// Mass, centre of mass and inertia.
pub mod inertia;
/// Linear and angular motion.
pub mod motion;
/// Parts and their materials.
pub mod part;
/// Physicals and the ownership graph.
pub mod physical;
/// Welded part sets.
pub mod rigid_body;
/// Versioned binary format.
pub mod serialization;
/// Shape classes and scaled shapes.
pub mod shape;
/// The world and its synchronized wrapper.
pub mod world;

pub use bounds_tree::{BoundsTree, NodeStack, TreeNode};
pub use config::{ConfigError, ConfigService, ConfigStore, FsConfigStore, LayerConfig, WorldConfig};
pub use constraint::{Constraint, ConstraintGroup, HardConstraint, HardPhysicalConnection, PhysicalConstraint};
pub use error::InvariantViolation;
pub use filter::{AcceptAll, BoundsFilter, SpatialFilter, VisibilityFilter};
pub use force::ExternalForce;
pub use ident::{ForceId, LayerId, PartId, PhysicalId};
pub use inertia::MassProperties;
pub use motion::Motion;
pub use part::{Part, PartProperties};
pub use physical::{Physical, PhysicalGraph, PhysicalKind};
pub use rigid_body::{AttachedPart, RigidBody};
pub use serialization::{DeserializationSession, SerializationError, SerializationSession};
pub use shape::{PolyhedronError, PolyhedronShape, Shape, ShapeClass};
pub use world::{PartsFilter, SynchronizedWorld, World};
