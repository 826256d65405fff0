// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Versioned binary format for worlds and part lists.
//!
//! Encoding runs in two phases: a collect pass registers every shape class
//! the body will reference, then the header (version tag and class registry)
//! and the body are written. Physicals are written depth-first; soft
//! constraints refer to physicals by their position in that walk.

pub mod codec;
pub mod dynamic;
pub mod session;
pub mod shared;

use thiserror::Error;

pub use codec::{Decode, Encode, Reader, Writer};
pub use dynamic::{read_dynamic, write_dynamic, DecodeFn, DynamicCodec};
pub use session::{from_bytes, to_bytes, DeserializationSession, SerializationSession};
pub use shared::{SharedObjectDeserializer, SharedObjectSerializer, BUILTIN_CLASSES};

/// Version tag written first in every stream.
pub const CURRENT_VERSION: i32 = 2;

/// Format errors. A failed decode never yields a partial world.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Underlying stream failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Stream ended mid-value.
    #[error("stream ended unexpectedly")]
    UnexpectedEnd,
    /// Stream written by an incompatible version.
    #[error("outdated or incompatible stream: expected version {expected}, found {found}")]
    VersionMismatch {
        /// Version this build reads.
        expected: i32,
        /// Version in the stream.
        found: i32,
    },
    /// Discriminant missing from a family's decoder table.
    #[error("unknown {category} discriminant {discriminant}")]
    UnknownDiscriminant {
        /// Family name.
        category: &'static str,
        /// Offending discriminant.
        discriminant: u32,
    },
    /// Predefined family member handed to the tagged writer.
    #[error("predefined {category} has no discriminant")]
    Predefined {
        /// Family name.
        category: &'static str,
    },
    /// Shape class id past the registry.
    #[error("shared object {id} not registered ({registered} known)")]
    UnknownSharedObject {
        /// Offending id.
        id: u32,
        /// Registry size.
        registered: usize,
    },
    /// Constraint refers to a physical index that was never assigned.
    #[error("physical index {index} out of range ({count} physicals)")]
    InvalidPhysicalIndex {
        /// Offending index.
        index: u32,
        /// Physicals decoded so far.
        count: usize,
    },
    /// Part refers to a layer the stream did not declare.
    #[error("layer {id} out of range ({count} layers)")]
    InvalidLayer {
        /// Offending layer.
        id: u32,
        /// Declared layers.
        count: usize,
    },
    /// Value outside its domain.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
}
