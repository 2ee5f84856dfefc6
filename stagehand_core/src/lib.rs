//! Scene-graph substrate of the stagehand editor.
//!
//! Provides object identifiers and the id allocator, local transforms, bounding boxes, the
//! object arena with hierarchy, links, layers and selection, and the undo log.

#![warn(missing_docs, rust_2018_idioms, rust_2018_compatibility)]

pub use nalgebra;

pub use crate::{
    error::SceneError,
    geometry::Aabb,
    ids::{ForcedIdScope, IdAllocator, ObjectId},
    scene::{Layer, LayerId, ObjectFlags, ObjectKind, Scene, SceneObject, DEFAULT_LAYER},
    transform::Transform,
    undo::{Transaction, UndoLog, UndoRecord},
};

pub mod geometry;
pub mod ids;
pub mod scene;
pub mod transform;
pub mod undo;

mod error;
