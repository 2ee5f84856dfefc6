//! Contains common types that can be glob-imported (`*`) for convenience.

pub use crate::{
    config::Config,
    core::{ObjectId, ObjectKind, Scene, Transform},
    prefab::{Level, MemberLink, PrefabConfig, PrefabLibrary, TemplateId},
};
