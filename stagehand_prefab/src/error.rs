use err_derive::Error;
use stagehand_core::{ObjectId, SceneError};

use crate::template::TemplateId;

/// Everything that can go wrong while instancing or synchronizing prefabs.
///
/// Most variants are recovered where they occur and only reported as diagnostics. The refusals
/// (`RecursivePrefabReference`, `NotAnInstance`, `MixedTemplates`) are returned as errors and
/// leave the level untouched.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PrefabError {
    /// The library has no template with this id. The instance keeps the id and stays dangling.
    #[error(display = "Prefab template {} could not be found", _0)]
    TemplateNotFound(TemplateId),
    /// The template has no object graph. The instance gets no children.
    #[error(display = "Prefab template {} has no object graph", _0)]
    EmptyTemplateGraph(TemplateId),
    /// A template node refers to a node that is not part of the graph. The reference was dropped.
    #[error(display = "Node {} refers to missing node {}", node, reference)]
    UnresolvedReference {
        /// The node holding the reference.
        node: ObjectId,
        /// The id that could not be resolved.
        reference: ObjectId,
    },
    /// Adding the object would make a prefab contain itself.
    #[error(display = "Adding {} to prefab {} would create a recursive prefab", _0, _1)]
    RecursivePrefabReference(ObjectId, ObjectId),
    /// The object is not a prefab instance.
    #[error(display = "Object {} is not a prefab instance", _0)]
    NotAnInstance(ObjectId),
    /// The objects belong to instances of different templates.
    #[error(display = "Objects belong to instances of different prefabs")]
    MixedTemplates,
    /// A scene operation failed.
    #[error(display = "Scene operation failed: {}", _0)]
    Scene(#[cause] SceneError),
}
