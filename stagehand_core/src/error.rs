use err_derive::Error;

use crate::ids::ObjectId;

/// Failures of scene-graph operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SceneError {
    /// No object with this id exists in the scene.
    #[error(display = "No object with id {} in the scene", _0)]
    UnknownObject(ObjectId),
    /// An object with this id already exists.
    #[error(display = "An object with id {} already exists", _0)]
    DuplicateId(ObjectId),
    /// The object's kind cannot be linked to another object.
    #[error(display = "Object {} cannot be linked", _0)]
    CannotBeLinked(ObjectId),
    /// Attaching or linking `_0` under `_1` would make an object its own ancestor.
    #[error(display = "Attaching {} to {} would create a cycle", _0, _1)]
    HierarchyCycle(ObjectId, ObjectId),
}
