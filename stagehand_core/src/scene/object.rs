use std::cell::Cell;

use bitflags::bitflags;
use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

use crate::{geometry::Aabb, ids::ObjectId, scene::LayerId, transform::Transform};

bitflags! {
    /// State bits of a scene object.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObjectFlags: u32 {
        /// The object was created by expanding a prefab instance and belongs to it.
        const PREFAB_MEMBER = 1 << 0;
        /// Hidden in the viewport.
        const HIDDEN = 1 << 1;
        /// Not selectable.
        const FROZEN = 1 << 2;
    }
}

/// What an object is. The closed set of kinds the editor knows about.
///
/// Every kind may own children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    /// A bare transform, used as a helper or a marker.
    Empty,
    /// A container whose bounds are those of its children.
    Group,
    /// Renderable geometry with fixed local bounds.
    Geometry {
        /// Bounds in the object's own space.
        bounds: Aabb,
    },
    /// The root of a prefab instance.
    Prefab,
}

impl ObjectKind {
    /// Whether objects of this kind may be linked to a target object.
    ///
    /// Groups are only ever parented.
    pub fn can_be_linked(&self) -> bool {
        match self {
            ObjectKind::Group => false,
            ObjectKind::Empty | ObjectKind::Geometry { .. } | ObjectKind::Prefab => true,
        }
    }

    /// Bounds in the object's own space, `None` for kinds whose extent comes from their children.
    pub fn local_bounds(&self) -> Option<Aabb> {
        match self {
            ObjectKind::Empty => Some(Aabb::from_point(Point3::origin())),
            ObjectKind::Geometry { bounds } => Some(*bounds),
            ObjectKind::Group | ObjectKind::Prefab => None,
        }
    }

    /// `true` for `ObjectKind::Prefab`.
    pub fn is_prefab(&self) -> bool {
        matches!(self, ObjectKind::Prefab)
    }
}

/// One object of the scene.
///
/// Relations are stored on both ends; only [`Scene`](super::Scene) changes them.
#[derive(Debug)]
pub struct SceneObject {
    pub(crate) id: ObjectId,
    pub(crate) name: String,
    pub(crate) kind: ObjectKind,
    pub(crate) flags: ObjectFlags,
    pub(crate) layer: LayerId,
    pub(crate) parent: Option<ObjectId>,
    pub(crate) children: Vec<ObjectId>,
    pub(crate) linked_to: Option<ObjectId>,
    pub(crate) linked: Vec<ObjectId>,
    pub(crate) local: Transform,
    pub(crate) id_in_prefab: Option<ObjectId>,
    pub(crate) world: Cell<Option<Matrix4<f32>>>,
}

impl SceneObject {
    pub(crate) fn new(id: ObjectId, name: String, kind: ObjectKind, layer: LayerId) -> Self {
        SceneObject {
            id,
            name,
            kind,
            flags: ObjectFlags::empty(),
            layer,
            parent: None,
            children: Vec::new(),
            linked_to: None,
            linked: Vec::new(),
            local: Transform::default(),
            id_in_prefab: None,
            world: Cell::new(None),
        }
    }

    /// Object id.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Kind.
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// State bits.
    pub fn flags(&self) -> ObjectFlags {
        self.flags
    }

    /// Shortcut for `flags().contains(ObjectFlags::PREFAB_MEMBER)`.
    pub fn is_prefab_member(&self) -> bool {
        self.flags.contains(ObjectFlags::PREFAB_MEMBER)
    }

    /// The layer the object lives on.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// Hierarchical parent.
    pub fn parent(&self) -> Option<ObjectId> {
        self.parent
    }

    /// Hierarchical children, in attach order.
    pub fn children(&self) -> &[ObjectId] {
        &self.children
    }

    /// The object this one is linked to.
    pub fn linked_to(&self) -> Option<ObjectId> {
        self.linked_to
    }

    /// Objects linked to this one, in link order.
    pub fn linked(&self) -> &[ObjectId] {
        &self.linked
    }

    /// Transform relative to the reference frame.
    pub fn local_transform(&self) -> &Transform {
        &self.local
    }

    /// The template node this object was expanded from, for prefab members.
    pub fn id_in_prefab(&self) -> Option<ObjectId> {
        self.id_in_prefab
    }

    /// The object whose world matrix this one is relative to: the link target, else the parent.
    pub fn frame(&self) -> Option<ObjectId> {
        self.linked_to.or(self.parent)
    }
}
