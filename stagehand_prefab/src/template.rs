//! Templates: the stored definition of a prefab.

use std::fmt;

use log::debug;
use serde::{Deserialize, Serialize};
use stagehand_core::{Aabb, ObjectId, ObjectKind, Scene, Transform};
use uuid::Uuid;

use crate::sync::{ChangeKind, ChangeRecord};

/// Stable identifier of a template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub Uuid);

impl TemplateId {
    /// A fresh random id.
    pub fn random() -> Self {
        TemplateId(Uuid::new_v4())
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0.hyphenated(), f)
    }
}

/// The kind of object a node becomes when expanded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// See [`ObjectKind::Empty`].
    Empty,
    /// See [`ObjectKind::Group`].
    Group,
    /// See [`ObjectKind::Geometry`].
    Geometry {
        /// Bounds in the node's own space.
        bounds: Aabb,
    },
    /// An instance of another template.
    Prefab {
        /// The nested template.
        template: TemplateId,
    },
}

impl NodeKind {
    /// The scene object kind created for this node.
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            NodeKind::Empty => ObjectKind::Empty,
            NodeKind::Group => ObjectKind::Group,
            NodeKind::Geometry { bounds } => ObjectKind::Geometry { bounds: *bounds },
            NodeKind::Prefab { .. } => ObjectKind::Prefab,
        }
    }

    fn from_object(kind: &ObjectKind, nested: Option<TemplateId>) -> Self {
        match (kind, nested) {
            (_, Some(template)) => NodeKind::Prefab { template },
            (ObjectKind::Geometry { bounds }, None) => NodeKind::Geometry { bounds: *bounds },
            (ObjectKind::Group, None) => NodeKind::Group,
            (ObjectKind::Empty, None) | (ObjectKind::Prefab, None) => NodeKind::Empty,
        }
    }
}

/// One object of a template graph.
///
/// `parent` and `linked_to` refer to other nodes of the same document by `id`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemplateNode {
    /// Template-local id. Nodes without one get an allocated id on every expansion.
    #[serde(default)]
    pub id: Option<ObjectId>,
    /// Display name.
    pub name: String,
    /// Parent node.
    #[serde(default)]
    pub parent: Option<ObjectId>,
    /// Link target node.
    #[serde(default)]
    pub linked_to: Option<ObjectId>,
    /// Transform relative to the parent, the link target, or the instance root.
    #[serde(default)]
    pub transform: Transform,
    /// Kind-specific payload.
    pub kind: NodeKind,
}

impl TemplateNode {
    /// A node without relations at the identity transform.
    pub fn new<N: Into<String>>(id: ObjectId, name: N, kind: NodeKind) -> Self {
        TemplateNode {
            id: Some(id),
            name: name.into(),
            parent: None,
            linked_to: None,
            transform: Transform::default(),
            kind,
        }
    }

    /// Builder-style parent setter.
    pub fn with_parent(mut self, parent: ObjectId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Builder-style link setter.
    pub fn with_link(mut self, target: ObjectId) -> Self {
        self.linked_to = Some(target);
        self
    }

    /// Builder-style transform setter.
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }
}

/// The serialized object graph of a template.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateDocument {
    /// Nodes in serialization order.
    pub objects: Vec<TemplateNode>,
}

impl TemplateDocument {
    /// Looks up a node by template-local id.
    pub fn node(&self, id: ObjectId) -> Option<&TemplateNode> {
        self.objects.iter().find(|n| n.id == Some(id))
    }

    fn node_mut(&mut self, id: ObjectId) -> Option<&mut TemplateNode> {
        self.objects.iter_mut().find(|n| n.id == Some(id))
    }

    fn upsert(&mut self, node: TemplateNode) {
        let existing = node.id.and_then(|id| self.objects.iter().position(|n| n.id == Some(id)));
        match existing {
            Some(i) => self.objects[i] = node,
            None => self.objects.push(node),
        }
    }

    /// Templates referenced by nested prefab nodes.
    pub fn nested_templates(&self) -> impl Iterator<Item = TemplateId> + '_ {
        self.objects.iter().filter_map(|n| match n.kind {
            NodeKind::Prefab { template } => Some(template),
            _ => None,
        })
    }
}

/// A named, reusable object graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Template {
    id: TemplateId,
    name: String,
    #[serde(default)]
    document: Option<TemplateDocument>,
    #[serde(skip)]
    modified: bool,
}

impl Template {
    /// A template with no object graph yet.
    pub fn new<N: Into<String>>(id: TemplateId, name: N) -> Self {
        Template {
            id,
            name: name.into(),
            document: None,
            modified: false,
        }
    }

    /// A template holding `document`.
    pub fn with_document<N: Into<String>>(id: TemplateId, name: N, document: TemplateDocument) -> Self {
        Template {
            document: Some(document),
            ..Template::new(id, name)
        }
    }

    /// Template id.
    pub fn id(&self) -> TemplateId {
        self.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
        self.modified = true;
    }

    /// The object graph, `None` if the template has none.
    pub fn graph_document(&self) -> Option<&TemplateDocument> {
        self.document.as_ref()
    }

    /// `true` if the template changed since it was last saved.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn set_modified(&mut self, modified: bool) {
        self.modified = modified;
    }

    /// Writes one instance-side change into the object graph.
    ///
    /// `Add` serializes the object and every prefab member reachable from it, stopping at nested
    /// instances, which become `Prefab` nodes. `Delete` removes only the object's own node, so
    /// nodes parented to it lose their parent on the next expansion. The transform kinds copy
    /// the object's current local transform. `nested` tells which objects are prefab instances
    /// and of what template.
    ///
    /// Returns `false` if the graph was left unchanged.
    pub fn update_from_instance(
        &mut self,
        scene: &Scene,
        instance: ObjectId,
        change: &ChangeRecord,
        nested: &dyn Fn(ObjectId) -> Option<TemplateId>,
    ) -> bool {
        let changed = match change.kind {
            ChangeKind::Add => {
                let nodes = serialize_subtree(scene, instance, change.object, nested);
                let document = self.document.get_or_insert_with(TemplateDocument::default);
                let changed = !nodes.is_empty();
                for node in nodes {
                    document.upsert(node);
                }
                changed
            }
            ChangeKind::Delete => match (self.document.as_mut(), change.id_in_template) {
                (Some(document), Some(id)) => {
                    let before = document.objects.len();
                    document.objects.retain(|n| n.id != Some(id));
                    document.objects.len() != before
                }
                _ => false,
            },
            ChangeKind::ModifyTransform | ChangeKind::ModifyTransformInLibOnly => {
                let transform = scene.object(change.object).map(|o| o.local_transform().clone());
                let node = match (self.document.as_mut(), change.id_in_template) {
                    (Some(document), Some(id)) => document.node_mut(id),
                    _ => None,
                };
                match (node, transform) {
                    (Some(node), Some(transform)) => {
                        node.transform = transform;
                        true
                    }
                    _ => false,
                }
            }
        };

        if changed {
            self.modified = true;
        } else {
            debug!(
                "{:?} of {} left template '{}' unchanged",
                change.kind, change.object, self.name
            );
        }
        changed
    }
}

fn member_node_id(scene: &Scene, instance: ObjectId, id: Option<ObjectId>) -> Option<ObjectId> {
    let object = scene.object(id?)?;
    if object.id() == instance || !object.is_prefab_member() {
        return None;
    }
    object.id_in_prefab()
}

fn serialize_subtree(
    scene: &Scene,
    instance: ObjectId,
    root: ObjectId,
    nested: &dyn Fn(ObjectId) -> Option<TemplateId>,
) -> Vec<TemplateNode> {
    let mut nodes = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        let object = match scene.object(id) {
            Some(object) if object.is_prefab_member() => object,
            _ => continue,
        };
        let nested_template = nested(id);
        nodes.push(TemplateNode {
            id: object.id_in_prefab(),
            name: object.name().to_owned(),
            parent: member_node_id(scene, instance, object.parent()),
            linked_to: member_node_id(scene, instance, object.linked_to()),
            transform: object.local_transform().clone(),
            kind: NodeKind::from_object(object.kind(), nested_template),
        });
        if nested_template.is_none() {
            stack.extend(object.linked().iter().rev().copied());
            stack.extend(object.children().iter().rev().copied());
        }
    }
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use stagehand_core::{ObjectFlags, ObjectKind};

    fn id(n: u64) -> ObjectId {
        ObjectId::from_parts(0, n)
    }

    fn member(scene: &mut Scene, n: u64, node: u64, parent: ObjectId) -> ObjectId {
        scene.create(id(n), format!("m{}", n), ObjectKind::Group).unwrap();
        scene.attach(id(n), parent, false).unwrap();
        scene.insert_flags(id(n), ObjectFlags::PREFAB_MEMBER).unwrap();
        scene.set_id_in_prefab(id(n), Some(id(node))).unwrap();
        id(n)
    }

    #[test]
    fn add_writes_subtree_with_local_parents() {
        let mut scene = Scene::new();
        let instance = id(100);
        scene.create(instance, "instance", ObjectKind::Prefab).unwrap();
        let a = member(&mut scene, 1, 11, instance);
        member(&mut scene, 2, 12, a);

        let mut template = Template::new(TemplateId::random(), "crate");
        assert!(template.update_from_instance(
            &scene,
            instance,
            &ChangeRecord::new(ChangeKind::Add, a, Some(id(11))),
            &|_| None,
        ));

        let document = template.graph_document().unwrap();
        assert_eq!(document.objects.len(), 2);
        assert_eq!(document.node(id(11)).unwrap().parent, None);
        assert_eq!(document.node(id(12)).unwrap().parent, Some(id(11)));
        assert!(template.is_modified());
    }

    #[test]
    fn delete_removes_only_that_node() {
        let doc = TemplateDocument {
            objects: vec![
                TemplateNode::new(id(1), "A", NodeKind::Group),
                TemplateNode::new(id(2), "B", NodeKind::Empty).with_parent(id(1)),
            ],
        };
        let mut template = Template::with_document(TemplateId::random(), "t", doc);
        let scene = Scene::new();
        template.update_from_instance(
            &scene,
            id(100),
            &ChangeRecord::new(ChangeKind::Delete, id(50), Some(id(1))),
            &|_| None,
        );
        let document = template.graph_document().unwrap();
        assert_eq!(document.objects.len(), 1);
        assert_eq!(document.objects[0].parent, Some(id(1)));
    }

    #[test]
    fn nested_instances_become_prefab_nodes() {
        let mut scene = Scene::new();
        let instance = id(100);
        scene.create(instance, "instance", ObjectKind::Prefab).unwrap();
        scene.create(id(1), "inner", ObjectKind::Prefab).unwrap();
        scene.attach(id(1), instance, false).unwrap();
        scene.insert_flags(id(1), ObjectFlags::PREFAB_MEMBER).unwrap();
        scene.set_id_in_prefab(id(1), Some(id(11))).unwrap();
        member(&mut scene, 2, 12, id(1));

        let inner_template = TemplateId::random();
        let mut template = Template::new(TemplateId::random(), "outer");
        template.update_from_instance(
            &scene,
            instance,
            &ChangeRecord::new(ChangeKind::Add, id(1), Some(id(11))),
            &|o| if o == id(1) { Some(inner_template) } else { None },
        );
        let document = template.graph_document().unwrap();
        assert_eq!(document.objects.len(), 1);
        assert_eq!(
            document.objects[0].kind,
            NodeKind::Prefab {
                template: inner_template
            }
        );
    }
}
