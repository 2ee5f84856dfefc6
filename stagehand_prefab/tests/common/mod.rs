#![allow(dead_code)]

use stagehand_core::{
    nalgebra::{Point3, Vector3},
    Aabb, ObjectId, ObjectKind, Transform,
};
use stagehand_prefab::{
    Level, NodeKind, PrefabConfig, PrefabError, Template, TemplateDocument, TemplateId, TemplateNode,
};

/// Template-local id `n`.
pub fn local(n: u64) -> ObjectId {
    ObjectId::from_parts(0x7e57, n)
}

pub fn at(x: f32, y: f32, z: f32) -> Transform {
    Transform::from_translation(Vector3::new(x, y, z))
}

pub fn half_box() -> Aabb {
    Aabb::new(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5))
}

pub fn level() -> Level {
    Level::new(PrefabConfig::default())
}

/// Inserts a template with the nodes `A` at (1, 0, 0) and `B` at (0, 2, 0) below `A`.
pub fn chain_template(level: &mut Level) -> TemplateId {
    let id = TemplateId::random();
    let document = TemplateDocument {
        objects: vec![
            TemplateNode::new(local(1), "A", NodeKind::Geometry { bounds: half_box() })
                .with_transform(at(1.0, 0.0, 0.0)),
            TemplateNode::new(local(2), "B", NodeKind::Geometry { bounds: half_box() })
                .with_parent(local(1))
                .with_transform(at(0.0, 2.0, 0.0)),
        ],
    };
    level
        .library_mut()
        .insert(Template::with_document(id, "Chain", document));
    id
}

/// Inserts a template holding a single nested instance of `inner`.
pub fn wrapper_template(level: &mut Level, inner: TemplateId) -> TemplateId {
    let id = TemplateId::random();
    let document = TemplateDocument {
        objects: vec![TemplateNode::new(local(10), "Inner", NodeKind::Prefab { template: inner })
            .with_transform(at(0.0, 0.0, 3.0))],
    };
    level
        .library_mut()
        .insert(Template::with_document(id, "Wrapper", document));
    id
}

/// Places an instance of `template` with its origin at `position`.
pub fn place(level: &mut Level, template: TemplateId, position: [f32; 3]) -> ObjectId {
    let instance = level.instantiate(template).unwrap();
    level
        .scene_mut()
        .set_world_position(instance, Point3::new(position[0], position[1], position[2]))
        .unwrap();
    instance
}

/// Creates a plain geometry object at a world position.
pub fn plain_box(level: &mut Level, name: &str, position: [f32; 3]) -> ObjectId {
    let id = level.allocate_id();
    level
        .scene_mut()
        .create(id, name, ObjectKind::Geometry { bounds: half_box() })
        .unwrap();
    level
        .scene_mut()
        .set_local_transform(id, at(position[0], position[1], position[2]))
        .unwrap();
    id
}

/// The live object expanded from template node `node` of `instance`.
pub fn member(instance: ObjectId, node: ObjectId) -> ObjectId {
    stagehand_prefab::guid::remap(instance, node)
}

pub fn world(level: &Level, object: ObjectId) -> Point3<f32> {
    level.scene().world_position(object).unwrap()
}

pub fn node_translation(level: &Level, template: TemplateId, node: ObjectId) -> Vector3<f32> {
    level
        .library()
        .template(template)
        .and_then(|t| t.graph_document())
        .and_then(|d| d.node(node))
        .map(|n| *n.transform.translation())
        .unwrap()
}

pub fn has_warning(level: &Level, pred: impl Fn(&PrefabError) -> bool) -> bool {
    level.warnings().iter().any(pred)
}
