//! Expansion of a template graph into live scene objects.

use fnv::FnvHashMap;
use log::warn;
use stagehand_core::{IdAllocator, LayerId, ObjectFlags, ObjectId, Scene, SceneError};

use crate::{
    error::PrefabError,
    guid,
    template::{NodeKind, Template, TemplateId},
};

/// How the ids of expanded objects are chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdPolicy {
    /// Members of `instance`: node ids are remapped into the instance's id space, nodes without
    /// an id draw from a sequence forced from the instance id. Objects are tagged as members
    /// and attached under the instance.
    Remap {
        /// The instance being expanded.
        instance: ObjectId,
    },
    /// Plain objects with fresh ids, left parentless at their template transforms.
    Fresh,
}

/// The result of one expansion.
#[derive(Debug, Default)]
pub struct Expansion {
    /// Every created object, in node order.
    pub objects: Vec<ObjectId>,
    /// Created objects that have neither a parent nor a link target in the graph.
    pub roots: Vec<ObjectId>,
    /// Created objects that are instances of another template.
    pub nested: Vec<(ObjectId, TemplateId)>,
    /// Recovered problems.
    pub warnings: Vec<PrefabError>,
}

impl Expansion {
    fn warn(&mut self, error: PrefabError) {
        warn!("{}", error);
        self.warnings.push(error);
    }
}

/// Expands `template` into `scene`.
///
/// Objects are created on the current layer, then moved to `layer` once the graph is complete.
/// Missing references are dropped with a warning. Fails only when the template has no graph.
pub fn expand(
    scene: &mut Scene,
    ids: &mut IdAllocator,
    template: &Template,
    policy: IdPolicy,
    layer: LayerId,
) -> Result<Expansion, PrefabError> {
    let document = template
        .graph_document()
        .ok_or_else(|| PrefabError::EmptyTemplateGraph(template.id()))?;

    let mut forced;
    let ids: &mut IdAllocator = match policy {
        IdPolicy::Remap { instance } => {
            forced = ids.force(guid::forced_base(instance));
            &mut *forced
        }
        IdPolicy::Fresh => ids,
    };

    let mut out = Expansion::default();
    let mut local_to_live: FnvHashMap<ObjectId, ObjectId> = FnvHashMap::default();

    for node in &document.objects {
        let wanted = match (policy, node.id) {
            (IdPolicy::Remap { instance }, Some(local)) => guid::remap(instance, local),
            _ => ids.allocate(),
        };
        let id = if scene.contains(wanted) {
            let replacement = ids.allocate();
            out.warn(SceneError::DuplicateId(wanted).into());
            replacement
        } else {
            wanted
        };

        scene.create(id, node.name.clone(), node.kind.object_kind())?;
        scene.set_local_transform(id, node.transform.clone())?;
        if let IdPolicy::Remap { .. } = policy {
            scene.set_id_in_prefab(id, node.id)?;
        }
        if let NodeKind::Prefab { template } = node.kind {
            out.nested.push((id, template));
        }
        if let Some(local) = node.id {
            local_to_live.insert(local, id);
        }
        out.objects.push(id);
    }

    let created = out.objects.clone();
    for (node, &id) in document.objects.iter().zip(&created) {
        let node_id = node.id.unwrap_or(id);
        if let Some(parent) = node.parent {
            match local_to_live.get(&parent) {
                Some(&live) => {
                    if let Err(e) = scene.attach(id, live, false) {
                        out.warn(e.into());
                    }
                }
                None => out.warn(PrefabError::UnresolvedReference {
                    node: node_id,
                    reference: parent,
                }),
            }
        }
        if let Some(target) = node.linked_to {
            match local_to_live.get(&target) {
                Some(&live) => {
                    if let Err(e) = scene.link(id, live, false) {
                        out.warn(e.into());
                    }
                }
                None => out.warn(PrefabError::UnresolvedReference {
                    node: node_id,
                    reference: target,
                }),
            }
        }
    }

    for &id in &out.objects {
        scene.set_layer(id, layer)?;
        if let IdPolicy::Remap { .. } = policy {
            scene.insert_flags(id, ObjectFlags::PREFAB_MEMBER)?;
        }
    }

    out.roots = out
        .objects
        .iter()
        .copied()
        .filter(|id| {
            scene
                .object(*id)
                .map_or(false, |o| o.parent().is_none() && o.linked_to().is_none())
        })
        .collect();

    if let IdPolicy::Remap { instance } = policy {
        for &root in &out.roots {
            scene.attach(root, instance, false)?;
        }
        scene.invalidate_transform(instance);
    }

    Ok(out)
}
