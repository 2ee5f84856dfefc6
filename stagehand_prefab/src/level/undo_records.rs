//! Undo records of prefab operations.
//!
//! Records run with undo recording suspended, so re-applying an operation never records again.

use derive_new::new;
use log::error;
use stagehand_core::{
    nalgebra::{Matrix4, Point3},
    LayerId, ObjectFlags, ObjectId, ObjectKind, UndoRecord,
};

use super::Level;
use crate::template::TemplateId;

/// One object moved to a new id when it joined an instance.
#[derive(Debug, new)]
pub(crate) struct ChangeGuidsRecord {
    old: ObjectId,
    new: ObjectId,
}

impl UndoRecord<Level> for ChangeGuidsRecord {
    fn description(&self) -> &str {
        "Change GUIDs"
    }

    fn undo(&mut self, level: &mut Level) {
        if let Err(e) = level.rename_object(self.new, self.old) {
            error!("Failed to restore id {}: {}", self.old, e);
        }
    }

    fn redo(&mut self, level: &mut Level) {
        if let Err(e) = level.rename_object(self.old, self.new) {
            error!("Failed to reassign id {}: {}", self.new, e);
        }
    }
}

/// An instance was bound to another template.
#[derive(Debug, new)]
pub(crate) struct SetTemplateRecord {
    instance: ObjectId,
    before: Option<TemplateId>,
    after: Option<TemplateId>,
}

impl UndoRecord<Level> for SetTemplateRecord {
    fn description(&self) -> &str {
        "Set Prefab"
    }

    fn undo(&mut self, level: &mut Level) {
        level.bind_template(self.instance, self.before);
    }

    fn redo(&mut self, level: &mut Level) {
        level.bind_template(self.instance, self.after);
    }
}

/// The pivot of an instance moved from one world point to another.
#[derive(Debug, new)]
pub(crate) struct ChangePivotRecord {
    instance: ObjectId,
    before: Point3<f32>,
    after: Point3<f32>,
}

impl UndoRecord<Level> for ChangePivotRecord {
    fn description(&self) -> &str {
        "Change Pivot"
    }

    fn undo(&mut self, level: &mut Level) {
        if let Err(e) = level.apply_pivot(self.instance, self.before) {
            error!("Failed to restore pivot of {}: {}", self.instance, e);
        }
    }

    fn redo(&mut self, level: &mut Level) {
        if let Err(e) = level.apply_pivot(self.instance, self.after) {
            error!("Failed to reapply pivot of {}: {}", self.instance, e);
        }
    }
}

/// A new instance was made from loose objects.
///
/// Undo dissolves the instance and hands its members to the instance's parent in place. The
/// template stays in the library.
#[derive(Debug)]
pub(crate) struct CreateInstanceRecord {
    instance: ObjectId,
    name: String,
    template: Option<TemplateId>,
    world: Matrix4<f32>,
    layer: LayerId,
    parent: Option<ObjectId>,
    members: Vec<ObjectId>,
    tagged: Vec<(ObjectId, Option<ObjectId>)>,
}

impl CreateInstanceRecord {
    pub(crate) fn capture(level: &Level, instance: ObjectId) -> Self {
        let scene = level.scene();
        let object = scene.object(instance);
        let members = level.direct_members(instance);
        let tagged = members
            .iter()
            .flat_map(|m| level.subtree_until_instances(*m))
            .map(|id| (id, scene.object(id).and_then(|o| o.id_in_prefab())))
            .collect();
        CreateInstanceRecord {
            instance,
            name: object.map(|o| o.name().to_owned()).unwrap_or_default(),
            template: level.instance(instance).and_then(|i| i.template()),
            world: scene.world_matrix(instance).unwrap_or_else(|_| Matrix4::identity()),
            layer: object.map(|o| o.layer()).unwrap_or_default(),
            parent: object.and_then(|o| o.parent()),
            members,
            tagged,
        }
    }
}

impl UndoRecord<Level> for CreateInstanceRecord {
    fn description(&self) -> &str {
        "Create Prefab"
    }

    fn undo(&mut self, level: &mut Level) {
        for &member in &self.members {
            let linked = level.scene.object(member).and_then(|o| o.linked_to()).is_some();
            let result = if linked {
                level.scene.unlink(member, true)
            } else {
                Ok(())
            }
            .and_then(|_| match self.parent {
                Some(parent) => level.scene.attach(member, parent, true),
                None => level.scene.detach(member, true),
            });
            if let Err(e) = result {
                error!("Failed to release {} from {}: {}", member, self.instance, e);
            }
        }
        let tagged: Vec<ObjectId> = self.tagged.iter().map(|(id, _)| *id).collect();
        level.set_member_flags(&tagged, false);
        match level.scene.delete(self.instance) {
            Ok(deleted) => level.forget_instances(&deleted),
            Err(e) => error!("Failed to remove instance {}: {}", self.instance, e),
        }
    }

    fn redo(&mut self, level: &mut Level) {
        if let Err(e) = level
            .scene
            .create(self.instance, self.name.clone(), ObjectKind::Prefab)
            .and_then(|_| level.scene.set_world_matrix(self.instance, &self.world))
            .and_then(|_| level.scene.set_layer(self.instance, self.layer))
            .and_then(|_| match self.parent {
                Some(parent) => level.scene.attach(self.instance, parent, true),
                None => Ok(()),
            })
        {
            error!("Failed to recreate instance {}: {}", self.instance, e);
            return;
        }
        level.register_instance(self.instance);
        if let Some(template) = self.template {
            let subscription = level.library.subscribe(template);
            if let Some(inst) = level.instances.get_mut(&self.instance) {
                inst.template = Some(template);
                inst.subscription = Some(subscription);
            }
        }
        for &member in &self.members {
            if let Err(e) = level.scene.attach(member, self.instance, true) {
                error!("Failed to return {} to {}: {}", member, self.instance, e);
            }
        }
        for &(id, node) in &self.tagged {
            let result = level
                .scene
                .insert_flags(id, ObjectFlags::PREFAB_MEMBER)
                .and_then(|_| level.scene.set_id_in_prefab(id, node));
            if let Err(e) = result {
                error!("Failed to retag {}: {}", id, e);
            }
        }
    }
}
