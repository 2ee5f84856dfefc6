use log::warn;
use stagehand_core::{nalgebra::Point3, Aabb, ObjectId, SceneError};

use super::{undo_records::ChangePivotRecord, Level};
use crate::{
    bounds::compute_bounds,
    error::PrefabError,
    sync::{ChangeKind, ChangeRecord},
};

impl Level {
    /// Moves the origin of `instance` to the world point `pivot` without moving its members.
    ///
    /// The template is rewritten so that every other instance of it moves its origin by the
    /// same local offset, their members staying in place too.
    pub fn set_pivot(&mut self, instance: ObjectId, pivot: Point3<f32>) -> Result<(), PrefabError> {
        if !self.is_instance(instance) {
            return Err(PrefabError::NotAnInstance(instance));
        }
        let before = self.scene.world_position(instance)?;
        self.transaction("Change Pivot", |level| {
            level.record(ChangePivotRecord::new(instance, before, pivot));
            level.apply_pivot(instance, pivot)
        })
    }

    pub(crate) fn apply_pivot(&mut self, instance: ObjectId, pivot: Point3<f32>) -> Result<(), PrefabError> {
        let world = self.scene.world_matrix(instance)?;
        let pivot_local = match world.try_inverse() {
            Some(to_local) => to_local.transform_point(&pivot),
            None => {
                warn!("{} has a singular transform, using the pivot as given", instance);
                pivot
            }
        };

        self.move_origin(instance, pivot)?;
        for member in self.direct_members(instance) {
            let node = self.scene.object(member).and_then(|o| o.id_in_prefab());
            self.sync_change(
                instance,
                ChangeRecord::new(ChangeKind::ModifyTransformInLibOnly, member, node),
            )?;
        }

        let template = self.instances.get(&instance).and_then(|i| i.template);
        if let Some(template) = template {
            for other in self.instances_of(template) {
                if other == instance {
                    continue;
                }
                let p = self.scene.world_matrix(other)?.transform_point(&pivot_local);
                self.move_origin(other, p)?;
                self.invalidate_bounds_upward(other);
            }
        }
        self.invalidate_bounds_upward(instance);
        Ok(())
    }

    /// Moves `object` to `pivot`, keeping the world transforms of its children and linked
    /// objects.
    fn move_origin(&mut self, object: ObjectId, pivot: Point3<f32>) -> Result<(), SceneError> {
        let (children, linked) = {
            let o = self
                .scene
                .object(object)
                .ok_or(SceneError::UnknownObject(object))?;
            (o.children().to_vec(), o.linked().to_vec())
        };
        let mut saved = Vec::with_capacity(children.len() + linked.len());
        for follower in children.into_iter().chain(linked) {
            saved.push((follower, self.scene.world_matrix(follower)?));
        }
        self.scene.set_world_position(object, pivot)?;
        for (follower, world) in saved {
            self.scene.set_world_matrix(follower, &world)?;
        }
        Ok(())
    }

    /// Switches whether moving `instance` moves its pivot instead.
    pub fn set_pivot_mode(&mut self, instance: ObjectId, enabled: bool) -> Result<(), PrefabError> {
        self.instance_mut(instance)?.pivot_mode = enabled;
        Ok(())
    }

    /// Moves `instance` in the world, or its pivot when pivot mode is on.
    pub fn set_instance_position(&mut self, instance: ObjectId, position: Point3<f32>) -> Result<(), PrefabError> {
        let pivot_mode = self
            .instances
            .get(&instance)
            .ok_or(PrefabError::NotAnInstance(instance))?
            .pivot_mode;
        if pivot_mode {
            self.set_pivot(instance, position)
        } else {
            self.scene.set_world_position(instance, position)?;
            Ok(())
        }
    }

    /// Bounds of `instance` in its own space. Cached until a member changes.
    pub fn bounds(&self, instance: ObjectId) -> Result<Aabb, PrefabError> {
        let inst = self
            .instances
            .get(&instance)
            .ok_or(PrefabError::NotAnInstance(instance))?;
        if let Some(bounds) = inst.bounds.get() {
            return Ok(bounds);
        }
        let bounds = compute_bounds(&self.scene, instance)?;
        inst.bounds.set(Some(bounds));
        Ok(bounds)
    }

    /// Bounds of `instance` in world space.
    pub fn world_bounds(&self, instance: ObjectId) -> Result<Aabb, PrefabError> {
        let local = self.bounds(instance)?;
        Ok(local.transformed(&self.scene.world_matrix(instance)?))
    }
}
