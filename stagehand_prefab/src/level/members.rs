use fnv::FnvHashSet;
use log::{debug, info};
use stagehand_core::{nalgebra::Point3, ObjectFlags, ObjectId, SceneError, Transform};

use super::{undo_records, Level};
use crate::{
    error::PrefabError,
    guid,
    loader::{self, IdPolicy},
    membership::{self, MemberLink, ReconcilePlan},
    recursion,
    sync::{ChangeKind, ChangeRecord},
    template::TemplateId,
};

impl Level {
    /// `object` and everything reachable from it through children and links. Nested instances
    /// are included without their contents.
    pub(crate) fn subtree_until_instances(&self, object: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut seen = FnvHashSet::default();
        let mut stack = vec![object];
        while let Some(id) = stack.pop() {
            let object = match self.scene.object(id) {
                Some(object) if seen.insert(id) => object,
                _ => continue,
            };
            out.push(id);
            if self.is_instance(id) {
                continue;
            }
            stack.extend(object.linked().iter().rev().copied());
            stack.extend(object.children().iter().rev().copied());
        }
        out
    }

    /// Members hanging directly off `instance`, as children or as linked objects.
    pub fn direct_members(&self, instance: ObjectId) -> Vec<ObjectId> {
        let root = match self.scene.object(instance) {
            Some(root) => root,
            None => return Vec::new(),
        };
        root.children()
            .iter()
            .chain(root.linked())
            .copied()
            .filter(|id| self.scene.object(*id).map_or(false, |o| o.is_prefab_member()))
            .collect()
    }

    /// Whether `candidate` may become a member of `instance`.
    pub fn can_add_member(&self, instance: ObjectId, candidate: ObjectId) -> Result<(), PrefabError> {
        if !self.is_instance(instance) {
            return Err(PrefabError::NotAnInstance(instance));
        }
        recursion::check_can_add(&self.scene, &self.instances, &self.library, instance, candidate)
    }

    /// Moves `objects` into `instance`, keeping their world transforms.
    ///
    /// All candidates are validated before anything changes. Each object and its subtree are
    /// tagged as members on the instance's layer and re-identified into the instance's id space,
    /// then pushed into the template as an `Add`.
    pub fn add_members(&mut self, instance: ObjectId, objects: &[ObjectId]) -> Result<(), PrefabError> {
        for &object in objects {
            self.can_add_member(instance, object)?;
        }
        self.transaction("Add Prefab Members", |level| {
            for &object in objects {
                level.add_member(instance, object)?;
            }
            Ok(())
        })
    }

    fn add_member(&mut self, instance: ObjectId, object: ObjectId) -> Result<(), PrefabError> {
        if let Some(previous) = self.owning_instance(object) {
            if previous != instance {
                self.remove_members(previous, &[object], true, false)?;
            }
        }
        self.scene.attach(object, instance, true)?;
        let object = self.assign_member_ids(instance, object)?;

        let node = self.scene.object(object).and_then(|o| o.id_in_prefab());
        self.sync_change(instance, ChangeRecord::new(ChangeKind::Add, object, node))?;
        self.mark_layer_of(object);
        self.invalidate_bounds_upward(instance);
        Ok(())
    }

    /// Tags the subtree of `object` as members of `instance` and moves every id into its id
    /// space. An id is kept only when it already is the remap of its node id, so a later
    /// remake reproduces it. Returns the new id of `object`.
    fn assign_member_ids(&mut self, instance: ObjectId, object: ObjectId) -> Result<ObjectId, PrefabError> {
        let layer = self
            .scene
            .object(instance)
            .map(|o| o.layer())
            .ok_or(PrefabError::NotAnInstance(instance))?;
        let mut renamed = object;
        for id in self.subtree_until_instances(object) {
            self.scene.insert_flags(id, ObjectFlags::PREFAB_MEMBER)?;
            self.scene.set_layer(id, layer)?;
            let node = match self.scene.object(id).and_then(|o| o.id_in_prefab()) {
                Some(node) => node,
                None => {
                    self.scene.set_id_in_prefab(id, Some(id))?;
                    id
                }
            };
            let new = guid::remap(instance, node);
            if new == id {
                continue;
            }
            if self.scene.contains(new) {
                self.warn(SceneError::DuplicateId(new).into());
                continue;
            }
            self.record(undo_records::ChangeGuidsRecord::new(id, new));
            self.rename_object(id, new)?;
            if id == object {
                renamed = new;
            }
        }
        Ok(renamed)
    }

    /// Takes `members` out of their instance.
    ///
    /// Each member is pushed into the template as a `Delete` first. With `place_on_root` the
    /// objects become roots of the scene, otherwise they move to the instance's parent. World
    /// transforms survive when `keep_pos` is set.
    pub fn remove_members(
        &mut self,
        instance: ObjectId,
        members: &[ObjectId],
        keep_pos: bool,
        place_on_root: bool,
    ) -> Result<(), PrefabError> {
        if !self.is_instance(instance) {
            return Err(PrefabError::NotAnInstance(instance));
        }
        self.transaction("Remove Prefab Members", |level| {
            for &member in members {
                let node = level.scene.object(member).and_then(|o| o.id_in_prefab());
                level.sync_change(instance, ChangeRecord::new(ChangeKind::Delete, member, node))?;
                let subtree = level.subtree_until_instances(member);
                level.set_member_flags(&subtree, false);
                level.mark_layer_of(member);
            }

            let outer = level.scene.object(instance).and_then(|o| o.parent());
            for &member in members {
                let frame = level.scene.object(member).and_then(|o| o.frame());
                if frame != Some(instance) {
                    continue;
                }
                if level.scene.object(member).and_then(|o| o.linked_to()) == Some(instance) {
                    level.scene.unlink(member, keep_pos)?;
                }
                match outer {
                    Some(outer) if !place_on_root => level.scene.attach(member, outer, keep_pos)?,
                    _ => {
                        if level.scene.object(member).and_then(|o| o.parent()).is_some() {
                            level.scene.detach(member, keep_pos)?;
                        }
                    }
                }
            }
            level.invalidate_bounds_upward(instance);
            Ok(())
        })
    }

    /// Brings the members of `instance` in line with `desired`, matching by id.
    ///
    /// Every attach is validated before anything changes. Attaches run first, then removals.
    /// Returns the executed plan.
    pub fn apply_member_links(
        &mut self,
        instance: ObjectId,
        desired: &[MemberLink],
    ) -> Result<ReconcilePlan, PrefabError> {
        let current = self.direct_members(instance);
        let plan = membership::reconcile(&current, desired);
        if plan.is_empty() {
            return Ok(plan);
        }
        debug!(
            "Reconciling {}: {} to attach, {} to remove",
            instance,
            plan.attach.len(),
            plan.remove.len()
        );
        for &object in &plan.attach {
            if self.needs_attach(instance, object) {
                self.can_add_member(instance, object)?;
            }
        }
        self.transaction("Modify Prefab", |level| {
            for &object in &plan.attach {
                // An earlier attach may already have carried this object along.
                if level.needs_attach(instance, object) {
                    level.add_member(instance, object)?;
                }
            }
            if !plan.remove.is_empty() {
                level.remove_members(instance, &plan.remove, true, false)?;
            }
            Ok(())
        })?;
        Ok(plan)
    }

    fn needs_attach(&self, instance: ObjectId, object: ObjectId) -> bool {
        self.scene
            .object(object)
            .map_or(false, |o| !(o.frame() == Some(instance) && o.is_prefab_member()))
    }

    /// Turns `objects` into a new template and replaces them with an instance of it.
    ///
    /// The instance is placed at the center of the objects' bounds when `center` is set, at the
    /// first object's position otherwise. Objects may come from at most one template.
    pub fn create_from_objects<N: Into<String>>(
        &mut self,
        objects: &[ObjectId],
        name: N,
        center: bool,
    ) -> Result<(ObjectId, TemplateId), PrefabError> {
        let mut source_template = None;
        for &object in objects {
            let template = self
                .owning_instance(object)
                .and_then(|i| self.instances.get(&i))
                .and_then(|i| i.template);
            match (source_template, template) {
                (Some(a), Some(b)) if a != b => return Err(PrefabError::MixedTemplates),
                (None, Some(b)) => source_template = Some(b),
                _ => {}
            }
        }

        let position = self.placement(objects, center)?;
        let (layer, parent) = match objects.last().and_then(|o| self.scene.object(*o)) {
            Some(last) => (last.layer(), last.parent()),
            None => (self.scene.current_layer(), None),
        };
        let parent = parent.filter(|p| {
            !self.is_instance(*p) && self.scene.object(*p).map_or(false, |o| !o.is_prefab_member())
        });
        let name = name.into();
        let template = self.library.create(name.clone());
        let instance = self.ids.allocate();
        info!("Creating prefab '{}' from {} object(s)", name, objects.len());

        self.transaction("Create Prefab", |level| {
            level.scene.create(instance, name.clone(), stagehand_core::ObjectKind::Prefab)?;
            level
                .scene
                .set_local_transform(instance, Transform::from_translation(position.coords))?;
            level.scene.set_layer(instance, layer)?;
            if let Some(parent) = parent {
                level.scene.attach(instance, parent, true)?;
            }
            level.register_instance(instance);
            level.without_undo(|level| level.bind_template(instance, Some(template)));
            level.add_members(instance, objects)?;
            let record = undo_records::CreateInstanceRecord::capture(level, instance);
            level.record(record);
            level.scene.clear_selection();
            level.scene.select(instance);
            Ok((instance, template))
        })
    }

    fn placement(&self, objects: &[ObjectId], center: bool) -> Result<Point3<f32>, PrefabError> {
        let first = match objects.first() {
            Some(first) => *first,
            None => return Ok(Point3::origin()),
        };
        if !center {
            return Ok(self.scene.world_position(first)?);
        }
        let mut bounds = stagehand_core::Aabb::empty();
        for &object in objects {
            bounds.add_point(&self.scene.world_position(object)?);
        }
        let mut c = bounds.center();
        c.x = self.config.snap(c.x);
        c.y = self.config.snap(c.y);
        c.z = self.config.snap(c.z);
        Ok(c)
    }

    /// Expands a standalone copy of the template of `instance` as plain objects at the
    /// instance's place. Returns the copies in template order.
    pub fn clone_all(&mut self, instance: ObjectId) -> Result<Vec<ObjectId>, PrefabError> {
        let template_id = self
            .ensure_template(instance)
            .ok_or(PrefabError::NotAnInstance(instance))?;
        let layer = self
            .scene
            .object(instance)
            .map(|o| o.layer())
            .ok_or(PrefabError::NotAnInstance(instance))?;
        let instance_world = self.scene.world_matrix(instance)?;

        let expansion = match self.library.template(template_id) {
            Some(template) => loader::expand(&mut self.scene, &mut self.ids, template, IdPolicy::Fresh, layer)?,
            None => return Err(PrefabError::TemplateNotFound(template_id)),
        };
        for warning in expansion.warnings {
            self.warnings.push(warning);
        }
        for &root in &expansion.roots {
            let local = self.scene.object(root).map(|o| o.local_transform().matrix());
            if let Some(local) = local {
                self.scene.set_world_matrix(root, &(instance_world * local))?;
            }
        }
        for (nested, nested_template) in expansion.nested {
            self.register_instance(nested);
            self.without_undo(|level| level.bind_template(nested, Some(nested_template)));
        }
        Ok(expansion.objects)
    }
}
