//! The editing session: a scene, its prefab instances and the template library they use.
//!
//! Every prefab operation goes through [`Level`]. Operations that must be undoable open an undo
//! transaction of their own, which joins the caller's transaction if one is open. Recovered
//! problems are logged and kept as diagnostics, see [`Level::warnings`].

use fnv::{FnvHashMap, FnvHashSet};
use log::{debug, warn};
use stagehand_core::{IdAllocator, ObjectFlags, ObjectId, ObjectKind, Scene, UndoLog, UndoRecord};

use crate::{
    config::PrefabConfig,
    error::PrefabError,
    instance::PrefabInstance,
    library::PrefabLibrary,
    loader::{self, IdPolicy},
    recursion,
    sync::{ChangeKind, ChangeRecord},
    template::TemplateId,
};

pub use self::persist::{LevelDocument, ObjectRecord};

mod members;
mod persist;
mod pivot;
mod propagation;
mod undo_records;

/// A scene together with the prefab machinery that keeps its instances in step with templates.
#[derive(Debug)]
pub struct Level {
    scene: Scene,
    ids: IdAllocator,
    library: PrefabLibrary,
    undo: UndoLog<Level>,
    instances: FnvHashMap<ObjectId, PrefabInstance>,
    config: PrefabConfig,
    warnings: Vec<PrefabError>,
    dirty: FnvHashMap<TemplateId, FnvHashSet<ObjectId>>,
}

impl Level {
    /// An empty level using a library built from `config`.
    pub fn new(config: PrefabConfig) -> Self {
        let library = PrefabLibrary::from_config(&config);
        Level::with_library(config, library)
    }

    /// An empty level using `library`.
    pub fn with_library(config: PrefabConfig, library: PrefabLibrary) -> Self {
        Level {
            scene: Scene::new(),
            ids: IdAllocator::new(),
            library,
            undo: UndoLog::new(),
            instances: FnvHashMap::default(),
            config,
            warnings: Vec::new(),
            dirty: FnvHashMap::default(),
        }
    }

    /// The scene.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// The scene, mutably. Changes made here bypass prefab synchronization.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// The template library.
    pub fn library(&self) -> &PrefabLibrary {
        &self.library
    }

    /// The template library, mutably.
    pub fn library_mut(&mut self) -> &mut PrefabLibrary {
        &mut self.library
    }

    /// Prefab settings.
    pub fn config(&self) -> &PrefabConfig {
        &self.config
    }

    /// The undo log.
    pub fn undo_log(&self) -> &UndoLog<Level> {
        &self.undo
    }

    /// A fresh object id.
    pub fn allocate_id(&mut self) -> ObjectId {
        self.ids.allocate()
    }

    /// Diagnostics recorded so far, oldest first.
    pub fn warnings(&self) -> &[PrefabError] {
        &self.warnings
    }

    /// Removes and returns the recorded diagnostics.
    pub fn take_warnings(&mut self) -> Vec<PrefabError> {
        std::mem::take(&mut self.warnings)
    }

    pub(crate) fn warn(&mut self, error: PrefabError) {
        warn!("{}", error);
        self.warnings.push(error);
    }

    /// The instance rooted at `object`.
    pub fn instance(&self, object: ObjectId) -> Option<&PrefabInstance> {
        self.instances.get(&object)
    }

    /// `true` if `object` is the root of a prefab instance.
    pub fn is_instance(&self, object: ObjectId) -> bool {
        self.instances.contains_key(&object)
    }

    /// All instances, in no particular order.
    pub fn instances(&self) -> impl Iterator<Item = &PrefabInstance> + '_ {
        self.instances.values()
    }

    /// Roots of every instance bound to `template`, in scene order.
    pub fn instances_of(&self, template: TemplateId) -> Vec<ObjectId> {
        self.scene
            .objects()
            .map(|o| o.id())
            .filter(|id| {
                self.instances
                    .get(id)
                    .map_or(false, |i| i.template == Some(template))
            })
            .collect()
    }

    /// The instance a prefab member belongs to.
    pub fn owning_instance(&self, object: ObjectId) -> Option<ObjectId> {
        if !self.scene.object(object)?.is_prefab_member() {
            return None;
        }
        recursion::owning_instance(&self.scene, &self.instances, object)
    }

    /// Drops the cached bounds of `instance` and of every instance enclosing it.
    pub(crate) fn invalidate_bounds_upward(&self, instance: ObjectId) {
        let mut seen = FnvHashSet::default();
        let mut current = Some(instance);
        while let Some(id) = current {
            match self.instances.get(&id) {
                Some(inst) if seen.insert(id) => inst.invalidate_bounds(),
                _ => break,
            }
            current = recursion::owning_instance(&self.scene, &self.instances, id);
        }
    }

    fn instance_mut(&mut self, instance: ObjectId) -> Result<&mut PrefabInstance, PrefabError> {
        self.instances
            .get_mut(&instance)
            .ok_or(PrefabError::NotAnInstance(instance))
    }

    /// Creates an empty, unbound instance.
    pub fn create_instance<N: Into<String>>(&mut self, id: ObjectId, name: N) -> Result<(), PrefabError> {
        self.scene.create(id, name, ObjectKind::Prefab)?;
        self.register_instance(id);
        Ok(())
    }

    pub(crate) fn register_instance(&mut self, object: ObjectId) {
        self.instances
            .insert(object, PrefabInstance::new(object, self.config.auto_update_instances));
    }

    /// Places a new instance of `template` at the origin and expands it.
    pub fn instantiate(&mut self, template: TemplateId) -> Result<ObjectId, PrefabError> {
        let name = self
            .library
            .load_template(template)
            .map(|t| t.name().to_owned())
            .unwrap_or_default();
        let id = self.ids.allocate();
        self.transaction("Create Prefab Instance", |level| {
            level.create_instance(id, name)?;
            level.bind_template(id, Some(template));
            Ok(id)
        })
    }

    /// Binds `instance` to another template and re-expands it.
    ///
    /// Nothing happens if the template is unchanged, unless `force` is set. The previous members
    /// are deleted without being synchronized. An unresolved template leaves the instance
    /// dangling.
    pub fn set_template(
        &mut self,
        instance: ObjectId,
        template: Option<TemplateId>,
        force: bool,
    ) -> Result<(), PrefabError> {
        let before = self.instance_mut(instance)?.template;
        if before == template && !force {
            return Ok(());
        }
        self.transaction("Set Prefab", |level| {
            level.record(undo_records::SetTemplateRecord::new(instance, before, template));
            level.bind_template(instance, template);
            Ok(())
        })
    }

    pub(crate) fn bind_template(&mut self, instance: ObjectId, template: Option<TemplateId>) {
        self.destroy_members(instance);
        let subscription = match self.instances.get_mut(&instance) {
            Some(inst) => {
                inst.template = template;
                inst.dangling = false;
                inst.pending.drain();
                inst.subscription.take()
            }
            None => return,
        };
        if let Some(subscription) = subscription {
            self.library.unsubscribe(subscription);
        }
        if let Some(template) = template {
            let subscription = self.library.subscribe(template);
            if let Some(inst) = self.instances.get_mut(&instance) {
                inst.subscription = Some(subscription);
            }
        }
        self.expand_instance(instance, &mut Vec::new());
    }

    /// Resolves the template of `instance`, retrying a dangling one.
    ///
    /// A dangling instance that resolves is expanded on the spot.
    pub(crate) fn ensure_template(&mut self, instance: ObjectId) -> Option<TemplateId> {
        let (template, dangling) = {
            let inst = self.instances.get(&instance)?;
            (inst.template?, inst.dangling)
        };
        if self.library.load_template(template).is_some() {
            if dangling {
                debug!("Template {} of {} resolved on retry", template, instance);
                self.without_undo(|level| {
                    level.destroy_members(instance);
                    level.expand_instance(instance, &mut Vec::new());
                });
            }
            Some(template)
        } else {
            if let Some(inst) = self.instances.get_mut(&instance) {
                inst.dangling = true;
            }
            self.warn(PrefabError::TemplateNotFound(template));
            None
        }
    }

    /// Expands the template of `instance` under it. `stack` holds the templates being expanded
    /// further up, so that a template nesting itself is cut off.
    pub(crate) fn expand_instance(&mut self, instance: ObjectId, stack: &mut Vec<TemplateId>) {
        let template_id = match self.instances.get(&instance).and_then(|i| i.template) {
            Some(template) => template,
            None => return,
        };
        if self.library.load_template(template_id).is_none() {
            self.mark_dangling(instance);
            self.warn(PrefabError::TemplateNotFound(template_id));
            return;
        }

        let layer = match self.scene.object(instance) {
            Some(object) => object.layer(),
            None => return,
        };
        let result = match self.library.template(template_id) {
            Some(template) => {
                let name = template.name().to_owned();
                if let Some(inst) = self.instances.get_mut(&instance) {
                    inst.dangling = false;
                    inst.template_name = name;
                }
                loader::expand(
                    &mut self.scene,
                    &mut self.ids,
                    template,
                    IdPolicy::Remap { instance },
                    layer,
                )
            }
            None => return,
        };

        match result {
            Ok(expansion) => {
                for warning in expansion.warnings {
                    self.warnings.push(warning);
                }
                stack.push(template_id);
                for (nested, nested_template) in expansion.nested {
                    self.register_instance(nested);
                    let subscription = self.library.subscribe(nested_template);
                    if let Some(inst) = self.instances.get_mut(&nested) {
                        inst.template = Some(nested_template);
                        inst.subscription = Some(subscription);
                    }
                    if stack.contains(&nested_template) {
                        self.warn(PrefabError::RecursivePrefabReference(nested, instance));
                        continue;
                    }
                    self.expand_instance(nested, stack);
                }
                stack.pop();
            }
            Err(e) => self.warn(e),
        }

        self.invalidate_bounds_upward(instance);
        self.scene.invalidate_transform(instance);
    }

    fn mark_dangling(&mut self, instance: ObjectId) {
        let fallback = self.config.unknown_template_name.clone();
        if let Some(inst) = self.instances.get_mut(&instance) {
            inst.dangling = true;
            if inst.template_name.is_empty() {
                inst.template_name = fallback.clone();
            }
        }
        let unnamed = self
            .scene
            .object(instance)
            .map_or(false, |o| o.name().is_empty());
        if unnamed {
            let _ = self.scene.set_name(instance, fallback);
        }
    }

    /// Prefab members reachable from `instance` through children and links, in pre-order.
    pub fn members(&self, instance: ObjectId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let root = match self.scene.object(instance) {
            Some(root) => root,
            None => return out,
        };
        let mut stack: Vec<ObjectId> = root
            .linked()
            .iter()
            .rev()
            .chain(root.children().iter().rev())
            .copied()
            .collect();
        let mut seen = FnvHashSet::default();
        while let Some(id) = stack.pop() {
            let object = match self.scene.object(id) {
                Some(object) if object.is_prefab_member() && seen.insert(id) => object,
                _ => continue,
            };
            out.push(id);
            stack.extend(object.linked().iter().rev().copied());
            stack.extend(object.children().iter().rev().copied());
        }
        out
    }

    /// Deletes every member of `instance` without touching its template.
    pub(crate) fn destroy_members(&mut self, instance: ObjectId) {
        let members = self.members(instance);
        for member in &members {
            if !self.scene.contains(*member) {
                continue;
            }
            match self.scene.delete(*member) {
                Ok(deleted) => self.forget_instances(&deleted),
                Err(e) => self.warn(e.into()),
            }
        }
        self.invalidate_bounds_upward(instance);
    }

    fn forget_instances(&mut self, deleted: &[ObjectId]) {
        for id in deleted {
            if let Some(mut inst) = self.instances.remove(id) {
                if let Some(subscription) = inst.subscription.take() {
                    self.library.unsubscribe(subscription);
                }
            }
        }
    }

    /// Deletes an object the way the editor does.
    ///
    /// A prefab member first pushes a `Delete` into its instance's template. An instance is
    /// destroyed along with its members, which are not synchronized.
    pub fn delete_object(&mut self, object: ObjectId) -> Result<(), PrefabError> {
        let is_member = self
            .scene
            .object(object)
            .ok_or(stagehand_core::SceneError::UnknownObject(object))?
            .is_prefab_member();
        if is_member {
            if let Some(owner) = self.owning_instance(object) {
                let node = self.scene.object(object).and_then(|o| o.id_in_prefab());
                self.sync_change(owner, ChangeRecord::new(ChangeKind::Delete, object, node))?;
                self.mark_layer_of(owner);
            }
        }
        if self.is_instance(object) {
            self.destroy_members(object);
        }
        let deleted = self.scene.delete(object)?;
        self.forget_instances(&deleted);
        Ok(())
    }

    pub(crate) fn mark_layer_of(&mut self, object: ObjectId) {
        if let Some(layer) = self.scene.object(object).map(|o| o.layer()) {
            self.scene.mark_layer_modified(layer);
        }
    }

    /// Gives an object a new id, keeping instance bookkeeping in step.
    pub(crate) fn rename_object(&mut self, old: ObjectId, new: ObjectId) -> Result<(), PrefabError> {
        self.scene.change_id(old, new)?;
        if let Some(mut inst) = self.instances.remove(&old) {
            inst.object = new;
            self.instances.insert(new, inst);
        }
        Ok(())
    }

    /// Re-expands `instance` from its template, discarding its live members.
    pub fn remake_instance(&mut self, instance: ObjectId) -> Result<(), PrefabError> {
        if !self.is_instance(instance) {
            return Err(PrefabError::NotAnInstance(instance));
        }
        self.without_undo(|level| {
            level.destroy_members(instance);
            level.expand_instance(instance, &mut Vec::new());
        });
        Ok(())
    }

    /// Remakes every instance of `template` except those in `except`, returning how many.
    pub fn remake_instances_of(&mut self, template: TemplateId, except: &[ObjectId]) -> usize {
        let targets: Vec<ObjectId> = self
            .instances_of(template)
            .into_iter()
            .filter(|i| !except.contains(i))
            .collect();
        for instance in &targets {
            // An earlier remake may have deleted a nested target.
            if self.is_instance(*instance) {
                let _ = self.remake_instance(*instance);
            }
        }
        debug!("Remade {} instance(s) of {}", targets.len(), template);
        targets.len()
    }

    /// Remakes the instances of every template changed since the last call, skipping the
    /// instances the changes came from.
    pub fn remake_dirty(&mut self) -> usize {
        let dirty = std::mem::take(&mut self.dirty);
        let mut remade = 0;
        for (template, origins) in dirty {
            let except: Vec<ObjectId> = origins.into_iter().collect();
            remade += self.remake_instances_of(template, &except);
        }
        remade
    }

    /// Templates waiting for [`remake_dirty`](Level::remake_dirty).
    pub fn dirty_templates(&self) -> Vec<TemplateId> {
        self.dirty.keys().copied().collect()
    }

    pub(crate) fn record<R>(&mut self, record: R) -> bool
    where
        R: UndoRecord<Level> + 'static,
    {
        self.undo.record(record)
    }

    /// Runs `f` inside an undo transaction. An error cancels the transaction.
    pub fn transaction<T, F>(&mut self, description: &str, f: F) -> Result<T, PrefabError>
    where
        F: FnOnce(&mut Level) -> Result<T, PrefabError>,
    {
        self.undo.begin(description);
        let result = f(self);
        match result {
            Ok(_) => self.undo.commit(),
            Err(_) => self.undo.cancel(),
        }
        result
    }

    /// Runs `f` with undo recording suspended.
    pub fn without_undo<T, F>(&mut self, f: F) -> T
    where
        F: FnOnce(&mut Level) -> T,
    {
        self.undo.suspend();
        let result = f(self);
        self.undo.resume();
        result
    }

    /// Reverts the latest undo step. Returns `false` if there is none.
    pub fn undo(&mut self) -> bool {
        let mut tx = match self.undo.take_undo() {
            Some(tx) => tx,
            None => return false,
        };
        debug!("Undo '{}'", tx.description());
        self.without_undo(|level| tx.undo(level));
        self.undo.push_redo(tx);
        true
    }

    /// Re-applies the latest undone step. Returns `false` if there is none.
    pub fn redo(&mut self) -> bool {
        let mut tx = match self.undo.take_redo() {
            Some(tx) => tx,
            None => return false,
        };
        debug!("Redo '{}'", tx.description());
        self.without_undo(|level| tx.redo(level));
        self.undo.push_undo(tx);
        true
    }

    pub(crate) fn set_member_flags(&mut self, objects: &[ObjectId], member: bool) {
        for id in objects {
            let result = if member {
                self.scene.insert_flags(*id, ObjectFlags::PREFAB_MEMBER)
            } else {
                self.scene
                    .remove_flags(*id, ObjectFlags::PREFAB_MEMBER)
                    .and_then(|_| self.scene.set_id_in_prefab(*id, None))
            };
            if let Err(e) = result {
                self.warn(e.into());
            }
        }
    }
}
