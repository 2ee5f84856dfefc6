use log::{debug, trace, warn};
use stagehand_core::{ObjectId, Transform};

use super::Level;
use crate::{
    error::PrefabError,
    events::TemplateEvent,
    sync::{ChangeKind, ChangeRecord, SyncOutcome},
};

impl Level {
    /// Pushes one instance-side change into the template of `instance`.
    ///
    /// With auto-sync off the change is queued, replacing an earlier change of the same kind to
    /// the same object. A dangling instance retries its template and drops the change if it
    /// still cannot be found. Structural changes mark the template for a remake of its other
    /// instances.
    pub fn sync_change(&mut self, instance: ObjectId, change: ChangeRecord) -> Result<SyncOutcome, PrefabError> {
        self.invalidate_bounds_upward(instance);
        let inst = self.instance_mut(instance)?;
        if !inst.auto_sync {
            trace!("Queued {:?} of {} on {}", change.kind, change.object, instance);
            inst.pending.upsert(change);
            return Ok(SyncOutcome::Queued);
        }

        let template_id = match self.ensure_template(instance) {
            Some(template) => template,
            None => {
                warn!("Dropped {:?} of {}: {} is dangling", change.kind, change.object, instance);
                return Ok(SyncOutcome::Dangling);
            }
        };

        let instances = &self.instances;
        let nested = |object: ObjectId| {
            if object == instance {
                None
            } else {
                instances.get(&object).and_then(|i| i.template)
            }
        };
        let applied = match self.library.template_mut(template_id) {
            Some(template) => template.update_from_instance(&self.scene, instance, &change, &nested),
            None => false,
        };
        if applied && change.kind.requires_remake() {
            self.dirty.entry(template_id).or_default().insert(instance);
        }
        Ok(SyncOutcome::Applied)
    }

    /// Turns immediate synchronization of `instance` on or off. Turning it on flushes the
    /// queued changes in order.
    pub fn set_auto_sync(&mut self, instance: ObjectId, enabled: bool) -> Result<(), PrefabError> {
        let inst = self.instance_mut(instance)?;
        inst.auto_sync = enabled;
        if !enabled {
            return Ok(());
        }
        let pending = inst.pending.drain();
        debug!("Flushing {} queued change(s) of {}", pending.len(), instance);
        for change in pending {
            self.sync_change(instance, change)?;
        }
        Ok(())
    }

    /// Sets the local transform of a prefab member and pushes it into the template.
    pub fn move_member(&mut self, member: ObjectId, transform: Transform) -> Result<(), PrefabError> {
        self.scene.set_local_transform(member, transform)?;
        let owner = match self.owning_instance(member) {
            Some(owner) => owner,
            None => return Ok(()),
        };
        let node = self.scene.object(member).and_then(|o| o.id_in_prefab());
        self.sync_change(owner, ChangeRecord::new(ChangeKind::ModifyTransform, member, node))?;
        self.mark_layer_of(member);
        Ok(())
    }

    /// Renames an object. A prefab member pushes its new name into the template.
    pub fn rename<N: Into<String>>(&mut self, object: ObjectId, name: N) -> Result<(), PrefabError> {
        self.scene.set_name(object, name)?;
        if let Some(owner) = self.owning_instance(object) {
            let node = self.scene.object(object).and_then(|o| o.id_in_prefab());
            self.sync_change(owner, ChangeRecord::new(ChangeKind::Add, object, node))?;
        }
        Ok(())
    }

    /// Applies the template events received since the last call. Returns how many were handled.
    pub fn pump_template_events(&mut self) -> usize {
        let mut received = Vec::new();
        for inst in self.instances.values() {
            if let Some(subscription) = &inst.subscription {
                received.extend(subscription.try_iter().map(|event| (inst.object, event)));
            }
        }

        let handled = received.len();
        for (instance, event) in received {
            let inst = match self.instances.get_mut(&instance) {
                Some(inst) => inst,
                None => continue,
            };
            match event {
                TemplateEvent::Renamed { name, .. } => {
                    debug!("{} follows template rename to '{}'", instance, name);
                    inst.template_name = name;
                }
                TemplateEvent::Removed { template } => {
                    inst.dangling = true;
                    self.warn(PrefabError::TemplateNotFound(template));
                }
            }
        }
        handled
    }
}
