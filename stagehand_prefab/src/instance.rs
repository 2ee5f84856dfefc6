use std::cell::Cell;

use stagehand_core::{Aabb, ObjectId};

use crate::{events::Subscription, sync::PendingChanges, template::TemplateId};

/// Bookkeeping of one placed prefab: the scene object acting as its root plus everything the
/// level needs to keep it in step with its template.
#[derive(Debug)]
pub struct PrefabInstance {
    pub(crate) object: ObjectId,
    pub(crate) template: Option<TemplateId>,
    pub(crate) dangling: bool,
    pub(crate) template_name: String,
    pub(crate) auto_sync: bool,
    pub(crate) pending: PendingChanges,
    pub(crate) bounds: Cell<Option<Aabb>>,
    pub(crate) pivot_mode: bool,
    pub(crate) subscription: Option<Subscription>,
}

impl PrefabInstance {
    pub(crate) fn new(object: ObjectId, auto_sync: bool) -> Self {
        PrefabInstance {
            object,
            template: None,
            dangling: false,
            template_name: String::new(),
            auto_sync,
            pending: PendingChanges::new(),
            bounds: Cell::new(None),
            pivot_mode: false,
            subscription: None,
        }
    }

    /// The root object of the instance.
    pub fn object(&self) -> ObjectId {
        self.object
    }

    /// The template this instance is bound to, resolved or not.
    pub fn template(&self) -> Option<TemplateId> {
        self.template
    }

    /// `true` if the instance names a template that could not be resolved.
    pub fn is_dangling(&self) -> bool {
        self.dangling
    }

    /// Name of the template as last known, persisted as `PrefabName`.
    pub fn template_name(&self) -> &str {
        &self.template_name
    }

    /// Whether changes reach the template immediately.
    pub fn auto_sync(&self) -> bool {
        self.auto_sync
    }

    /// Changes queued while auto-sync is off.
    pub fn pending(&self) -> &PendingChanges {
        &self.pending
    }

    /// Whether moving the instance moves its pivot instead.
    pub fn pivot_mode(&self) -> bool {
        self.pivot_mode
    }

    /// `true` while subscribed to template events.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub(crate) fn invalidate_bounds(&self) {
        self.bounds.set(None);
    }
}
