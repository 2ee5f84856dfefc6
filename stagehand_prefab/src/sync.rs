//! Change records and the deferred change queue of an instance.

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use stagehand_core::ObjectId;

/// What happened to a live member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The object (and its subtree) joined the instance.
    Add,
    /// The object left the instance or was deleted.
    Delete,
    /// The object's local transform changed.
    ModifyTransform,
    /// Like `ModifyTransform`, but the other instances are not remade from the template.
    ModifyTransformInLibOnly,
}

impl ChangeKind {
    /// `true` if applying a change of this kind makes sibling instances out of date.
    pub fn requires_remake(self) -> bool {
        self != ChangeKind::ModifyTransformInLibOnly
    }
}

/// One unit of instance to template propagation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, derive_new::new)]
pub struct ChangeRecord {
    /// What happened.
    pub kind: ChangeKind,
    /// The live object it happened to.
    pub object: ObjectId,
    /// The template node of that object.
    pub id_in_template: Option<ObjectId>,
}

/// What became of a change handed to the sync engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Auto-sync is off; the change waits in the pending queue.
    Queued,
    /// The instance has no resolvable template; nothing happened.
    Dangling,
    /// The template was updated.
    Applied,
}

/// Changes waiting for auto-sync to be turned back on.
///
/// At most one record is kept per `(object, kind)`: a later record overwrites the earlier one
/// in place, so draining yields records in the order their keys were first queued.
#[derive(Clone, Debug, Default)]
pub struct PendingChanges {
    entries: Vec<ChangeRecord>,
    index: FnvHashMap<(ObjectId, ChangeKind), usize>,
}

impl PendingChanges {
    /// An empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `change`, replacing a queued record with the same object and kind.
    pub fn upsert(&mut self, change: ChangeRecord) {
        let key = (change.object, change.kind);
        match self.index.get(&key) {
            Some(&i) => self.entries[i] = change,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push(change);
            }
        }
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Queued records in flush order.
    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord> + '_ {
        self.entries.iter()
    }

    /// Empties the queue, returning the records in flush order.
    pub fn drain(&mut self) -> Vec<ChangeRecord> {
        self.index.clear();
        std::mem::take(&mut self.entries)
    }
}
