//! Reconciliation of a submitted member list against the live members of an instance.

use fnv::FnvHashSet;
use stagehand_core::ObjectId;

/// One entry of a desired member list. Names are shown to the user but never matched on.
#[derive(Clone, Debug, PartialEq, Eq, derive_new::new)]
pub struct MemberLink {
    /// Runtime id of the object.
    pub id: ObjectId,
    /// Display name.
    pub name: String,
}

/// The operations that turn the current member list into the desired one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcilePlan {
    /// Objects to attach, in desired order. Applied first.
    pub attach: Vec<ObjectId>,
    /// Current members to remove, in current order. Applied after the attaches.
    pub remove: Vec<ObjectId>,
}

impl ReconcilePlan {
    /// `true` if nothing needs to change.
    pub fn is_empty(&self) -> bool {
        self.attach.is_empty() && self.remove.is_empty()
    }
}

/// Diffs `desired` against `current` by id.
///
/// When both lists hold the same ids in the same order the plan is empty. Duplicate ids in
/// `desired` are not detected and may be attached twice.
pub fn reconcile(current: &[ObjectId], desired: &[MemberLink]) -> ReconcilePlan {
    if current.len() == desired.len() && current.iter().zip(desired).all(|(c, d)| *c == d.id) {
        return ReconcilePlan::default();
    }

    let known: FnvHashSet<ObjectId> = current.iter().copied().collect();
    let mut unprocessed = known.clone();
    let mut plan = ReconcilePlan::default();
    for link in desired {
        if !unprocessed.remove(&link.id) && !known.contains(&link.id) {
            plan.attach.push(link.id);
        }
    }
    plan.remove = current
        .iter()
        .copied()
        .filter(|id| unprocessed.contains(id))
        .collect();
    plan
}
