//! Identity mapping between template-local node ids and the ids of live members.
//!
//! An instance `I` owns the ids whose high half is `I.hi ^ I.lo`. The low half of a member id
//! mixes the two halves of the node id, so expanding the same instance from the same template
//! always yields the same ids.

use stagehand_core::ObjectId;

/// The high half shared by every id owned by `instance`.
#[inline]
pub fn seed(instance: ObjectId) -> u64 {
    instance.hi() ^ instance.lo()
}

/// The runtime id of template node `local` inside `instance`.
#[inline]
pub fn remap(instance: ObjectId, local: ObjectId) -> ObjectId {
    ObjectId::from_parts(seed(instance), local.hi() ^ local.lo())
}

/// `true` if `id` lies in the id space of `instance`.
#[inline]
pub fn is_owned_by(id: ObjectId, instance: ObjectId) -> bool {
    id.hi() == seed(instance)
}

/// Base of the forced allocator sequence used while expanding `instance`.
#[inline]
pub fn forced_base(instance: ObjectId) -> u64 {
    instance.hi() >> 32
}
