//! Object identifiers and the scene-wide id allocator.

use std::{
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

/// A 128 bit identifier of a scene object, split into a high and a low half.
///
/// Serialized as a hyphenated UUID string.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    hi: u64,
    lo: u64,
}

impl ObjectId {
    /// Builds an id from its two halves.
    pub const fn from_parts(hi: u64, lo: u64) -> Self {
        ObjectId { hi, lo }
    }

    /// The all-zero id.
    pub const fn nil() -> Self {
        ObjectId { hi: 0, lo: 0 }
    }

    /// A fresh random id.
    pub fn random() -> Self {
        Uuid::new_v4().into()
    }

    /// High 64 bits.
    pub fn hi(self) -> u64 {
        self.hi
    }

    /// Low 64 bits.
    pub fn lo(self) -> u64 {
        self.lo
    }

    /// `true` for the all-zero id.
    pub fn is_nil(self) -> bool {
        self.hi == 0 && self.lo == 0
    }

    /// The same bits as a `Uuid`.
    pub fn as_uuid(self) -> Uuid {
        Uuid::from_u128((u128::from(self.hi) << 64) | u128::from(self.lo))
    }
}

impl From<Uuid> for ObjectId {
    fn from(uuid: Uuid) -> Self {
        let bits = uuid.as_u128();
        ObjectId {
            hi: (bits >> 64) as u64,
            lo: bits as u64,
        }
    }
}

impl From<ObjectId> for Uuid {
    fn from(id: ObjectId) -> Self {
        id.as_uuid()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_uuid().hyphenated(), f)
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

impl FromStr for ObjectId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(ObjectId::from)
    }
}

impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_uuid().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(ObjectId::from)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ForcedSequence {
    hi: u64,
    next: u64,
}

/// Hands out ids for newly created scene objects.
///
/// Ids are random unless a forced sequence is active, in which case they are
/// `(base, 1)`, `(base, 2)`, ... so that the objects created while expanding
/// the same prefab instance always get the same ids.
#[derive(Debug, Default)]
pub struct IdAllocator {
    forced: Option<ForcedSequence>,
}

impl IdAllocator {
    /// Creates an allocator handing out random ids.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next id.
    pub fn allocate(&mut self) -> ObjectId {
        match self.forced.as_mut() {
            Some(seq) => {
                seq.next = seq.next.wrapping_add(1);
                ObjectId::from_parts(seq.hi, seq.next)
            }
            None => ObjectId::random(),
        }
    }

    /// `true` while a [`ForcedIdScope`] is alive.
    pub fn is_forced(&self) -> bool {
        self.forced.is_some()
    }

    /// Forces a deterministic sequence based on `base` until the returned scope is dropped.
    ///
    /// Scopes nest: dropping an inner scope restores the outer sequence where it was.
    pub fn force(&mut self, base: u64) -> ForcedIdScope<'_> {
        let previous = self.forced.replace(ForcedSequence { hi: base, next: 0 });
        ForcedIdScope {
            allocator: self,
            previous,
        }
    }
}

/// Keeps a forced id sequence installed on an [`IdAllocator`].
///
/// The previous state is restored when this is dropped, including during unwinding.
#[derive(Debug)]
pub struct ForcedIdScope<'a> {
    allocator: &'a mut IdAllocator,
    previous: Option<ForcedSequence>,
}

impl Deref for ForcedIdScope<'_> {
    type Target = IdAllocator;

    fn deref(&self) -> &IdAllocator {
        self.allocator
    }
}

impl DerefMut for ForcedIdScope<'_> {
    fn deref_mut(&mut self) -> &mut IdAllocator {
        self.allocator
    }
}

impl Drop for ForcedIdScope<'_> {
    fn drop(&mut self) {
        self.allocator.forced = self.previous.take();
    }
}
