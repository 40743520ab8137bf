//! The slot accessor table.
//!
//! Each static slot is bound, at class initialization time, to a pair of
//! closures that read and write the field's master copy. Binding through
//! closures instead of reflection keeps every flush and refresh a direct
//! call; the table is a plain vector indexed by slot id, grown on demand.

use crate::{
    runtime::value::{TypeKind, Value},
    Result,
};

/// Reads a slot's master copy.
pub type Getter = Box<dyn Fn() -> Value + Send + Sync>;
/// Writes a slot's master copy. Absent for final fields, which are bound
/// read-only.
pub type Setter = Box<dyn Fn(Value) + Send + Sync>;

/// The bound accessor for one static slot.
pub struct SlotAccessor {
    /// The field's type classification.
    pub kind: TypeKind,
    /// Volatile fields flush on write and refresh on read.
    pub is_volatile: bool,
    /// Reads the master copy.
    pub getter: Getter,
    /// Writes the master copy, `None` for a read-only binding.
    pub setter: Option<Setter>,
}

/// Accessor bindings for all static slots, indexed by slot id.
///
/// Slots bind in class-initialization order, which is not slot-id order,
/// so the table is sparse: an unbound entry is a class whose initializer
/// has not run yet. Touching an unbound slot from a cache operation is a
/// fatal [`crate::Error::UnresolvedAccessor`].
#[derive(Default)]
pub struct AccessorTable {
    slots: Vec<Option<SlotAccessor>>,
}

impl AccessorTable {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        AccessorTable::default()
    }

    /// Number of slot entries, bound or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no slot was ever bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Bind `slot`, growing the table as needed. Re-binding replaces the
    /// previous accessor (a class redefined by its loader re-runs its
    /// initializer).
    pub fn bind(&mut self, slot: u32, accessor: SlotAccessor) {
        let index = slot as usize;
        if index >= self.slots.len() {
            self.slots.resize_with(index + 1, || None);
        }
        self.slots[index] = Some(accessor);
    }

    /// The accessor bound to `slot`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAccessor`] if the slot was never
    /// bound.
    pub fn get(&self, slot: u32) -> Result<&SlotAccessor> {
        self.slots
            .get(slot as usize)
            .and_then(Option::as_ref)
            .ok_or(crate::Error::UnresolvedAccessor(slot))
    }

}
