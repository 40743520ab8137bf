//! The field registry: stable slot assignment and per-class layouts.
//!
//! Slots are assigned on first sight of an `owner.name:descriptor`, whether
//! that sight is the declaration or an access site in some other class
//! processed earlier. Assignment order therefore depends on processing
//! order, but within one transformation run every mention of the same
//! static field resolves to the same slot, which is the only property
//! the rewritten code relies on.

use std::collections::HashMap;

use crate::runtime::value::TypeKind;

/// Identity of a static field across the whole input set.
///
/// The descriptor is part of the identity: a class may declare two fields
/// with the same name and different types, and they are distinct slots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldKey {
    /// Internal name of the declaring class.
    pub owner: String,
    /// Simple field name.
    pub name: String,
    /// Field descriptor.
    pub descriptor: String,
}

/// One accessor binding waiting to be emitted into a class initializer.
#[derive(Debug, Clone)]
pub struct PendingAccessor {
    /// Assigned slot.
    pub slot: u32,
    /// Internal name of the declaring class.
    pub owner: String,
    /// Simple field name.
    pub name: String,
    /// Field descriptor.
    pub descriptor: String,
    /// Declared volatile.
    pub is_volatile: bool,
    /// Declared final; bound without a setter.
    pub is_final: bool,
}

/// One instance field of a class's shadow layout.
#[derive(Debug, Clone)]
pub struct ShadowField {
    /// Simple field name.
    pub name: String,
    /// Field descriptor.
    pub descriptor: String,
    /// Type classification.
    pub kind: TypeKind,
    /// Declared volatile.
    pub is_volatile: bool,
}

/// Shadow layout recorded for one rewritten class.
#[derive(Debug, Clone)]
pub struct ClassFieldShape {
    /// Internal name of the shadowed class.
    pub class_name: String,
    /// Instance fields, in declaration order.
    pub fields: Vec<ShadowField>,
}

/// Registry of every shared field seen during one transformation run.
///
/// The slot space is unbounded: every distinct static field of the input
/// gets one, and nothing is ever reclaimed. Inputs with very large
/// numbers of statics grow the runtime arrays accordingly.
#[derive(Default)]
pub struct FieldRegistry {
    slots: HashMap<FieldKey, u32>,
    next_slot: u32,
    pending: Vec<PendingAccessor>,
    shapes: Vec<ClassFieldShape>,
}

impl FieldRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        FieldRegistry::default()
    }

    /// The slot for `owner.name:descriptor`, assigning the next free one
    /// on first sight.
    pub fn slot_for(&mut self, owner: &str, name: &str, descriptor: &str) -> u32 {
        let key = FieldKey {
            owner: owner.to_string(),
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        };
        if let Some(&slot) = self.slots.get(&key) {
            return slot;
        }
        let slot = self.next_slot;
        self.next_slot += 1;
        log::debug!("slot {slot} assigned to {owner}.{name}:{descriptor}");
        self.slots.insert(key, slot);
        slot
    }

    /// Total number of slots assigned so far.
    #[must_use]
    pub fn slot_count(&self) -> u32 {
        self.next_slot
    }

    /// Queue an accessor binding for a declared static field. The binding
    /// is emitted into the next class initializer the rewriter encounters.
    pub fn queue_accessor(&mut self, pending: PendingAccessor) {
        self.pending.push(pending);
    }

    /// Take all queued accessor bindings.
    #[must_use]
    pub fn take_pending(&mut self) -> Vec<PendingAccessor> {
        std::mem::take(&mut self.pending)
    }

    /// Number of bindings still waiting for a class initializer.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Record the shadow layout of a rewritten class.
    pub fn record_shape(&mut self, shape: ClassFieldShape) {
        self.shapes.push(shape);
    }

    /// All recorded layouts, in processing order.
    #[must_use]
    pub fn shapes(&self) -> &[ClassFieldShape] {
        &self.shapes
    }

    /// The widest recorded layout, sizing the runtime's per-object arrays.
    #[must_use]
    pub fn max_shape_len(&self) -> usize {
        self.shapes.iter().map(|s| s.fields.len()).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_stable_per_field() {
        let mut registry = FieldRegistry::new();
        let a = registry.slot_for("demo/A", "count", "I");
        let b = registry.slot_for("demo/B", "count", "I");
        assert_ne!(a, b);
        assert_eq!(registry.slot_for("demo/A", "count", "I"), a);
        assert_eq!(registry.slot_count(), 2);
    }

    #[test]
    fn same_name_different_descriptor_gets_its_own_slot() {
        let mut registry = FieldRegistry::new();
        let narrow = registry.slot_for("demo/A", "x", "I");
        let wide = registry.slot_for("demo/A", "x", "J");
        assert_ne!(narrow, wide);
        assert_eq!(registry.slot_for("demo/A", "x", "I"), narrow);
        assert_eq!(registry.slot_count(), 2);
    }

    #[test]
    fn access_site_before_declaration_shares_the_slot() {
        let mut registry = FieldRegistry::new();
        // A use in some other class assigns the slot first.
        let used = registry.slot_for("demo/Config", "LIMIT", "I");
        // Processing the declaring class later resolves to the same slot.
        let declared = registry.slot_for("demo/Config", "LIMIT", "I");
        assert_eq!(used, declared);
    }

    #[test]
    fn pending_drains_once() {
        let mut registry = FieldRegistry::new();
        let slot = registry.slot_for("demo/A", "x", "I");
        registry.queue_accessor(PendingAccessor {
            slot,
            owner: "demo/A".to_string(),
            name: "x".to_string(),
            descriptor: "I".to_string(),
            is_volatile: false,
            is_final: false,
        });

        assert_eq!(registry.pending_len(), 1);
        assert_eq!(registry.take_pending().len(), 1);
        assert_eq!(registry.pending_len(), 0);
        assert!(registry.take_pending().is_empty());
    }

    #[test]
    fn shapes_accumulate() {
        let mut registry = FieldRegistry::new();
        registry.record_shape(ClassFieldShape {
            class_name: "demo/Point".to_string(),
            fields: vec![
                ShadowField {
                    name: "x".to_string(),
                    descriptor: "I".to_string(),
                    kind: TypeKind::Int,
                    is_volatile: false,
                },
                ShadowField {
                    name: "y".to_string(),
                    descriptor: "I".to_string(),
                    kind: TypeKind::Int,
                    is_volatile: false,
                },
            ],
        });
        assert_eq!(registry.shapes().len(), 1);
        assert_eq!(registry.max_shape_len(), 2);
    }
}
