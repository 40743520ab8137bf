//! Shadowed instance state.
//!
//! Statics bind to global slots; instance fields cannot, since their
//! number is unbounded. Instead every instrumented class gets a
//! [`ShadowClass`] describing its field layout once, each live object
//! carries a [`HeapObject`] holding the master copy of its fields, and
//! each thread that touches the object grows a private [`ObjectShadow`]
//! with local and mirror columns over the same layout.
//!
//! Threads hold objects weakly in their flush queues: a queued object
//! that dies before the flush is dropped silently rather than kept alive
//! by its own pending writes.

use std::{collections::HashMap, sync::Arc, sync::Mutex, sync::Weak};

use crate::{
    runtime::value::{TypeKind, Value},
    Result,
};

/// Immutable field layout of one instrumented class, built once when the
/// class binds and shared by every object and shadow of that class.
pub struct ShadowClass {
    name: String,
    fields: Vec<ShadowFieldInfo>,
    index: HashMap<String, usize>,
}

/// One field of a shadow layout.
pub struct ShadowFieldInfo {
    /// Simple field name.
    pub name: String,
    /// Type classification.
    pub kind: TypeKind,
    /// Volatile fields flush on write and refresh on read.
    pub is_volatile: bool,
}

impl ShadowClass {
    /// Build a layout for `name` with the given fields, in declaration
    /// order.
    #[must_use]
    pub fn new(name: &str, fields: Vec<ShadowFieldInfo>) -> Arc<Self> {
        let index = fields
            .iter()
            .enumerate()
            .map(|(i, f)| (f.name.clone(), i))
            .collect();
        Arc::new(ShadowClass {
            name: name.to_string(),
            fields,
            index,
        })
    }

    /// The class's internal name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The field layout, in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[ShadowFieldInfo] {
        &self.fields
    }

    /// Column index of the field called `name`.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownShadowField`] if the class declares
    /// no such field. The rewriter only emits names taken from the class
    /// being rewritten, so this firing means the bound layout and the
    /// rewritten code disagree.
    pub fn field_index(&self, name: &str) -> Result<usize> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| crate::Error::UnknownShadowField {
                owner: self.name.clone(),
                name: name.to_string(),
            })
    }
}

/// The master copy of one object's instrumented fields.
///
/// Threads never read these fields directly; they go through their
/// [`ObjectShadow`] and only touch the master copy under the global
/// coherence lock, during flush and refresh.
pub struct HeapObject {
    class: Arc<ShadowClass>,
    fields: Mutex<Vec<Value>>,
}

impl HeapObject {
    /// Allocate an object of `class` with default-valued fields.
    #[must_use]
    pub fn allocate(class: &Arc<ShadowClass>) -> Arc<Self> {
        let fields = class.fields().iter().map(|f| f.kind.default_value()).collect();
        Arc::new(HeapObject {
            class: Arc::clone(class),
            fields: Mutex::new(fields),
        })
    }

    /// The object's layout.
    #[must_use]
    pub fn class(&self) -> &Arc<ShadowClass> {
        &self.class
    }

    /// Snapshot all master-copy fields. Caller holds the coherence lock.
    pub(crate) fn load_all(&self) -> Vec<Value> {
        lock!(self.fields).clone()
    }

    /// Write one master-copy field. Caller holds the coherence lock.
    pub(crate) fn store(&self, index: usize, value: Value) {
        lock!(self.fields)[index] = value;
    }
}

/// One thread's private cached copy of one object's fields.
pub struct ObjectShadow {
    /// The shadowed object, held weakly so a cache never extends an
    /// object's lifetime.
    pub(crate) object: Weak<HeapObject>,
    pub(crate) class: Arc<ShadowClass>,
    /// The thread's working copy.
    pub(crate) local: Vec<Value>,
    /// Last value observed in or flushed to the master copy.
    pub(crate) mirror: Vec<Value>,
    /// Scope counter current when each field was last written locally.
    pub(crate) field_scope: Vec<u64>,
    /// Queued for flush.
    pub(crate) dirty: bool,
}

impl ObjectShadow {
    /// Materialize a shadow by snapshotting the master copy. Caller holds
    /// the coherence lock.
    pub(crate) fn load(object: &Arc<HeapObject>) -> Self {
        let snapshot = object.load_all();
        ObjectShadow {
            object: Arc::downgrade(object),
            class: Arc::clone(object.class()),
            mirror: snapshot.clone(),
            local: snapshot,
            field_scope: vec![0; object.class().fields().len()],
            dirty: false,
        }
    }

    /// Re-snapshot the master copy, discarding local state. Caller holds
    /// the coherence lock.
    pub(crate) fn reload(&mut self, object: &Arc<HeapObject>) {
        let snapshot = object.load_all();
        self.mirror.clone_from(&snapshot);
        self.local = snapshot;
    }
}
