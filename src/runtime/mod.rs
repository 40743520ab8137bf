//! The coherence runtime: a software-managed cache between each thread
//! and main memory.
//!
//! Rewritten code routes every shared field access and every
//! synchronization action through here. Each thread owns a
//! [`ThreadCtx`]; the shared side is one [`Coherence`] instance holding
//! the accessor table, the inbox list and the single lock that orders all
//! flushes and refreshes. Between synchronization actions a thread only
//! ever sees its own cache, which is what makes stale reads, lost
//! updates and reordering-like effects actually happen on a
//! sequentially consistent host.
//!
//! ```rust
//! use jrelax::runtime::{Coherence, SlotAccessor, TypeKind, Value};
//! use std::sync::{Arc, Mutex};
//!
//! let shared = Arc::new(Mutex::new(0i64));
//! let runtime = Coherence::new();
//! let (get, set) = (Arc::clone(&shared), Arc::clone(&shared));
//! runtime.bind_accessor(0, SlotAccessor {
//!     kind: TypeKind::Int,
//!     is_volatile: false,
//!     getter: Box::new(move || Value::from_i64(*get.lock().unwrap())),
//!     setter: Some(Box::new(move |v| *set.lock().unwrap() = v.as_i64())),
//! });
//!
//! let mut ctx = runtime.enter_thread();
//! ctx.write_static(0, Value::from_i32(7))?;
//! assert_eq!(*shared.lock().unwrap(), 0); // cached, not yet published
//! ctx.flush()?;
//! assert_eq!(*shared.lock().unwrap(), 7);
//! # Ok::<(), jrelax::Error>(())
//! ```

pub mod accessors;
pub mod cache;
pub mod registry;
pub mod shadow;
pub mod value;

pub use accessors::{AccessorTable, Getter, Setter, SlotAccessor};
pub use cache::ThreadCtx;
pub use registry::ThreadRegistry;
pub use shadow::{HeapObject, ObjectShadow, ShadowClass, ShadowFieldInfo};
pub use value::{same_ref, RefSlot, TypeKind, Value};

use std::sync::Arc;

/// Shared half of the coherence runtime.
///
/// One instance per emulated program run. All state is owned here rather
/// than in process globals, so independent runs (and independent tests)
/// never interfere.
pub struct Coherence {
    registry: ThreadRegistry,
}

impl Coherence {
    /// A fresh runtime with no bound slots and no threads.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Coherence {
            registry: ThreadRegistry::new(),
        })
    }

    pub(crate) fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// Bind `slot` to its accessor pair. Called once per static field as
    /// its declaring class initializes; re-binding replaces the previous
    /// accessor.
    pub fn bind_accessor(&self, slot: u32, accessor: SlotAccessor) {
        self.registry.lock().accessors.bind(slot, accessor);
    }

    /// Register the calling thread and hand it its cache.
    ///
    /// The context starts at scope depth 1 with an empty cache; slots
    /// fault in from main memory on first touch.
    #[must_use]
    pub fn enter_thread(self: &Arc<Self>) -> ThreadCtx {
        let inbox = self.registry.register();
        ThreadCtx::new(Arc::clone(self), inbox)
    }

    /// Number of threads currently registered.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.registry.thread_count()
    }
}
