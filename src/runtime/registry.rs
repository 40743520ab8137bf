//! Thread registration and the global coherence lock.
//!
//! All cross-thread coordination runs through one mutex, held for the
//! whole of a flush or refresh. Under it live the accessor table and the
//! inbox list; a flushing thread commits its writes and drops a stale
//! notice into every other registered inbox before releasing, so no
//! ordering between per-slot locks ever arises. Contention is the cost,
//! and an accepted one: flushes are rare next to cached reads and writes,
//! which never take the lock at all.

use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::runtime::{accessors::AccessorTable, shadow::HeapObject};

/// A thread's stale-notice inbox.
///
/// Writers are other threads holding the global lock during their flush;
/// the owning thread drains it during refresh, also under the global
/// lock. The inner mutexes see no contention in practice; they exist
/// because the inbox is shared between threads.
#[derive(Default)]
pub struct Inbox {
    stale_slots: Mutex<Vec<u32>>,
    stale_objects: Mutex<Vec<Weak<HeapObject>>>,
}

impl Inbox {
    /// Note that `slot`'s master copy changed. Duplicate notices collapse.
    pub(crate) fn note_slot(&self, slot: u32) {
        let mut slots = lock!(self.stale_slots);
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }

    /// Note that `object`'s master copy changed. Duplicate notices
    /// collapse; the object is held weakly.
    pub(crate) fn note_object(&self, object: &Arc<HeapObject>) {
        let mut objects = lock!(self.stale_objects);
        let ptr = Arc::as_ptr(object);
        if !objects.iter().any(|w| w.as_ptr() == ptr) {
            objects.push(Arc::downgrade(object));
        }
    }

    /// Take all pending slot notices.
    pub(crate) fn drain_slots(&self) -> Vec<u32> {
        std::mem::take(&mut *lock!(self.stale_slots))
    }

    /// Take all pending object notices. Entries whose object died since
    /// the notice will fail to upgrade and are simply skipped.
    pub(crate) fn drain_objects(&self) -> Vec<Weak<HeapObject>> {
        std::mem::take(&mut *lock!(self.stale_objects))
    }
}

/// State guarded by the global coherence lock.
pub(crate) struct RegistryInner {
    /// One inbox per live registered thread.
    inboxes: Vec<Arc<Inbox>>,
    /// Static slot bindings.
    pub(crate) accessors: AccessorTable,
}

impl RegistryInner {
    /// Push a slot notice to every inbox except the flusher's own.
    pub(crate) fn broadcast_slot(&self, from: &Arc<Inbox>, slot: u32) {
        for inbox in &self.inboxes {
            if !Arc::ptr_eq(inbox, from) {
                inbox.note_slot(slot);
            }
        }
    }

    /// Push an object notice to every inbox except the flusher's own.
    pub(crate) fn broadcast_object(&self, from: &Arc<Inbox>, object: &Arc<HeapObject>) {
        for inbox in &self.inboxes {
            if !Arc::ptr_eq(inbox, from) {
                inbox.note_object(object);
            }
        }
    }
}

/// Registry of participating threads, owner of the global lock.
pub struct ThreadRegistry {
    inner: Mutex<RegistryInner>,
}

impl Default for ThreadRegistry {
    fn default() -> Self {
        ThreadRegistry::new()
    }
}

impl ThreadRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        ThreadRegistry {
            inner: Mutex::new(RegistryInner {
                inboxes: Vec::new(),
                accessors: AccessorTable::new(),
            }),
        }
    }

    /// Acquire the global coherence lock.
    pub(crate) fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        lock!(self.inner)
    }

    /// Register a new thread, creating its inbox.
    pub(crate) fn register(&self) -> Arc<Inbox> {
        let inbox = Arc::new(Inbox::default());
        self.lock().inboxes.push(Arc::clone(&inbox));
        inbox
    }

    /// Remove a departed thread's inbox.
    pub(crate) fn unregister(&self, inbox: &Arc<Inbox>) {
        self.lock().inboxes.retain(|i| !Arc::ptr_eq(i, inbox));
    }

    /// Number of registered threads.
    #[must_use]
    pub fn thread_count(&self) -> usize {
        self.lock().inboxes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{
        shadow::{ShadowClass, ShadowFieldInfo},
        value::TypeKind,
    };

    #[test]
    fn register_and_unregister() {
        let registry = ThreadRegistry::new();
        let a = registry.register();
        let _b = registry.register();
        assert_eq!(registry.thread_count(), 2);
        registry.unregister(&a);
        assert_eq!(registry.thread_count(), 1);
    }

    #[test]
    fn broadcast_skips_sender_and_dedups() {
        let registry = ThreadRegistry::new();
        let sender = registry.register();
        let receiver = registry.register();

        {
            let inner = registry.lock();
            inner.broadcast_slot(&sender, 4);
            inner.broadcast_slot(&sender, 4);
            inner.broadcast_slot(&sender, 9);
        }

        assert_eq!(receiver.drain_slots(), vec![4, 9]);
        assert!(sender.drain_slots().is_empty());
    }

    #[test]
    fn dead_object_notice_fails_upgrade() {
        let class = ShadowClass::new(
            "demo/Node",
            vec![ShadowFieldInfo {
                name: "next".to_string(),
                kind: TypeKind::Reference,
                is_volatile: false,
            }],
        );
        let inbox = Inbox::default();
        let object = HeapObject::allocate(&class);
        inbox.note_object(&object);
        drop(object);

        let notices = inbox.drain_objects();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].upgrade().is_none());
    }
}
