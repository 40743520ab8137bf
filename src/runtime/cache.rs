//! The per-thread cache and its flush/refresh protocol.
//!
//! A [`ThreadCtx`] is one thread's view of all shared state: a `local`
//! column the thread reads and writes without any locking, a `mirror`
//! column recording the last value it observed in (or committed to) main
//! memory, and a queue of entries awaiting flush. The distance between
//! `local` and `mirror` is exactly the set of writes other threads cannot
//! see yet.
//!
//! Writes pass a guard before they queue: a write joins the flush queue
//! only when it changes the value relative to the mirror and either the
//! slot was clean or it was last written under a different scope depth.
//! Re-writing a slot that is already queued and already dirty in the same
//! scope changes `local` only, which is what keeps the queue deduplicated
//! without searching it.
//!
//! Flush and refresh both run under the registry's global lock, so a
//! flush commits its whole batch and posts its stale notices atomically
//! with respect to every other thread's flush and refresh.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::{
    runtime::{
        registry::{Inbox, RegistryInner},
        shadow::{HeapObject, ObjectShadow},
        value::Value,
        Coherence,
    },
    Result,
};

/// Identity key for per-object shadow lookup.
type ObjectKey = usize;

fn key_of(object: &Arc<HeapObject>) -> ObjectKey {
    Arc::as_ptr(object) as ObjectKey
}

/// One thread's cache over all instrumented shared state.
///
/// Obtained from [`Coherence::enter_thread`]; thread-confined by use, not
/// by type. Dropping the context flushes whatever is still queued and
/// removes the thread from the registry.
pub struct ThreadCtx {
    runtime: Arc<Coherence>,
    inbox: Arc<Inbox>,
    /// Working copy of each static slot, `None` until first touched.
    local: Vec<Option<Value>>,
    /// Last value observed in or committed to the slot's master copy.
    mirror: Vec<Option<Value>>,
    /// Scope depth current when each slot was last written.
    slot_scope: Vec<u64>,
    /// Current scope nesting depth.
    scope: u64,
    /// Static slots awaiting flush, insertion-ordered, no duplicates.
    pending_slots: Vec<u32>,
    /// Per-object shadows, keyed by object identity.
    shadows: HashMap<ObjectKey, ObjectShadow>,
    /// Objects awaiting flush, held weakly.
    pending_objects: Vec<(ObjectKey, Weak<HeapObject>)>,
}

impl ThreadCtx {
    pub(crate) fn new(runtime: Arc<Coherence>, inbox: Arc<Inbox>) -> Self {
        ThreadCtx {
            runtime,
            inbox,
            local: Vec::new(),
            mirror: Vec::new(),
            slot_scope: Vec::new(),
            scope: 1,
            pending_slots: Vec::new(),
            shadows: HashMap::new(),
            pending_objects: Vec::new(),
        }
    }

    /// Current scope nesting depth. Starts at 1 on thread entry.
    #[must_use]
    pub fn scope_depth(&self) -> u64 {
        self.scope
    }

    /// Number of entries currently queued for flush.
    #[must_use]
    pub fn pending_flush_len(&self) -> usize {
        self.pending_slots.len() + self.pending_objects.len()
    }

    fn grow_to(&mut self, slot: u32) {
        let needed = slot as usize + 1;
        if self.local.len() < needed {
            self.local.resize(needed, None);
            self.mirror.resize(needed, None);
            self.slot_scope.resize(needed, 0);
        }
    }

    /// Fault the slot in from main memory if this thread never touched it.
    /// Caller holds the global lock.
    fn load_slot_locked(&mut self, inner: &RegistryInner, slot: u32) -> Result<()> {
        self.grow_to(slot);
        if self.mirror[slot as usize].is_none() {
            let accessor = inner.accessors.get(slot)?;
            let value = (accessor.getter)();
            self.mirror[slot as usize] = Some(value.clone());
            self.local[slot as usize] = Some(value);
        }
        Ok(())
    }

    /// Read a static slot through the cache.
    ///
    /// Non-volatile reads return the thread's working copy; a volatile
    /// read refreshes the whole cache first.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAccessor`] if the slot was never
    /// bound.
    pub fn read_static(&mut self, slot: u32) -> Result<Value> {
        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        if inner.accessors.get(slot)?.is_volatile {
            self.refresh_locked(&inner)?;
        }
        self.load_slot_locked(&inner, slot)?;
        Ok(self.local[slot as usize].clone().unwrap_or(Value::Prim(0)))
    }

    /// Write a static slot through the cache.
    ///
    /// The write always lands in the working copy; it joins the flush
    /// queue only when the guard passes. A volatile write flushes the
    /// whole cache immediately.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAccessor`] if the slot was never
    /// bound.
    pub fn write_static(&mut self, slot: u32, value: Value) -> Result<()> {
        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        let is_volatile = inner.accessors.get(slot)?.is_volatile;
        self.load_slot_locked(&inner, slot)?;

        let index = slot as usize;
        // load_slot_locked guarantees both columns are populated.
        let mirror = self.mirror[index].clone().unwrap_or(Value::Prim(0));
        let local = self.local[index].clone().unwrap_or(Value::Prim(0));
        if !value.same(&mirror) && (local.same(&mirror) || self.slot_scope[index] != self.scope) {
            if !self.pending_slots.contains(&slot) {
                self.pending_slots.push(slot);
            }
        }

        self.local[index] = Some(value);
        self.slot_scope[index] = self.scope;

        if is_volatile {
            self.flush_locked(&inner)?;
        }
        Ok(())
    }

    fn shadow_for(&mut self, object: &Arc<HeapObject>) -> &mut ObjectShadow {
        self.shadows
            .entry(key_of(object))
            .or_insert_with(|| ObjectShadow::load(object))
    }

    /// Read an instance field through the cache.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownShadowField`] if the object's layout
    /// declares no such field.
    pub fn read_field(&mut self, object: &Arc<HeapObject>, name: &str) -> Result<Value> {
        let index = object.class().field_index(name)?;
        let is_volatile = object.class().fields()[index].is_volatile;

        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        if is_volatile {
            self.refresh_locked(&inner)?;
        }
        let shadow = self.shadow_for(object);
        Ok(shadow.local[index].clone())
    }

    /// Write an instance field through the cache.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownShadowField`] if the object's layout
    /// declares no such field.
    pub fn write_field(&mut self, object: &Arc<HeapObject>, name: &str, value: Value) -> Result<()> {
        let index = object.class().field_index(name)?;
        let is_volatile = object.class().fields()[index].is_volatile;

        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        let scope = self.scope;
        let shadow = self.shadow_for(object);

        let guard = !value.same(&shadow.mirror[index])
            && (shadow.local[index].same(&shadow.mirror[index])
                || shadow.field_scope[index] != scope);
        shadow.local[index] = value;
        shadow.field_scope[index] = scope;

        if guard && !shadow.dirty {
            shadow.dirty = true;
            let entry = (key_of(object), Arc::downgrade(object));
            self.pending_objects.push(entry);
        }

        if is_volatile {
            self.flush_locked(&inner)?;
        }
        Ok(())
    }

    /// Commit every queued write to main memory and post stale notices to
    /// all other threads. Caller holds the global lock.
    fn flush_locked(&mut self, inner: &RegistryInner) -> Result<()> {
        let slots = std::mem::take(&mut self.pending_slots);
        for slot in slots {
            let index = slot as usize;
            let (Some(local), Some(mirror)) = (&self.local[index], &self.mirror[index]) else {
                continue;
            };
            if local.same(mirror) {
                continue;
            }
            let accessor = inner.accessors.get(slot)?;
            match &accessor.setter {
                Some(setter) => setter(local.clone()),
                None => {
                    log::warn!("discarding write to read-only slot {slot}");
                    continue;
                }
            }
            self.mirror[index] = self.local[index].clone();
            inner.broadcast_slot(&self.inbox, slot);
        }

        let objects = std::mem::take(&mut self.pending_objects);
        for (key, weak) in objects {
            let Some(object) = weak.upgrade() else {
                // The object died with writes still queued. Nothing can
                // observe them anymore; drop the shadow with the notice.
                log::debug!("dropping queued writes to a collected object");
                self.shadows.remove(&key);
                continue;
            };
            let Some(shadow) = self.shadows.get_mut(&key) else {
                continue;
            };
            let mut committed = false;
            for index in 0..shadow.local.len() {
                if !shadow.local[index].same(&shadow.mirror[index]) {
                    object.store(index, shadow.local[index].clone());
                    shadow.mirror[index] = shadow.local[index].clone();
                    committed = true;
                }
            }
            shadow.dirty = false;
            if committed {
                inner.broadcast_object(&self.inbox, &object);
            }
        }
        Ok(())
    }

    /// Re-read every slot and object named by a pending stale notice.
    /// Caller holds the global lock.
    fn refresh_locked(&mut self, inner: &RegistryInner) -> Result<()> {
        for slot in self.inbox.drain_slots() {
            let accessor = inner.accessors.get(slot)?;
            let value = (accessor.getter)();
            self.grow_to(slot);
            self.mirror[slot as usize] = Some(value.clone());
            self.local[slot as usize] = Some(value);
        }

        for weak in self.inbox.drain_objects() {
            let Some(object) = weak.upgrade() else {
                log::debug!("dropping stale notice for a collected object");
                continue;
            };
            if let Some(shadow) = self.shadows.get_mut(&key_of(&object)) {
                shadow.reload(&object);
            }
        }
        Ok(())
    }

    /// Flush all queued writes to main memory.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAccessor`] if a queued slot lost
    /// its binding, which indicates a protocol violation.
    pub fn flush(&mut self) -> Result<()> {
        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        self.flush_locked(&inner)
    }

    /// Apply all pending stale notices, discarding local state for the
    /// named entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnresolvedAccessor`] if a noticed slot lost
    /// its binding.
    pub fn refresh(&mut self) -> Result<()> {
        let runtime = Arc::clone(&self.runtime);
        let inner = runtime.registry().lock();
        self.refresh_locked(&inner)
    }

    /// Enter a synchronization scope: bump the depth, then pick up other
    /// threads' committed writes.
    ///
    /// # Errors
    /// Propagates refresh failures.
    pub fn enter_scope(&mut self) -> Result<()> {
        self.scope += 1;
        self.refresh()
    }

    /// Leave a synchronization scope: publish queued writes, then drop the
    /// depth.
    ///
    /// # Errors
    /// Propagates flush failures.
    pub fn leave_scope(&mut self) -> Result<()> {
        self.flush()?;
        self.scope = self.scope.saturating_sub(1);
        Ok(())
    }
}

impl Drop for ThreadCtx {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            log::error!("flush on thread exit failed: {err}");
        }
        self.runtime.registry().unregister(&self.inbox);
    }
}
