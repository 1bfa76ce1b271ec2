//! Session-level identity cache.
//!
//! Each persisted row is represented by at most one in-memory instance per
//! session: a read that finds the row's identity here returns the cached
//! instance instead of the freshly decoded one.
//!
//! # Capacity
//!
//! The cache is recycled as a whole rather than evicting single entries.
//! When it is recyclable and holds `capacity` entries, [`IdentityCache::put`]
//! refuses new entries; the caller then [`recycle`](IdentityCache::recycle)s
//! and retries. A non-recyclable cache ignores its capacity.

use std::collections::HashMap;

use relorm_core::{ObjectIdentity, ObjectRef};

/// Identity to instance map for one session.
#[derive(Debug)]
pub struct IdentityCache {
    entries: HashMap<ObjectIdentity, ObjectRef>,
    capacity: usize,
    recyclable: bool,
}

impl IdentityCache {
    pub fn new(capacity: usize, recyclable: bool) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
            recyclable,
        }
    }

    pub fn get(&self, identity: &ObjectIdentity) -> Option<ObjectRef> {
        self.entries.get(identity).cloned()
    }

    /// Cache `object` under `identity`. Returns `false` without caching when
    /// the cache is recyclable and full. Replacing an existing entry always
    /// succeeds.
    pub fn put(&mut self, identity: ObjectIdentity, object: ObjectRef) -> bool {
        if self.is_full() && !self.entries.contains_key(&identity) {
            return false;
        }
        self.entries.insert(identity, object);
        true
    }

    /// Cache `object`, recycling the whole cache first if it is full.
    pub fn put_or_recycle(&mut self, identity: ObjectIdentity, object: ObjectRef) -> bool {
        if self.put(identity.clone(), object.clone()) {
            return true;
        }
        self.recycle();
        self.put(identity, object)
    }

    pub fn remove(&mut self, identity: &ObjectIdentity) -> Option<ObjectRef> {
        self.entries.remove(identity)
    }

    /// Drop every entry.
    pub fn recycle(&mut self) {
        tracing::debug!(entries = self.entries.len(), "Recycling identity cache");
        self.entries.clear();
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
    }

    pub fn is_recyclable(&self) -> bool {
        self.recyclable
    }

    pub fn set_recyclable(&mut self, recyclable: bool) {
        self.recyclable = recyclable;
    }

    fn is_full(&self) -> bool {
        self.recyclable && self.entries.len() >= self.capacity
    }
}
