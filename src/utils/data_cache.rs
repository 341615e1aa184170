use std::{
    collections::{HashMap, hash_map::Entry},
    time::Instant,
};

use crate::resource::ResourcePath;

/// One cached payload. `generation` is unique per insertion, so work queued
/// for an entry that was since dropped and re-created can be told apart.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub payload: T,
    pub refcount: usize,
    pub generation: u64,
    pending: bool,
    unload_at: Option<Instant>,
}

impl<T> CacheEntry<T> {
    fn new(payload: T, generation: u64) -> Self {
        Self {
            payload,
            refcount: 1,
            generation,
            pending: true,
            unload_at: None,
        }
    }

    fn expired(&self, now: Instant) -> bool {
        self.unload_at.is_some_and(|when| when <= now)
    }
}

/// Result of [`DataCache::acquire`].
pub enum Acquired<'a, T> {
    /// The key was already cached; its refcount was bumped.
    Shared(&'a mut CacheEntry<T>),
    /// A new pending entry was inserted.
    Created(&'a mut CacheEntry<T>),
}

/// Reference-counted entries keyed by resource path. An entry whose count
/// drops to zero lingers until its unload deadline so that a quick
/// release/re-acquire keeps the loaded payload.
#[derive(Debug)]
pub struct DataCache<T> {
    data: HashMap<ResourcePath, CacheEntry<T>>,
    next_generation: u64,
}

impl<T> Default for DataCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> DataCache<T> {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            next_generation: 1,
        }
    }

    pub fn get(&self, key: &ResourcePath) -> Option<&CacheEntry<T>> {
        self.data.get(key)
    }

    pub fn contains(&self, key: &ResourcePath) -> bool {
        self.data.contains_key(key)
    }

    /// Entries still waiting on [`DataCache::complete`].
    pub fn pending(&self) -> usize {
        self.data.values().filter(|entry| entry.pending).count()
    }

    /// Takes a reference on `key`, inserting a pending entry built by
    /// `create` when absent. A re-acquired entry stops counting down to its
    /// unload.
    pub fn acquire<F>(&mut self, key: &ResourcePath, create: F) -> Acquired<'_, T>
    where
        F: FnOnce() -> T,
    {
        match self.data.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                entry.refcount += 1;
                entry.unload_at = None;
                Acquired::Shared(entry)
            }
            Entry::Vacant(vacant) => {
                let generation = self.next_generation;
                self.next_generation += 1;
                Acquired::Created(vacant.insert(CacheEntry::new(create(), generation)))
            }
        }
    }

    /// Drops one reference. At zero the entry is scheduled to unload at
    /// `unload_at`.
    pub fn release(&mut self, key: &ResourcePath, unload_at: Instant) -> Option<&CacheEntry<T>> {
        let entry = self.data.get_mut(key)?;
        entry.refcount = entry.refcount.saturating_sub(1);
        if entry.refcount == 0 {
            entry.unload_at = Some(unload_at);
        }
        Some(entry)
    }

    /// Marks the entry for `key` complete, provided it is the same insertion
    /// the work was queued for and nothing completed it yet.
    pub fn complete(&mut self, key: &ResourcePath, generation: u64) -> Option<&mut CacheEntry<T>> {
        let entry = self
            .data
            .get_mut(key)
            .filter(|entry| entry.generation == generation && entry.pending)?;
        entry.pending = false;
        Some(entry)
    }

    /// Removes an unreferenced entry for which `stale` holds.
    pub fn evict_unreferenced<F>(&mut self, key: &ResourcePath, stale: F) -> Option<CacheEntry<T>>
    where
        F: FnOnce(&CacheEntry<T>) -> bool,
    {
        let evict = self
            .data
            .get(key)
            .is_some_and(|entry| entry.refcount == 0 && stale(entry));
        if evict { self.data.remove(key) } else { None }
    }

    pub fn drain_expired(&mut self, now: Instant) -> Vec<(ResourcePath, CacheEntry<T>)> {
        let (expired, kept): (HashMap<_, _>, HashMap<_, _>) = std::mem::take(&mut self.data)
            .into_iter()
            .partition(|(_, entry)| entry.expired(now));
        self.data = kept;
        expired.into_iter().collect()
    }
}
