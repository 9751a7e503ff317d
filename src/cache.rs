//! Object caches backing the lifecycle table.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::error::{BuildError, BuildResult};
use crate::instance::AnyArc;
use crate::key::{CacheKey, TypeKey};

/// A thread-safe object cache with build-once semantics per cache key.
///
/// Each (plugin type, instance name) pair maps to its own once-cell, so a
/// cache miss runs exactly one build even under concurrent resolution;
/// losers of the race block on the winner's cell and share the result. The
/// entry lock is only held long enough to fetch the cell, never across a
/// build.
#[derive(Default)]
pub(crate) struct ObjectCache {
    entries: Mutex<HashMap<CacheKey, Arc<OnceCell<AnyArc>>>>,
    disposed: AtomicBool,
}

impl ObjectCache {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns the cached object, building it first on a miss.
    ///
    /// A failed build leaves the cell empty, so a later resolution retries.
    pub(crate) fn get_or_build(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> BuildResult<AnyArc>,
    ) -> BuildResult<AnyArc> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(BuildError::Disposed);
        }
        let cell = {
            let mut entries = self.entries.lock();
            entries.entry(key).or_insert_with(|| Arc::new(OnceCell::new())).clone()
        };
        cell.get_or_try_init(build).cloned()
    }

    pub(crate) fn cached(&self, key: &CacheKey) -> Option<AnyArc> {
        self.entries.lock().get(key).and_then(|cell| cell.get().cloned())
    }

    /// Drops every entry for one plugin type, returning the evicted objects
    /// so the caller can run their disposers.
    pub(crate) fn evict_plugin(&self, plugin: &TypeKey) -> Vec<AnyArc> {
        let mut entries = self.entries.lock();
        let doomed: Vec<CacheKey> = entries
            .keys()
            .filter(|k| k.plugin == *plugin)
            .copied()
            .collect();
        doomed
            .into_iter()
            .filter_map(|k| entries.remove(&k).and_then(|cell| cell.get().cloned()))
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.entries.lock().clear();
    }

    pub(crate) fn mark_disposed(&self) {
        self.disposed.store(true, Ordering::Release);
        self.clear();
    }
}

thread_local! {
    // Keyed by owning pipeline id so distinct containers on one thread
    // never share thread-local objects.
    static THREAD_OBJECTS: RefCell<HashMap<(u64, CacheKey), AnyArc>> =
        RefCell::new(HashMap::new());
}

/// Per-thread object store for the thread-local lifecycle.
///
/// Entries live in a thread-local map keyed by the owning pipeline's id;
/// eviction from another thread cannot reach entries this thread never
/// created, so eviction and clearing act on the calling thread only.
pub(crate) struct ThreadLocalCache {
    owner: u64,
}

impl ThreadLocalCache {
    pub(crate) fn new(owner: u64) -> Self {
        Self { owner }
    }

    pub(crate) fn get_or_build(
        &self,
        key: CacheKey,
        build: impl FnOnce() -> BuildResult<AnyArc>,
    ) -> BuildResult<AnyArc> {
        let existing = THREAD_OBJECTS.with(|map| map.borrow().get(&(self.owner, key)).cloned());
        if let Some(obj) = existing {
            return Ok(obj);
        }
        let built = build()?;
        THREAD_OBJECTS.with(|map| {
            map.borrow_mut().insert((self.owner, key), built.clone());
        });
        Ok(built)
    }

    pub(crate) fn evict_plugin(&self, plugin: &TypeKey) {
        THREAD_OBJECTS.with(|map| {
            map.borrow_mut()
                .retain(|(owner, k), _| *owner != self.owner || k.plugin != *plugin);
        });
    }

    pub(crate) fn clear(&self) {
        THREAD_OBJECTS.with(|map| {
            map.borrow_mut().retain(|(owner, _), _| *owner != self.owner);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of<T: 'static>(name: &'static str) -> CacheKey {
        CacheKey::new(TypeKey::of::<T>(), name)
    }

    #[test]
    fn second_lookup_reuses_first_build() {
        let cache = ObjectCache::new();
        let key = key_of::<u32>("default");
        let a = cache.get_or_build(key, || Ok(Arc::new(7u32) as AnyArc)).unwrap();
        let b = cache
            .get_or_build(key, || panic!("must not rebuild"))
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn failed_build_is_retried() {
        let cache = ObjectCache::new();
        let key = key_of::<u32>("default");
        let err = cache
            .get_or_build(key, || Err(BuildError::execution_message("u32", "boom")))
            .unwrap_err();
        assert!(matches!(err, BuildError::Execution { .. }));
        let ok = cache.get_or_build(key, || Ok(Arc::new(1u32) as AnyArc));
        assert!(ok.is_ok());
    }

    #[test]
    fn eviction_is_per_plugin_type() {
        let cache = ObjectCache::new();
        let ka = key_of::<u32>("default");
        let kb = key_of::<u64>("default");
        cache.get_or_build(ka, || Ok(Arc::new(1u32) as AnyArc)).unwrap();
        cache.get_or_build(kb, || Ok(Arc::new(2u64) as AnyArc)).unwrap();
        let evicted = cache.evict_plugin(&TypeKey::of::<u32>());
        assert_eq!(evicted.len(), 1);
        assert!(cache.cached(&ka).is_none());
        assert!(cache.cached(&kb).is_some());
    }

    #[test]
    fn disposed_cache_refuses_builds() {
        let cache = ObjectCache::new();
        cache.mark_disposed();
        let err = cache
            .get_or_build(key_of::<u32>("default"), || Ok(Arc::new(1u32) as AnyArc))
            .unwrap_err();
        assert!(matches!(err, BuildError::Disposed));
    }

    #[test]
    fn thread_cache_is_scoped_to_owner() {
        let a = ThreadLocalCache::new(101);
        let b = ThreadLocalCache::new(102);
        let key = key_of::<u32>("default");
        a.get_or_build(key, || Ok(Arc::new(1u32) as AnyArc)).unwrap();
        let other = b.get_or_build(key, || Ok(Arc::new(2u32) as AnyArc)).unwrap();
        let mine = a.get_or_build(key, || panic!("cached")).unwrap();
        assert!(!Arc::ptr_eq(&mine, &other));
        a.clear();
        b.clear();
    }
}
