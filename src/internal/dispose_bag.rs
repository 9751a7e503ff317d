//! Disposal hooks with LIFO execution order.

use crate::key::CacheKey;

/// Disposal contract for objects that must release resources when their
/// owning container, nested container, or cache is disposed.
///
/// Objects register themselves from their build plan via
/// [`BuildContext::register_disposer`](crate::BuildContext::register_disposer);
/// hooks run in LIFO order (last built, first disposed).
pub trait Dispose: Send + Sync {
    /// Releases the object's resources.
    fn dispose(&self);
}

/// Container for disposal hooks, drained LIFO on dispose.
///
/// Hooks registered during a cached build carry their cache key, so ejecting
/// a plugin type can run exactly the hooks belonging to its evicted objects.
#[derive(Default)]
pub(crate) struct DisposeBag {
    hooks: Vec<(Option<CacheKey>, Box<dyn FnOnce() + Send>)>,
}

impl DisposeBag {
    pub(crate) fn push(&mut self, tag: Option<CacheKey>, f: Box<dyn FnOnce() + Send>) {
        self.hooks.push((tag, f));
    }

    pub(crate) fn run_all_reverse(&mut self) {
        while let Some((_, f)) = self.hooks.pop() {
            (f)();
        }
    }

    /// Removes and runs the hooks tagged with the given plugin type, newest
    /// first. Untagged hooks stay put.
    pub(crate) fn run_for_plugin(&mut self, plugin: &crate::key::TypeKey) {
        let mut doomed = Vec::new();
        let mut idx = 0;
        while idx < self.hooks.len() {
            if matches!(&self.hooks[idx].0, Some(tag) if tag.plugin == *plugin) {
                doomed.push(self.hooks.remove(idx).1);
            } else {
                idx += 1;
            }
        }
        while let Some(f) = doomed.pop() {
            (f)();
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::TypeKey;
    use std::sync::{Arc, Mutex};

    #[test]
    fn hooks_run_lifo() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        for i in 0..3 {
            let order = order.clone();
            bag.push(None, Box::new(move || order.lock().unwrap().push(i)));
        }
        bag.run_all_reverse();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
        assert!(bag.is_empty());
    }

    #[test]
    fn plugin_scoped_drain_leaves_other_hooks() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut bag = DisposeBag::default();
        let tag = CacheKey::new(TypeKey::of::<u32>(), "default");
        let other = CacheKey::new(TypeKey::of::<u64>(), "default");
        for (label, key) in [("a", tag), ("b", other), ("c", tag)] {
            let hits = hits.clone();
            bag.push(Some(key), Box::new(move || hits.lock().unwrap().push(label)));
        }
        bag.run_for_plugin(&TypeKey::of::<u32>());
        assert_eq!(*hits.lock().unwrap(), vec!["c", "a"]);
        assert!(!bag.is_empty());
    }
}
