//! Pipeline layering: chained configuration layers with their caches.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::cache::{ObjectCache, ThreadLocalCache};
use crate::error::{BuildError, BuildResult};
use crate::family::PluginFamily;
use crate::graph::{BuildUpFn, PluginGraph};
use crate::instance::{Builder, Instance};
use crate::internal::DisposeBag;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;
use crate::policies::InstancePolicy;
use crate::registry::Registry;

static NEXT_PIPELINE_ID: AtomicU64 = AtomicU64::new(1);

/// How a pipeline layer participates in lifecycle routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PipelineRole {
    /// The container's root layer. Owns the singleton cache.
    Root,
    /// A profile or child-container layer.
    ProfileOrChild,
    /// A nested (request-scoped) layer. Captures nested-container objects.
    Nested,
}

/// One configuration layer chained to its parent, with the caches it owns.
///
/// Lookups consult this layer's graph first and fall through to the parent
/// chain on a miss, so child layers shadow parent registrations by instance
/// name without copying the parent graph. Locks guard the graph only during
/// lookups; instances are cloned out before any build runs.
pub(crate) struct PipelineGraph {
    id: u64,
    role: PipelineRole,
    profile: Option<&'static str>,
    graph: RwLock<PluginGraph>,
    parent: Option<Arc<PipelineGraph>>,
    /// Root layer only.
    singletons: Option<ObjectCache>,
    layer_cache: ObjectCache,
    thread_cache: ThreadLocalCache,
    pub(crate) disposers: Mutex<DisposeBag>,
    disposed: AtomicBool,
    policies: Mutex<Vec<Arc<dyn InstancePolicy>>>,
}

/// Read-only view of one merged plugin family, for reports and validation.
pub(crate) struct FamilySnapshot {
    pub(crate) plugin: TypeKey,
    pub(crate) default_name: Option<&'static str>,
    pub(crate) instances: Vec<InstanceSnapshot>,
}

pub(crate) struct InstanceSnapshot {
    pub(crate) name: &'static str,
    pub(crate) concrete: &'static str,
    pub(crate) lifecycle: Lifecycle,
}

impl PipelineGraph {
    pub(crate) fn root(
        graph: PluginGraph,
        policies: Vec<Arc<dyn InstancePolicy>>,
    ) -> Arc<Self> {
        let id = NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id,
            role: PipelineRole::Root,
            profile: None,
            graph: RwLock::new(graph),
            parent: None,
            singletons: Some(ObjectCache::new()),
            layer_cache: ObjectCache::new(),
            thread_cache: ThreadLocalCache::new(id),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
            policies: Mutex::new(policies),
        })
    }

    fn child(parent: &Arc<PipelineGraph>, role: PipelineRole, profile: Option<&'static str>) -> Arc<Self> {
        let id = NEXT_PIPELINE_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id,
            role,
            profile,
            graph: RwLock::new(PluginGraph::new()),
            parent: Some(parent.clone()),
            singletons: None,
            layer_cache: ObjectCache::new(),
            thread_cache: ThreadLocalCache::new(id),
            disposers: Mutex::new(DisposeBag::default()),
            disposed: AtomicBool::new(false),
            policies: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn profile_child(parent: &Arc<PipelineGraph>, profile: &'static str) -> Arc<Self> {
        Self::child(parent, PipelineRole::ProfileOrChild, Some(profile))
    }

    pub(crate) fn nested(parent: &Arc<PipelineGraph>) -> Arc<Self> {
        Self::child(parent, PipelineRole::Nested, None)
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn role(&self) -> PipelineRole {
        self.role
    }

    fn root_pipeline(&self) -> &PipelineGraph {
        let mut current = self;
        while let Some(parent) = current.parent.as_deref() {
            current = parent;
        }
        current
    }

    /// The active profile: this layer's own, or the nearest ancestor's.
    /// Whether the layer with the given id is this layer or an ancestor.
    pub(crate) fn descends_from(&self, id: u64) -> bool {
        let mut current = Some(self);
        while let Some(layer) = current {
            if layer.id == id {
                return true;
            }
            current = layer.parent.as_deref();
        }
        false
    }

    pub(crate) fn profile_name(&self) -> Option<&'static str> {
        let mut current = Some(self);
        while let Some(layer) = current {
            if let Some(profile) = layer.profile {
                return Some(profile);
            }
            current = layer.parent.as_deref();
        }
        None
    }

    pub(crate) fn assert_alive(&self) -> BuildResult<()> {
        let mut current = Some(self);
        while let Some(layer) = current {
            if layer.disposed.load(Ordering::Acquire) {
                return Err(BuildError::Disposed);
            }
            current = layer.parent.as_deref();
        }
        Ok(())
    }

    pub(crate) fn singleton_cache(&self) -> &ObjectCache {
        let root = self.root_pipeline();
        root.singletons.as_ref().unwrap_or(&root.layer_cache)
    }

    pub(crate) fn layer_cache(&self) -> &ObjectCache {
        &self.layer_cache
    }

    pub(crate) fn thread_cache(&self) -> &ThreadLocalCache {
        &self.thread_cache
    }

    /// The build-up action registered for a concrete type, nearest layer
    /// first.
    pub(crate) fn build_up_fn(&self, key: &TypeKey) -> Option<BuildUpFn> {
        let mut current = Some(self);
        while let Some(layer) = current {
            if let Some(action) = layer.graph.read().build_ups.get(key) {
                return Some(action.clone());
            }
            current = layer.parent.as_deref();
        }
        None
    }

    /// Follows alias registrations inside one family until a buildable
    /// instance is found. A dangling or cyclic alias chain is a
    /// configuration error; an unknown starting name is a plain miss.
    fn resolve_alias(
        family: &PluginFamily,
        name: &'static str,
    ) -> BuildResult<Option<(Instance, Lifecycle)>> {
        let mut seen: Vec<&'static str> = vec![name];
        let mut current = name;
        loop {
            let instance = match family.named(current) {
                Some(instance) => instance,
                None if current == name => return Ok(None),
                None => {
                    return Err(BuildError::configuration(
                        family.plugin_key().display_name(),
                        format!("alias chain from '{name}' points at unknown instance '{current}'"),
                    ))
                }
            };
            match instance.builder() {
                Builder::Reference(target) => {
                    let target = *target;
                    if seen.contains(&target) {
                        return Err(BuildError::configuration(
                            family.plugin_key().display_name(),
                            format!("alias chain from '{name}' is cyclic"),
                        ));
                    }
                    seen.push(target);
                    current = target;
                }
                _ => {
                    return Ok(Some((instance.clone(), family.lifecycle_of(instance))));
                }
            }
        }
    }

    /// Synthesizes a closed family from a matching open template when no
    /// layer has a family for the requested closed generic type yet.
    fn ensure_closed(&self, key: &TypeKey) -> BuildResult<()> {
        if key.generic_base().is_none() {
            return Ok(());
        }
        let mut current = Some(self);
        while let Some(layer) = current {
            if layer.graph.read().family(key).is_some() {
                return Ok(());
            }
            current = layer.parent.as_deref();
        }
        let mut current = Some(self);
        while let Some(layer) = current {
            if layer.graph.read().template_matching(key).is_some() {
                let mut graph = layer.graph.write();
                if graph.family(key).is_none() {
                    let family = match graph.template_matching(key) {
                        Some(template) => template.close(key)?,
                        None => return Ok(()),
                    };
                    graph.families.insert(*key, family);
                    let policies = self.root_pipeline().policies.lock().clone();
                    if let Some(family) = graph.families.get_mut(key) {
                        for instance in family.instances_mut() {
                            for policy in &policies {
                                if instance.mark_policy_applied(policy.tag()) {
                                    policy.apply(key, instance);
                                }
                            }
                        }
                    }
                }
                return Ok(());
            }
            current = layer.parent.as_deref();
        }
        Ok(())
    }

    /// The profile's default-instance override for a plugin type, if any
    /// layer's override table names one.
    fn profile_override(&self, profile: &'static str, key: &TypeKey) -> Option<&'static str> {
        let mut current = Some(self);
        while let Some(layer) = current {
            if let Some(name) = layer.graph.read().profile_default(profile, key) {
                return Some(name);
            }
            current = layer.parent.as_deref();
        }
        None
    }

    /// Resolves the effective default instance for a plugin type.
    pub(crate) fn find_default(&self, key: &TypeKey) -> BuildResult<(Instance, Lifecycle)> {
        self.ensure_closed(key)?;
        if let Some(profile) = self.profile_name() {
            if let Some(name) = self.profile_override(profile, key) {
                return self.find_named(key, name);
            }
        }
        let mut current = Some(self);
        let mut family_seen = false;
        let mut crowded = false;
        while let Some(layer) = current {
            let graph = layer.graph.read();
            if let Some(family) = graph.family(key) {
                family_seen = true;
                if let Some(default) = family.default_instance() {
                    let name = default.name();
                    if let Some(found) = Self::resolve_alias(family, name)? {
                        return Ok(found);
                    }
                }
                if family.len() > 1 {
                    crowded = true;
                }
            }
            drop(graph);
            current = layer.parent.as_deref();
        }
        if crowded {
            Err(BuildError::configuration(
                key.display_name(),
                "multiple instances are registered and none is marked as the default",
            ))
        } else if family_seen {
            // A family exists (possibly synthesized with zero compatible
            // pluggers) but holds no buildable default: the instance is
            // absent, not the configuration.
            Err(BuildError::MissingInstance {
                plugin_type: key.display_name(),
                name: Instance::DEFAULT_NAME,
            })
        } else {
            Err(BuildError::configuration(
                key.display_name(),
                "no instances are registered for this plugin type",
            ))
        }
    }

    /// Resolves a named instance for a plugin type, trying the
    /// missing-instance fallback only after every layer misses the name.
    pub(crate) fn find_named(
        &self,
        key: &TypeKey,
        name: &'static str,
    ) -> BuildResult<(Instance, Lifecycle)> {
        self.ensure_closed(key)?;
        let mut current = Some(self);
        let mut family_seen = false;
        while let Some(layer) = current {
            let graph = layer.graph.read();
            if let Some(family) = graph.family(key) {
                family_seen = true;
                if let Some(found) = Self::resolve_alias(family, name)? {
                    return Ok(found);
                }
            }
            drop(graph);
            current = layer.parent.as_deref();
        }
        let mut current = Some(self);
        while let Some(layer) = current {
            let graph = layer.graph.read();
            if let Some(family) = graph.family(key) {
                if let Some(instance) = family.missing_instance(name) {
                    let lifecycle = family.lifecycle_of(&instance);
                    tracing::debug!(
                        plugin = key.display_name(),
                        name,
                        "missing-instance fallback produced an instance"
                    );
                    return Ok((instance, lifecycle));
                }
            }
            drop(graph);
            current = layer.parent.as_deref();
        }
        if family_seen {
            Err(BuildError::MissingInstance {
                plugin_type: key.display_name(),
                name,
            })
        } else {
            Err(BuildError::configuration(
                key.display_name(),
                "no instances are registered for this plugin type",
            ))
        }
    }

    /// Every visible instance of a plugin type, nearest layer first, with
    /// child layers shadowing parent instances of the same name.
    pub(crate) fn all_instances(&self, key: &TypeKey) -> BuildResult<Vec<(Instance, Lifecycle)>> {
        self.ensure_closed(key)?;
        let mut out: Vec<(Instance, Lifecycle)> = Vec::new();
        let mut current = Some(self);
        while let Some(layer) = current {
            let graph = layer.graph.read();
            if let Some(family) = graph.family(key) {
                for instance in family.instances() {
                    if matches!(instance.builder(), Builder::Reference(_)) {
                        continue;
                    }
                    if out.iter().any(|(seen, _)| seen.name() == instance.name()) {
                        continue;
                    }
                    out.push((instance.clone(), family.lifecycle_of(instance)));
                }
            }
            drop(graph);
            current = layer.parent.as_deref();
        }
        Ok(out)
    }

    /// Merged view of every family visible from this layer, sorted by
    /// plugin type name.
    pub(crate) fn snapshot(&self) -> Vec<FamilySnapshot> {
        let mut order: Vec<TypeKey> = Vec::new();
        let mut merged: HashMap<TypeKey, FamilySnapshot> = HashMap::new();
        let mut current = Some(self);
        while let Some(layer) = current {
            let graph = layer.graph.read();
            for (key, family) in &graph.families {
                let entry = merged.entry(*key).or_insert_with(|| {
                    order.push(*key);
                    FamilySnapshot {
                        plugin: *key,
                        default_name: None,
                        instances: Vec::new(),
                    }
                });
                if entry.default_name.is_none() {
                    entry.default_name = family.default_name();
                }
                for instance in family.instances() {
                    if entry.instances.iter().any(|i| i.name == instance.name()) {
                        continue;
                    }
                    entry.instances.push(InstanceSnapshot {
                        name: instance.name(),
                        concrete: instance.concrete_name(),
                        lifecycle: family.lifecycle_of(instance),
                    });
                }
            }
            drop(graph);
            current = layer.parent.as_deref();
        }
        let mut out: Vec<FamilySnapshot> = order
            .into_iter()
            .filter_map(|key| merged.remove(&key))
            .collect();
        out.sort_by_key(|f| f.plugin.display_name());
        out
    }

    /// Merges a freshly-configured registry delta into this layer.
    pub(crate) fn absorb_registry(&self, registry: Registry) {
        let (delta, new_policies) = registry.into_graph();
        let mut graph = self.graph.write();
        graph.absorb(delta);
        let mut policies = self.root_pipeline().policies.lock();
        policies.extend(new_policies);
        graph.apply_policies(&policies);
    }

    /// Removes a plugin type's registrations from this layer, evicts its
    /// cached objects, and runs their disposal hooks.
    pub(crate) fn eject(&self, key: &TypeKey) {
        self.graph.write().eject(key);
        self.disposers.lock().run_for_plugin(key);
        let _ = self.layer_cache.evict_plugin(key);
        self.thread_cache.evict_plugin(key);
        if self.role == PipelineRole::Root {
            let _ = self.singleton_cache().evict_plugin(key);
        }
        tracing::debug!(plugin = key.display_name(), "plugin family ejected");
    }

    /// Tears the layer down: runs disposers LIFO and empties its caches.
    /// Returns `false` if the layer was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.disposers.lock().run_all_reverse();
        self.thread_cache.clear();
        self.layer_cache.mark_disposed();
        if let Some(singletons) = &self.singletons {
            singletons.mark_disposed();
        }
        true
    }

    pub(crate) fn has_pending_disposers(&self) -> bool {
        !self.disposers.lock().is_empty()
    }

    /// Files a disposal hook with the layer that owns the object's cache.
    pub(crate) fn register_disposal(
        &self,
        lifecycle: Lifecycle,
        tag: Option<crate::key::CacheKey>,
        hook: Box<dyn FnOnce() + Send>,
    ) {
        let owner = match lifecycle {
            Lifecycle::Singleton => self.root_pipeline(),
            _ => self,
        };
        owner.disposers.lock().push(tag, hook);
    }
}
