//! The container facade over a pipeline of configuration layers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::diagnostics;
use crate::error::{BuildError, BuildResult};
use crate::instance::{AnyArc, Instance};
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;
use crate::pipeline::PipelineGraph;
use crate::registry::Registry;
use crate::session::BuildSession;

/// The service-location facade: configure once, resolve anywhere.
///
/// A container is a cheap handle over a shared pipeline of configuration
/// layers; cloning it clones the handle, not the configuration. Profiles
/// and nested containers are new layers chained onto the same pipeline, so
/// they see the parent's registrations and singletons while keeping their
/// own overrides and scoped objects.
///
/// # Examples
///
/// ```rust
/// use plugmap::{Container, Instance};
/// use std::sync::Arc;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String { "hello".into() }
/// }
///
/// let container = Container::new(|registry| {
///     registry.add(Instance::of_trait::<dyn Greeter, _>(|_| Ok(Arc::new(English))));
/// });
///
/// assert_eq!(container.get_trait::<dyn Greeter>().unwrap().greet(), "hello");
/// ```
pub struct Container {
    pipeline: Arc<PipelineGraph>,
    /// Profile layers cached by (owning layer id, profile name), shared by
    /// every handle derived from one root so they agree on the layers.
    profiles: ProfileMap,
    configure_lock: Arc<Mutex<()>>,
}

type ProfileMap = Arc<Mutex<HashMap<(u64, &'static str), Arc<PipelineGraph>>>>;

impl Container {
    /// Builds a container from a one-shot configuration closure.
    pub fn new(configure: impl FnOnce(&mut Registry)) -> Self {
        let mut registry = Registry::new();
        let profiles: ProfileMap = Arc::new(Mutex::new(HashMap::new()));
        let configure_lock = Arc::new(Mutex::new(()));
        // The container resolves itself, so constructors can take the
        // resolving container as a dependency. The handle binds to the
        // resolving session's own layer and shares the profile cache, and
        // the unique lifecycle keeps the facade out of the caches and
        // avoids a reference cycle.
        let handle_profiles = profiles.clone();
        let handle_lock = configure_lock.clone();
        registry.add(
            Instance::of::<Container, _>(move |ctx| {
                Ok(Container {
                    pipeline: ctx.pipeline(),
                    profiles: handle_profiles.clone(),
                    configure_lock: handle_lock.clone(),
                })
            })
            .with_lifecycle(Lifecycle::UniquePerRequest),
        );
        configure(&mut registry);
        let (graph, policies) = registry.into_graph();
        let container = Self {
            pipeline: PipelineGraph::root(graph, policies),
            profiles,
            configure_lock,
        };
        tracing::debug!(pipeline = container.pipeline.id(), "container built");
        container
    }

    fn derived(&self, pipeline: Arc<PipelineGraph>) -> Self {
        Self {
            pipeline,
            profiles: self.profiles.clone(),
            configure_lock: self.configure_lock.clone(),
        }
    }

    fn session(&self) -> BuildSession {
        BuildSession::new(self.pipeline.clone())
    }

    /// Resolves the default instance of a concrete plugin type.
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_instance::<T>()
    }

    /// Resolves a named instance of a concrete plugin type.
    pub fn get_instance_named<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_instance_named::<T>(name)
    }

    /// Resolves the default instance of a trait-object plugin type.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_trait::<T>()
    }

    /// Resolves a named instance of a trait-object plugin type.
    pub fn get_trait_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_trait_named::<T>(name)
    }

    /// Like [`get_instance`](Self::get_instance), with absence mapped to
    /// `Ok(None)`. Execution, cycle and disposal errors still propagate.
    pub fn try_get_instance<T: Send + Sync + 'static>(&self) -> BuildResult<Option<Arc<T>>> {
        absence_to_none(self.get_instance::<T>())
    }

    /// Like [`get_trait`](Self::get_trait), with absence mapped to `Ok(None)`.
    pub fn try_get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Option<Arc<T>>> {
        absence_to_none(self.get_trait::<T>())
    }

    /// Like [`get_instance_named`](Self::get_instance_named), with absence
    /// mapped to `Ok(None)`.
    pub fn try_get_instance_named<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Option<Arc<T>>> {
        absence_to_none(self.get_instance_named::<T>(name))
    }

    /// Like [`get_trait_named`](Self::get_trait_named), with absence mapped
    /// to `Ok(None)`.
    pub fn try_get_trait_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Option<Arc<T>>> {
        absence_to_none(self.get_trait_named::<T>(name))
    }

    /// Builds every registered instance of a concrete plugin type, in
    /// registration order.
    pub fn get_all_instances<T: Send + Sync + 'static>(&self) -> BuildResult<Vec<Arc<T>>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_all_instances::<T>()
    }

    /// Builds every registered instance of a trait-object plugin type, in
    /// registration order.
    pub fn get_all_traits<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Vec<Arc<T>>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_all_traits::<T>()
    }

    /// Starts a resolution request with explicit argument overrides.
    ///
    /// Overrides apply to dependencies resolved during the request; they do
    /// not change the configuration.
    pub fn with(&self) -> ExplicitArgs<'_> {
        ExplicitArgs {
            container: self,
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registers an already-built object as its concrete type's default
    /// instance on the live container.
    pub fn inject<T: Send + Sync + 'static>(&self, value: T) {
        self.configure(|registry| {
            registry.add(Instance::literal(value));
        });
    }

    /// Registers an already-built object as a trait plugin type's default
    /// instance on the live container.
    pub fn inject_trait<T: ?Sized + Send + Sync + 'static>(&self, value: Arc<T>) {
        self.configure(|registry| {
            registry.add(Instance::trait_literal(value));
        });
    }

    /// Adds registrations to the live container.
    ///
    /// Calls are serialized; resolutions already in flight finish against
    /// the configuration they started with. Objects cached before the call
    /// stay cached.
    pub fn configure(&self, configure: impl FnOnce(&mut Registry)) {
        let _guard = self.configure_lock.lock();
        let mut registry = Registry::new();
        configure(&mut registry);
        self.pipeline.absorb_registry(registry);
        tracing::debug!(pipeline = self.pipeline.id(), "container reconfigured");
    }

    /// The container for a named profile.
    ///
    /// The profile layer is created on first use and reused afterwards; it
    /// shares the root's registrations and singletons while applying the
    /// profile's default-instance overrides.
    pub fn get_profile(&self, profile: &'static str) -> Container {
        let pipeline = {
            let mut profiles = self.profiles.lock();
            profiles
                .entry((self.pipeline.id(), profile))
                .or_insert_with(|| PipelineGraph::profile_child(&self.pipeline, profile))
                .clone()
        };
        self.derived(pipeline)
    }

    /// A nested container for one unit of work.
    ///
    /// Nested-lifecycle objects resolved through it are cached for its
    /// lifetime and disposed with it; parent singletons are shared.
    pub fn get_nested_container(&self) -> Container {
        self.derived(PipelineGraph::nested(&self.pipeline))
    }

    /// A nested container layered over a profile.
    pub fn get_nested_container_for_profile(&self, profile: &'static str) -> Container {
        let profiled = self.get_profile(profile);
        self.derived(PipelineGraph::nested(&profiled.pipeline))
    }

    /// Removes a concrete plugin type's registrations from this layer and
    /// disposes its cached objects.
    pub fn eject_all_instances_of<T: 'static>(&self) {
        self.eject_all_instances_of_key(TypeKey::of::<T>());
    }

    /// Removes a trait plugin type's registrations from this layer and
    /// disposes its cached objects.
    pub fn eject_all_instances_of_trait<T: ?Sized + 'static>(&self) {
        self.eject_all_instances_of_key(TypeKey::of_trait::<T>());
    }

    /// Ejection by key.
    ///
    /// Profile layers derived from this layer cache objects of their own
    /// (the Context lifecycle), so ejection sweeps them too. The profile
    /// map lock is released before any disposal hook runs.
    pub fn eject_all_instances_of_key(&self, key: TypeKey) {
        self.pipeline.eject(&key);
        let profile_layers: Vec<Arc<PipelineGraph>> = self
            .profiles
            .lock()
            .values()
            .filter(|layer| layer.descends_from(self.pipeline.id()))
            .cloned()
            .collect();
        for layer in profile_layers {
            layer.eject(&key);
        }
    }

    /// Whether the plugin type resolves to a default instance.
    pub fn has_instance<T: Send + Sync + 'static>(&self) -> bool {
        self.pipeline.find_default(&TypeKey::of::<T>()).is_ok()
    }

    /// Whether the trait plugin type resolves to a default instance.
    pub fn has_trait<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.pipeline.find_default(&TypeKey::of_trait::<T>()).is_ok()
    }

    /// Whether a named instance exists for the concrete plugin type.
    pub fn has_instance_named<T: Send + Sync + 'static>(&self, name: &'static str) -> bool {
        self.pipeline.find_named(&TypeKey::of::<T>(), name).is_ok()
    }

    /// Whether a named instance exists for the trait plugin type.
    pub fn has_trait_named<T: ?Sized + Send + Sync + 'static>(&self, name: &'static str) -> bool {
        self.pipeline
            .find_named(&TypeKey::of_trait::<T>(), name)
            .is_ok()
    }

    /// Builds every registered instance once and reports every failure in
    /// one aggregate error.
    pub fn assert_configuration_is_valid(&self) -> BuildResult<()> {
        let mut failures = Vec::new();
        for family in self.pipeline.snapshot() {
            for instance in &family.instances {
                let session = self.session();
                if let Err(e) = session.resolve_named(&family.plugin, instance.name) {
                    failures.push(e);
                }
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BuildError::Invalid { failures })
        }
    }

    /// Applies the registered build-up action for `T` to an existing object.
    pub fn build_up<T: 'static>(&self, target: &mut T) -> BuildResult<()> {
        let session = self.session();
        let ctx = session.context();
        ctx.build_up(target)
    }

    /// A human-readable report of every visible registration.
    pub fn what_do_i_have(&self) -> String {
        diagnostics::what_do_i_have(&self.pipeline.snapshot())
    }

    /// Tears this layer down: runs disposal hooks LIFO and empties its
    /// caches. Resolution through this layer afterwards reports
    /// [`BuildError::Disposed`].
    pub fn dispose(&self) {
        if self.pipeline.dispose() {
            tracing::debug!(pipeline = self.pipeline.id(), "container disposed");
        }
    }
}

fn absence_to_none<T: ?Sized>(result: BuildResult<Arc<T>>) -> BuildResult<Option<Arc<T>>> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_absence() => Ok(None),
        Err(e) => Err(e),
    }
}

impl Clone for Container {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            profiles: self.profiles.clone(),
            configure_lock: self.configure_lock.clone(),
        }
    }
}

impl Drop for Container {
    fn drop(&mut self) {
        if Arc::strong_count(&self.pipeline) == 1 && self.pipeline.has_pending_disposers() {
            tracing::warn!(
                pipeline = self.pipeline.id(),
                "container dropped without dispose(); disposal hooks were skipped"
            );
        }
    }
}

/// Fluent builder carrying explicit arguments for one resolution request.
///
/// Created by [`Container::with`]. Overrides win over registrations when a
/// dependency of the matching type or name is resolved during the request.
pub struct ExplicitArgs<'c> {
    container: &'c Container,
    by_type: HashMap<TypeKey, AnyArc>,
    by_name: HashMap<&'static str, AnyArc>,
}

impl ExplicitArgs<'_> {
    /// Supplies a value for dependencies of its concrete type.
    pub fn with_value<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.by_type.insert(TypeKey::of::<T>(), Arc::new(value));
        self
    }

    /// Supplies a value for dependencies requested under a name.
    pub fn with_named<T: Send + Sync + 'static>(mut self, name: &'static str, value: T) -> Self {
        self.by_name.insert(name, Arc::new(value));
        self
    }

    /// Supplies a trait object for dependencies of the trait plugin type.
    pub fn with_trait<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.by_type
            .insert(TypeKey::of_trait::<T>(), Arc::new(value));
        self
    }

    /// Supplies a trait object for dependencies requested under a name.
    pub fn with_trait_named<T: ?Sized + Send + Sync + 'static>(
        mut self,
        name: &'static str,
        value: Arc<T>,
    ) -> Self {
        self.by_name.insert(name, Arc::new(value));
        self
    }

    fn session(self) -> BuildSession {
        BuildSession::with_overrides(
            self.container.pipeline.clone(),
            self.by_type,
            self.by_name,
        )
    }

    /// Resolves the default instance of a concrete plugin type with the
    /// collected overrides in effect.
    pub fn get_instance<T: Send + Sync + 'static>(self) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_instance::<T>()
    }

    /// Resolves a named instance of a concrete plugin type with the
    /// collected overrides in effect.
    pub fn get_instance_named<T: Send + Sync + 'static>(
        self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_instance_named::<T>(name)
    }

    /// Resolves the default instance of a trait plugin type with the
    /// collected overrides in effect.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(self) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_trait::<T>()
    }

    /// Resolves a named instance of a trait plugin type with the collected
    /// overrides in effect.
    pub fn get_trait_named<T: ?Sized + Send + Sync + 'static>(
        self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        let session = self.session();
        let ctx = session.context();
        ctx.get_trait_named::<T>(name)
    }
}
