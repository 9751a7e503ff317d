//! The imperative configuration surface feeding a plugin graph.

use std::any::Any;
use std::sync::Arc;

use crate::error::{BuildError, BuildResult};
use crate::family::MissingInstanceFn;
use crate::generics::OpenTemplate;
use crate::graph::PluginGraph;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;
use crate::policies::InstancePolicy;
use crate::session::BuildContext;

/// Mutable registration surface for a [`Container`](crate::Container).
///
/// A `Registry` collects instances, defaults, lifecycles, profile overrides,
/// open templates and policies, and is consumed when the container is built
/// (or merged into a live container by `configure`). It is the boundary to
/// the configuration-source collaborators; fluent DSLs, file parsers and
/// scanners all reduce to calls on this surface.
///
/// # Examples
///
/// ```rust
/// use plugmap::{Container, Instance, Lifecycle};
///
/// trait Color: Send + Sync {
///     fn name(&self) -> &'static str;
/// }
/// struct Red;
/// impl Color for Red {
///     fn name(&self) -> &'static str { "red" }
/// }
/// struct Blue;
/// impl Color for Blue {
///     fn name(&self) -> &'static str { "blue" }
/// }
///
/// let container = Container::new(|registry| {
///     registry
///         .add(Instance::of_trait::<dyn Color, _>(|_| Ok(std::sync::Arc::new(Red))).named("red"))
///         .add(Instance::of_trait::<dyn Color, _>(|_| Ok(std::sync::Arc::new(Blue))).named("blue"))
///         .set_default_trait::<dyn Color>("red")
///         .set_lifecycle_trait::<dyn Color>(Lifecycle::Singleton);
/// });
///
/// assert_eq!(container.get_trait::<dyn Color>().unwrap().name(), "red");
/// assert_eq!(container.get_trait_named::<dyn Color>("blue").unwrap().name(), "blue");
/// ```
pub struct Registry {
    graph: PluginGraph,
    policies: Vec<Arc<dyn InstancePolicy>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            graph: PluginGraph::new(),
            policies: Vec::new(),
        }
    }

    /// Registers an instance under its declared plugin type.
    pub fn add(&mut self, instance: Instance) -> &mut Self {
        self.graph.add_instance(instance);
        self
    }

    /// Points a concrete plugin type's default at a named instance.
    pub fn set_default<T: 'static>(&mut self, name: &'static str) -> &mut Self {
        self.set_default_key(TypeKey::of::<T>(), name)
    }

    /// Points a trait plugin type's default at a named instance.
    pub fn set_default_trait<T: ?Sized + 'static>(&mut self, name: &'static str) -> &mut Self {
        self.set_default_key(TypeKey::of_trait::<T>(), name)
    }

    /// Points a plugin type's default at a named instance, by key.
    pub fn set_default_key(&mut self, key: TypeKey, name: &'static str) -> &mut Self {
        self.graph.ensure_family(key).set_default(name);
        self
    }

    /// Assigns a concrete plugin type's family lifecycle.
    pub fn set_lifecycle<T: 'static>(&mut self, lifecycle: Lifecycle) -> &mut Self {
        self.set_lifecycle_key(TypeKey::of::<T>(), lifecycle)
    }

    /// Assigns a trait plugin type's family lifecycle.
    pub fn set_lifecycle_trait<T: ?Sized + 'static>(&mut self, lifecycle: Lifecycle) -> &mut Self {
        self.set_lifecycle_key(TypeKey::of_trait::<T>(), lifecycle)
    }

    /// Assigns a family lifecycle by key.
    pub fn set_lifecycle_key(&mut self, key: TypeKey, lifecycle: Lifecycle) -> &mut Self {
        self.graph.ensure_family(key).set_lifecycle(lifecycle);
        self
    }

    /// Overrides the default instance of a concrete plugin type within a
    /// named profile.
    pub fn profile_default<T: 'static>(
        &mut self,
        profile: &'static str,
        name: &'static str,
    ) -> &mut Self {
        self.profile_default_key(profile, TypeKey::of::<T>(), name)
    }

    /// Overrides the default instance of a trait plugin type within a named
    /// profile.
    pub fn profile_default_trait<T: ?Sized + 'static>(
        &mut self,
        profile: &'static str,
        name: &'static str,
    ) -> &mut Self {
        self.profile_default_key(profile, TypeKey::of_trait::<T>(), name)
    }

    /// Profile default override by key.
    pub fn profile_default_key(
        &mut self,
        profile: &'static str,
        key: TypeKey,
        name: &'static str,
    ) -> &mut Self {
        self.graph
            .profiles
            .entry(profile)
            .or_default()
            .insert(key, name);
        self
    }

    /// Registers an open-generic template consulted when an unregistered
    /// closed generic type is first requested.
    pub fn add_open_template(&mut self, template: OpenTemplate) -> &mut Self {
        self.graph.templates.push(template);
        self
    }

    /// Attaches a policy applied to every instance when the graph is sealed.
    pub fn add_policy<P: InstancePolicy + 'static>(&mut self, policy: P) -> &mut Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Installs a fallback producing an instance on the fly when a named
    /// lookup misses for the trait plugin type.
    pub fn on_missing_named_trait<T, F>(&mut self, fallback: F) -> &mut Self
    where
        T: ?Sized + 'static,
        F: Fn(&'static str) -> Option<Instance> + Send + Sync + 'static,
    {
        self.on_missing_named_key(TypeKey::of_trait::<T>(), Arc::new(fallback))
    }

    /// Installs a missing-named-instance fallback by key.
    pub fn on_missing_named_key(&mut self, key: TypeKey, fallback: MissingInstanceFn) -> &mut Self {
        self.graph.ensure_family(key).set_missing_instance(fallback);
        self
    }

    /// Registers a build-up action performing setter-style injection into an
    /// already-built object of type `T`.
    pub fn add_build_up<T, F>(&mut self, action: F) -> &mut Self
    where
        T: 'static,
        F: for<'a> Fn(&BuildContext<'a>, &mut T) -> BuildResult<()> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<T>();
        self.graph.build_ups.insert(
            key,
            Arc::new(move |ctx, target: &mut dyn Any| match target.downcast_mut::<T>() {
                Some(typed) => action(ctx, typed),
                None => Err(BuildError::TypeMismatch(std::any::type_name::<T>())),
            }),
        );
        self
    }

    /// Seals the graph: applies policies and hands the layer over.
    pub(crate) fn into_graph(mut self) -> (PluginGraph, Vec<Arc<dyn InstancePolicy>>) {
        self.graph.apply_policies(&self.policies);
        (self.graph, self.policies)
    }
}
