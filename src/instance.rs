//! Instances: named recipes for producing one object for a plugin type.

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::BuildResult;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;
use crate::session::BuildContext;

/// Type-erased object handle shared between caches and callers.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Compiled build plan for one concrete type.
///
/// This is the boundary to the build-plan compiler collaborator: the
/// container hands the plan a [`BuildContext`] for resolving constructor
/// arguments and gets back a constructed object. How the plan was produced
/// (hand-written closure, generated code, macro) is opaque to the container.
pub trait BuildPlan: Send + Sync {
    /// Name of the concrete type this plan produces, for diagnostics.
    fn concrete_name(&self) -> &'static str;

    /// Builds one object, resolving dependencies through the session context.
    ///
    /// Failures are reported with [`BuildError::execution`] or
    /// [`BuildError::execution_message`]; the session attaches the build
    /// stack at the failing frame.
    ///
    /// [`BuildError::execution`]: crate::BuildError::execution
    /// [`BuildError::execution_message`]: crate::BuildError::execution_message
    fn build(&self, ctx: &BuildContext<'_>) -> BuildResult<AnyArc>;
}

type LambdaFn = Arc<dyn for<'a> Fn(&BuildContext<'a>) -> BuildResult<AnyArc> + Send + Sync>;

/// Construction strategy backing an [`Instance`].
#[derive(Clone)]
pub(crate) enum Builder {
    /// Compiled build plan from the collaborator boundary.
    Plan(Arc<dyn BuildPlan>),
    /// A pre-built object returned as-is on every resolution.
    Literal(AnyArc),
    /// Alias pointing at another named instance in the same family.
    Reference(&'static str),
    /// Session-driven closure.
    Lambda(LambdaFn),
}

/// A named recipe describing how to produce one concrete object for a
/// plugin type.
///
/// Instances are created through the typed constructors and registered with a
/// [`Registry`](crate::Registry). An instance without an explicit name gets
/// the default sentinel name and becomes its family's default registration.
///
/// # Examples
///
/// ```rust
/// use plugmap::{Container, Instance};
///
/// struct Config { url: String }
///
/// let container = Container::new(|registry| {
///     registry.add(Instance::literal(Config { url: "postgres://localhost".into() }));
/// });
///
/// let config = container.get_instance::<Config>().unwrap();
/// assert_eq!(config.url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Instance {
    name: &'static str,
    plugin: TypeKey,
    concrete: &'static str,
    builder: Builder,
    lifecycle: Option<Lifecycle>,
    applied_policies: HashSet<&'static str>,
}

impl Instance {
    /// The sentinel name given to instances registered without one.
    pub const DEFAULT_NAME: &'static str = "default";

    fn new(plugin: TypeKey, concrete: &'static str, builder: Builder) -> Self {
        Self {
            name: Self::DEFAULT_NAME,
            plugin,
            concrete,
            builder,
            lifecycle: None,
            applied_policies: HashSet::new(),
        }
    }

    /// Lambda-constructed instance for a concrete plugin type.
    pub fn of<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: for<'a> Fn(&BuildContext<'a>) -> BuildResult<T> + Send + Sync + 'static,
    {
        Self::new(
            TypeKey::of::<T>(),
            std::any::type_name::<T>(),
            Builder::Lambda(Arc::new(move |ctx| Ok(Arc::new(factory(ctx)?) as AnyArc))),
        )
    }

    /// Literal instance wrapping an already-built object.
    pub fn literal<T: Send + Sync + 'static>(value: T) -> Self {
        Self::new(
            TypeKey::of::<T>(),
            std::any::type_name::<T>(),
            Builder::Literal(Arc::new(value)),
        )
    }

    /// Lambda-constructed instance for a trait-object plugin type.
    ///
    /// The factory returns `Arc<dyn Trait>`; use [`described_as`](Self::described_as)
    /// to record the concrete implementation name for diagnostics.
    pub fn of_trait<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: for<'a> Fn(&BuildContext<'a>) -> BuildResult<Arc<T>> + Send + Sync + 'static,
    {
        Self::new(
            TypeKey::of_trait::<T>(),
            std::any::type_name::<T>(),
            // Trait objects are stored double-wrapped so the outer Arc is Sized.
            Builder::Lambda(Arc::new(move |ctx| Ok(Arc::new(factory(ctx)?) as AnyArc))),
        )
    }

    /// Literal instance for a trait-object plugin type.
    pub fn trait_literal<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self::new(
            TypeKey::of_trait::<T>(),
            std::any::type_name::<T>(),
            Builder::Literal(Arc::new(value)),
        )
    }

    /// Instance backed by a compiled [`BuildPlan`].
    pub fn from_plan(plugin: TypeKey, plan: Arc<dyn BuildPlan>) -> Self {
        let concrete = plan.concrete_name();
        Self::new(plugin, concrete, Builder::Plan(plan))
    }

    /// Alias resolving to another named instance in the same family.
    pub fn alias(plugin: TypeKey, target: &'static str) -> Self {
        Self::new(plugin, "<alias>", Builder::Reference(target))
    }

    /// Alias for a concrete plugin type.
    pub fn alias_for<T: 'static>(target: &'static str) -> Self {
        Self::alias(TypeKey::of::<T>(), target)
    }

    /// Alias for a trait-object plugin type.
    pub fn alias_for_trait<T: ?Sized + 'static>(target: &'static str) -> Self {
        Self::alias(TypeKey::of_trait::<T>(), target)
    }

    /// Gives the instance a stable name within its family.
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Overrides the family lifecycle for this instance only.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    /// Records the concrete type name for diagnostics.
    pub fn described_as(mut self, concrete: &'static str) -> Self {
        self.concrete = concrete;
        self
    }

    /// The instance name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The declared plugin type.
    pub fn plugin_key(&self) -> TypeKey {
        self.plugin
    }

    /// The concrete type name this instance produces, for diagnostics.
    pub fn concrete_name(&self) -> &'static str {
        self.concrete
    }

    /// This instance's lifecycle override, if any.
    pub fn lifecycle(&self) -> Option<Lifecycle> {
        self.lifecycle
    }

    /// Marks a policy tag as applied. Returns `false` if it already was,
    /// which keeps idempotent policies from running twice.
    pub fn mark_policy_applied(&mut self, tag: &'static str) -> bool {
        self.applied_policies.insert(tag)
    }

    pub(crate) fn builder(&self) -> &Builder {
        &self.builder
    }

    pub(crate) fn rekey(mut self, plugin: TypeKey) -> Self {
        self.plugin = plugin;
        self
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("plugin", &self.plugin.display_name())
            .field("concrete", &self.concrete)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
