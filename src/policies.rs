//! Instance policies: explicit objects applied to registrations at seal.

use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;

/// A policy applied to every registered instance when the container is
/// built, and to new instances added by later `configure` calls.
///
/// Policies are tagged; the tag is recorded on each instance so an
/// idempotent policy is never applied to the same instance twice, even
/// across reconfiguration.
///
/// # Examples
///
/// ```rust
/// use plugmap::{Container, Instance, InstancePolicy, Lifecycle, TypeKey};
///
/// struct Widget;
///
/// struct SingletonWidgets;
/// impl InstancePolicy for SingletonWidgets {
///     fn tag(&self) -> &'static str { "singleton-widgets" }
///     fn apply(&self, plugin: &TypeKey, instance: &mut Instance) {
///         if plugin.display_name().ends_with("Widget") {
///             *instance = instance.clone().with_lifecycle(Lifecycle::Singleton);
///         }
///     }
/// }
///
/// let container = Container::new(|registry| {
///     registry.add(Instance::of::<Widget, _>(|_| Ok(Widget)));
///     registry.add_policy(SingletonWidgets);
/// });
///
/// let a = container.get_instance::<Widget>().unwrap();
/// let b = container.get_instance::<Widget>().unwrap();
/// assert!(std::sync::Arc::ptr_eq(&a, &b));
/// ```
pub trait InstancePolicy: Send + Sync {
    /// Stable tag recorded on instances this policy has touched.
    fn tag(&self) -> &'static str;

    /// Adjusts one instance. Runs once per (policy, instance) pair.
    fn apply(&self, plugin: &TypeKey, instance: &mut Instance);
}

/// Ready-made policy assigning a lifecycle to every instance of plugin
/// types matched by a predicate.
pub struct LifecyclePolicy<P> {
    tag: &'static str,
    lifecycle: Lifecycle,
    predicate: P,
}

impl<P> LifecyclePolicy<P>
where
    P: Fn(&TypeKey) -> bool + Send + Sync,
{
    /// Policy assigning `lifecycle` where `predicate` matches the plugin key.
    pub fn new(tag: &'static str, lifecycle: Lifecycle, predicate: P) -> Self {
        Self {
            tag,
            lifecycle,
            predicate,
        }
    }
}

impl<P> InstancePolicy for LifecyclePolicy<P>
where
    P: Fn(&TypeKey) -> bool + Send + Sync,
{
    fn tag(&self) -> &'static str {
        self.tag
    }

    fn apply(&self, plugin: &TypeKey, instance: &mut Instance) {
        if (self.predicate)(plugin) && instance.lifecycle().is_none() {
            *instance = instance.clone().with_lifecycle(self.lifecycle);
        }
    }
}
