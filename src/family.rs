//! Plugin families: every instance registered for one plugin type.

use std::sync::Arc;

use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;

/// Fallback consulted when a named lookup misses, producing an instance on
/// the fly. The returned instance is built but never stored in the family.
pub type MissingInstanceFn = Arc<dyn Fn(&'static str) -> Option<Instance> + Send + Sync>;

/// The set of all [`Instance`]s registered for one plugin type, plus the
/// family's default pointer and lifecycle.
///
/// Instances keep registration order and are unique by name; re-registering
/// a name replaces the earlier instance in place. A family with exactly one
/// instance and no explicit default treats that sole instance as the default.
pub struct PluginFamily {
    plugin: TypeKey,
    instances: Vec<Instance>,
    default_name: Option<&'static str>,
    lifecycle: Lifecycle,
    missing_instance: Option<MissingInstanceFn>,
}

impl PluginFamily {
    pub(crate) fn new(plugin: TypeKey) -> Self {
        Self {
            plugin,
            instances: Vec::new(),
            default_name: None,
            lifecycle: Lifecycle::default(),
            missing_instance: None,
        }
    }

    /// The plugin type this family serves.
    pub fn plugin_key(&self) -> TypeKey {
        self.plugin
    }

    /// Adds an instance, replacing any earlier instance with the same name.
    pub fn add_instance(&mut self, instance: Instance) {
        debug_assert_eq!(instance.plugin_key(), self.plugin);
        if let Some(pos) = self
            .instances
            .iter()
            .position(|existing| existing.name() == instance.name())
        {
            self.instances[pos] = instance;
        } else {
            self.instances.push(instance);
        }
    }

    /// Points the family default at a named instance.
    pub fn set_default(&mut self, name: &'static str) {
        self.default_name = Some(name);
    }

    /// Sets the lifecycle instances fall back to when they carry no override.
    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) {
        self.lifecycle = lifecycle;
    }

    /// The family lifecycle.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Installs the missing-named-instance fallback.
    pub fn set_missing_instance(&mut self, fallback: MissingInstanceFn) {
        self.missing_instance = Some(fallback);
    }

    pub(crate) fn missing_instance(&self, name: &'static str) -> Option<Instance> {
        self.missing_instance.as_ref().and_then(|f| f(name))
    }

    /// The default instance: the explicit default when set, otherwise the
    /// sole registered instance, otherwise the instance carrying the default
    /// sentinel name.
    pub fn default_instance(&self) -> Option<&Instance> {
        if let Some(name) = self.default_name {
            return self.named(name);
        }
        if self.instances.len() == 1 {
            return self.instances.first();
        }
        self.named(Instance::DEFAULT_NAME)
    }

    /// The name the default resolves to, if any.
    pub fn default_name(&self) -> Option<&'static str> {
        self.default_instance().map(Instance::name)
    }

    /// Looks up an instance by name.
    pub fn named(&self, name: &'static str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.name() == name)
    }

    /// All instances in registration order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.iter()
    }

    /// Mutable access for policy application.
    pub(crate) fn instances_mut(&mut self) -> impl Iterator<Item = &mut Instance> {
        self.instances.iter_mut()
    }

    /// Number of registered instances.
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Whether the family has no instances at all.
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// The lifecycle governing one instance: its own override or the
    /// family lifecycle.
    pub fn lifecycle_of(&self, instance: &Instance) -> Lifecycle {
        instance.lifecycle().unwrap_or(self.lifecycle)
    }

    /// Merges another family's registrations into this one. Instances
    /// replace by name; the other family's explicit default and lifecycle
    /// win when present.
    pub(crate) fn absorb(&mut self, other: PluginFamily) {
        for instance in other.instances {
            self.add_instance(instance);
        }
        if let Some(name) = other.default_name {
            self.default_name = Some(name);
        }
        if other.lifecycle != Lifecycle::default() {
            self.lifecycle = other.lifecycle;
        }
        if let Some(fallback) = other.missing_instance {
            self.missing_instance = Some(fallback);
        }
    }
}

impl std::fmt::Debug for PluginFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginFamily")
            .field("plugin", &self.plugin.display_name())
            .field("instances", &self.instances)
            .field("default_name", &self.default_name)
            .field("lifecycle", &self.lifecycle)
            .finish()
    }
}
