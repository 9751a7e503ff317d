//! The plugin graph: one configuration layer's families, profiles and
//! templates.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::BuildResult;
use crate::family::PluginFamily;
use crate::generics::OpenTemplate;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::policies::InstancePolicy;
use crate::session::BuildContext;

pub(crate) type BuildUpFn =
    Arc<dyn for<'a> Fn(&BuildContext<'a>, &mut dyn Any) -> BuildResult<()> + Send + Sync>;

/// One configuration layer: the full map of plugin families plus profile
/// override tables, open templates, build-up actions and policies.
///
/// The root container owns one graph; profile and nested layers own their
/// own incremental graphs and delegate misses to the parent pipeline.
pub(crate) struct PluginGraph {
    pub(crate) families: HashMap<TypeKey, PluginFamily>,
    /// profile name -> (plugin type -> default instance name)
    pub(crate) profiles: HashMap<&'static str, HashMap<TypeKey, &'static str>>,
    pub(crate) templates: Vec<OpenTemplate>,
    pub(crate) build_ups: HashMap<TypeKey, BuildUpFn>,
}

impl PluginGraph {
    pub(crate) fn new() -> Self {
        Self {
            families: HashMap::new(),
            profiles: HashMap::new(),
            templates: Vec::new(),
            build_ups: HashMap::new(),
        }
    }

    pub(crate) fn family(&self, key: &TypeKey) -> Option<&PluginFamily> {
        self.families.get(key)
    }

    pub(crate) fn ensure_family(&mut self, key: TypeKey) -> &mut PluginFamily {
        self.families
            .entry(key)
            .or_insert_with(|| PluginFamily::new(key))
    }

    pub(crate) fn add_instance(&mut self, instance: Instance) {
        self.ensure_family(instance.plugin_key()).add_instance(instance);
    }

    pub(crate) fn eject(&mut self, key: &TypeKey) -> Option<PluginFamily> {
        self.families.remove(key)
    }

    pub(crate) fn template_matching(&self, key: &TypeKey) -> Option<&OpenTemplate> {
        self.templates.iter().find(|t| t.matches(key))
    }

    pub(crate) fn profile_default(&self, profile: &str, key: &TypeKey) -> Option<&'static str> {
        self.profiles.get(profile).and_then(|map| map.get(key)).copied()
    }

    /// Applies every policy to every instance, idempotent per policy tag.
    pub(crate) fn apply_policies(&mut self, policies: &[Arc<dyn InstancePolicy>]) {
        for family in self.families.values_mut() {
            let key = family.plugin_key();
            for instance in family.instances_mut() {
                for policy in policies {
                    if instance.mark_policy_applied(policy.tag()) {
                        policy.apply(&key, instance);
                    }
                }
            }
        }
    }

    /// Merges another graph produced by a `configure` call into this one.
    /// Existing instance objects are never mutated in place; new instances
    /// replace or extend the family registrations.
    pub(crate) fn absorb(&mut self, other: PluginGraph) {
        for (key, family) in other.families {
            match self.families.get_mut(&key) {
                Some(existing) => existing.absorb(family),
                None => {
                    self.families.insert(key, family);
                }
            }
        }
        for (profile, overrides) in other.profiles {
            self.profiles.entry(profile).or_default().extend(overrides);
        }
        self.templates.extend(other.templates);
        self.build_ups.extend(other.build_ups);
    }
}
