//! Open-generic templates and the closed-family synthesis algorithm.

use std::sync::Arc;

use crate::error::{BuildError, BuildResult};
use crate::family::PluginFamily;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::lifecycle::Lifecycle;
use crate::session::BuildContext;

type CloseFn = Arc<dyn Fn(&TypeKey) -> Option<Instance> + Send + Sync>;

struct Plugger {
    name: &'static str,
    close: CloseFn,
}

/// Template family registered against an open generic plugin type.
///
/// Rust monomorphizes generics at compile time, so the template cannot close
/// arbitrary type arguments on its own; each registered *plugger* is a
/// monomorphized compatibility oracle that answers for the closed plugin
/// types it can satisfy. When a closed generic type is first requested with
/// no family registered, the pipeline finds the template whose generic base
/// matches, asks every plugger in registration order, and synthesizes a
/// closed family from the compatible answers, preserving plugger names and
/// the template's designated default. The closed family is cached so repeated
/// requests never re-derive it.
///
/// # Examples
///
/// ```rust
/// use plugmap::{close_trait_with, Container, OpenTemplate};
/// use std::sync::Arc;
///
/// trait Repo<T>: Send + Sync {
///     fn backend(&self) -> &'static str;
/// }
///
/// struct User;
/// struct InMemory;
/// impl Repo<User> for InMemory {
///     fn backend(&self) -> &'static str { "memory" }
/// }
///
/// let container = Container::new(|registry| {
///     let mut template = OpenTemplate::new("Repo", 1);
///     template.add("memory", close_trait_with::<dyn Repo<User>, _>(|_| Ok(Arc::new(InMemory))));
///     registry.add_open_template(template);
/// });
///
/// let repo = container.get_trait::<dyn Repo<User>>().unwrap();
/// assert_eq!(repo.backend(), "memory");
/// ```
pub struct OpenTemplate {
    base: &'static str,
    arity: usize,
    lifecycle: Lifecycle,
    default_name: Option<&'static str>,
    pluggers: Vec<Plugger>,
}

impl OpenTemplate {
    /// Template for the generic base with the given type-argument count.
    ///
    /// `base` is matched as a suffix of the requested type's generic base,
    /// so `"Repo"` matches `dyn my_app::Repo<T>` regardless of module path.
    pub fn new(base: &'static str, arity: usize) -> Self {
        Self {
            base,
            arity,
            lifecycle: Lifecycle::default(),
            default_name: None,
            pluggers: Vec::new(),
        }
    }

    /// Registers a named plugger. Order is preserved into synthesized
    /// families.
    pub fn add<F>(&mut self, name: &'static str, close: F) -> &mut Self
    where
        F: Fn(&TypeKey) -> Option<Instance> + Send + Sync + 'static,
    {
        self.pluggers.push(Plugger {
            name,
            close: Arc::new(close),
        });
        self
    }

    /// Designates the default instance of every synthesized family.
    pub fn set_default(&mut self, name: &'static str) -> &mut Self {
        self.default_name = Some(name);
        self
    }

    /// Lifecycle carried into every synthesized family.
    pub fn set_lifecycle(&mut self, lifecycle: Lifecycle) -> &mut Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Whether the requested closed type belongs to this template's base.
    pub(crate) fn matches(&self, key: &TypeKey) -> bool {
        match key.generic_base() {
            Some(base) if base.ends_with(self.base) => {
                let prefix = &base[..base.len() - self.base.len()];
                prefix.is_empty() || prefix.ends_with("::") || prefix == "dyn "
            }
            _ => false,
        }
    }

    /// Synthesizes the closed family for one requested closed plugin type.
    ///
    /// Zero compatible pluggers still produce an (empty) family, so default
    /// resolution reports a missing instance rather than a synthesis error;
    /// an arity mismatch is a configuration error.
    pub(crate) fn close(&self, key: &TypeKey) -> BuildResult<PluginFamily> {
        if key.generic_arity() != Some(self.arity) {
            return Err(BuildError::configuration(
                key.display_name(),
                format!(
                    "open template '{}' expects {} type argument(s)",
                    self.base, self.arity
                ),
            ));
        }

        let mut family = PluginFamily::new(*key);
        family.set_lifecycle(self.lifecycle);
        for plugger in &self.pluggers {
            if let Some(instance) = (plugger.close)(key) {
                family.add_instance(instance.rekey(*key).named(plugger.name));
            }
        }
        if let Some(default) = self.default_name {
            if family.named(default).is_some() {
                family.set_default(default);
            }
        }
        tracing::debug!(
            plugin = key.display_name(),
            template = self.base,
            instances = family.len(),
            "closed generic family synthesized"
        );
        Ok(family)
    }
}

/// Builds a plugger that closes compatibly with exactly the trait-object
/// plugin type `T`, producing objects through `factory`.
///
/// This is the exact-substitution compatibility baseline: the plugger
/// answers only for `T` itself, with no variance inference.
pub fn close_trait_with<T, F>(factory: F) -> impl Fn(&TypeKey) -> Option<Instance>
where
    T: ?Sized + Send + Sync + 'static,
    F: for<'a> Fn(&BuildContext<'a>) -> BuildResult<Arc<T>> + Send + Sync + Clone + 'static,
{
    move |key: &TypeKey| {
        (*key == TypeKey::of_trait::<T>()).then(|| Instance::of_trait::<T, _>(factory.clone()))
    }
}

/// Builds a plugger that closes compatibly with exactly the concrete plugin
/// type `T`.
pub fn close_type_with<T, F>(factory: F) -> impl Fn(&TypeKey) -> Option<Instance>
where
    T: Send + Sync + 'static,
    F: for<'a> Fn(&BuildContext<'a>) -> BuildResult<T> + Send + Sync + Clone + 'static,
{
    move |key: &TypeKey| (*key == TypeKey::of::<T>()).then(|| Instance::of::<T, _>(factory.clone()))
}
