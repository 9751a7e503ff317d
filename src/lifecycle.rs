//! Lifecycle definitions controlling how built objects are cached.

/// Scoping strategy for the objects an instance produces.
///
/// Each lifecycle routes built objects to a different cache:
///
/// - **Transient**: cached for the duration of one resolution call, so a
///   dependency requested several times within one object graph is the same
///   object, but separate calls get separate objects.
/// - **Singleton**: one object per root container, shared with every profile
///   and nested container derived from it.
/// - **ThreadLocal**: one object per thread per container.
/// - **Context**: one object per pipeline layer; the root container and each
///   profile/nested layer cache independently.
/// - **NestedContainer**: cached for the lifetime of the resolving nested
///   container; behaves like `Transient` when resolved outside one.
/// - **UniquePerRequest**: never cached; every resolution runs the build plan
///   again, even within one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifecycle {
    /// One object per top-level resolution call.
    #[default]
    Transient,
    /// One object per root container, shared across all descendants.
    Singleton,
    /// One object per thread per container.
    ThreadLocal,
    /// One object per pipeline layer (root, profile, or nested).
    Context,
    /// One object per nested container; transient elsewhere.
    NestedContainer,
    /// A fresh object on every resolution, with no caching at all.
    UniquePerRequest,
}

impl Lifecycle {
    /// Whether this lifecycle skips every cache.
    pub fn is_unique(&self) -> bool {
        matches!(self, Lifecycle::UniquePerRequest)
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Lifecycle::Transient => "Transient",
            Lifecycle::Singleton => "Singleton",
            Lifecycle::ThreadLocal => "ThreadLocal",
            Lifecycle::Context => "Context",
            Lifecycle::NestedContainer => "NestedContainer",
            Lifecycle::UniquePerRequest => "UniquePerRequest",
        };
        f.write_str(name)
    }
}
