//! Plugin-type keys for family storage and lookup.

use std::any::TypeId;

/// Key identifying a plugin type (the abstraction callers request).
///
/// A plugin type is either a concrete type (struct, enum, primitive) or a
/// trait object. Concrete types carry their `TypeId` for fast lookup plus the
/// type name for diagnostics; trait objects only have a name, since unsized
/// types have no `TypeId` of their own.
///
/// # Examples
///
/// ```rust
/// use plugmap::TypeKey;
///
/// trait Widget: Send + Sync {}
///
/// let concrete = TypeKey::of::<String>();
/// let abstract_ = TypeKey::of_trait::<dyn Widget>();
///
/// assert!(concrete.display_name().contains("String"));
/// assert!(abstract_.display_name().contains("Widget"));
/// assert_ne!(concrete, abstract_);
/// ```
#[derive(Debug, Clone, Copy)]
pub enum TypeKey {
    /// Concrete plugin type with TypeId and name for diagnostics.
    Type(TypeId, &'static str),
    /// Trait-object plugin type, identified by its type name.
    Trait(&'static str),
}

impl TypeKey {
    /// Key for a concrete plugin type.
    #[inline(always)]
    pub fn of<T: 'static>() -> Self {
        TypeKey::Type(TypeId::of::<T>(), std::any::type_name::<T>())
    }

    /// Key for a trait-object plugin type (`dyn Trait`).
    #[inline(always)]
    pub fn of_trait<T: ?Sized + 'static>() -> Self {
        TypeKey::Trait(std::any::type_name::<T>())
    }

    /// Human-readable type name for error messages and reports.
    pub fn display_name(&self) -> &'static str {
        match self {
            TypeKey::Type(_, name) => name,
            TypeKey::Trait(name) => name,
        }
    }

    /// The generic base of a closed generic type name, or `None` for
    /// non-generic types.
    ///
    /// `dyn app::Repo<app::User>` has the base `dyn app::Repo`. Open-template
    /// matching compares this base against the template's registered base.
    pub fn generic_base(&self) -> Option<&'static str> {
        let name = self.display_name();
        let open = name.find('<')?;
        if !name.ends_with('>') {
            return None;
        }
        Some(&name[..open])
    }

    /// Number of top-level type arguments of a closed generic type name,
    /// or `None` for non-generic types.
    pub fn generic_arity(&self) -> Option<usize> {
        let name = self.display_name();
        let open = name.find('<')?;
        if !name.ends_with('>') {
            return None;
        }
        let args = &name[open + 1..name.len() - 1];
        if args.is_empty() {
            return Some(0);
        }
        let mut depth = 0usize;
        let mut count = 1usize;
        for c in args.chars() {
            match c {
                '<' | '(' | '[' => depth += 1,
                '>' | ')' | ']' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => count += 1,
                _ => {}
            }
        }
        Some(count)
    }
}

// TypeId-only comparison on the hot path; trait keys compare by name.
impl PartialEq for TypeKey {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TypeKey::Type(a, _), TypeKey::Type(b, _)) => a == b,
            (TypeKey::Trait(a), TypeKey::Trait(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for TypeKey {}

impl std::hash::Hash for TypeKey {
    #[inline(always)]
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            TypeKey::Type(id, _) => {
                0u8.hash(state);
                id.hash(state);
            }
            TypeKey::Trait(name) => {
                1u8.hash(state);
                name.hash(state);
            }
        }
    }
}

impl std::fmt::Display for TypeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Cache key for lifecycle caches: one entry per (plugin type, instance name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CacheKey {
    pub(crate) plugin: TypeKey,
    pub(crate) instance: &'static str,
}

impl CacheKey {
    pub(crate) fn new(plugin: TypeKey, instance: &'static str) -> Self {
        Self { plugin, instance }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Repo<T> {
        fn kind(&self) -> &'static str;
        fn item(&self) -> &T;
    }

    struct User;

    #[test]
    fn generic_base_and_arity() {
        let key = TypeKey::of_trait::<dyn Repo<User>>();
        let base = key.generic_base().unwrap();
        assert!(base.ends_with("Repo"), "unexpected base: {}", base);
        assert_eq!(key.generic_arity(), Some(1));

        let plain = TypeKey::of::<String>();
        assert_eq!(plain.generic_base(), None);
        assert_eq!(plain.generic_arity(), None);
    }

    #[test]
    fn nested_generics_count_top_level_args_only() {
        let key = TypeKey::of::<std::collections::HashMap<String, Vec<u8>>>();
        assert_eq!(key.generic_arity(), Some(2));
    }

    #[test]
    fn trait_keys_compare_by_name() {
        assert_eq!(
            TypeKey::of_trait::<dyn Repo<User>>(),
            TypeKey::of_trait::<dyn Repo<User>>()
        );
        assert_ne!(TypeKey::of::<u32>(), TypeKey::of::<u64>());
    }
}
