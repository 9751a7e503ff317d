//! Build sessions: per-request state for one resolution call.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BuildError, BuildResult};
use crate::instance::{AnyArc, Builder, Instance};
use crate::internal::Dispose;
use crate::key::{CacheKey, TypeKey};
use crate::lifecycle::Lifecycle;
use crate::pipeline::{PipelineGraph, PipelineRole};

/// Depth bound backstopping the repeat-frame check for degenerate graphs.
const MAX_DEPTH: usize = 256;

struct Frame {
    plugin: TypeKey,
    instance: &'static str,
    concrete: &'static str,
    lifecycle: Lifecycle,
}

impl Frame {
    fn label(&self) -> String {
        format!(
            "{} ({}) '{}'",
            self.plugin.display_name(),
            self.concrete,
            self.instance
        )
    }
}

/// One resolution request's working state: the build stack for cycle
/// detection and error reporting, plus the session-scoped object cache
/// deduplicating transient dependencies within the request.
///
/// Sessions are created per top-level container call and never shared
/// between threads.
pub(crate) struct BuildSession {
    pipeline: Arc<PipelineGraph>,
    stack: RefCell<Vec<Frame>>,
    session_cache: RefCell<HashMap<CacheKey, AnyArc>>,
    overrides_by_type: HashMap<TypeKey, AnyArc>,
    overrides_by_name: HashMap<&'static str, AnyArc>,
}

impl BuildSession {
    pub(crate) fn new(pipeline: Arc<PipelineGraph>) -> Self {
        Self::with_overrides(pipeline, HashMap::new(), HashMap::new())
    }

    pub(crate) fn with_overrides(
        pipeline: Arc<PipelineGraph>,
        overrides_by_type: HashMap<TypeKey, AnyArc>,
        overrides_by_name: HashMap<&'static str, AnyArc>,
    ) -> Self {
        Self {
            pipeline,
            stack: RefCell::new(Vec::new()),
            session_cache: RefCell::new(HashMap::new()),
            overrides_by_type,
            overrides_by_name,
        }
    }

    pub(crate) fn context(&self) -> BuildContext<'_> {
        BuildContext { session: self }
    }

    pub(crate) fn resolve_default(&self, key: &TypeKey) -> BuildResult<AnyArc> {
        self.pipeline.assert_alive()?;
        let (instance, lifecycle) = self.pipeline.find_default(key)?;
        self.build_instance(key, &instance, lifecycle)
    }

    pub(crate) fn resolve_named(&self, key: &TypeKey, name: &'static str) -> BuildResult<AnyArc> {
        self.pipeline.assert_alive()?;
        let (instance, lifecycle) = self.pipeline.find_named(key, name)?;
        self.build_instance(key, &instance, lifecycle)
    }

    pub(crate) fn resolve_all(&self, key: &TypeKey) -> BuildResult<Vec<AnyArc>> {
        self.pipeline.assert_alive()?;
        let found = self.pipeline.all_instances(key)?;
        let mut out = Vec::with_capacity(found.len());
        for (instance, lifecycle) in found {
            out.push(self.build_instance(key, &instance, lifecycle)?);
        }
        Ok(out)
    }

    /// Routes one instance through its lifecycle's cache and builds on a
    /// miss. The repeat-frame check runs before any cache is touched, so a
    /// cyclic graph reports an error instead of deadlocking on its own
    /// in-flight cache cell.
    fn build_instance(
        &self,
        key: &TypeKey,
        instance: &Instance,
        lifecycle: Lifecycle,
    ) -> BuildResult<AnyArc> {
        let cache_key = CacheKey::new(*key, instance.name());
        {
            let stack = self.stack.borrow();
            let repeat = stack
                .iter()
                .any(|f| f.plugin == *key && f.instance == instance.name());
            if repeat || stack.len() >= MAX_DEPTH {
                let mut path: Vec<String> = stack.iter().map(Frame::label).collect();
                path.push(format!(
                    "{} ({}) '{}'",
                    key.display_name(),
                    instance.concrete_name(),
                    instance.name()
                ));
                return Err(BuildError::Cyclic { path });
            }
        }
        match lifecycle {
            Lifecycle::UniquePerRequest => self.execute(key, instance, lifecycle),
            Lifecycle::Singleton => self
                .pipeline
                .singleton_cache()
                .get_or_build(cache_key, || self.execute(key, instance, lifecycle)),
            Lifecycle::ThreadLocal => self
                .pipeline
                .thread_cache()
                .get_or_build(cache_key, || self.execute(key, instance, lifecycle)),
            Lifecycle::Context => self
                .pipeline
                .layer_cache()
                .get_or_build(cache_key, || self.execute(key, instance, lifecycle)),
            Lifecycle::NestedContainer => {
                if self.pipeline.role() == PipelineRole::Nested {
                    self.pipeline
                        .layer_cache()
                        .get_or_build(cache_key, || self.execute(key, instance, lifecycle))
                } else {
                    self.session_cached(cache_key, key, instance, lifecycle)
                }
            }
            Lifecycle::Transient => self.session_cached(cache_key, key, instance, lifecycle),
        }
    }

    fn session_cached(
        &self,
        cache_key: CacheKey,
        key: &TypeKey,
        instance: &Instance,
        lifecycle: Lifecycle,
    ) -> BuildResult<AnyArc> {
        if let Some(obj) = self.session_cache.borrow().get(&cache_key) {
            return Ok(obj.clone());
        }
        let built = self.execute(key, instance, lifecycle)?;
        self.session_cache
            .borrow_mut()
            .insert(cache_key, built.clone());
        Ok(built)
    }

    /// Runs the instance's builder under a new stack frame. The innermost
    /// failing frame attaches the build stack to the error.
    fn execute(
        &self,
        key: &TypeKey,
        instance: &Instance,
        lifecycle: Lifecycle,
    ) -> BuildResult<AnyArc> {
        self.stack.borrow_mut().push(Frame {
            plugin: *key,
            instance: instance.name(),
            concrete: instance.concrete_name(),
            lifecycle,
        });
        let ctx = self.context();
        let result = match instance.builder() {
            Builder::Literal(obj) => Ok(obj.clone()),
            Builder::Lambda(factory) => factory(&ctx),
            Builder::Plan(plan) => plan.build(&ctx),
            Builder::Reference(target) => self.resolve_named(key, *target),
        };
        let result = result
            .map_err(|e| e.with_stack(|| self.stack.borrow().iter().map(Frame::label).collect()));
        self.stack.borrow_mut().pop();
        result
    }
}

/// Resolution surface handed to builders while a session is running.
///
/// A build plan or lambda uses the context to resolve its constructor
/// arguments; requests flow through the same session, so the build stack,
/// explicit argument overrides and session-scoped caching all apply to
/// dependencies.
pub struct BuildContext<'s> {
    session: &'s BuildSession,
}

impl<'s> BuildContext<'s> {
    fn downcast_concrete<T: Send + Sync + 'static>(obj: AnyArc) -> BuildResult<Arc<T>> {
        obj.downcast::<T>()
            .map_err(|_| BuildError::TypeMismatch(std::any::type_name::<T>()))
    }

    // Trait objects are stored double-wrapped; unwrap one level.
    fn downcast_trait<T: ?Sized + Send + Sync + 'static>(obj: AnyArc) -> BuildResult<Arc<T>> {
        obj.downcast::<Arc<T>>()
            .map(|wrapped| (*wrapped).clone())
            .map_err(|_| BuildError::TypeMismatch(std::any::type_name::<T>()))
    }

    fn absence_to_none<T>(result: BuildResult<Arc<T>>) -> BuildResult<Option<Arc<T>>>
    where
        T: ?Sized,
    {
        match result {
            Ok(obj) => Ok(Some(obj)),
            Err(e) if e.is_absence() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Resolves the default instance of a concrete plugin type.
    ///
    /// An explicit argument supplied via [`Container::with`](crate::Container::with)
    /// wins over the registered default.
    pub fn get_instance<T: Send + Sync + 'static>(&self) -> BuildResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        if let Some(obj) = self.session.overrides_by_type.get(&key) {
            return Self::downcast_concrete(obj.clone());
        }
        Self::downcast_concrete(self.session.resolve_default(&key)?)
    }

    /// Resolves a named instance of a concrete plugin type.
    pub fn get_instance_named<T: Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        if let Some(obj) = self.session.overrides_by_name.get(name) {
            if let Ok(typed) = Self::downcast_concrete::<T>(obj.clone()) {
                return Ok(typed);
            }
        }
        Self::downcast_concrete(self.session.resolve_named(&TypeKey::of::<T>(), name)?)
    }

    /// Resolves the default instance of a trait-object plugin type.
    pub fn get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Arc<T>> {
        let key = TypeKey::of_trait::<T>();
        if let Some(obj) = self.session.overrides_by_type.get(&key) {
            return Self::downcast_trait(obj.clone());
        }
        Self::downcast_trait(self.session.resolve_default(&key)?)
    }

    /// Resolves a named instance of a trait-object plugin type.
    pub fn get_trait_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: &'static str,
    ) -> BuildResult<Arc<T>> {
        if let Some(obj) = self.session.overrides_by_name.get(name) {
            if let Ok(typed) = Self::downcast_trait::<T>(obj.clone()) {
                return Ok(typed);
            }
        }
        Self::downcast_trait(self.session.resolve_named(&TypeKey::of_trait::<T>(), name)?)
    }

    /// Like [`get_instance`](Self::get_instance), with absence mapped to
    /// `Ok(None)`.
    pub fn try_get_instance<T: Send + Sync + 'static>(&self) -> BuildResult<Option<Arc<T>>> {
        Self::absence_to_none(self.get_instance::<T>())
    }

    /// Like [`get_trait`](Self::get_trait), with absence mapped to `Ok(None)`.
    pub fn try_get_trait<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Option<Arc<T>>> {
        Self::absence_to_none(self.get_trait::<T>())
    }

    /// Builds every registered instance of a concrete plugin type, in
    /// registration order.
    pub fn get_all_instances<T: Send + Sync + 'static>(&self) -> BuildResult<Vec<Arc<T>>> {
        self.session
            .resolve_all(&TypeKey::of::<T>())?
            .into_iter()
            .map(Self::downcast_concrete::<T>)
            .collect()
    }

    /// Builds every registered instance of a trait-object plugin type, in
    /// registration order.
    pub fn get_all_traits<T: ?Sized + Send + Sync + 'static>(&self) -> BuildResult<Vec<Arc<T>>> {
        self.session
            .resolve_all(&TypeKey::of_trait::<T>())?
            .into_iter()
            .map(Self::downcast_trait::<T>)
            .collect()
    }

    /// The plugin type requesting the object currently being built, if the
    /// build stack is at least two frames deep.
    pub fn parent_type(&self) -> Option<&'static str> {
        let stack = self.session.stack.borrow();
        (stack.len() >= 2).then(|| stack[stack.len() - 2].plugin.display_name())
    }

    /// The plugin type at the root of the current build stack.
    pub fn root_type(&self) -> Option<&'static str> {
        let stack = self.session.stack.borrow();
        stack.first().map(|f| f.plugin.display_name())
    }

    /// Registers a disposal hook for the object currently being built.
    ///
    /// Singleton hooks go to the root layer and run when the root container
    /// is disposed; every other lifecycle's hooks run when the resolving
    /// layer is disposed. Hooks run LIFO.
    pub fn register_disposer<T: Dispose + ?Sized + 'static>(&self, object: Arc<T>) {
        let stack = self.session.stack.borrow();
        let (tag, lifecycle) = match stack.last() {
            Some(frame) => (
                Some(CacheKey::new(frame.plugin, frame.instance)),
                frame.lifecycle,
            ),
            None => (None, Lifecycle::Transient),
        };
        drop(stack);
        self.session
            .pipeline
            .register_disposal(lifecycle, tag, Box::new(move || object.dispose()));
    }

    /// Applies the registered build-up action for `T` to an already-built
    /// object, resolving the action's dependencies through this session.
    pub fn build_up<T: 'static>(&self, target: &mut T) -> BuildResult<()> {
        let key = TypeKey::of::<T>();
        match self.session.pipeline.build_up_fn(&key) {
            Some(action) => action(self, target),
            None => Err(BuildError::configuration(
                key.display_name(),
                "no build-up action is registered for this type",
            )),
        }
    }

    /// The pipeline this session resolves from. Inside a nested container's
    /// build this is the nested layer, never the parent.
    pub(crate) fn pipeline(&self) -> Arc<PipelineGraph> {
        self.session.pipeline.clone()
    }
}
