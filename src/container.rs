//! The dependency injection container
//!
//! A `Container` owns one [`Binder`], one [`TypeMetadataCache`] and an
//! ordered list of lifecycle [`Extension`]s. It is a cheap, cloneable handle;
//! clones share the same state.

use crate::binder::{Binder, BinderEvent, SubscriptionId};
use crate::binding::{
    Binding, BindingBuilder, BindingInfo, Concrete, Draft, MultipleBindingBuilder, Strategy, Target,
};
use crate::extension::{Extension, ExtensionList, ExtensionState};
use crate::instance::address_of;
use crate::key::{Identifier, TypeKey};
use crate::metadata::TypeMetadataCache;
use crate::resolver::{ResolutionMode, Resolver};
use crate::{DiError, Factory, Inject, Injectable, Result};
use parking_lot::ReentrantMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

struct ContainerInner {
    uid: u64,
    identifier: Option<Identifier>,
    mode: ResolutionMode,
    destroy_on_load: AtomicBool,
    initialized: AtomicBool,
    disposed: AtomicBool,
    binder: Binder,
    metadata: TypeMetadataCache,
    extensions: ExtensionList,
    /// Serializes extension registration, init and dispose. Reentrant so
    /// hooks may register or unregister extensions themselves.
    lifecycle: ReentrantMutex<()>,
}

/// Dependency injection container.
///
/// Every container binds itself as a Singleton of `Container` (qualified by
/// its identifier, if it has one), so constructors can depend on it.
///
/// # Examples
///
/// ```rust
/// use simple_container::{Container, Inject, Arguments, InjectionPoint, TypeMetadata, Result};
/// use std::sync::Arc;
///
/// struct Config {
///     name: &'static str,
/// }
///
/// struct Greeter {
///     config: Arc<Config>,
/// }
///
/// impl Inject for Greeter {
///     fn describe() -> TypeMetadata {
///         TypeMetadata::of::<Self>().param(InjectionPoint::required::<Config>("config"))
///     }
///
///     fn construct(args: &mut Arguments) -> Result<Self> {
///         Ok(Greeter { config: args.next()? })
///     }
/// }
///
/// let container = Container::new();
/// container.bind_singleton::<Config>().to_instance(Config { name: "world" }).done().unwrap();
/// container.bind_singleton::<Greeter>().to_self().done().unwrap();
///
/// let a = container.resolve::<Greeter>().unwrap();
/// let b = container.resolve::<Greeter>().unwrap();
/// assert!(Arc::ptr_eq(&a, &b));
/// assert_eq!(a.config.name, "world");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Non-owning reference to a container
#[derive(Clone)]
pub struct WeakContainer {
    inner: Weak<ContainerInner>,
}

impl WeakContainer {
    /// The container, if it is still alive
    #[inline]
    pub fn upgrade(&self) -> Option<Container> {
        self.inner.upgrade().map(|inner| Container { inner })
    }
}

impl std::fmt::Debug for WeakContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakContainer")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

/// Options for creating a [`Container`]
///
/// ```rust
/// use simple_container::{Container, ContainerBuilder, ResolutionMode};
///
/// let container = ContainerBuilder::new()
///     .identifier("app")
///     .resolution_mode(ResolutionMode::Lenient)
///     .capacity(32)
///     .build();
///
/// assert_eq!(container.identifier().unwrap().as_str(), "app");
/// let me = container.resolve_named::<Container>("app").unwrap();
/// assert!(me.ptr_eq(&container));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContainerBuilder {
    identifier: Option<Identifier>,
    mode: ResolutionMode,
    destroy_on_load: bool,
    capacity: usize,
}

impl ContainerBuilder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the container; also qualifies its self-binding
    #[inline]
    pub fn identifier(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    #[inline]
    pub fn resolution_mode(mut self, mode: ResolutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Flag read by hosts that tear containers down when a new scene loads
    #[inline]
    pub fn destroy_on_load(mut self, destroy: bool) -> Self {
        self.destroy_on_load = destroy;
        self
    }

    /// Expected number of bound types
    #[inline]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn build(self) -> Container {
        static NEXT_UID: AtomicU64 = AtomicU64::new(1);
        let uid = NEXT_UID.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            uid = uid,
            identifier = ?self.identifier,
            mode = ?self.mode,
            "Creating container"
        );

        let container = Container {
            inner: Arc::new(ContainerInner {
                uid,
                identifier: self.identifier.clone(),
                mode: self.mode,
                destroy_on_load: AtomicBool::new(self.destroy_on_load),
                initialized: AtomicBool::new(false),
                disposed: AtomicBool::new(false),
                binder: Binder::with_capacity(self.capacity),
                metadata: TypeMetadataCache::with_capacity(self.capacity),
                extensions: ExtensionList::new(),
                lifecycle: ReentrantMutex::new(()),
            }),
        };

        let draft = Draft::new(TypeKey::of::<Container>(), Strategy::Singleton)
            .with_target(Target::Container)
            .with_identifier(self.identifier);
        container.inner.binder.store_unchecked(Binding::new(draft));

        container
    }
}

impl Container {
    /// Create a container with default options
    #[inline]
    pub fn new() -> Self {
        ContainerBuilder::new().build()
    }

    /// Create a container expecting `capacity` bound types
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        ContainerBuilder::new().capacity(capacity).build()
    }

    #[inline]
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    #[inline]
    fn ensure_live(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(DiError::ContainerDisposed);
        }
        Ok(())
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind `T` with the Address strategy (a new instance per resolve)
    #[inline]
    pub fn bind<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.inner.binder.bind::<T>()
    }

    /// Bind `T` with the Singleton strategy
    #[inline]
    pub fn bind_singleton<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.inner.binder.bind_singleton::<T>()
    }

    /// Bind `T` with the Factory strategy
    #[inline]
    pub fn bind_factory<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.inner.binder.bind_factory::<T>()
    }

    /// Bind `T` with the Multiton strategy
    #[inline]
    pub fn bind_multiton<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.inner.binder.bind_multiton::<T>()
    }

    /// See [`Binder::bind_multiple`]
    #[inline]
    pub fn bind_multiple(&self, types: &[Concrete], strategies: &[Strategy]) -> Result<MultipleBindingBuilder<'_>> {
        self.ensure_live()?;
        self.inner.binder.bind_multiple(types, strategies)
    }

    /// The binding of `T` with exactly this identifier
    #[inline]
    pub fn get_binding<T: ?Sized + Injectable>(&self, identifier: Option<&Identifier>) -> Option<BindingInfo> {
        self.inner.binder.get_binding(TypeKey::of::<T>(), identifier)
    }

    #[inline]
    pub fn bindings_for<T: ?Sized + Injectable>(&self) -> Vec<BindingInfo> {
        self.inner.binder.bindings_for(TypeKey::of::<T>())
    }

    #[inline]
    pub fn all_bindings(&self) -> Vec<BindingInfo> {
        self.inner.binder.all()
    }

    /// Remove every binding of `T`
    pub fn unbind_type<T: ?Sized + Injectable>(&self) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.inner.binder.unbind_type::<T>())
    }

    /// Remove the bindings of `T` qualified with `identifier`
    pub fn unbind_named<T: ?Sized + Injectable>(&self, identifier: impl Into<Identifier>) -> Result<usize> {
        self.ensure_live()?;
        let identifier = identifier.into();
        Ok(self.inner.binder.unbind(TypeKey::of::<T>(), Some(&identifier)))
    }

    /// Remove every binding holding `value`
    pub fn unbind_instance<T: ?Sized>(&self, value: &Arc<T>) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.inner.binder.unbind_instance(value))
    }

    /// Remove every binding carrying `tag`
    pub fn unbind_tag(&self, tag: &str) -> Result<usize> {
        self.ensure_live()?;
        Ok(self.inner.binder.unbind_tag(tag))
    }

    /// See [`Binder::subscribe`]
    #[inline]
    pub fn subscribe<F>(&self, event: BinderEvent, handler: F) -> SubscriptionId
    where
        F: Fn(&Binding) + Send + Sync + 'static,
    {
        self.inner.binder.subscribe(event, handler)
    }

    /// The full binder surface
    #[inline]
    pub fn binder(&self) -> &Binder {
        &self.inner.binder
    }

    #[inline]
    pub fn metadata(&self) -> &TypeMetadataCache {
        &self.inner.metadata
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve an unqualified `T`.
    ///
    /// Fails with `NoBindingFound`, `AmbiguousBinding`, `CircularDependency`,
    /// `FactoryBinding` (use [`resolve_factory`](Self::resolve_factory)) or
    /// `ContainerDisposed`.
    pub fn resolve<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.ensure_live()?;

        #[cfg(feature = "logging")]
        trace!(
            target: "simple_container",
            type_name = std::any::type_name::<T>(),
            "Resolving"
        );

        Resolver::new(self).resolve(TypeKey::of::<T>(), None)?.downcast::<T>()
    }

    /// Resolve `T` qualified with `identifier`
    pub fn resolve_named<T: ?Sized + Injectable>(&self, identifier: impl Into<Identifier>) -> Result<Arc<T>> {
        self.ensure_live()?;
        let identifier = identifier.into();

        #[cfg(feature = "logging")]
        trace!(
            target: "simple_container",
            type_name = std::any::type_name::<T>(),
            identifier = %identifier,
            "Resolving named"
        );

        Resolver::new(self)
            .resolve(TypeKey::of::<T>(), Some(&identifier))?
            .downcast::<T>()
    }

    /// Resolve `T`, discarding the error
    #[inline]
    pub fn try_resolve<T: ?Sized + Injectable>(&self) -> Option<Arc<T>> {
        self.resolve::<T>().ok()
    }

    /// Resolve every Multiple (Address or Multiton) binding of `T`, in
    /// registration order
    pub fn resolve_all<T: ?Sized + Injectable>(&self) -> Result<Vec<Arc<T>>> {
        self.ensure_live()?;
        Resolver::new(self)
            .resolve_all(TypeKey::of::<T>(), None)?
            .iter()
            .map(|instance| instance.downcast::<T>())
            .collect()
    }

    /// Deferred producer for `T`
    pub fn resolve_factory<T: ?Sized + Injectable>(&self) -> Result<Factory<T>> {
        self.ensure_live()?;
        let inner = Resolver::new(self).factory(TypeKey::of::<T>(), None, None)?;
        Ok(Factory::from_erased(inner))
    }

    /// Deferred producer for `T` qualified with `identifier`
    pub fn resolve_factory_named<T: ?Sized + Injectable>(&self, identifier: impl Into<Identifier>) -> Result<Factory<T>> {
        self.ensure_live()?;
        let identifier = identifier.into();
        let inner = Resolver::new(self).factory(TypeKey::of::<T>(), Some(&identifier), None)?;
        Ok(Factory::from_erased(inner))
    }

    /// Build a fresh `C` with its dependencies resolved, without binding it
    pub fn instantiate<C: Inject>(&self) -> Result<Arc<C>> {
        self.ensure_live()?;
        Resolver::new(self)
            .instantiate(&Concrete::of::<C>())?
            .downcast::<C>()
    }

    // =========================================================================
    // Extensions
    // =========================================================================

    /// Add an extension and run its `on_register` hook (and `on_init` if
    /// the container is already initialised). Registering a second instance
    /// of the same type does nothing.
    ///
    /// The extension is listed before its hooks run. If `on_register` fails
    /// the error is returned but the extension stays listed in the
    /// `Registered` state, so registering the same type again is a no-op and
    /// the hook is not retried. Unregister it first to try again.
    pub fn register_extension<E: Extension>(&self, extension: Arc<E>) -> Result<&Self> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.ensure_live()?;
        let key = TypeKey::of::<E>();

        let Some(hooks) = self.inner.extensions.insert(extension) else {
            #[cfg(feature = "logging")]
            debug!(
                target: "simple_container",
                extension = key.name(),
                "Extension already registered"
            );
            return Ok(self);
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            extension = key.name(),
            extensions = self.inner.extensions.len(),
            "Registering extension"
        );

        hooks.on_register(self)?;

        if self.is_initialized() {
            hooks.on_init(self)?;
            self.inner.extensions.set_state(key, ExtensionState::Initialized);
        }
        Ok(self)
    }

    /// Build `E` through [`instantiate`](Self::instantiate) and register it
    pub fn register_extension_type<E: Extension + Inject>(&self) -> Result<&Self> {
        if self.has_extension::<E>() {
            return Ok(self);
        }
        let extension = self.instantiate::<E>()?;
        self.register_extension(extension)
    }

    /// Run the `on_unregister` hook of the extension of type `E`, then remove it.
    ///
    /// The extension stays listed, in the `Unregistered` state, while its hook
    /// runs. If the hook fails it keeps its previous state and stays listed.
    /// Returns false if no such extension was registered.
    pub fn unregister_extension<E: Extension>(&self) -> Result<bool> {
        self.ensure_live()?;
        self.unregister_key(TypeKey::of::<E>())
    }

    /// Remove this exact extension instance
    pub fn unregister_extension_instance<E: Extension>(&self, extension: &Arc<E>) -> Result<bool> {
        self.ensure_live()?;
        match self.inner.extensions.key_of(address_of(extension)) {
            Some(key) => self.unregister_key(key),
            None => Ok(false),
        }
    }

    fn unregister_key(&self, key: TypeKey) -> Result<bool> {
        let _lifecycle = self.inner.lifecycle.lock();
        let Some((hooks, previous)) = self.inner.extensions.entry(key) else {
            return Ok(false);
        };

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            extension = key.name(),
            "Unregistering extension"
        );

        // Already torn down by an interrupted dispose
        if previous == ExtensionState::Unregistered {
            self.inner.extensions.remove(key);
            return Ok(true);
        }

        self.inner.extensions.set_state(key, ExtensionState::Unregistered);
        if let Err(err) = hooks.on_unregister(self) {
            self.inner.extensions.set_state(key, previous);
            return Err(err);
        }

        self.inner.extensions.remove(key);
        Ok(true)
    }

    /// The registered extension of type `E`
    #[inline]
    pub fn extension<E: Extension>(&self) -> Option<Arc<E>> {
        self.inner.extensions.get::<E>()
    }

    #[inline]
    pub fn has_extension<E: Extension>(&self) -> bool {
        self.inner.extensions.state(TypeKey::of::<E>()).is_some()
    }

    #[inline]
    pub fn extension_state<E: Extension>(&self) -> Option<ExtensionState> {
        self.inner.extensions.state(TypeKey::of::<E>())
    }

    #[inline]
    pub fn extension_count(&self) -> usize {
        self.inner.extensions.len()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Warm the metadata cache and run `on_init` on every registered
    /// extension in registration order. Calling it again does nothing.
    ///
    /// If a hook fails, the extensions before it stay initialised and the
    /// container does not; a later call resumes with the remaining ones.
    /// Extensions registered by an `on_init` hook are initialised in the
    /// same call.
    pub fn init(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.ensure_live()?;
        if self.is_initialized() {
            return Ok(());
        }

        let _warmed = self.inner.metadata.warm(&self.inner.binder);

        loop {
            let pending = self.inner.extensions.in_state(ExtensionState::Registered);
            if pending.is_empty() {
                break;
            }
            for (key, hooks) in pending {
                if self.inner.extensions.state(key) != Some(ExtensionState::Registered) {
                    continue;
                }
                hooks.on_init(self)?;
                self.inner.extensions.set_state(key, ExtensionState::Initialized);
            }
        }

        self.inner.initialized.store(true, Ordering::Release);

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            uid = self.inner.uid,
            bindings = self.inner.binder.len(),
            metadata = self.inner.metadata.len(),
            extensions = self.inner.extensions.len(),
            warmed = _warmed,
            "Container initialized"
        );

        Ok(())
    }

    /// Run `on_unregister` on every extension in registration order, then
    /// release all bindings and cached metadata.
    ///
    /// Extensions stay listed in the `Unregistered` state. If a hook fails
    /// the container is left undisposed and a later call resumes after the
    /// extensions already torn down.
    pub fn dispose(&self) -> Result<()> {
        let _lifecycle = self.inner.lifecycle.lock();
        self.ensure_live()?;

        for (key, hooks) in self.inner.extensions.active() {
            hooks.on_unregister(self)?;
            self.inner.extensions.set_state(key, ExtensionState::Unregistered);
        }

        self.inner.disposed.store(true, Ordering::Release);
        self.inner.binder.close();
        self.inner.metadata.clear();

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            uid = self.inner.uid,
            "Container disposed"
        );

        Ok(())
    }

    #[inline]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.inner.identifier.as_ref()
    }

    #[inline]
    pub fn resolution_mode(&self) -> ResolutionMode {
        self.inner.mode
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    #[inline]
    pub fn destroy_on_load(&self) -> bool {
        self.inner.destroy_on_load.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn set_destroy_on_load(&self, destroy: bool) {
        self.inner.destroy_on_load.store(destroy, Ordering::Relaxed);
    }

    /// True if both handles refer to the same container
    #[inline]
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub fn downgrade(&self) -> WeakContainer {
        WeakContainer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    #[inline]
    pub(crate) fn uid(&self) -> u64 {
        self.inner.uid
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("identifier", &self.inner.identifier)
            .field("bindings", &self.inner.binder.len())
            .field("extensions", &self.inner.extensions.len())
            .field("initialized", &self.is_initialized())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
