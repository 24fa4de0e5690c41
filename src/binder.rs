//! Binding storage for a container
//!
//! Reads go straight to a `DashMap` keyed by requested type. Mutations are
//! serialized by a re-entrant lock so that observers of binder events may
//! bind or unbind from inside their handlers.

use crate::binding::{
    Binding, BindingBuilder, BindingInfo, Concrete, Constraint, MultipleBindingBuilder, Strategy,
    Target,
};
use crate::instance::address_of;
use crate::key::{Identifier, TypeKey};
use crate::{DiError, Injectable, Result};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, RwLock};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// Binder notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinderEvent {
    BeforeAdd,
    AfterAdd,
    BeforeRemove,
    AfterRemove,
}

/// Handle returned by [`Binder::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Callback invoked with the binding being added or removed
pub type BindingHandler = Arc<dyn Fn(&Binding) + Send + Sync>;

struct Observer {
    id: SubscriptionId,
    event: BinderEvent,
    handler: BindingHandler,
}

/// All bindings of one container.
///
/// # Examples
///
/// ```rust
/// use simple_container::{Binder, BinderEvent};
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let binder = Binder::new();
/// let added = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&added);
/// binder.subscribe(BinderEvent::AfterAdd, move |_| {
///     counter.fetch_add(1, Ordering::SeqCst);
/// });
///
/// binder.bind::<u32>().to_value(Arc::new(7)).done().unwrap();
/// assert_eq!(added.load(Ordering::SeqCst), 1);
/// assert_eq!(binder.unbind_type::<u32>(), 1);
/// ```
pub struct Binder {
    bindings: DashMap<TypeKey, Vec<Arc<Binding>>, RandomState>,
    write: ReentrantMutex<()>,
    observers: RwLock<Vec<Observer>>,
    next_subscription: AtomicU64,
    closed: AtomicBool,
}

impl Binder {
    /// Create an empty binder
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a binder with room for `capacity` bound types
    pub fn with_capacity(capacity: usize) -> Self {
        let shard_amount = if capacity <= 16 {
            8
        } else if capacity <= 64 {
            16
        } else {
            32
        };
        Self {
            bindings: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                shard_amount,
            ),
            write: ReentrantMutex::new(()),
            observers: RwLock::new(Vec::new()),
            next_subscription: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    // =========================================================================
    // Binding
    // =========================================================================

    /// Bind `T` with the Address strategy
    #[inline]
    pub fn bind<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.bind_with::<T>(Strategy::Address)
    }

    #[inline]
    pub fn bind_singleton<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.bind_with::<T>(Strategy::Singleton)
    }

    #[inline]
    pub fn bind_factory<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.bind_with::<T>(Strategy::Factory)
    }

    #[inline]
    pub fn bind_multiton<T: ?Sized + Injectable>(&self) -> BindingBuilder<'_, T> {
        self.bind_with::<T>(Strategy::Multiton)
    }

    /// Bind `T` with an explicit strategy
    #[inline]
    pub fn bind_with<T: ?Sized + Injectable>(&self, strategy: Strategy) -> BindingBuilder<'_, T> {
        BindingBuilder::new(self, strategy)
    }

    /// Bind each concrete type to itself with the strategy at the same
    /// position. Fails with `ArityMismatch` if the lists differ in length.
    ///
    /// ```rust
    /// use simple_container::{Binder, Concrete, DiError, Strategy};
    ///
    /// # use simple_container::{Inject, Arguments, TypeMetadata, Result};
    /// # struct A;
    /// # impl Inject for A {
    /// #     fn describe() -> TypeMetadata { TypeMetadata::of::<Self>() }
    /// #     fn construct(_: &mut Arguments) -> Result<Self> { Ok(A) }
    /// # }
    /// let binder = Binder::new();
    /// let err = binder
    ///     .bind_multiple(&[Concrete::of::<A>()], &[Strategy::Singleton, Strategy::Address])
    ///     .unwrap_err();
    /// assert_eq!(err, DiError::ArityMismatch { types: 1, strategies: 2 });
    /// ```
    #[inline]
    pub fn bind_multiple(&self, types: &[Concrete], strategies: &[Strategy]) -> Result<MultipleBindingBuilder<'_>> {
        MultipleBindingBuilder::new(self, types, strategies)
    }

    /// Add a binding, replacing a Single binding with the same type and
    /// identifier.
    pub(crate) fn store(&self, binding: Binding) -> Result<BindingInfo> {
        let _write = self.write.lock();
        if self.is_closed() {
            return Err(DiError::ContainerDisposed);
        }
        Ok(self.store_locked(Arc::new(binding)))
    }

    /// Add a binding to a binder that cannot be closed yet
    pub(crate) fn store_unchecked(&self, binding: Binding) -> BindingInfo {
        let _write = self.write.lock();
        self.store_locked(Arc::new(binding))
    }

    fn store_locked(&self, binding: Arc<Binding>) -> BindingInfo {
        if binding.constraint() == Constraint::Single {
            let replaced = self.collect(Some(binding.key()), |existing| {
                existing.constraint() == Constraint::Single
                    && existing.identifier() == binding.identifier()
            });
            for old in &replaced {
                #[cfg(feature = "logging")]
                debug!(
                    target: "simple_container",
                    type_name = old.key().name(),
                    identifier = ?old.identifier(),
                    "Replacing single binding"
                );
                self.remove_locked(old);
            }
        }

        self.fire(BinderEvent::BeforeAdd, &binding);
        self.bindings
            .entry(binding.key())
            .or_default()
            .push(Arc::clone(&binding));

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            type_name = binding.key().name(),
            strategy = ?binding.strategy(),
            identifier = ?binding.identifier(),
            target_kind = ?binding.target_kind(),
            "Stored binding"
        );

        self.fire(BinderEvent::AfterAdd, &binding);
        binding.info()
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Snapshot of the bindings for `key` (or all, sorted by id), filtered
    /// outside of any map lock.
    fn collect(&self, key: Option<TypeKey>, pred: impl Fn(&Binding) -> bool) -> Vec<Arc<Binding>> {
        let mut snapshot: Vec<Arc<Binding>> = match key {
            Some(key) => self
                .bindings
                .get(&key)
                .map(|list| list.value().clone())
                .unwrap_or_default(),
            None => {
                let mut all: Vec<Arc<Binding>> = self
                    .bindings
                    .iter()
                    .flat_map(|entry| entry.value().clone())
                    .collect();
                all.sort_by_key(|binding| binding.id());
                all
            }
        };
        snapshot.retain(|binding| pred(binding));
        snapshot
    }

    /// Bindings of `key` in registration order
    #[inline]
    pub(crate) fn candidates(&self, key: TypeKey) -> Vec<Arc<Binding>> {
        self.collect(Some(key), |_| true)
    }

    /// Every constructible target, for metadata warm-up
    pub(crate) fn concrete_targets(&self) -> Vec<Concrete> {
        self.collect(None, |_| true)
            .iter()
            .filter_map(|binding| match binding.target() {
                Target::Type(concrete) => Some(*concrete),
                _ => None,
            })
            .collect()
    }

    /// First binding of `key` whose identifier is exactly `identifier`
    pub fn get_binding(&self, key: TypeKey, identifier: Option<&Identifier>) -> Option<BindingInfo> {
        self.collect(Some(key), |binding| binding.identifier() == identifier)
            .first()
            .map(|binding| binding.info())
    }

    /// Every binding of `key` in registration order
    pub fn bindings_for(&self, key: TypeKey) -> Vec<BindingInfo> {
        infos(self.collect(Some(key), |_| true))
    }

    /// Every binding in registration order
    pub fn all(&self) -> Vec<BindingInfo> {
        infos(self.collect(None, |_| true))
    }

    /// Bindings accepted by `pred`
    pub fn find(&self, pred: impl Fn(&Binding) -> bool) -> Vec<BindingInfo> {
        infos(self.collect(None, pred))
    }

    /// Bindings of `key` accepted by `pred`
    pub fn find_for(&self, key: TypeKey, pred: impl Fn(&Binding) -> bool) -> Vec<BindingInfo> {
        infos(self.collect(Some(key), pred))
    }

    /// True if any binding exists for `key`
    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.bindings.contains_key(key)
    }

    /// Total number of bindings
    pub fn len(&self) -> usize {
        self.bindings.iter().map(|entry| entry.value().len()).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    // =========================================================================
    // Unbinding
    // =========================================================================

    fn remove_locked(&self, binding: &Arc<Binding>) -> bool {
        let key = binding.key();
        let present = self
            .bindings
            .get(&key)
            .is_some_and(|list| list.iter().any(|existing| Arc::ptr_eq(existing, binding)));
        if !present {
            return false;
        }

        self.fire(BinderEvent::BeforeRemove, binding);

        // A BeforeRemove handler may already have removed it
        let mut removed = false;
        if let Some(mut list) = self.bindings.get_mut(&key) {
            let before = list.len();
            list.retain(|existing| !Arc::ptr_eq(existing, binding));
            removed = list.len() != before;
        }
        self.bindings.remove_if(&key, |_, list| list.is_empty());
        if !removed {
            return false;
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            type_name = key.name(),
            identifier = ?binding.identifier(),
            "Removed binding"
        );

        self.fire(BinderEvent::AfterRemove, binding);
        true
    }

    fn remove_matching(&self, key: Option<TypeKey>, pred: impl Fn(&Binding) -> bool) -> usize {
        let _write = self.write.lock();
        let mut removed = 0;
        for binding in self.collect(key, pred) {
            if self.remove_locked(&binding) {
                removed += 1;
            }
        }
        removed
    }

    /// Remove every binding of `T`
    #[inline]
    pub fn unbind_type<T: ?Sized + Injectable>(&self) -> usize {
        self.unbind_key(TypeKey::of::<T>())
    }

    /// Remove every binding of `key`
    pub fn unbind_key(&self, key: TypeKey) -> usize {
        self.remove_matching(Some(key), |_| true)
    }

    /// Remove the bindings of `key` whose identifier is exactly `identifier`
    pub fn unbind(&self, key: TypeKey, identifier: Option<&Identifier>) -> usize {
        self.remove_matching(Some(key), |binding| binding.identifier() == identifier)
    }

    /// Remove one binding previously returned by a query
    pub fn unbind_binding(&self, info: &BindingInfo) -> usize {
        self.remove_matching(Some(info.key), |binding| binding.id() == info.id)
    }

    /// Remove every binding holding `value` as its fixed target or in its
    /// instance cache
    pub fn unbind_instance<T: ?Sized>(&self, value: &Arc<T>) -> usize {
        let addr = address_of(value);
        self.remove_matching(None, |binding| binding.holds(addr))
    }

    /// Remove every binding carrying `tag`
    pub fn unbind_tag(&self, tag: &str) -> usize {
        self.remove_matching(None, |binding| binding.tag().is_some_and(|t| &**t == tag))
    }

    /// Remove every binding accepted by `pred`
    pub fn unbind_where(&self, pred: impl Fn(&Binding) -> bool) -> usize {
        self.remove_matching(None, pred)
    }

    /// Remove the bindings of `key` accepted by `pred`
    pub fn unbind_type_where(&self, key: TypeKey, pred: impl Fn(&Binding) -> bool) -> usize {
        self.remove_matching(Some(key), pred)
    }

    // =========================================================================
    // Events
    // =========================================================================

    /// Call `handler` for every future `event`.
    ///
    /// Handlers run synchronously in subscription order on the mutating
    /// thread and may bind or unbind.
    pub fn subscribe<F>(&self, event: BinderEvent, handler: F) -> SubscriptionId
    where
        F: Fn(&Binding) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        self.observers.write().push(Observer {
            id,
            event,
            handler: Arc::new(handler),
        });
        id
    }

    /// Stop a subscription; false if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|observer| observer.id != id);
        observers.len() != before
    }

    fn fire(&self, event: BinderEvent, binding: &Binding) {
        let handlers: Vec<BindingHandler> = self
            .observers
            .read()
            .iter()
            .filter(|observer| observer.event == event)
            .map(|observer| Arc::clone(&observer.handler))
            .collect();

        if handlers.is_empty() {
            return;
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "simple_container",
            event = ?event,
            type_name = binding.key().name(),
            handlers = handlers.len(),
            "Dispatching binder event"
        );

        for handler in handlers {
            handler(binding);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release every binding without notifications; later stores fail
    /// with `ContainerDisposed`
    pub fn close(&self) {
        let _write = self.write.lock();
        self.closed.store(true, Ordering::Release);
        self.bindings.clear();
        self.observers.write().clear();

        #[cfg(feature = "logging")]
        debug!(target: "simple_container", "Binder closed");
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn infos(bindings: Vec<Arc<Binding>>) -> Vec<BindingInfo> {
    bindings.iter().map(|binding| binding.info()).collect()
}

impl Default for Binder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Binder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binder")
            .field("bindings", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    fn record(binder: &Binder, log: &Arc<Mutex<Vec<(BinderEvent, &'static str)>>>) {
        for event in [
            BinderEvent::BeforeAdd,
            BinderEvent::AfterAdd,
            BinderEvent::BeforeRemove,
            BinderEvent::AfterRemove,
        ] {
            let log = Arc::clone(log);
            binder.subscribe(event, move |binding| {
                log.lock().push((event, binding.key().name()));
            });
        }
    }

    #[test]
    fn test_store_fires_in_order() {
        let binder = Binder::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&binder, &log);

        binder.bind::<u32>().to_value(Arc::new(1)).done().unwrap();
        binder.unbind_type::<u32>();

        let events: Vec<BinderEvent> = log.lock().iter().map(|(event, _)| *event).collect();
        assert_eq!(
            events,
            vec![
                BinderEvent::BeforeAdd,
                BinderEvent::AfterAdd,
                BinderEvent::BeforeRemove,
                BinderEvent::AfterRemove,
            ]
        );
    }

    #[test]
    fn test_single_replaces_same_identifier() {
        let binder = Binder::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&binder, &log);

        let first = binder.bind_singleton::<u32>().to_value(Arc::new(1)).done().unwrap();
        let second = binder.bind_singleton::<u32>().to_value(Arc::new(2)).done().unwrap();
        binder
            .bind_singleton::<u32>()
            .to_value(Arc::new(3))
            .as_id("other")
            .done()
            .unwrap();

        let bound = binder.bindings_for(TypeKey::of::<u32>());
        assert_eq!(bound.len(), 2);
        assert_eq!(bound[0].id, second.id);
        assert_ne!(first.id, second.id);
        // replace = remove (2 events) + add (2 events)
        assert_eq!(log.lock().len(), 2 + 4 + 2);
    }

    #[test]
    fn test_multiple_bindings_accumulate() {
        let binder = Binder::new();
        binder.bind::<String>().to_value(Arc::new("a".into())).done().unwrap();
        binder.bind::<String>().to_value(Arc::new("b".into())).done().unwrap();
        assert_eq!(binder.bindings_for(TypeKey::of::<String>()).len(), 2);
        assert_eq!(binder.len(), 2);
    }

    #[test]
    fn test_unbind_variants_count() {
        let binder = Binder::new();
        let shared = Arc::new(9u64);
        binder.bind::<u64>().to_value(Arc::clone(&shared)).done().unwrap();
        binder.bind::<u64>().to_value(Arc::new(10)).tagged("extra").done().unwrap();
        binder.bind::<u8>().to_value(Arc::new(1)).tagged("extra").done().unwrap();
        let named = binder.bind::<u8>().to_value(Arc::new(2)).as_id("two").done().unwrap();

        assert_eq!(binder.unbind_instance(&shared), 1);
        assert_eq!(binder.unbind_tag("extra"), 2);
        assert_eq!(binder.unbind_tag("extra"), 0);
        assert_eq!(binder.unbind_binding(&named), 1);
        assert!(binder.is_empty());
    }

    #[test]
    fn test_unbind_by_identifier_and_predicate() {
        let binder = Binder::new();
        binder.bind::<u8>().to_value(Arc::new(1)).done().unwrap();
        binder.bind::<u8>().to_value(Arc::new(2)).as_id("x").done().unwrap();
        binder.bind::<u16>().to_value(Arc::new(3)).as_id("x").done().unwrap();

        let x = Identifier::from("x");
        assert_eq!(binder.unbind(TypeKey::of::<u8>(), Some(&x)), 1);
        assert_eq!(binder.unbind_where(|b| b.identifier() == Some(&x)), 1);
        assert_eq!(binder.unbind_type_where(TypeKey::of::<u8>(), |b| b.identifier().is_none()), 1);
        assert!(binder.is_empty());
    }

    #[test]
    fn test_handler_may_bind_reentrantly() {
        let binder = Arc::new(Binder::new());
        let inner = Arc::downgrade(&binder);
        binder.subscribe(BinderEvent::AfterAdd, move |binding| {
            if binding.key() == TypeKey::of::<u32>() {
                if let Some(binder) = inner.upgrade() {
                    binder.bind::<u64>().to_value(Arc::new(64)).done().unwrap();
                }
            }
        });

        binder.bind::<u32>().to_value(Arc::new(32)).done().unwrap();
        assert!(binder.contains(&TypeKey::of::<u64>()));
    }

    #[test]
    fn test_nested_unbind_fires_after_remove_once() {
        let binder = Arc::new(Binder::new());
        let log = Arc::new(Mutex::new(Vec::new()));
        record(&binder, &log);

        let inner = Arc::downgrade(&binder);
        let nested = Arc::new(AtomicBool::new(false));
        binder.subscribe(BinderEvent::BeforeRemove, move |_| {
            if !nested.swap(true, Ordering::SeqCst) {
                if let Some(binder) = inner.upgrade() {
                    assert_eq!(binder.unbind_type::<u32>(), 1);
                }
            }
        });

        binder.bind::<u32>().to_value(Arc::new(1)).done().unwrap();
        binder.unbind_type::<u32>();

        assert!(!binder.contains(&TypeKey::of::<u32>()));
        let after_removes = log
            .lock()
            .iter()
            .filter(|(event, _)| *event == BinderEvent::AfterRemove)
            .count();
        assert_eq!(after_removes, 1);
    }

    #[test]
    fn test_unsubscribe() {
        let binder = Binder::new();
        let log = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&log);
        let id = binder.subscribe(BinderEvent::AfterAdd, move |_| *counter.lock() += 1);

        binder.bind::<u8>().to_value(Arc::new(1)).done().unwrap();
        assert!(binder.unsubscribe(id));
        assert!(!binder.unsubscribe(id));
        binder.bind::<u8>().to_value(Arc::new(2)).done().unwrap();
        assert_eq!(*log.lock(), 1);
    }

    #[test]
    fn test_closed_binder_rejects_store() {
        let binder = Binder::new();
        binder.bind::<u8>().to_value(Arc::new(1)).done().unwrap();
        binder.close();

        assert!(binder.is_empty());
        let err = binder.bind::<u8>().to_value(Arc::new(2)).done().unwrap_err();
        assert_eq!(err, DiError::ContainerDisposed);
    }

    #[test]
    fn test_all_in_registration_order() {
        let binder = Binder::new();
        let a = binder.bind::<u8>().to_value(Arc::new(1)).done().unwrap();
        let b = binder.bind::<u16>().to_value(Arc::new(2)).done().unwrap();
        let c = binder.bind::<u8>().to_value(Arc::new(3)).done().unwrap();

        let ids: Vec<_> = binder.all().into_iter().map(|info| info.id).collect();
        assert_eq!(ids, vec![a.id, b.id, c.id]);
        assert!(binder.get_binding(TypeKey::of::<u16>(), None).is_some());
        assert_eq!(binder.find(|b| b.key() == TypeKey::of::<u8>()).len(), 2);
    }
}
