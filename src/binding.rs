//! Bindings: the registration rules stored in a [`Binder`]
//!
//! A binding maps a requested type (optionally qualified by an identifier)
//! to a target and a strategy that decides how instances are shared.

use crate::binder::Binder;
use crate::container::Container;
use crate::instance::Arguments;
use crate::key::{Identifier, Tag, TypeKey};
use crate::metadata::Describer;
use crate::{DiError, Implements, Inject, Injectable, Instance, Result};
use ahash::RandomState;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::any::Any;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Strategy & Constraint
// =============================================================================

/// How instances of a binding are shared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// A new instance on every resolve
    Address,
    /// One instance per binding, created on first resolve
    Singleton,
    /// Resolve yields a [`Factory`](crate::Factory) that builds on demand
    Factory,
    /// One instance per identifier per binding
    Multiton,
}

/// How many bindings may exist for one `(type, identifier)` pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constraint {
    /// At most one; storing another replaces it
    Single,
    /// Any number, resolved together with `resolve_all`
    Multiple,
}

impl Strategy {
    /// Constraint implied by this strategy
    #[inline]
    pub fn constraint(self) -> Constraint {
        match self {
            Strategy::Singleton | Strategy::Factory => Constraint::Single,
            Strategy::Address | Strategy::Multiton => Constraint::Multiple,
        }
    }

    /// True if resolved instances are kept by the binding
    #[inline]
    pub fn caches(self) -> bool {
        matches!(self, Strategy::Singleton | Strategy::Multiton)
    }
}

// =============================================================================
// Concrete (type-erased constructible type)
// =============================================================================

type ConstructFn = fn(&mut Arguments) -> Result<Box<dyn Any + Send>>;
type CompleteFn = fn(Box<dyn Any + Send>, &mut Arguments) -> Result<Instance>;

/// A concrete type the resolver can build, erased over its contract.
///
/// Construction happens in two steps so member points are resolved only
/// after the constructor succeeded: `construct` builds the value from its
/// constructor arguments, then `complete` injects members and converts the
/// value into the requested contract.
#[derive(Clone, Copy)]
pub struct Concrete {
    key: TypeKey,
    describe: Describer,
    construct: ConstructFn,
    complete: CompleteFn,
}

impl Concrete {
    /// `C` bound to itself
    #[inline]
    pub fn of<C: Inject>() -> Self {
        Self::as_contract::<C, C>()
    }

    /// `C` producing instances of contract `T`
    #[inline]
    pub fn as_contract<T, C>() -> Self
    where
        T: ?Sized + Injectable,
        C: Inject + Implements<T>,
    {
        Self {
            key: TypeKey::of::<C>(),
            describe: C::describe,
            construct: construct_erased::<C>,
            complete: complete_erased::<T, C>,
        }
    }

    /// Key of the concrete type
    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub(crate) fn describer(&self) -> Describer {
        self.describe
    }

    #[inline]
    pub(crate) fn construct(&self, args: &mut Arguments) -> Result<Box<dyn Any + Send>> {
        (self.construct)(args)
    }

    #[inline]
    pub(crate) fn complete(&self, value: Box<dyn Any + Send>, members: &mut Arguments) -> Result<Instance> {
        (self.complete)(value, members)
    }
}

fn construct_erased<C: Inject>(args: &mut Arguments) -> Result<Box<dyn Any + Send>> {
    Ok(Box::new(C::construct(args)?))
}

fn complete_erased<T, C>(value: Box<dyn Any + Send>, members: &mut Arguments) -> Result<Instance>
where
    T: ?Sized + Injectable,
    C: Inject + Implements<T>,
{
    let mut value = value.downcast::<C>().map_err(|_| DiError::TypeMismatch {
        expected: std::any::type_name::<C>(),
        found: "constructed value",
    })?;
    value.inject(members)?;
    let shared: Arc<C> = Arc::from(value);
    Ok(Instance::new::<T>(<C as Implements<T>>::upcast(shared)))
}

impl fmt::Debug for Concrete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Concrete").field(&self.key).finish()
    }
}

// =============================================================================
// Target
// =============================================================================

pub(crate) type ProducerFn = Arc<dyn Fn(&Container) -> Result<Instance> + Send + Sync>;

/// What a binding resolves to
#[derive(Clone)]
pub(crate) enum Target {
    /// Nothing yet; resolving fails with `NoInjectableConstructor`
    None,
    /// Built through the resolver
    Type(Concrete),
    /// A fixed, pre-built instance
    Value(Instance),
    /// A user closure
    Producer(ProducerFn),
    /// The owning container itself
    Container,
}

/// Public view of a binding's target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    None,
    /// Concrete type that gets constructed
    Type(TypeKey),
    Value,
    Producer,
    Container,
}

impl Target {
    fn kind(&self) -> TargetKind {
        match self {
            Target::None => TargetKind::None,
            Target::Type(concrete) => TargetKind::Type(concrete.key()),
            Target::Value(_) => TargetKind::Value,
            Target::Producer(_) => TargetKind::Producer,
            Target::Container => TargetKind::Container,
        }
    }
}

// =============================================================================
// Binding
// =============================================================================

/// Process-unique binding number; also the global registration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// A stored registration rule together with its instance cache.
///
/// Event handlers and query predicates receive bindings by reference.
pub struct Binding {
    id: BindingId,
    key: TypeKey,
    strategy: Strategy,
    target: Target,
    identifier: Option<Identifier>,
    tag: Option<Tag>,
    identifier_agnostic: bool,
    singleton: OnceCell<Instance>,
    multiton: DashMap<Option<Identifier>, Arc<OnceCell<Instance>>, RandomState>,
}

impl Binding {
    pub(crate) fn new(draft: Draft) -> Self {
        Self {
            id: BindingId::next(),
            key: draft.key,
            strategy: draft.strategy,
            target: draft.target,
            identifier: draft.identifier,
            tag: draft.tag,
            identifier_agnostic: draft.identifier_agnostic,
            singleton: OnceCell::new(),
            multiton: DashMap::with_hasher(RandomState::new()),
        }
    }

    #[inline]
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// The requested type
    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    #[inline]
    pub fn constraint(&self) -> Constraint {
        self.strategy.constraint()
    }

    #[inline]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    /// Whether the binding also answers resolves for any identifier
    #[inline]
    pub fn is_identifier_agnostic(&self) -> bool {
        self.identifier_agnostic
    }

    #[inline]
    pub fn target_kind(&self) -> TargetKind {
        self.target.kind()
    }

    #[inline]
    pub(crate) fn target(&self) -> &Target {
        &self.target
    }

    /// True if an instance has been cached
    pub fn is_cached(&self) -> bool {
        self.singleton.get().is_some() || self.multiton.iter().any(|slot| slot.value().get().is_some())
    }

    /// True if this binding holds the value at `addr`, as its fixed target
    /// or in its cache
    pub(crate) fn holds(&self, addr: usize) -> bool {
        if let Target::Value(value) = &self.target {
            if value.addr() == addr {
                return true;
            }
        }
        if self.singleton.get().is_some_and(|cached| cached.addr() == addr) {
            return true;
        }
        self.multiton
            .iter()
            .any(|slot| slot.value().get().is_some_and(|cached| cached.addr() == addr))
    }

    #[inline]
    pub(crate) fn singleton_slot(&self) -> &OnceCell<Instance> {
        &self.singleton
    }

    /// Cache slot for one multiton identifier. The slot is created under the
    /// shard lock and initialised by the caller outside of it.
    pub(crate) fn multiton_slot(&self, identifier: Option<&Identifier>) -> Arc<OnceCell<Instance>> {
        if let Some(slot) = self.multiton.get(&identifier.cloned()) {
            return Arc::clone(slot.value());
        }
        Arc::clone(self.multiton.entry(identifier.cloned()).or_default().value())
    }

    /// Number of multiton instances created so far
    #[inline]
    pub fn multiton_len(&self) -> usize {
        self.multiton.iter().filter(|slot| slot.value().get().is_some()).count()
    }

    /// Plain-data snapshot
    pub fn info(&self) -> BindingInfo {
        BindingInfo {
            id: self.id,
            key: self.key,
            strategy: self.strategy,
            constraint: self.constraint(),
            identifier: self.identifier.clone(),
            tag: self.tag.clone(),
            identifier_agnostic: self.identifier_agnostic,
            target: self.target.kind(),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("key", &self.key)
            .field("strategy", &self.strategy)
            .field("identifier", &self.identifier)
            .field("tag", &self.tag)
            .field("target", &self.target.kind())
            .finish()
    }
}

/// Snapshot of a binding returned by queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingInfo {
    pub id: BindingId,
    pub key: TypeKey,
    pub strategy: Strategy,
    pub constraint: Constraint,
    pub identifier: Option<Identifier>,
    pub tag: Option<Tag>,
    pub identifier_agnostic: bool,
    pub target: TargetKind,
}

// =============================================================================
// Builders
// =============================================================================

/// Binding fields collected by a builder before `store`
pub(crate) struct Draft {
    key: TypeKey,
    strategy: Strategy,
    target: Target,
    identifier: Option<Identifier>,
    tag: Option<Tag>,
    identifier_agnostic: bool,
}

impl Draft {
    pub(crate) fn new(key: TypeKey, strategy: Strategy) -> Self {
        Self {
            key,
            strategy,
            target: Target::None,
            identifier: None,
            tag: None,
            identifier_agnostic: false,
        }
    }

    pub(crate) fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    pub(crate) fn with_identifier(mut self, identifier: Option<Identifier>) -> Self {
        self.identifier = identifier;
        self
    }
}

/// Fluent binding builder returned by `bind*`.
///
/// Nothing is stored until [`done`](Self::done) is called.
///
/// # Examples
///
/// ```rust
/// use simple_container::{implements, Container, Inject, Arguments, TypeMetadata, Result};
///
/// trait Clock: Send + Sync {
///     fn now(&self) -> u64;
/// }
///
/// struct FixedClock;
/// impl Clock for FixedClock {
///     fn now(&self) -> u64 { 42 }
/// }
/// impl Inject for FixedClock {
///     fn describe() -> TypeMetadata { TypeMetadata::of::<Self>() }
///     fn construct(_: &mut Arguments) -> Result<Self> { Ok(FixedClock) }
/// }
/// implements!(FixedClock => dyn Clock);
///
/// let container = Container::new();
/// container.bind_singleton::<dyn Clock>().to::<FixedClock>().as_id("test").done().unwrap();
///
/// let clock = container.resolve_named::<dyn Clock>("test").unwrap();
/// assert_eq!(clock.now(), 42);
/// ```
#[must_use = "the binding is only stored when `done()` is called"]
pub struct BindingBuilder<'a, T: ?Sized> {
    binder: &'a Binder,
    draft: Draft,
    _contract: PhantomData<fn() -> Box<T>>,
}

impl<'a, T: ?Sized + Injectable> BindingBuilder<'a, T> {
    pub(crate) fn new(binder: &'a Binder, strategy: Strategy) -> Self {
        Self {
            binder,
            draft: Draft::new(TypeKey::of::<T>(), strategy),
            _contract: PhantomData,
        }
    }

    /// Construct `C` through the resolver
    #[inline]
    pub fn to<C: Inject + Implements<T>>(mut self) -> Self {
        self.draft.target = Target::Type(Concrete::as_contract::<T, C>());
        self
    }

    /// Always resolve to this shared value
    #[inline]
    pub fn to_value(mut self, value: Arc<T>) -> Self {
        self.draft.target = Target::Value(Instance::new(value));
        self
    }

    /// Always resolve to this value
    #[inline]
    pub fn to_instance<C: Implements<T>>(self, value: C) -> Self {
        self.to_value(C::upcast(Arc::new(value)))
    }

    /// Produce instances with a closure
    pub fn to_factory<F>(mut self, factory: F) -> Self
    where
        F: Fn(&Container) -> Result<Arc<T>> + Send + Sync + 'static,
    {
        self.draft.target = Target::Producer(Arc::new(move |container: &Container| {
            factory(container).map(Instance::new)
        }));
        self
    }

    /// Qualify the binding with an identifier
    #[inline]
    pub fn as_id(mut self, identifier: impl Into<Identifier>) -> Self {
        self.draft.identifier = Some(identifier.into());
        self
    }

    #[inline]
    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        self.draft.tag = Some(tag.into());
        self
    }

    /// Let an unqualified Single binding answer named resolves too
    #[inline]
    pub fn any_identifier(mut self) -> Self {
        self.draft.identifier_agnostic = true;
        self
    }

    /// Store the binding
    pub fn done(self) -> Result<BindingInfo> {
        self.binder.store(Binding::new(self.draft))
    }
}

impl<T: Inject> BindingBuilder<'_, T> {
    /// Construct `T` itself
    #[inline]
    pub fn to_self(self) -> Self {
        self.to::<T>()
    }
}

impl<T: ?Sized> fmt::Debug for BindingBuilder<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingBuilder")
            .field("key", &self.draft.key)
            .field("strategy", &self.draft.strategy)
            .field("identifier", &self.draft.identifier)
            .finish()
    }
}

/// Builder for a batch of self-bound concrete types
#[must_use = "the bindings are only stored when `done()` is called"]
pub struct MultipleBindingBuilder<'a> {
    binder: &'a Binder,
    drafts: Vec<Draft>,
}

impl fmt::Debug for MultipleBindingBuilder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultipleBindingBuilder")
            .field("len", &self.drafts.len())
            .finish()
    }
}

impl<'a> MultipleBindingBuilder<'a> {
    pub(crate) fn new(binder: &'a Binder, types: &[Concrete], strategies: &[Strategy]) -> Result<Self> {
        if types.len() != strategies.len() {
            return Err(DiError::ArityMismatch {
                types: types.len(),
                strategies: strategies.len(),
            });
        }

        let drafts = types
            .iter()
            .zip(strategies)
            .map(|(concrete, strategy)| Draft::new(concrete.key(), *strategy).with_target(Target::Type(*concrete)))
            .collect();

        Ok(Self { binder, drafts })
    }

    /// Qualify every binding with the same identifier
    pub fn as_id(mut self, identifier: impl Into<Identifier>) -> Self {
        let identifier = identifier.into();
        for draft in &mut self.drafts {
            draft.identifier = Some(identifier.clone());
        }
        self
    }

    pub fn tagged(mut self, tag: impl Into<Tag>) -> Self {
        let tag = tag.into();
        for draft in &mut self.drafts {
            draft.tag = Some(tag.clone());
        }
        self
    }

    /// Store every binding in order; stops at the first failure
    pub fn done(self) -> Result<Vec<BindingInfo>> {
        self.drafts
            .into_iter()
            .map(|draft| self.binder.store(Binding::new(draft)))
            .collect()
    }
}
