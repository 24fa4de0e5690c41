//! Injection metadata and its per-container cache
//!
//! A concrete type describes its constructor parameters and members once
//! through [`Inject::describe`](crate::Inject::describe). The cache memoizes
//! the result so repeated construction never re-describes a type.

use crate::binder::Binder;
use crate::key::{Identifier, Tag, TypeKey};
use crate::{DiError, Inject, Injectable, Result};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// How an injection point is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Exactly one instance; missing binding is an error
    Required,
    /// One instance, or nothing if the type is unbound
    Optional,
    /// Every Multiple binding of the type
    All,
    /// A [`Factory`](crate::Factory) handle
    Factory,
}

/// A single constructor parameter or member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionPoint {
    name: &'static str,
    key: TypeKey,
    identifier: Option<Identifier>,
    tag: Option<Tag>,
    kind: DependencyKind,
}

impl InjectionPoint {
    /// Point with an explicit kind
    #[inline]
    pub fn new<T: ?Sized + Injectable>(name: &'static str, kind: DependencyKind) -> Self {
        Self {
            name,
            key: TypeKey::of::<T>(),
            identifier: None,
            tag: None,
            kind,
        }
    }

    /// `Arc<T>` dependency
    #[inline]
    pub fn required<T: ?Sized + Injectable>(name: &'static str) -> Self {
        Self::new::<T>(name, DependencyKind::Required)
    }

    /// `Option<Arc<T>>` dependency
    #[inline]
    pub fn optional<T: ?Sized + Injectable>(name: &'static str) -> Self {
        Self::new::<T>(name, DependencyKind::Optional)
    }

    /// `Vec<Arc<T>>` dependency
    #[inline]
    pub fn all<T: ?Sized + Injectable>(name: &'static str) -> Self {
        Self::new::<T>(name, DependencyKind::All)
    }

    /// `Factory<T>` dependency
    #[inline]
    pub fn factory<T: ?Sized + Injectable>(name: &'static str) -> Self {
        Self::new::<T>(name, DependencyKind::Factory)
    }

    /// Resolve a named binding
    #[inline]
    pub fn with_id(mut self, identifier: impl Into<Identifier>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Only consider bindings carrying this tag
    #[inline]
    pub fn with_tag(mut self, tag: impl Into<Tag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    #[inline]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.identifier.as_ref()
    }

    #[inline]
    pub fn tag(&self) -> Option<&Tag> {
        self.tag.as_ref()
    }

    #[inline]
    pub fn kind(&self) -> DependencyKind {
        self.kind
    }
}

/// Everything the resolver needs to build one concrete type.
///
/// # Examples
///
/// ```rust
/// use simple_container::{InjectionPoint, TypeMetadata};
///
/// struct Config;
/// struct Cache;
/// struct Service;
///
/// let meta = TypeMetadata::of::<Service>()
///     .param(InjectionPoint::required::<Config>("config"))
///     .member(InjectionPoint::optional::<Cache>("cache").with_id("hot"));
///
/// assert_eq!(meta.constructor().len(), 1);
/// assert_eq!(meta.members()[0].identifier().unwrap().as_str(), "hot");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeMetadata {
    key: TypeKey,
    constructor: Vec<InjectionPoint>,
    members: Vec<InjectionPoint>,
}

impl TypeMetadata {
    /// Empty metadata for `T` (a type with a no-argument constructor)
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            key: TypeKey::of::<T>(),
            constructor: Vec::new(),
            members: Vec::new(),
        }
    }

    /// Append a constructor parameter
    #[inline]
    pub fn param(mut self, point: InjectionPoint) -> Self {
        self.constructor.push(point);
        self
    }

    /// Append a member injected after construction
    #[inline]
    pub fn member(mut self, point: InjectionPoint) -> Self {
        self.members.push(point);
        self
    }

    #[inline]
    pub fn key(&self) -> TypeKey {
        self.key
    }

    /// Constructor parameters in declaration order
    #[inline]
    pub fn constructor(&self) -> &[InjectionPoint] {
        &self.constructor
    }

    /// Members in declaration order
    #[inline]
    pub fn members(&self) -> &[InjectionPoint] {
        &self.members
    }

    /// Total number of injection points
    #[inline]
    pub fn dependency_count(&self) -> usize {
        self.constructor.len() + self.members.len()
    }
}

/// Produces the metadata of one concrete type
pub type Describer = fn() -> TypeMetadata;

/// Memo of [`TypeMetadata`] keyed by concrete type
pub struct TypeMetadataCache {
    entries: DashMap<TypeKey, Arc<TypeMetadata>, RandomState>,
}

impl TypeMetadataCache {
    /// Create an empty cache
    #[inline]
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a cache with room for `capacity` types
    #[inline]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: DashMap::with_capacity_and_hasher_and_shard_amount(
                capacity,
                RandomState::new(),
                8,
            ),
        }
    }

    /// Metadata of `key`, computing and storing it on first request.
    ///
    /// Fails with `NoInjectableConstructor` when the type is not cached and
    /// no describer is available.
    pub fn describe(&self, key: TypeKey, describer: Option<Describer>) -> Result<Arc<TypeMetadata>> {
        if let Some(cached) = self.entries.get(&key) {
            #[cfg(feature = "logging")]
            trace!(
                target: "simple_container",
                type_name = key.name(),
                "Metadata cache hit"
            );
            return Ok(Arc::clone(cached.value()));
        }

        let describer = describer.ok_or(DiError::NoInjectableConstructor {
            type_name: key.name(),
        })?;

        // Described outside the shard lock; a racing thread may describe too,
        // but only the first result is kept.
        let metadata = Arc::new(describer());

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            type_name = key.name(),
            constructor = metadata.constructor().len(),
            members = metadata.members().len(),
            "Caching type metadata"
        );

        Ok(Arc::clone(self.entries.entry(key).or_insert(metadata).value()))
    }

    /// Typed form of [`describe`](Self::describe)
    #[inline]
    pub fn describe_type<C: Inject>(&self) -> Result<Arc<TypeMetadata>> {
        self.describe(TypeKey::of::<C>(), Some(C::describe))
    }

    /// Describe every concrete type the binder can construct.
    ///
    /// Returns how many types were newly cached.
    pub fn warm(&self, binder: &Binder) -> usize {
        let mut warmed = 0;
        for concrete in binder.concrete_targets() {
            if self.entries.contains_key(&concrete.key()) {
                continue;
            }
            if self.describe(concrete.key(), Some(concrete.describer())).is_ok() {
                warmed += 1;
            }
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            warmed = warmed,
            cached = self.entries.len(),
            "Warmed metadata cache"
        );

        warmed
    }

    /// Cached metadata without computing it
    #[inline]
    pub fn get(&self, key: &TypeKey) -> Option<Arc<TypeMetadata>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    #[inline]
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached entry
    #[inline]
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl Default for TypeMetadataCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TypeMetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeMetadataCache")
            .field("types", &self.entries.len())
            .finish()
    }
}
