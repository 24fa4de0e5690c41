//! Deferred producers for Factory bindings
//!
//! Resolving a type bound with [`Strategy::Factory`](crate::Strategy::Factory)
//! yields a [`Factory<T>`] instead of an instance. Every call to
//! [`create`](Factory::create) runs the binding's target again.

use crate::binding::Binding;
use crate::container::{Container, WeakContainer};
use crate::key::{Identifier, TypeKey};
use crate::resolver::Resolver;
use crate::{DiError, Injectable, Instance, Result};
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::trace;

/// Untyped factory state; neither the container nor the binding is kept alive
#[derive(Clone)]
pub(crate) struct ErasedFactory {
    container: WeakContainer,
    binding: Weak<Binding>,
    key: TypeKey,
    identifier: Option<Identifier>,
}

impl ErasedFactory {
    pub(crate) fn new(container: &Container, binding: &Arc<Binding>, identifier: Option<&Identifier>) -> Self {
        Self {
            container: container.downgrade(),
            binding: Arc::downgrade(binding),
            key: binding.key(),
            identifier: identifier.cloned(),
        }
    }

    fn create(&self) -> Result<Instance> {
        let container = self.container.upgrade().ok_or(DiError::ContainerDisposed)?;
        if container.is_disposed() {
            return Err(DiError::ContainerDisposed);
        }
        let binding = self
            .binding
            .upgrade()
            .ok_or_else(|| DiError::no_binding(self.key, self.identifier.as_ref()))?;

        #[cfg(feature = "logging")]
        trace!(
            target: "simple_container",
            type_name = self.key.name(),
            identifier = ?self.identifier,
            "Factory creating instance"
        );

        Resolver::new(&container).create_from(&binding, self.identifier.as_ref())
    }

    fn is_live(&self) -> bool {
        self.binding.strong_count() > 0
            && self
                .container
                .upgrade()
                .is_some_and(|container| !container.is_disposed())
    }
}

/// Handle that builds instances of `T` on demand.
///
/// The handle does not keep its binding alive: after the binding is
/// unbound, [`create`](Self::create) fails with `NoBindingFound`.
///
/// # Examples
///
/// ```rust
/// use simple_container::Container;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// static CREATED: AtomicU32 = AtomicU32::new(0);
///
/// struct Job(u32);
///
/// let container = Container::new();
/// container
///     .bind_factory::<Job>()
///     .to_factory(|_| Ok(Arc::new(Job(CREATED.fetch_add(1, Ordering::SeqCst)))))
///     .done()
///     .unwrap();
///
/// let jobs = container.resolve_factory::<Job>().unwrap();
/// let a = jobs.create().unwrap();
/// let b = jobs.create().unwrap();
/// assert_ne!(a.0, b.0);
/// ```
pub struct Factory<T: ?Sized> {
    inner: ErasedFactory,
    _marker: PhantomData<fn() -> Box<T>>,
}

impl<T: ?Sized + Injectable> Factory<T> {
    #[inline]
    pub(crate) fn from_erased(inner: ErasedFactory) -> Self {
        Self {
            inner,
            _marker: PhantomData,
        }
    }

    /// Build an instance
    #[inline]
    pub fn create(&self) -> Result<Arc<T>> {
        self.inner.create()?.downcast::<T>()
    }

    /// False once the binding was removed or the container disposed
    #[inline]
    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }

    /// Identifier the factory was resolved with
    #[inline]
    pub fn identifier(&self) -> Option<&Identifier> {
        self.inner.identifier.as_ref()
    }
}

impl<T: ?Sized> Clone for Factory<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Factory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Factory")
            .field("type", &self.inner.key)
            .field("identifier", &self.inner.identifier)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Ticket(u32);

    #[test]
    fn test_factory_creates_fresh_instances() {
        static NEXT: AtomicU32 = AtomicU32::new(0);

        let container = Container::new();
        container
            .bind_factory::<Ticket>()
            .to_factory(|_| Ok(Arc::new(Ticket(NEXT.fetch_add(1, Ordering::SeqCst)))))
            .done()
            .unwrap();

        let factory = container.resolve_factory::<Ticket>().unwrap();
        let first = factory.create().unwrap();
        let second = factory.clone().create().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(second.0, first.0 + 1);
        assert!(factory.is_live());
    }

    #[test]
    fn test_factory_after_unbind() {
        let container = Container::new();
        container
            .bind_factory::<Ticket>()
            .to_factory(|_| Ok(Arc::new(Ticket(0))))
            .done()
            .unwrap();

        let factory = container.resolve_factory::<Ticket>().unwrap();
        container.unbind_type::<Ticket>().unwrap();

        assert!(!factory.is_live());
        assert!(factory.create().unwrap_err().is_not_found());
    }

    #[test]
    fn test_factory_after_dispose() {
        let container = Container::new();
        container
            .bind_factory::<Ticket>()
            .to_factory(|_| Ok(Arc::new(Ticket(0))))
            .done()
            .unwrap();

        let factory = container.resolve_factory::<Ticket>().unwrap();
        container.dispose().unwrap();
        assert_eq!(factory.create().unwrap_err(), DiError::ContainerDisposed);
    }
}
