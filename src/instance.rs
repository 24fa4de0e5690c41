//! Type-erased instances and constructor arguments

use crate::factory::{ErasedFactory, Factory};
use crate::{DiError, Injectable, Result};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// A shared value stored in or produced by a binding.
///
/// The payload is an `Arc<T>` boxed behind `dyn Any`, so unsized contracts
/// (`Arc<dyn Logger>`) survive erasure. The address of the `T` is kept for
/// identity checks.
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    addr: usize,
    type_name: &'static str,
}

impl Instance {
    /// Erase a shared value
    #[inline]
    pub fn new<T: ?Sized + Injectable>(value: Arc<T>) -> Self {
        let addr = address_of(&value);
        Self {
            value: Arc::new(value) as Arc<dyn Any + Send + Sync>,
            addr,
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Recover the typed value
    #[inline]
    pub fn downcast<T: ?Sized + Injectable>(&self) -> Result<Arc<T>> {
        self.value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or(DiError::TypeMismatch {
                expected: std::any::type_name::<T>(),
                found: self.type_name,
            })
    }

    /// True if both erase the same allocation
    #[inline]
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        self.addr == other.addr
    }

    /// True if this erases `value`
    #[inline]
    pub fn is<T: ?Sized>(&self, value: &Arc<T>) -> bool {
        self.addr == address_of(value)
    }

    #[inline]
    pub(crate) fn addr(&self) -> usize {
        self.addr
    }

    /// Name of the erased type
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_name)
            .field("addr", &format_args!("{:#x}", self.addr))
            .finish()
    }
}

#[inline]
pub(crate) fn address_of<T: ?Sized>(value: &Arc<T>) -> usize {
    Arc::as_ptr(value) as *const () as usize
}

/// One resolved injection point
pub(crate) enum Resolved {
    One(Instance),
    Missing,
    Many(Vec<Instance>),
    Producer(ErasedFactory),
}

/// Resolved dependencies handed to [`Inject::construct`](crate::Inject::construct)
/// and [`Inject::inject`](crate::Inject::inject).
///
/// Values come out in the order their injection points were declared in
/// [`TypeMetadata`](crate::TypeMetadata).
pub struct Arguments {
    owner: &'static str,
    values: std::vec::IntoIter<(&'static str, Resolved)>,
}

impl Arguments {
    pub(crate) fn new(owner: &'static str, values: Vec<(&'static str, Resolved)>) -> Self {
        Self {
            owner,
            values: values.into_iter(),
        }
    }

    /// Number of values not yet taken
    #[inline]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn take<T: ?Sized + 'static>(&mut self) -> Result<(&'static str, Resolved)> {
        self.values.next().ok_or_else(|| DiError::CreationFailed {
            type_name: self.owner,
            reason: format!(
                "no injection point left for {}; metadata and constructor disagree",
                std::any::type_name::<T>()
            ),
        })
    }

    fn mismatch(&self, point: &'static str, expected: &str) -> DiError {
        DiError::CreationFailed {
            type_name: self.owner,
            reason: format!("injection point `{point}` is not {expected}"),
        }
    }

    /// Next required dependency
    pub fn next<T: ?Sized + Injectable>(&mut self) -> Result<Arc<T>> {
        match self.take::<T>()? {
            (_, Resolved::One(instance)) => instance.downcast::<T>(),
            (point, _) => Err(self.mismatch(point, "a required dependency")),
        }
    }

    /// Next optional dependency; `None` when nothing was bound
    pub fn next_optional<T: ?Sized + Injectable>(&mut self) -> Result<Option<Arc<T>>> {
        match self.take::<T>()? {
            (_, Resolved::One(instance)) => instance.downcast::<T>().map(Some),
            (_, Resolved::Missing) => Ok(None),
            (point, _) => Err(self.mismatch(point, "an optional dependency")),
        }
    }

    /// Next plural dependency, in registration order
    pub fn next_all<T: ?Sized + Injectable>(&mut self) -> Result<Vec<Arc<T>>> {
        match self.take::<T>()? {
            (_, Resolved::Many(instances)) => {
                instances.iter().map(Instance::downcast::<T>).collect()
            }
            (point, _) => Err(self.mismatch(point, "a plural dependency")),
        }
    }

    /// Next deferred producer
    pub fn next_factory<T: ?Sized + Injectable>(&mut self) -> Result<Factory<T>> {
        match self.take::<T>()? {
            (_, Resolved::Producer(inner)) => Ok(Factory::from_erased(inner)),
            (point, _) => Err(self.mismatch(point, "a factory dependency")),
        }
    }
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("owner", &self.owner)
            .field("remaining", &self.remaining())
            .finish()
    }
}
