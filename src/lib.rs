//! # simple-container - Binding-Based Dependency Injection for Rust
//!
//! An inversion-of-control container built around explicit bindings: each
//! binding maps a requested type (optionally qualified by an identifier) to
//! a target and a strategy that decides how instances are shared.
//!
//! ## Features
//!
//! - 🔗 **Bindings** - Bind concrete types, trait objects, fixed values or closures
//! - ♻️ **Strategies** - Address (fresh), Singleton, Factory and Multiton (per identifier)
//! - 🧠 **Metadata cache** - Injection points are described once per type and memoized
//! - 🔔 **Binder events** - Observe bindings being added and removed
//! - 🧩 **Extensions** - Lifecycle hooks for register, init and teardown
//! - 🔄 **Cycle detection** - Circular dependencies are reported with their path
//! - 📊 **Observable** - Optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use simple_container::{implements, Arguments, Container, Inject, InjectionPoint, Result, TypeMetadata};
//! use std::sync::Arc;
//!
//! trait Logger: Send + Sync {
//!     fn log(&self, message: &str) -> String;
//! }
//!
//! struct ConsoleLogger;
//!
//! impl Logger for ConsoleLogger {
//!     fn log(&self, message: &str) -> String {
//!         format!("[console] {message}")
//!     }
//! }
//!
//! impl Inject for ConsoleLogger {
//!     fn describe() -> TypeMetadata {
//!         TypeMetadata::of::<Self>()
//!     }
//!
//!     fn construct(_: &mut Arguments) -> Result<Self> {
//!         Ok(ConsoleLogger)
//!     }
//! }
//!
//! implements!(ConsoleLogger => dyn Logger);
//!
//! struct Service {
//!     logger: Arc<dyn Logger>,
//! }
//!
//! impl Inject for Service {
//!     fn describe() -> TypeMetadata {
//!         TypeMetadata::of::<Self>().param(InjectionPoint::required::<dyn Logger>("logger"))
//!     }
//!
//!     fn construct(args: &mut Arguments) -> Result<Self> {
//!         Ok(Service { logger: args.next()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.bind_singleton::<dyn Logger>().to::<ConsoleLogger>().done().unwrap();
//! container.bind::<Service>().to_self().done().unwrap();
//!
//! let service = container.resolve::<Service>().unwrap();
//! assert_eq!(service.logger.log("hi"), "[console] hi");
//! ```
//!
//! ## Strategies
//!
//! ```rust
//! use simple_container::Container;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! static COUNTER: AtomicU64 = AtomicU64::new(0);
//!
//! struct Connection(u64);
//!
//! let container = Container::new();
//!
//! // Multiton - one instance per identifier
//! container
//!     .bind_multiton::<Connection>()
//!     .to_factory(|_| Ok(Arc::new(Connection(COUNTER.fetch_add(1, Ordering::SeqCst)))))
//!     .done()
//!     .unwrap();
//!
//! let a = container.resolve_named::<Connection>("primary").unwrap();
//! let b = container.resolve_named::<Connection>("primary").unwrap();
//! let c = container.resolve_named::<Connection>("replica").unwrap();
//! assert!(Arc::ptr_eq(&a, &b));
//! assert!(!Arc::ptr_eq(&a, &c));
//! ```
//!
//! ## Lifecycle
//!
//! A container is constructed, then initialised with [`Container::init`]
//! (which warms the metadata cache and runs every extension's `on_init`), and
//! finally disposed with [`Container::dispose`]. Every operation on a
//! disposed container fails with [`DiError::ContainerDisposed`].

mod binder;
mod binding;
mod container;
mod error;
mod extension;
mod factory;
mod instance;
mod key;
#[cfg(feature = "logging")]
pub mod logging;
mod metadata;
mod provider;
mod resolver;

pub use binder::{Binder, BinderEvent, BindingHandler, SubscriptionId};
pub use binding::{
    Binding, BindingBuilder, BindingId, BindingInfo, Concrete, Constraint, MultipleBindingBuilder,
    Strategy, TargetKind,
};
pub use container::{Container, ContainerBuilder, WeakContainer};
pub use error::{DiError, Result};
pub use extension::{Extension, ExtensionState};
pub use factory::Factory;
pub use instance::{Arguments, Instance};
pub use key::{Identifier, Tag, TypeKey};
pub use metadata::{DependencyKind, Describer, InjectionPoint, TypeMetadata, TypeMetadataCache};
pub use provider::{Implements, Inject, Injectable};
pub use resolver::ResolutionMode;

#[cfg(feature = "derive")]
pub use simple_container_derive::Inject;

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        implements, Arguments, BinderEvent, Concrete, Container, ContainerBuilder, DiError,
        Extension, Factory, Identifier, Implements, Inject, Injectable, InjectionPoint,
        ResolutionMode, Result, Strategy, TypeMetadata,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct Database {
        url: String,
    }

    struct UserService {
        db: Arc<Database>,
    }

    impl Inject for UserService {
        fn describe() -> TypeMetadata {
            TypeMetadata::of::<Self>().param(InjectionPoint::required::<Database>("db"))
        }

        fn construct(args: &mut Arguments) -> Result<Self> {
            Ok(UserService { db: args.next()? })
        }
    }

    #[test]
    fn test_value_binding() {
        let container = Container::new();
        container
            .bind_singleton::<Database>()
            .to_instance(Database { url: "test".into() })
            .done()
            .unwrap();

        let db = container.resolve::<Database>().unwrap();
        assert_eq!(db.url, "test");
    }

    #[test]
    fn test_constructor_injection() {
        let container = Container::new();
        container
            .bind_singleton::<Database>()
            .to_instance(Database { url: "shared".into() })
            .done()
            .unwrap();
        container.bind::<UserService>().to_self().done().unwrap();

        let a = container.resolve::<UserService>().unwrap();
        let b = container.resolve::<UserService>().unwrap();

        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a.db, &b.db));
    }

    #[test]
    fn test_producer_runs_per_strategy() {
        static CREATED: AtomicU32 = AtomicU32::new(0);

        struct Lazy;

        let container = Container::new();
        container
            .bind_singleton::<Lazy>()
            .to_factory(|_| {
                CREATED.fetch_add(1, Ordering::SeqCst);
                Ok(Arc::new(Lazy))
            })
            .done()
            .unwrap();

        assert_eq!(CREATED.load(Ordering::SeqCst), 0);
        let _ = container.resolve::<Lazy>().unwrap();
        let _ = container.resolve::<Lazy>().unwrap();
        assert_eq!(CREATED.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_not_found_error() {
        let container = Container::new();
        let err = container.resolve::<Database>().unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_dependency_surfaces() {
        let container = Container::new();
        container.bind::<UserService>().to_self().done().unwrap();
        match container.resolve::<UserService>() {
            Err(DiError::NoBindingFound { type_name, .. }) => assert!(type_name.ends_with("Database")),
            other => panic!("unexpected {:?}", other.map(|_| ())),
        }
    }
}
