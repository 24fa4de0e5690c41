//! Provider traits for dependency injection
//!
//! These traits define what types can be bound, how concrete types are built
//! and which contracts they satisfy.

use crate::{Arguments, Result, TypeMetadata};
use std::sync::Arc;

/// Marker trait for anything that can be stored in or resolved from a container.
///
/// Implemented automatically for every `Send + Sync + 'static` type,
/// including unsized contracts such as `dyn Logger` when the trait has
/// `Send + Sync` supertraits.
pub trait Injectable: Send + Sync + 'static {}

impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// A concrete type the container can construct.
///
/// `describe` declares the injection points once; the container caches the
/// result in its [`TypeMetadataCache`](crate::TypeMetadataCache) and hands
/// the resolved values to `construct` (constructor parameters, in declaration
/// order) and afterwards to `inject` (members).
///
/// With the `derive` feature this is generated by `#[derive(Inject)]`.
///
/// # Examples
///
/// ```rust
/// use simple_container::{Arguments, Container, Inject, InjectionPoint, Result, TypeMetadata};
/// use std::sync::Arc;
///
/// struct Config {
///     url: String,
/// }
///
/// struct Database {
///     config: Arc<Config>,
/// }
///
/// impl Inject for Database {
///     fn describe() -> TypeMetadata {
///         TypeMetadata::of::<Self>().param(InjectionPoint::required::<Config>("config"))
///     }
///
///     fn construct(args: &mut Arguments) -> Result<Self> {
///         Ok(Database { config: args.next()? })
///     }
/// }
///
/// let container = Container::new();
/// container
///     .bind_singleton::<Config>()
///     .to_instance(Config { url: "postgres://localhost".into() })
///     .done()
///     .unwrap();
/// container.bind::<Database>().to_self().done().unwrap();
///
/// let db = container.resolve::<Database>().unwrap();
/// assert_eq!(db.config.url, "postgres://localhost");
/// ```
pub trait Inject: Injectable + Sized {
    /// Injection points of this type
    fn describe() -> TypeMetadata;

    /// Build an instance from its resolved constructor parameters
    fn construct(args: &mut Arguments) -> Result<Self>;

    /// Assign member injection points after construction
    fn inject(&mut self, members: &mut Arguments) -> Result<()> {
        let _ = members;
        Ok(())
    }
}

/// Conversion of a shared concrete value into a contract it satisfies.
///
/// Every type implements its own contract. For trait objects use
/// [`implements!`](crate::implements).
pub trait Implements<T: ?Sized>: Injectable {
    /// Convert to the contract
    fn upcast(self: Arc<Self>) -> Arc<T>;
}

impl<T: Injectable> Implements<T> for T {
    #[inline]
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declare that a concrete type satisfies one or more trait-object contracts.
///
/// ```rust
/// use simple_container::implements;
///
/// trait Logger: Send + Sync {}
/// trait Sink: Send + Sync {}
///
/// struct ConsoleLogger;
/// impl Logger for ConsoleLogger {}
/// impl Sink for ConsoleLogger {}
///
/// implements!(ConsoleLogger => dyn Logger, dyn Sink);
/// ```
#[macro_export]
macro_rules! implements {
    ($concrete:ty => $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::Implements<$contract> for $concrete {
                #[inline]
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}
