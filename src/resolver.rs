//! Resolution of bindings into instances
//!
//! Resolving a type runs four steps: pick the candidate bindings, reject
//! ambiguity, apply the binding's strategy, and (for type targets) build the
//! concrete type from its cached metadata. Re-entering a type that is still
//! under construction on the same thread is reported as a cycle.

use crate::binding::{Binding, Concrete, Strategy, Target};
use crate::container::Container;
use crate::factory::ErasedFactory;
use crate::instance::{Arguments, Resolved};
use crate::key::{Identifier, Tag, TypeKey};
use crate::metadata::{DependencyKind, InjectionPoint};
use crate::{Constraint, DiError, Instance, Result};
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::{debug, trace};

/// How strictly a request is matched against bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResolutionMode {
    /// Exact `(type, identifier)` matches, plus multiton and
    /// identifier-agnostic bindings for qualified requests
    #[default]
    AlwaysResolve,
    /// As `AlwaysResolve`, and an unqualified request also accepts the only
    /// binding of its type whatever that binding's identifier
    Lenient,
}

// =============================================================================
// Cycle detection
// =============================================================================

struct Frame {
    container: u64,
    key: TypeKey,
    identifier: Option<Identifier>,
}

thread_local! {
    static IN_PROGRESS: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Marks `(container, type, identifier)` as under construction until dropped
struct InProgress {
    _not_send: PhantomData<*const ()>,
}

impl InProgress {
    fn enter(container: u64, key: TypeKey, identifier: Option<&Identifier>) -> Result<Self> {
        IN_PROGRESS.with(|stack| {
            let mut stack = stack.borrow_mut();
            let start = stack.iter().position(|frame| {
                frame.container == container
                    && frame.key == key
                    && frame.identifier.as_ref() == identifier
            });

            if let Some(start) = start {
                let path = stack[start..]
                    .iter()
                    .map(|frame| frame.key.name())
                    .chain(std::iter::once(key.name()))
                    .collect::<Vec<_>>()
                    .join(" -> ");

                #[cfg(feature = "logging")]
                debug!(
                    target: "simple_container",
                    type_name = key.name(),
                    path = %path,
                    "Circular dependency detected"
                );

                return Err(DiError::CircularDependency {
                    type_name: key.name(),
                    path,
                });
            }

            stack.push(Frame {
                container,
                key,
                identifier: identifier.cloned(),
            });
            Ok(InProgress {
                _not_send: PhantomData,
            })
        })
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        IN_PROGRESS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Resolves requests against one container
pub(crate) struct Resolver<'c> {
    container: &'c Container,
}

impl<'c> Resolver<'c> {
    #[inline]
    pub(crate) fn new(container: &'c Container) -> Self {
        Self { container }
    }

    #[inline]
    fn enter(&self, key: TypeKey, identifier: Option<&Identifier>) -> Result<InProgress> {
        InProgress::enter(self.container.uid(), key, identifier)
    }

    /// Resolve one instance of `key`
    #[inline]
    pub(crate) fn resolve(&self, key: TypeKey, identifier: Option<&Identifier>) -> Result<Instance> {
        self.resolve_with(key, identifier, None)
    }

    fn resolve_with(&self, key: TypeKey, identifier: Option<&Identifier>, tag: Option<&Tag>) -> Result<Instance> {
        let binding = self.select(key, identifier, tag)?;
        self.resolve_binding(&binding, identifier)
    }

    /// Every Multiple binding of `key`, in registration order
    pub(crate) fn resolve_all(&self, key: TypeKey, tag: Option<&Tag>) -> Result<Vec<Instance>> {
        let bindings = self.container.binder().candidates(key);

        #[cfg(feature = "logging")]
        trace!(
            target: "simple_container",
            type_name = key.name(),
            candidates = bindings.len(),
            "Resolving all bindings"
        );

        bindings
            .iter()
            .filter(|binding| binding.constraint() == Constraint::Multiple)
            .filter(|binding| tag.is_none() || binding.tag() == tag)
            .map(|binding| self.resolve_binding(binding, binding.identifier()))
            .collect()
    }

    /// Deferred producer for the binding selected by `key` and `identifier`
    pub(crate) fn factory(&self, key: TypeKey, identifier: Option<&Identifier>, tag: Option<&Tag>) -> Result<ErasedFactory> {
        let binding = self.select(key, identifier, tag)?;
        Ok(ErasedFactory::new(self.container, &binding, identifier))
    }

    /// Build a concrete type that has no binding of its own
    pub(crate) fn instantiate(&self, concrete: &Concrete) -> Result<Instance> {
        let _guard = self.enter(concrete.key(), None)?;
        self.construct(concrete)
    }

    /// Instance for a factory handle: Factory bindings build fresh, others
    /// follow their own strategy.
    pub(crate) fn create_from(&self, binding: &Arc<Binding>, identifier: Option<&Identifier>) -> Result<Instance> {
        match binding.strategy() {
            Strategy::Factory => {
                let _guard = self.enter(binding.key(), identifier)?;
                self.produce(binding)
            }
            _ => self.resolve_binding(binding, identifier),
        }
    }

    // =========================================================================
    // Candidate selection
    // =========================================================================

    fn select(&self, key: TypeKey, identifier: Option<&Identifier>, tag: Option<&Tag>) -> Result<Arc<Binding>> {
        let mut bound = self.container.binder().candidates(key);
        if let Some(tag) = tag {
            bound.retain(|binding| binding.tag() == Some(tag));
        }

        let exact: Vec<Arc<Binding>> = bound
            .iter()
            .filter(|binding| binding.identifier() == identifier)
            .cloned()
            .collect();

        let chosen = if !exact.is_empty() {
            exact
        } else if identifier.is_some() {
            bound
                .into_iter()
                .filter(|binding| {
                    binding.identifier().is_none()
                        && (binding.strategy() == Strategy::Multiton
                            || (binding.constraint() == Constraint::Single
                                && binding.is_identifier_agnostic()))
                })
                .collect()
        } else if self.container.resolution_mode() == ResolutionMode::Lenient && bound.len() == 1 {
            bound
        } else {
            Vec::new()
        };

        let mut chosen = chosen.into_iter();
        match (chosen.next(), chosen.next()) {
            (Some(binding), None) => Ok(binding),
            (None, _) => Err(DiError::no_binding(key, identifier)),
            (Some(_), Some(_)) => Err(DiError::AmbiguousBinding {
                type_name: key.name(),
                identifier: identifier.cloned(),
                candidates: 2 + chosen.count(),
            }),
        }
    }

    // =========================================================================
    // Strategies
    // =========================================================================

    fn resolve_binding(&self, binding: &Arc<Binding>, identifier: Option<&Identifier>) -> Result<Instance> {
        // The container handle is never cached by its own binding.
        if matches!(binding.target(), Target::Container) {
            return self.produce(binding);
        }

        match binding.strategy() {
            Strategy::Factory => Err(DiError::FactoryBinding {
                type_name: binding.key().name(),
            }),
            Strategy::Address => {
                let _guard = self.enter(binding.key(), identifier)?;
                self.produce(binding)
            }
            // One slot per binding, so the guard follows the binding's own
            // identifier rather than the requested one.
            Strategy::Singleton => self.cached(binding.singleton_slot(), binding, binding.identifier()),
            Strategy::Multiton => {
                let slot = binding.multiton_slot(identifier);
                self.cached(&slot, binding, identifier)
            }
        }
    }

    fn cached(&self, slot: &OnceCell<Instance>, binding: &Binding, identifier: Option<&Identifier>) -> Result<Instance> {
        if let Some(instance) = slot.get() {
            #[cfg(feature = "logging")]
            trace!(
                target: "simple_container",
                type_name = binding.key().name(),
                identifier = ?identifier,
                "Returning cached instance"
            );
            return Ok(instance.clone());
        }

        // Enter before touching the cell: a cycle would otherwise re-enter
        // its initialisation.
        let _guard = self.enter(binding.key(), identifier)?;
        slot.get_or_try_init(|| self.produce(binding)).cloned()
    }

    fn produce(&self, binding: &Binding) -> Result<Instance> {
        match binding.target() {
            Target::None => Err(DiError::NoInjectableConstructor {
                type_name: binding.key().name(),
            }),
            Target::Value(instance) => Ok(instance.clone()),
            Target::Producer(producer) => producer(self.container),
            Target::Container => Ok(Instance::new(Arc::new(self.container.clone()))),
            Target::Type(concrete) => self.construct(concrete),
        }
    }

    // =========================================================================
    // Construction
    // =========================================================================

    fn construct(&self, concrete: &Concrete) -> Result<Instance> {
        let metadata = self
            .container
            .metadata()
            .describe(concrete.key(), Some(concrete.describer()))?;
        let owner = concrete.key().name();

        #[cfg(feature = "logging")]
        debug!(
            target: "simple_container",
            type_name = owner,
            constructor = metadata.constructor().len(),
            members = metadata.members().len(),
            "Constructing instance"
        );

        let mut args = Arguments::new(owner, self.resolve_points(metadata.constructor())?);
        let value = concrete.construct(&mut args)?;
        let mut members = Arguments::new(owner, self.resolve_points(metadata.members())?);
        concrete.complete(value, &mut members)
    }

    fn resolve_points(&self, points: &[InjectionPoint]) -> Result<Vec<(&'static str, Resolved)>> {
        points
            .iter()
            .map(|point| self.resolve_point(point).map(|resolved| (point.name(), resolved)))
            .collect()
    }

    fn resolve_point(&self, point: &InjectionPoint) -> Result<Resolved> {
        match point.kind() {
            DependencyKind::Required => self
                .resolve_with(point.key(), point.identifier(), point.tag())
                .map(Resolved::One),
            DependencyKind::Optional => {
                match self.resolve_with(point.key(), point.identifier(), point.tag()) {
                    Ok(instance) => Ok(Resolved::One(instance)),
                    Err(err) if err.is_not_found() => Ok(Resolved::Missing),
                    Err(err) => Err(err),
                }
            }
            DependencyKind::All => self.resolve_all(point.key(), point.tag()).map(Resolved::Many),
            DependencyKind::Factory => self
                .factory(point.key(), point.identifier(), point.tag())
                .map(Resolved::Producer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerBuilder, Inject, InjectionPoint, TypeMetadata};

    struct Node {
        _next: Arc<Node>,
    }

    impl Inject for Node {
        fn describe() -> TypeMetadata {
            TypeMetadata::of::<Self>().param(InjectionPoint::required::<Node>("next"))
        }

        fn construct(args: &mut Arguments) -> Result<Self> {
            Ok(Node { _next: args.next()? })
        }
    }

    #[derive(Debug)]
    struct Ping {
        _pong: Arc<Pong>,
    }

    #[derive(Debug)]
    struct Pong {
        _ping: Arc<Ping>,
    }

    impl Inject for Ping {
        fn describe() -> TypeMetadata {
            TypeMetadata::of::<Self>().param(InjectionPoint::required::<Pong>("pong"))
        }

        fn construct(args: &mut Arguments) -> Result<Self> {
            Ok(Ping { _pong: args.next()? })
        }
    }

    impl Inject for Pong {
        fn describe() -> TypeMetadata {
            TypeMetadata::of::<Self>().param(InjectionPoint::required::<Ping>("ping"))
        }

        fn construct(args: &mut Arguments) -> Result<Self> {
            Ok(Pong { _ping: args.next()? })
        }
    }

    #[test]
    fn test_self_cycle() {
        let container = Container::new();
        container.bind_singleton::<Node>().to_self().done().unwrap();

        match container.resolve::<Node>() {
            Err(DiError::CircularDependency { path, .. }) => {
                assert!(path.contains("Node -> "), "path was {path}");
            }
            other => panic!("expected a cycle, got {:?}", other.map(|_| ())),
        }

        // The stack unwound; the binding stays unresolved and reports again
        assert!(matches!(
            container.resolve::<Node>(),
            Err(DiError::CircularDependency { .. })
        ));
        IN_PROGRESS.with(|stack| assert!(stack.borrow().is_empty()));
    }

    #[test]
    fn test_two_step_cycle_names_path() {
        let container = Container::new();
        container.bind::<Ping>().to_self().done().unwrap();
        container.bind::<Pong>().to_self().done().unwrap();

        let err = container.resolve::<Ping>().unwrap_err();
        let DiError::CircularDependency { path, .. } = err else {
            panic!("expected a cycle");
        };
        let hops: Vec<&str> = path.split(" -> ").collect();
        assert_eq!(hops.len(), 3);
        assert!(hops[0].ends_with("Ping"));
        assert!(hops[1].ends_with("Pong"));
        assert!(hops[2].ends_with("Ping"));
    }

    #[test]
    fn test_ambiguous_address_bindings() {
        let container = Container::new();
        container.bind::<u32>().to_value(Arc::new(1)).done().unwrap();
        container.bind::<u32>().to_value(Arc::new(2)).done().unwrap();

        assert_eq!(
            container.resolve::<u32>().unwrap_err(),
            DiError::AmbiguousBinding {
                type_name: "u32",
                identifier: None,
                candidates: 2,
            }
        );
        assert_eq!(container.resolve_all::<u32>().unwrap().len(), 2);
    }

    #[test]
    fn test_sole_named_binding_by_mode() {
        let exact = Container::new();
        exact.bind::<u8>().to_value(Arc::new(3)).as_id("only").done().unwrap();
        assert!(exact.resolve::<u8>().unwrap_err().is_not_found());
        assert_eq!(*exact.resolve_named::<u8>("only").unwrap(), 3);

        let lenient = ContainerBuilder::new()
            .resolution_mode(ResolutionMode::Lenient)
            .build();
        lenient.bind::<u8>().to_value(Arc::new(3)).as_id("only").done().unwrap();
        assert_eq!(*lenient.resolve::<u8>().unwrap(), 3);

        // Two named bindings leave nothing to pick
        lenient.bind::<u8>().to_value(Arc::new(4)).as_id("other").done().unwrap();
        assert!(lenient.resolve::<u8>().unwrap_err().is_not_found());
    }

    #[test]
    fn test_identifier_fallbacks() {
        let container = Container::new();
        container
            .bind_singleton::<String>()
            .to_value(Arc::new("shared".into()))
            .any_identifier()
            .done()
            .unwrap();
        container.bind_singleton::<u16>().to_value(Arc::new(16)).done().unwrap();

        assert_eq!(container.resolve_named::<String>("anything").unwrap().as_str(), "shared");
        assert!(container.resolve_named::<u16>("anything").unwrap_err().is_not_found());
    }
}
