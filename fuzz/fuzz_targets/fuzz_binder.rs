#![no_main]

//! Fuzz target for binder operations
//!
//! Random sequences of bind, unbind and resolve calls. Checks that Single
//! bindings never coexist for one identifier and that cached strategies
//! keep returning the same instance while their binding lives.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use simple_container::{Arguments, Constraint, Container, DiError, Inject, Result, Strategy, TypeMetadata};
use std::sync::Arc;

struct Service;

impl Inject for Service {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>()
    }

    fn construct(_: &mut Arguments) -> Result<Self> {
        Ok(Service)
    }
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum FuzzStrategy {
    Address,
    Singleton,
    Factory,
    Multiton,
}

impl From<FuzzStrategy> for Strategy {
    fn from(strategy: FuzzStrategy) -> Self {
        match strategy {
            FuzzStrategy::Address => Strategy::Address,
            FuzzStrategy::Singleton => Strategy::Singleton,
            FuzzStrategy::Factory => Strategy::Factory,
            FuzzStrategy::Multiton => Strategy::Multiton,
        }
    }
}

#[derive(Debug, Arbitrary)]
enum BinderOp {
    Bind {
        strategy: FuzzStrategy,
        id: Option<u8>,
        tag: Option<u8>,
        agnostic: bool,
    },
    Resolve(Option<u8>),
    ResolveTwice(Option<u8>),
    ResolveAll,
    ResolveFactory(Option<u8>),
    UnbindType,
    UnbindNamed(u8),
    UnbindTag(u8),
}

fuzz_target!(|ops: Vec<BinderOp>| {
    let container = Container::new();

    for op in ops {
        match op {
            BinderOp::Bind {
                strategy,
                id,
                tag,
                agnostic,
            } => {
                let mut builder = container.binder().bind_with::<Service>(strategy.into()).to_self();
                if let Some(id) = id {
                    builder = builder.as_id(id);
                }
                if let Some(tag) = tag {
                    builder = builder.tagged(format!("tag-{tag}"));
                }
                if agnostic {
                    builder = builder.any_identifier();
                }
                let _ = builder.done();
            }
            BinderOp::Resolve(id) => {
                let result = match id {
                    Some(id) => container.resolve_named::<Service>(id),
                    None => container.resolve::<Service>(),
                };
                if let Err(err) = result {
                    assert!(!matches!(err, DiError::CircularDependency { .. }));
                }
            }
            BinderOp::ResolveTwice(id) => {
                let Some(identifier) = id else { continue };
                let first = container.resolve_named::<Service>(identifier);
                let second = container.resolve_named::<Service>(identifier);
                if let (Ok(first), Ok(second)) = (first, second) {
                    let cached = container
                        .bindings_for::<Service>()
                        .iter()
                        .all(|info| info.strategy == Strategy::Singleton || info.strategy == Strategy::Multiton);
                    if cached {
                        assert!(Arc::ptr_eq(&first, &second));
                    }
                }
            }
            BinderOp::ResolveAll => {
                if let Ok(all) = container.resolve_all::<Service>() {
                    let multiple = container
                        .bindings_for::<Service>()
                        .iter()
                        .filter(|info| info.constraint == Constraint::Multiple)
                        .count();
                    assert_eq!(all.len(), multiple);
                }
            }
            BinderOp::ResolveFactory(id) => {
                let factory = match id {
                    Some(id) => container.resolve_factory_named::<Service>(id),
                    None => container.resolve_factory::<Service>(),
                };
                if let Ok(factory) = factory {
                    let _ = factory.create();
                }
            }
            BinderOp::UnbindType => {
                let _ = container.unbind_type::<Service>();
                assert!(container.bindings_for::<Service>().is_empty());
            }
            BinderOp::UnbindNamed(id) => {
                let _ = container.unbind_named::<Service>(id);
            }
            BinderOp::UnbindTag(tag) => {
                let _ = container.unbind_tag(&format!("tag-{tag}"));
            }
        }

        // At most one Single binding per identifier
        let singles: Vec<_> = container
            .bindings_for::<Service>()
            .into_iter()
            .filter(|info| info.constraint == Constraint::Single)
            .map(|info| info.identifier)
            .collect();
        for (i, id) in singles.iter().enumerate() {
            assert!(!singles[i + 1..].contains(id));
        }
    }
});
