//! Benchmarks for the binding container

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use simple_container::{
    Arguments, Concrete, Container, Inject, InjectionPoint, Result, Strategy, TypeMetadata,
};
use std::hint::black_box;
use std::sync::Arc;

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

impl Inject for SmallService {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>()
    }

    fn construct(_: &mut Arguments) -> Result<Self> {
        Ok(SmallService { value: 42 })
    }
}

#[allow(dead_code)]
struct Repository {
    small: Arc<SmallService>,
}

impl Inject for Repository {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>().param(InjectionPoint::required::<SmallService>("small"))
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Repository { small: args.next()? })
    }
}

#[allow(dead_code)]
struct Handler {
    repository: Arc<Repository>,
    small: Arc<SmallService>,
}

impl Inject for Handler {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>()
            .param(InjectionPoint::required::<Repository>("repository"))
            .param(InjectionPoint::required::<SmallService>("small"))
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(Handler {
            repository: args.next()?,
            small: args.next()?,
        })
    }
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("singleton_value", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .bind_singleton::<SmallService>()
                .to_instance(SmallService { value: 42 })
                .done()
                .unwrap();
            black_box(container)
        })
    });

    group.bench_function("constructor_type", |b| {
        b.iter(|| {
            let container = Container::new();
            container.bind::<Repository>().to_self().done().unwrap();
            black_box(container)
        })
    });

    group.throughput(Throughput::Elements(3));
    group.bench_function("bind_multiple_3", |b| {
        b.iter(|| {
            let container = Container::new();
            container
                .bind_multiple(
                    &[
                        Concrete::of::<SmallService>(),
                        Concrete::of::<Repository>(),
                        Concrete::of::<Handler>(),
                    ],
                    &[Strategy::Singleton, Strategy::Singleton, Strategy::Address],
                )
                .unwrap()
                .done()
                .unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");

    let container = Container::new();
    container.bind_singleton::<SmallService>().to_self().done().unwrap();
    container.bind_singleton::<Repository>().to_self().done().unwrap();
    container.bind::<Handler>().to_self().done().unwrap();
    container.init().unwrap();

    group.bench_function("singleton_cached", |b| {
        b.iter(|| black_box(container.resolve::<SmallService>().unwrap()))
    });

    group.bench_function("address_two_dependencies", |b| {
        b.iter(|| black_box(container.resolve::<Handler>().unwrap()))
    });

    group.bench_function("try_resolve_missing", |b| {
        b.iter(|| black_box(container.try_resolve::<String>()))
    });

    let multiton = Container::new();
    multiton
        .bind_multiton::<SmallService>()
        .to_self()
        .done()
        .unwrap();
    let _ = multiton.resolve_named::<SmallService>("primary").unwrap();

    group.bench_function("multiton_cached", |b| {
        b.iter(|| black_box(multiton.resolve_named::<SmallService>("primary").unwrap()))
    });

    group.finish();
}

fn bench_factory(c: &mut Criterion) {
    let mut group = c.benchmark_group("factory");

    let container = Container::new();
    container.bind_singleton::<SmallService>().to_self().done().unwrap();
    container.bind_factory::<Repository>().to_self().done().unwrap();
    let factory = container.resolve_factory::<Repository>().unwrap();

    group.bench_function("factory_create", |b| {
        b.iter(|| black_box(factory.create().unwrap()))
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = Container::new();
        container.bind_singleton::<SmallService>().to_self().done().unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.resolve::<SmallService>().unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_factory,
    bench_concurrent,
);
criterion_main!(benches);
