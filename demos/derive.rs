//! Example demonstrating the #[derive(Inject)] macro
//!
//! Run with:
//!   cargo run --example derive --features derive

use simple_container::{Container, Inject, Result};
use std::sync::Arc;

trait Greeter: Send + Sync {
    fn greet(&self, name: &str) -> String;
}

#[derive(Inject)]
#[inject(implements(dyn Greeter))]
struct English;

impl Greeter for English {
    fn greet(&self, name: &str) -> String {
        format!("Hello, {name}!")
    }
}

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct Cache {
    size: usize,
}

#[derive(Inject)]
struct UserService {
    #[inject]
    greeter: Arc<dyn Greeter>,
    #[inject(id = "primary")]
    db: Arc<Database>,
    #[inject(optional)]
    cache: Option<Arc<Cache>>,
    // Non-injected field uses Default
    request_count: u64,
}

impl UserService {
    fn describe_self(&self) -> String {
        let cache_status = if self.cache.is_some() {
            "with cache"
        } else {
            "without cache"
        };
        format!(
            "UserService on {} ({}, requests: {})",
            self.db.url, cache_status, self.request_count
        )
    }
}

fn main() -> Result<()> {
    println!("=== #[derive(Inject)] Demo ===\n");

    let container = Container::new();
    container.bind_singleton::<dyn Greeter>().to::<English>().done()?;
    container
        .bind_singleton::<Database>()
        .to_instance(Database {
            url: "postgres://primary".into(),
        })
        .as_id("primary")
        .done()?;
    container.bind::<UserService>().to_self().done()?;

    let service = container.resolve::<UserService>()?;
    println!("{}", service.greeter.greet("world"));
    println!("{}", service.describe_self());

    let metadata = container.metadata().describe_type::<UserService>()?;
    println!("\nInjection points:");
    for point in metadata.constructor() {
        println!("  {} -> {} ({:?})", point.name(), point.key().name(), point.kind());
    }

    Ok(())
}
