//! Lifecycle extensions and binder events
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example extensions --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example extensions --features logging-pretty
//! ```

use simple_container::{BinderEvent, Container, Extension, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts bindings added while it is registered
struct BindingAudit {
    added: Arc<AtomicUsize>,
}

impl Extension for BindingAudit {
    fn on_register(&self, container: &Container) -> Result<()> {
        let added = Arc::clone(&self.added);
        container.subscribe(BinderEvent::AfterAdd, move |binding| {
            added.fetch_add(1, Ordering::SeqCst);
            println!("  [audit] bound {}", binding.key().name());
        });
        Ok(())
    }

    fn on_init(&self, container: &Container) -> Result<()> {
        println!("  [audit] init with {} bindings", container.all_bindings().len());
        Ok(())
    }

    fn on_unregister(&self, _: &Container) -> Result<()> {
        println!(
            "  [audit] {} bindings added in total",
            self.added.load(Ordering::SeqCst)
        );
        Ok(())
    }
}

/// Seeds configuration on init
struct Defaults;

impl Extension for Defaults {
    fn on_init(&self, container: &Container) -> Result<()> {
        container
            .bind_singleton::<String>()
            .to_instance(String::from("production"))
            .as_id("environment")
            .done()?;
        Ok(())
    }
}

fn main() -> Result<()> {
    #[cfg(feature = "logging")]
    {
        simple_container::logging::init();
    }

    println!("=== Extensions Demo ===\n");

    let container = Container::builder().identifier("app").build();

    container
        .register_extension(Arc::new(BindingAudit {
            added: Arc::new(AtomicUsize::new(0)),
        }))?
        .register_extension(Arc::new(Defaults))?;

    println!("1. Init:");
    container.init()?;

    let environment = container.resolve_named::<String>("environment")?;
    println!("  environment = {environment}\n");

    println!("2. Binding after init:");
    container.bind_singleton::<u32>().to_instance(8080).done()?;
    println!("  port = {}\n", container.resolve::<u32>()?);

    println!("3. Dispose:");
    container.dispose()?;

    Ok(())
}
