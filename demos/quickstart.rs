//! Binding a trait contract, constructor injection and the four strategies
//!
//! Run with:
//!   cargo run --example quickstart

use simple_container::{
    implements, Arguments, Container, Inject, InjectionPoint, Result, TypeMetadata,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

trait Logger: Send + Sync {
    fn log(&self, message: &str);
}

struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn log(&self, message: &str) {
        println!("  [log] {message}");
    }
}

impl Inject for ConsoleLogger {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>()
    }

    fn construct(_: &mut Arguments) -> Result<Self> {
        println!("  [App] ConsoleLogger created");
        Ok(ConsoleLogger)
    }
}

implements!(ConsoleLogger => dyn Logger);

struct Database {
    url: String,
}

struct UserService {
    logger: Arc<dyn Logger>,
    db: Arc<Database>,
}

impl Inject for UserService {
    fn describe() -> TypeMetadata {
        TypeMetadata::of::<Self>()
            .param(InjectionPoint::required::<dyn Logger>("logger"))
            .param(InjectionPoint::required::<Database>("db").with_id("primary"))
    }

    fn construct(args: &mut Arguments) -> Result<Self> {
        Ok(UserService {
            logger: args.next()?,
            db: args.next()?,
        })
    }
}

impl UserService {
    fn find(&self, id: u32) {
        self.logger.log(&format!("looking up user {id} in {}", self.db.url));
    }
}

static CONNECTIONS: AtomicU32 = AtomicU32::new(0);

struct Connection(u32);

fn main() -> Result<()> {
    println!("=== simple-container quick start ===\n");

    let container = Container::new();

    container.bind_singleton::<dyn Logger>().to::<ConsoleLogger>().done()?;
    container
        .bind_singleton::<Database>()
        .to_instance(Database {
            url: "postgres://primary".into(),
        })
        .as_id("primary")
        .done()?;
    container.bind::<UserService>().to_self().done()?;
    container
        .bind_multiton::<Connection>()
        .to_factory(|_| Ok(Arc::new(Connection(CONNECTIONS.fetch_add(1, Ordering::SeqCst)))))
        .done()?;

    container.init()?;

    println!("1. Constructor injection (Address strategy):");
    let first = container.resolve::<UserService>()?;
    let second = container.resolve::<UserService>()?;
    first.find(7);
    println!(
        "  services distinct: {}, logger shared: {}\n",
        !Arc::ptr_eq(&first, &second),
        Arc::ptr_eq(&first.logger, &second.logger)
    );

    println!("2. Multiton per identifier:");
    let primary = container.resolve_named::<Connection>("primary")?;
    let again = container.resolve_named::<Connection>("primary")?;
    let replica = container.resolve_named::<Connection>("replica")?;
    println!(
        "  primary={} again={} replica={}\n",
        primary.0, again.0, replica.0
    );

    println!("3. Bindings:");
    for info in container.all_bindings() {
        println!(
            "  {} ({:?}, id={:?})",
            info.key.name(),
            info.strategy,
            info.identifier
        );
    }

    container.dispose()?;
    println!("\nDisposed: {}", container.is_disposed());
    Ok(())
}
