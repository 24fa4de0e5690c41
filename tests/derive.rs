//! `#[derive(Inject)]` against a live container

use simple_container::{Container, DependencyKind, Factory, Inject, TypeKey};
use std::sync::Arc;

trait Logger: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Inject)]
#[inject(implements(dyn Logger))]
struct ConsoleLogger;

impl Logger for ConsoleLogger {
    fn name(&self) -> &'static str {
        "console"
    }
}

#[derive(Inject)]
struct Database {
    url: String,
}

#[derive(Inject)]
struct Cache;

#[derive(Inject)]
struct Session;

struct Plugin(&'static str);

#[derive(Inject)]
struct Metrics;

#[derive(Inject)]
struct UserService {
    #[inject]
    logger: Arc<dyn Logger>,
    #[inject(id = "primary")]
    db: Arc<Database>,
    #[inject(optional)]
    cache: Option<Arc<Cache>>,
    #[inject(all)]
    plugins: Vec<Arc<Plugin>>,
    #[inject(factory)]
    sessions: Factory<Session>,
    #[inject(member)]
    metrics: Option<Arc<Metrics>>,
    requests: u64,
}

impl std::fmt::Debug for UserService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserService").finish_non_exhaustive()
    }
}

fn container() -> Container {
    let container = Container::new();
    container
        .bind_singleton::<dyn Logger>()
        .to::<ConsoleLogger>()
        .done()
        .unwrap();
    container
        .bind_singleton::<Database>()
        .to_instance(Database {
            url: "postgres://primary".into(),
        })
        .as_id("primary")
        .done()
        .unwrap();
    container.bind::<Plugin>().to_instance(Plugin("auth")).done().unwrap();
    container.bind::<Plugin>().to_instance(Plugin("audit")).done().unwrap();
    container.bind_factory::<Session>().to_self().done().unwrap();
    container.bind_singleton::<Metrics>().to_self().done().unwrap();
    container.bind::<UserService>().to_self().done().unwrap();
    container
}

#[test]
fn test_derived_metadata() {
    let metadata = UserService::describe();

    let names: Vec<&str> = metadata.constructor().iter().map(|p| p.name()).collect();
    assert_eq!(names, ["logger", "db", "cache", "plugins", "sessions"]);
    assert_eq!(metadata.members().len(), 1);
    assert_eq!(metadata.members()[0].key(), TypeKey::of::<Metrics>());

    let kinds: Vec<DependencyKind> = metadata.constructor().iter().map(|p| p.kind()).collect();
    assert_eq!(
        kinds,
        [
            DependencyKind::Required,
            DependencyKind::Required,
            DependencyKind::Optional,
            DependencyKind::All,
            DependencyKind::Factory,
        ]
    );
    assert_eq!(metadata.constructor()[1].identifier().map(|id| id.as_str()), Some("primary"));
    assert_eq!(metadata.constructor()[0].key(), TypeKey::of::<dyn Logger>());
}

#[test]
fn test_derived_construction() {
    let container = container();
    let service = container.resolve::<UserService>().unwrap();

    assert_eq!(service.logger.name(), "console");
    assert_eq!(service.db.url, "postgres://primary");
    assert!(service.cache.is_none());
    assert_eq!(service.plugins.len(), 2);
    assert!(service.sessions.create().is_ok());
    assert_eq!(service.requests, 0);

    let metrics = container.resolve::<Metrics>().unwrap();
    assert!(Arc::ptr_eq(service.metrics.as_ref().unwrap(), &metrics));
}

#[test]
fn test_derived_optional_present() {
    let container = container();
    container.bind_singleton::<Cache>().to_self().done().unwrap();

    let service = container.resolve::<UserService>().unwrap();
    assert!(service.cache.is_some());
}

#[test]
fn test_derived_missing_required() {
    let container = Container::new();
    container.bind::<UserService>().to_self().done().unwrap();
    assert!(container.resolve::<UserService>().unwrap_err().is_not_found());
}

#[test]
fn test_default_fields_are_not_injected() {
    let container = Container::new();
    container.bind::<Database>().to_self().done().unwrap();

    let db = container.resolve::<Database>().unwrap();
    assert!(db.url.is_empty());
    assert_eq!(Database::describe().dependency_count(), 0);
}

#[derive(Inject)]
struct Tagged {
    #[inject(tag = "fast", optional)]
    cache: Option<Arc<Cache>>,
}

#[test]
fn test_tag_attribute() {
    let metadata = Tagged::describe();
    let point = &metadata.constructor()[0];
    assert_eq!(point.tag().map(|t| &**t), Some("fast"));
    assert_eq!(point.kind(), DependencyKind::Optional);

    let container = Container::new();
    container.bind_singleton::<Cache>().to_self().tagged("slow").done().unwrap();
    container.bind::<Tagged>().to_self().done().unwrap();
    assert!(container.resolve::<Tagged>().unwrap().cache.is_none());
}
