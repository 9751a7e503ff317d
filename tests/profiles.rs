use plugmap::{Container, Instance, Lifecycle};
use std::sync::Arc;

trait Store: Send + Sync {
    fn kind(&self) -> &'static str;
}

struct Real;
impl Store for Real {
    fn kind(&self) -> &'static str {
        "real"
    }
}

struct Stub;
impl Store for Stub {
    fn kind(&self) -> &'static str {
        "stub"
    }
}

fn stores() -> Container {
    Container::new(|registry| {
        registry
            .add(Instance::of_trait::<dyn Store, _>(|_| Ok(Arc::new(Real))).named("real"))
            .add(Instance::of_trait::<dyn Store, _>(|_| Ok(Arc::new(Stub))).named("stub"))
            .set_default_trait::<dyn Store>("real")
            .profile_default_trait::<dyn Store>("testing", "stub");
    })
}

#[test]
fn test_profile_overrides_default() {
    let container = stores();
    let testing = container.get_profile("testing");

    assert_eq!(container.get_trait::<dyn Store>().unwrap().kind(), "real");
    assert_eq!(testing.get_trait::<dyn Store>().unwrap().kind(), "stub");
}

#[test]
fn test_profile_falls_back_to_root_registrations() {
    struct Other;

    let container = stores();
    container.configure(|registry| {
        registry.add(Instance::literal(7u16));
    });
    let testing = container.get_profile("testing");

    assert_eq!(*testing.get_instance::<u16>().unwrap(), 7);
    assert!(testing.get_instance::<Other>().is_err());
}

#[test]
fn test_unknown_profile_behaves_like_root() {
    let container = stores();
    let unknown = container.get_profile("staging");

    assert_eq!(unknown.get_trait::<dyn Store>().unwrap().kind(), "real");
}

#[test]
fn test_profile_layer_is_reused() {
    struct Marker;

    let container = stores();
    container
        .get_profile("testing")
        .configure(|registry| {
            registry.add(Instance::literal(Marker));
        });

    // A second facade for the same profile sees the same layer.
    assert!(container.get_profile("testing").get_instance::<Marker>().is_ok());
    assert!(container.get_instance::<Marker>().is_err());
}

#[test]
fn test_resolved_container_handle_shares_profile_layers() {
    struct Marker;

    let container = stores();
    let handle = container.get_instance::<Container>().unwrap();
    handle.get_profile("testing").configure(|registry| {
        registry.add(Instance::literal(Marker));
    });

    // The handle resolved as a dependency and the owning facade agree on
    // the cached profile layer.
    assert!(container.get_profile("testing").get_instance::<Marker>().is_ok());
}

#[test]
fn test_nested_profile_layer_is_distinct_from_root_profile_layer() {
    struct Marker;

    let container = stores();
    let nested = container.get_nested_container();
    nested.get_profile("testing").configure(|registry| {
        registry.add(Instance::literal(Marker));
    });

    assert!(nested.get_profile("testing").get_instance::<Marker>().is_ok());
    assert!(container.get_profile("testing").get_instance::<Marker>().is_err());
}

#[test]
fn test_profile_shares_root_singletons() {
    struct Shared;

    let container = Container::new(|registry| {
        registry
            .add(Instance::of::<Shared, _>(|_| Ok(Shared)))
            .set_lifecycle::<Shared>(Lifecycle::Singleton);
    });

    let root = container.get_instance::<Shared>().unwrap();
    let profiled = container.get_profile("testing").get_instance::<Shared>().unwrap();
    assert!(Arc::ptr_eq(&root, &profiled));
}

#[test]
fn test_nested_container_for_profile() {
    let container = stores();
    let nested = container.get_nested_container_for_profile("testing");

    assert_eq!(nested.get_trait::<dyn Store>().unwrap().kind(), "stub");
}
