use plugmap::{Container, Instance, Lifecycle};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Counted {
    serial: usize,
}

fn counted_container(lifecycle: Lifecycle) -> (Container, Arc<AtomicUsize>) {
    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let container = Container::new(move |registry| {
        registry
            .add(Instance::of::<Counted, _>(move |_| {
                Ok(Counted {
                    serial: counter.fetch_add(1, Ordering::SeqCst),
                })
            }))
            .set_lifecycle::<Counted>(lifecycle);
    });
    (container, builds)
}

#[test]
fn test_singleton_is_shared() {
    let (container, builds) = counted_container(Lifecycle::Singleton);

    let a = container.get_instance::<Counted>().unwrap();
    let b = container.get_instance::<Counted>().unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transient_rebuilds_per_call() {
    let (container, builds) = counted_container(Lifecycle::Transient);

    let a = container.get_instance::<Counted>().unwrap();
    let b = container.get_instance::<Counted>().unwrap();

    assert!(!Arc::ptr_eq(&a, &b));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_transient_is_deduplicated_within_one_graph() {
    struct Left {
        shared: Arc<Counted>,
    }
    struct Right {
        shared: Arc<Counted>,
    }
    struct Top {
        left: Arc<Left>,
        right: Arc<Right>,
    }

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let container = Container::new(move |registry| {
        registry
            .add(Instance::of::<Counted, _>(move |_| {
                Ok(Counted {
                    serial: counter.fetch_add(1, Ordering::SeqCst),
                })
            }))
            .add(Instance::of::<Left, _>(|ctx| {
                Ok(Left {
                    shared: ctx.get_instance::<Counted>()?,
                })
            }))
            .add(Instance::of::<Right, _>(|ctx| {
                Ok(Right {
                    shared: ctx.get_instance::<Counted>()?,
                })
            }))
            .add(Instance::of::<Top, _>(|ctx| {
                Ok(Top {
                    left: ctx.get_instance::<Left>()?,
                    right: ctx.get_instance::<Right>()?,
                })
            }));
    });

    let top = container.get_instance::<Top>().unwrap();
    assert!(Arc::ptr_eq(&top.left.shared, &top.right.shared));
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    let again = container.get_instance::<Top>().unwrap();
    assert!(!Arc::ptr_eq(&top.left.shared, &again.left.shared));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_unique_per_request_never_deduplicates() {
    struct Pair {
        first: Arc<Counted>,
        second: Arc<Counted>,
    }

    let builds = Arc::new(AtomicUsize::new(0));
    let counter = builds.clone();
    let container = Container::new(move |registry| {
        registry
            .add(Instance::of::<Counted, _>(move |_| {
                Ok(Counted {
                    serial: counter.fetch_add(1, Ordering::SeqCst),
                })
            }))
            .set_lifecycle::<Counted>(Lifecycle::UniquePerRequest)
            .add(Instance::of::<Pair, _>(|ctx| {
                Ok(Pair {
                    first: ctx.get_instance::<Counted>()?,
                    second: ctx.get_instance::<Counted>()?,
                })
            }));
    });

    let pair = container.get_instance::<Pair>().unwrap();
    assert!(!Arc::ptr_eq(&pair.first, &pair.second));
    assert_ne!(pair.first.serial, pair.second.serial);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_instance_lifecycle_overrides_family_lifecycle() {
    struct Widget;

    let container = Container::new(|registry| {
        registry
            .add(Instance::of::<Widget, _>(|_| Ok(Widget)).with_lifecycle(Lifecycle::Singleton))
            .set_lifecycle::<Widget>(Lifecycle::UniquePerRequest);
    });

    let a = container.get_instance::<Widget>().unwrap();
    let b = container.get_instance::<Widget>().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[test]
fn test_thread_local_is_per_thread() {
    let (container, builds) = counted_container(Lifecycle::ThreadLocal);

    let here_a = container.get_instance::<Counted>().unwrap();
    let here_b = container.get_instance::<Counted>().unwrap();
    assert!(Arc::ptr_eq(&here_a, &here_b));

    let there_serial = std::thread::scope(|scope| {
        scope
            .spawn(|| container.get_instance::<Counted>().unwrap().serial)
            .join()
            .unwrap()
    });

    assert_ne!(here_a.serial, there_serial);
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_context_lifecycle_is_per_layer() {
    let (container, builds) = counted_container(Lifecycle::Context);

    let root_a = container.get_instance::<Counted>().unwrap();
    let root_b = container.get_instance::<Counted>().unwrap();
    assert!(Arc::ptr_eq(&root_a, &root_b));

    let nested = container.get_nested_container();
    let scoped = nested.get_instance::<Counted>().unwrap();
    assert!(!Arc::ptr_eq(&root_a, &scoped));
    assert_eq!(builds.load(Ordering::SeqCst), 2);
}

#[test]
fn test_singleton_survives_reconfiguration() {
    let (container, builds) = counted_container(Lifecycle::Singleton);

    let before = container.get_instance::<Counted>().unwrap();
    container.configure(|registry| {
        registry.add(Instance::literal(42u32));
    });
    let after = container.get_instance::<Counted>().unwrap();

    assert!(Arc::ptr_eq(&before, &after));
    assert_eq!(builds.load(Ordering::SeqCst), 1);
}
