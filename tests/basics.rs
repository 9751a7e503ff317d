use plugmap::{BuildError, Container, Instance};
use std::sync::Arc;

trait Color: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &'static str;
}

#[derive(Debug)]
struct Red;
impl Color for Red {
    fn name(&self) -> &'static str {
        "red"
    }
}

#[derive(Debug)]
struct Blue;
impl Color for Blue {
    fn name(&self) -> &'static str {
        "blue"
    }
}

fn colors() -> Container {
    Container::new(|registry| {
        registry
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Red))).named("red"))
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Blue))).named("blue"))
            .set_default_trait::<dyn Color>("red");
    })
}

#[test]
fn test_default_and_named_resolution() {
    let container = colors();

    assert_eq!(container.get_trait::<dyn Color>().unwrap().name(), "red");
    assert_eq!(
        container.get_trait_named::<dyn Color>("blue").unwrap().name(),
        "blue"
    );
    assert_eq!(
        container.get_trait_named::<dyn Color>("red").unwrap().name(),
        "red"
    );
}

#[test]
fn test_concrete_literal() {
    struct Config {
        port: u16,
    }

    let container = Container::new(|registry| {
        registry.add(Instance::literal(Config { port: 8080 }));
    });

    let config = container.get_instance::<Config>().unwrap();
    assert_eq!(config.port, 8080);
}

#[test]
fn test_factory_with_dependencies() {
    struct Config {
        port: u16,
    }

    struct Server {
        config: Arc<Config>,
        name: String,
    }

    let container = Container::new(|registry| {
        registry
            .add(Instance::literal(Config { port: 8080 }))
            .add(Instance::of::<Server, _>(|ctx| {
                Ok(Server {
                    config: ctx.get_instance::<Config>()?,
                    name: "MyServer".to_string(),
                })
            }));
    });

    let server = container.get_instance::<Server>().unwrap();
    assert_eq!(server.config.port, 8080);
    assert_eq!(server.name, "MyServer");
}

#[test]
fn test_sole_instance_is_implicit_default() {
    let container = Container::new(|registry| {
        registry.add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Blue))).named("blue"));
    });

    assert_eq!(container.get_trait::<dyn Color>().unwrap().name(), "blue");
}

#[test]
fn test_two_instances_without_default_is_configuration_error() {
    let container = Container::new(|registry| {
        registry
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Red))).named("red"))
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Blue))).named("blue"));
    });

    let err = container.get_trait::<dyn Color>().unwrap_err();
    assert!(matches!(err, BuildError::Configuration { .. }));
}

#[test]
fn test_missing_named_instance() {
    let container = colors();

    let err = container.get_trait_named::<dyn Color>("green").unwrap_err();
    match err {
        BuildError::MissingInstance { name, .. } => assert_eq!(name, "green"),
        other => panic!("expected MissingInstance, got: {other}"),
    }
}

#[test]
fn test_unregistered_plugin_type_is_configuration_error() {
    let container = Container::new(|_| {});

    let err = container.get_instance::<u32>().unwrap_err();
    assert!(matches!(err, BuildError::Configuration { .. }));
}

#[test]
fn test_try_get_maps_absence_to_none() {
    let container = colors();

    assert!(container.try_get_trait::<dyn Color>().unwrap().is_some());
    assert!(container
        .try_get_trait_named::<dyn Color>("green")
        .unwrap()
        .is_none());
    assert!(container.try_get_instance::<u32>().unwrap().is_none());
}

#[test]
fn test_replacing_a_named_instance() {
    let container = colors();

    container.configure(|registry| {
        registry.add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Blue))).named("red"));
    });

    // The "red" slot now builds Blue; the default pointer still says "red".
    assert_eq!(container.get_trait::<dyn Color>().unwrap().name(), "blue");
}

#[test]
fn test_alias_resolves_to_target() {
    let container = Container::new(|registry| {
        registry
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Blue))).named("blue"))
            .add(Instance::alias_for_trait::<dyn Color>("blue").named("favorite"));
    });

    assert_eq!(
        container
            .get_trait_named::<dyn Color>("favorite")
            .unwrap()
            .name(),
        "blue"
    );
}

#[test]
fn test_dangling_alias_is_configuration_error() {
    let container = Container::new(|registry| {
        registry.add(Instance::alias_for_trait::<dyn Color>("nowhere").named("favorite"));
    });

    let err = container.get_trait_named::<dyn Color>("favorite").unwrap_err();
    assert!(matches!(err, BuildError::Configuration { .. }));
}

#[test]
fn test_get_all_in_registration_order() {
    let container = colors();

    let all = container.get_all_traits::<dyn Color>().unwrap();
    let names: Vec<_> = all.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["red", "blue"]);
}

#[test]
fn test_explicit_arguments_override_dependencies() {
    struct Threshold(u32);

    struct Detector {
        threshold: Arc<Threshold>,
    }

    let container = Container::new(|registry| {
        registry
            .add(Instance::literal(Threshold(10)))
            .add(Instance::of::<Detector, _>(|ctx| {
                Ok(Detector {
                    threshold: ctx.get_instance::<Threshold>()?,
                })
            }));
    });

    let default = container.get_instance::<Detector>().unwrap();
    assert_eq!(default.threshold.0, 10);

    let overridden = container
        .with()
        .with_value(Threshold(99))
        .get_instance::<Detector>()
        .unwrap();
    assert_eq!(overridden.threshold.0, 99);
}

#[test]
fn test_explicit_trait_argument() {
    struct Alarm {
        color: Arc<dyn Color>,
    }

    let container = Container::new(|registry| {
        registry
            .add(Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Red))))
            .add(Instance::of::<Alarm, _>(|ctx| {
                Ok(Alarm {
                    color: ctx.get_trait::<dyn Color>()?,
                })
            }));
    });

    let alarm = container
        .with()
        .with_trait::<dyn Color>(Arc::new(Blue))
        .get_instance::<Alarm>()
        .unwrap();
    assert_eq!(alarm.color.name(), "blue");
}

#[test]
fn test_inject_registers_a_live_default() {
    struct Flag(bool);

    let container = Container::new(|_| {});
    container.inject(Flag(true));

    assert!(container.get_instance::<Flag>().unwrap().0);
}

#[test]
fn test_container_resolves_itself() {
    let container = colors();

    let resolved = container.get_instance::<Container>().unwrap();
    assert_eq!(resolved.get_trait::<dyn Color>().unwrap().name(), "red");
}

#[test]
fn test_has_instance_queries() {
    let container = colors();

    assert!(container.has_trait::<dyn Color>());
    assert!(container.has_trait_named::<dyn Color>("blue"));
    assert!(!container.has_trait_named::<dyn Color>("green"));
    assert!(!container.has_instance::<u32>());
}

#[test]
fn test_what_do_i_have_lists_registrations() {
    let container = colors();

    let report = container.what_do_i_have();
    assert!(report.contains("Color"));
    assert!(report.contains("*red"));
    assert!(report.contains("blue"));
}

#[test]
fn test_missing_instance_fallback() {
    let container = Container::new(|registry| {
        registry.on_missing_named_trait::<dyn Color, _>(|name| {
            (name == "synthesized")
                .then(|| Instance::of_trait::<dyn Color, _>(|_| Ok(Arc::new(Red))))
        });
    });

    assert_eq!(
        container
            .get_trait_named::<dyn Color>("synthesized")
            .unwrap()
            .name(),
        "red"
    );
    assert!(container
        .get_trait_named::<dyn Color>("other")
        .is_err());
}
