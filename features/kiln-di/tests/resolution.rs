use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use kiln_di::{
    Component, ConcreteBuilder, DependencyGraphError, Lifetime, RegistrationError, Registry,
    ResolveError, ResolverOptions, TypeDescriptor, TypeKey,
};
use pretty_assertions::assert_eq;

mod common;

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
impl Greeter for English {
    fn greet(&self) -> &'static str {
        "Hello"
    }
}
impl Component for English {
    fn describe() -> ConcreteBuilder<Self> {
        TypeDescriptor::concrete::<Self>()
            .satisfies::<dyn Greeter>(|it| it)
            .constructor(|| English)
    }
}

struct German;
impl Greeter for German {
    fn greet(&self) -> &'static str {
        "Hallo"
    }
}
impl Component for German {
    fn describe() -> ConcreteBuilder<Self> {
        TypeDescriptor::concrete::<Self>()
            .satisfies::<dyn Greeter>(|it| it)
            .constructor(|| German)
    }
}

struct Unrelated;
impl Component for Unrelated {
    fn describe() -> ConcreteBuilder<Self> {
        TypeDescriptor::concrete::<Self>().constructor(|| Unrelated)
    }
}

fn greeters(first: Lifetime, second: Lifetime) -> Registry {
    let mut registry = Registry::new();
    registry.describe(TypeDescriptor::interface(TypeKey::of::<dyn Greeter>()));
    registry
        .register_type::<dyn Greeter, English>(first)
        .unwrap()
        .register_type::<dyn Greeter, German>(second)
        .unwrap();
    registry
}

#[test]
fn transient_service_shares_singleton_dependency() {
    common::init_tracing();

    trait IService1: Send + Sync {
        fn service2(&self) -> &Arc<dyn IService2>;
    }
    trait IService2: Send + Sync {}

    struct Service1 {
        service2: Arc<dyn IService2>,
    }
    impl IService1 for Service1 {
        fn service2(&self) -> &Arc<dyn IService2> {
            &self.service2
        }
    }

    struct Service2;
    impl IService2 for Service2 {}

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::interface(TypeKey::of::<dyn IService1>()))
        .describe(TypeDescriptor::interface(TypeKey::of::<dyn IService2>()))
        .describe(
            TypeDescriptor::concrete::<Service1>()
                .satisfies::<dyn IService1>(|it| it)
                .constructor(|service2: Arc<dyn IService2>| Service1 { service2 }),
        )
        .describe(
            TypeDescriptor::concrete::<Service2>()
                .satisfies::<dyn IService2>(|it| it)
                .constructor(|| Service2),
        );
    registry
        .register(
            TypeKey::of::<dyn IService1>(),
            TypeKey::of::<Service1>(),
            Lifetime::Transient,
        )
        .unwrap()
        .register(
            TypeKey::of::<dyn IService2>(),
            TypeKey::of::<Service2>(),
            Lifetime::Singleton,
        )
        .unwrap();
    let resolver = registry.freeze();

    let first = resolver.resolve(&TypeKey::of::<dyn IService1>()).unwrap();
    let second = resolver.resolve(&TypeKey::of::<dyn IService1>()).unwrap();
    assert!(!first.ptr_eq(&second));

    let first = first.get::<dyn IService1>().unwrap();
    let second = second.get::<dyn IService1>().unwrap();
    assert!(Arc::ptr_eq(first.service2(), second.service2()));
}

#[test]
fn resolve_returns_first_and_resolve_all_every_registration() {
    common::init_tracing();
    let resolver = greeters(Lifetime::Transient, Lifetime::Transient).freeze();

    let greeter = resolver.resolve_as::<dyn Greeter>().unwrap();
    assert_eq!(greeter.greet(), "Hello");

    let greetings: Vec<_> = resolver
        .resolve_all_as::<dyn Greeter>()
        .unwrap()
        .iter()
        .map(|greeter| greeter.greet())
        .collect();
    assert_eq!(greetings, vec!["Hello", "Hallo"]);

    let implementations: Vec<_> = resolver
        .resolve_all(&TypeKey::of::<dyn Greeter>())
        .unwrap()
        .iter()
        .map(|instance| instance.implementation().clone())
        .collect();
    assert_eq!(
        implementations,
        vec![TypeKey::of::<English>(), TypeKey::of::<German>()]
    );
}

#[test]
fn singletons_are_shared_and_transients_are_not() {
    common::init_tracing();
    let resolver = greeters(Lifetime::Singleton, Lifetime::Transient).freeze();

    let first = resolver.resolve(&TypeKey::of::<dyn Greeter>()).unwrap();
    let second = resolver.resolve(&TypeKey::of::<dyn Greeter>()).unwrap();
    assert!(first.ptr_eq(&second));

    // The singleton inside a sequence is the same cached instance
    let all = resolver.resolve_all(&TypeKey::of::<dyn Greeter>()).unwrap();
    let again = resolver.resolve_all(&TypeKey::of::<dyn Greeter>()).unwrap();
    assert!(all[0].ptr_eq(&first));
    assert!(!all[1].ptr_eq(&again[1]));

    assert_eq!(resolver.cached_singletons(), 1);
}

#[test]
fn failed_registration_leaves_registry_unchanged() {
    common::init_tracing();
    let mut registry = greeters(Lifetime::Transient, Lifetime::Transient);
    registry.describe(Unrelated::describe());

    let error = registry
        .register(
            TypeKey::of::<dyn Greeter>(),
            TypeKey::of::<Unrelated>(),
            Lifetime::Singleton,
        )
        .unwrap_err();
    assert_eq!(
        error,
        RegistrationError::NotAssignable {
            dependency: TypeKey::of::<dyn Greeter>(),
            implementation: TypeKey::of::<Unrelated>(),
        }
    );

    let resolver = registry.freeze();
    assert_eq!(resolver.resolve_all_as::<dyn Greeter>().unwrap().len(), 2);
}

#[test]
fn unregistered_dependency_fails() {
    common::init_tracing();
    let resolver = Registry::new().freeze();

    assert!(matches!(
        resolver.resolve(&TypeKey::of::<dyn Greeter>()),
        Err(ResolveError::UnregisteredDependency(key)) if key == TypeKey::of::<dyn Greeter>()
    ));
}

#[test]
fn empty_sequence_resolves_to_nothing() {
    common::init_tracing();

    struct Chorus {
        voices: Vec<Arc<dyn Greeter>>,
    }

    let mut registry = Registry::new();
    registry.describe(
        TypeDescriptor::concrete::<Chorus>()
            .constructor(|voices: Vec<Arc<dyn Greeter>>| Chorus { voices }),
    );
    let resolver = registry.freeze();

    assert!(resolver
        .resolve_all(&TypeKey::of::<dyn Greeter>())
        .unwrap()
        .is_empty());
    // Chorus has no registration, it binds to itself
    let chorus = resolver.resolve_as::<Chorus>().unwrap();
    assert!(chorus.voices.is_empty());
}

#[test]
fn concrete_parameters_bind_to_themselves() {
    common::init_tracing();

    struct Clock;
    struct Scheduler {
        _clock: Arc<Clock>,
    }

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::concrete::<Clock>().constructor(|| Clock))
        .describe(
            TypeDescriptor::concrete::<Scheduler>()
                .constructor(|clock: Arc<Clock>| Scheduler { _clock: clock }),
        );
    registry
        .register(
            TypeKey::of::<Scheduler>(),
            TypeKey::of::<Scheduler>(),
            Lifetime::Singleton,
        )
        .unwrap();
    let resolver = registry.freeze();

    let first = resolver.resolve_as::<Scheduler>().unwrap();
    let second = resolver.resolve_as::<Scheduler>().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    // Self bound types are transient
    assert!(!Arc::ptr_eq(
        &resolver.resolve_as::<Clock>().unwrap(),
        &resolver.resolve_as::<Clock>().unwrap()
    ));
}

#[test]
fn circular_dependency_reports_chain() {
    common::init_tracing();

    struct Chicken(#[allow(dead_code)] Arc<Egg>);
    struct Egg(#[allow(dead_code)] Arc<Chicken>);

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::concrete::<Chicken>().constructor(Chicken))
        .describe(TypeDescriptor::concrete::<Egg>().constructor(Egg));
    registry
        .register(
            TypeKey::of::<Chicken>(),
            TypeKey::of::<Chicken>(),
            Lifetime::Singleton,
        )
        .unwrap()
        .register(TypeKey::of::<Egg>(), TypeKey::of::<Egg>(), Lifetime::Transient)
        .unwrap();
    let resolver = registry.freeze();

    let Err(ResolveError::CircularDependency { chain }) = resolver.resolve(&TypeKey::of::<Chicken>())
    else {
        panic!("expected a circular dependency");
    };
    assert_eq!(
        chain,
        vec![
            TypeKey::of::<Chicken>(),
            TypeKey::of::<Egg>(),
            TypeKey::of::<Chicken>()
        ]
    );
    assert_eq!(resolver.cached_singletons(), 0);
}

#[test]
fn richest_satisfiable_constructor_wins() {
    common::init_tracing();

    trait Mailer: Send + Sync {}
    struct Smtp;
    impl Mailer for Smtp {}

    struct Clock;
    struct Report {
        built_with: &'static str,
    }

    let describe = |registry: &mut Registry| {
        registry
            .describe(TypeDescriptor::interface(TypeKey::of::<dyn Mailer>()))
            .describe(
                TypeDescriptor::concrete::<Smtp>()
                    .satisfies::<dyn Mailer>(|it| it)
                    .constructor(|| Smtp),
            )
            .describe(TypeDescriptor::concrete::<Clock>().constructor(|| Clock))
            .describe(
                TypeDescriptor::concrete::<Report>()
                    .constructor(|| Report { built_with: "nothing" })
                    .constructor(|_: Arc<Clock>| Report { built_with: "clock" })
                    .constructor(|_: Arc<Clock>, _: Arc<dyn Mailer>| Report {
                        built_with: "clock and mailer",
                    }),
            );
    };

    let mut without_mailer = Registry::new();
    describe(&mut without_mailer);
    let report = without_mailer.freeze().resolve_as::<Report>().unwrap();
    assert_eq!(report.built_with, "clock");

    let mut with_mailer = Registry::new();
    describe(&mut with_mailer);
    with_mailer
        .register(
            TypeKey::of::<dyn Mailer>(),
            TypeKey::of::<Smtp>(),
            Lifetime::Singleton,
        )
        .unwrap();
    let report = with_mailer.freeze().resolve_as::<Report>().unwrap();
    assert_eq!(report.built_with, "clock and mailer");
}

#[test]
fn unsatisfiable_constructor_fails() {
    common::init_tracing();

    struct Orphan;

    let mut registry = Registry::new();
    registry.describe(
        TypeDescriptor::concrete::<Orphan>().constructor(|_: Arc<dyn Greeter>| Orphan),
    );
    registry
        .register(TypeKey::of::<Orphan>(), TypeKey::of::<Orphan>(), Lifetime::Transient)
        .unwrap();

    assert!(matches!(
        registry.freeze().resolve(&TypeKey::of::<Orphan>()),
        Err(ResolveError::UnsatisfiableConstructor { implementation }) if implementation == TypeKey::of::<Orphan>()
    ));
}

#[test]
fn failed_factory_is_not_cached() {
    common::init_tracing();

    struct Flaky;
    static ATTEMPTS: AtomicUsize = AtomicUsize::new(0);

    let mut registry = Registry::new();
    registry.describe(TypeDescriptor::concrete::<Flaky>().constructor_raw([], |_| {
        if ATTEMPTS.fetch_add(1, Ordering::SeqCst) == 0 {
            return Err("not ready yet".into());
        }
        Ok(Flaky)
    }));
    registry
        .register(TypeKey::of::<Flaky>(), TypeKey::of::<Flaky>(), Lifetime::Singleton)
        .unwrap();
    let resolver = registry.freeze();

    let error = resolver.resolve(&TypeKey::of::<Flaky>()).unwrap_err();
    assert!(matches!(error, ResolveError::FactoryFailed { .. }));
    assert_eq!(resolver.cached_singletons(), 0);

    let first = resolver.resolve(&TypeKey::of::<Flaky>()).unwrap();
    let second = resolver.resolve(&TypeKey::of::<Flaky>()).unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(ATTEMPTS.load(Ordering::SeqCst), 2);
}

#[test]
fn deep_chains_are_cut_off() {
    common::init_tracing();

    struct Link;
    let link = |index: usize| TypeKey::named(format!("Link{index}"));

    let mut registry = Registry::new();
    for index in 0..5 {
        let params: Vec<TypeKey> = if index < 4 { vec![link(index + 1)] } else { vec![] };
        registry.describe(TypeDescriptor::concrete_keyed::<Link>(link(index)).constructor_raw(params, |_| Ok(Link)));
        registry
            .register(link(index), link(index), Lifetime::Transient)
            .unwrap();
    }

    let shallow = registry.freeze_with(ResolverOptions::new().with_max_depth(3));
    assert!(matches!(
        shallow.resolve(&link(0)),
        Err(ResolveError::ResolutionTooDeep { key, max_depth: 3 }) if key == link(3)
    ));
    assert!(shallow.resolve(&link(2)).is_ok());
}

#[test]
fn deep_self_bound_chains_are_unsatisfiable() {
    common::init_tracing();

    struct Link;
    let link = |index: usize| TypeKey::named(format!("Link{index}"));

    // Described only, every link binds to itself
    let mut registry = Registry::new();
    for index in 0..5 {
        let params: Vec<TypeKey> = if index < 4 { vec![link(index + 1)] } else { vec![] };
        registry.describe(
            TypeDescriptor::concrete_keyed::<Link>(link(index)).constructor_raw(params, |_| Ok(Link)),
        );
    }

    let shallow = registry.freeze_with(ResolverOptions::new().with_max_depth(3));
    assert!(matches!(
        shallow.resolve(&link(0)),
        Err(ResolveError::UnsatisfiableConstructor { implementation }) if implementation == link(0)
    ));
    assert!(shallow.resolve(&link(2)).is_ok());
}

#[test]
fn add_instance_resolves_to_the_same_object() {
    common::init_tracing();

    struct Settings {
        name: &'static str,
    }

    let mut registry = Registry::new();
    registry.add_instance(Settings { name: "kiln" });
    let resolver = registry.freeze();

    let first = resolver.resolve_as::<Settings>().unwrap();
    let second = resolver.resolve_as::<Settings>().unwrap();
    assert_eq!(first.name, "kiln");
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn every_added_instance_stays_resolvable() {
    common::init_tracing();

    struct Settings {
        name: &'static str,
    }

    let mut registry = Registry::new();
    registry
        .add_instance(Settings { name: "first" })
        .add_instance(Settings { name: "second" });
    let resolver = registry.freeze();

    assert_eq!(resolver.resolve_as::<Settings>().unwrap().name, "first");
    let names: Vec<&str> = resolver
        .resolve_all_as::<Settings>()
        .unwrap()
        .iter()
        .map(|settings| settings.name)
        .collect();
    assert_eq!(names, vec!["first", "second"]);

    let second = resolver.resolve_all(&TypeKey::of::<Settings>()).unwrap().remove(1);
    assert_eq!(
        second.implementation(),
        &TypeKey::named(format!("{} (instance #1)", TypeKey::of::<Settings>()))
    );
}

#[test]
fn extended_interface_keeps_the_typed_view() {
    common::init_tracing();

    trait LoudGreeter: Greeter {
        fn shout(&self) -> String;
        fn into_greeter(self: Arc<Self>) -> Arc<dyn Greeter>;
    }

    struct Shouter;
    impl Greeter for Shouter {
        fn greet(&self) -> &'static str {
            "Hey"
        }
    }
    impl LoudGreeter for Shouter {
        fn shout(&self) -> String {
            format!("{}!", self.greet().to_uppercase())
        }
        fn into_greeter(self: Arc<Self>) -> Arc<dyn Greeter> {
            self
        }
    }

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::interface(TypeKey::of::<dyn Greeter>()))
        .describe(
            TypeDescriptor::interface(TypeKey::of::<dyn LoudGreeter>())
                .extends_as::<dyn LoudGreeter, dyn Greeter>(TypeKey::of::<dyn Greeter>(), |it| {
                    it.into_greeter()
                }),
        )
        .describe(
            TypeDescriptor::concrete::<Shouter>()
                .satisfies::<dyn LoudGreeter>(|it| it)
                .constructor(|| Shouter),
        );
    registry
        .register(TypeKey::of::<dyn Greeter>(), TypeKey::of::<Shouter>(), Lifetime::Transient)
        .unwrap()
        .register(TypeKey::of::<dyn LoudGreeter>(), TypeKey::of::<Shouter>(), Lifetime::Transient)
        .unwrap();
    let resolver = registry.freeze();

    assert_eq!(resolver.resolve_as::<dyn Greeter>().unwrap().greet(), "Hey");
    assert_eq!(resolver.resolve_as::<dyn LoudGreeter>().unwrap().shout(), "HEY!");
}

#[test]
fn untyped_extension_resolves_without_a_view() {
    common::init_tracing();

    let mut registry = Registry::new();
    registry
        .describe(
            TypeDescriptor::interface(TypeKey::named("Polite"))
                .extends(TypeKey::of::<dyn Greeter>()),
        )
        .describe(
            TypeDescriptor::concrete::<English>()
                .satisfies_key(TypeKey::named("Polite"))
                .constructor(|| English),
        );
    registry
        .register(TypeKey::of::<dyn Greeter>(), TypeKey::of::<English>(), Lifetime::Transient)
        .unwrap();
    let resolver = registry.freeze();

    let instance = resolver.resolve(&TypeKey::of::<dyn Greeter>()).unwrap();
    assert_eq!(instance.get::<English>().unwrap().greet(), "Hello");
    assert!(matches!(
        instance.get::<dyn Greeter>(),
        Err(ResolveError::DowncastFailed { .. })
    ));
}

#[test]
fn downcast_to_unrelated_type_fails() {
    common::init_tracing();
    let resolver = greeters(Lifetime::Transient, Lifetime::Transient).freeze();
    let instance = resolver.resolve(&TypeKey::of::<dyn Greeter>()).unwrap();

    assert!(matches!(
        instance.get::<German>(),
        Err(ResolveError::DowncastFailed { .. })
    ));
    assert!(instance.get::<English>().is_ok());
}

#[test]
fn validate_reports_missing_dependencies_and_cycles() {
    common::init_tracing();

    struct Orphan;
    struct Ping;
    struct Pong;

    let key = |name: &'static str| TypeKey::named(name);
    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::concrete::<Orphan>().constructor(|_: Arc<dyn Greeter>| Orphan))
        .describe(
            TypeDescriptor::concrete_keyed::<Ping>(key("Ping"))
                .constructor_raw([key("Pong")], |_| Ok(Ping)),
        )
        .describe(
            TypeDescriptor::concrete_keyed::<Pong>(key("Pong"))
                .constructor_raw([key("Ping")], |_| Ok(Pong)),
        );
    registry
        .register(TypeKey::of::<Orphan>(), TypeKey::of::<Orphan>(), Lifetime::Transient)
        .unwrap()
        .register(key("Ping"), key("Ping"), Lifetime::Singleton)
        .unwrap()
        .register(key("Pong"), key("Pong"), Lifetime::Singleton)
        .unwrap();

    let errors = registry.freeze().validate().unwrap_err().errors;
    assert!(errors.contains(&DependencyGraphError::MissingDependency {
        dependency: TypeKey::of::<dyn Greeter>(),
        required_by: TypeKey::of::<Orphan>(),
    }));
    assert!(errors
        .iter()
        .any(|error| matches!(error, DependencyGraphError::CircularDependency { .. })));
}
