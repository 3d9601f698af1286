use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use kiln_di::{Component, ConcreteBuilder, Lifetime, Registry, TypeDescriptor, TypeKey};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .init();

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::interface(TypeKey::of::<dyn IService1>()))
        .describe(TypeDescriptor::interface(TypeKey::of::<dyn IService2>()));
    registry
        .register_type::<dyn IService1, Service1>(Lifetime::Transient)
        .unwrap()
        .register_type::<dyn IService2, Service2>(Lifetime::Singleton)
        .unwrap();

    let resolver = registry.freeze();
    resolver.validate().unwrap();
    println!("{:?}", resolver);

    let first = resolver.resolve_as::<dyn IService1>().unwrap();
    let second = resolver.resolve_as::<dyn IService1>().unwrap();

    println!("first:  {}", first.summary());
    println!("second: {}", second.summary());
    assert!(!Arc::ptr_eq(&first, &second));
    assert_eq!(first.service2_id(), second.service2_id());
}

trait IService1: Send + Sync {
    fn summary(&self) -> String;
    fn service2_id(&self) -> usize;
}

trait IService2: Send + Sync {
    fn id(&self) -> usize;
}

struct Service1 {
    service2: Arc<dyn IService2>,
}

impl IService1 for Service1 {
    fn summary(&self) -> String {
        format!("Service1 using Service2 #{}", self.service2.id())
    }

    fn service2_id(&self) -> usize {
        self.service2.id()
    }
}

impl Component for Service1 {
    fn describe() -> ConcreteBuilder<Self> {
        TypeDescriptor::concrete::<Self>()
            .satisfies::<dyn IService1>(|it| it)
            .constructor(|service2: Arc<dyn IService2>| Service1 { service2 })
    }
}

static CREATED: AtomicUsize = AtomicUsize::new(0);

struct Service2 {
    id: usize,
}

impl IService2 for Service2 {
    fn id(&self) -> usize {
        self.id
    }
}

impl Component for Service2 {
    fn describe() -> ConcreteBuilder<Self> {
        TypeDescriptor::concrete::<Self>()
            .satisfies::<dyn IService2>(|it| it)
            .constructor(|| Service2 {
                id: CREATED.fetch_add(1, Ordering::SeqCst),
            })
    }
}
