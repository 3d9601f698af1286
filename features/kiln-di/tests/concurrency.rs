use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

use kiln_di::{Lifetime, Registry, ResolveError, Resolver, TypeDescriptor, TypeKey};

mod common;

const THREADS: usize = 16;

fn resolve_everywhere<T>(resolver: &Resolver, resolve: impl Fn(&Resolver) -> T + Sync) -> Vec<T>
where
    T: Send,
{
    let barrier = &Barrier::new(THREADS);
    let resolve = &resolve;
    thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(move || {
                    barrier.wait();
                    resolve(resolver)
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    })
}

#[test]
fn singleton_is_constructed_once_across_threads() {
    common::init_tracing();

    struct Pool;
    static CONSTRUCTED: AtomicUsize = AtomicUsize::new(0);

    let mut registry = Registry::new();
    registry.describe(TypeDescriptor::concrete::<Pool>().constructor(|| {
        CONSTRUCTED.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(20));
        Pool
    }));
    registry
        .register(TypeKey::of::<Pool>(), TypeKey::of::<Pool>(), Lifetime::Singleton)
        .unwrap();
    let resolver = registry.freeze();

    let pools = resolve_everywhere(&resolver, |resolver| resolver.resolve_as::<Pool>().unwrap());

    assert_eq!(CONSTRUCTED.load(Ordering::SeqCst), 1);
    assert!(pools.iter().all(|pool| Arc::ptr_eq(pool, &pools[0])));
}

#[test]
fn shared_singleton_dependency_is_constructed_once() {
    common::init_tracing();

    struct Connection;
    struct Handler {
        connection: Arc<Connection>,
    }
    static CONNECTIONS: AtomicUsize = AtomicUsize::new(0);

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::concrete::<Connection>().constructor(|| {
            CONNECTIONS.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            Connection
        }))
        .describe(
            TypeDescriptor::concrete::<Handler>()
                .constructor(|connection: Arc<Connection>| Handler { connection }),
        );
    registry
        .register(
            TypeKey::of::<Connection>(),
            TypeKey::of::<Connection>(),
            Lifetime::Singleton,
        )
        .unwrap()
        .register(TypeKey::of::<Handler>(), TypeKey::of::<Handler>(), Lifetime::Transient)
        .unwrap();
    let resolver = registry.freeze();

    let handlers =
        resolve_everywhere(&resolver, |resolver| resolver.resolve_as::<Handler>().unwrap());

    assert_eq!(CONNECTIONS.load(Ordering::SeqCst), 1);
    assert!(handlers
        .iter()
        .all(|handler| Arc::ptr_eq(&handler.connection, &handlers[0].connection)));
    assert!(!Arc::ptr_eq(&handlers[0], &handlers[1]));
}

#[test]
fn cyclic_singletons_fail_on_every_thread() {
    common::init_tracing();

    struct Left(#[allow(dead_code)] Arc<Right>);
    struct Right(#[allow(dead_code)] Arc<Left>);

    let mut registry = Registry::new();
    registry
        .describe(TypeDescriptor::concrete::<Left>().constructor(Left))
        .describe(TypeDescriptor::concrete::<Right>().constructor(Right));
    registry
        .register(TypeKey::of::<Left>(), TypeKey::of::<Left>(), Lifetime::Singleton)
        .unwrap()
        .register(TypeKey::of::<Right>(), TypeKey::of::<Right>(), Lifetime::Singleton)
        .unwrap();
    let resolver = registry.freeze();

    let results = resolve_everywhere(&resolver, |resolver| resolver.resolve(&TypeKey::of::<Left>()));
    assert!(results
        .iter()
        .all(|result| matches!(result, Err(ResolveError::CircularDependency { .. }))));

    let results = resolve_everywhere(&resolver, |resolver| resolver.resolve(&TypeKey::of::<Right>()));
    assert!(results
        .iter()
        .all(|result| matches!(result, Err(ResolveError::CircularDependency { .. }))));
    assert_eq!(resolver.cached_singletons(), 0);
}

#[test]
fn resolver_clones_share_the_cache() {
    common::init_tracing();

    struct Counter;

    let mut registry = Registry::new();
    registry.describe(TypeDescriptor::concrete::<Counter>().constructor(|| Counter));
    registry
        .register(TypeKey::of::<Counter>(), TypeKey::of::<Counter>(), Lifetime::Singleton)
        .unwrap();
    let resolver = registry.freeze();
    let clone = resolver.clone();

    let from_thread = thread::spawn(move || clone.resolve_as::<Counter>().unwrap())
        .join()
        .unwrap();
    assert!(Arc::ptr_eq(&from_thread, &resolver.resolve_as::<Counter>().unwrap()));
}
