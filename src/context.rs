//! Per-process lifecycle state
//!
//! A [`Context`] owns everything that would otherwise be global: the
//! constructor locator, the plain singleton registry, the optional host-bound
//! registry and the teardown signal. Pass it around explicitly, or install
//! one process-wide with [`init_global`].

use crate::collections::{ListPool, MapPool};
use crate::constructor::ConstructorLocator;
use crate::errors::{PoolError, PoolResult};
use crate::host::HostEnvironment;
use crate::host_singleton::{HostSingleton, HostSingletonRegistry};
use crate::pool::{NonPublicObjectPool, Poolable, SafeObjectPool, SharedPool};
use crate::singleton::{Singleton, SingletonRegistry};
use crate::teardown::TeardownSignal;

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared pool of `T` built through `T::default()`
pub type SharedSafePool<T> = SharedPool<SafeObjectPool<T>>;

/// Shared pool of `T` built through its registered constructor
pub type SharedNonPublicPool<T> = SharedPool<NonPublicObjectPool<T>>;

/// Shared pool of spare `Vec<T>`s
pub type SharedListPool<T> = SharedPool<ListPool<T>>;

/// Shared pool of spare `HashMap<K, V>`s
pub type SharedMapPool<K, V> = SharedPool<MapPool<K, V>>;

/// Lifecycle state for one process (or one test)
///
/// # Examples
///
/// ```
/// use poolkit::{Context, Singleton};
///
/// struct Settings { volume: u8 }
/// impl Singleton for Settings {}
///
/// let context = Context::new();
/// context.constructors().register(|| Settings { volume: 7 });
///
/// let settings = context.instance::<Settings>().unwrap();
/// assert_eq!(settings.volume, 7);
///
/// let names = context.list_pool::<String>().unwrap();
/// let list = names.lock().get();
/// assert!(list.is_empty());
/// ```
pub struct Context {
    constructors: Arc<ConstructorLocator>,
    singletons: SingletonRegistry,
    host_singletons: Option<Arc<HostSingletonRegistry>>,
    teardown: TeardownSignal,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// A context without a host; host-bound singletons are unavailable
    pub fn new() -> Self {
        let constructors = Arc::new(ConstructorLocator::new());
        Self {
            singletons: SingletonRegistry::new(Arc::clone(&constructors)),
            constructors,
            host_singletons: None,
            teardown: TeardownSignal::new(),
        }
    }

    /// A context whose host-bound singletons live on `host`
    ///
    /// Firing the teardown signal puts the host registry in its terminal
    /// state.
    pub fn with_host(host: Arc<dyn HostEnvironment>) -> Self {
        let mut context = Self::new();
        let registry = Arc::new(HostSingletonRegistry::new(
            host,
            Arc::clone(&context.constructors),
        ));

        let weak = Arc::downgrade(&registry);
        context.teardown.subscribe(move || {
            if let Some(registry) = weak.upgrade() {
                registry.on_application_quit();
            }
        });

        context.host_singletons = Some(registry);
        context
    }

    pub fn constructors(&self) -> &Arc<ConstructorLocator> {
        &self.constructors
    }

    pub fn singletons(&self) -> &SingletonRegistry {
        &self.singletons
    }

    pub fn host_singletons(&self) -> Option<&Arc<HostSingletonRegistry>> {
        self.host_singletons.as_ref()
    }

    pub fn teardown(&self) -> &TeardownSignal {
        &self.teardown
    }

    /// Shorthand for the plain registry's `instance`
    pub fn instance<T: Singleton>(&self) -> PoolResult<Arc<T>> {
        self.singletons.instance::<T>()
    }

    /// Shorthand for the host registry's `instance`
    pub fn host_instance<T: HostSingleton>(&self) -> PoolResult<Option<Arc<T>>> {
        self.host_singletons
            .as_ref()
            .ok_or(PoolError::HostNotConfigured)?
            .instance::<T>()
    }

    /// The context-wide shared pool of `T`
    pub fn safe_pool<T>(&self) -> PoolResult<Arc<SharedSafePool<T>>>
    where
        T: Poolable + Default + Send + 'static,
    {
        self.singletons
            .instance_with(|| Ok(SharedPool::new(SafeObjectPool::<T>::new())))
    }

    /// The context-wide shared pool of a type with a hidden constructor
    pub fn non_public_pool<T>(&self) -> PoolResult<Arc<SharedNonPublicPool<T>>>
    where
        T: Poolable + Send + 'static,
    {
        self.singletons.instance_with(|| {
            Ok(SharedPool::new(NonPublicObjectPool::<T>::new(Arc::clone(
                &self.constructors,
            ))))
        })
    }

    pub fn list_pool<T: Send + 'static>(&self) -> PoolResult<Arc<SharedListPool<T>>> {
        self.singletons
            .instance_with(|| Ok(SharedPool::new(ListPool::new())))
    }

    pub fn map_pool<K, V>(&self) -> PoolResult<Arc<SharedMapPool<K, V>>>
    where
        K: Send + 'static,
        V: Send + 'static,
    {
        self.singletons
            .instance_with(|| Ok(SharedPool::new(MapPool::new())))
    }

    /// Get a singleton without blocking the async runtime
    ///
    /// Construction runs on the blocking thread pool.
    pub async fn instance_async<T: Singleton>(self: &Arc<Self>) -> PoolResult<Arc<T>> {
        let context = Arc::clone(self);
        tokio::task::spawn_blocking(move || context.instance::<T>())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    pub async fn host_instance_async<T: HostSingleton>(self: &Arc<Self>) -> PoolResult<Option<Arc<T>>> {
        let context = Arc::clone(self);
        tokio::task::spawn_blocking(move || context.host_instance::<T>())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Fire the teardown signal. Returns `false` if it had already fired.
    pub fn shutdown(&self) -> bool {
        self.teardown.fire()
    }
}

static GLOBAL: RwLock<Option<Arc<Context>>> = parking_lot::const_rwlock(None);

/// Install the process-wide context
pub fn init_global(context: Context) -> PoolResult<Arc<Context>> {
    let mut global = GLOBAL.write();
    if global.is_some() {
        warn!("Global context already initialized");
        return Err(PoolError::ContextAlreadyInitialized);
    }

    let context = Arc::new(context);
    *global = Some(Arc::clone(&context));
    info!("Global context initialized");
    Ok(context)
}

/// The process-wide context
pub fn global() -> PoolResult<Arc<Context>> {
    GLOBAL
        .read()
        .as_ref()
        .map(Arc::clone)
        .ok_or(PoolError::ContextNotInitialized)
}

/// Tear the process-wide context down and uninstall it
///
/// Returns `false` if none was installed.
pub fn shutdown_global() -> bool {
    let Some(context) = GLOBAL.write().take() else {
        return false;
    };
    context.shutdown();
    info!("Global context shut down");
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::pool::Pool;
    use crate::singleton::SingletonState;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Voice {
        recycled: bool,
    }

    impl Poolable for Voice {
        fn on_recycled(&mut self) {}

        fn is_recycled(&self) -> bool {
            self.recycled
        }

        fn set_recycled(&mut self, recycled: bool) {
            self.recycled = recycled;
        }
    }

    struct Mixer {
        channels: usize,
    }

    impl Singleton for Mixer {}
    impl HostSingleton for Mixer {}

    mod hidden {
        use crate::pool::Poolable;

        pub struct Event {
            pub code: u32,
            recycled: bool,
        }

        impl Event {
            fn new() -> Self {
                Self {
                    code: 42,
                    recycled: false,
                }
            }

            pub fn install(locator: &crate::ConstructorLocator) {
                locator.register(Self::new);
            }
        }

        impl Poolable for Event {
            fn on_recycled(&mut self) {}

            fn is_recycled(&self) -> bool {
                self.recycled
            }

            fn set_recycled(&mut self, recycled: bool) {
                self.recycled = recycled;
            }
        }
    }

    #[test]
    fn test_safe_pool_is_shared() {
        let context = Context::new();
        let pool = context.safe_pool::<Voice>().unwrap();
        let voice = pool.allocate::<Voice>().unwrap();
        assert!(pool.recycle(voice));

        let same = context.safe_pool::<Voice>().unwrap();
        assert!(Arc::ptr_eq(&pool, &same));
        assert_eq!(same.lock().cur_count(), 1);
    }

    #[test]
    fn test_non_public_pool_uses_locator() {
        let context = Context::new();
        hidden::Event::install(context.constructors());

        let pool = context.non_public_pool::<hidden::Event>().unwrap();
        let event = pool.lock().allocate().unwrap();
        assert_eq!(event.code, 42);
    }

    #[test]
    fn test_collection_pools_are_per_type() {
        let context = Context::new();
        let strings = context.list_pool::<String>().unwrap();
        strings.recycle(vec!["a".to_string()]);

        assert_eq!(context.list_pool::<String>().unwrap().lock().len(), 1);
        assert!(context.list_pool::<u32>().unwrap().lock().is_empty());

        let maps = context.map_pool::<u32, String>().unwrap();
        assert!(maps.allocate::<HashMap<u32, String>>().unwrap().is_empty());
    }

    #[test]
    fn test_host_instance_without_host() {
        let context = Context::new();
        context.constructors().register(|| Mixer { channels: 2 });
        assert!(matches!(
            context.host_instance::<Mixer>(),
            Err(PoolError::HostNotConfigured)
        ));
        assert_eq!(context.instance::<Mixer>().unwrap().channels, 2);
    }

    #[test]
    fn test_shutdown_terminates_host_singletons() {
        let host = Arc::new(MemoryHost::new());
        let context = Context::with_host(host.clone());
        context.constructors().register(|| Mixer { channels: 4 });

        assert!(context.host_instance::<Mixer>().unwrap().is_some());
        assert!(host.find_path("Mixer").is_some());

        assert!(context.shutdown());
        assert!(!context.shutdown());
        assert!(context.host_instance::<Mixer>().unwrap().is_none());
        assert!(host.find_path("Mixer").is_none());

        let registry = context.host_singletons().unwrap();
        assert_eq!(registry.state::<Mixer>(), SingletonState::Terminated);

        // Plain singletons are unaffected.
        assert_eq!(context.instance::<Mixer>().unwrap().channels, 4);
    }

    #[tokio::test]
    async fn test_instance_async() {
        let context = Arc::new(Context::new());
        context.constructors().register(|| Mixer { channels: 6 });

        let first = context.instance_async::<Mixer>().await.unwrap();
        let second = context.instance::<Mixer>().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_concurrent_async_access_builds_once() {
        let context = Arc::new(Context::with_host(Arc::new(MemoryHost::new())));
        context.constructors().register(|| Mixer { channels: 1 });

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let context = Arc::clone(&context);
                tokio::spawn(async move { context.host_instance_async::<Mixer>().await })
            })
            .collect();

        let mut instances = Vec::new();
        for task in tasks {
            instances.push(task.await.unwrap().unwrap().unwrap());
        }
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn test_global_lifecycle() {
        assert!(!shutdown_global());
        assert_eq!(global().err(), Some(PoolError::ContextNotInitialized));

        let installed = init_global(Context::new()).unwrap();
        assert!(Arc::ptr_eq(&installed, &global().unwrap()));
        assert_eq!(
            init_global(Context::new()).err(),
            Some(PoolError::ContextAlreadyInitialized)
        );

        assert!(shutdown_global());
        assert!(installed.teardown().is_fired());
        assert!(global().is_err());
    }
}
