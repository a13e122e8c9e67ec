//! Bounded object pools
//!
//! Pools are stacks: `allocate` pops the most recently recycled object and
//! falls back to the factory on a miss, `recycle` pushes. They are not
//! internally synchronized. Every mutating call takes `&mut self`, so sharing
//! a pool across threads means wrapping it, e.g. in a [`SharedPool`].

use crate::config::{DEFAULT_MAX_CACHE_COUNT, PoolConfiguration};
use crate::constructor::ConstructorLocator;
use crate::errors::PoolResult;
use crate::factory::{CustomObjectFactory, DefaultObjectFactory, NonPublicObjectFactory, ObjectFactory};
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::singleton::Singleton;

use parking_lot::{Mutex, MutexGuard};
use std::any::type_name;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tracing::{debug, trace};

/// Allocate and recycle instances of `T`
pub trait Pool<T> {
    /// Take an object out of the pool, creating one on a cache miss
    fn allocate(&mut self) -> PoolResult<T>;

    /// Hand an object back. Returns `false` if the pool did not keep it.
    fn recycle(&mut self, obj: T) -> bool;
}

/// An object that tracks whether it currently sits in a pool
pub trait Poolable {
    /// Called whenever the object is handed back, kept or not
    fn on_recycled(&mut self);

    fn is_recycled(&self) -> bool;

    fn set_recycled(&mut self, recycled: bool);
}

/// LIFO storage with an optional bound (`0` = unbounded)
struct CacheStack<T> {
    items: Vec<T>,
    max_count: usize,
}

impl<T> CacheStack<T> {
    fn new(max_count: usize) -> Self {
        Self {
            items: Vec::new(),
            max_count,
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn is_full(&self) -> bool {
        self.max_count > 0 && self.items.len() >= self.max_count
    }

    fn push(&mut self, item: T) {
        self.items.push(item);
    }

    fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    /// Change the bound, dropping the newest entries that no longer fit.
    ///
    /// Returns how many entries were dropped.
    fn set_max_count(&mut self, max_count: usize) -> usize {
        self.max_count = max_count;
        if max_count == 0 || max_count >= self.items.len() {
            return 0;
        }
        let removed = self.items.len() - max_count;
        self.items.truncate(max_count);
        removed
    }
}

/// Bounded pool for [`Poolable`] objects
///
/// Refuses double recycles and recycles beyond capacity. A refused object
/// still gets its [`Poolable::on_recycled`] call so it can release what it
/// holds before it is dropped.
///
/// # Examples
///
/// ```
/// use poolkit::{Pool, Poolable, SafeObjectPool};
///
/// #[derive(Default)]
/// struct Voice {
///     clip: Option<String>,
///     recycled: bool,
/// }
///
/// impl Poolable for Voice {
///     fn on_recycled(&mut self) { self.clip = None; }
///     fn is_recycled(&self) -> bool { self.recycled }
///     fn set_recycled(&mut self, recycled: bool) { self.recycled = recycled; }
/// }
///
/// let mut pool = SafeObjectPool::<Voice>::new();
/// pool.init(4, 2).unwrap();
/// assert_eq!(pool.cur_count(), 2);
///
/// let mut voice = pool.allocate().unwrap();
/// voice.clip = Some("click.wav".into());
/// assert!(pool.recycle(voice));
/// assert_eq!(pool.cur_count(), 2);
/// ```
pub struct SafeObjectPool<T> {
    factory: Arc<dyn ObjectFactory<T>>,
    cache: CacheStack<T>,
    metrics: MetricsTracker,
}

impl<T: Poolable + 'static> SafeObjectPool<T> {
    /// Create a pool that builds objects through `T::default()`
    pub fn new() -> Self
    where
        T: Default,
    {
        Self::with_factory(Arc::new(DefaultObjectFactory::<T>::new()))
    }

    /// Create a pool backed by a (possibly shared) factory
    pub fn with_factory(factory: Arc<dyn ObjectFactory<T>>) -> Self {
        Self {
            factory,
            cache: CacheStack::new(DEFAULT_MAX_CACHE_COUNT),
            metrics: MetricsTracker::new(),
        }
    }

    /// Create a pool backed by a constructor function
    pub fn with_custom<F>(factory_method: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_factory(Arc::new(CustomObjectFactory::new(factory_method)))
    }

    /// Create a pool and apply `config`, pre-populating it
    pub fn with_config(factory: Arc<dyn ObjectFactory<T>>, config: PoolConfiguration) -> PoolResult<Self> {
        let mut pool = Self::with_factory(factory);
        pool.init(config.max_cache_count, config.init_count)?;
        Ok(pool)
    }

    /// Set the capacity and pre-create objects up to `min(max_count, init_count)`
    ///
    /// Only the missing amount is created, so calling this twice with the
    /// same arguments leaves the pool unchanged.
    pub fn init(&mut self, max_count: usize, init_count: usize) -> PoolResult<()> {
        self.set_max_cache_count(max_count);

        let target = if max_count > 0 {
            init_count.min(max_count)
        } else {
            init_count
        };

        while self.cache.len() < target {
            let obj = self.factory.create()?;
            self.metrics.created += 1;
            if !self.recycle(obj) {
                break;
            }
        }

        debug!(
            pool = type_name::<T>(),
            max_count,
            cached = self.cache.len(),
            "Pool initialized"
        );
        Ok(())
    }

    pub fn max_cache_count(&self) -> usize {
        self.cache.max_count
    }

    /// Change the capacity. Shrinking below the current size discards the
    /// most recently recycled objects without notifying them.
    pub fn set_max_cache_count(&mut self, max_count: usize) {
        let evicted = self.cache.set_max_count(max_count);
        if evicted > 0 {
            self.metrics.evicted += evicted;
            debug!(pool = type_name::<T>(), evicted, max_count, "Evicted cached objects");
        }
    }

    /// Number of cached objects
    pub fn cur_count(&self) -> usize {
        self.cache.len()
    }

    pub fn factory(&self) -> &Arc<dyn ObjectFactory<T>> {
        &self.factory
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.metrics.get_metrics(self.cache.len(), self.cache.max_count)
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<T: Poolable + 'static> Pool<T> for SafeObjectPool<T> {
    fn allocate(&mut self) -> PoolResult<T> {
        let mut obj = match self.cache.pop() {
            Some(obj) => {
                self.metrics.reused += 1;
                obj
            }
            None => {
                let obj = self.factory.create()?;
                self.metrics.created += 1;
                trace!(pool = type_name::<T>(), "Cache miss, created new object");
                obj
            }
        };
        obj.set_recycled(false);
        Ok(obj)
    }

    fn recycle(&mut self, mut obj: T) -> bool {
        if obj.is_recycled() {
            self.metrics.double_recycles += 1;
            trace!(pool = type_name::<T>(), "Ignoring double recycle");
            return false;
        }

        if self.cache.is_full() {
            obj.on_recycled();
            self.metrics.dropped += 1;
            debug!(
                pool = type_name::<T>(),
                max_count = self.cache.max_count,
                "Pool at capacity, dropping recycled object"
            );
            return false;
        }

        obj.set_recycled(true);
        obj.on_recycled();
        self.cache.push(obj);
        self.metrics.recycled += 1;
        true
    }
}

/// Bounded pool for types whose constructor is hidden from general callers
///
/// Objects are built through the constructor the type registered with a
/// [`ConstructorLocator`]. A cache miss fails with
/// [`PoolError::ConstructorNotFound`](crate::PoolError::ConstructorNotFound)
/// if there is none.
pub struct NonPublicObjectPool<T> {
    inner: SafeObjectPool<T>,
}

impl<T: Poolable + 'static> NonPublicObjectPool<T> {
    pub fn new(locator: Arc<ConstructorLocator>) -> Self {
        Self {
            inner: SafeObjectPool::with_factory(Arc::new(NonPublicObjectFactory::<T>::new(locator))),
        }
    }

    pub fn init(&mut self, max_count: usize, init_count: usize) -> PoolResult<()> {
        self.inner.init(max_count, init_count)
    }

    pub fn max_cache_count(&self) -> usize {
        self.inner.max_cache_count()
    }

    pub fn set_max_cache_count(&mut self, max_count: usize) {
        self.inner.set_max_cache_count(max_count);
    }

    pub fn cur_count(&self) -> usize {
        self.inner.cur_count()
    }

    pub fn get_metrics(&self) -> PoolMetrics {
        self.inner.get_metrics()
    }
}

impl<T: Poolable + 'static> Pool<T> for NonPublicObjectPool<T> {
    fn allocate(&mut self) -> PoolResult<T> {
        self.inner.allocate()
    }

    fn recycle(&mut self, obj: T) -> bool {
        self.inner.recycle(obj)
    }
}

/// Bounded pool for plain types without recycle bookkeeping
///
/// An optional reset action runs on every object the pool keeps. Double
/// recycles cannot be detected here; owned values make them impossible
/// unless `T` is itself a shared handle.
pub struct SimpleObjectPool<T> {
    factory: Arc<dyn ObjectFactory<T>>,
    reset: Option<Arc<dyn Fn(&mut T) + Send + Sync>>,
    cache: CacheStack<T>,
    metrics: MetricsTracker,
}

impl<T: 'static> SimpleObjectPool<T> {
    /// Create a pool with a factory function
    pub fn new<F>(factory_method: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::with_factory(Arc::new(CustomObjectFactory::new(factory_method)))
    }

    pub fn with_factory(factory: Arc<dyn ObjectFactory<T>>) -> Self {
        Self {
            factory,
            reset: None,
            cache: CacheStack::new(DEFAULT_MAX_CACHE_COUNT),
            metrics: MetricsTracker::new(),
        }
    }

    /// Run `reset` on each object before it goes back on the stack
    pub fn with_reset<R>(mut self, reset: R) -> Self
    where
        R: Fn(&mut T) + Send + Sync + 'static,
    {
        self.reset = Some(Arc::new(reset));
        self
    }

    pub fn with_config(factory: Arc<dyn ObjectFactory<T>>, config: PoolConfiguration) -> PoolResult<Self> {
        let mut pool = Self::with_factory(factory);
        pool.init(config.max_cache_count, config.init_count)?;
        Ok(pool)
    }

    pub fn init(&mut self, max_count: usize, init_count: usize) -> PoolResult<()> {
        self.set_max_cache_count(max_count);

        let target = if max_count > 0 {
            init_count.min(max_count)
        } else {
            init_count
        };

        while self.cache.len() < target {
            let obj = self.factory.create()?;
            self.metrics.created += 1;
            self.cache.push(obj);
        }
        Ok(())
    }

    pub fn max_cache_count(&self) -> usize {
        self.cache.max_count
    }

    pub fn set_max_cache_count(&mut self, max_count: usize) {
        let evicted = self.cache.set_max_count(max_count);
        if evicted > 0 {
            self.metrics.evicted += evicted;
            debug!(pool = type_name::<T>(), evicted, max_count, "Evicted cached objects");
        }
    }

    pub fn cur_count(&self) -> usize {
        self.cache.len()
    }

    pub fn get_metrics(&self) -> PoolMetrics {
        self.metrics.get_metrics(self.cache.len(), self.cache.max_count)
    }

    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

impl<T: 'static> Pool<T> for SimpleObjectPool<T> {
    fn allocate(&mut self) -> PoolResult<T> {
        match self.cache.pop() {
            Some(obj) => {
                self.metrics.reused += 1;
                Ok(obj)
            }
            None => {
                let obj = self.factory.create()?;
                self.metrics.created += 1;
                Ok(obj)
            }
        }
    }

    fn recycle(&mut self, mut obj: T) -> bool {
        if self.cache.is_full() {
            self.metrics.dropped += 1;
            return false;
        }
        if let Some(reset) = &self.reset {
            reset(&mut obj);
        }
        self.cache.push(obj);
        self.metrics.recycled += 1;
        true
    }
}

/// A pool behind a mutex, for callers that share one pool across threads
///
/// Registered as a [`Singleton`], this is how a context hands out one pool
/// per object type.
///
/// # Examples
///
/// ```
/// use poolkit::{SharedPool, SimpleObjectPool};
///
/// let shared = SharedPool::new(SimpleObjectPool::new(Vec::<f32>::new));
/// {
///     let mut samples = shared.allocate_scoped::<Vec<f32>>().unwrap();
///     samples.extend([0.1, 0.2]);
/// }
/// // The buffer went back when the guard dropped.
/// assert_eq!(shared.lock().cur_count(), 1);
/// ```
pub struct SharedPool<P> {
    inner: Mutex<P>,
}

impl<P> SharedPool<P> {
    pub fn new(pool: P) -> Self {
        Self {
            inner: Mutex::new(pool),
        }
    }

    /// Lock the pool for a sequence of operations
    pub fn lock(&self) -> MutexGuard<'_, P> {
        self.inner.lock()
    }

    pub fn allocate<T>(&self) -> PoolResult<T>
    where
        P: Pool<T>,
    {
        self.inner.lock().allocate()
    }

    pub fn recycle<T>(&self, obj: T) -> bool
    where
        P: Pool<T>,
    {
        self.inner.lock().recycle(obj)
    }

    /// Allocate an object that is recycled automatically when dropped
    pub fn allocate_scoped<T>(&self) -> PoolResult<PooledObject<'_, T, P>>
    where
        P: Pool<T>,
    {
        let value = self.allocate()?;
        Ok(PooledObject {
            value: Some(value),
            pool: self,
        })
    }

    pub fn into_inner(self) -> P {
        self.inner.into_inner()
    }
}

impl<P: Send + 'static> Singleton for SharedPool<P> {}

/// A pooled object that is recycled into its [`SharedPool`] when dropped
pub struct PooledObject<'a, T, P: Pool<T>> {
    value: Option<T>,
    pool: &'a SharedPool<P>,
}

impl<T, P: Pool<T>> PooledObject<'_, T, P> {
    /// Take the value out without recycling it
    pub fn detach(mut self) -> T {
        self.value.take().expect("Value already taken")
    }
}

impl<T, P: Pool<T>> Deref for PooledObject<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("Value already taken")
    }
}

impl<T, P: Pool<T>> DerefMut for PooledObject<'_, T, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("Value already taken")
    }
}

impl<T, P: Pool<T>> Drop for PooledObject<'_, T, P> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.recycle(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PoolError;
    use crate::factory::ObjectFactoryExt;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Counter {
        id: usize,
        recycled: bool,
    }

    impl Poolable for Counter {
        fn on_recycled(&mut self) {}

        fn is_recycled(&self) -> bool {
            self.recycled
        }

        fn set_recycled(&mut self, recycled: bool) {
            self.recycled = recycled;
        }
    }

    fn counting_factory() -> Arc<dyn ObjectFactory<Counter>> {
        let next = AtomicUsize::new(0);
        CustomObjectFactory::new(move || Counter {
            id: next.fetch_add(1, Ordering::SeqCst) + 1,
            recycled: false,
        })
        .shared()
    }

    /// A shared handle, so the same instance can be offered twice.
    #[derive(Clone, Default)]
    struct Handle {
        recycled: Arc<AtomicBool>,
        notified: Arc<AtomicUsize>,
    }

    impl Poolable for Handle {
        fn on_recycled(&mut self) {
            self.notified.fetch_add(1, Ordering::SeqCst);
        }

        fn is_recycled(&self) -> bool {
            self.recycled.load(Ordering::SeqCst)
        }

        fn set_recycled(&mut self, recycled: bool) {
            self.recycled.store(recycled, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_capacity_two_lifo_scenario() {
        let factory = counting_factory();
        let mut pool = SafeObjectPool::with_factory(Arc::clone(&factory));
        pool.set_max_cache_count(2);

        let first = pool.allocate().unwrap();
        let second = pool.allocate().unwrap();
        assert_eq!((first.id, second.id), (1, 2));

        assert!(pool.recycle(first));
        assert!(pool.recycle(second));

        let stranger = factory.create().unwrap();
        assert_eq!(stranger.id, 3);
        assert!(!pool.recycle(stranger));
        assert_eq!(pool.cur_count(), 2);

        assert_eq!(pool.allocate().unwrap().id, 2);
        assert_eq!(pool.allocate().unwrap().id, 1);
        assert_eq!(pool.allocate().unwrap().id, 4);
    }

    #[test]
    fn test_double_recycle_is_ignored() {
        let mut pool = SafeObjectPool::<Handle>::new();
        let handle = pool.allocate().unwrap();

        assert!(pool.recycle(handle.clone()));
        assert!(!pool.recycle(handle.clone()));
        assert_eq!(pool.cur_count(), 1);
        assert_eq!(handle.notified.load(Ordering::SeqCst), 1);
        assert_eq!(pool.get_metrics().double_recycles, 1);

        let again = pool.allocate().unwrap();
        assert!(!again.is_recycled());
        assert!(pool.recycle(again));
    }

    #[test]
    fn test_capacity_drop_still_notifies() {
        let mut pool = SafeObjectPool::<Handle>::new();
        pool.set_max_cache_count(1);

        assert!(pool.recycle(Handle::default()));
        let rejected = Handle::default();
        assert!(!pool.recycle(rejected.clone()));

        assert_eq!(rejected.notified.load(Ordering::SeqCst), 1);
        assert!(!rejected.is_recycled());
        assert_eq!(pool.cur_count(), 1);
        assert_eq!(pool.get_metrics().dropped_at_capacity, 1);
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut pool = SafeObjectPool::with_factory(counting_factory());
        pool.init(5, 3).unwrap();
        assert_eq!(pool.cur_count(), 3);
        assert_eq!(pool.max_cache_count(), 5);

        pool.init(5, 3).unwrap();
        assert_eq!(pool.cur_count(), 3);
        assert_eq!(pool.get_metrics().total_created, 3);
    }

    #[test]
    fn test_init_clamps_to_capacity() {
        let mut pool = SafeObjectPool::with_factory(counting_factory());
        pool.init(2, 10).unwrap();
        assert_eq!(pool.cur_count(), 2);

        let mut unbounded = SafeObjectPool::with_factory(counting_factory());
        unbounded.init(0, 20).unwrap();
        assert_eq!(unbounded.cur_count(), 20);
    }

    #[test]
    fn test_shrink_keeps_oldest_entries() {
        let factory = counting_factory();
        let mut pool = SafeObjectPool::with_factory(Arc::clone(&factory));
        pool.set_max_cache_count(10);
        for _ in 0..8 {
            assert!(pool.recycle(factory.create().unwrap()));
        }

        pool.set_max_cache_count(4);
        assert_eq!(pool.cur_count(), 4);
        assert_eq!(pool.get_metrics().evicted, 4);

        let ids: Vec<usize> = (0..4).map(|_| pool.allocate().unwrap().id).collect();
        assert_eq!(ids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_growing_capacity_keeps_entries() {
        let mut pool = SafeObjectPool::with_factory(counting_factory());
        pool.init(3, 3).unwrap();
        pool.set_max_cache_count(0);
        assert_eq!(pool.cur_count(), 3);
    }

    #[test]
    fn test_unbounded_reuse_does_not_grow() {
        let mut pool = SafeObjectPool::with_factory(counting_factory());
        pool.set_max_cache_count(0);

        for _ in 0..1000 {
            let obj = pool.allocate().unwrap();
            assert!(pool.recycle(obj));
        }
        assert_eq!(pool.cur_count(), 1);
        assert_eq!(pool.get_metrics().total_created, 1);
        assert_eq!(pool.get_metrics().total_reused, 999);
    }

    #[test]
    fn test_factory_errors_propagate() {
        let factory = CustomObjectFactory::<Counter>::fallible(|| {
            Err(PoolError::CreationFailed("device lost".into()))
        });
        let mut pool = SafeObjectPool::with_factory(Arc::new(factory));
        assert_eq!(
            pool.allocate().unwrap_err(),
            PoolError::CreationFailed("device lost".into())
        );
        assert!(pool.init(4, 2).is_err());
    }

    #[test]
    fn test_non_public_pool() {
        let locator = Arc::new(ConstructorLocator::new());
        let mut pool = NonPublicObjectPool::<Counter>::new(Arc::clone(&locator));
        assert!(matches!(
            pool.allocate(),
            Err(PoolError::ConstructorNotFound(_))
        ));

        locator.register(|| Counter { id: 99, recycled: false });
        pool.init(3, 2).unwrap();
        assert_eq!(pool.cur_count(), 2);
        assert_eq!(pool.allocate().unwrap().id, 99);
    }

    #[test]
    fn test_simple_pool_reset_and_capacity() {
        let mut pool = SimpleObjectPool::new(Vec::<u32>::new).with_reset(|v: &mut Vec<u32>| v.clear());
        pool.set_max_cache_count(1);

        let mut buf = pool.allocate().unwrap();
        buf.push(7);
        assert!(pool.recycle(buf));
        assert!(!pool.recycle(vec![1, 2]));

        assert!(pool.allocate().unwrap().is_empty());
        assert_eq!(pool.get_metrics().dropped_at_capacity, 1);
    }

    #[test]
    fn test_with_config() {
        let config = PoolConfiguration::new().with_max_cache_count(4).with_init_count(6);
        let pool = SafeObjectPool::with_config(counting_factory(), config).unwrap();
        assert_eq!(pool.cur_count(), 4);
        assert_eq!(pool.max_cache_count(), 4);
    }

    #[test]
    fn test_shared_pool_scoped_guard() {
        let shared = SharedPool::new(SafeObjectPool::with_factory(counting_factory()));
        {
            let guard = shared.allocate_scoped::<Counter>().unwrap();
            assert_eq!(guard.id, 1);
            assert_eq!(shared.lock().cur_count(), 0);
        }
        assert_eq!(shared.lock().cur_count(), 1);

        let detached = shared.allocate_scoped::<Counter>().unwrap().detach();
        assert_eq!(detached.id, 1);
        assert_eq!(shared.lock().cur_count(), 0);
    }

    #[test]
    fn test_capacity_bound_holds_over_mixed_sequence() {
        let factory = counting_factory();
        let mut pool = SafeObjectPool::with_factory(Arc::clone(&factory));
        let mut held = Vec::new();

        // xorshift32, fixed seed so failures replay
        let mut state: u32 = 0x9E37_79B9;
        let mut next = move || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state
        };

        for step in 0..2_000 {
            match next() % 4 {
                0 => held.push(pool.allocate().unwrap()),
                1 => {
                    if let Some(obj) = held.pop() {
                        pool.recycle(obj);
                    }
                }
                2 => {
                    pool.recycle(factory.create().unwrap());
                }
                _ => pool.set_max_cache_count((next() % 6) as usize),
            }

            let max = pool.max_cache_count();
            assert!(
                max == 0 || pool.cur_count() <= max,
                "step {step}: {} cached with capacity {max}",
                pool.cur_count()
            );
        }
    }
}
