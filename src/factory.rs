//! Object construction strategies used by pools on a cache miss

use crate::constructor::ConstructorLocator;
use crate::errors::PoolResult;

use std::marker::PhantomData;
use std::sync::Arc;

/// Produces a new, fully constructed `T` on demand
pub trait ObjectFactory<T>: Send + Sync {
    fn create(&self) -> PoolResult<T>;
}

/// Builds objects through `T::default()`
pub struct DefaultObjectFactory<T> {
    _phantom: PhantomData<fn() -> T>,
}

impl<T> DefaultObjectFactory<T> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<T> Default for DefaultObjectFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> ObjectFactory<T> for DefaultObjectFactory<T> {
    fn create(&self) -> PoolResult<T> {
        Ok(T::default())
    }
}

/// Builds objects through a caller-supplied function
///
/// # Examples
///
/// ```
/// use poolkit::{CustomObjectFactory, ObjectFactory, PoolError};
///
/// let factory = CustomObjectFactory::new(|| String::from("fresh"));
/// assert_eq!(factory.create().unwrap(), "fresh");
///
/// let failing = CustomObjectFactory::<String>::fallible(|| {
///     Err(PoolError::CreationFailed("no backing buffer".into()))
/// });
/// assert!(failing.create().is_err());
/// ```
pub struct CustomObjectFactory<T> {
    factory_method: Arc<dyn Fn() -> PoolResult<T> + Send + Sync>,
}

impl<T> CustomObjectFactory<T> {
    /// Wrap an infallible constructor
    pub fn new<F>(factory_method: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            factory_method: Arc::new(move || Ok(factory_method())),
        }
    }

    /// Wrap a constructor whose failures are propagated to the allocating caller
    pub fn fallible<F>(factory_method: F) -> Self
    where
        F: Fn() -> PoolResult<T> + Send + Sync + 'static,
    {
        Self {
            factory_method: Arc::new(factory_method),
        }
    }
}

impl<T> Clone for CustomObjectFactory<T> {
    fn clone(&self) -> Self {
        Self {
            factory_method: Arc::clone(&self.factory_method),
        }
    }
}

impl<T> ObjectFactory<T> for CustomObjectFactory<T> {
    fn create(&self) -> PoolResult<T> {
        (self.factory_method)()
    }
}

/// Builds objects through the hidden constructor registered for `T`
///
/// Fails with [`PoolError::ConstructorNotFound`](crate::PoolError::ConstructorNotFound)
/// when `T` never registered one.
pub struct NonPublicObjectFactory<T> {
    locator: Arc<ConstructorLocator>,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> NonPublicObjectFactory<T> {
    pub fn new(locator: Arc<ConstructorLocator>) -> Self {
        Self {
            locator,
            _phantom: PhantomData,
        }
    }
}

impl<T: 'static> ObjectFactory<T> for NonPublicObjectFactory<T> {
    fn create(&self) -> PoolResult<T> {
        self.locator.construct::<T>()
    }
}

/// A factory that runs an action on every object it creates
pub struct InitializingFactory<T, F> {
    inner: F,
    on_create: Arc<dyn Fn(&mut T) + Send + Sync>,
}

impl<T, F: ObjectFactory<T>> ObjectFactory<T> for InitializingFactory<T, F> {
    fn create(&self) -> PoolResult<T> {
        let mut obj = self.inner.create()?;
        (self.on_create)(&mut obj);
        Ok(obj)
    }
}

/// Combinators available on every factory
pub trait ObjectFactoryExt<T>: ObjectFactory<T> + Sized {
    /// Run `on_create` on each freshly created object
    ///
    /// # Examples
    ///
    /// ```
    /// use poolkit::{DefaultObjectFactory, ObjectFactory, ObjectFactoryExt};
    ///
    /// let factory = DefaultObjectFactory::<Vec<u8>>::new()
    ///     .with_initial_action(|buf: &mut Vec<u8>| buf.reserve(64));
    ///
    /// assert!(factory.create().unwrap().capacity() >= 64);
    /// ```
    fn with_initial_action<A>(self, on_create: A) -> InitializingFactory<T, Self>
    where
        A: Fn(&mut T) + Send + Sync + 'static,
    {
        InitializingFactory {
            inner: self,
            on_create: Arc::new(on_create),
        }
    }

    /// Share this factory between pools
    fn shared(self) -> Arc<dyn ObjectFactory<T>>
    where
        Self: 'static,
    {
        Arc::new(self)
    }
}

impl<T, F: ObjectFactory<T>> ObjectFactoryExt<T> for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PoolError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_default_factory() {
        let factory = DefaultObjectFactory::<Vec<i32>>::new();
        assert!(factory.create().unwrap().is_empty());
    }

    #[test]
    fn test_custom_factory_counts_calls() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let factory = CustomObjectFactory::new(move || counter.fetch_add(1, Ordering::SeqCst) + 1);

        assert_eq!(factory.create().unwrap(), 1);
        assert_eq!(factory.clone().create().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_non_public_factory() {
        struct Guarded(u8);

        let locator = Arc::new(ConstructorLocator::new());
        let factory = NonPublicObjectFactory::<Guarded>::new(Arc::clone(&locator));
        assert!(matches!(
            factory.create(),
            Err(PoolError::ConstructorNotFound(_))
        ));

        locator.register(|| Guarded(3));
        assert_eq!(factory.create().unwrap().0, 3);
    }

    #[test]
    fn test_initial_action_runs_per_object() {
        let factory = CustomObjectFactory::new(|| 10).with_initial_action(|v: &mut i32| *v += 1);
        assert_eq!(factory.create().unwrap(), 11);
        assert_eq!(factory.create().unwrap(), 11);
    }
}
