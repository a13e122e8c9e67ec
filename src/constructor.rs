//! Registered hidden constructors
//!
//! Types that keep their constructor private to their own module opt in to
//! pool-only or singleton-only creation by registering a zero-argument
//! constructor here. The pooling and singleton machinery can then build them
//! while general callers cannot.

use crate::errors::{PoolError, PoolResult};

use dashmap::DashMap;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;

/// A shareable zero-argument constructor for `T`
pub type Constructor<T> = Arc<dyn Fn() -> T + Send + Sync>;

struct Entry {
    type_name: &'static str,
    // Holds a `Constructor<T>` for the keyed type.
    constructor: Arc<dyn Any + Send + Sync>,
}

/// Map from type identity to that type's registered constructor
///
/// # Examples
///
/// ```
/// use poolkit::ConstructorLocator;
///
/// mod service {
///     pub struct Service { pub(super) id: u32 }
///
///     impl Service {
///         fn new() -> Self { Self { id: 7 } }
///
///         pub fn install(locator: &poolkit::ConstructorLocator) {
///             locator.register(Self::new);
///         }
///     }
/// }
///
/// let locator = ConstructorLocator::new();
/// assert!(locator.construct::<service::Service>().is_err());
///
/// service::Service::install(&locator);
/// assert_eq!(locator.construct::<service::Service>().unwrap().id, 7);
/// ```
#[derive(Default)]
pub struct ConstructorLocator {
    constructors: DashMap<TypeId, Entry>,
}

impl ConstructorLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `ctor` for `T`, replacing any previous registration.
    ///
    /// Returns `true` if a constructor was already registered.
    pub fn register<T, F>(&self, ctor: F) -> bool
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.constructors
            .insert(TypeId::of::<T>(), Self::entry::<T, F>(ctor))
            .is_some()
    }

    /// Register `ctor` for `T` unless one is already present.
    ///
    /// Returns `true` if this call installed the constructor.
    pub fn register_if_absent<T, F>(&self, ctor: F) -> bool
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        match self.constructors.entry(TypeId::of::<T>()) {
            dashmap::Entry::Occupied(_) => false,
            dashmap::Entry::Vacant(slot) => {
                slot.insert(Self::entry::<T, F>(ctor));
                true
            }
        }
    }

    /// Register `T::default` as the constructor for `T`
    pub fn register_default<T: Default + 'static>(&self) -> bool {
        self.register::<T, _>(T::default)
    }

    /// Remove the constructor registered for `T`
    pub fn unregister<T: 'static>(&self) -> bool {
        self.constructors.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.constructors.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Find the constructor registered for `T`
    pub fn locate<T: 'static>(&self) -> PoolResult<Constructor<T>> {
        let erased = self
            .constructors
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(&entry.constructor))
            .ok_or(PoolError::ConstructorNotFound(type_name::<T>()))?;

        erased
            .downcast::<Constructor<T>>()
            .map(|ctor| Arc::clone(&*ctor))
            .map_err(|_| PoolError::TypeMismatch(type_name::<T>()))
    }

    /// Build a new `T` through its registered constructor
    pub fn construct<T: 'static>(&self) -> PoolResult<T> {
        let ctor = self.locate::<T>()?;
        Ok(ctor())
    }

    fn entry<T, F>(ctor: F) -> Entry
    where
        T: 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let constructor: Constructor<T> = Arc::new(ctor);
        Entry {
            type_name: type_name::<T>(),
            constructor: Arc::new(constructor),
        }
    }
}

impl std::fmt::Debug for ConstructorLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&'static str> = self.constructors.iter().map(|e| e.type_name).collect();
        f.debug_struct("ConstructorLocator")
            .field("types", &names)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Hidden {
        value: u32,
    }

    impl Hidden {
        fn new() -> Self {
            Self { value: 11 }
        }
    }

    #[test]
    fn test_missing_constructor() {
        let locator = ConstructorLocator::new();
        match locator.construct::<Hidden>() {
            Err(PoolError::ConstructorNotFound(name)) => assert!(name.ends_with("Hidden")),
            other => panic!("unexpected result: {:?}", other.map(|h| h.value)),
        }
    }

    #[test]
    fn test_register_and_construct() {
        let locator = ConstructorLocator::new();
        assert!(!locator.register(Hidden::new));
        assert!(locator.contains::<Hidden>());
        assert_eq!(locator.construct::<Hidden>().unwrap().value, 11);
    }

    #[test]
    fn test_register_if_absent_keeps_first() {
        let locator = ConstructorLocator::new();
        assert!(locator.register_if_absent(|| Hidden { value: 1 }));
        assert!(!locator.register_if_absent(|| Hidden { value: 2 }));
        assert_eq!(locator.construct::<Hidden>().unwrap().value, 1);

        assert!(locator.register(|| Hidden { value: 3 }));
        assert_eq!(locator.construct::<Hidden>().unwrap().value, 3);
    }

    #[test]
    fn test_unregister() {
        let locator = ConstructorLocator::new();
        locator.register_default::<String>();
        assert_eq!(locator.len(), 1);
        assert!(locator.unregister::<String>());
        assert!(locator.is_empty());
        assert!(locator.locate::<String>().is_err());
    }
}
