//! Lazy, thread-safe singleton registry
//!
//! Each type gets one slot guarded by its own mutex. The lock covers the
//! existence check and the whole construction, so a type is constructed at
//! most once no matter how many threads ask for it first. Construction must
//! not ask the registry for the same type again; that deadlocks.
//!
//! A slot also carries a construction flag, set only while its constructor
//! runs, so [`SingletonState::Constructing`] is not confused with a caller
//! that holds the lock for a plain read.

use crate::constructor::ConstructorLocator;
use crate::errors::{PoolError, PoolResult};

use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// A type with at most one instance per registry
pub trait Singleton: Any + Send + Sync {
    /// Runs once, after construction and before the instance is published
    fn on_singleton_init(&self) {}
}

/// Lifecycle of a registry slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SingletonState {
    /// Nothing published yet, or disposed
    Empty,
    /// A caller is running the constructor
    Constructing,
    /// An instance is published
    Ready,
    /// The host environment is quitting; no instance will be built
    Terminated,
}

pub(crate) type Erased = Arc<dyn Any + Send + Sync>;

pub(crate) fn downcast_instance<T: Any + Send + Sync>(erased: Erased) -> PoolResult<Arc<T>> {
    erased
        .downcast::<T>()
        .map_err(|_| PoolError::TypeMismatch(type_name::<T>()))
}

/// Set while a slot runs its constructor
#[derive(Default)]
pub(crate) struct ConstructionFlag(AtomicBool);

impl ConstructionFlag {
    /// Mark the slot as constructing until the guard drops
    pub(crate) fn enter(&self) -> ConstructionGuard<'_> {
        self.0.store(true, Ordering::Release);
        ConstructionGuard(&self.0)
    }

    pub(crate) fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub(crate) struct ConstructionGuard<'a>(&'a AtomicBool);

impl Drop for ConstructionGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Default)]
struct SingletonSlot {
    instance: Mutex<Option<Erased>>,
    constructing: ConstructionFlag,
}

/// Registry of plain (host-independent) singletons
///
/// # Examples
///
/// ```
/// use poolkit::{ConstructorLocator, Singleton, SingletonRegistry};
/// use std::sync::Arc;
///
/// struct Mixer { channels: usize }
///
/// impl Singleton for Mixer {}
///
/// let constructors = Arc::new(ConstructorLocator::new());
/// constructors.register(|| Mixer { channels: 8 });
///
/// let registry = SingletonRegistry::new(constructors);
/// let first = registry.instance::<Mixer>().unwrap();
/// let second = registry.instance::<Mixer>().unwrap();
///
/// assert!(Arc::ptr_eq(&first, &second));
/// assert_eq!(first.channels, 8);
/// ```
pub struct SingletonRegistry {
    constructors: Arc<ConstructorLocator>,
    slots: DashMap<TypeId, Arc<SingletonSlot>>,
}

impl SingletonRegistry {
    pub fn new(constructors: Arc<ConstructorLocator>) -> Self {
        Self {
            constructors,
            slots: DashMap::new(),
        }
    }

    pub fn constructors(&self) -> &Arc<ConstructorLocator> {
        &self.constructors
    }

    /// Get the instance of `T`, building it through its registered
    /// constructor on first use
    pub fn instance<T: Singleton>(&self) -> PoolResult<Arc<T>> {
        self.instance_with(|| self.constructors.construct::<T>())
    }

    /// Get the instance of `T`, building it with `create` on first use
    ///
    /// `create` runs under the slot lock and at most once per publication.
    pub fn instance_with<T, F>(&self, create: F) -> PoolResult<Arc<T>>
    where
        T: Singleton,
        F: FnOnce() -> PoolResult<T>,
    {
        let slot = self.slot::<T>();
        let mut guard = slot.instance.lock();

        if let Some(existing) = guard.as_ref() {
            return downcast_instance(Arc::clone(existing));
        }

        debug!(singleton = type_name::<T>(), "Constructing singleton");
        let instance = {
            let _constructing = slot.constructing.enter();
            let instance = create()?;
            instance.on_singleton_init();
            instance
        };

        let instance = Arc::new(instance);
        let erased: Erased = instance.clone();
        *guard = Some(erased);
        Ok(instance)
    }

    /// Get the instance of `T` only if it is already published
    pub fn try_get<T: Singleton>(&self) -> Option<Arc<T>> {
        let slot = self.existing_slot::<T>()?;
        let guard = slot.instance.lock();
        guard
            .as_ref()
            .and_then(|existing| downcast_instance(Arc::clone(existing)).ok())
    }

    pub fn state<T: Singleton>(&self) -> SingletonState {
        let Some(slot) = self.existing_slot::<T>() else {
            return SingletonState::Empty;
        };
        let guard = match slot.instance.try_lock() {
            Some(guard) => guard,
            None if slot.constructing.is_set() => return SingletonState::Constructing,
            // Readers hold the lock only briefly.
            None => slot.instance.lock(),
        };
        if guard.is_some() {
            SingletonState::Ready
        } else {
            SingletonState::Empty
        }
    }

    /// Drop the registry's reference to `T`, returning it to the empty state
    ///
    /// The next [`instance`](Self::instance) call builds a new one.
    pub fn dispose<T: Singleton>(&self) -> Option<Arc<T>> {
        let slot = self.existing_slot::<T>()?;
        let previous = slot.instance.lock().take()?;
        debug!(singleton = type_name::<T>(), "Disposed singleton");
        downcast_instance(previous).ok()
    }

    /// Dispose every published instance. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let slots: Vec<Arc<SingletonSlot>> =
            self.slots.iter().map(|entry| Arc::clone(entry.value())).collect();

        slots
            .iter()
            .filter(|slot| slot.instance.lock().take().is_some())
            .count()
    }

    /// Number of published instances
    pub fn len(&self) -> usize {
        let slots: Vec<Arc<SingletonSlot>> =
            self.slots.iter().map(|entry| Arc::clone(entry.value())).collect();

        slots
            .iter()
            .filter(|slot| slot.instance.lock().is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot<T: 'static>(&self) -> Arc<SingletonSlot> {
        // The map guard is released before the slot is locked, so building one
        // singleton may ask for another.
        Arc::clone(self.slots.entry(TypeId::of::<T>()).or_default().value())
    }

    fn existing_slot<T: 'static>(&self) -> Option<Arc<SingletonSlot>> {
        self.slots
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(entry.value()))
    }
}
