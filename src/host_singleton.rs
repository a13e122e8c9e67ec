//! Singletons whose lifetime is bound to a host node
//!
//! Construction order for a missing instance:
//!
//! 1. refuse (`Ok(None)`) when the host is neither live nor in test mode,
//! 2. adopt an instance the host already holds,
//! 3. build one on the node at [`HostSingleton::PLACEMENT_PATH`],
//! 4. otherwise build one on a new root node named after the type.
//!
//! A published instance whose node has been destroyed is forgotten and
//! rebuilt on the next request. Once the host quits, every slot turns
//! terminal and `instance` returns `Ok(None)` until
//! [`HostSingletonRegistry::reset`].

use crate::constructor::ConstructorLocator;
use crate::errors::PoolResult;
use crate::host::{Component, HostEnvironment, NodeId, PathMode, resolve_path};
use crate::singleton::{ConstructionFlag, Singleton, SingletonState, downcast_instance};

use dashmap::DashMap;
use parking_lot::Mutex;
use std::any::{TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, trace};

/// How a host-bound singleton treats duplicate instances in the host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HostSingletonPolicy {
    /// Adopt the oldest instance the host holds; duplicates are left alone
    #[default]
    Standard,
    /// The first instance wins. Nodes of later duplicates are destroyed and
    /// the winner's node survives teardown.
    Persistent,
    /// The newest instance wins. Nodes of older instances are destroyed and
    /// the winner's node survives teardown.
    Replaceable,
}

/// A singleton that lives on a host node
pub trait HostSingleton: Singleton {
    /// `/`-delimited placement under the host roots, e.g. `"Managers/Audio"`
    const PLACEMENT_PATH: Option<&'static str> = None;

    const POLICY: HostSingletonPolicy = HostSingletonPolicy::Standard;
}

/// Where a host-bound instance lives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostBinding {
    pub node: NodeId,
    /// The host already held the instance; the registry did not build it
    pub adopted: bool,
}

#[derive(Default)]
struct HostSlot {
    instance: Option<Component>,
    binding: Option<HostBinding>,
    terminated: bool,
}

#[derive(Default)]
struct SlotCell {
    slot: Mutex<HostSlot>,
    constructing: ConstructionFlag,
}

/// Registry of host-bound singletons
///
/// # Examples
///
/// ```
/// use poolkit::{ConstructorLocator, HostSingleton, HostSingletonRegistry, MemoryHost, Singleton};
/// use std::sync::Arc;
///
/// struct AudioManager;
///
/// impl Singleton for AudioManager {}
/// impl HostSingleton for AudioManager {
///     const PLACEMENT_PATH: Option<&'static str> = Some("Kits/Audio");
/// }
///
/// let host = Arc::new(MemoryHost::new());
/// let constructors = Arc::new(ConstructorLocator::new());
/// constructors.register(|| AudioManager);
///
/// let registry = HostSingletonRegistry::new(host.clone(), constructors);
/// assert!(registry.instance::<AudioManager>().unwrap().is_some());
///
/// let node = host.find_path("Kits/Audio").unwrap();
/// assert_eq!(registry.binding::<AudioManager>().unwrap().node, node);
///
/// registry.on_application_quit();
/// assert!(registry.instance::<AudioManager>().unwrap().is_none());
/// ```
pub struct HostSingletonRegistry {
    host: Arc<dyn HostEnvironment>,
    constructors: Arc<ConstructorLocator>,
    slots: DashMap<TypeId, Arc<SlotCell>>,
    quitting: AtomicBool,
}

impl HostSingletonRegistry {
    pub fn new(host: Arc<dyn HostEnvironment>, constructors: Arc<ConstructorLocator>) -> Self {
        Self {
            host,
            constructors,
            slots: DashMap::new(),
            quitting: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &Arc<dyn HostEnvironment> {
        &self.host
    }

    /// Get the instance of `T`, adopting or building it on first use
    ///
    /// `Ok(None)` means the host cannot hold `T` right now.
    pub fn instance<T: HostSingleton>(&self) -> PoolResult<Option<Arc<T>>> {
        let cell = self.slot::<T>();
        let mut guard = cell.slot.lock();

        if guard.terminated || self.is_quitting() {
            trace!(singleton = type_name::<T>(), "Host is quitting, no instance");
            return Ok(None);
        }

        self.forget_if_orphaned::<T>(&mut guard);
        if let Some(existing) = guard.instance.as_ref() {
            return downcast_instance(Arc::clone(existing)).map(Some);
        }

        let created = {
            let _constructing = cell.constructing.enter();
            self.create::<T>()?
        };
        let Some((instance, binding)) = created else {
            return Ok(None);
        };

        let erased: Component = instance.clone();
        guard.instance = Some(erased);
        guard.binding = Some(binding);
        Ok(Some(instance))
    }

    /// The node the instance of `T` is bound to, if published
    pub fn binding<T: HostSingleton>(&self) -> Option<HostBinding> {
        let cell = self.existing_slot::<T>()?;
        let mut guard = cell.slot.lock();
        self.forget_if_orphaned::<T>(&mut guard);
        guard.binding
    }

    pub fn state<T: HostSingleton>(&self) -> SingletonState {
        let Some(cell) = self.existing_slot::<T>() else {
            return if self.is_quitting() {
                SingletonState::Terminated
            } else {
                SingletonState::Empty
            };
        };

        let mut guard = match cell.slot.try_lock() {
            Some(guard) => guard,
            None if cell.constructing.is_set() => return SingletonState::Constructing,
            // Readers hold the lock only briefly.
            None => cell.slot.lock(),
        };
        self.forget_if_orphaned::<T>(&mut guard);

        if guard.terminated {
            SingletonState::Terminated
        } else if guard.instance.is_some() {
            SingletonState::Ready
        } else if self.is_quitting() {
            SingletonState::Terminated
        } else {
            SingletonState::Empty
        }
    }

    /// Tell the registry that an instance of `T` on `node` came alive
    ///
    /// Hosts call this when they place an instance themselves, e.g. when a
    /// saved hierarchy is loaded. Returns whether the instance on `node` was
    /// kept; a [`Persistent`](HostSingletonPolicy::Persistent) duplicate has
    /// its node destroyed and returns `false`.
    pub fn on_instance_awake<T: HostSingleton>(&self, node: NodeId) -> PoolResult<bool> {
        let host = self.host.as_ref();
        if T::POLICY == HostSingletonPolicy::Standard || (!host.is_test_mode() && !host.is_live()) {
            return Ok(true);
        }

        let cell = self.slot::<T>();
        let mut guard = cell.slot.lock();
        if guard.terminated || self.is_quitting() {
            return Ok(false);
        }

        let found = host.find_components(TypeId::of::<T>());
        let oldest = found.first().map(|(first, _)| *first);
        let Some(component) = found
            .into_iter()
            .find_map(|(on, component)| (on == node).then_some(component))
        else {
            return Ok(false);
        };

        self.forget_if_orphaned::<T>(&mut guard);
        let published = guard.binding.map(|binding| binding.node);

        match T::POLICY {
            HostSingletonPolicy::Persistent => {
                let kept = published.or(oldest);
                if kept.is_some_and(|kept| kept != node) {
                    host.destroy_node(node);
                    debug!(singleton = type_name::<T>(), node = node.raw(), "Destroyed duplicate singleton");
                    return Ok(false);
                }
            }
            HostSingletonPolicy::Replaceable => {
                self.destroy_duplicates::<T>(node);
            }
            HostSingletonPolicy::Standard => {}
        }

        self.keep_across_teardown(node);
        if published != Some(node) {
            self.publish_adopted::<T>(&mut guard, node, component)?;
        }
        Ok(true)
    }

    /// Release the instance of `T` and destroy its node
    ///
    /// In test mode every ancestor of the node is destroyed as well.
    pub fn dispose<T: HostSingleton>(&self) -> bool {
        let Some(cell) = self.existing_slot::<T>() else {
            return false;
        };
        let mut guard = cell.slot.lock();
        self.forget_if_orphaned::<T>(&mut guard);
        if guard.instance.take().is_none() {
            return false;
        }

        if let Some(binding) = guard.binding.take() {
            if self.host.is_test_mode() {
                let mut chain = vec![binding.node];
                while let Some(parent) = chain.last().and_then(|node| self.host.parent_of(*node)) {
                    chain.push(parent);
                }
                for node in chain {
                    self.host.destroy_node(node);
                }
            } else {
                self.host.destroy_node(binding.node);
            }
        }

        debug!(singleton = type_name::<T>(), "Disposed host singleton");
        true
    }

    /// Enter the terminal state: drop every instance and destroy its node
    pub fn on_application_quit(&self) {
        if self.quitting.swap(true, Ordering::AcqRel) {
            return;
        }

        let mut released = 0usize;
        for cell in self.all_slots() {
            let mut guard = cell.slot.lock();
            guard.terminated = true;
            if guard.instance.take().is_some() {
                released += 1;
            }
            if let Some(binding) = guard.binding.take() {
                self.host.destroy_node(binding.node);
            }
        }

        info!(released, "Host quitting, host singletons torn down");
    }

    pub fn is_quitting(&self) -> bool {
        self.quitting.load(Ordering::Acquire)
    }

    /// Leave the terminal state so instances can be built again
    pub fn reset(&self) {
        self.quitting.store(false, Ordering::Release);
        for cell in self.all_slots() {
            cell.slot.lock().terminated = false;
        }
        debug!("Host singleton registry reset");
    }

    fn create<T: HostSingleton>(&self) -> PoolResult<Option<(Arc<T>, HostBinding)>> {
        let host = self.host.as_ref();
        let test_mode = host.is_test_mode();

        if !test_mode && !host.is_live() {
            debug!(singleton = type_name::<T>(), "Host is not live, refusing to build singleton");
            return Ok(None);
        }

        let mut existing = host.find_components(TypeId::of::<T>());
        if !existing.is_empty() {
            let winner = match T::POLICY {
                HostSingletonPolicy::Replaceable => existing.len() - 1,
                _ => 0,
            };
            let (node, component) = existing.swap_remove(winner);
            if T::POLICY != HostSingletonPolicy::Standard {
                self.destroy_duplicates::<T>(node);
                self.keep_across_teardown(node);
            }

            let instance = downcast_instance::<T>(component)?;
            instance.on_singleton_init();
            debug!(singleton = type_name::<T>(), node = node.raw(), "Adopted existing singleton");
            return Ok(Some((instance, HostBinding { node, adopted: true })));
        }

        let instance = Arc::new(self.constructors.construct::<T>()?);

        let node = match T::PLACEMENT_PATH {
            Some(path) => resolve_path(host, path, PathMode::Build { persistent_root: true })
                .unwrap_or_else(|| {
                    self.create_root(&format!("Singleton of {}", short_type_name::<T>()), test_mode)
                }),
            None => self.create_root(short_type_name::<T>(), test_mode),
        };

        host.attach_component(node, TypeId::of::<T>(), instance.clone());
        instance.on_singleton_init();

        debug!(singleton = type_name::<T>(), node = node.raw(), "Built host singleton");
        Ok(Some((instance, HostBinding { node, adopted: false })))
    }

    fn publish_adopted<T: HostSingleton>(
        &self,
        slot: &mut HostSlot,
        node: NodeId,
        component: Component,
    ) -> PoolResult<()> {
        let instance = downcast_instance::<T>(component)?;
        instance.on_singleton_init();
        let erased: Component = instance;
        slot.instance = Some(erased);
        slot.binding = Some(HostBinding { node, adopted: true });
        debug!(singleton = type_name::<T>(), node = node.raw(), "Adopted awakened singleton");
        Ok(())
    }

    /// Destroy the node of every instance of `T` except the one on `keep`
    fn destroy_duplicates<T: 'static>(&self, keep: NodeId) {
        for (node, _) in self.host.find_components(TypeId::of::<T>()) {
            if node != keep {
                self.host.destroy_node(node);
                debug!(singleton = type_name::<T>(), node = node.raw(), "Destroyed duplicate singleton");
            }
        }
    }

    fn keep_across_teardown(&self, node: NodeId) {
        if !self.host.is_test_mode() {
            self.host.mark_survives_teardown(node);
        }
    }

    /// Drop a published instance whose node no longer exists
    fn forget_if_orphaned<T: 'static>(&self, slot: &mut HostSlot) {
        if let Some(binding) = slot.binding
            && !self.host.contains(binding.node)
        {
            slot.instance = None;
            slot.binding = None;
            trace!(singleton = type_name::<T>(), node = binding.node.raw(), "Bound node destroyed, instance forgotten");
        }
    }

    fn create_root(&self, name: &str, test_mode: bool) -> NodeId {
        let node = self.host.create_node(name, None);
        if !test_mode {
            self.host.mark_survives_teardown(node);
        }
        node
    }

    fn slot<T: 'static>(&self) -> Arc<SlotCell> {
        Arc::clone(self.slots.entry(TypeId::of::<T>()).or_default().value())
    }

    fn existing_slot<T: 'static>(&self) -> Option<Arc<SlotCell>> {
        self.slots
            .get(&TypeId::of::<T>())
            .map(|entry| Arc::clone(entry.value()))
    }

    fn all_slots(&self) -> Vec<Arc<SlotCell>> {
        self.slots.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

/// `poolkit::audio::AudioManager<T>` becomes `AudioManager`
fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}
