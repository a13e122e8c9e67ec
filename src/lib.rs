//! # poolkit
//!
//! Object lifecycle reuse: bounded pools, pluggable object factories and a
//! lazy singleton registry with plain and host-bound variants.
//!
//! ## Features
//!
//! - Bounded LIFO pools with double-recycle protection
//! - Default, custom, initializing and hidden-constructor factories
//! - Pools of empty `Vec`s and `HashMap`s
//! - Types that own their pool
//! - Exactly-once lazy singletons, safe under concurrent first access
//! - Singletons bound to nodes of a host hierarchy, torn down with the host
//! - Persistent (first wins) and replaceable (newest wins) host singletons
//! - Pool metrics with Prometheus text export
//!
//! ## Quick Start
//!
//! ```rust
//! use poolkit::{Pool, SimpleObjectPool};
//!
//! let mut pool = SimpleObjectPool::new(|| Vec::<u8>::with_capacity(1024))
//!     .with_reset(|buf: &mut Vec<u8>| buf.clear());
//!
//! let mut buf = pool.allocate().unwrap();
//! buf.extend_from_slice(b"frame");
//! assert!(pool.recycle(buf));
//!
//! // The same buffer comes back, emptied.
//! assert!(pool.allocate().unwrap().is_empty());
//! ```

mod collections;
mod config;
mod constructor;
mod context;
mod errors;
mod factory;
mod host;
mod host_singleton;
mod metrics;
mod pool;
mod self_pool;
mod singleton;
mod teardown;

pub use collections::{INITIAL_CAPACITY, ListPool, MapPool, ReleaseToPool};
pub use config::{DEFAULT_MAX_CACHE_COUNT, PoolConfiguration};
pub use constructor::{Constructor, ConstructorLocator};
pub use context::{
    Context, SharedListPool, SharedMapPool, SharedNonPublicPool, SharedSafePool, global, init_global,
    shutdown_global,
};
pub use errors::{PoolError, PoolResult};
pub use factory::{
    CustomObjectFactory, DefaultObjectFactory, InitializingFactory, NonPublicObjectFactory,
    ObjectFactory, ObjectFactoryExt,
};
pub use host::{Component, HostEnvironment, MemoryHost, NodeId, PathMode, resolve_path};
pub use host_singleton::{HostBinding, HostSingleton, HostSingletonPolicy, HostSingletonRegistry};
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{NonPublicObjectPool, Pool, Poolable, PooledObject, SafeObjectPool, SharedPool, SimpleObjectPool};
pub use self_pool::{SelfPoolCache, SelfPooled};
pub use singleton::{Singleton, SingletonRegistry, SingletonState};
pub use teardown::TeardownSignal;
