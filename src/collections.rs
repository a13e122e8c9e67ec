//! Pools of empty collections
//!
//! Unbounded stacks of spare `Vec`s and `HashMap`s. Every container handed
//! out is empty; its spare capacity is what gets reused. Like the other
//! pools these are not synchronized; share one through a
//! [`SharedPool`](crate::SharedPool).

use crate::errors::PoolResult;
use crate::pool::Pool;

use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Initial capacity of a freshly built container
pub const INITIAL_CAPACITY: usize = 8;

/// Pool of spare `Vec<T>`s
///
/// # Examples
///
/// ```
/// use poolkit::{ListPool, ReleaseToPool};
///
/// let mut pool = ListPool::<u32>::new();
/// let mut ids = pool.get();
/// ids.extend([4, 8, 15]);
/// ids.release_to(&mut pool);
///
/// let reused = pool.get();
/// assert!(reused.is_empty());
/// assert!(reused.capacity() >= 3);
/// ```
pub struct ListPool<T> {
    stack: Vec<Vec<T>>,
}

impl<T> Default for ListPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ListPool<T> {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Pop a spare list, or build one with room for eight items
    pub fn get(&mut self) -> Vec<T> {
        self.stack
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY))
    }

    /// Clear `list` and keep it for the next [`get`](Self::get)
    pub fn release(&mut self, mut list: Vec<T>) {
        list.clear();
        self.stack.push(list);
        trace!(spare = self.stack.len(), "List released to pool");
    }

    /// Number of spare lists
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl<T> Pool<Vec<T>> for ListPool<T> {
    fn allocate(&mut self) -> PoolResult<Vec<T>> {
        Ok(self.get())
    }

    fn recycle(&mut self, list: Vec<T>) -> bool {
        self.release(list);
        true
    }
}

/// Pool of spare `HashMap<K, V>`s
pub struct MapPool<K, V> {
    stack: Vec<HashMap<K, V>>,
}

impl<K, V> Default for MapPool<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> MapPool<K, V> {
    pub fn new() -> Self {
        Self {
            stack: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    pub fn get(&mut self) -> HashMap<K, V> {
        self.stack
            .pop()
            .unwrap_or_else(|| HashMap::with_capacity(INITIAL_CAPACITY))
    }

    pub fn release(&mut self, mut map: HashMap<K, V>) {
        map.clear();
        self.stack.push(map);
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl<K, V> Pool<HashMap<K, V>> for MapPool<K, V> {
    fn allocate(&mut self) -> PoolResult<HashMap<K, V>> {
        Ok(self.get())
    }

    fn recycle(&mut self, map: HashMap<K, V>) -> bool {
        self.release(map);
        true
    }
}

/// Release a container into the pool it came from
pub trait ReleaseToPool: Sized {
    type Pool;

    fn release_to(self, pool: &mut Self::Pool);
}

impl<T> ReleaseToPool for Vec<T> {
    type Pool = ListPool<T>;

    fn release_to(self, pool: &mut ListPool<T>) {
        pool.release(self);
    }
}

impl<K: Eq + Hash, V> ReleaseToPool for HashMap<K, V> {
    type Pool = MapPool<K, V>;

    fn release_to(self, pool: &mut MapPool<K, V>) {
        pool.release(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::SharedPool;

    #[test]
    fn test_fresh_list_has_initial_capacity() {
        let mut pool = ListPool::<String>::new();
        let list = pool.get();
        assert!(list.is_empty());
        assert!(list.capacity() >= INITIAL_CAPACITY);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_released_list_comes_back_empty() {
        let mut pool = ListPool::new();
        let mut list = pool.get();
        list.extend(0..100);
        let capacity = list.capacity();

        pool.release(list);
        assert_eq!(pool.len(), 1);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert_eq!(reused.capacity(), capacity);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_lists_are_stacked() {
        let mut pool = ListPool::<u8>::new();
        pool.release(Vec::with_capacity(1));
        pool.release(Vec::with_capacity(512));

        assert!(pool.get().capacity() >= 512);
        assert!(pool.get().capacity() < 512);
    }

    #[test]
    fn test_map_pool_clears_on_release() {
        let mut pool = MapPool::<&str, u32>::new();
        let mut volumes = pool.get();
        volumes.insert("music", 80);
        volumes.insert("sfx", 100);
        volumes.release_to(&mut pool);

        let reused = pool.get();
        assert!(reused.is_empty());
        assert!(reused.capacity() >= 2);
    }

    #[test]
    fn test_release_to_extension() {
        let mut pool = ListPool::<char>::new();
        let mut letters = pool.get();
        letters.push('q');
        letters.release_to(&mut pool);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_shared_list_pool_guard_returns_empty_list() {
        let shared = SharedPool::new(ListPool::<u16>::new());
        {
            let mut list = shared.allocate_scoped::<Vec<u16>>().unwrap();
            list.extend([1, 2, 3]);
        }
        assert_eq!(shared.lock().len(), 1);
        assert!(shared.allocate::<Vec<u16>>().unwrap().is_empty());
    }
}
