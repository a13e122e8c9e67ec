//! Types that own their pool
//!
//! A [`SelfPooled`] type keeps a process-wide [`SelfPoolCache`] of spare
//! instances and allocates through it. The cache lives in a `static`, so it
//! is mutex-guarded.

use parking_lot::Mutex;
use std::any::type_name;
use tracing::trace;

/// Bounded stack of spare instances (`0` = unbounded)
pub struct SelfPoolCache<T> {
    stack: Mutex<Vec<T>>,
    max_count: usize,
}

impl<T> SelfPoolCache<T> {
    pub const fn new(max_count: usize) -> Self {
        Self {
            stack: parking_lot::const_mutex(Vec::new()),
            max_count,
        }
    }

    pub fn max_count(&self) -> usize {
        self.max_count
    }

    /// Push `item` unless the cache is full
    pub fn push(&self, item: T) -> bool {
        let mut stack = self.stack.lock();
        if self.max_count > 0 && stack.len() >= self.max_count {
            return false;
        }
        stack.push(item);
        true
    }

    pub fn pop(&self) -> Option<T> {
        self.stack.lock().pop()
    }

    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached instance
    pub fn clear(&self) {
        self.stack.lock().clear();
    }
}

/// A type that allocates from and recycles into its own cache
///
/// Recycling the same value twice is impossible with owned values; types
/// that are shared handles must guard against it themselves.
///
/// # Examples
///
/// ```
/// use poolkit::{SelfPoolCache, SelfPooled};
///
/// #[derive(Default)]
/// struct Msg {
///     body: String,
///     in_pool: bool,
/// }
///
/// static MSG_CACHE: SelfPoolCache<Msg> = SelfPoolCache::new(32);
///
/// impl SelfPooled for Msg {
///     fn cache() -> &'static SelfPoolCache<Self> { &MSG_CACHE }
///     fn on_recycle(&mut self) { self.body.clear(); }
///     fn set_in_pool(&mut self, in_pool: bool) { self.in_pool = in_pool; }
/// }
///
/// let mut msg = Msg::allocate();
/// msg.body.push_str("hello");
/// assert!(msg.recycle_to_cache());
///
/// let msg = Msg::allocate();
/// assert!(msg.body.is_empty());
/// assert!(!msg.in_pool);
/// ```
pub trait SelfPooled: Sized + Default + Send + 'static {
    fn cache() -> &'static SelfPoolCache<Self>;

    /// Release what the instance holds before it is cached
    fn on_recycle(&mut self);

    fn set_in_pool(&mut self, in_pool: bool);

    /// Pop a cached instance or build a new one
    fn allocate() -> Self {
        let mut obj = Self::cache().pop().unwrap_or_else(|| {
            trace!(pool = type_name::<Self>(), "Self pool empty, building new instance");
            Self::default()
        });
        obj.set_in_pool(false);
        obj
    }

    /// Hand the instance back. Returns `false` if the cache is full.
    fn recycle_to_cache(mut self) -> bool {
        self.on_recycle();
        self.set_in_pool(true);
        Self::cache().push(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own type, since caches are process-wide.

    #[derive(Default)]
    struct Packet {
        payload: Vec<u8>,
        in_pool: bool,
    }

    static PACKET_CACHE: SelfPoolCache<Packet> = SelfPoolCache::new(0);

    impl SelfPooled for Packet {
        fn cache() -> &'static SelfPoolCache<Self> {
            &PACKET_CACHE
        }

        fn on_recycle(&mut self) {
            self.payload.clear();
        }

        fn set_in_pool(&mut self, in_pool: bool) {
            self.in_pool = in_pool;
        }
    }

    #[derive(Default)]
    struct Token {
        in_pool: bool,
    }

    static TOKEN_CACHE: SelfPoolCache<Token> = SelfPoolCache::new(2);

    impl SelfPooled for Token {
        fn cache() -> &'static SelfPoolCache<Self> {
            &TOKEN_CACHE
        }

        fn on_recycle(&mut self) {}

        fn set_in_pool(&mut self, in_pool: bool) {
            self.in_pool = in_pool;
        }
    }

    #[test]
    fn test_recycled_instance_is_reused() {
        let mut packet = Packet::allocate();
        packet.payload.extend_from_slice(&[1, 2, 3]);
        let capacity = packet.payload.capacity();

        assert!(packet.recycle_to_cache());
        assert_eq!(PACKET_CACHE.len(), 1);

        let packet = Packet::allocate();
        assert!(packet.payload.is_empty());
        assert_eq!(packet.payload.capacity(), capacity);
        assert!(!packet.in_pool);
        assert!(PACKET_CACHE.is_empty());
    }

    #[test]
    fn test_bounded_cache_refuses_overflow() {
        let tokens: Vec<Token> = (0..3).map(|_| Token::allocate()).collect();
        let kept: Vec<bool> = tokens.into_iter().map(Token::recycle_to_cache).collect();

        assert_eq!(kept, vec![true, true, false]);
        assert_eq!(TOKEN_CACHE.len(), 2);
        assert_eq!(TOKEN_CACHE.max_count(), 2);

        TOKEN_CACHE.clear();
        assert!(TOKEN_CACHE.is_empty());
    }
}
