//! Pool configuration options

/// Default capacity of a bounded pool when none is given.
pub const DEFAULT_MAX_CACHE_COUNT: usize = 12;

/// Configuration for bounded pool behavior
///
/// A `max_cache_count` of `0` means the pool is unbounded.
///
/// # Examples
///
/// ```
/// use poolkit::PoolConfiguration;
///
/// let config = PoolConfiguration::new()
///     .with_max_cache_count(20)
///     .with_init_count(5);
///
/// assert_eq!(config.max_cache_count, 20);
/// assert_eq!(config.init_count, 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolConfiguration {
    /// Maximum number of cached objects (`0` = unbounded)
    pub max_cache_count: usize,

    /// Number of objects to pre-create when the pool is built
    pub init_count: usize,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            max_cache_count: DEFAULT_MAX_CACHE_COUNT,
            init_count: 0,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum cache count
    pub fn with_max_cache_count(mut self, count: usize) -> Self {
        self.max_cache_count = count;
        self
    }

    /// Remove the capacity bound
    pub fn unbounded(mut self) -> Self {
        self.max_cache_count = 0;
        self
    }

    /// Set the number of objects created up front
    pub fn with_init_count(mut self, count: usize) -> Self {
        self.init_count = count;
        self
    }

    /// Whether the pool enforces a capacity
    pub fn is_bounded(&self) -> bool {
        self.max_cache_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PoolConfiguration::default();
        assert_eq!(config.max_cache_count, 12);
        assert_eq!(config.init_count, 0);
        assert!(config.is_bounded());
    }

    #[test]
    fn test_unbounded() {
        let config = PoolConfiguration::new().with_max_cache_count(3).unbounded();
        assert!(!config.is_bounded());
    }
}
