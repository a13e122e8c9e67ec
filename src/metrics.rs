//! Metrics collection and export for bounded pools

use std::collections::HashMap;

/// Metrics data for a pool
///
/// # Examples
///
/// ```
/// use poolkit::{Pool, SimpleObjectPool};
///
/// let mut pool = SimpleObjectPool::new(|| vec![0u8; 16]);
/// let buf = pool.allocate().unwrap();
/// assert!(pool.recycle(buf));
/// let _again = pool.allocate().unwrap();
///
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.total_reused, 1);
/// assert_eq!(metrics.total_recycled, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Objects built by the factory on a cache miss
    pub total_created: usize,

    /// Allocations served from the cache
    pub total_reused: usize,

    /// Recycles that stored the object
    pub total_recycled: usize,

    /// Recycles refused because the pool was at capacity
    pub dropped_at_capacity: usize,

    /// Recycles refused because the object was already in the pool
    pub double_recycles: usize,

    /// Cached objects discarded by a capacity decrease
    pub evicted: usize,

    /// Objects currently cached
    pub cached_objects: usize,

    /// Capacity bound (`0` = unbounded)
    pub max_cache_count: usize,

    /// Share of allocations served from the cache (0.0 to 1.0)
    pub hit_rate: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_recycled".to_string(), self.total_recycled.to_string());
        metrics.insert("dropped_at_capacity".to_string(), self.dropped_at_capacity.to_string());
        metrics.insert("double_recycles".to_string(), self.double_recycles.to_string());
        metrics.insert("evicted".to_string(), self.evicted.to_string());
        metrics.insert("cached_objects".to_string(), self.cached_objects.to_string());
        metrics.insert("max_cache_count".to_string(), self.max_cache_count.to_string());
        metrics.insert("hit_rate".to_string(), format!("{:.2}", self.hit_rate));
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use poolkit::SimpleObjectPool;
    /// use std::collections::HashMap;
    ///
    /// let pool = SimpleObjectPool::new(String::new);
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("subsystem".to_string(), "audio".to_string());
    ///
    /// let output = pool.export_metrics_prometheus("clip_names", Some(&tags));
    /// assert!(output.contains("poolkit_objects_cached"));
    /// assert!(output.contains("subsystem=\"audio\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP poolkit_objects_cached Objects currently cached\n");
        output.push_str("# TYPE poolkit_objects_cached gauge\n");
        output.push_str(&format!("poolkit_objects_cached{{{}}} {}\n", labels, metrics.cached_objects));

        output.push_str("# HELP poolkit_max_cache_count Capacity bound, 0 when unbounded\n");
        output.push_str("# TYPE poolkit_max_cache_count gauge\n");
        output.push_str(&format!("poolkit_max_cache_count{{{}}} {}\n", labels, metrics.max_cache_count));

        output.push_str("# HELP poolkit_hit_rate Share of allocations served from the cache\n");
        output.push_str("# TYPE poolkit_hit_rate gauge\n");
        output.push_str(&format!("poolkit_hit_rate{{{}}} {:.2}\n", labels, metrics.hit_rate));

        // Counter metrics
        output.push_str("# HELP poolkit_objects_created_total Objects built on a cache miss\n");
        output.push_str("# TYPE poolkit_objects_created_total counter\n");
        output.push_str(&format!("poolkit_objects_created_total{{{}}} {}\n", labels, metrics.total_created));

        output.push_str("# HELP poolkit_objects_reused_total Allocations served from the cache\n");
        output.push_str("# TYPE poolkit_objects_reused_total counter\n");
        output.push_str(&format!("poolkit_objects_reused_total{{{}}} {}\n", labels, metrics.total_reused));

        output.push_str("# HELP poolkit_objects_recycled_total Objects stored by recycle\n");
        output.push_str("# TYPE poolkit_objects_recycled_total counter\n");
        output.push_str(&format!("poolkit_objects_recycled_total{{{}}} {}\n", labels, metrics.total_recycled));

        output.push_str("# HELP poolkit_recycles_dropped_total Recycles refused at capacity\n");
        output.push_str("# TYPE poolkit_recycles_dropped_total counter\n");
        output.push_str(&format!("poolkit_recycles_dropped_total{{{}}} {}\n", labels, metrics.dropped_at_capacity));

        output.push_str("# HELP poolkit_double_recycles_total Recycles refused for objects already cached\n");
        output.push_str("# TYPE poolkit_double_recycles_total counter\n");
        output.push_str(&format!("poolkit_double_recycles_total{{{}}} {}\n", labels, metrics.double_recycles));

        output.push_str("# HELP poolkit_objects_evicted_total Objects discarded by capacity decreases\n");
        output.push_str("# TYPE poolkit_objects_evicted_total counter\n");
        output.push_str(&format!("poolkit_objects_evicted_total{{{}}} {}\n", labels, metrics.evicted));

        output
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", pool_name)];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, value));
            }
        }

        labels.join(",")
    }
}

/// Internal metrics tracker
///
/// Plain counters: pools are only ever mutated through `&mut self`.
#[derive(Debug, Default, Clone)]
pub(crate) struct MetricsTracker {
    pub created: usize,
    pub reused: usize,
    pub recycled: usize,
    pub dropped: usize,
    pub double_recycles: usize,
    pub evicted: usize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_metrics(&self, cached: usize, max_cache_count: usize) -> PoolMetrics {
        let allocations = self.created + self.reused;
        let hit_rate = if allocations > 0 {
            self.reused as f64 / allocations as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.created,
            total_reused: self.reused,
            total_recycled: self.recycled,
            dropped_at_capacity: self.dropped,
            double_recycles: self.double_recycles,
            evicted: self.evicted,
            cached_objects: cached,
            max_cache_count,
            hit_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let tracker = MetricsTracker {
            created: 1,
            reused: 3,
            ..MetricsTracker::new()
        };
        let metrics = tracker.get_metrics(2, 12);
        assert!((metrics.hit_rate - 0.75).abs() < f64::EPSILON);
        assert_eq!(metrics.export()["hit_rate"], "0.75");
    }

    #[test]
    fn test_prometheus_labels_are_sorted() {
        let metrics = MetricsTracker::new().get_metrics(0, 0);
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "a".to_string());

        let output = MetricsExporter::export_prometheus(&metrics, "p", Some(&tags));
        assert!(output.contains("poolkit_objects_cached{pool=\"p\",app=\"a\",zone=\"b\"} 0"));
        assert!(output.contains("poolkit_hit_rate{pool=\"p\",app=\"a\",zone=\"b\"} 0.00"));
    }
}
