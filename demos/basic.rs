//! Basic pool usage

use poolkit::{
    CustomObjectFactory, ListPool, ObjectFactoryExt, Pool, PoolConfiguration, Poolable,
    ReleaseToPool, SafeObjectPool, SimpleObjectPool,
};

#[derive(Default)]
struct Particle {
    position: (f32, f32),
    recycled: bool,
}

impl Poolable for Particle {
    fn on_recycled(&mut self) {
        self.position = (0.0, 0.0);
    }

    fn is_recycled(&self) -> bool {
        self.recycled
    }

    fn set_recycled(&mut self, recycled: bool) {
        self.recycled = recycled;
    }
}

fn main() {
    println!("=== poolkit - Basic Examples ===\n");

    // Example 1: Bounded pool
    bounded_pool();

    // Example 2: Pool with configuration and a custom factory
    configured_pool();

    // Example 3: Plain values with a reset action
    simple_pool();

    // Example 4: Collection pools
    collection_pools();
}

fn bounded_pool() {
    println!("1. Bounded Pool:");
    let mut pool = SafeObjectPool::<Particle>::new();
    pool.set_max_cache_count(2);

    let a = pool.allocate().unwrap();
    let b = pool.allocate().unwrap();
    let c = pool.allocate().unwrap();
    println!("   Recycled a: {}", pool.recycle(a));
    println!("   Recycled b: {}", pool.recycle(b));
    println!("   Recycled c: {} (pool full)", pool.recycle(c));
    println!("   Cached: {}\n", pool.cur_count());
}

fn configured_pool() {
    println!("2. Configured Pool:");

    let config = PoolConfiguration::new()
        .with_max_cache_count(16)
        .with_init_count(4);

    let factory = CustomObjectFactory::new(|| Particle {
        position: (1.0, 1.0),
        recycled: false,
    })
    .with_initial_action(|p: &mut Particle| p.position.1 = 5.0)
    .shared();

    let mut pool = SafeObjectPool::with_config(factory, config).unwrap();
    println!("   Pre-populated: {}", pool.cur_count());

    let particle = pool.allocate().unwrap();
    println!("   Particle reset on recycle: {:?}", particle.position);
    pool.recycle(particle);

    let metrics = pool.get_metrics();
    println!("   Created: {}, reused: {}", metrics.total_created, metrics.total_reused);
    println!("{}", pool.export_metrics_prometheus("particles", None));
}

fn simple_pool() {
    println!("3. Simple Pool:");
    let mut pool = SimpleObjectPool::new(String::new).with_reset(|s: &mut String| s.clear());

    let mut line = pool.allocate().unwrap();
    line.push_str("hello");
    pool.recycle(line);

    let line = pool.allocate().unwrap();
    println!("   Reused string is empty: {}\n", line.is_empty());
}

fn collection_pools() {
    println!("4. Collection Pools:");
    let mut pool = ListPool::<u32>::new();

    let mut ids = pool.get();
    ids.extend(1..=100);
    ids.release_to(&mut pool);

    let ids = pool.get();
    println!("   Reused list: len {}, capacity {}\n", ids.len(), ids.capacity());
}
