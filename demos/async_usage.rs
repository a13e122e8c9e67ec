//! Async usage examples

use poolkit::{Context, MemoryHost, Singleton};
use std::sync::Arc;
use std::time::Duration;

struct AssetCache {
    entries: usize,
}

impl Singleton for AssetCache {
    fn on_singleton_init(&self) {
        println!("   AssetCache ready with {} entries", self.entries);
    }
}

#[tokio::main]
async fn main() {
    println!("=== poolkit - Async Examples ===\n");

    let context = Arc::new(Context::with_host(Arc::new(MemoryHost::new())));
    context.constructors().register(|| {
        // Simulates slow loading; runs on the blocking pool.
        std::thread::sleep(Duration::from_millis(50));
        AssetCache { entries: 128 }
    });

    // Example 1: Async singleton access
    async_instance(&context).await;

    // Example 2: Concurrent first access
    concurrent_access(&context).await;

    // Example 3: Teardown
    teardown(&context).await;
}

async fn async_instance(context: &Arc<Context>) {
    println!("1. Async Instance:");
    let cache = context.instance_async::<AssetCache>().await.unwrap();
    println!("   Got cache with {} entries\n", cache.entries);
}

async fn concurrent_access(context: &Arc<Context>) {
    println!("2. Concurrent Access:");
    context.singletons().dispose::<AssetCache>();

    let mut handles = vec![];
    for i in 0..5 {
        let context = Arc::clone(context);
        handles.push(tokio::spawn(async move {
            let cache = context.instance_async::<AssetCache>().await.unwrap();
            println!("   Task {} sees {} entries", i, cache.entries);
            cache
        }));
    }

    let mut caches = vec![];
    for handle in handles {
        caches.push(handle.await.unwrap());
    }
    let shared = caches.iter().all(|c| Arc::ptr_eq(c, &caches[0]));
    println!("   All tasks share one instance: {}\n", shared);
}

async fn teardown(context: &Arc<Context>) {
    println!("3. Teardown:");
    context.teardown().subscribe(|| println!("   Teardown listener ran"));
    context.shutdown();
    println!("   Teardown fired: {}\n", context.teardown().is_fired());
}
