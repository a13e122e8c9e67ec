// poolkit demo binary
// Run the demos with: cargo run --example basic

use poolkit::{Context, HostSingleton, MemoryHost, Pool, Poolable, Singleton};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Bullet {
    speed: f32,
    recycled: bool,
}

impl Poolable for Bullet {
    fn on_recycled(&mut self) {
        self.speed = 0.0;
    }

    fn is_recycled(&self) -> bool {
        self.recycled
    }

    fn set_recycled(&mut self, recycled: bool) {
        self.recycled = recycled;
    }
}

#[derive(Default)]
struct AudioManager;

impl Singleton for AudioManager {}

impl HostSingleton for AudioManager {
    const PLACEMENT_PATH: Option<&'static str> = Some("QFramework/AudioKit");
}

fn main() -> poolkit::PoolResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== poolkit ===");
    println!("Run: cargo run --example basic");
    println!();

    let host = Arc::new(MemoryHost::new());
    let context = Context::with_host(host.clone());
    context.constructors().register_default::<AudioManager>();

    let bullets = context.safe_pool::<Bullet>()?;
    bullets.lock().init(8, 4)?;
    {
        let mut bullet = bullets.allocate_scoped::<Bullet>()?;
        bullet.speed = 12.5;
        println!("  Fired bullet at {}", bullet.speed);
    }
    println!("  Bullets cached: {}", bullets.lock().cur_count());

    let first = bullets.allocate::<Bullet>()?;
    let mut pool = bullets.lock();
    pool.recycle(first);
    println!("  Pool metrics: {:?}", pool.get_metrics());
    drop(pool);

    if context.host_instance::<AudioManager>()?.is_some() {
        println!("  AudioManager lives on node {:?}", host.find_path("QFramework/AudioKit"));
    }

    context.shutdown();
    println!(
        "  After shutdown: {}",
        context.host_instance::<AudioManager>()?.map_or("no instance", |_| "instance")
    );
    Ok(())
}
