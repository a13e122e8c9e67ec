//! Plain and host-bound singletons

use poolkit::{
    Context, HostEnvironment, HostSingleton, HostSingletonPolicy, MemoryHost, Singleton, SingletonState,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

mod audio {
    use std::sync::atomic::AtomicU32;

    /// Only reachable through the context's constructor locator.
    pub struct AudioManager {
        pub volume: AtomicU32,
    }

    impl AudioManager {
        fn new() -> Self {
            Self {
                volume: AtomicU32::new(80),
            }
        }

        pub fn install(locator: &poolkit::ConstructorLocator) {
            locator.register(Self::new);
        }
    }
}

use audio::AudioManager;

impl Singleton for AudioManager {
    fn on_singleton_init(&self) {
        println!("   AudioManager initialized");
    }
}

impl HostSingleton for AudioManager {
    const PLACEMENT_PATH: Option<&'static str> = Some("QFramework/AudioKit");
}

#[derive(Default)]
struct GameClock {
    ticks: AtomicU32,
}

impl Singleton for GameClock {}
impl HostSingleton for GameClock {}

/// Each loaded level brings its own; the newest one wins.
struct LevelMusic {
    track: &'static str,
}

impl Singleton for LevelMusic {}

impl HostSingleton for LevelMusic {
    const POLICY: HostSingletonPolicy = HostSingletonPolicy::Replaceable;
}

fn main() {
    println!("=== poolkit - Singleton Examples ===\n");

    let host = Arc::new(MemoryHost::new());
    let context = Context::with_host(host.clone());
    AudioManager::install(context.constructors());
    context.constructors().register_default::<GameClock>();

    // Example 1: Plain singleton
    plain_singleton(&context);

    // Example 2: Host-bound singleton with a placement path
    host_singleton(&context, &host);

    // Example 3: Replaceable singleton placed by the host
    replaceable_singleton(&context, &host);

    // Example 4: Teardown
    teardown(&context);
}

fn plain_singleton(context: &Context) {
    println!("1. Plain Singleton:");
    let clock = context.instance::<GameClock>().unwrap();
    clock.ticks.fetch_add(1, Ordering::SeqCst);

    let again = context.instance::<GameClock>().unwrap();
    println!("   Same instance: {}", Arc::ptr_eq(&clock, &again));
    println!("   Ticks: {}\n", again.ticks.load(Ordering::SeqCst));
}

fn host_singleton(context: &Context, host: &MemoryHost) {
    println!("2. Host Singleton:");
    let audio = context.host_instance::<AudioManager>().unwrap().unwrap();
    println!("   Volume: {}", audio.volume.load(Ordering::SeqCst));

    let node = host.find_path("QFramework/AudioKit").unwrap();
    println!("   Bound to {:?} ({:?})", node, host.name_of(node));
    if let Some(root) = host.find_path("QFramework") {
        println!("   Root survives teardown: {}\n", host.is_persistent(root));
    }
}

fn replaceable_singleton(context: &Context, host: &MemoryHost) {
    println!("3. Replaceable Singleton:");
    let registry = context.host_singletons().unwrap();

    for (level, track) in [("Forest", "forest.ogg"), ("Castle", "castle.ogg")] {
        let node = host.create_node(level, None);
        host.add_component(node, Arc::new(LevelMusic { track }));
        registry.on_instance_awake::<LevelMusic>(node).unwrap();
    }

    let music = context.host_instance::<LevelMusic>().unwrap().unwrap();
    println!("   Playing: {}", music.track);
    println!("   Forest node left: {}\n", host.find_path("Forest").is_some());
}

fn teardown(context: &Context) {
    println!("4. Teardown:");
    context.shutdown();

    if let Some(registry) = context.host_singletons() {
        let state = registry.state::<AudioManager>();
        println!("   AudioManager state: {:?}", state);
        assert_eq!(state, SingletonState::Terminated);
    }
    let after = context.host_instance::<AudioManager>().unwrap();
    println!("   Instance after teardown: {}\n", after.is_some());
}
