//! Host hierarchy collaborator
//!
//! Host-bound singletons live on nodes of a hierarchy the host manages (a
//! scene graph, a resource tree). [`HostEnvironment`] is the small surface
//! the registry needs from it. [`MemoryHost`] implements it in memory.

use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Opaque handle to a host node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// A component attached to a host node
pub type Component = Arc<dyn Any + Send + Sync>;

/// What the host-bound singleton registry needs from its host
pub trait HostEnvironment: Send + Sync {
    /// Whether the host can currently hold live resources
    fn is_live(&self) -> bool;

    /// Test mode allows construction while not live and skips persistence
    fn is_test_mode(&self) -> bool;

    /// Find a direct child of `parent` (or a root when `None`) by name
    fn find_node(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId>;

    fn create_node(&self, name: &str, parent: Option<NodeId>) -> NodeId;

    fn parent_of(&self, node: NodeId) -> Option<NodeId>;

    /// Destroy a node together with its descendants and components
    fn destroy_node(&self, node: NodeId);

    /// Keep the node alive across normal environment transitions
    fn mark_survives_teardown(&self, node: NodeId);

    /// Whether `node` still exists
    fn contains(&self, node: NodeId) -> bool;

    /// Every attached component of the given type, oldest attachment first
    fn find_components(&self, type_id: TypeId) -> Vec<(NodeId, Component)>;

    /// Find the oldest attached component of the given type
    fn find_component(&self, type_id: TypeId) -> Option<(NodeId, Component)> {
        self.find_components(type_id).into_iter().next()
    }

    fn attach_component(&self, node: NodeId, type_id: TypeId, component: Component);

    fn find_or_create(&self, parent: Option<NodeId>, name: &str) -> NodeId {
        self.find_node(parent, name)
            .unwrap_or_else(|| self.create_node(name, parent))
    }
}

/// How [`resolve_path`] treats missing segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Missing segments end the lookup
    Find,
    /// Missing segments are created. A newly resolved root is marked as
    /// surviving teardown when `persistent_root` is set and the host is not
    /// in test mode.
    Build { persistent_root: bool },
}

/// Resolve a `/`-delimited path root-to-leaf
///
/// Empty segments are skipped; a path with no segments resolves to `None`.
///
/// # Examples
///
/// ```
/// use poolkit::{HostEnvironment, MemoryHost, PathMode, resolve_path};
///
/// let host = MemoryHost::new();
/// assert!(resolve_path(&host, "Managers/Audio", PathMode::Find).is_none());
///
/// let leaf = resolve_path(&host, "Managers/Audio", PathMode::Build { persistent_root: true }).unwrap();
/// let root = host.parent_of(leaf).unwrap();
/// assert!(host.is_persistent(root));
/// assert_eq!(resolve_path(&host, "/Managers/Audio", PathMode::Find), Some(leaf));
/// ```
pub fn resolve_path(host: &dyn HostEnvironment, path: &str, mode: PathMode) -> Option<NodeId> {
    let mut current: Option<NodeId> = None;

    for (index, name) in path.split('/').filter(|s| !s.is_empty()).enumerate() {
        let node = match (host.find_node(current, name), mode) {
            (Some(node), _) => node,
            (None, PathMode::Find) => return None,
            (None, PathMode::Build { .. }) => host.create_node(name, current),
        };

        if index == 0
            && matches!(mode, PathMode::Build { persistent_root: true })
            && !host.is_test_mode()
        {
            host.mark_survives_teardown(node);
        }

        current = Some(node);
    }

    current
}

struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    persistent: bool,
    // (type, component, attachment sequence)
    components: Vec<(TypeId, Component, u64)>,
}

#[derive(Default)]
struct HostState {
    nodes: BTreeMap<NodeId, NodeData>,
    next_id: u64,
    next_seq: u64,
}

/// In-memory [`HostEnvironment`]
///
/// Starts live and outside test mode.
pub struct MemoryHost {
    state: RwLock<HostState>,
    live: AtomicBool,
    test_mode: AtomicBool,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(HostState::default()),
            live: AtomicBool::new(true),
            test_mode: AtomicBool::new(false),
        }
    }

    /// A host in test mode that is not live
    pub fn for_tests() -> Self {
        let host = Self::new();
        host.set_live(false);
        host.set_test_mode(true);
        host
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    pub fn set_test_mode(&self, test_mode: bool) {
        self.test_mode.store(test_mode, Ordering::SeqCst);
    }

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn name_of(&self, node: NodeId) -> Option<String> {
        self.state.read().nodes.get(&node).map(|n| n.name.clone())
    }

    pub fn is_persistent(&self, node: NodeId) -> bool {
        self.state
            .read()
            .nodes
            .get(&node)
            .is_some_and(|n| n.persistent)
    }

    pub fn children_of(&self, node: NodeId) -> Vec<NodeId> {
        self.state
            .read()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn component_count(&self, node: NodeId) -> usize {
        self.state
            .read()
            .nodes
            .get(&node)
            .map_or(0, |n| n.components.len())
    }

    /// Look a path up without creating anything
    pub fn find_path(&self, path: &str) -> Option<NodeId> {
        resolve_path(self, path, PathMode::Find)
    }

    /// Attach an already built component, e.g. one placed by the host itself
    pub fn add_component<T: Any + Send + Sync>(&self, node: NodeId, component: Arc<T>) {
        self.attach_component(node, TypeId::of::<T>(), component);
    }
}

impl HostEnvironment for MemoryHost {
    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn is_test_mode(&self) -> bool {
        self.test_mode.load(Ordering::SeqCst)
    }

    fn find_node(&self, parent: Option<NodeId>, name: &str) -> Option<NodeId> {
        let state = self.state.read();
        match parent {
            Some(parent) => state.nodes.get(&parent)?.children.iter().copied().find(|child| {
                state.nodes.get(child).is_some_and(|n| n.name == name)
            }),
            None => state
                .nodes
                .iter()
                .find(|(_, n)| n.parent.is_none() && n.name == name)
                .map(|(id, _)| *id),
        }
    }

    fn create_node(&self, name: &str, parent: Option<NodeId>) -> NodeId {
        let mut state = self.state.write();
        state.next_id += 1;
        let id = NodeId(state.next_id);

        // A vanished parent leaves the new node at the root.
        let parent = parent.filter(|p| state.nodes.contains_key(p));
        if let Some(parent) = parent
            && let Some(parent_node) = state.nodes.get_mut(&parent)
        {
            parent_node.children.push(id);
        }

        state.nodes.insert(
            id,
            NodeData {
                name: name.to_string(),
                parent,
                children: Vec::new(),
                persistent: false,
                components: Vec::new(),
            },
        );
        id
    }

    fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        self.state.read().nodes.get(&node)?.parent
    }

    fn destroy_node(&self, node: NodeId) {
        let mut state = self.state.write();
        let Some(parent) = state.nodes.get(&node).map(|n| n.parent) else {
            return;
        };
        if let Some(parent) = parent
            && let Some(parent_node) = state.nodes.get_mut(&parent)
        {
            parent_node.children.retain(|child| *child != node);
        }

        let mut pending = vec![node];
        while let Some(id) = pending.pop() {
            if let Some(removed) = state.nodes.remove(&id) {
                pending.extend(removed.children);
            }
        }
    }

    fn mark_survives_teardown(&self, node: NodeId) {
        if let Some(n) = self.state.write().nodes.get_mut(&node) {
            n.persistent = true;
        }
    }

    fn contains(&self, node: NodeId) -> bool {
        self.state.read().nodes.contains_key(&node)
    }

    fn find_components(&self, type_id: TypeId) -> Vec<(NodeId, Component)> {
        let state = self.state.read();
        let mut found: Vec<(u64, NodeId, Component)> = state
            .nodes
            .iter()
            .flat_map(|(id, n)| {
                n.components
                    .iter()
                    .filter(move |(tid, _, _)| *tid == type_id)
                    .map(move |(_, component, seq)| (*seq, *id, Arc::clone(component)))
            })
            .collect();
        found.sort_by_key(|(seq, _, _)| *seq);
        found
            .into_iter()
            .map(|(_, id, component)| (id, component))
            .collect()
    }

    fn attach_component(&self, node: NodeId, type_id: TypeId, component: Component) {
        let mut state = self.state.write();
        state.next_seq += 1;
        let seq = state.next_seq;
        if let Some(n) = state.nodes.get_mut(&node) {
            n.components.push((type_id, component, seq));
        }
    }
}
