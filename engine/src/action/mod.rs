//! Action nodes: the recursive tree of resolvable effects.
//!
//! Nodes live in an arena indexed by opaque ids; parent/child adjacency is
//! kept alongside the node slots. Dot-joined UUID strings are derived only
//! at the interface boundary (see `path`), never used as identity here.

pub mod resolve;

use serde::{Deserialize, Serialize};

use crate::damage::DamageComponent;
use crate::path::OwnerRef;

/// Opaque arena index. Stable for the lifetime of the arena; removed nodes
/// leave tombstones so ids are never reused within one arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Common,
    Attack,
    Damage,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum TargetPolicy {
    Single,
    Custom { min: u32, max: u32 },
    All,
}

impl Default for TargetPolicy {
    fn default() -> Self {
        Self::Single
    }
}

impl TargetPolicy {
    /// Selection limit for interactive targeting; None is unbounded.
    pub fn allowed(&self) -> Option<usize> {
        match self {
            TargetPolicy::Single => Some(1),
            TargetPolicy::Custom { max, .. } => Some(*max as usize),
            TargetPolicy::All => None,
        }
    }

    /// Smallest selection that may be confirmed; None leaves the floor at
    /// whatever is selected, including nothing.
    pub fn required(&self) -> Option<usize> {
        match self {
            TargetPolicy::Custom { min, .. } => Some(*min as usize),
            TargetPolicy::Single | TargetPolicy::All => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceCost {
    pub kind: String,
    pub value: i32,
}

/// Area template descriptor; placement itself is delegated to an external
/// spatial tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaTemplate {
    pub shape: String,
    pub size: f64,
}

fn default_defence() -> String {
    "reflex".to_string()
}

fn default_range() -> (f64, f64) {
    (0.0, 5.0)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionData {
    /// Persisted id segment used in UUID paths.
    pub segment: String,
    pub name: String,
    pub kind: ActionKind,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub bonus: i32,
    #[serde(default = "default_defence")]
    pub defence: String,
    #[serde(default)]
    pub target_policy: TargetPolicy,
    #[serde(default = "default_range")]
    pub range: (f64, f64),
    #[serde(default)]
    pub cost: Option<ResourceCost>,
    /// Whether this node still fires along a failed ancestor branch.
    #[serde(default)]
    pub use_on_fail: bool,
    #[serde(default)]
    pub damage: Vec<DamageComponent>,
    #[serde(default)]
    pub template: Option<AreaTemplate>,
}

/// Persisted tree form, as stored on items. Flattened into the arena on
/// load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTree {
    #[serde(flatten)]
    pub data: ActionData,
    #[serde(default)]
    pub children: Vec<ActionTree>,
}

#[derive(Debug, Clone)]
pub struct ActionArena {
    owner: OwnerRef,
    nodes: Vec<Option<ActionData>>,
    children: Vec<Vec<ActionId>>,
    parents: Vec<Option<ActionId>>,
    roots: Vec<ActionId>,
}

impl ActionArena {
    pub fn new(owner: OwnerRef) -> Self {
        Self {
            owner,
            nodes: Vec::new(),
            children: Vec::new(),
            parents: Vec::new(),
            roots: Vec::new(),
        }
    }

    /// Flatten persisted trees into a fresh arena.
    pub fn from_trees(owner: OwnerRef, trees: Vec<ActionTree>) -> Self {
        let mut arena = Self::new(owner);
        for tree in trees {
            let root = arena.add_root(tree.data);
            arena.add_subtrees(root, tree.children);
        }
        arena
    }

    fn add_subtrees(&mut self, parent: ActionId, trees: Vec<ActionTree>) {
        for tree in trees {
            let id = self.add_child(parent, tree.data);
            self.add_subtrees(id, tree.children);
        }
    }

    fn alloc(&mut self, data: ActionData, parent: Option<ActionId>) -> ActionId {
        let id = ActionId(self.nodes.len());
        self.nodes.push(Some(data));
        self.children.push(Vec::new());
        self.parents.push(parent);
        id
    }

    pub fn add_root(&mut self, data: ActionData) -> ActionId {
        let id = self.alloc(data, None);
        self.roots.push(id);
        id
    }

    pub fn add_child(&mut self, parent: ActionId, data: ActionData) -> ActionId {
        let id = self.alloc(data, Some(parent));
        self.children[parent.0].push(id);
        id
    }

    /// Remove a node and its whole subtree, detaching it from its parent.
    pub fn remove(&mut self, id: ActionId) {
        match self.parents[id.0] {
            Some(parent) => self.children[parent.0].retain(|&c| c != id),
            None => self.roots.retain(|&r| r != id),
        }
        self.remove_subtree(id);
    }

    fn remove_subtree(&mut self, id: ActionId) {
        for child in std::mem::take(&mut self.children[id.0]) {
            self.remove_subtree(child);
        }
        self.nodes[id.0] = None;
        self.parents[id.0] = None;
    }

    pub fn get(&self, id: ActionId) -> Option<&ActionData> {
        self.nodes.get(id.0).and_then(|slot| slot.as_ref())
    }

    pub fn get_mut(&mut self, id: ActionId) -> Option<&mut ActionData> {
        self.nodes.get_mut(id.0).and_then(|slot| slot.as_mut())
    }

    pub fn children(&self, id: ActionId) -> &[ActionId] {
        &self.children[id.0]
    }

    pub fn parent(&self, id: ActionId) -> Option<ActionId> {
        self.parents.get(id.0).copied().flatten()
    }

    pub fn roots(&self) -> &[ActionId] {
        &self.roots
    }

    pub fn owner(&self) -> &OwnerRef {
        &self.owner
    }

    /// Segments from the root ancestor down to this node. None for removed
    /// nodes.
    pub fn path_segments(&self, id: ActionId) -> Option<Vec<&str>> {
        let mut segments = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            let data = self.get(node_id)?;
            segments.push(data.segment.as_str());
            current = self.parent(node_id);
        }
        segments.reverse();
        Some(segments)
    }
}
