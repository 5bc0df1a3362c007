//! Generic ordered, labeled tree backed by an [`indextree`] arena.
//!
//! Nodes are integer handles ([`NodeId`]) into the arena; all structural
//! links (parent, children, sibling order) live in the arena, so there are
//! no back-references or reference cycles. Trees are append-only: once a
//! node is attached its parent, depth, and sibling position never change,
//! which is what lets node and subtree hashes be memoized safely.

use core::cell::RefCell;
use core::fmt;

use indextree::{Arena, NodeId};
use rapidhash::RapidHashMap as HashMap;

/// FNV-1 32-bit offset basis.
const FNV_OFFSET: u32 = 0x811c_9dc5;
/// FNV-1 32-bit prime.
const FNV_PRIME: u32 = 0x0100_0193;

/// A 32-bit FNV-1 node or subtree hash.
///
/// Rendered as 8 lowercase hex digits on the wire (fingerprint fields).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHash(pub u32);

impl fmt::Display for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

impl fmt::LowerHex for NodeHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Streaming FNV-1 (multiply then xor) 32-bit hasher.
///
/// This is the reference hash for fingerprint values; adapters feed it the
/// canonical byte encoding of their node content.
#[derive(Debug, Clone)]
pub struct Fnv1Hasher {
    state: u32,
}

impl Default for Fnv1Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fnv1Hasher {
    /// Create a hasher seeded with the FNV offset basis.
    pub fn new() -> Self {
        Self { state: FNV_OFFSET }
    }

    /// Accumulate a byte slice.
    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = self.state.wrapping_mul(FNV_PRIME) ^ u32::from(b);
        }
    }

    /// Finish and return the accumulated hash.
    pub fn finish(&self) -> NodeHash {
        NodeHash(self.state)
    }
}

/// Node label type stored in a [`Tree`].
///
/// `hash_content` feeds the value's canonical byte encoding to the hasher;
/// document adapters encode whatever identifies a node (kind tag, qualified
/// name, sorted attributes, or text content) here.
pub trait TreeValue: Clone + Eq + fmt::Debug {
    /// Feed the canonical byte encoding of this value to `hasher`.
    fn hash_content(&self, hasher: &mut Fnv1Hasher);
}

impl TreeValue for &str {
    fn hash_content(&self, hasher: &mut Fnv1Hasher) {
        hasher.write(self.as_bytes());
    }
}

impl TreeValue for String {
    fn hash_content(&self, hasher: &mut Fnv1Hasher) {
        hasher.write(self.as_bytes());
    }
}

impl TreeValue for u64 {
    fn hash_content(&self, hasher: &mut Fnv1Hasher) {
        hasher.write(&self.to_be_bytes());
    }
}

/// Hash a single value with FNV-1.
pub fn hash_value<V: TreeValue>(value: &V) -> NodeHash {
    let mut hasher = Fnv1Hasher::new();
    value.hash_content(&mut hasher);
    hasher.finish()
}

/// Per-node payload: the comparable label plus cached structural facts.
#[derive(Debug, Clone)]
pub struct NodeData<V> {
    /// The node's comparable label.
    pub value: V,
    /// Distance from the root (root = 0). Set once at append time.
    pub depth: usize,
    /// Ordinal index among siblings. Set once at append time.
    pub position: usize,
}

/// An ordered, labeled tree over arena-allocated nodes.
pub struct Tree<V> {
    arena: Arena<NodeData<V>>,
    root: NodeId,
    node_hashes: RefCell<HashMap<NodeId, NodeHash>>,
    subtree_hashes: RefCell<HashMap<NodeId, NodeHash>>,
}

impl<V: fmt::Debug> fmt::Debug for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tree")
            .field("root", &self.root)
            .field("nodes", &self.arena.count())
            .finish()
    }
}

impl<V: TreeValue> Tree<V> {
    /// Create a tree containing only a root node.
    pub fn new(value: V) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(NodeData {
            value,
            depth: 0,
            position: 0,
        });
        Self {
            arena,
            root,
            node_hashes: RefCell::new(HashMap::default()),
            subtree_hashes: RefCell::new(HashMap::default()),
        }
    }

    /// Append a new last child under `parent`. Depth and sibling position
    /// are fixed here, exactly once.
    pub fn add_child(&mut self, parent: NodeId, value: V) -> NodeId {
        let depth = self.arena[parent].get().depth + 1;
        let position = parent.children(&self.arena).count();
        let child = self.arena.new_node(NodeData {
            value,
            depth,
            position,
        });
        parent.append(child, &mut self.arena);
        child
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Payload of `id`.
    pub fn get(&self, id: NodeId) -> &NodeData<V> {
        self.arena[id].get()
    }

    /// The node's label.
    pub fn value(&self, id: NodeId) -> &V {
        &self.arena[id].get().value
    }

    /// Distance from the root (root = 0).
    pub fn depth(&self, id: NodeId) -> usize {
        self.arena[id].get().depth
    }

    /// Depth of `id`, or `None` when the node is not part of this tree's
    /// arena.
    pub fn checked_depth(&self, id: NodeId) -> Option<usize> {
        self.arena.get(id).map(|n| n.get().depth)
    }

    /// Ordinal index among siblings.
    pub fn position(&self, id: NodeId) -> usize {
        self.arena[id].get().position
    }

    /// Parent of `id`, or `None` for the root.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena[id].parent()
    }

    /// Children of `id` in sibling order.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Number of children of `id`.
    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    /// Child of `id` at sibling index `index`.
    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        id.children(&self.arena).nth(index)
    }

    /// Whether `id` has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        id.children(&self.arena).next().is_none()
    }

    /// Preorder traversal of the subtree rooted at `id`, `id` included.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// Preorder traversal of the whole tree.
    pub fn preorder(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.root.descendants(&self.arena)
    }

    /// Leaves of the whole tree, in document order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.preorder().filter(|&id| self.is_leaf(id))
    }

    /// Number of nodes in the subtree rooted at `id`, `id` included.
    pub fn subtree_size(&self, id: NodeId) -> usize {
        id.descendants(&self.arena).count()
    }

    /// Total node count.
    pub fn node_count(&self) -> usize {
        self.arena.count()
    }

    /// Child-index path from the root down to `id` (empty for the root).
    pub fn path_of(&self, id: NodeId) -> Vec<usize> {
        let mut path: Vec<usize> = id
            .ancestors(&self.arena)
            .filter(|&a| a != self.root)
            .map(|a| self.arena[a].get().position)
            .collect();
        path.reverse();
        path
    }

    /// Walk a child-index path down from the root.
    pub fn node_at_path(&self, path: &[usize]) -> Option<NodeId> {
        let mut node = self.root;
        for &index in path {
            node = self.child_at(node, index)?;
        }
        Some(node)
    }

    /// FNV-1 hash of the node's own value. Memoized.
    pub fn node_hash(&self, id: NodeId) -> NodeHash {
        if let Some(&h) = self.node_hashes.borrow().get(&id) {
            return h;
        }
        let h = hash_value(&self.arena[id].get().value);
        self.node_hashes.borrow_mut().insert(id, h);
        h
    }

    /// FNV-1 hash of the concatenated node hashes of the subtree at `id`,
    /// in preorder. Memoized.
    pub fn subtree_hash(&self, id: NodeId) -> NodeHash {
        if let Some(&h) = self.subtree_hashes.borrow().get(&id) {
            return h;
        }
        let mut hasher = Fnv1Hasher::new();
        for node in id.descendants(&self.arena) {
            hasher.write(&self.node_hash(node).0.to_be_bytes());
        }
        let h = hasher.finish();
        self.subtree_hashes.borrow_mut().insert(id, h);
        h
    }

    /// Deep value snapshot of the subtree rooted at `id`.
    pub fn value_tree(&self, id: NodeId) -> ValueTree<V> {
        ValueTree {
            value: self.arena[id].get().value.clone(),
            children: self.children(id).map(|c| self.value_tree(c)).collect(),
        }
    }

    /// Shallow value snapshot of `id` (no children).
    pub fn value_of(&self, id: NodeId) -> ValueTree<V> {
        ValueTree::leaf(self.arena[id].get().value.clone())
    }
}

/// A standalone subtree snapshot, independent of any arena.
///
/// Operation payloads (removed and inserted content) use this form so a
/// delta document outlives the trees it was computed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueTree<V> {
    /// The node's label.
    pub value: V,
    /// Child subtrees in sibling order.
    pub children: Vec<ValueTree<V>>,
}

impl<V: TreeValue> ValueTree<V> {
    /// A childless snapshot.
    pub fn leaf(value: V) -> Self {
        Self {
            value,
            children: Vec::new(),
        }
    }

    /// A snapshot with the given children.
    pub fn with_children(value: V, children: Vec<ValueTree<V>>) -> Self {
        Self { value, children }
    }

    /// Number of nodes in this snapshot.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(ValueTree::node_count).sum::<usize>()
    }

    /// Value hashes of this snapshot in preorder.
    pub fn preorder_hashes(&self) -> Vec<NodeHash> {
        let mut out = Vec::with_capacity(self.node_count());
        self.collect_hashes(&mut out);
        out
    }

    fn collect_hashes(&self, out: &mut Vec<NodeHash>) {
        out.push(hash_value(&self.value));
        for child in &self.children {
            child.collect_hashes(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fnv1_reference_vectors() {
        // Empty input hashes to the offset basis.
        assert_eq!(Fnv1Hasher::new().finish(), NodeHash(0x811c_9dc5));
        // Classic single-byte vector for FNV-1 (not 1a).
        assert_eq!(hash_value(&"a"), NodeHash(0x050c_5d7e));
    }

    #[test]
    fn node_hash_renders_as_hex() {
        assert_eq!(NodeHash(0x050c_5d7e).to_string(), "050c5d7e");
        assert_eq!(format!("{:x}", NodeHash(0)), "00000000");
    }

    #[test]
    fn append_sets_depth_and_position_once() {
        let mut tree: Tree<&str> = Tree::new("root");
        let a = tree.add_child(tree.root(), "a");
        let b = tree.add_child(tree.root(), "b");
        let a1 = tree.add_child(a, "a1");

        assert_eq!(tree.depth(tree.root()), 0);
        assert_eq!(tree.depth(a), 1);
        assert_eq!(tree.depth(a1), 2);
        assert_eq!(tree.position(a), 0);
        assert_eq!(tree.position(b), 1);
        assert_eq!(tree.position(a1), 0);
        assert_eq!(tree.parent(a1), Some(a));
        assert_eq!(tree.parent(tree.root()), None);
    }

    #[test]
    fn paths_round_trip() {
        let mut tree: Tree<&str> = Tree::new("root");
        let a = tree.add_child(tree.root(), "a");
        let b = tree.add_child(tree.root(), "b");
        let b0 = tree.add_child(b, "b0");
        let b1 = tree.add_child(b, "b1");

        assert_eq!(tree.path_of(tree.root()), Vec::<usize>::new());
        assert_eq!(tree.path_of(a), vec![0]);
        assert_eq!(tree.path_of(b1), vec![1, 1]);
        assert_eq!(tree.node_at_path(&[1, 0]), Some(b0));
        assert_eq!(tree.node_at_path(&[1, 1]), Some(b1));
        assert_eq!(tree.node_at_path(&[2]), None);
        assert_eq!(tree.node_at_path(&[1, 0, 0]), None);
    }

    #[test]
    fn subtree_hash_covers_descendants() {
        let mut tree: Tree<&str> = Tree::new("root");
        let a = tree.add_child(tree.root(), "a");
        tree.add_child(a, "x");

        let mut other: Tree<&str> = Tree::new("root");
        let oa = other.add_child(other.root(), "a");
        other.add_child(oa, "y");

        // Same node value, different descendants: node hashes agree,
        // subtree hashes differ.
        assert_eq!(tree.node_hash(a), other.node_hash(oa));
        assert_ne!(tree.subtree_hash(a), other.subtree_hash(oa));
        assert_ne!(tree.subtree_hash(tree.root()), other.subtree_hash(other.root()));

        // Memoized result is stable across calls.
        assert_eq!(tree.subtree_hash(a), tree.subtree_hash(a));
    }

    #[test]
    fn value_tree_snapshots() {
        let mut tree: Tree<&str> = Tree::new("root");
        let a = tree.add_child(tree.root(), "a");
        tree.add_child(a, "x");
        tree.add_child(a, "y");

        let deep = tree.value_tree(a);
        assert_eq!(deep.value, "a");
        assert_eq!(deep.children.len(), 2);
        assert_eq!(deep.node_count(), 3);

        let shallow = tree.value_of(a);
        assert!(shallow.children.is_empty());

        let hashes = deep.preorder_hashes();
        assert_eq!(hashes.len(), 3);
        assert_eq!(hashes[0], hash_value(&"a"));
        assert_eq!(hashes[1], hash_value(&"x"));
    }

    #[test]
    fn traversal_orders() {
        let mut tree: Tree<&str> = Tree::new("r");
        let a = tree.add_child(tree.root(), "a");
        let a0 = tree.add_child(a, "a0");
        let b = tree.add_child(tree.root(), "b");

        let pre: Vec<_> = tree.preorder().collect();
        assert_eq!(pre, vec![tree.root(), a, a0, b]);

        let leaves: Vec<_> = tree.leaves().collect();
        assert_eq!(leaves, vec![a0, b]);

        assert_eq!(tree.subtree_size(a), 2);
        assert_eq!(tree.subtree_size(tree.root()), 4);
        assert_eq!(tree.node_count(), 4);
    }
}
