//! Secondary lookup structures over a built tree.
//!
//! [`DocumentOrderIndex`] answers preorder ("document order") offset
//! queries; [`GenerationIndex`] answers same-depth offset queries. Both are
//! pure lookup tables, rebuildable from a tree in O(n), with no diffing
//! logic. Queries distinguish three outcomes: a node (`Ok(Some)`), out of
//! bounds (`Ok(None)`, the null sentinel), and misuse of the index itself
//! (`Err`), which is never papered over with a partial answer.

use indextree::NodeId;
use rapidhash::RapidHashMap as HashMap;
use thiserror::Error;

use crate::tree::{Tree, TreeValue};

/// Misuse of an index: these are hard failures, not lookup misses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    /// The queried region of the index has not been built yet.
    #[error("index not built for the queried region")]
    NotBuilt,
    /// The reference node does not belong to the indexed tree.
    #[error("reference node is not part of the indexed tree")]
    ForeignNode,
}

/// Random access over a tree's preorder sequence.
#[derive(Debug, Default)]
pub struct DocumentOrderIndex {
    order: Vec<NodeId>,
    pos: HashMap<NodeId, usize>,
    sizes: HashMap<NodeId, usize>,
    built: bool,
}

impl DocumentOrderIndex {
    /// An empty, unbuilt index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index over `tree` in one pass.
    pub fn from_tree<V: TreeValue>(tree: &Tree<V>) -> Self {
        let mut index = Self::new();
        index.build(tree);
        index
    }

    /// (Re)build the index from `tree` in O(n).
    pub fn build<V: TreeValue>(&mut self, tree: &Tree<V>) {
        self.order.clear();
        self.pos.clear();
        self.sizes.clear();
        self.measure(tree, tree.root());
        self.built = true;
    }

    fn measure<V: TreeValue>(&mut self, tree: &Tree<V>, id: NodeId) -> usize {
        self.pos.insert(id, self.order.len());
        self.order.push(id);
        let mut size = 1;
        for child in tree.children(id) {
            size += self.measure(tree, child);
        }
        self.sizes.insert(id, size);
        size
    }

    /// Number of indexed nodes.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether the index holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Preorder position of `reference`.
    pub fn position(&self, reference: NodeId) -> Result<usize, IndexError> {
        if !self.built {
            return Err(IndexError::NotBuilt);
        }
        self.pos.get(&reference).copied().ok_or(IndexError::ForeignNode)
    }

    /// Node at absolute preorder position `pos`, or `None` out of bounds.
    pub fn at(&self, pos: isize) -> Option<NodeId> {
        if pos < 0 {
            return None;
        }
        self.order.get(pos as usize).copied()
    }

    /// The node `offset` positions away from `reference` in preorder.
    pub fn get(&self, reference: NodeId, offset: isize) -> Result<Option<NodeId>, IndexError> {
        let base = self.position(reference)? as isize;
        Ok(self.at(base + offset))
    }

    /// The node immediately following the entire subtree rooted at
    /// `reference`, or `None` if the subtree runs to the end.
    pub fn skip(&self, reference: NodeId) -> Result<Option<NodeId>, IndexError> {
        let base = self.position(reference)?;
        let size = self.sizes[&reference];
        Ok(self.at((base + size) as isize))
    }

    /// Number of nodes in the subtree rooted at `reference`.
    pub fn subtree_size(&self, reference: NodeId) -> Result<usize, IndexError> {
        if !self.built {
            return Err(IndexError::NotBuilt);
        }
        self.sizes.get(&reference).copied().ok_or(IndexError::ForeignNode)
    }
}

/// Random access within the set of nodes at one depth ("generation").
///
/// Generations are built lazily: querying a depth that was never built is
/// an [`IndexError::NotBuilt`], deliberately distinct from an in-bounds
/// miss, so callers cannot mistake an unbuilt index for an empty one.
#[derive(Debug, Default)]
pub struct GenerationIndex {
    generations: Vec<Vec<NodeId>>,
    built: Vec<bool>,
    /// node -> (depth, position within its generation)
    pos: HashMap<NodeId, (usize, usize)>,
}

impl GenerationIndex {
    /// An empty index with no generations built.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the generation at `depth` from `tree` (idempotent).
    pub fn build_generation<V: TreeValue>(&mut self, tree: &Tree<V>, depth: usize) {
        if depth < self.built.len() && self.built[depth] {
            return;
        }
        if depth >= self.generations.len() {
            self.generations.resize_with(depth + 1, Vec::new);
            self.built.resize(depth + 1, false);
        }
        let generation: Vec<NodeId> = tree
            .preorder()
            .filter(|&id| tree.depth(id) == depth)
            .collect();
        for (i, &id) in generation.iter().enumerate() {
            self.pos.insert(id, (depth, i));
        }
        self.generations[depth] = generation;
        self.built[depth] = true;
    }

    /// Whether the generation at `depth` has been built.
    pub fn is_built(&self, depth: usize) -> bool {
        depth < self.built.len() && self.built[depth]
    }

    /// Nodes at `depth`, in document order.
    pub fn generation(&self, depth: usize) -> Result<&[NodeId], IndexError> {
        if !self.is_built(depth) {
            return Err(IndexError::NotBuilt);
        }
        Ok(&self.generations[depth])
    }

    /// The node `offset` positions away from `reference` within its own
    /// generation, or `None` when the offset leaves the generation.
    ///
    /// A reference whose generation exists in `tree` but was never built
    /// is [`IndexError::NotBuilt`] (build it first); a reference outside
    /// `tree` is [`IndexError::ForeignNode`].
    pub fn get<V: TreeValue>(
        &self,
        tree: &Tree<V>,
        reference: NodeId,
        offset: isize,
    ) -> Result<Option<NodeId>, IndexError> {
        if let Some(&(depth, base)) = self.pos.get(&reference) {
            let target = base as isize + offset;
            if target < 0 {
                return Ok(None);
            }
            return Ok(self.generations[depth].get(target as usize).copied());
        }
        match tree.checked_depth(reference) {
            Some(depth) if !self.is_built(depth) => Err(IndexError::NotBuilt),
            _ => Err(IndexError::ForeignNode),
        }
    }
}
