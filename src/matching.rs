//! Partial node-to-node matching between two trees.
//!
//! The matching is a symmetric, functional, partial relation: every node
//! has at most one partner, and partnering is write-once. It is stored as
//! a side table keyed by arena index, not as a property injected into the
//! nodes themselves, so trees stay immutable during diffing.

use indextree::NodeId;
use thiserror::Error;

use crate::tracing_macros::trace;
use crate::tree::{Tree, TreeValue};

/// Violations of the matching contract.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatchingError {
    /// `put` was called on a node that already has a partner.
    #[error("node already has a partner")]
    AlreadyMatched,
}

/// A bidirectional partial mapping between nodes of tree A and tree B.
///
/// Uses `Vec<Option<NodeId>>` side tables indexed by `usize::from(NodeId)`
/// for O(1) lookups, plus a pair list for iteration.
#[derive(Debug, Default)]
pub struct Matching {
    a_to_b: Vec<Option<NodeId>>,
    b_to_a: Vec<Option<NodeId>>,
    pairs: Vec<(NodeId, NodeId)>,
}

impl Matching {
    /// Create an empty matching.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a matching with preallocated side tables.
    pub fn with_capacity(max_a: usize, max_b: usize) -> Self {
        Self {
            a_to_b: vec![None; max_a],
            b_to_a: vec![None; max_b],
            pairs: Vec::new(),
        }
    }

    /// Associate `a` (tree A) with `b` (tree B).
    ///
    /// Fails if either node already holds a partner; an established pair is
    /// never overwritten.
    pub fn put(&mut self, a: NodeId, b: NodeId) -> Result<(), MatchingError> {
        if self.get_b(a).is_some() || self.get_a(b).is_some() {
            return Err(MatchingError::AlreadyMatched);
        }
        let a_idx = usize::from(a);
        let b_idx = usize::from(b);
        if a_idx >= self.a_to_b.len() {
            self.a_to_b.resize(a_idx + 1, None);
        }
        if b_idx >= self.b_to_a.len() {
            self.b_to_a.resize(b_idx + 1, None);
        }
        self.a_to_b[a_idx] = Some(b);
        self.b_to_a[b_idx] = Some(a);
        self.pairs.push((a, b));
        Ok(())
    }

    /// Partner in tree B of a node from tree A.
    #[inline(always)]
    pub fn get_b(&self, a: NodeId) -> Option<NodeId> {
        self.a_to_b.get(usize::from(a)).copied().flatten()
    }

    /// Partner in tree A of a node from tree B.
    #[inline(always)]
    pub fn get_a(&self, b: NodeId) -> Option<NodeId> {
        self.b_to_a.get(usize::from(b)).copied().flatten()
    }

    /// Whether a node from tree A has a partner.
    #[inline(always)]
    pub fn contains_a(&self, a: NodeId) -> bool {
        self.get_b(a).is_some()
    }

    /// Whether a node from tree B has a partner.
    #[inline(always)]
    pub fn contains_b(&self, b: NodeId) -> bool {
        self.get_a(b).is_some()
    }

    /// All matched pairs in insertion order.
    pub fn pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.pairs.iter().copied()
    }

    /// Number of matched pairs.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no pairs have been matched.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Walk the ancestor chains of `na` (tree A) and `nb` (tree B) upward in
/// lockstep, collecting unmatched candidate pairs, and commit the whole
/// chain only if the first already-matched ancestors found on both sides
/// are partners of each other. Committing a chain whose matched ancestors
/// cross would wreck the matching, so an inconsistent chain is dropped
/// wholesale.
///
/// Returns whether the chain was committed.
pub(crate) fn bubble_unmatched_ancestors<V: TreeValue>(
    a: &Tree<V>,
    b: &Tree<V>,
    na: NodeId,
    nb: NodeId,
    matching: &mut Matching,
) -> Result<bool, MatchingError> {
    let mut chain = Vec::new();
    let mut cur = (Some(na), Some(nb));
    loop {
        match cur {
            (Some(x), Some(y)) => {
                if matching.contains_a(x) || matching.contains_b(y) {
                    if matching.get_b(x) != Some(y) {
                        trace!(?x, ?y, "inconsistent ancestor chain dropped");
                        return Ok(false);
                    }
                    break;
                }
                chain.push((x, y));
                cur = (a.parent(x), b.parent(y));
            }
            // Both chains ran past their roots together: nothing above
            // contradicts the pairing.
            (None, None) => break,
            // One side ran out while the other still has ancestors: the
            // candidates sit at incompatible positions.
            _ => return Ok(false),
        }
    }
    for (x, y) in chain {
        matching.put(x, y)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get_are_symmetric() {
        let mut tree_a: Tree<&str> = Tree::new("ra");
        let a1 = tree_a.add_child(tree_a.root(), "x");
        let mut tree_b: Tree<&str> = Tree::new("rb");
        let b1 = tree_b.add_child(tree_b.root(), "x");

        let mut m = Matching::new();
        m.put(tree_a.root(), tree_b.root()).unwrap();
        m.put(a1, b1).unwrap();

        assert_eq!(m.get_b(a1), Some(b1));
        assert_eq!(m.get_a(b1), Some(a1));
        // get(get(x)) == x where defined.
        assert_eq!(m.get_a(m.get_b(a1).unwrap()), Some(a1));
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn overlapping_put_fails() {
        let mut tree_a: Tree<&str> = Tree::new("ra");
        let a1 = tree_a.add_child(tree_a.root(), "x");
        let mut tree_b: Tree<&str> = Tree::new("rb");
        let b1 = tree_b.add_child(tree_b.root(), "x");

        let mut m = Matching::new();
        m.put(a1, b1).unwrap();
        // Both directions of overlap are rejected.
        assert_eq!(m.put(a1, tree_b.root()), Err(MatchingError::AlreadyMatched));
        assert_eq!(m.put(tree_a.root(), b1), Err(MatchingError::AlreadyMatched));
        // The original pair is untouched.
        assert_eq!(m.get_b(a1), Some(b1));
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn bubbling_commits_consistent_chains_only() {
        // A: r ── p ── u        B: r ── p ── u
        //      └─ q ── v             └─ q ── v
        let mut ta: Tree<&str> = Tree::new("r");
        let pa = ta.add_child(ta.root(), "p");
        let ua = ta.add_child(pa, "u");
        let qa = ta.add_child(ta.root(), "q");
        let va = ta.add_child(qa, "v");
        let mut tb: Tree<&str> = Tree::new("r");
        let pb = tb.add_child(tb.root(), "p");
        let ub = tb.add_child(pb, "u");
        let qb = tb.add_child(tb.root(), "q");
        let vb = tb.add_child(qb, "v");

        let mut m = Matching::new();
        m.put(ta.root(), tb.root()).unwrap();

        // Chain u..p commits: the first matched ancestors are the roots,
        // which are partners.
        assert!(bubble_unmatched_ancestors(&ta, &tb, ua, ub, &mut m).unwrap());
        assert_eq!(m.get_b(pa), Some(pb));
        assert_eq!(m.get_b(ua), Some(ub));

        // A chain whose ancestors cross the p/p pair is dropped wholesale.
        assert!(!bubble_unmatched_ancestors(&ta, &tb, va, ub, &mut m).unwrap());
        assert!(!m.contains_a(va));

        // A consistent second chain still commits.
        assert!(bubble_unmatched_ancestors(&ta, &tb, va, vb, &mut m).unwrap());
        assert_eq!(m.get_b(qa), Some(qb));
    }

    #[test]
    fn unmatched_nodes_yield_the_null_sentinel() {
        let mut tree_a: Tree<&str> = Tree::new("ra");
        let a1 = tree_a.add_child(tree_a.root(), "x");

        let m = Matching::new();
        assert_eq!(m.get_b(a1), None);
        assert!(!m.contains_a(a1));
        assert!(m.is_empty());
    }
}
