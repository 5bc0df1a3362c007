//! Context fingerprint generation.
//!
//! A fingerprint is the sequence of node hashes surrounding an operation's
//! affected span in document order. Captured at detach time, it lets the
//! resolver recognize the right spot in a drifted copy of the document
//! even when the literal path no longer holds.

use crate::delta::Anchor;
use crate::index::{DocumentOrderIndex, IndexError};
use crate::tree::{NodeHash, Tree, TreeValue};

/// Default fingerprint radius: neighbors captured on each side.
pub const DEFAULT_RADIUS: usize = 4;

/// Computes head and tail fingerprints around an anchor.
pub struct ContextGenerator<'a, V: TreeValue> {
    tree: &'a Tree<V>,
    index: &'a DocumentOrderIndex,
    radius: usize,
}

impl<'a, V: TreeValue> ContextGenerator<'a, V> {
    /// A generator over `tree` using its prebuilt document-order index.
    pub fn new(tree: &'a Tree<V>, index: &'a DocumentOrderIndex, radius: usize) -> Self {
        Self {
            tree,
            index,
            radius,
        }
    }

    /// Document-order position of the slot an anchor points at. An anchor
    /// past the last child resolves to the position just after the last
    /// child's subtree.
    fn anchor_position(&self, anchor: &Anchor) -> Result<usize, IndexError> {
        match *anchor {
            Anchor::Root => self.index.position(self.tree.root()),
            Anchor::Child { parent, index } => {
                if let Some(node) = self.tree.child_at(parent, index) {
                    self.index.position(node)
                } else if let Some(last) = self.tree.children(parent).last() {
                    Ok(self.index.position(last)? + self.index.subtree_size(last)?)
                } else {
                    Ok(self.index.position(parent)? + 1)
                }
            }
        }
    }

    /// The `radius` node hashes immediately before the anchor slot, in
    /// document order (farthest first). Positions beyond the document
    /// bounds yield `None`.
    pub fn head(&self, anchor: &Anchor) -> Result<Vec<Option<NodeHash>>, IndexError> {
        let slot = self.anchor_position(anchor)? as isize;
        Ok(((slot - self.radius as isize)..slot)
            .map(|pos| self.index.at(pos).map(|n| self.tree.node_hash(n)))
            .collect())
    }

    /// The `radius` node hashes immediately after the affected span, in
    /// document order. A `deep` span covers `length` whole subtrees
    /// starting at the anchor slot (forest updates); a shallow span covers
    /// just the anchored nodes themselves (node updates), so the nodes'
    /// children count as following context.
    pub fn tail(
        &self,
        anchor: &Anchor,
        length: usize,
        deep: bool,
    ) -> Result<Vec<Option<NodeHash>>, IndexError> {
        let slot = self.anchor_position(anchor)?;
        let start = if deep {
            let mut pos = slot;
            for _ in 0..length {
                match self.index.at(pos as isize) {
                    Some(node) => pos += self.index.subtree_size(node)?,
                    None => break,
                }
            }
            pos
        } else {
            slot + length
        };
        Ok((start..start + self.radius)
            .map(|pos| self.index.at(pos as isize).map(|n| self.tree.node_hash(n)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::hash_value;
    use indextree::NodeId;

    // r ── (a ── (a0, a1), b ── b0)
    fn sample() -> (Tree<&'static str>, Vec<NodeId>) {
        let mut tree: Tree<&str> = Tree::new("r");
        let a = tree.add_child(tree.root(), "a");
        let a0 = tree.add_child(a, "a0");
        let a1 = tree.add_child(a, "a1");
        let b = tree.add_child(tree.root(), "b");
        let b0 = tree.add_child(b, "b0");
        (tree, vec![a, a0, a1, b, b0])
    }

    fn h(value: &str) -> Option<NodeHash> {
        Some(hash_value(&value))
    }

    #[test]
    fn head_is_farthest_first_with_null_padding() {
        let (tree, n) = sample();
        let index = DocumentOrderIndex::from_tree(&tree);
        let generator = ContextGenerator::new(&tree, &index, 2);

        // Anchor at "a1" (preorder position 3): head is [a0, a].
        let anchor = Anchor::Child {
            parent: n[0],
            index: 1,
        };
        assert_eq!(generator.head(&anchor).unwrap(), vec![h("a"), h("a0")]);

        // Anchor at the root: everything before is out of bounds.
        assert_eq!(generator.head(&Anchor::Root).unwrap(), vec![None, None]);
    }

    #[test]
    fn shallow_tail_sees_the_anchored_nodes_children() {
        let (tree, _n) = sample();
        let index = DocumentOrderIndex::from_tree(&tree);
        let generator = ContextGenerator::new(&tree, &index, 2);

        // Node update at "a": only the value changes, so "a0" (its own
        // child) is following context.
        let anchor = Anchor::Child {
            parent: tree.root(),
            index: 0,
        };
        assert_eq!(
            generator.tail(&anchor, 1, false).unwrap(),
            vec![h("a0"), h("a1")]
        );
    }

    #[test]
    fn deep_tail_skips_whole_subtrees() {
        let (tree, _n) = sample();
        let index = DocumentOrderIndex::from_tree(&tree);
        let generator = ContextGenerator::new(&tree, &index, 2);

        // Forest update removing the whole "a" subtree: context resumes at
        // "b".
        let anchor = Anchor::Child {
            parent: tree.root(),
            index: 0,
        };
        assert_eq!(
            generator.tail(&anchor, 1, true).unwrap(),
            vec![h("b"), h("b0")]
        );
    }

    #[test]
    fn past_end_anchor_sits_after_the_last_subtree() {
        let (tree, n) = sample();
        let index = DocumentOrderIndex::from_tree(&tree);
        let generator = ContextGenerator::new(&tree, &index, 2);

        // Anchor past the last child of "a": slot lands on "b".
        let anchor = Anchor::Child {
            parent: n[0],
            index: 2,
        };
        assert_eq!(generator.head(&anchor).unwrap(), vec![h("a0"), h("a1")]);
        assert_eq!(
            generator.tail(&anchor, 0, true).unwrap(),
            vec![h("b"), h("b0")]
        );

        // Anchor under a childless parent: slot is right after it.
        let anchor = Anchor::Child {
            parent: n[4],
            index: 0,
        };
        assert_eq!(generator.head(&anchor).unwrap(), vec![h("b"), h("b0")]);
        assert_eq!(generator.tail(&anchor, 0, true).unwrap(), vec![None, None]);
    }
}
