//! Skelmatch tree matching.
//!
//! Two-phase algorithm that aligns "content" nodes (leaves by default) and
//! "structure" nodes (internals by default) separately. Phase one runs an
//! LCS over content nodes with whole-subtree equality; phase two partitions
//! sibling lists into unmatched runs between matched pairs and aligns the
//! runs' skeletons by their "bones" — outermost structural nodes with no
//! further structural descendants. Keeping the phases apart avoids false
//! structural matches driven by coincidentally equal leaf values deep in
//! divergent branches.

use indextree::NodeId;

use crate::lcs::Lcs;
use crate::matching::{Matching, MatchingError, bubble_unmatched_ancestors};
use crate::tracing_macros::debug;
use crate::tree::{Tree, TreeValue};

/// Splits nodes into content and structure roles.
///
/// The defaults classify leaves as content and internal nodes as
/// structure; adapters override this when a document kind draws the line
/// elsewhere (e.g. attribute nodes as content regardless of children).
pub trait NodeClassifier<V: TreeValue> {
    /// Whether `id` participates in content alignment.
    fn is_content(&self, tree: &Tree<V>, id: NodeId) -> bool {
        tree.is_leaf(id)
    }

    /// Whether `id` participates in structure alignment.
    fn is_structure(&self, tree: &Tree<V>, id: NodeId) -> bool {
        !tree.is_leaf(id)
    }
}

/// The default classifier: leaves are content, internals are structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafContentClassifier;

impl<V: TreeValue> NodeClassifier<V> for LeafContentClassifier {}

/// The Skelmatch diff algorithm over two trees.
pub struct Skelmatch<'a, V: TreeValue, C = LeafContentClassifier> {
    a: &'a Tree<V>,
    b: &'a Tree<V>,
    classifier: C,
}

impl<'a, V: TreeValue> Skelmatch<'a, V> {
    /// A Skelmatch matcher with the default classifier.
    pub fn new(a: &'a Tree<V>, b: &'a Tree<V>) -> Self {
        Self::with_classifier(a, b, LeafContentClassifier)
    }
}

impl<'a, V: TreeValue, C: NodeClassifier<V>> Skelmatch<'a, V, C> {
    /// A Skelmatch matcher with an adapter-supplied classifier.
    pub fn with_classifier(a: &'a Tree<V>, b: &'a Tree<V>, classifier: C) -> Self {
        Self { a, b, classifier }
    }

    /// Populate `matching` with node pairs between the two trees.
    pub fn match_trees(&self, matching: &mut Matching) -> Result<(), MatchingError> {
        matching.put(self.a.root(), self.b.root())?;
        self.match_content(matching)?;
        self.match_structure_pair(self.a.root(), self.b.root(), matching)?;
        debug!(pairs = matching.len(), "skelmatch matching complete");
        Ok(())
    }

    /// Phase 1: LCS over content nodes; equality requires equal depth and
    /// recursive subtree equality. Hits bubble upward under the ancestor
    /// consistency gate.
    fn match_content(&self, matching: &mut Matching) -> Result<(), MatchingError> {
        let content_a: Vec<NodeId> = self
            .a
            .preorder()
            .filter(|&id| self.classifier.is_content(self.a, id))
            .collect();
        let content_b: Vec<NodeId> = self
            .b
            .preorder()
            .filter(|&id| self.classifier.is_content(self.b, id))
            .collect();
        let lcs = Lcs::new(&content_a, &content_b, |&x: &NodeId, &y: &NodeId| {
            self.a.depth(x) == self.b.depth(y) && subtree_equal(self.a, x, self.b, y)
        });
        let mut pairs = Vec::new();
        lcs.for_each_common_symbol(&mut |x, y| pairs.push((content_a[x], content_b[y])));
        for (na, nb) in pairs {
            bubble_unmatched_ancestors(self.a, self.b, na, nb, matching)?;
        }
        Ok(())
    }

    /// Phase 2: partition the children of a matched pair into maximal
    /// unmatched runs bounded by matched pairs, align each run pair by its
    /// bones, and recurse through the matched pairs.
    fn match_structure_pair(
        &self,
        pa: NodeId,
        pb: NodeId,
        matching: &mut Matching,
    ) -> Result<(), MatchingError> {
        let kids_a: Vec<NodeId> = self.a.children(pa).collect();
        let kids_b: Vec<NodeId> = self.b.children(pb).collect();

        // (run_a, run_b, bounding matched pair). Partitioned up front from
        // the current matching state, then processed in order.
        let mut segments: Vec<(Vec<NodeId>, Vec<NodeId>, Option<(NodeId, NodeId)>)> = Vec::new();
        let mut run_a = Vec::new();
        let mut run_b = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < kids_a.len() && j < kids_b.len() {
            let x = kids_a[i];
            let y = kids_b[j];
            if !matching.contains_a(x) {
                run_a.push(x);
                i += 1;
            } else if !matching.contains_b(y) {
                run_b.push(y);
                j += 1;
            } else {
                if matching.get_b(x) != Some(y) {
                    panic!(
                        "matching corruption: sibling partition reached matched nodes \
                         {x:?} and {y:?} that are not partners"
                    );
                }
                segments.push((core::mem::take(&mut run_a), core::mem::take(&mut run_b), Some((x, y))));
                i += 1;
                j += 1;
            }
        }
        // Tails: matched stragglers cut the run, unmatched ones extend it.
        while i < kids_a.len() {
            let x = kids_a[i];
            if matching.contains_a(x) {
                segments.push((core::mem::take(&mut run_a), core::mem::take(&mut run_b), None));
            } else {
                run_a.push(x);
            }
            i += 1;
        }
        while j < kids_b.len() {
            let y = kids_b[j];
            if matching.contains_b(y) {
                segments.push((core::mem::take(&mut run_a), core::mem::take(&mut run_b), None));
            } else {
                run_b.push(y);
            }
            j += 1;
        }
        segments.push((run_a, run_b, None));

        for (run_a, run_b, pair) in segments {
            self.match_bones(&run_a, &run_b, matching)?;
            if let Some((x, y)) = pair {
                self.match_structure_pair(x, y, matching)?;
            }
        }
        Ok(())
    }

    /// Align one run pair by its bones with an ancestor-aware structural
    /// equality, committing hits under the consistency gate.
    fn match_bones(
        &self,
        run_a: &[NodeId],
        run_b: &[NodeId],
        matching: &mut Matching,
    ) -> Result<(), MatchingError> {
        if run_a.is_empty() || run_b.is_empty() {
            return Ok(());
        }
        let mut bones_a = Vec::new();
        for &id in run_a {
            self.collect_bones(self.a, id, &mut bones_a);
        }
        let mut bones_b = Vec::new();
        for &id in run_b {
            self.collect_bones(self.b, id, &mut bones_b);
        }
        if bones_a.is_empty() || bones_b.is_empty() {
            return Ok(());
        }

        let snapshot: &Matching = matching;
        let lcs = Lcs::new(&bones_a, &bones_b, |&x: &NodeId, &y: &NodeId| {
            self.bones_equal(snapshot, x, y)
        });
        let mut pairs = Vec::new();
        lcs.for_each_common_symbol(&mut |x, y| pairs.push((bones_a[x], bones_b[y])));
        for (na, nb) in pairs {
            bubble_unmatched_ancestors(self.a, self.b, na, nb, matching)?;
        }
        Ok(())
    }

    /// Outermost structural nodes under `id` with no structural
    /// descendants of their own.
    fn collect_bones(&self, tree: &'a Tree<V>, id: NodeId, out: &mut Vec<NodeId>) {
        if self.classifier.is_structure(tree, id) && !self.has_structure_below(tree, id) {
            out.push(id);
            return;
        }
        for child in tree.children(id) {
            self.collect_bones(tree, child, out);
        }
    }

    fn has_structure_below(&self, tree: &'a Tree<V>, id: NodeId) -> bool {
        tree.descendants(id)
            .skip(1)
            .any(|d| self.classifier.is_structure(tree, d))
    }

    /// Structural bone equality: equal value and depth, and pairwise-equal
    /// values along both unmatched ancestor chains, which must end at the
    /// same point (a matched pair or both roots).
    fn bones_equal(&self, matching: &Matching, x: NodeId, y: NodeId) -> bool {
        if self.a.depth(x) != self.b.depth(y) || self.a.value(x) != self.b.value(y) {
            return false;
        }
        let mut pa = self.a.parent(x);
        let mut pb = self.b.parent(y);
        loop {
            match (pa, pb) {
                (Some(u), Some(v)) => {
                    if matching.contains_a(u) || matching.contains_b(v) {
                        return matching.get_b(u) == Some(v);
                    }
                    if self.a.value(u) != self.b.value(v) {
                        return false;
                    }
                    pa = self.a.parent(u);
                    pb = self.b.parent(v);
                }
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

/// Recursive structural equality of two subtrees, down to the leaves.
fn subtree_equal<V: TreeValue>(a: &Tree<V>, x: NodeId, b: &Tree<V>, y: NodeId) -> bool {
    if a.value(x) != b.value(y) {
        return false;
    }
    let mut cx = a.children(x);
    let mut cy = b.children(y);
    loop {
        match (cx.next(), cy.next()) {
            (Some(u), Some(v)) => {
                if !subtree_equal(a, u, b, v) {
                    return false;
                }
            }
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_trees_match_completely() {
        let build = || {
            let mut t: Tree<&str> = Tree::new("r");
            let sec = t.add_child(t.root(), "sec");
            t.add_child(sec, "p1");
            t.add_child(sec, "p2");
            t.add_child(t.root(), "q");
            t
        };
        let ta = build();
        let tb = build();

        let mut m = Matching::new();
        Skelmatch::new(&ta, &tb).match_trees(&mut m).unwrap();
        assert_eq!(m.len(), ta.node_count());
    }

    #[test]
    fn content_phase_requires_subtree_equality() {
        // The "sec" subtrees differ below the surface, so their leaves are
        // the only content candidates and only the equal one pairs.
        let mut ta: Tree<&str> = Tree::new("r");
        let sa = ta.add_child(ta.root(), "sec");
        let keep_a = ta.add_child(sa, "same");
        let drop_a = ta.add_child(sa, "gone");
        let mut tb: Tree<&str> = Tree::new("r");
        let sb = tb.add_child(tb.root(), "sec");
        let keep_b = tb.add_child(sb, "same");
        let drop_b = tb.add_child(sb, "new");

        let mut m = Matching::new();
        Skelmatch::new(&ta, &tb).match_trees(&mut m).unwrap();

        assert_eq!(m.get_b(keep_a), Some(keep_b));
        assert_eq!(m.get_b(sa), Some(sb));
        assert!(!m.contains_a(drop_a));
        assert!(!m.contains_b(drop_b));
    }

    #[test]
    fn structure_phase_matches_skeleton_despite_changed_leaves() {
        // A: r ── div ── p ── "hello"    B: r ── div ── p ── "goodbye"
        let mut ta: Tree<&str> = Tree::new("r");
        let div_a = ta.add_child(ta.root(), "div");
        let p_a = ta.add_child(div_a, "p");
        let hello = ta.add_child(p_a, "hello");
        let mut tb: Tree<&str> = Tree::new("r");
        let div_b = tb.add_child(tb.root(), "div");
        let p_b = tb.add_child(div_b, "p");
        let goodbye = tb.add_child(p_b, "goodbye");

        let mut m = Matching::new();
        Skelmatch::new(&ta, &tb).match_trees(&mut m).unwrap();

        // Content phase finds nothing (leaf values differ); the structure
        // phase still aligns the skeleton via the bone "p".
        assert_eq!(m.get_b(div_a), Some(div_b));
        assert_eq!(m.get_b(p_a), Some(p_b));
        assert!(!m.contains_a(hello));
        assert!(!m.contains_b(goodbye));
    }

    #[test]
    fn runs_do_not_match_across_matched_boundaries() {
        // A: r ── (x ── "1", m ── "same", y ── "2")
        // B: r ── (y ── "3", m ── "same", x ── "4")
        // "x" and "y" exist on both sides but in different runs relative to
        // the matched "m" boundary, so neither pairs.
        let mut ta: Tree<&str> = Tree::new("r");
        let xa = ta.add_child(ta.root(), "x");
        ta.add_child(xa, "1");
        let ma = ta.add_child(ta.root(), "m");
        ta.add_child(ma, "same");
        let ya = ta.add_child(ta.root(), "y");
        ta.add_child(ya, "2");
        let mut tb: Tree<&str> = Tree::new("r");
        let yb = tb.add_child(tb.root(), "y");
        tb.add_child(yb, "3");
        let mb = tb.add_child(tb.root(), "m");
        tb.add_child(mb, "same");
        let xb = tb.add_child(tb.root(), "x");
        tb.add_child(xb, "4");

        let mut m = Matching::new();
        Skelmatch::new(&ta, &tb).match_trees(&mut m).unwrap();

        assert_eq!(m.get_b(ma), Some(mb));
        assert!(!m.contains_a(xa));
        assert!(!m.contains_b(xb));
        assert!(!m.contains_a(ya));
        assert!(!m.contains_b(yb));
    }

    #[test]
    fn bone_equality_is_ancestor_aware() {
        // Equal bones under differently-labeled unmatched wrappers stay
        // unmatched.
        let mut ta: Tree<&str> = Tree::new("r");
        let wrap_a = ta.add_child(ta.root(), "w1");
        let p_a = ta.add_child(wrap_a, "p");
        ta.add_child(p_a, "1");
        let mut tb: Tree<&str> = Tree::new("r");
        let wrap_b = tb.add_child(tb.root(), "w2");
        let p_b = tb.add_child(wrap_b, "p");
        tb.add_child(p_b, "2");

        let mut m = Matching::new();
        Skelmatch::new(&ta, &tb).match_trees(&mut m).unwrap();

        assert!(!m.contains_a(p_a));
        assert!(!m.contains_b(p_b));
        assert!(!m.contains_a(wrap_a));
    }

    #[test]
    fn classifier_override_changes_roles() {
        // Treat every node labeled "blob" as content even though it has
        // children, so its whole subtree must be equal to pair.
        struct BlobContent;
        impl NodeClassifier<&'static str> for BlobContent {
            fn is_content(&self, tree: &Tree<&'static str>, id: NodeId) -> bool {
                *tree.value(id) == "blob" || tree.is_leaf(id)
            }
            fn is_structure(&self, tree: &Tree<&'static str>, id: NodeId) -> bool {
                *tree.value(id) != "blob" && !tree.is_leaf(id)
            }
        }

        let build = |leaf: &'static str| {
            let mut t: Tree<&str> = Tree::new("r");
            let blob = t.add_child(t.root(), "blob");
            t.add_child(blob, leaf);
            (t, blob)
        };
        let (ta, blob_a) = build("payload");
        let (tb, blob_b) = build("payload");

        let mut m = Matching::new();
        Skelmatch::with_classifier(&ta, &tb, BlobContent)
            .match_trees(&mut m)
            .unwrap();
        assert_eq!(m.get_b(blob_a), Some(blob_b));

        // With a differing payload the blob no longer pairs as content,
        // and as non-structure it cannot pair as a bone either.
        let (tc, blob_c) = build("changed");
        let mut m = Matching::new();
        Skelmatch::with_classifier(&ta, &tc, BlobContent)
            .match_trees(&mut m)
            .unwrap();
        assert!(!m.contains_a(blob_a));
        assert!(!m.contains_b(blob_c));
    }
}
