//! XCC tree matching.
//!
//! Pairs the roots, aligns the leaf sequences of both trees with an LCS
//! over (depth, value) equality, bubbles each leaf pair's unmatched
//! ancestor chain into the matching when consistent, and finally detects
//! leaf *updates*: unmatched leaf pairs sitting between matched siblings,
//! whose values are allowed to differ.

use indextree::NodeId;

use crate::lcs::Lcs;
use crate::matching::{Matching, MatchingError, bubble_unmatched_ancestors};
use crate::tracing_macros::debug;
use crate::tree::{Tree, TreeValue};

/// Tuning knobs for [`Xcc`].
#[derive(Debug, Clone)]
pub struct XccConfig {
    /// Run the leaf-update detection phase after the leaf LCS.
    pub detect_leaf_updates: bool,
}

impl Default for XccConfig {
    fn default() -> Self {
        Self {
            detect_leaf_updates: true,
        }
    }
}

/// Excludes a candidate value pair from leaf-update pairing.
pub type RejectPredicate<'a, V> = Box<dyn Fn(&V, &V) -> bool + 'a>;

/// The XCC diff algorithm over two trees.
pub struct Xcc<'a, V: TreeValue> {
    a: &'a Tree<V>,
    b: &'a Tree<V>,
    config: XccConfig,
    rejects: Vec<RejectPredicate<'a, V>>,
}

impl<'a, V: TreeValue> Xcc<'a, V> {
    /// An XCC matcher with the default configuration.
    pub fn new(a: &'a Tree<V>, b: &'a Tree<V>) -> Self {
        Self::with_config(a, b, XccConfig::default())
    }

    /// An XCC matcher with explicit configuration.
    pub fn with_config(a: &'a Tree<V>, b: &'a Tree<V>, config: XccConfig) -> Self {
        Self {
            a,
            b,
            config,
            rejects: Vec::new(),
        }
    }

    /// Register a reject predicate. Each registered predicate gets its own
    /// full leaf-update pass; a pairing is skipped in a pass when the
    /// predicate returns true for the candidate values.
    pub fn add_reject(&mut self, reject: impl Fn(&V, &V) -> bool + 'a) {
        self.rejects.push(Box::new(reject));
    }

    /// Populate `matching` with node pairs between the two trees.
    pub fn match_trees(&self, matching: &mut Matching) -> Result<(), MatchingError> {
        matching.put(self.a.root(), self.b.root())?;
        self.match_leaf_lcs(matching)?;
        if self.config.detect_leaf_updates {
            self.match_leaf_updates(matching)?;
        }
        debug!(pairs = matching.len(), "xcc matching complete");
        Ok(())
    }

    /// Phase 1: LCS over the two leaf sequences; equality requires equal
    /// depth and equal value. Each LCS pair bubbles upward.
    fn match_leaf_lcs(&self, matching: &mut Matching) -> Result<(), MatchingError> {
        let leaves_a: Vec<NodeId> = self.a.leaves().collect();
        let leaves_b: Vec<NodeId> = self.b.leaves().collect();
        let lcs = Lcs::new(&leaves_a, &leaves_b, |&x: &NodeId, &y: &NodeId| {
            self.a.depth(x) == self.b.depth(y) && self.a.value(x) == self.b.value(y)
        });
        let mut pairs = Vec::new();
        lcs.for_each_common_symbol(&mut |x, y| pairs.push((leaves_a[x], leaves_b[y])));
        for (na, nb) in pairs {
            bubble_unmatched_ancestors(self.a, self.b, na, nb, matching)?;
        }
        Ok(())
    }

    /// Phase 2: top-down lockstep scan below every matched pair, pairing
    /// unmatched leaves that sit between matched siblings.
    fn match_leaf_updates(&self, matching: &mut Matching) -> Result<(), MatchingError> {
        if self.rejects.is_empty() {
            self.scan_pair(self.a.root(), self.b.root(), matching, None)
        } else {
            for reject in &self.rejects {
                self.scan_pair(self.a.root(), self.b.root(), matching, Some(reject.as_ref()))?;
            }
            Ok(())
        }
    }

    fn scan_pair(
        &self,
        pa: NodeId,
        pb: NodeId,
        matching: &mut Matching,
        reject: Option<&dyn Fn(&V, &V) -> bool>,
    ) -> Result<(), MatchingError> {
        let kids_a: Vec<NodeId> = self.a.children(pa).collect();
        let kids_b: Vec<NodeId> = self.b.children(pb).collect();
        let mut i = 0;
        let mut j = 0;
        // The parent pair is matched, so the scan starts "after a match".
        let mut prev_matched = true;
        while i < kids_a.len() && j < kids_b.len() {
            let x = kids_a[i];
            let y = kids_b[j];
            match (matching.get_b(x), matching.get_a(y)) {
                (Some(px), Some(py)) => {
                    if px != y || py != x {
                        panic!(
                            "matching corruption: lockstep scan reached matched nodes \
                             {x:?} and {y:?} that are not partners"
                        );
                    }
                    self.scan_pair(x, y, matching, reject)?;
                    prev_matched = true;
                    i += 1;
                    j += 1;
                }
                (None, None) => {
                    let rejected =
                        reject.is_some_and(|r| r(self.a.value(x), self.b.value(y)));
                    if prev_matched
                        && self.a.is_leaf(x)
                        && self.b.is_leaf(y)
                        && !rejected
                    {
                        // Leaf update: values may differ.
                        matching.put(x, y)?;
                        prev_matched = true;
                        i += 1;
                        j += 1;
                    } else if self.a.value(x) == self.b.value(y) && !rejected {
                        matching.put(x, y)?;
                        self.scan_pair(x, y, matching, reject)?;
                        prev_matched = true;
                        i += 1;
                        j += 1;
                    } else {
                        prev_matched = false;
                        i += 1;
                        j += 1;
                    }
                }
                // Advance whichever side is not yet matched.
                (Some(_), None) => {
                    prev_matched = false;
                    j += 1;
                }
                (None, Some(_)) => {
                    prev_matched = false;
                    i += 1;
                }
            }
        }
        Ok(())
    }
}
