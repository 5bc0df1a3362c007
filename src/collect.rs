//! Delta collection: turning a matching into an edit script.
//!
//! Walks matched pairs top-down from the roots and emits the minimal
//! operation sequence consistent with the matching: one node update per
//! mismatched matched pair, one forest update per maximal run of unmatched
//! siblings. Operations for one subtree are emitted contiguously before
//! the walk moves on.

use indextree::NodeId;

use crate::delta::{Anchor, AttachedOperation, OperationKind};
use crate::matching::Matching;
use crate::tracing_macros::trace;
use crate::tree::{Tree, TreeValue};

/// Decides whether a matched pair's values count as equal.
///
/// Injected at construction so adapters can ignore incidental differences
/// (whitespace, attribute order) without touching the collector.
pub trait NodeEquality<V: TreeValue> {
    /// Whether the matched pair `(na, nb)` needs no update.
    fn equals(&self, a: &Tree<V>, na: NodeId, b: &Tree<V>, nb: NodeId) -> bool;
}

/// The default equality: plain value comparison.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueEquality;

impl<V: TreeValue> NodeEquality<V> for ValueEquality {
    fn equals(&self, a: &Tree<V>, na: NodeId, b: &Tree<V>, nb: NodeId) -> bool {
        a.value(na) == b.value(nb)
    }
}

/// Emits attached operations from a matching between two trees.
pub struct DeltaCollector<'a, V: TreeValue, E = ValueEquality> {
    a: &'a Tree<V>,
    b: &'a Tree<V>,
    matching: &'a Matching,
    equality: E,
}

impl<'a, V: TreeValue> DeltaCollector<'a, V> {
    /// A collector with the default value equality.
    pub fn new(a: &'a Tree<V>, b: &'a Tree<V>, matching: &'a Matching) -> Self {
        Self::with_equality(a, b, matching, ValueEquality)
    }
}

impl<'a, V: TreeValue, E: NodeEquality<V>> DeltaCollector<'a, V, E> {
    /// A collector with an adapter-supplied equality strategy.
    pub fn with_equality(a: &'a Tree<V>, b: &'a Tree<V>, matching: &'a Matching, equality: E) -> Self {
        Self {
            a,
            b,
            matching,
            equality,
        }
    }

    /// Invoke `cb` once per operation, in document order, top-down.
    pub fn for_each_change(&self, cb: &mut dyn FnMut(AttachedOperation<V>)) {
        self.collect_pair(self.a.root(), self.b.root(), cb);
    }

    fn collect_pair(&self, na: NodeId, nb: NodeId, cb: &mut dyn FnMut(AttachedOperation<V>)) {
        if !self.equality.equals(self.a, na, self.b, nb) {
            trace!(?na, ?nb, "node update");
            cb(AttachedOperation {
                kind: OperationKind::NodeUpdate,
                anchor: self.anchor_of(na),
                path: self.a.path_of(na),
                removed: vec![self.a.value_of(na)],
                inserted: vec![self.b.value_of(nb)],
            });
        }

        let kids_a: Vec<NodeId> = self.a.children(na).collect();
        let kids_b: Vec<NodeId> = self.b.children(nb).collect();
        let mut removed_run: Vec<NodeId> = Vec::new();
        let mut inserted_run: Vec<NodeId> = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < kids_a.len() && j < kids_b.len() {
            let x = kids_a[i];
            let y = kids_b[j];
            if !self.matching.contains_a(x) {
                removed_run.push(x);
                i += 1;
            } else if !self.matching.contains_b(y) {
                inserted_run.push(y);
                j += 1;
            } else {
                if self.matching.get_b(x) != Some(y) {
                    panic!(
                        "matching corruption: delta collection reached matched nodes \
                         {x:?} and {y:?} that are not partners"
                    );
                }
                // Flush the buffered run anchored just before the matched
                // pair, then descend into it.
                self.flush(na, &mut removed_run, &mut inserted_run, self.a.position(x), cb);
                self.collect_pair(x, y, cb);
                i += 1;
                j += 1;
            }
        }
        while i < kids_a.len() {
            removed_run.push(kids_a[i]);
            i += 1;
        }
        while j < kids_b.len() {
            inserted_run.push(kids_b[j]);
            j += 1;
        }
        self.flush(na, &mut removed_run, &mut inserted_run, kids_a.len(), cb);
    }

    /// Emit one forest update for the buffered run, if any. The anchor
    /// points at the first removed child, or at `boundary_index` for a
    /// pure insertion.
    fn flush(
        &self,
        parent_a: NodeId,
        removed_run: &mut Vec<NodeId>,
        inserted_run: &mut Vec<NodeId>,
        boundary_index: usize,
        cb: &mut dyn FnMut(AttachedOperation<V>),
    ) {
        if removed_run.is_empty() && inserted_run.is_empty() {
            return;
        }
        let index = removed_run
            .first()
            .map_or(boundary_index, |&n| self.a.position(n));
        let mut path = self.a.path_of(parent_a);
        path.push(index);
        trace!(
            removed = removed_run.len(),
            inserted = inserted_run.len(),
            "forest update"
        );
        cb(AttachedOperation {
            kind: OperationKind::ForestUpdate,
            anchor: Anchor::Child {
                parent: parent_a,
                index,
            },
            path,
            removed: removed_run.drain(..).map(|n| self.a.value_tree(n)).collect(),
            inserted: inserted_run.drain(..).map(|n| self.b.value_tree(n)).collect(),
        });
    }

    fn anchor_of(&self, node: NodeId) -> Anchor {
        match self.a.parent(node) {
            None => Anchor::Root,
            Some(parent) => Anchor::Child {
                parent,
                index: self.a.position(node),
            },
        }
    }
}
