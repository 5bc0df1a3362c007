//! Patch orchestration.
//!
//! The patcher resolves every operation of a delta against a target tree,
//! asks a caller-supplied factory to build a handler per resolved
//! operation, and then activates the handlers in order. Operations whose
//! anchor cannot be resolved are skipped and counted as faults; the rest
//! of the delta still applies.

use crate::delta::{Anchor, DeltaDocument, DetachedOperation, OperationKind};
use crate::resolve::ContextResolver;
use crate::tracing_macros::debug;
use crate::tree::{hash_value, NodeHash, Tree, TreeValue};

/// A reversible application of one operation.
///
/// Handlers start inactive; the patcher activates them once resolution of
/// the whole delta is done. Deactivating an active handler undoes its
/// effect, so a delta can be toggled off again.
pub trait OperationHandler {
    /// Whether the handler's effect is currently applied.
    fn is_active(&self) -> bool;
    /// Apply the effect.
    fn activate(&mut self);
    /// Undo the effect.
    fn deactivate(&mut self);
    /// Flip between applied and undone.
    fn toggle(&mut self) {
        if self.is_active() {
            self.deactivate()
        } else {
            self.activate()
        }
    }
}

/// Builds handlers for resolved operations.
///
/// The factory owns the connection to the underlying document
/// representation; the patcher only tells it where each operation landed.
pub trait HandlerFactory<V: TreeValue> {
    /// The handler type this factory produces.
    type Handler: OperationHandler;

    /// A handler replacing one node's value at `anchor`.
    fn node_update(&mut self, anchor: &Anchor, op: &DetachedOperation<V>) -> Self::Handler;

    /// A handler replacing a run of subtrees at `anchor`.
    fn forest_update(&mut self, anchor: &Anchor, op: &DetachedOperation<V>) -> Self::Handler;
}

/// Applies delta documents to trees through handler factories.
#[derive(Debug, Clone, Copy)]
pub struct Patcher {
    radius: usize,
    threshold: f64,
}

impl Default for Patcher {
    fn default() -> Self {
        Self {
            radius: crate::context::DEFAULT_RADIUS,
            threshold: crate::resolve::DEFAULT_THRESHOLD,
        }
    }
}

impl Patcher {
    /// A patcher with an explicit resolution radius and quality threshold.
    pub fn new(radius: usize, threshold: f64) -> Self {
        Self { radius, threshold }
    }

    /// Resolve and apply `delta` against `tree`, building one handler per
    /// resolvable operation and activating them in delta order. Returns
    /// the number of operations that failed to resolve.
    pub fn patch<V: TreeValue, F: HandlerFactory<V>>(
        &self,
        tree: &Tree<V>,
        factory: &mut F,
        delta: &DeltaDocument<V>,
    ) -> usize {
        let resolver = ContextResolver::with_params(tree, self.radius, self.threshold);
        let mut handlers = Vec::with_capacity(delta.len());
        let mut faults = 0;
        for op in &delta.operations {
            let body = operation_body(op);
            match resolver.find(&op.path, &body, &op.head, &op.tail, op.kind) {
                Ok(anchor) => {
                    let handler = match op.kind {
                        OperationKind::NodeUpdate => factory.node_update(&anchor, op),
                        OperationKind::ForestUpdate => factory.forest_update(&anchor, op),
                    };
                    handlers.push(handler);
                }
                Err(err) => {
                    debug!(path = ?op.path, %err, "operation skipped");
                    faults += 1;
                }
            }
        }
        for handler in &mut handlers {
            handler.toggle();
        }
        faults
    }
}

/// The content hashes an operation expects at its slot: the updated node's
/// value for a node update, the flattened removed forest otherwise.
fn operation_body<V: TreeValue>(op: &DetachedOperation<V>) -> Vec<NodeHash> {
    match op.kind {
        OperationKind::NodeUpdate => op.removed.iter().map(|t| hash_value(&t.value)).collect(),
        OperationKind::ForestUpdate => {
            op.removed.iter().flat_map(|t| t.preorder_hashes()).collect()
        }
    }
}
