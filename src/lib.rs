//! # Petaurus
//!
//! Context-oriented structural diffing and patching for ordered labeled
//! trees.
//!
//! Named after *Petaurus* (the sugar gliders), which glide from tree to
//! tree.
//!
//! ## Algorithm Overview
//!
//! Petaurus pairs up the nodes of two trees, derives an edit script from
//! the pairing, and can later re-apply that script to a *different* copy
//! of the document by recognizing the surrounding content instead of
//! trusting absolute positions.
//!
//! The pipeline has three stages:
//!
//! 1. **Matching**: [`Xcc`] (leaf-LCS with ancestor bubbling and leaf
//!    update detection) or [`Skelmatch`] (content/structure two-phase
//!    matching) fills a [`Matching`] between the trees
//! 2. **Collection**: [`DeltaCollector`] walks the matched pairs and
//!    emits node updates and forest updates, which a [`Detacher`] makes
//!    portable by capturing context fingerprints
//! 3. **Resolution**: [`ContextResolver`] re-anchors each operation in a
//!    possibly drifted target tree, and [`Patcher`] drives handlers built
//!    by a caller-supplied [`HandlerFactory`]
//!
//! ## Usage
//!
//! ```
//! use petaurus::{Tree, diff};
//!
//! let mut tree_a: Tree<&str> = Tree::new("root");
//! tree_a.add_child(tree_a.root(), "leaf");
//!
//! let mut tree_b: Tree<&str> = Tree::new("root");
//! tree_b.add_child(tree_b.root(), "sheet");
//!
//! let delta = diff(&tree_a, &tree_b).unwrap();
//! assert_eq!(delta.len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::std_instead_of_core)]

pub use indextree;

mod tracing_macros;

pub mod collect;
pub mod context;
pub mod delta;
pub mod index;
pub mod lcs;
pub mod matching;
pub mod patch;
pub mod resolve;
pub mod skelmatch;
pub mod tree;
pub mod xcc;

use thiserror::Error;

pub use collect::{DeltaCollector, NodeEquality, ValueEquality};
pub use context::{ContextGenerator, DEFAULT_RADIUS};
pub use delta::{
    Anchor, AttachedOperation, DeltaDocument, DeltaFormatError, DetachedOperation, Detacher,
    OperationKind,
};
pub use index::{DocumentOrderIndex, GenerationIndex, IndexError};
pub use lcs::{KPoint, Lcs, Limits};
pub use matching::{Matching, MatchingError};
pub use patch::{HandlerFactory, OperationHandler, Patcher};
pub use resolve::{ContextResolver, DEFAULT_THRESHOLD, ResolveError};
pub use skelmatch::{LeafContentClassifier, NodeClassifier, Skelmatch};
pub use tree::{Fnv1Hasher, NodeHash, Tree, TreeValue, ValueTree, hash_value};
pub use xcc::{RejectPredicate, Xcc, XccConfig};

/// Failures of the one-shot [`diff`] pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// The matcher produced an inconsistent pairing.
    #[error(transparent)]
    Matching(#[from] MatchingError),
    /// An index lookup failed while capturing context.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Compute a portable delta between two trees.
///
/// This is the main entry point: it matches the trees with [`Xcc`] under
/// its default configuration, collects the operations, and detaches them
/// with the default context radius. Feed the result to [`Patcher::patch`]
/// to apply it elsewhere.
pub fn diff<V: TreeValue>(a: &Tree<V>, b: &Tree<V>) -> Result<DeltaDocument<V>, DiffError> {
    let (delta, _matching) = diff_with_matching(a, b)?;
    Ok(delta)
}

/// Like [`diff`], but also returns the node matching.
///
/// Useful when the caller needs to know which nodes of `a` correspond to
/// which nodes of `b`, e.g. to carry annotations across the edit.
pub fn diff_with_matching<V: TreeValue>(
    a: &Tree<V>,
    b: &Tree<V>,
) -> Result<(DeltaDocument<V>, Matching), DiffError> {
    let mut matching = Matching::new();
    Xcc::new(a, b).match_trees(&mut matching)?;

    let index = DocumentOrderIndex::from_tree(a);
    let detacher = Detacher::new(a, &index, DEFAULT_RADIUS);
    let collector = DeltaCollector::new(a, b, &matching);

    let mut operations = Vec::new();
    let mut failure: Option<IndexError> = None;
    collector.for_each_change(&mut |op| {
        if failure.is_some() {
            return;
        }
        match detacher.detach(&op) {
            Ok(detached) => operations.push(detached),
            Err(err) => failure = Some(err),
        }
    });
    if let Some(err) = failure {
        return Err(err.into());
    }
    Ok((DeltaDocument { operations }, matching))
}
