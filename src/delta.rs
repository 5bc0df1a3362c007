//! Delta operations in attached and detached form, plus the wire-format
//! field codecs.
//!
//! An attached operation references nodes of a concrete tree through its
//! [`Anchor`]; detaching replaces the anchor with head/tail context
//! fingerprints, making the operation portable across tree instances. The
//! reverse direction, re-anchoring in a possibly drifted tree, lives in
//! [`crate::resolve`].

use indextree::NodeId;
use thiserror::Error;

use crate::context::ContextGenerator;
use crate::index::{DocumentOrderIndex, IndexError};
use crate::tree::{NodeHash, Tree, TreeValue, ValueTree};

/// The two operation shapes a delta is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Replace one node's value in place; children are untouched.
    NodeUpdate,
    /// Replace a run of sibling subtrees (either side may be empty).
    ForestUpdate,
}

/// Where an operation applies within a concrete tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The tree root itself.
    Root,
    /// The child slot `index` under `parent`; `index` may equal the child
    /// count, i.e. point just past the last child.
    Child {
        /// Parent of the anchored slot.
        parent: NodeId,
        /// Sibling index of the anchored slot.
        index: usize,
    },
}

/// An operation still referencing nodes of the tree it was computed from.
#[derive(Debug, Clone)]
pub struct AttachedOperation<V> {
    /// Operation shape.
    pub kind: OperationKind,
    /// Where the operation applies.
    pub anchor: Anchor,
    /// Root-to-anchor child-index path.
    pub path: Vec<usize>,
    /// Content removed at the anchor (shallow snapshots for node updates,
    /// deep for forest updates).
    pub removed: Vec<ValueTree<V>>,
    /// Content inserted at the anchor.
    pub inserted: Vec<ValueTree<V>>,
}

/// A portable operation: the anchor is replaced by context fingerprints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedOperation<V> {
    /// Operation shape.
    pub kind: OperationKind,
    /// Root-to-anchor child-index path.
    pub path: Vec<usize>,
    /// Content removed at the anchor.
    pub removed: Vec<ValueTree<V>>,
    /// Content inserted at the anchor.
    pub inserted: Vec<ValueTree<V>>,
    /// Node hashes before the anchor slot, farthest first.
    pub head: Vec<Option<NodeHash>>,
    /// Node hashes after the affected span.
    pub tail: Vec<Option<NodeHash>>,
}

/// An ordered sequence of detached operations.
#[derive(Debug, Clone, Default)]
pub struct DeltaDocument<V> {
    /// Operations in collection order.
    pub operations: Vec<DetachedOperation<V>>,
}

impl<V> DeltaDocument<V> {
    /// Number of operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the delta carries no operations.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Converts attached operations into their portable form by capturing
/// context fingerprints at detach time.
pub struct Detacher<'a, V: TreeValue> {
    context: ContextGenerator<'a, V>,
}

impl<'a, V: TreeValue> Detacher<'a, V> {
    /// A detacher over the source tree and its document-order index.
    pub fn new(tree: &'a Tree<V>, index: &'a DocumentOrderIndex, radius: usize) -> Self {
        Self {
            context: ContextGenerator::new(tree, index, radius),
        }
    }

    /// Capture fingerprints for `op` and drop its tree references.
    pub fn detach(&self, op: &AttachedOperation<V>) -> Result<DetachedOperation<V>, IndexError> {
        let deep = op.kind == OperationKind::ForestUpdate;
        let head = self.context.head(&op.anchor)?;
        let tail = self.context.tail(&op.anchor, op.removed.len(), deep)?;
        Ok(DetachedOperation {
            kind: op.kind,
            path: op.path.clone(),
            removed: op.removed.clone(),
            inserted: op.inserted.clone(),
            head,
            tail,
        })
    }
}

/// Malformed wire-encoded operation fields.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaFormatError {
    /// A path component was not a decimal index.
    #[error("malformed path component {component:?}")]
    BadPathComponent {
        /// The offending component text.
        component: String,
    },
    /// A fingerprint value was not an 8-digit hex hash or an empty field.
    #[error("malformed fingerprint value {value:?}")]
    BadFingerprintValue {
        /// The offending value text.
        value: String,
    },
}

/// Encode a path as `/`-joined decimal indices (empty path ⇒ empty
/// string).
pub fn encode_path(path: &[usize]) -> String {
    path.iter()
        .map(usize::to_string)
        .collect::<Vec<_>>()
        .join("/")
}

/// Parse a `/`-joined index path.
pub fn parse_path(text: &str) -> Result<Vec<usize>, DeltaFormatError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split('/')
        .map(|component| {
            component
                .parse::<usize>()
                .map_err(|_| DeltaFormatError::BadPathComponent {
                    component: component.to_owned(),
                })
        })
        .collect()
}

/// Encode a fingerprint as `;`-joined 8-digit hex values; an absent
/// neighbor is an empty field.
pub fn encode_fingerprint(fingerprint: &[Option<NodeHash>]) -> String {
    fingerprint
        .iter()
        .map(|entry| match entry {
            Some(hash) => hash.to_string(),
            None => String::new(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a `;`-joined fingerprint (empty string ⇒ empty fingerprint).
pub fn parse_fingerprint(text: &str) -> Result<Vec<Option<NodeHash>>, DeltaFormatError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    text.split(';')
        .map(|value| {
            if value.is_empty() {
                return Ok(None);
            }
            if value.len() != 8 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(DeltaFormatError::BadFingerprintValue {
                    value: value.to_owned(),
                });
            }
            u32::from_str_radix(value, 16)
                .map(|raw| Some(NodeHash(raw)))
                .map_err(|_| DeltaFormatError::BadFingerprintValue {
                    value: value.to_owned(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::hash_value;

    #[test]
    fn path_codec_round_trips() {
        assert_eq!(encode_path(&[]), "");
        assert_eq!(encode_path(&[0, 3, 12]), "0/3/12");
        assert_eq!(parse_path("").unwrap(), Vec::<usize>::new());
        assert_eq!(parse_path("0/3/12").unwrap(), vec![0, 3, 12]);
    }

    #[test]
    fn malformed_paths_fail() {
        assert_eq!(
            parse_path("0/x/2"),
            Err(DeltaFormatError::BadPathComponent {
                component: "x".into()
            })
        );
        assert!(parse_path("-1").is_err());
        assert!(parse_path("1//2").is_err());
    }

    #[test]
    fn fingerprint_codec_round_trips() {
        let fingerprint = vec![None, Some(NodeHash(0x050c_5d7e)), Some(NodeHash(0))];
        let text = encode_fingerprint(&fingerprint);
        assert_eq!(text, ";050c5d7e;00000000");
        assert_eq!(parse_fingerprint(&text).unwrap(), fingerprint);
        assert_eq!(parse_fingerprint("").unwrap(), Vec::new());
    }

    #[test]
    fn malformed_fingerprints_fail() {
        assert!(parse_fingerprint("zzzzzzzz").is_err());
        // Wrong width is rejected even when the digits are valid hex.
        assert!(parse_fingerprint("1234").is_err());
        assert!(parse_fingerprint("050c5d7e;12").is_err());
    }

    #[test]
    fn detach_captures_fingerprints() {
        // r ── (a, b, c) leaves.
        let mut tree: Tree<&str> = Tree::new("r");
        tree.add_child(tree.root(), "a");
        let b = tree.add_child(tree.root(), "b");
        tree.add_child(tree.root(), "c");
        let index = DocumentOrderIndex::from_tree(&tree);
        let detacher = Detacher::new(&tree, &index, 2);

        let attached = AttachedOperation {
            kind: OperationKind::NodeUpdate,
            anchor: Anchor::Child {
                parent: tree.root(),
                index: 1,
            },
            path: tree.path_of(b),
            removed: vec![tree.value_of(b)],
            inserted: vec![ValueTree::leaf("B")],
        };
        let detached = detacher.detach(&attached).unwrap();

        assert_eq!(detached.kind, OperationKind::NodeUpdate);
        assert_eq!(detached.path, vec![1]);
        assert_eq!(
            detached.head,
            vec![Some(hash_value(&"r")), Some(hash_value(&"a"))]
        );
        assert_eq!(detached.tail, vec![Some(hash_value(&"c")), None]);
        assert_eq!(detached.removed, vec![ValueTree::leaf("b")]);
    }
}
