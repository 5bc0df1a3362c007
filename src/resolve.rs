//! Fuzzy anchor resolution in a drifted tree.
//!
//! Given a detached operation's path, body hashes and context
//! fingerprints, the resolver finds the slot in a target tree where the
//! operation applies. The path is only a starting guess: the real
//! decision is made by scanning nearby document-order positions, gating
//! candidates on exact body content and ranking them by weighted context
//! agreement.

use core::cell::RefCell;

use indextree::NodeId;
use thiserror::Error;

use crate::delta::{Anchor, OperationKind};
use crate::index::{DocumentOrderIndex, GenerationIndex, IndexError};
use crate::tracing_macros::{debug, trace};
use crate::tree::{NodeHash, Tree, TreeValue};

/// Default minimum context quality for accepting an anchor.
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Anchor resolution failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// No candidate slot passed the content gate and quality threshold.
    #[error("no anchor met the quality threshold (best {best_quality:.3})")]
    NoAnchor {
        /// Quality of the best rejected candidate (0.0 when none passed
        /// the content gate at all).
        best_quality: f64,
    },
    /// An index query failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Re-anchors detached operations in a concrete tree.
pub struct ContextResolver<'a, V: TreeValue> {
    tree: &'a Tree<V>,
    index: DocumentOrderIndex,
    generations: RefCell<GenerationIndex>,
    radius: usize,
    threshold: f64,
}

impl<'a, V: TreeValue> ContextResolver<'a, V> {
    /// A resolver with the default radius and threshold.
    pub fn new(tree: &'a Tree<V>) -> Self {
        Self::with_params(tree, crate::context::DEFAULT_RADIUS, DEFAULT_THRESHOLD)
    }

    /// A resolver with an explicit search radius and quality threshold.
    pub fn with_params(tree: &'a Tree<V>, radius: usize, threshold: f64) -> Self {
        Self {
            tree,
            index: DocumentOrderIndex::from_tree(tree),
            generations: RefCell::new(GenerationIndex::new()),
            radius,
            threshold,
        }
    }

    /// Resolve an operation to an anchor in this resolver's tree.
    ///
    /// `body` is the expected content at the slot: one hash per removed
    /// node in document order (a node update contributes the single
    /// updated node, a forest update the flattened removed subtrees).
    /// Candidates that do not carry exactly this content are disqualified
    /// outright; among the rest, the slot with the highest weighted
    /// head/tail agreement wins, provided it reaches the threshold.
    pub fn find(
        &self,
        path: &[usize],
        body: &[NodeHash],
        head: &[Option<NodeHash>],
        tail: &[Option<NodeHash>],
        kind: OperationKind,
    ) -> Result<Anchor, ResolveError> {
        if path.is_empty() {
            return Ok(Anchor::Root);
        }
        let guess = self.best_guess(path)?;
        let base = self.index.position(guess)? as isize;
        let len = self.index.len() as isize;

        let mut best: Option<(usize, f64)> = None;
        for offset in -(self.radius as isize)..=(self.radius as isize) {
            let pos = base + offset;
            // The slot one past the last node is a valid insertion point.
            if pos < 0 || pos > len {
                continue;
            }
            let pos = pos as usize;
            if !self.body_matches(pos, body) {
                continue;
            }
            let quality = self.context_quality(pos, body.len(), head, tail);
            trace!(pos, quality, "candidate slot");
            if best.is_none_or(|(_, q)| quality > q) {
                best = Some((pos, quality));
            }
        }

        match best {
            Some((pos, quality)) if quality >= self.threshold => {
                debug!(pos, quality, ?kind, "anchor resolved");
                self.promote(pos, path.len())
            }
            Some((_, quality)) => Err(ResolveError::NoAnchor {
                best_quality: quality,
            }),
            None => Err(ResolveError::NoAnchor { best_quality: 0.0 }),
        }
    }

    /// Walk the path as far as it holds, then estimate the rest through
    /// same-generation offsets so the search starts near the drifted spot.
    fn best_guess(&self, path: &[usize]) -> Result<NodeId, IndexError> {
        let mut current = self.tree.root();
        for &component in path {
            if let Some(child) = self.tree.child_at(current, component) {
                current = child;
                continue;
            }
            let Some(first) = self.tree.children(current).next() else {
                break;
            };
            let mut generations = self.generations.borrow_mut();
            generations.build_generation(self.tree, self.tree.depth(first));
            match generations.get(self.tree, first, component as isize)? {
                Some(node) => current = node,
                None => {
                    // Off the end of the generation: settle for the last
                    // child and search from there.
                    if let Some(last) = self.tree.children(current).last() {
                        current = last;
                    }
                    break;
                }
            }
        }
        Ok(current)
    }

    /// Whether the nodes starting at `pos` carry exactly the expected
    /// body hashes.
    fn body_matches(&self, pos: usize, body: &[NodeHash]) -> bool {
        body.iter().enumerate().all(|(i, expected)| {
            self.index
                .at((pos + i) as isize)
                .is_some_and(|n| self.tree.node_hash(n) == *expected)
        })
    }

    /// Weighted agreement between the stored fingerprints and the
    /// neighborhood of `pos`. Each step away from the slot halves the
    /// weight; out-of-bounds positions compare as the null sentinel, so a
    /// fingerprint taken near a document edge still scores fully.
    fn context_quality(
        &self,
        pos: usize,
        body_len: usize,
        head: &[Option<NodeHash>],
        tail: &[Option<NodeHash>],
    ) -> f64 {
        if head.is_empty() && tail.is_empty() {
            return 1.0;
        }
        let mut total = 0.0;
        let mut matched = 0.0;
        for (i, expected) in head.iter().enumerate() {
            let weight = 0.5f64.powi((head.len() - 1 - i) as i32);
            let actual = self
                .index
                .at(pos as isize - (head.len() - i) as isize)
                .map(|n| self.tree.node_hash(n));
            total += weight;
            if actual == *expected {
                matched += weight;
            }
        }
        for (i, expected) in tail.iter().enumerate() {
            let weight = 0.5f64.powi(i as i32);
            let actual = self
                .index
                .at((pos + body_len + i) as isize)
                .map(|n| self.tree.node_hash(n));
            total += weight;
            if actual == *expected {
                matched += weight;
            }
        }
        matched / total
    }

    /// Turn a winning document-order slot back into a child anchor at the
    /// depth the path calls for.
    fn promote(&self, pos: usize, required_depth: usize) -> Result<Anchor, ResolveError> {
        if let Some(node) = self.index.at(pos as isize) {
            if self.tree.depth(node) == required_depth {
                return Ok(self.anchor_to(node));
            }
            if self.tree.depth(node) > required_depth {
                // Candidate drifted deeper: climb to the required depth
                // and anchor past that ancestor's last child.
                let mut cur = node;
                while self.tree.depth(cur) > required_depth {
                    match self.tree.parent(cur) {
                        Some(parent) => cur = parent,
                        None => break,
                    }
                }
                return Ok(Anchor::Child {
                    parent: cur,
                    index: self.tree.child_count(cur),
                });
            }
        }
        // Slot lands between subtrees (candidate shallower than the
        // target depth, or one past the last node): the anchor follows
        // the previous node's enclosing subtree at the required depth.
        let Some(mut prev) = self.index.at(pos as isize - 1) else {
            return Ok(Anchor::Child {
                parent: self.tree.root(),
                index: 0,
            });
        };
        while self.tree.depth(prev) > required_depth {
            match self.tree.parent(prev) {
                Some(parent) => prev = parent,
                None => break,
            }
        }
        if self.tree.depth(prev) == required_depth {
            match self.tree.parent(prev) {
                Some(parent) => Ok(Anchor::Child {
                    parent,
                    index: self.tree.position(prev) + 1,
                }),
                None => Ok(Anchor::Root),
            }
        } else {
            // The previous context is shallower than the target depth:
            // the slot is past the end of its child list.
            Ok(Anchor::Child {
                parent: prev,
                index: self.tree.child_count(prev),
            })
        }
    }

    fn anchor_to(&self, node: NodeId) -> Anchor {
        match self.tree.parent(node) {
            Some(parent) => Anchor::Child {
                parent,
                index: self.tree.position(node),
            },
            None => Anchor::Root,
        }
    }
}
