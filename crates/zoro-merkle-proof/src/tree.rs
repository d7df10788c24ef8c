//! The partial merkle tree proof and the leaves it yields on verification.

use crate::hash::Hash256;

/// Compact proof that a subset of leaves belongs to a merkle tree with a known root.
///
/// The tree is walked depth-first, left to right. Every visited node contributes one bit:
/// set if the node is an ancestor of (or is) a matched leaf. Nodes that are not descended into
/// (pruned subtrees and leaves) additionally contribute their hash. Bit and hash counts are
/// therefore fully determined by the leaf count and the match pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialMerkleTree {
    pub(crate) leaf_count: u32,
    pub(crate) hashes: Vec<Hash256>,
    pub(crate) bits: Vec<bool>,
}

/// A leaf recovered from a verified proof
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedLeaf {
    /// Position of the leaf in the block's transaction list
    pub position: u32,
    /// Leaf hash (transaction id in internal byte order)
    pub hash: Hash256,
}

impl PartialMerkleTree {
    /// Assemble a tree from raw parts without any validation.
    ///
    /// Verification derives everything it needs from the traversal, so an inconsistent tree is
    /// rejected there rather than here.
    pub fn from_parts(leaf_count: u32, hashes: Vec<Hash256>, bits: Vec<bool>) -> Self {
        Self {
            leaf_count,
            hashes,
            bits,
        }
    }

    /// Number of leaves in the full tree
    pub fn leaf_count(&self) -> u32 {
        self.leaf_count
    }

    /// Stored hashes in traversal order
    pub fn hashes(&self) -> &[Hash256] {
        &self.hashes
    }

    /// Traversal flags in traversal order
    pub fn bits(&self) -> &[bool] {
        &self.bits
    }
}
