//! Construction of a partial merkle tree from a block's full leaf list.

use std::ops::Range;

use tracing::debug;

use crate::error::ProofError;
use crate::hash::{compute_root_with_mutation, double_sha256, tree_height, tree_width, Hash256};
use crate::tree::PartialMerkleTree;

impl PartialMerkleTree {
    /// Build the minimal proof for the leaves at `matched` positions.
    ///
    /// Positions may repeat and may come in any order. An empty match set is allowed and yields
    /// a proof of the root alone. Leaf lists with a mutated root are rejected, since a tree over
    /// them would let one leaf stand in for two positions.
    pub fn build(leaves: &[Hash256], matched: &[u32]) -> Result<Self, ProofError> {
        if leaves.is_empty() {
            return Err(ProofError::EmptyInput);
        }
        let leaf_count = u32::try_from(leaves.len()).map_err(|_| ProofError::TooManyLeaves {
            count: leaves.len() as u64,
            max: u32::MAX as u64,
        })?;

        if let (_, Some((height, position))) = compute_root_with_mutation(leaves)? {
            return Err(ProofError::DuplicateHashAmbiguity { height, position });
        }

        let mut flags = vec![false; leaves.len()];
        for &position in matched {
            if position >= leaf_count {
                return Err(ProofError::PositionOutOfRange {
                    position,
                    leaf_count,
                });
            }
            flags[position as usize] = true;
        }

        let mut builder = Builder {
            leaves,
            matched: &flags,
            bits: Vec::new(),
            hashes: Vec::new(),
        };
        builder.traverse(tree_height(leaf_count), 0);

        debug!(
            "Built partial merkle tree: {} leaves, {} matched, {} bits, {} hashes",
            leaf_count,
            flags.iter().filter(|m| **m).count(),
            builder.bits.len(),
            builder.hashes.len()
        );

        Ok(Self {
            leaf_count,
            hashes: builder.hashes,
            bits: builder.bits,
        })
    }
}

struct Builder<'a> {
    leaves: &'a [Hash256],
    matched: &'a [bool],
    bits: Vec<bool>,
    hashes: Vec<Hash256>,
}

impl Builder<'_> {
    fn leaf_count(&self) -> u32 {
        self.leaves.len() as u32
    }

    /// Leaves covered by the node at (`height`, `pos`)
    fn leaf_range(&self, height: u32, pos: u32) -> Range<usize> {
        let start = (pos as usize) << height;
        let end = ((pos as usize + 1) << height).min(self.leaves.len());
        start..end
    }

    fn subtree_hash(&self, height: u32, pos: u32) -> Hash256 {
        if height == 0 {
            return self.leaves[pos as usize];
        }
        let left = self.subtree_hash(height - 1, pos * 2);
        let right = if pos * 2 + 1 < tree_width(self.leaf_count(), height - 1) {
            self.subtree_hash(height - 1, pos * 2 + 1)
        } else {
            left
        };
        double_sha256(&left, &right)
    }

    fn traverse(&mut self, height: u32, pos: u32) {
        let contains_match = self.matched[self.leaf_range(height, pos)]
            .iter()
            .any(|matched| *matched);
        self.bits.push(contains_match);

        if height == 0 || !contains_match {
            let hash = self.subtree_hash(height, pos);
            self.hashes.push(hash);
        } else {
            self.traverse(height - 1, pos * 2);
            // A missing right child is never visited, its parent reuses the left hash
            if pos * 2 + 1 < tree_width(self.leaf_count(), height - 1) {
                self.traverse(height - 1, pos * 2 + 1);
            }
        }
    }
}
