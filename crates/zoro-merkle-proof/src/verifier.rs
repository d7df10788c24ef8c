//! Verification of a partial merkle tree against a trusted root.

use tracing::{debug, warn};

use crate::error::ProofError;
use crate::hash::{double_sha256, tree_height, tree_width, Hash256};
use crate::tree::{MatchedLeaf, PartialMerkleTree};

impl PartialMerkleTree {
    /// Reconstruct the root and the matched leaves without checking the root.
    ///
    /// Replays the builder's traversal, consuming bits and hashes in the same order. Every bit
    /// and every hash must be consumed exactly. Matched leaves are returned in position order.
    pub fn extract_matches(&self) -> Result<(Hash256, Vec<MatchedLeaf>), ProofError> {
        if self.leaf_count == 0 {
            return Err(ProofError::EmptyInput);
        }
        if self.hashes.len() > self.leaf_count as usize {
            return Err(ProofError::malformed(format!(
                "{} hashes for {} leaves",
                self.hashes.len(),
                self.leaf_count
            )));
        }
        if self.bits.len() < self.hashes.len() {
            return Err(ProofError::malformed(format!(
                "{} bits for {} hashes",
                self.bits.len(),
                self.hashes.len()
            )));
        }

        let mut cursor = Cursor {
            tree: self,
            bits_used: 0,
            hashes_used: 0,
            matches: Vec::new(),
        };
        let (root, _) = cursor.traverse(tree_height(self.leaf_count), 0)?;

        if cursor.bits_used != self.bits.len() {
            return Err(ProofError::malformed(format!(
                "{} of {} bits consumed",
                cursor.bits_used,
                self.bits.len()
            )));
        }
        if cursor.hashes_used != self.hashes.len() {
            return Err(ProofError::malformed(format!(
                "{} of {} hashes consumed",
                cursor.hashes_used,
                self.hashes.len()
            )));
        }

        debug!(
            "Extracted {} matches from {} leaves",
            cursor.matches.len(),
            self.leaf_count
        );
        Ok((root, cursor.matches))
    }

    /// Verify the proof against `expected_root` and return the matched leaves
    pub fn verify(&self, expected_root: &Hash256) -> Result<Vec<MatchedLeaf>, ProofError> {
        let (root, matches) = self.extract_matches()?;
        if root != *expected_root {
            warn!(
                "Partial merkle tree root {} does not match {}",
                hex::encode(root),
                hex::encode(expected_root)
            );
            return Err(ProofError::RootMismatch {
                expected: *expected_root,
                computed: root,
            });
        }
        Ok(matches)
    }
}

struct Cursor<'a> {
    tree: &'a PartialMerkleTree,
    bits_used: usize,
    hashes_used: usize,
    matches: Vec<MatchedLeaf>,
}

impl Cursor<'_> {
    fn next_bit(&mut self) -> Result<bool, ProofError> {
        let bit = *self
            .tree
            .bits
            .get(self.bits_used)
            .ok_or_else(|| ProofError::malformed("ran out of bits"))?;
        self.bits_used += 1;
        Ok(bit)
    }

    fn next_hash(&mut self) -> Result<Hash256, ProofError> {
        let hash = *self
            .tree
            .hashes
            .get(self.hashes_used)
            .ok_or_else(|| ProofError::malformed("ran out of hashes"))?;
        self.hashes_used += 1;
        Ok(hash)
    }

    /// Returns the subtree hash and whether the subtree holds a matched leaf
    fn traverse(&mut self, height: u32, pos: u32) -> Result<(Hash256, bool), ProofError> {
        let contains_match = self.next_bit()?;

        if height == 0 || !contains_match {
            let hash = self.next_hash()?;
            let matched = height == 0 && contains_match;
            if matched {
                self.matches.push(MatchedLeaf {
                    position: pos,
                    hash,
                });
            }
            return Ok((hash, matched));
        }

        let (left, left_matched) = self.traverse(height - 1, pos * 2)?;
        let (right, right_matched) =
            if pos * 2 + 1 < tree_width(self.tree.leaf_count, height - 1) {
                let (right, right_matched) = self.traverse(height - 1, pos * 2 + 1)?;
                // Equal real siblings make the tree indistinguishable from one with the right
                // subtree dropped, letting a single leaf be claimed at two positions
                if right == left {
                    return Err(ProofError::DuplicateHashAmbiguity {
                        height: height - 1,
                        position: pos * 2,
                    });
                }
                (right, right_matched)
            } else {
                (left, false)
            };
        // An expanded node must lead to a match, otherwise a cleared leaf bit would
        // silently drop that leaf from the result
        if !left_matched && !right_matched {
            return Err(ProofError::malformed(format!(
                "non-minimal expansion at height {height}, position {pos}"
            )));
        }
        Ok((double_sha256(&left, &right), true))
    }
}
