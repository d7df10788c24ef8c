//! Transaction merkle tree hashing.
//!
//! Nodes are combined with double SHA-256 over the concatenated children. A level of odd
//! width closes by pairing its last node with itself, which keeps compatibility with the
//! block header commitment but also means `[A, B, C]` and `[A, B, C, C]` share a root.

use sha2::{Digest, Sha256};

use crate::error::ProofError;

/// A 32-byte hash in internal byte order
pub type Hash256 = [u8; 32];

/// Compute SHA256d (double SHA256) of two concatenated child hashes
pub fn double_sha256(l: &Hash256, r: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(l);
    hasher.update(r);
    let h1 = hasher.finalize();

    let mut hasher2 = Sha256::new();
    hasher2.update(h1);
    hasher2.finalize().into()
}

/// Compute the parent level of `hashes`, duplicating the last element of an odd-width level
pub fn compute_level(hashes: &[Hash256]) -> Vec<Hash256> {
    hashes
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => double_sha256(left, right),
            [left] => double_sha256(left, left),
            _ => unreachable!("Chunk size is at most 2"),
        })
        .collect()
}

/// Compute the merkle root of an ordered list of leaves
pub fn compute_root(leaves: &[Hash256]) -> Result<Hash256, ProofError> {
    compute_root_with_mutation(leaves).map(|(root, _)| root)
}

/// Compute the merkle root together with the first mutated node, if any.
///
/// A node is mutated when it and its real right sibling carry the same hash: the level could
/// then be shortened (or the leaf list extended) without changing the root. The mutated node
/// is reported as `(height, position)` of the left sibling.
pub fn compute_root_with_mutation(
    leaves: &[Hash256],
) -> Result<(Hash256, Option<(u32, u32)>), ProofError> {
    if leaves.is_empty() {
        return Err(ProofError::EmptyInput);
    }

    let mut mutation = None;
    let mut level = leaves.to_vec();
    let mut height = 0u32;

    while level.len() > 1 {
        if mutation.is_none() {
            mutation = level
                .chunks_exact(2)
                .position(|pair| pair[0] == pair[1])
                .map(|pair_index| (height, (pair_index * 2) as u32));
        }
        level = compute_level(&level);
        height += 1;
    }

    Ok((level[0], mutation))
}

/// Number of nodes at `height` in a tree over `leaf_count` leaves
pub fn tree_width(leaf_count: u32, height: u32) -> u32 {
    let span = 1u64 << height;
    ((leaf_count as u64 + span - 1) >> height) as u32
}

/// Height of the root above the leaves (zero for a single leaf)
pub fn tree_height(leaf_count: u32) -> u32 {
    let mut height = 0;
    while tree_width(leaf_count, height) > 1 {
        height += 1;
    }
    height
}

/// Total number of nodes in a tree over `leaf_count` leaves, i.e. the most bits a traversal can emit
pub fn node_count(leaf_count: u32) -> u64 {
    (0..=tree_height(leaf_count))
        .map(|height| tree_width(leaf_count, height) as u64)
        .sum()
}
