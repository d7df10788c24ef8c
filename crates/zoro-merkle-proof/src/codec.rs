//! Wire format of a partial merkle tree.
//!
//! ```text
//! compact(leaf_count)
//! compact(hash_count) || hash_count * 32-byte hash
//! compact(bit_byte_count) || bit_byte_count * byte   (bits packed LSB first)
//! ```
//!
//! Every length prefix is bounded by what the declared leaf count allows before anything is
//! allocated, and the bits must describe exactly one complete traversal.

use bitcoin::consensus::encode::{deserialize_partial, serialize, VarInt};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::ProofError;
use crate::hash::{node_count, tree_height, tree_width, Hash256};
use crate::tree::PartialMerkleTree;

/// Maximum serialized block size in bytes
pub const MAX_BLOCK_SIZE: u32 = 2_000_000;

/// Minimum serialized transaction size in bytes
pub const MIN_TRANSACTION_SIZE: u32 = 60;

/// Upper bound on the number of transactions a block can carry
pub const MAX_LEAF_COUNT: u32 = MAX_BLOCK_SIZE / MIN_TRANSACTION_SIZE;

/// Bounds applied while decoding untrusted proofs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeLimits {
    /// Largest leaf count accepted
    pub max_leaf_count: u32,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_leaf_count: MAX_LEAF_COUNT,
        }
    }
}

impl PartialMerkleTree {
    /// Serialize the tree
    pub fn encode(&self) -> Vec<u8> {
        let packed = pack_bits(&self.bits);
        let mut out = Vec::with_capacity(self.hashes.len() * 32 + packed.len() + 15);
        out.extend(serialize(&VarInt(self.leaf_count as u64)));
        out.extend(serialize(&VarInt(self.hashes.len() as u64)));
        for hash in &self.hashes {
            out.extend_from_slice(hash);
        }
        out.extend(serialize(&VarInt(packed.len() as u64)));
        out.extend_from_slice(&packed);
        out
    }

    /// Serialize the tree as a hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    /// Deserialize a tree with the default [`DecodeLimits`]
    pub fn decode(bytes: &[u8]) -> Result<Self, ProofError> {
        Self::decode_with_limits(bytes, &DecodeLimits::default())
    }

    /// Deserialize a tree from a hex string with the default [`DecodeLimits`]
    pub fn from_hex(s: &str) -> Result<Self, ProofError> {
        let bytes =
            hex::decode(s).map_err(|e| ProofError::malformed(format!("invalid hex: {e}")))?;
        Self::decode(&bytes)
    }

    /// Deserialize a tree, rejecting trailing bytes
    pub fn decode_with_limits(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, ProofError> {
        let mut reader = Reader::new(bytes);
        let tree = Self::read(&mut reader, limits)?;
        if !reader.is_empty() {
            return Err(ProofError::malformed(format!(
                "{} trailing bytes",
                reader.remaining()
            )));
        }
        Ok(tree)
    }

    pub(crate) fn read(reader: &mut Reader<'_>, limits: &DecodeLimits) -> Result<Self, ProofError> {
        let leaf_count = reader.compact("leaf count")?;
        if leaf_count == 0 {
            return Err(ProofError::EmptyInput);
        }
        if leaf_count > limits.max_leaf_count as u64 {
            return Err(ProofError::TooManyLeaves {
                count: leaf_count,
                max: limits.max_leaf_count as u64,
            });
        }
        let leaf_count = leaf_count as u32;

        let hash_count = reader.compact("hash count")?;
        if hash_count > leaf_count as u64 {
            return Err(ProofError::malformed(format!(
                "{hash_count} hashes for {leaf_count} leaves"
            )));
        }
        let hash_bytes = (hash_count as usize)
            .checked_mul(32)
            .ok_or_else(|| ProofError::malformed(format!("{hash_count} hashes overflow")))?;
        let hashes: Vec<Hash256> = reader
            .take(hash_bytes, "hashes")?
            .chunks_exact(32)
            .map(|chunk| {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(chunk);
                hash
            })
            .collect();

        let max_bit_bytes = node_count(leaf_count).div_ceil(8);
        let bit_byte_count = reader.compact("bit byte count")?;
        if bit_byte_count > max_bit_bytes {
            return Err(ProofError::malformed(format!(
                "{bit_byte_count} bit bytes for {leaf_count} leaves, at most {max_bit_bytes}"
            )));
        }
        let packed = reader.take(bit_byte_count as usize, "bits")?;
        let mut bits = unpack_bits(packed);

        let (bits_used, hashes_used) = walk_shape(leaf_count, &bits)?;
        if hashes_used != hashes.len() {
            return Err(ProofError::malformed(format!(
                "traversal needs {hashes_used} hashes, {} supplied",
                hashes.len()
            )));
        }
        if bits_used.div_ceil(8) != packed.len() {
            return Err(ProofError::malformed(format!(
                "traversal needs {bits_used} bits, {} bytes supplied",
                packed.len()
            )));
        }
        if bits[bits_used..].iter().any(|bit| *bit) {
            return Err(ProofError::malformed("non-zero padding bits"));
        }
        bits.truncate(bits_used);

        trace!(
            "Decoded partial merkle tree: {} leaves, {} bits, {} hashes",
            leaf_count,
            bits.len(),
            hashes.len()
        );

        Ok(Self {
            leaf_count,
            hashes,
            bits,
        })
    }
}

/// Cursor over an encoded proof
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub(crate) fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub(crate) fn compact(&mut self, field: &str) -> Result<u64, ProofError> {
        let (VarInt(value), used) = deserialize_partial::<VarInt>(&self.data[self.pos..])
            .map_err(|e| ProofError::malformed(format!("invalid {field}: {e}")))?;
        self.pos += used;
        Ok(value)
    }

    pub(crate) fn take(&mut self, len: usize, field: &str) -> Result<&'a [u8], ProofError> {
        if len > self.remaining() {
            return Err(ProofError::malformed(format!(
                "truncated {field}: {len} bytes expected, {} left",
                self.remaining()
            )));
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }
}

fn pack_bits(bits: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; bits.len().div_ceil(8)];
    for (i, bit) in bits.iter().enumerate() {
        bytes[i / 8] |= (*bit as u8) << (i % 8);
    }
    bytes
}

fn unpack_bits(bytes: &[u8]) -> Vec<bool> {
    (0..bytes.len() * 8)
        .map(|i| bytes[i / 8] & (1 << (i % 8)) != 0)
        .collect()
}

/// Replay the traversal over the bits alone, returning the number of bits and hashes it consumes
fn walk_shape(leaf_count: u32, bits: &[bool]) -> Result<(usize, usize), ProofError> {
    struct Shape<'a> {
        leaf_count: u32,
        bits: &'a [bool],
        bits_used: usize,
        hashes_used: usize,
    }

    impl Shape<'_> {
        /// Returns whether the subtree holds a matched leaf
        fn visit(&mut self, height: u32, pos: u32) -> Result<bool, ProofError> {
            let contains_match = *self
                .bits
                .get(self.bits_used)
                .ok_or_else(|| ProofError::malformed("ran out of bits"))?;
            self.bits_used += 1;

            if height == 0 || !contains_match {
                self.hashes_used += 1;
                return Ok(contains_match);
            }
            let mut matched = self.visit(height - 1, pos * 2)?;
            if pos * 2 + 1 < tree_width(self.leaf_count, height - 1) {
                matched |= self.visit(height - 1, pos * 2 + 1)?;
            }
            if !matched {
                return Err(ProofError::malformed(format!(
                    "non-minimal expansion at height {height}, position {pos}"
                )));
            }
            Ok(true)
        }
    }

    let mut shape = Shape {
        leaf_count,
        bits,
        bits_used: 0,
        hashes_used: 0,
    };
    shape.visit(tree_height(leaf_count), 0)?;
    Ok((shape.bits_used, shape.hashes_used))
}
