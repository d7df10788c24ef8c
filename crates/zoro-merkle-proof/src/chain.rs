//! Transaction inclusion proofs over a block source.
//!
//! The block source (node storage, an RPC backend, a header store on a light client) is
//! abstracted by [`ChainView`]. Proving needs the full transaction list of the block; verifying
//! only needs the merkle root of a trusted header.

use std::collections::{HashMap, HashSet};

use bitcoin::hashes::Hash;
use bitcoin::{BlockHash, TxMerkleNode, Txid};
use thiserror::Error;
use tracing::{debug, info};

use crate::codec::{DecodeLimits, Reader};
use crate::error::ProofError;
use crate::hash::{compute_root, Hash256};
use crate::tree::PartialMerkleTree;

/// Errors raised by transaction-level proof operations
#[derive(Error, Debug)]
pub enum ChainError {
    /// The block or transaction cannot be located by the block source
    #[error("Not found: {0}")]
    NotFound(String),
    /// Height specifier outside of the chain
    #[error("Block height {height} is out of range (tip is at {tip})")]
    HeightOutOfRange { height: i64, tip: u32 },
    /// Height specifier that cannot be interpreted
    #[error("Invalid block height: {0}")]
    InvalidHeight(String),
    /// No transaction ids were requested
    #[error("No transaction ids requested")]
    EmptyRequest,
    /// The same transaction id was requested twice
    #[error("Duplicated txid: {0}")]
    DuplicateTxid(Txid),
    /// A requested transaction is not part of the selected block
    #[error("Transaction {0} is not in the selected block")]
    TxNotInBlock(Txid),
    /// Proof construction or verification failed
    #[error("Proof error: {0}")]
    Proof(#[from] ProofError),
}

/// Read access to the blocks known to the caller
#[cfg_attr(test, mockall::automock)]
pub trait ChainView {
    /// Hash of the block containing `txid`, if the source can tell
    fn locate_transaction(&self, txid: &Txid) -> Option<BlockHash>;
    /// Ordered transaction ids of a block, if its body is available
    fn block_txids(&self, block_hash: &BlockHash) -> Option<Vec<Txid>>;
    /// Merkle root committed to by a trusted header
    fn merkle_root(&self, block_hash: &BlockHash) -> Option<TxMerkleNode>;
    /// Height of the best block, `None` for an empty chain
    fn tip_height(&self) -> Option<u32>;
    /// Hash of the block at `height` on the best chain
    fn block_hash_at(&self, height: u32) -> Option<BlockHash>;
}

/// Proof that a set of transactions is included in a specific block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionProof {
    /// Block the transactions are included in
    pub block_hash: BlockHash,
    /// Partial merkle tree over the block's transaction ids
    pub tree: PartialMerkleTree,
}

impl TransactionProof {
    /// Serialize as the 32-byte block hash followed by the encoded tree
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.block_hash.to_byte_array().to_vec();
        out.extend(self.tree.encode());
        out
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.encode())
    }

    pub fn decode_with_limits(bytes: &[u8], limits: &DecodeLimits) -> Result<Self, ProofError> {
        let mut reader = Reader::new(bytes);
        let block_hash: [u8; 32] = reader
            .take(32, "block hash")?
            .try_into()
            .map_err(|_| ProofError::malformed("invalid block hash"))?;
        let tree = PartialMerkleTree::read(&mut reader, limits)?;
        if !reader.is_empty() {
            return Err(ProofError::malformed(format!(
                "{} trailing bytes",
                reader.remaining()
            )));
        }
        Ok(Self {
            block_hash: BlockHash::from_byte_array(block_hash),
            tree,
        })
    }

    pub fn from_hex(s: &str, limits: &DecodeLimits) -> Result<Self, ProofError> {
        let bytes =
            hex::decode(s).map_err(|e| ProofError::malformed(format!("invalid hex: {e}")))?;
        Self::decode_with_limits(&bytes, limits)
    }
}

/// Build a proof that all of `txids` are included in one block.
///
/// When `block_hash` is not given, the block is located through the first txid the chain can
/// place. Every requested txid must then be part of that block.
pub fn prove_transactions<C: ChainView + ?Sized>(
    chain: &C,
    txids: &[Txid],
    block_hash: Option<BlockHash>,
) -> Result<TransactionProof, ChainError> {
    if txids.is_empty() {
        return Err(ChainError::EmptyRequest);
    }
    let mut requested = HashSet::with_capacity(txids.len());
    for txid in txids {
        if !requested.insert(*txid) {
            return Err(ChainError::DuplicateTxid(*txid));
        }
    }

    let block_hash = match block_hash {
        Some(block_hash) => block_hash,
        None => txids
            .iter()
            .find_map(|txid| chain.locate_transaction(txid))
            .ok_or_else(|| {
                ChainError::NotFound("transaction not yet in block or block unknown".to_string())
            })?,
    };
    let block_txids = chain
        .block_txids(&block_hash)
        .ok_or_else(|| ChainError::NotFound(format!("block {block_hash} not available")))?;

    let in_block: HashSet<&Txid> = block_txids.iter().collect();
    if let Some(missing) = txids.iter().find(|txid| !in_block.contains(txid)) {
        return Err(ChainError::TxNotInBlock(*missing));
    }

    let leaves: Vec<Hash256> = block_txids.iter().map(|txid| txid.to_byte_array()).collect();
    let matched: Vec<u32> = block_txids
        .iter()
        .enumerate()
        .filter(|(_, txid)| requested.contains(*txid))
        .map(|(position, _)| position as u32)
        .collect();
    let tree = PartialMerkleTree::build(&leaves, &matched)?;

    info!(
        "Built inclusion proof for {} transaction(s) in block {}",
        matched.len(),
        block_hash
    );
    Ok(TransactionProof { block_hash, tree })
}

/// Verify `proof` against the header root known to `chain` and return the proven txids in
/// block order
pub fn verify_transaction_proof<C: ChainView + ?Sized>(
    chain: &C,
    proof: &TransactionProof,
) -> Result<Vec<Txid>, ChainError> {
    let merkle_root = chain
        .merkle_root(&proof.block_hash)
        .ok_or_else(|| ChainError::NotFound(format!("block {} not in chain", proof.block_hash)))?;
    let matches = proof.tree.verify(&merkle_root.to_byte_array())?;
    debug!(
        "Verified {} transaction(s) in block {}",
        matches.len(),
        proof.block_hash
    );
    Ok(matches
        .into_iter()
        .map(|leaf| Txid::from_byte_array(leaf.hash))
        .collect())
}

/// In-memory chain of full blocks and header-only entries
#[derive(Debug, Default, Clone)]
pub struct MemoryChain {
    blocks: Vec<BlockEntry>,
    heights: HashMap<BlockHash, u32>,
    tx_index: HashMap<Txid, BlockHash>,
}

#[derive(Debug, Clone)]
struct BlockEntry {
    hash: BlockHash,
    merkle_root: TxMerkleNode,
    txids: Option<Vec<Txid>>,
}

impl MemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block with its full transaction list at the next height, returning its merkle root
    pub fn push_block(
        &mut self,
        hash: BlockHash,
        txids: Vec<Txid>,
    ) -> Result<TxMerkleNode, ChainError> {
        let leaves: Vec<Hash256> = txids.iter().map(|txid| txid.to_byte_array()).collect();
        let merkle_root = TxMerkleNode::from_byte_array(compute_root(&leaves)?);
        for txid in &txids {
            self.tx_index.entry(*txid).or_insert(hash);
        }
        self.push_entry(BlockEntry {
            hash,
            merkle_root,
            txids: Some(txids),
        });
        Ok(merkle_root)
    }

    /// Append a header-only block at the next height
    pub fn push_header(&mut self, hash: BlockHash, merkle_root: TxMerkleNode) {
        self.push_entry(BlockEntry {
            hash,
            merkle_root,
            txids: None,
        });
    }

    /// Height of a known block
    pub fn height_of(&self, hash: &BlockHash) -> Option<u32> {
        self.heights.get(hash).copied()
    }

    fn push_entry(&mut self, entry: BlockEntry) {
        let height = self.blocks.len() as u32;
        debug!("Adding block {} at height {}", entry.hash, height);
        self.heights.insert(entry.hash, height);
        self.blocks.push(entry);
    }

    fn entry(&self, hash: &BlockHash) -> Option<&BlockEntry> {
        self.height_of(hash)
            .and_then(|height| self.blocks.get(height as usize))
    }
}

impl ChainView for MemoryChain {
    fn locate_transaction(&self, txid: &Txid) -> Option<BlockHash> {
        self.tx_index.get(txid).copied()
    }

    fn block_txids(&self, block_hash: &BlockHash) -> Option<Vec<Txid>> {
        self.entry(block_hash).and_then(|entry| entry.txids.clone())
    }

    fn merkle_root(&self, block_hash: &BlockHash) -> Option<TxMerkleNode> {
        self.entry(block_hash).map(|entry| entry.merkle_root)
    }

    fn tip_height(&self) -> Option<u32> {
        self.blocks.len().checked_sub(1).map(|tip| tip as u32)
    }

    fn block_hash_at(&self, height: u32) -> Option<BlockHash> {
        self.blocks.get(height as usize).map(|entry| entry.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProofErrorKind;
    use crate::hash::double_sha256;

    fn txid(i: u8) -> Txid {
        Txid::from_byte_array([i; 32])
    }

    fn block_hash(i: u8) -> BlockHash {
        BlockHash::from_byte_array([0x80 | i; 32])
    }

    #[test]
    fn test_prove_locates_block() {
        let txids = vec![txid(1), txid(2), txid(3)];
        let mut chain = MockChainView::new();
        chain
            .expect_locate_transaction()
            .returning(|txid| (*txid == Txid::from_byte_array([2; 32])).then(|| block_hash(1)));
        let block_txids = txids.clone();
        chain
            .expect_block_txids()
            .withf(|hash| *hash == block_hash(1))
            .returning(move |_| Some(block_txids.clone()));

        // The first txid cannot be placed, the second one can
        let proof = prove_transactions(&chain, &[txid(3), txid(2)], None).unwrap();
        assert_eq!(proof.block_hash, block_hash(1));
        assert_eq!(proof.tree.leaf_count(), 3);
    }

    #[test]
    fn test_prove_with_explicit_block_skips_lookup() {
        let mut chain = MockChainView::new();
        chain.expect_locate_transaction().times(0);
        chain
            .expect_block_txids()
            .returning(|_| Some(vec![txid(1), txid(2)]));
        let proof = prove_transactions(&chain, &[txid(1)], Some(block_hash(4))).unwrap();
        assert_eq!(proof.block_hash, block_hash(4));
    }

    #[test]
    fn test_prove_not_found() {
        let mut chain = MockChainView::new();
        chain.expect_locate_transaction().returning(|_| None);
        assert!(matches!(
            prove_transactions(&chain, &[txid(1)], None),
            Err(ChainError::NotFound(_))
        ));

        let mut chain = MockChainView::new();
        chain.expect_block_txids().returning(|_| None);
        assert!(matches!(
            prove_transactions(&chain, &[txid(1)], Some(block_hash(1))),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_prove_rejects_bad_requests() {
        let mut chain = MockChainView::new();
        chain
            .expect_block_txids()
            .returning(|_| Some(vec![txid(1), txid(2)]));

        assert!(matches!(
            prove_transactions(&chain, &[], Some(block_hash(1))),
            Err(ChainError::EmptyRequest)
        ));
        assert!(matches!(
            prove_transactions(&chain, &[txid(1), txid(1)], Some(block_hash(1))),
            Err(ChainError::DuplicateTxid(t)) if t == txid(1)
        ));
        assert!(matches!(
            prove_transactions(&chain, &[txid(1), txid(9)], Some(block_hash(1))),
            Err(ChainError::TxNotInBlock(t)) if t == txid(9)
        ));
    }

    #[test]
    fn test_prove_rejects_mutated_block() {
        let mut chain = MockChainView::new();
        chain
            .expect_block_txids()
            .returning(|_| Some(vec![txid(1), txid(2), txid(3), txid(3)]));
        let err = prove_transactions(&chain, &[txid(3)], Some(block_hash(1))).unwrap_err();
        match err {
            ChainError::Proof(err) => assert_eq!(err.kind(), ProofErrorKind::SecurityCheck),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_verify_requires_known_header() {
        let tree = PartialMerkleTree::build(&[[1u8; 32]], &[0]).unwrap();
        let proof = TransactionProof {
            block_hash: block_hash(1),
            tree,
        };
        let mut chain = MockChainView::new();
        chain.expect_merkle_root().returning(|_| None);
        assert!(matches!(
            verify_transaction_proof(&chain, &proof),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_memory_chain_round_trip() {
        let mut full = MemoryChain::new();
        let mut light = MemoryChain::new();
        for height in 0..3u8 {
            let txids: Vec<Txid> = (0..=height * 3).map(|i| txid(height * 16 + i)).collect();
            let root = full.push_block(block_hash(height), txids).unwrap();
            light.push_header(block_hash(height), root);
        }
        assert_eq!(full.tip_height(), Some(2));
        assert_eq!(light.block_hash_at(1), Some(block_hash(1)));
        assert_eq!(light.height_of(&block_hash(2)), Some(2));

        let requested = [txid(2 * 16 + 5), txid(2 * 16 + 1)];
        let proof = prove_transactions(&full, &requested, None).unwrap();
        let encoded = proof.to_hex();

        let decoded = TransactionProof::from_hex(&encoded, &DecodeLimits::default()).unwrap();
        assert_eq!(decoded, proof);
        // Header-only chains verify, results come back in block order
        assert_eq!(
            verify_transaction_proof(&light, &decoded).unwrap(),
            vec![txid(2 * 16 + 1), txid(2 * 16 + 5)]
        );
        assert!(light.block_txids(&block_hash(2)).is_none());
        assert!(matches!(
            prove_transactions(&light, &requested, Some(block_hash(2))),
            Err(ChainError::NotFound(_))
        ));
    }

    #[test]
    fn test_verify_against_wrong_block() {
        let mut chain = MemoryChain::new();
        chain.push_block(block_hash(0), vec![txid(1), txid(2)]).unwrap();
        chain.push_block(block_hash(1), vec![txid(3), txid(4)]).unwrap();

        let mut proof = prove_transactions(&chain, &[txid(1)], None).unwrap();
        proof.block_hash = block_hash(1);
        match verify_transaction_proof(&chain, &proof) {
            Err(ChainError::Proof(ProofError::RootMismatch { expected, computed })) => {
                assert_eq!(
                    computed,
                    double_sha256(&txid(1).to_byte_array(), &txid(2).to_byte_array())
                );
                assert_ne!(expected, computed);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_transaction_proof_rejects_trailing_bytes() {
        let mut chain = MemoryChain::new();
        chain.push_block(block_hash(0), vec![txid(1)]).unwrap();
        let proof = prove_transactions(&chain, &[txid(1)], None).unwrap();
        let mut bytes = proof.encode();
        bytes.push(0);
        assert!(TransactionProof::decode_with_limits(&bytes, &DecodeLimits::default()).is_err());
        assert!(
            TransactionProof::decode_with_limits(&bytes[..31], &DecodeLimits::default()).is_err()
        );
    }
}
