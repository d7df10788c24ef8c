//! Zoro merkle proof library
//!
//! Compact proofs that a set of transactions is included in a block whose header the
//! verifier already trusts. A full node builds a [`PartialMerkleTree`] over the block's
//! transaction ids; a light client holding only the header checks it against the header's
//! merkle root and learns which transactions matched.

mod builder;
pub mod chain;
pub mod codec;
pub mod error;
pub mod hash;
pub mod height;
pub mod tree;
mod verifier;

pub use chain::{
    prove_transactions, verify_transaction_proof, ChainError, ChainView, MemoryChain,
    TransactionProof,
};
pub use codec::{DecodeLimits, MAX_LEAF_COUNT};
pub use error::{ProofError, ProofErrorKind};
pub use hash::{compute_level, compute_root, compute_root_with_mutation, Hash256};
pub use height::{block_hash_for, resolve_height, HeightSpec};
pub use tree::{MatchedLeaf, PartialMerkleTree};
