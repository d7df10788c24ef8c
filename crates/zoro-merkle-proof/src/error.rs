//! Error types for partial merkle tree construction, decoding and verification.

use thiserror::Error;

use crate::hash::Hash256;

/// Errors produced while building, decoding or verifying a partial merkle tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// No leaves were supplied, or a proof declares zero leaves
    #[error("Empty input: a merkle tree needs at least one leaf")]
    EmptyInput,
    /// The proof structure is inconsistent with its own leaf count
    #[error("Malformed proof: {0}")]
    MalformedProof(String),
    /// The declared leaf count exceeds the configured bound
    #[error("Too many leaves: {count} exceeds the limit of {max}")]
    TooManyLeaves { count: u64, max: u64 },
    /// A requested position does not address a leaf
    #[error("Position {position} is out of range for {leaf_count} leaves")]
    PositionOutOfRange { position: u32, leaf_count: u32 },
    /// The proof is well formed but commits to a different root
    #[error(
        "Merkle root mismatch: expected {}, computed {}",
        hex::encode(.expected),
        hex::encode(.computed)
    )]
    RootMismatch {
        expected: Hash256,
        computed: Hash256,
    },
    /// Two sibling nodes carry the same hash, so one leaf could be claimed at two positions
    #[error("Duplicate hash ambiguity at height {height}, position {position}")]
    DuplicateHashAmbiguity { height: u32, position: u32 },
}

/// Coarse classification of a [`ProofError`], used to report rejected proofs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofErrorKind {
    /// Structurally invalid input
    Malformed,
    /// Well formed, but the reconstructed root is not the trusted one
    RootMismatch,
    /// Well formed and possibly matching the root, but a security check failed
    SecurityCheck,
}

impl ProofError {
    pub fn kind(&self) -> ProofErrorKind {
        match self {
            ProofError::EmptyInput
            | ProofError::MalformedProof(_)
            | ProofError::TooManyLeaves { .. }
            | ProofError::PositionOutOfRange { .. } => ProofErrorKind::Malformed,
            ProofError::RootMismatch { .. } => ProofErrorKind::RootMismatch,
            ProofError::DuplicateHashAmbiguity { .. } => ProofErrorKind::SecurityCheck,
        }
    }

    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ProofError::MalformedProof(reason.into())
    }
}
