//! CLI wrapper for the verify functionality

use std::path::PathBuf;

use clap::Args;
use tracing::{error, info, warn};
use zoro_merkle_proof::{
    verify_transaction_proof, ChainError, DecodeLimits, ProofError, ProofErrorKind,
    TransactionProof, MAX_LEAF_COUNT,
};

use crate::block::load_chain;

/// CLI arguments for the `verify` subcommand
#[derive(Clone, Debug, Args)]
pub struct VerifyArgs {
    /// Block files in chain order, header-only entries are enough
    #[arg(long = "block", required = true)]
    blocks: Vec<PathBuf>,
    /// Hex-encoded transaction proof
    #[arg(long)]
    proof: String,
    /// Largest leaf count accepted when decoding the proof
    #[arg(long, env = "ZORO_MAX_LEAF_COUNT", default_value_t = MAX_LEAF_COUNT)]
    max_leaf_count: u32,
}

/// Run the `verify` subcommand: check a proof against the loaded headers and print the
/// proven transaction IDs
pub fn run(args: VerifyArgs) -> Result<(), anyhow::Error> {
    let chain = load_chain(&args.blocks)?;
    let limits = DecodeLimits {
        max_leaf_count: args.max_leaf_count,
    };

    let proof = TransactionProof::from_hex(args.proof.trim(), &limits).map_err(|err| {
        log_rejection(&err);
        err
    })?;
    info!("Verifying transaction proof for block {} ...", proof.block_hash);

    let txids = match verify_transaction_proof(&chain, &proof) {
        Ok(txids) => txids,
        Err(ChainError::Proof(err)) => {
            log_rejection(&err);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    };

    info!("Verification successful!");
    println!("{}", serde_json::to_string_pretty(&txids)?);
    Ok(())
}

/// Log a rejected proof according to the class of failure
fn log_rejection(err: &ProofError) {
    match err.kind() {
        ProofErrorKind::Malformed => warn!("Rejected malformed proof: {}", err),
        ProofErrorKind::RootMismatch => warn!("Proof does not match the block header: {}", err),
        ProofErrorKind::SecurityCheck => error!("Proof failed a security check: {}", err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::hashes::Hash;
    use bitcoin::{BlockHash, Txid};
    use std::io::Write;
    use tempfile::NamedTempFile;
    use zoro_merkle_proof::{prove_transactions, MemoryChain};

    use crate::block::BlockFile;

    fn block_file() -> (NamedTempFile, MemoryChain) {
        let block = BlockFile {
            hash: BlockHash::from_byte_array([0x80; 32]),
            merkle_root: None,
            tx: (1..=3).map(|i| Txid::from_byte_array([i; 32])).collect(),
        };
        let mut chain = MemoryChain::new();
        chain.push_block(block.hash, block.tx.clone()).unwrap();
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&block).unwrap().as_bytes())
            .unwrap();
        (file, chain)
    }

    fn args(file: &NamedTempFile, proof: String) -> VerifyArgs {
        VerifyArgs {
            blocks: vec![file.path().to_path_buf()],
            proof,
            max_leaf_count: MAX_LEAF_COUNT,
        }
    }

    #[test]
    fn test_verify_accepts_valid_proof() {
        let (file, chain) = block_file();
        let proof = prove_transactions(&chain, &[Txid::from_byte_array([2; 32])], None).unwrap();
        assert!(run(args(&file, proof.to_hex())).is_ok());
    }

    #[test]
    fn test_verify_reports_malformed_proof() {
        let (file, chain) = block_file();
        let proof = prove_transactions(&chain, &[Txid::from_byte_array([2; 32])], None).unwrap();
        // A trailing byte after an otherwise valid proof
        let err = run(args(&file, format!("{}00", proof.to_hex()))).unwrap_err();
        let err = err.downcast::<ProofError>().unwrap();
        assert_eq!(err.kind(), ProofErrorKind::Malformed);
    }
}
