//! CLI wrapper for merkle root computation

use std::path::PathBuf;

use bitcoin::hashes::Hash;
use bitcoin::TxMerkleNode;
use clap::Args;
use tracing::warn;
use zoro_merkle_proof::{compute_root_with_mutation, Hash256};

use crate::block::load_block_file;

/// CLI arguments for the `root` subcommand
#[derive(Clone, Debug, Args)]
pub struct RootArgs {
    /// Path to the block file
    #[arg(long)]
    block: PathBuf,
}

/// Run the `root` subcommand: print the merkle root of a block and whether it is mutated
pub fn run(args: RootArgs) -> Result<(), anyhow::Error> {
    let block = load_block_file(&args.block)?;
    let leaves: Vec<Hash256> = block.tx.iter().map(|txid| txid.to_byte_array()).collect();
    let (root, mutation) = compute_root_with_mutation(&leaves)?;

    if let Some((height, position)) = mutation {
        warn!(
            "Block {} is mutated: duplicate nodes at height {}, position {}",
            block.hash, height, position
        );
    }

    let output = serde_json::json!({
        "hash": block.hash,
        "merkle_root": TxMerkleNode::from_byte_array(root),
        "mutated": mutation.is_some(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
