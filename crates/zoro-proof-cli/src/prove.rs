//! CLI wrapper for the prove functionality

use std::path::PathBuf;

use bitcoin::{BlockHash, Txid};
use clap::Args;
use zoro_merkle_proof::{block_hash_for, prove_transactions, HeightSpec};

use crate::block::load_chain;

/// CLI arguments for the `prove` subcommand
#[derive(Clone, Debug, Args)]
pub struct ProveArgs {
    /// Block files in chain order
    #[arg(long = "block", required = true)]
    blocks: Vec<PathBuf>,
    /// Transaction IDs to prove
    #[arg(long = "txid", required = true)]
    txids: Vec<Txid>,
    /// Block containing the transactions, located through the txids if omitted
    #[arg(long)]
    block_hash: Option<BlockHash>,
    /// Height of the block containing the transactions (negative counts back from the tip)
    #[arg(long, allow_hyphen_values = true, conflicts_with = "block_hash")]
    height: Option<HeightSpec>,
}

/// Run the `prove` subcommand: build a proof and print it as hex
pub fn run(args: ProveArgs) -> Result<(), anyhow::Error> {
    let chain = load_chain(&args.blocks)?;

    let block_hash = match (args.block_hash, args.height) {
        (Some(block_hash), _) => Some(block_hash),
        (None, Some(height)) => Some(block_hash_for(&chain, height)?),
        (None, None) => None,
    };

    let proof = prove_transactions(&chain, &args.txids, block_hash)?;
    println!("{}", proof.to_hex());
    Ok(())
}
