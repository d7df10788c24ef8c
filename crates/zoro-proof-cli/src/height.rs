//! CLI wrapper for height specifier resolution

use clap::Args;
use zoro_merkle_proof::{resolve_height, HeightSpec};

/// CLI arguments for the `height` subcommand
#[derive(Clone, Debug, Args)]
pub struct HeightArgs {
    /// Height of the chain tip
    #[arg(long)]
    tip: u32,
    /// Height to resolve, negative values count back from the tip (-1 is the tip)
    #[arg(allow_hyphen_values = true)]
    height: HeightSpec,
}

pub fn run(args: HeightArgs) -> Result<(), anyhow::Error> {
    println!("{}", resolve_height(args.height, args.tip)?);
    Ok(())
}
