#![doc = include_str!("../README.md")]

use clap::{command, Parser, Subcommand};
use tracing::{error, info, subscriber::set_global_default};
use tracing_subscriber::filter::EnvFilter;

mod block;
mod height;
mod prove;
mod root;
mod verify;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    /// Compute the merkle root of a block file
    Root(root::RootArgs),
    /// Build a transaction inclusion proof
    Prove(prove::ProveArgs),
    /// Verify a transaction inclusion proof
    Verify(verify::VerifyArgs),
    /// Resolve a height specifier against a chain tip
    Height(height::HeightArgs),
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber_builder =
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(env_filter);

    let subscriber = subscriber_builder.with_writer(std::io::stderr).finish();
    set_global_default(subscriber).expect("Failed to set subscriber");
}

fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let res = match cli.command {
        Commands::Root(args) => root::run(args),
        Commands::Prove(args) => prove::run(args),
        Commands::Verify(args) => verify::run(args),
        Commands::Height(args) => height::run(args),
    };

    match res {
        Ok(_) => {
            info!("Zoro proof client has exited without errors");
            std::process::exit(0);
        }
        Err(err) => {
            error!("Zoro proof client has exited with error: {}", err);
            std::process::exit(1);
        }
    }
}
