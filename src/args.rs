use clap::Parser;
use std::path::PathBuf;

/// Seeds the primary of a simulated cluster with random transactions and their audit twins
#[derive(Debug, Parser)]
#[command(name = "cluster-seeder", version)]
pub struct Args {
    /// Path to the cluster configuration (TOML)
    #[arg(short = 'c', long)]
    pub config: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Number of transactions to insert (overrides [run].transactions)
    #[arg(short = 'n', long)]
    pub transactions: Option<u64>,

    /// Also write every dual-written record to this CSV file
    #[arg(long, value_name = "PATH")]
    pub manifest: Option<PathBuf>,
}
