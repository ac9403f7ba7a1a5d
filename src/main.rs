use crate::args::Args;
use clap::Parser;
use cluster_seeder::cluster::{ClusterSession, RunSummary};
use cluster_seeder::config::ClusterConfig;
use cluster_seeder::connection::PgConnector;
use cluster_seeder::error::SeederResult;
use cluster_seeder::manifest::Manifest;
use cluster_seeder::transaction::TransactionGenerator;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs::File;
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod args;

fn main() {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(&args) {
        Ok(summary) => info!(
            "Inserted {} transactions into {} with audit twins, drawn from {} customers",
            summary.inserted, summary.target, summary.customers
        ),
        Err(e) => {
            let report = e.report();
            error!(critical = true, "{report}");
            eprintln!("cluster-seeder: error: {report}");
            process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn run(args: &Args) -> SeederResult<RunSummary> {
    let mut config = ClusterConfig::load(&args.config)?;
    if let Some(transactions) = args.transactions {
        config.run.transactions = transactions;
    }

    let mut manifest = args
        .manifest
        .as_deref()
        .map(Manifest::<File>::create)
        .transpose()?;
    let mut generator = TransactionGenerator::new(StdRng::from_entropy());

    let mut cluster = ClusterSession::open(&PgConnector, &config)?;
    let summary = cluster.insert_transactions(
        &mut generator,
        config.run.target,
        config.run.transactions,
        manifest.as_mut(),
    )?;
    if let Some(manifest) = manifest.as_mut() {
        manifest.flush()?;
    }

    match cluster.close().into_iter().next() {
        Some(failure) => Err(failure.into()),
        None => Ok(summary),
    }
}
