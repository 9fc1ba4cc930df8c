use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

/// Compute sales facts and RFM customer segments from a retail
/// transaction log.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Path to the raw transaction CSV (ISO-8859-1 encoded).
    #[arg(default_value = "data/online_retail_II.csv")]
    input: PathBuf,

    /// Directory receiving the Parquet snapshots.
    #[arg(long, default_value = "assets")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let output = retail_rfm::run(&args.input, &args.out_dir)
        .with_context(|| format!("pipeline failed for {}", args.input.display()))?;

    println!(
        "Wrote {} sales facts and {} customer segments to {}",
        output.sales.len(),
        output.customers.len(),
        args.out_dir.display()
    );
    Ok(())
}
