//! Makes the per-process category histograms consumed by the limit fit.

use std::path::PathBuf;

use clap::Parser;

use limit_hists::cuts::Region;
use limit_hists::driver::{self, RunOptions, DEFAULT_COUPLINGS};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = "2016")]
    year: String,
    #[arg(long = "proc", default_value = "wjets")]
    process: String,
    #[arg(long, default_value = "mumu_OS_displaced")]
    category: String,
    /// ABCD region: A, B, C or D
    #[arg(long, default_value = "D")]
    region: String,
    #[arg(long = "ntuple_path", default_value = "/vols/cms/vc1117/LLP/nanoAOD_friends/HNL/28May21")]
    ntuple_path: PathBuf,
    #[arg(long = "output_path", default_value = "hists")]
    output_path: PathBuf,
    #[arg(long = "config_dir", default_value = "../config")]
    config_dir: PathBuf,
    /// Process collision data instead of simulation
    #[arg(long)]
    data: bool,
    /// Read only the first file of every sample
    #[arg(long = "test")]
    one_file: bool,
    /// Signal couplings to make histograms for
    #[arg(long, value_delimiter = ',', default_values_t = DEFAULT_COUPLINGS)]
    couplings: Vec<u32>,
    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long = "log_level", default_value = "info")]
    log_level: tracing::Level,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();
    tracing::debug!(?cli, "arguments");

    let region: Region = cli.region.parse()?;
    let options = RunOptions {
        year: cli.year,
        process: cli.process,
        category: cli.category,
        region,
        ntuple_path: cli.ntuple_path,
        output_path: cli.output_path,
        config_dir: cli.config_dir,
        is_data: cli.data,
        one_file: cli.one_file,
        couplings: cli.couplings,
    };
    let path = driver::run(&options)?;
    println!("Writing result to {:?}", path);
    Ok(())
}
