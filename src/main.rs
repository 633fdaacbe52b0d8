use clap::Parser;
use color_eyre::Result;
use env_logger::Env;
use log::{info, warn};
use std::path::PathBuf;

use gem5_mcpat::options::{load_options, L2Topology, TranslateOptions};
use gem5_mcpat::orchestrator::{generate_mcpat_input, InputPaths};

/// Gem5 to McPAT parser
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input config.json from gem5 output
    #[arg(short, long, value_name = "PATH")]
    config: PathBuf,

    /// Input stats.txt from gem5 output
    #[arg(short, long, value_name = "PATH")]
    stats: PathBuf,

    /// McPAT template XML file
    #[arg(short, long, value_name = "PATH")]
    template: PathBuf,

    /// Output file for McPAT input in XML format
    #[arg(short, long, value_name = "PATH", default_value = "mcpat-in.xml")]
    output: PathBuf,

    /// Translation options YAML file
    #[arg(long, value_name = "PATH")]
    options: Option<PathBuf>,

    /// L2 organisation (overrides the options file)
    #[arg(long, value_enum)]
    l2: Option<L2Topology>,
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Config file: {:?}", args.config);
    info!("Stats file: {:?}", args.stats);
    info!("Template file: {:?}", args.template);

    let mut options = match &args.options {
        Some(path) => load_options(path)?,
        None => TranslateOptions::default(),
    };
    if let Some(l2) = args.l2 {
        options.l2 = l2;
    }

    let paths = InputPaths {
        config: args.config,
        stats: args.stats,
        template: args.template,
        output: args.output,
    };

    let summary = generate_mcpat_input(&paths, &options)?;

    info!(
        "Translated {} core(s) and {} L2 bank(s): {} config and {} stats references",
        summary.cores, summary.l2_banks, summary.config_refs, summary.stat_refs
    );
    if !summary.missing_stats.is_empty() {
        warn!("{} statistics were missing and set to 0", summary.missing_stats.len());
    }
    if summary.stats_warnings > 0 {
        warn!("{} stats lines were skipped or coerced", summary.stats_warnings);
    }

    Ok(())
}
