//! Translation orchestrator.
//!
//! This module coordinates one translation run: load the gem5 statistics,
//! the gem5 configuration and the McPAT template, expand the template for the
//! simulated topology, resolve every reference, and write the McPAT input.

use std::path::PathBuf;

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::{info, warn};

use crate::config_tree::ConfigTree;
use crate::expand::TemplateExpander;
use crate::options::TranslateOptions;
use crate::resolve::ReferenceResolver;
use crate::stats::StatsTable;
use crate::template::Document;

/// Input and output locations for a run
#[derive(Debug, Clone)]
pub struct InputPaths {
    pub config: PathBuf,
    pub stats: PathBuf,
    pub template: PathBuf,
    pub output: PathBuf,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub cores: usize,
    pub l2_banks: usize,
    pub config_refs: usize,
    pub stat_refs: usize,
    pub missing_stats: Vec<String>,
    pub stats_warnings: usize,
}

/// Expand and resolve an in-memory template
pub fn translate(
    config: &ConfigTree,
    stats: &StatsTable,
    template: &mut Document,
    options: &TranslateOptions,
) -> Result<RunSummary> {
    let expander = TemplateExpander::new(config, options)
        .wrap_err("Failed to determine the simulated topology")?;
    let topology = expander.topology();
    expander
        .expand(template)
        .wrap_err("Failed to expand McPAT template")?;

    let report = ReferenceResolver::new(config, stats)
        .resolve(template)
        .wrap_err("Failed to resolve template references")?;

    if report.deferred > 0 {
        warn!("{} values still hold unresolved references", report.deferred);
    }

    Ok(RunSummary {
        cores: topology.cores,
        l2_banks: topology.l2_banks(),
        config_refs: report.config_refs,
        stat_refs: report.stat_refs,
        missing_stats: report.missing_stats,
        stats_warnings: stats.warnings().len(),
    })
}

/// Run the whole pipeline from files to the McPAT input file
pub fn generate_mcpat_input(paths: &InputPaths, options: &TranslateOptions) -> Result<RunSummary> {
    let stats = StatsTable::load(&paths.stats)
        .wrap_err_with(|| format!("Failed to read stats file '{}'", paths.stats.display()))?;
    let config = ConfigTree::load(&paths.config)
        .wrap_err_with(|| format!("Failed to load config file '{}'", paths.config.display()))?;
    let mut template = Document::load(&paths.template)
        .wrap_err_with(|| format!("Failed to load template '{}'", paths.template.display()))?;

    let summary = translate(&config, &stats, &mut template, options)?;

    template
        .write_to_path(&paths.output)
        .wrap_err_with(|| format!("Failed to write McPAT input '{}'", paths.output.display()))?;
    info!("Wrote McPAT input: {:?}", paths.output);

    Ok(summary)
}
