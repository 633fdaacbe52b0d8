//! # gem5-mcpat - gem5 to McPAT input translator
//!
//! This library turns the output of a gem5 simulation (`config.json` and
//! `stats.txt`) into the XML input McPAT needs for power and area estimation.
//!
//! ## Overview
//!
//! McPAT inputs are produced from a parameterised template. The template
//! describes a single core and a single L2 bank, and its `param`/`stat`
//! values refer symbolically to the simulation:
//!
//! ```xml
//! <param name="clock_rate" value="config.system.cpu.clk_domain.clock.0"/>
//! <stat name="total_cycles" value="stats.system.cpu.numCycles"/>
//! ```
//!
//! Translation happens in two stages:
//!
//! - **Expansion**: the core and L2 prototypes are replicated once per unit
//!   in the simulated machine, and per-core references are indexed.
//! - **Resolution**: `config.*` references are looked up in the configuration
//!   tree, `stats.*` references are remapped to gem5's naming and looked up in
//!   the statistics table, and the resulting arithmetic is evaluated.
//!
//! ## Architecture
//!
//! - `config_tree`: gem5 configuration with dotted-path lookup
//! - `stats`: gem5 statistics table
//! - `remap`: statistic-name bridge between template and gem5 vocabularies
//! - `template`: McPAT template document model and XML I/O
//! - `expand`: core/L2 replication
//! - `expr`: restricted arithmetic evaluator
//! - `resolve`: `config.*`/`stats.*` reference resolution
//! - `options`: translation options
//! - `orchestrator`: end-to-end pipeline
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::path::PathBuf;
//! use gem5_mcpat::options::TranslateOptions;
//! use gem5_mcpat::orchestrator::{generate_mcpat_input, InputPaths};
//!
//! let paths = InputPaths {
//!     config: PathBuf::from("m5out/config.json"),
//!     stats: PathBuf::from("m5out/stats.txt"),
//!     template: PathBuf::from("templates/template_x86.xml"),
//!     output: PathBuf::from("mcpat-in.xml"),
//! };
//! let summary = generate_mcpat_input(&paths, &TranslateOptions::default())?;
//! println!("{} cores, {} statistics missing", summary.cores, summary.missing_stats.len());
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Each module reports its own `thiserror` error type. The orchestrator wraps
//! them with `color_eyre` context. Missing statistics and malformed stats
//! lines are not errors: they are logged and recorded in the run summary.

pub mod config_tree;
pub mod expand;
pub mod expr;
pub mod options;
pub mod orchestrator;
pub mod remap;
pub mod resolve;
pub mod stats;
pub mod template;

pub use config_tree::{ConfigError, ConfigTree};
pub use expand::{ExpandError, TemplateExpander, Topology};
pub use options::{L2Topology, TranslateOptions};
pub use resolve::{ReferenceResolver, ResolveError, ResolveReport};
pub use stats::{StatsTable, StatsWarning};
pub use template::{Document, Element, Node, NodeKind, TemplateError};
