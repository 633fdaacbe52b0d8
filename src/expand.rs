//! Template expansion.
//!
//! A McPAT template describes one core (`name="core"`) and one L2 bank
//! (`name="L2"`). Expansion replaces each of those prototypes with one
//! independent copy per unit present in the simulated machine, specialising
//! identifiers and reference markers with the unit index, and fills in the
//! chip-level count parameters.
//!
//! Statistics and configuration address cores differently: a statistics
//! marker gets the index appended to the segment (`cpu.` → `cpu3.`), a
//! configuration marker gets it as a separate path segment (`cpu.` →
//! `cpu.3.`).

use log::{debug, info};

use crate::config_tree::{ConfigError, ConfigTree};
use crate::options::{L2Topology, TranslateOptions};
use crate::template::{Document, Element, Node};

/// Name of the per-core prototype subtree
pub const CORE_TEMPLATE: &str = "core";

/// Name of the L2 prototype subtree
pub const L2_TEMPLATE: &str = "L2";

const CORE_COUNT_PARAM: &str = "number_of_cores";
const L2_COUNT_PARAM: &str = "number_of_L2s";
const PRIVATE_L2_PARAM: &str = "Private_L2";

/// Per-core marker inside reference expressions
const CORE_MARKER: &str = "cpu.";

const SHARED_L2_MARKER: &str = "cpu.l2cache.";
const SHARED_L2_STATS: &str = "l2.";

/// Errors raised during expansion
#[derive(Debug, thiserror::Error)]
pub enum ExpandError {
    #[error("Template has no system component")]
    MissingSystem,

    #[error("Cannot determine ISA of core {core}: {source}")]
    Isa {
        core: usize,
        #[source]
        source: ConfigError,
    },
}

/// Hardware units the template is expanded for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    pub cores: usize,
    pub l2: L2Topology,
}

impl Topology {
    /// Read the core count from the configuration tree
    pub fn from_config(config: &ConfigTree, options: &TranslateOptions) -> Result<Self, ConfigError> {
        let cores = config.core_count(&options.core_list)?;
        if cores == 0 {
            return Err(ConfigError::MalformedConfig(format!(
                "'{}' lists no processor cores",
                options.core_list
            )));
        }
        Ok(Self {
            cores,
            l2: options.l2,
        })
    }

    /// Number of L2 banks: one per core when private, otherwise one
    pub fn l2_banks(&self) -> usize {
        match self.l2 {
            L2Topology::Private => self.cores,
            L2Topology::Shared => 1,
        }
    }
}

/// What an expansion actually did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Expansion {
    pub core_replicas: usize,
    pub l2_replicas: usize,
}

/// Input a template value draws from, judged by its leading dotted segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Stats,
    Config,
}

fn leading_source(value: &str) -> Option<Source> {
    let head = value.split('.').next().unwrap_or_default();
    if head.contains("stats") {
        Some(Source::Stats)
    } else if head.contains("config") {
        Some(Source::Config)
    } else {
        None
    }
}

/// Whether the value's first dotted segment is exactly `stats`
fn is_stats_rooted(value: &str) -> bool {
    value.split('.').next() == Some("stats")
}

/// `stats.system.cpu.x` → `stats.system.cpu{index}.x`
pub fn index_stats_marker(value: &str, index: usize) -> String {
    value.replace(CORE_MARKER, &format!("cpu{}.", index))
}

/// `config.system.cpu.x` → `config.system.cpu.{index}.x`
pub fn index_config_marker(value: &str, index: usize) -> String {
    value.replace(CORE_MARKER, &format!("cpu.{}.", index))
}

/// Sum a per-core statistic over cores `0..cores`: `(…cpu0…) + (…cpu1…)`
pub fn aggregate_across_cores(value: &str, cores: usize) -> String {
    (0..cores)
        .map(|index| format!("({})", index_stats_marker(value, index)))
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Rewrite a value's per-core markers for core `index`
fn index_core_value(value: &str, index: usize) -> Option<String> {
    if !value.contains(CORE_MARKER) {
        return None;
    }
    match leading_source(value)? {
        Source::Stats => Some(index_stats_marker(value, index)),
        Source::Config => Some(index_config_marker(value, index)),
    }
}

fn index_core_attributes(element: &mut Element, index: usize) {
    if let Some(id) = element
        .attr("id")
        .filter(|id| id.contains(CORE_TEMPLATE))
        .map(|id| id.replace(CORE_TEMPLATE, &format!("{}{}", CORE_TEMPLATE, index)))
    {
        element.set_attr("id", id);
    }
    if let Some(value) = element.value().and_then(|v| index_core_value(v, index)) {
        element.set_attr("value", value);
    }
}

fn index_l2_value(element: &mut Element, index: usize) {
    if let Some(value) = element
        .value()
        .filter(|v| v.contains(CORE_MARKER) && leading_source(v) == Some(Source::Stats))
        .map(|v| index_stats_marker(v, index))
    {
        element.set_attr("value", value);
    }
}

/// Expands a template for the topology described by a configuration tree
#[derive(Debug)]
pub struct TemplateExpander<'a> {
    config: &'a ConfigTree,
    options: &'a TranslateOptions,
    topology: Topology,
}

impl<'a> TemplateExpander<'a> {
    pub fn new(config: &'a ConfigTree, options: &'a TranslateOptions) -> Result<Self, ConfigError> {
        let topology = Topology::from_config(config, options)?;
        Ok(Self {
            config,
            options,
            topology,
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Expand the system component's children in place.
    ///
    /// Children keep their relative order; each prototype is replaced by its
    /// replicas at its own position. A template without a core or L2
    /// prototype is left alone for that part. On error the document is not
    /// modified.
    pub fn expand(&self, document: &mut Document) -> Result<Expansion, ExpandError> {
        let system = document
            .system_component_mut()
            .ok_or(ExpandError::MissingSystem)?;

        let mut expansion = Expansion::default();
        let mut children = Vec::with_capacity(system.children.len());

        for node in &system.children {
            let Node::Element(element) = node else {
                children.push(node.clone());
                continue;
            };

            match element.name() {
                Some(CORE_TEMPLATE) => {
                    for index in 0..self.topology.cores {
                        children.push(Node::Element(self.instantiate_core(element, index)?));
                    }
                    expansion.core_replicas = self.topology.cores;
                }
                Some(L2_TEMPLATE) => match self.topology.l2 {
                    L2Topology::Private => {
                        let banks = self.topology.l2_banks();
                        for index in 0..banks {
                            children.push(Node::Element(instantiate_l2(element, index)));
                        }
                        expansion.l2_replicas = banks;
                    }
                    L2Topology::Shared => {
                        children.push(Node::Element(share_l2(element)));
                        expansion.l2_replicas = 1;
                    }
                },
                _ => {
                    let mut element = element.clone();
                    self.apply_system_param(&mut element);
                    children.push(Node::Element(element));
                }
            }
        }

        system.children = children;
        info!(
            "Expanded template: {} core(s), {} L2 bank(s)",
            expansion.core_replicas, expansion.l2_replicas
        );
        Ok(expansion)
    }

    /// Fill chip-level counts and widen per-core totals to all cores
    fn apply_system_param(&self, element: &mut Element) {
        let topology = self.topology;
        match element.name() {
            Some(CORE_COUNT_PARAM) => element.set_attr("value", topology.cores.to_string()),
            Some(L2_COUNT_PARAM) => element.set_attr("value", topology.l2_banks().to_string()),
            Some(PRIVATE_L2_PARAM) => {
                let private = matches!(topology.l2, L2Topology::Private);
                element.set_attr("value", if private { "1" } else { "0" });
            }
            _ => {}
        }

        if let Some(total) = element
            .value()
            .filter(|v| v.contains(CORE_MARKER) && is_stats_rooted(v))
            .map(|v| aggregate_across_cores(v, topology.cores))
        {
            debug!("Aggregating {:?} across {} cores", element.name(), topology.cores);
            element.set_attr("value", total);
        }
    }

    /// Build replica `index` of the core prototype
    pub fn instantiate_core(&self, prototype: &Element, index: usize) -> Result<Element, ExpandError> {
        let mut core = prototype.clone();
        core.set_attr("name", format!("{}{}", CORE_TEMPLATE, index));
        core.set_attr("id", format!("system.{}{}", CORE_TEMPLATE, index));

        for child in core.elements_mut() {
            if child.name() == Some(self.options.isa_flag.as_str()) {
                let isa = self
                    .config
                    .core_isa(&self.options.core_list, index)
                    .map_err(|source| ExpandError::Isa { core: index, source })?;
                let flag = if isa == self.options.isa_type { "1" } else { "0" };
                child.set_attr("value", flag);
            }
            index_core_attributes(child, index);
            for grandchild in child.elements_mut() {
                index_core_attributes(grandchild, index);
            }
        }

        Ok(core)
    }
}

/// Build private L2 bank `index` from the prototype
pub fn instantiate_l2(prototype: &Element, index: usize) -> Element {
    let mut bank = prototype.clone();
    bank.set_attr("name", format!("{}{}", L2_TEMPLATE, index));
    bank.set_attr("id", format!("system.{}{}", L2_TEMPLATE, index));

    for child in bank.elements_mut() {
        index_l2_value(child, index);
        for grandchild in child.elements_mut() {
            index_l2_value(grandchild, index);
        }
    }

    bank
}

fn share_l2_value(element: &mut Element) {
    if let Some(value) = element
        .value()
        .filter(|v| v.contains(SHARED_L2_MARKER))
        .map(|v| v.replace(SHARED_L2_MARKER, SHARED_L2_STATS))
    {
        element.set_attr("value", value);
    }
}

/// Turn the L2 prototype into the single shared bank
pub fn share_l2(prototype: &Element) -> Element {
    let mut shared = prototype.clone();
    shared.set_attr("name", format!("{}0", L2_TEMPLATE));
    shared.set_attr("id", format!("system.{}0", L2_TEMPLATE));

    for child in shared.elements_mut() {
        share_l2_value(child);
        for grandchild in child.elements_mut() {
            share_l2_value(grandchild);
        }
    }

    shared
}
