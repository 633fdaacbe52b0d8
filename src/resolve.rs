//! Reference resolution.
//!
//! After expansion every `param` may still hold `config.<path>` references
//! and every `stat` may hold `stats.<name>` references. Resolution
//! substitutes each reference with its concrete value and, once no symbolic
//! reference is left, evaluates the resulting arithmetic.
//!
//! Missing statistics are expected (gem5 omits zero or disabled counters): a
//! `stat` that refers to one is set to `0` as a whole, with a warning.
//! Unresolvable configuration paths and expressions that fail to evaluate
//! abort the run.

use std::sync::LazyLock;

use log::{debug, error, info, warn};
use regex::Regex;

use crate::config_tree::{ConfigError, ConfigTree};
use crate::expr::{evaluate_list, ExprError};
use crate::remap::remap;
use crate::stats::StatsTable;
use crate::template::{Document, Element, NodeKind};

/// Match: "config.system.processor.o3.0.clock"
static CONFIG_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"config\.([\[\]a-zA-Z0-9_:.]+)").expect("Invalid config reference regex")
});

/// Match: "stats.system.cpu0.commit.committedOps"
static STATS_REF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"stats\.([a-zA-Z0-9_:.]+)").expect("Invalid stats reference regex")
});

/// Match a per-core index segment: ".cpu3."
static CORE_INDEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.cpu[0-9]+\.").expect("Invalid core index regex"));

const DEFAULT_CORE: &str = ".cpu0.";
const BARE_CORE: &str = ".cpu.";

/// Errors that abort resolution
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("param '{name}': cannot resolve config.{reference}: {source}")]
    ConfigResolution {
        name: String,
        reference: String,
        #[source]
        source: ConfigError,
    },

    #[error("{kind} '{name}': cannot evaluate '{expression}' (from '{original}'): {source}")]
    ExpressionEvaluation {
        kind: &'static str,
        name: String,
        original: String,
        expression: String,
        #[source]
        source: ExprError,
    },
}

/// Counters and recoverable issues from one resolution run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveReport {
    /// `config.*` references substituted
    pub config_refs: usize,
    /// `stats.*` references seen, including missing ones
    pub stat_refs: usize,
    /// Statistics that were not found; their `stat` values were set to 0
    pub missing_stats: Vec<String>,
    /// Values left symbolic for a later pass
    pub deferred: usize,
}

fn has_symbolic(value: &str) -> bool {
    value.contains("config.") || value.contains("stats.")
}

/// Replaces `config.*` and `stats.*` references with concrete values
#[derive(Debug)]
pub struct ReferenceResolver<'a> {
    config: &'a ConfigTree,
    stats: &'a StatsTable,
}

impl<'a> ReferenceResolver<'a> {
    pub fn new(config: &'a ConfigTree, stats: &'a StatsTable) -> Self {
        Self { config, stats }
    }

    /// Run the config pass over every `param` and the stats pass over every `stat`
    pub fn resolve(&self, document: &mut Document) -> Result<ResolveReport, ResolveError> {
        let mut report = ResolveReport::default();
        self.resolve_config_pass(document, &mut report)?;
        self.resolve_stats_pass(document, &mut report)?;

        info!(
            "Resolved {} config and {} stats references ({} statistics missing)",
            report.config_refs,
            report.stat_refs,
            report.missing_stats.len()
        );
        Ok(report)
    }

    pub fn resolve_config_pass(
        &self,
        document: &mut Document,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        document.try_walk_mut(&mut |element| {
            if element.kind() == NodeKind::Param {
                self.resolve_param(element, report)?;
            }
            Ok(())
        })
    }

    pub fn resolve_stats_pass(
        &self,
        document: &mut Document,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        document.try_walk_mut(&mut |element| {
            if element.kind() == NodeKind::Stat {
                self.resolve_stat(element, report)?;
            }
            Ok(())
        })
    }

    /// Substitute every `config.*` reference of a `param` node
    fn resolve_param(
        &self,
        param: &mut Element,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        let Some(value) = param.value().filter(|v| CONFIG_REF.is_match(v)) else {
            return Ok(());
        };
        let original = value.to_string();
        debug!("{:?} requires {}", param.name(), original);

        let mut substituted = String::with_capacity(original.len());
        let mut last = 0;
        for caps in CONFIG_REF.captures_iter(&original) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let path = path.as_str();
            let rendered = self.config.render(path).map_err(|source| {
                ResolveError::ConfigResolution {
                    name: param.name().unwrap_or_default().to_string(),
                    reference: path.to_string(),
                    source,
                }
            })?;
            debug!("config.{} = {}", path, rendered);

            substituted.push_str(&original[last..whole.start()]);
            substituted.push_str(&rendered);
            last = whole.end();
            report.config_refs += 1;
        }
        substituted.push_str(&original[last..]);

        self.settle(param, "param", &original, substituted, report)
    }

    /// Substitute every `stats.*` reference of a `stat` node
    fn resolve_stat(
        &self,
        stat: &mut Element,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        let Some(value) = stat.value().filter(|v| STATS_REF.is_match(v)) else {
            return Ok(());
        };
        let original = value.to_string();

        let mut substituted = String::with_capacity(original.len());
        let mut last = 0;
        let mut missing = false;
        for caps in STATS_REF.captures_iter(&original) {
            let (Some(whole), Some(reference)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let reference = reference.as_str();
            report.stat_refs += 1;
            let Some(resolved) = self.lookup_stat(reference) else {
                warn!(
                    "{} does not exist in stats (invalid stat in template, or zero); setting {:?} to 0",
                    remap(reference),
                    stat.name()
                );
                report.missing_stats.push(reference.to_string());
                missing = true;
                continue;
            };
            debug!("stats.{} = {}", reference, resolved);

            substituted.push_str(&original[last..whole.start()]);
            substituted.push_str(resolved);
            last = whole.end();
        }

        // A missing statistic zeroes the whole value, not just its own term
        if missing {
            stat.set_attr("value", "0");
            return Ok(());
        }
        substituted.push_str(&original[last..]);

        self.settle(stat, "stat", &original, substituted, report)
    }

    /// Find a statistic for a template reference.
    ///
    /// Candidates, in order: the remapped name, the remapped name with the
    /// default core (`.cpu0.`) made bare, the reference as written, and the
    /// reference with its core index removed.
    pub fn lookup_stat(&self, reference: &str) -> Option<&'a str> {
        let stats = self.stats;
        let remapped = remap(reference);

        if let Some(found) = stats.get(&remapped) {
            return Some(found);
        }
        if remapped.contains(DEFAULT_CORE) {
            if let Some(found) = stats.get(&remapped.replace(DEFAULT_CORE, BARE_CORE)) {
                return Some(found);
            }
        }
        if let Some(found) = stats.get(reference) {
            return Some(found);
        }
        let collapsed = CORE_INDEX.replace_all(reference, BARE_CORE);
        if collapsed != reference {
            return stats.get(&collapsed);
        }
        None
    }

    /// Store a substituted value, evaluating it once no reference is left
    fn settle(
        &self,
        element: &mut Element,
        kind: &'static str,
        original: &str,
        substituted: String,
        report: &mut ResolveReport,
    ) -> Result<(), ResolveError> {
        if has_symbolic(&substituted) {
            report.deferred += 1;
            element.set_attr("value", substituted);
            return Ok(());
        }

        match evaluate_list(&substituted) {
            Ok(result) => {
                element.set_attr("value", result);
                Ok(())
            }
            Err(source) => {
                let name = element.name().unwrap_or_default().to_string();
                error!(
                    "Failed to evaluate {} '{}': '{}' (from '{}')",
                    kind, name, substituted, original
                );
                Err(ResolveError::ExpressionEvaluation {
                    kind,
                    name,
                    original: original.to_string(),
                    expression: substituted,
                    source,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "board": {
            "clk_domain": { "clock": [333] },
            "cache_line_size": 64,
            "processor": {
                "o3": [
                    { "core": { "isa": [ { "type": "X86ISA" } ], "numROBEntries": 192, "fetchWidth": 8 } }
                ]
            }
        }
    }"#;

    const STATS: &str = "
---------- Begin Simulation Statistics ----------
system.cpu.numCycles                      12345.000000   # cycles
board.processor.o3.core.rob.reads         4096           # ROB reads
board.processor.o3.core.rob.writes        0              # ROB writes
board.processor.o3.core.intInstQueueReads 100            # IQ reads
board.cache_hierarchy.l1dcaches.ReadReq.accesses::total 900
system.cpu0.idleCycles                    10
";

    fn fixtures() -> (ConfigTree, StatsTable) {
        (ConfigTree::parse_str(CONFIG).unwrap(), StatsTable::parse_str(STATS))
    }

    fn document(children: &str) -> Document {
        Document::parse(&format!(
            r#"<component id="root" name="root"><component id="system" name="system">{}</component></component>"#,
            children
        ))
        .unwrap()
    }

    fn value_of<'d>(doc: &'d Document, name: &str) -> &'d str {
        doc.system_component()
            .unwrap()
            .elements()
            .find(|e| e.name() == Some(name))
            .and_then(Element::value)
            .unwrap()
    }

    #[test]
    fn test_config_references_are_substituted_and_evaluated() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<param name="clock_rate" value="config.system.clk_domain.clock.0"/>
               <param name="rob" value="config.system.processor.o3.0.core.numROBEntries * 2"/>
               <param name="line" value="config.system.cache_line_size,config.system.processor.o3.0.core.fetchWidth,1"/>"#,
        );
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(value_of(&doc, "clock_rate"), "333");
        assert_eq!(value_of(&doc, "rob"), "384");
        assert_eq!(value_of(&doc, "line"), "64,8,1");
        assert_eq!(report.config_refs, 4);
    }

    #[test]
    fn test_missing_config_path_is_fatal() {
        let (config, stats) = fixtures();
        let mut doc = document(r#"<param name="decode_width" value="config.system.processor.o3.0.core.decodeWidth"/>"#);
        let err = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap_err();
        match err {
            ResolveError::ConfigResolution { name, reference, source } => {
                assert_eq!(name, "decode_width");
                assert_eq!(reference, "system.processor.o3.0.core.decodeWidth");
                assert!(matches!(source, ConfigError::MissingConfigKey { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_numeric_config_value_fails_evaluation() {
        let (config, stats) = fixtures();
        let mut doc = document(r#"<param name="isa" value="config.system.processor.o3.0.core.isa.0.type"/>"#);
        let err = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::ExpressionEvaluation { kind: "param", ref expression, .. } if expression == "X86ISA"
        ));
    }

    #[test]
    fn test_stats_references_are_remapped() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<stat name="ROB_reads" value="stats.system.cpu0.rob.rob_reads"/>
               <stat name="inst_window_reads" value="stats.system.cpu0.iq.int_inst_queue_reads"/>
               <stat name="read_accesses" value="stats.system.cpu0.dcache.ReadReq_accesses::total"/>"#,
        );
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(value_of(&doc, "ROB_reads"), "4096");
        assert_eq!(value_of(&doc, "inst_window_reads"), "100");
        assert_eq!(value_of(&doc, "read_accesses"), "900");
        assert!(report.missing_stats.is_empty());
    }

    #[test]
    fn test_per_core_totals_resolve_against_single_cpu_dump() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<stat name="total_cycles" value="(stats.system.cpu0.numCycles) + (stats.system.cpu1.numCycles)"/>"#,
        );
        ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();
        assert_eq!(value_of(&doc, "total_cycles"), "24690");
    }

    #[test]
    fn test_reference_as_written_is_a_fallback() {
        let (config, stats) = fixtures();
        let resolver = ReferenceResolver::new(&config, &stats);
        assert_eq!(resolver.lookup_stat("system.cpu0.idleCycles"), Some("10"));
        assert_eq!(resolver.lookup_stat("system.cpu3.numCycles"), Some("12345.000000"));
        assert_eq!(resolver.lookup_stat("system.cpu0.nothing"), None);
    }

    #[test]
    fn test_missing_statistic_zeroes_the_whole_value() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<stat name="function_calls" value="stats.foo.bar"/>
               <stat name="mixed" value="stats.foo.baz + stats.system.cpu0.rob.rob_reads"/>"#,
        );
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(value_of(&doc, "function_calls"), "0");
        assert_eq!(value_of(&doc, "mixed"), "0");
        assert_eq!(report.missing_stats, vec!["foo.bar".to_string(), "foo.baz".to_string()]);
        assert_eq!(report.stat_refs, 3);
    }

    #[test]
    fn test_ratio_with_missing_divisor_is_zero() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<stat name="ratio" value="stats.system.cpu0.rob.rob_reads / stats.foo.bar"/>
               <stat name="both" value="(stats.foo.a) / (stats.foo.b)"/>"#,
        );
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(value_of(&doc, "ratio"), "0");
        assert_eq!(value_of(&doc, "both"), "0");
        assert_eq!(
            report.missing_stats,
            vec!["foo.bar".to_string(), "foo.a".to_string(), "foo.b".to_string()]
        );
    }

    #[test]
    fn test_concrete_values_pass_through() {
        let (config, stats) = fixtures();
        let children = r#"<param name="temperature" value="380"/>
               <param name="widths" value="2,4"/>
               <stat name="busy" value="1.50"/>
               <component id="system.mc" name="mc"/>"#;
        let mut doc = document(children);
        let before = doc.clone();
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(doc, before);
        assert_eq!(report, ResolveReport::default());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<param name="clock_rate" value="config.system.clk_domain.clock.0 / 3"/>
               <stat name="ROB_reads" value="stats.system.cpu0.rob.rob_reads"/>"#,
        );
        let resolver = ReferenceResolver::new(&config, &stats);
        resolver.resolve(&mut doc).unwrap();
        let once = doc.clone();
        resolver.resolve(&mut doc).unwrap();
        assert_eq!(doc, once);
        assert_eq!(value_of(&doc, "clock_rate"), "111");
    }

    #[test]
    fn test_passes_only_touch_their_node_kind() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<param name="odd" value="stats.system.cpu0.rob.rob_reads"/>
               <stat name="also_odd" value="config.system.cache_line_size"/>"#,
        );
        let report = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap();

        assert_eq!(value_of(&doc, "odd"), "stats.system.cpu0.rob.rob_reads");
        assert_eq!(value_of(&doc, "also_odd"), "config.system.cache_line_size");
        assert_eq!(report.config_refs + report.stat_refs, 0);
    }

    #[test]
    fn test_mixed_references_are_deferred() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<param name="mixed" value="config.system.cache_line_size * stats.system.cpu0.rob.rob_reads"/>"#,
        );
        let resolver = ReferenceResolver::new(&config, &stats);
        let mut report = ResolveReport::default();
        resolver.resolve_config_pass(&mut doc, &mut report).unwrap();

        assert_eq!(report.deferred, 1);
        assert_eq!(value_of(&doc, "mixed"), "64 * stats.system.cpu0.rob.rob_reads");
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let (config, stats) = fixtures();
        let mut doc = document(
            r#"<stat name="ratio" value="stats.system.cpu0.rob.rob_reads / stats.system.cpu0.rob.rob_writes"/>"#,
        );
        let err = ReferenceResolver::new(&config, &stats).resolve(&mut doc).unwrap_err();
        match err {
            ResolveError::ExpressionEvaluation { kind, original, expression, source, .. } => {
                assert_eq!(kind, "stat");
                assert_eq!(
                    original,
                    "stats.system.cpu0.rob.rob_reads / stats.system.cpu0.rob.rob_writes"
                );
                assert_eq!(expression, "4096 / 0");
                assert!(matches!(source, ExprError::DivisionByZero { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
