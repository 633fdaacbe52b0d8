//! Statistic-name remapping.
//!
//! McPAT templates name statistics with the classic gem5 vocabulary
//! (`system.cpu.iq.int_inst_queue_reads`), while the standard-library runs we
//! consume dump them as `board.processor.o3.core.intInstQueueReads`. The table
//! here is the fixed bridge between the two. It is only ever applied to
//! `stats.*` references.
//!
//! Each [`RuleGroup`] is gated on a keyword: its rewrites run only if the name
//! contains the keyword at the time the group is reached. Groups run in table
//! order and rewrites within a group run in listed order.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};

/// Per-core prefix as it appears in template references (`system.cpu.`, `system.cpu3.`)
static CORE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^system\.cpu[0-9]*\.").expect("Invalid core prefix regex"));

/// Per-core prefix used by the statistics dump
pub const CANONICAL_CORE_PREFIX: &str = "board.processor.o3.core.";

/// An ordered set of exact substring rewrites guarded by a keyword
#[derive(Debug, Clone, Copy)]
pub struct RuleGroup {
    pub gate: &'static str,
    pub rewrites: &'static [(&'static str, &'static str)],
}

impl RuleGroup {
    pub fn applies_to(&self, name: &str) -> bool {
        name.contains(self.gate)
    }

    /// Apply every rewrite of this group, ignoring the gate
    pub fn apply(&self, name: &str) -> String {
        self.rewrites
            .iter()
            .fold(name.to_string(), |acc, &(from, to)| acc.replace(from, to))
    }
}

pub const RULE_GROUPS: &[RuleGroup] = &[
    RuleGroup {
        gate: "rename",
        rewrites: &[
            ("rename.int_rename_lookups", "rename.intLookups"),
            ("rename.fp_rename_lookups", "rename.fpLookups"),
        ],
    },
    RuleGroup {
        gate: "iq",
        rewrites: &[
            ("iq.FU_type_0", "statIssuedInstType_0"),
            ("iq.iqInstsIssued", "instsIssued"),
            ("iq.int_inst_queue_reads", "intInstQueueReads"),
            ("iq.int_inst_queue_writes", "intInstQueueWrites"),
            ("iq.int_inst_queue_wakeup_accesses", "intInstQueueWakeupAccesses"),
            ("iq.fp_inst_queue_reads", "fpInstQueueReads"),
            ("iq.fp_inst_queue_writes", "fpInstQueueWrites"),
            ("iq.fp_inst_queue_wakeup_accesses", "fpInstQueueWakeupAccesses"),
            ("iq.int_alu_accesses", "intAluAccesses"),
            ("iq.fp_alu_accesses", "fpAluAccesses"),
        ],
    },
    RuleGroup {
        gate: "regfile",
        rewrites: &[
            ("int_regfile_reads", "intRegfileReads"),
            ("int_regfile_writes", "intRegfileWrites"),
            ("fp_regfile_reads", "fpRegfileReads"),
            ("fp_regfile_writes", "fpRegfileWrites"),
        ],
    },
    // L1 caches live under the board's cache hierarchy, not under the core
    RuleGroup {
        gate: "icache",
        rewrites: &[
            ("board.processor.o3.core.", "board."),
            ("icache.ReadReq_accesses::total", "cache_hierarchy.l1icaches.ReadReq.accesses::total"),
            ("icache.ReadReq_misses::total", "cache_hierarchy.l1icaches.ReadReq.misses::total"),
            ("icache.replacements", "cache_hierarchy.l1icaches.replacements"),
        ],
    },
    RuleGroup {
        gate: "dcache",
        rewrites: &[
            ("board.processor.o3.core.", "board."),
            ("dcache.ReadReq_accesses::total", "cache_hierarchy.l1dcaches.ReadReq.accesses::total"),
            ("dcache.ReadReq_misses::total", "cache_hierarchy.l1dcaches.ReadReq.misses::total"),
            ("dcache.WriteReq_accesses::total", "cache_hierarchy.l1dcaches.WriteReq.accesses::total"),
            ("dcache.WriteReq_misses::total", "cache_hierarchy.l1dcaches.WriteReq.misses::total"),
            ("dcache.replacements", "cache_hierarchy.l1dcaches.replacements"),
        ],
    },
    RuleGroup {
        gate: "rob",
        rewrites: &[
            ("rob.rob_reads", "rob.reads"),
            ("rob.rob_writes", "rob.writes"),
        ],
    },
    RuleGroup {
        gate: "commit",
        rewrites: &[
            ("commit.committedOps", "committedOps"),
            ("commit.int_insts", "commit.integer"),
            ("commit.fp_insts", "commit.floating"),
            ("commit.function_calls", "commit.functionCalls"),
        ],
    },
];

/// Map a template statistic path to the name used in the statistics dump
pub fn remap(stat_path: &str) -> String {
    let mut name = CORE_PREFIX
        .replace(stat_path, NoExpand(CANONICAL_CORE_PREFIX))
        .into_owned();

    for group in RULE_GROUPS {
        if group.applies_to(&name) {
            name = group.apply(&name);
        }
    }

    name
}
