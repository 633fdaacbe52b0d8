//! gem5 statistics table.
//!
//! Parses `stats.txt` into a flat name → value table with a single linear
//! scan. Values are kept as the decimal text gem5 printed; numeric parsing is
//! left to expression evaluation.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, info, warn};
use regex::Regex;

/// Match: "<name>   <value>   # description"
static STAT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^([a-zA-Z0-9_.:-]+)\s+([-+]?(?:[0-9]+(?:\.[0-9]+)?(?:[eE][-+]?[0-9]+)?|nan|inf))(?:\s|$)",
    )
    .expect("Invalid stat line regex")
});

/// Section separator prefix ("---------- Begin Simulation Statistics ----------")
const SEPARATOR: &str = "---";

/// Recoverable problems found while scanning a statistics dump
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsWarning {
    /// A non-separator line that is not `<name> <value>`; the line is skipped
    LineParse { line_number: usize, line: String },
    /// A `nan` value, stored as `0`
    NanValue { name: String, line_number: usize },
}

impl fmt::Display for StatsWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatsWarning::LineParse { line_number, line } => {
                write!(f, "line {}: failed to match stats line: {}", line_number, line)
            }
            StatsWarning::NanValue { name, line_number } => {
                write!(f, "line {}: {} is nan, setting it to 0", line_number, name)
            }
        }
    }
}

/// Flat table of gem5 statistics.
///
/// When a name appears more than once the last line wins.
#[derive(Debug, Clone, Default)]
pub struct StatsTable {
    values: HashMap<String, String>,
    warnings: Vec<StatsWarning>,
}

impl StatsTable {
    /// Scan a statistics dump held in memory
    pub fn parse_str(text: &str) -> Self {
        let mut table = Self::default();
        for (index, line) in text.lines().enumerate() {
            table.scan_line(index + 1, line);
        }
        table
    }

    /// Scan a statistics dump from a buffered reader
    pub fn from_reader<R: BufRead>(reader: R) -> io::Result<Self> {
        let mut table = Self::default();
        for (index, line) in reader.lines().enumerate() {
            table.scan_line(index + 1, &line?);
        }
        Ok(table)
    }

    /// Load `stats.txt` from disk
    pub fn load(path: &Path) -> io::Result<Self> {
        info!("Loading gem5 statistics from: {:?}", path);
        let file = File::open(path)?;
        let table = Self::from_reader(BufReader::new(file))?;
        info!(
            "Parsed {} statistics ({} warnings)",
            table.len(),
            table.warnings.len()
        );
        Ok(table)
    }

    fn scan_line(&mut self, line_number: usize, line: &str) {
        let line = line.trim_end();
        if line.is_empty() || line.starts_with(SEPARATOR) {
            return;
        }

        let Some(caps) = STAT_LINE.captures(line) else {
            warn!("Failed to match stats line {}: {}", line_number, line);
            self.warnings.push(StatsWarning::LineParse {
                line_number,
                line: line.to_string(),
            });
            return;
        };

        let name = caps[1].to_string();
        let mut value = caps[2].to_string();

        if value.trim_start_matches(['+', '-']) == "nan" {
            warn!("{} is nan. Setting it to 0", name);
            self.warnings.push(StatsWarning::NanValue {
                name: name.clone(),
                line_number,
            });
            value = "0".to_string();
        }

        if let Some(previous) = self.values.insert(name.clone(), value) {
            debug!("Duplicate statistic {} (line {}), replacing {}", name, line_number, previous);
        }
    }

    /// Look up a statistic by its exact name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Problems recorded during the scan, in line order
    pub fn warnings(&self) -> &[StatsWarning] {
        &self.warnings
    }
}
