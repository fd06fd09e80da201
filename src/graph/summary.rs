//! Per-type population summary

use std::fmt;

/// Count and shallow size for one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeStats {
    pub type_str: String,
    pub count: usize,
    pub total_size: u64,
}

/// Whole-graph breakdown, largest types first
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeSummary {
    pub rows: Vec<TypeStats>,
    pub total_count: usize,
    pub total_size: u64,
}

impl TypeSummary {
    /// Order rows by total size descending, ties by type name.
    pub(crate) fn from_rows(mut rows: Vec<TypeStats>) -> Self {
        rows.sort_by(|a, b| {
            b.total_size
                .cmp(&a.total_size)
                .then_with(|| a.type_str.cmp(&b.type_str))
        });
        let total_count = rows.iter().map(|r| r.count).sum();
        let total_size = rows.iter().fold(0u64, |acc, r| acc.saturating_add(r.total_size));
        Self {
            rows,
            total_count,
            total_size,
        }
    }

    pub fn get(&self, type_str: &str) -> Option<&TypeStats> {
        self.rows.iter().find(|r| r.type_str == type_str)
    }

    pub fn num_types(&self) -> usize {
        self.rows.len()
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 * 100.0 / whole as f64
    }
}

impl fmt::Display for TypeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total {} objects, {} types, Total size = {}",
            self.total_count,
            self.rows.len(),
            human_bytes(self.total_size)
        )?;
        writeln!(f, " Index   Count   %      Size   % Cum Kind")?;
        let mut cumulative = 0u64;
        for (idx, row) in self.rows.iter().enumerate() {
            cumulative = cumulative.saturating_add(row.total_size);
            writeln!(
                f,
                "{:>6} {:>7} {:>3.0} {:>9} {:>3.0} {:>3.0} {}",
                idx,
                row.count,
                percent(row.count as u64, self.total_count as u64),
                row.total_size,
                percent(row.total_size, self.total_size),
                percent(cumulative, self.total_size),
                row.type_str,
            )?;
        }
        Ok(())
    }
}

/// Format a byte count with a binary suffix, e.g. `1.5MiB`
pub fn human_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}B", bytes)
    } else {
        format!("{:.1}{}", value, UNITS[unit])
    }
}
