//! Work plan — the ordered target list crossed with a fixed sample count.
//!
//! Every worker executes the same plan independently: `samples` full passes
//! over the target list, samples and items both 1-indexed. The plan carries
//! no progress; resumption is derived from artifacts on disk.

use anyhow::{ensure, Context as _, Result};
use std::path::Path;

/// Immutable plan shared by every worker in the fleet.
#[derive(Debug, Clone)]
pub struct WorkPlan {
    /// Number of repetition passes over the target list.
    pub samples: u32,
    /// Ordered targets, one per non-blank line of the targets file.
    targets: Vec<String>,
}

impl WorkPlan {
    pub fn new(samples: u32, targets: Vec<String>) -> Result<Self> {
        ensure!(samples >= 1, "work plan needs at least one sample");
        ensure!(!targets.is_empty(), "work plan needs at least one target");
        Ok(Self { samples, targets })
    }

    /// Load the target list from disk. Lines are trimmed; blank lines skipped.
    pub fn load(samples: u32, targets_file: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(targets_file)
            .with_context(|| format!("failed to read target list {}", targets_file.display()))?;
        let targets: Vec<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        Self::new(samples, targets)
    }

    /// Number of items in one sample pass.
    pub fn items(&self) -> u32 {
        self.targets.len() as u32
    }

    /// Target for a 1-indexed item.
    pub fn target(&self, item: u32) -> &str {
        &self.targets[(item - 1) as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn load_skips_blank_lines_and_trims() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "https://a.example").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  https://b.example  ").unwrap();
        let plan = WorkPlan::load(2, file.path()).unwrap();
        assert_eq!(plan.items(), 2);
        assert_eq!(plan.target(1), "https://a.example");
        assert_eq!(plan.target(2), "https://b.example");
    }

    #[test]
    fn rejects_empty_plan() {
        assert!(WorkPlan::new(0, vec!["x".into()]).is_err());
        assert!(WorkPlan::new(1, vec![]).is_err());
    }
}
