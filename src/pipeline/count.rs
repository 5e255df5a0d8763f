use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::core::dataset::{list_class_dirs, list_files, DatasetSplit};

/// Image counts of a split dataset
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CountReport {
    /// split -> breed -> file count
    pub splits: BTreeMap<DatasetSplit, BTreeMap<String, usize>>,
    pub split_totals: BTreeMap<DatasetSplit, usize>,
    /// breed -> files across all splits
    pub breed_totals: BTreeMap<String, usize>,
    pub grand_total: usize,
}

/// Count the files under `root/<split>/<breed>/` for train, val and test
pub fn count_images(root: &Path) -> Result<CountReport> {
    if !root.is_dir() {
        bail!("dataset folder {:?} does not exist", root);
    }

    let mut report = CountReport::default();
    for split in DatasetSplit::ALL {
        let split_dir = root.join(split.as_str());
        if !split_dir.is_dir() {
            continue;
        }

        let mut breeds = BTreeMap::new();
        for (breed, breed_dir) in list_class_dirs(&split_dir)? {
            let count = list_files(&breed_dir)?.len();
            *report.breed_totals.entry(breed.clone()).or_insert(0) += count;
            breeds.insert(breed, count);
        }

        let total: usize = breeds.values().sum();
        report.split_totals.insert(split, total);
        report.grand_total += total;
        report.splits.insert(split, breeds);
    }

    Ok(report)
}

impl fmt::Display for CountReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Processed dataset image counts (breed-wise and split-wise):")?;
        for (split, breeds) in &self.splits {
            let total = self.split_totals.get(split).copied().unwrap_or(0);
            writeln!(f)?;
            writeln!(
                f,
                "--- {} (Total: {} images) ---",
                split.as_str().to_uppercase(),
                total
            )?;
            for (breed, count) in breeds {
                writeln!(f, "{}: {} images", breed, count)?;
            }
        }

        writeln!(f)?;
        writeln!(f, "Total images per breed (all splits combined):")?;
        for (breed, count) in &self.breed_totals {
            writeln!(f, "{}: {} images", breed, count)?;
        }

        writeln!(f)?;
        write!(f, "GRAND TOTAL IMAGES IN DATASET: {}", self.grand_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_counts_per_split_and_breed() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(&root.join("train/pug/a.jpg"));
        touch(&root.join("train/pug/b.jpg"));
        touch(&root.join("train/beagle/c.jpg"));
        touch(&root.join("test/pug/d.jpg"));
        touch(&root.join("other/pug/e.jpg"));

        let report = count_images(root).unwrap();
        assert_eq!(report.splits[&DatasetSplit::Train]["pug"], 2);
        assert_eq!(report.split_totals[&DatasetSplit::Train], 3);
        assert_eq!(report.split_totals[&DatasetSplit::Test], 1);
        assert!(!report.splits.contains_key(&DatasetSplit::Val));
        assert_eq!(report.breed_totals["pug"], 3);
        assert_eq!(report.grand_total, 4);

        let text = report.to_string();
        assert!(text.contains("--- TRAIN (Total: 3 images) ---"));
        assert!(text.ends_with("GRAND TOTAL IMAGES IN DATASET: 4"));
    }
}
