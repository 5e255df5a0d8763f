use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

use crate::core::analysis::{blur_score, content_hash, DuplicateTracker};
use crate::core::dataset::{list_class_dirs, list_files};
use crate::core::operations::{Quarantine, QuarantineOutcome};
use crate::progress::bucket_progress;

#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanSummary {
    /// Blurry images removed, per breed
    pub blurry: BTreeMap<String, usize>,
    /// Duplicate images removed, per breed
    pub duplicates: BTreeMap<String, usize>,
    pub unreadable: Vec<String>,
    pub move_failures: Vec<String>,
    pub dry_run: bool,
}

impl CleanSummary {
    pub fn total_blurry(&self) -> usize {
        self.blurry.values().sum()
    }

    pub fn total_duplicates(&self) -> usize {
        self.duplicates.values().sum()
    }

    pub fn log(&self) {
        info!("Blurry images removed:");
        for (breed, count) in &self.blurry {
            info!(" - {}: {}", breed, count);
        }
        info!("Total blurry images removed: {}", self.total_blurry());
        info!("Duplicate images removed:");
        for (breed, count) in &self.duplicates {
            info!(" - {}: {}", breed, count);
        }
        info!("Total duplicate images removed: {}", self.total_duplicates());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Blurry,
    Duplicate,
}

/// Quarantine blurry and duplicate images under `root/<split>/<breed>/`.
///
/// Duplicates are detected across the whole dataset: the first image with a
/// given pixel hash (in split, breed, file name order) stays.
pub fn run_clean_stage(
    root: &Path,
    blur_threshold: f64,
    quarantine: &Quarantine,
    dry_run: bool,
) -> Result<CleanSummary> {
    if !root.is_dir() {
        bail!("dataset folder {:?} does not exist", root);
    }

    let mut folders: Vec<(PathBuf, String, PathBuf)> = Vec::new();
    for (split, split_dir) in list_class_dirs(root)? {
        for (breed, breed_dir) in list_class_dirs(&split_dir)? {
            folders.push((Path::new(&split).join(&breed), breed, breed_dir));
        }
    }

    let mut summary = CleanSummary {
        dry_run,
        ..CleanSummary::default()
    };
    let mut tracker = DuplicateTracker::new();
    let pb = bucket_progress(folders.len(), "clean");

    for (class_path, breed, breed_dir) in &folders {
        let span = info_span!("bucket", folder = %class_path.display());
        let _enter = span.enter();

        let files = list_files(breed_dir).with_context(|| format!("failed to list {:?}", breed_dir))?;
        for path in files {
            let img = match image::open(&path) {
                Ok(img) => img,
                Err(e) => {
                    warn!("Error processing {:?}: {}", path, e);
                    summary.unreadable.push(path.display().to_string());
                    continue;
                }
            };

            let score = blur_score(&img);
            let rejection = if score < blur_threshold {
                info!("Removing blurry image {:?} (score={:.2})", path, score);
                Some(Rejection::Blurry)
            } else if let Some(original) = tracker.check(content_hash(&img), &path) {
                info!("Removing duplicate image {:?} (same as {:?})", path, original);
                Some(Rejection::Duplicate)
            } else {
                debug!("Keeping {:?} (score={:.2})", path, score);
                None
            };

            let Some(rejection) = rejection else {
                continue;
            };

            let removed = dry_run
                || match quarantine.relocate(class_path, &path) {
                    QuarantineOutcome::Moved(_) => true,
                    QuarantineOutcome::Failed(e) => {
                        summary.move_failures.push(format!("{}: {}", path.display(), e));
                        false
                    }
                    _ => false,
                };

            if removed {
                let counts = match rejection {
                    Rejection::Blurry => &mut summary.blurry,
                    Rejection::Duplicate => &mut summary.duplicates,
                };
                *counts.entry(breed.clone()).or_insert(0) += 1;
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();
    debug!("{} distinct sharp images seen", tracker.len());

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{checkerboard, flat};
    use std::fs;

    #[test]
    fn test_removes_blurry_and_duplicates_across_splits() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("processed");
        let quarantine = Quarantine::new(dir.path().join("rejected"));
        fs::create_dir_all(root.join("train/pug")).unwrap();
        fs::create_dir_all(root.join("val/pug")).unwrap();

        checkerboard(64, 4).save(root.join("train/pug/a.png")).unwrap();
        checkerboard(64, 8).save(root.join("train/pug/b.png")).unwrap();
        flat(64, 64, 120).save(root.join("train/pug/c.png")).unwrap();
        // same pixels as train/pug/a.png, in another split
        checkerboard(64, 4).save(root.join("val/pug/z.png")).unwrap();
        fs::write(root.join("val/pug/broken.png"), b"nope").unwrap();

        let summary = run_clean_stage(&root, 100.0, &quarantine, false).unwrap();
        assert_eq!(summary.total_blurry(), 1);
        assert_eq!(summary.total_duplicates(), 1);
        assert_eq!(summary.unreadable.len(), 1);

        assert!(root.join("train/pug/a.png").exists());
        assert!(root.join("train/pug/b.png").exists());
        assert!(dir.path().join("rejected/train/pug/c.png").exists());
        assert!(dir.path().join("rejected/val/pug/z.png").exists());
    }

    #[test]
    fn test_dry_run_counts_without_moving() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("processed");
        fs::create_dir_all(root.join("train/pug")).unwrap();
        flat(64, 64, 10).save(root.join("train/pug/c.png")).unwrap();

        let quarantine = Quarantine::new(dir.path().join("rejected"));
        let summary = run_clean_stage(&root, 100.0, &quarantine, true).unwrap();
        assert_eq!(summary.blurry.get("pug"), Some(&1));
        assert!(root.join("train/pug/c.png").exists());
    }
}
