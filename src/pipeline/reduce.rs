use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

use crate::config::{QualityConfig, ReduceConfig};
use crate::core::analysis::check_quality;
use crate::core::dataset::{list_class_dirs, list_image_files, DatasetSplit};
use crate::core::operations::{resize_exact, save_rgb, Quarantine, QuarantineOutcome};
use crate::progress::bucket_progress;

#[derive(Debug, Clone, Serialize)]
pub struct ReduceReport {
    pub split: DatasetSplit,
    pub breed: String,
    pub valid: usize,
    pub required: usize,
    /// `false` when the breed had too few valid images and was left alone
    pub reduced: bool,
    pub removed: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReduceSummary {
    pub breeds: Vec<ReduceReport>,
    pub move_failures: Vec<String>,
    pub dry_run: bool,
}

impl ReduceSummary {
    pub fn skipped(&self) -> impl Iterator<Item = &ReduceReport> {
        self.breeds.iter().filter(|r| !r.reduced)
    }
}

/// Collect the images of one folder that pass the quality check, resizing
/// each one in place unless this is a dry run.
fn collect_valid(
    images: &[PathBuf],
    quality: &QualityConfig,
    dry_run: bool,
) -> Vec<PathBuf> {
    let mut valid = Vec::new();
    for path in images {
        let img = match image::open(path) {
            Ok(img) => img,
            Err(e) => {
                debug!("Skipping unreadable {:?}: {}", path, e);
                continue;
            }
        };
        if let Err(issue) = check_quality(&img, quality) {
            debug!("Rejecting {:?}: {:?}", path, issue);
            continue;
        }
        if !dry_run {
            let resized = resize_exact(&img, quality.target_width, quality.target_height);
            if let Err(e) = save_rgb(&resized, path) {
                warn!("Could not resize {:?}: {}", path, e);
                continue;
            }
        }
        valid.push(path.clone());
    }
    valid
}

/// Keep exactly the configured number of clear images per breed in every split.
///
/// Breeds without enough valid images are reported and left untouched. For
/// the rest, the first valid images by file name are kept and every other
/// image in the folder is quarantined.
pub fn run_reduce_stage(
    root: &Path,
    targets: &ReduceConfig,
    quality: &QualityConfig,
    quarantine: &Quarantine,
    dry_run: bool,
) -> Result<ReduceSummary> {
    if !root.is_dir() {
        bail!("dataset folder {:?} does not exist", root);
    }

    let mut summary = ReduceSummary {
        dry_run,
        ..ReduceSummary::default()
    };

    for split in DatasetSplit::ALL {
        let split_dir = root.join(split.as_str());
        if !split_dir.is_dir() {
            warn!("No {} split in {:?}", split.as_str(), root);
            continue;
        }
        let required = targets.target_for(split);
        let breeds = list_class_dirs(&split_dir)
            .with_context(|| format!("failed to list {:?}", split_dir))?;
        info!("Processing {} breeds in {}", breeds.len(), split.as_str());

        let pb = bucket_progress(breeds.len(), split.as_str());
        for (breed, breed_dir) in &breeds {
            pb.inc(1);
            let span = info_span!("bucket", split = split.as_str(), breed = %breed);
            let _enter = span.enter();

            let images = list_image_files(breed_dir)?;
            let valid = collect_valid(&images, quality, dry_run);

            if valid.len() < required {
                warn!(
                    "Breed {} in {} has only {} valid images. Needed {}. Skipping",
                    breed,
                    split.as_str(),
                    valid.len(),
                    required
                );
                summary.breeds.push(ReduceReport {
                    split,
                    breed: breed.clone(),
                    valid: valid.len(),
                    required,
                    reduced: false,
                    removed: 0,
                });
                continue;
            }

            let keep = &valid[..required];
            let class_path = Path::new(split.as_str()).join(breed);
            let mut removed = 0;
            for path in images.iter().filter(|p| !keep.contains(p)) {
                if dry_run {
                    removed += 1;
                    continue;
                }
                match quarantine.relocate(&class_path, path) {
                    QuarantineOutcome::Moved(_) => removed += 1,
                    QuarantineOutcome::Failed(e) => {
                        summary.move_failures.push(format!("{}: {}", path.display(), e))
                    }
                    _ => {}
                }
            }

            info!(
                "Breed {} in {}: kept exactly {} clear images",
                breed,
                split.as_str(),
                required
            );
            summary.breeds.push(ReduceReport {
                split,
                breed: breed.clone(),
                valid: valid.len(),
                required,
                reduced: true,
                removed,
            });
        }
        pb.finish_and_clear();
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::analysis::{checkerboard, flat};
    use crate::core::dataset::list_files;
    use image::GenericImageView;
    use std::fs;

    fn targets(train: usize) -> ReduceConfig {
        ReduceConfig {
            train,
            val: 1,
            test: 1,
        }
    }

    #[test]
    fn test_keeps_first_valid_and_quarantines_rest() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("processed");
        let pug = root.join("train/pug");
        fs::create_dir_all(&pug).unwrap();
        checkerboard(150, 4).save(pug.join("a.png")).unwrap();
        flat(150, 150, 100).save(pug.join("b.png")).unwrap();
        checkerboard(150, 5).save(pug.join("c.png")).unwrap();
        checkerboard(150, 6).save(pug.join("d.png")).unwrap();
        checkerboard(60, 4).save(pug.join("e.png")).unwrap();

        let quarantine = Quarantine::new(dir.path().join("rejected"));
        let summary = run_reduce_stage(
            &root,
            &targets(2),
            &QualityConfig::default(),
            &quarantine,
            false,
        )
        .unwrap();

        let report = &summary.breeds[0];
        assert!(report.reduced);
        assert_eq!(report.valid, 3);
        assert_eq!(report.removed, 3);

        let left: Vec<_> = list_files(&pug)
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(left, vec!["a.png", "c.png"]);
        assert_eq!(image::open(pug.join("a.png")).unwrap().dimensions(), (224, 224));
        assert!(dir.path().join("rejected/train/pug/b.png").exists());
    }

    #[test]
    fn test_breed_with_too_few_valid_images_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("processed");
        let pug = root.join("train/pug");
        fs::create_dir_all(&pug).unwrap();
        checkerboard(150, 4).save(pug.join("a.png")).unwrap();
        flat(150, 150, 100).save(pug.join("b.png")).unwrap();

        let quarantine = Quarantine::new(dir.path().join("rejected"));
        let summary = run_reduce_stage(
            &root,
            &targets(5),
            &QualityConfig::default(),
            &quarantine,
            false,
        )
        .unwrap();

        assert_eq!(summary.skipped().count(), 1);
        assert_eq!(list_files(&pug).unwrap().len(), 2);
        assert!(!dir.path().join("rejected").exists());
    }
}
