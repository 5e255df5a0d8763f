use anyhow::{bail, Context, Result};
use rand::Rng;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, info_span, warn};

use crate::core::dataset::{load_buckets, ClassBucket};
use crate::core::detection::{tag_bucket, Detector, FlagRule};
use crate::core::filter::{filter_bucket, QuotaBounds, RemovalReason, Tag};
use crate::core::operations::{Quarantine, QuarantineOutcome};
use crate::progress::bucket_progress;

/// Where a bucket ended up relative to the quota range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketStatus {
    WithinRange,
    BelowMinimum,
    AboveMaximum,
}

#[derive(Debug, Clone, Serialize)]
pub struct BucketReport {
    pub breed: String,
    pub initial: usize,
    pub flagged: usize,
    pub clean: usize,
    /// `name: reason` for each image the detector could not classify
    pub unclassifiable: Vec<String>,
    pub removed_flagged: usize,
    pub removed_excess: usize,
    /// Images that actually left the folder (or were planned to, on a dry run)
    pub removed: usize,
    pub move_failures: Vec<String>,
    /// Images chosen for removal that had already vanished from the folder
    pub missing: Vec<String>,
    pub final_count: usize,
    pub status: BucketStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct QuotaSummary {
    pub root: PathBuf,
    pub quarantine_root: PathBuf,
    pub min_count: usize,
    pub max_count: usize,
    pub dry_run: bool,
    pub buckets: Vec<BucketReport>,
}

impl QuotaSummary {
    pub fn total_removed(&self) -> usize {
        self.buckets.iter().map(|b| b.removed).sum()
    }

    pub fn log(&self) {
        for bucket in &self.buckets {
            if bucket.removed == 0 && bucket.status == BucketStatus::WithinRange {
                continue;
            }
            info!(
                "{}: {} -> {} images (removed {}, {} flagged, {} excess, {} unclassifiable)",
                bucket.breed,
                bucket.initial,
                bucket.final_count,
                bucket.removed,
                bucket.removed_flagged,
                bucket.removed_excess,
                bucket.unclassifiable.len()
            );
            match bucket.status {
                BucketStatus::BelowMinimum => warn!(
                    "{}: final count {} is below the minimum of {}",
                    bucket.breed, bucket.final_count, self.min_count
                ),
                BucketStatus::AboveMaximum => warn!(
                    "{}: final count {} is above the maximum of {}",
                    bucket.breed, bucket.final_count, self.max_count
                ),
                BucketStatus::WithinRange => {}
            }
        }
        info!(
            "Quota filtering complete: {} images removed across {} breeds. Rejected images are in {:?}",
            self.total_removed(),
            self.buckets.len(),
            self.quarantine_root
        );
    }
}

/// Everything the quota stage needs besides the detector and the RNG
#[derive(Debug, Clone)]
pub struct QuotaOptions {
    pub bounds: QuotaBounds,
    pub rule: FlagRule,
    pub quarantine: Quarantine,
    pub dry_run: bool,
}

fn status_for(count: usize, bounds: QuotaBounds) -> BucketStatus {
    if count < bounds.min_count {
        BucketStatus::BelowMinimum
    } else if count > bounds.max_count {
        BucketStatus::AboveMaximum
    } else {
        BucketStatus::WithinRange
    }
}

/// Tag, decide and quarantine one bucket
pub fn process_bucket<R: Rng + ?Sized>(
    bucket: &ClassBucket,
    detector: &dyn Detector,
    options: &QuotaOptions,
    rng: &mut R,
) -> BucketReport {
    let tagged = tag_bucket(bucket, detector, &options.rule);
    let flagged = tagged.items.iter().filter(|i| i.tag == Tag::Flagged).count();
    let clean = tagged.items.len() - flagged;

    let decision = filter_bucket(&tagged.items, options.bounds, rng);
    if let Some(shortfall) = decision.shortfall {
        warn!(
            "{} has {} classifiable images, {} short of the minimum",
            bucket.name,
            tagged.items.len(),
            shortfall
        );
    }

    let mut removed = 0;
    let mut move_failures = Vec::new();
    let mut missing = Vec::new();
    let class_path = Path::new(&bucket.name);
    for removal in &decision.removed {
        if options.dry_run {
            info!("Would quarantine {} ({:?})", removal.item.name, removal.reason);
            removed += 1;
            continue;
        }

        let src = bucket.dir.join(&removal.item.name);
        let outcome = options.quarantine.relocate(class_path, &src);
        if outcome.is_removed() {
            removed += 1;
            continue;
        }
        match outcome {
            QuarantineOutcome::Failed(e) => {
                move_failures.push(format!("{}: {}", removal.item.name, e));
            }
            QuarantineOutcome::Missing => missing.push(removal.item.name.clone()),
            QuarantineOutcome::Moved(_) | QuarantineOutcome::AlreadyQuarantined(_) => {}
        }
    }

    let final_count = bucket.len() - removed - missing.len();
    BucketReport {
        breed: bucket.name.clone(),
        initial: bucket.len(),
        flagged,
        clean,
        unclassifiable: tagged
            .unclassified
            .into_iter()
            .map(|u| format!("{}: {}", u.name, u.reason))
            .collect(),
        removed_flagged: decision.removed_with(RemovalReason::Flagged),
        removed_excess: decision.removed_with(RemovalReason::Excess),
        removed,
        move_failures,
        missing,
        final_count,
        status: status_for(final_count, options.bounds),
    }
}

/// Run the breed quota filter over every breed folder under `root`
pub fn run_quota_stage<R: Rng + ?Sized>(
    root: &Path,
    detector: &dyn Detector,
    options: &QuotaOptions,
    rng: &mut R,
) -> Result<QuotaSummary> {
    if !root.is_dir() {
        bail!("dataset folder {:?} does not exist", root);
    }

    let buckets = load_buckets(root).with_context(|| format!("failed to list {:?}", root))?;
    info!(
        "Filtering {} breeds in {:?} (target {}-{})",
        buckets.len(),
        root,
        options.bounds.min_count,
        options.bounds.max_count
    );

    let pb = bucket_progress(buckets.len(), "filter");
    let mut reports = Vec::with_capacity(buckets.len());
    for bucket in &buckets {
        let span = info_span!("bucket", breed = %bucket.name);
        let _enter = span.enter();
        reports.push(process_bucket(bucket, detector, options, rng));
        pb.inc(1);
    }
    pb.finish_and_clear();

    Ok(QuotaSummary {
        root: root.to_path_buf(),
        quarantine_root: options.quarantine.root().to_path_buf(),
        min_count: options.bounds.min_count,
        max_count: options.bounds.max_count,
        dry_run: options.dry_run,
        buckets: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::detection::{Detection, TableDetector};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;
    use std::fs;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        quarantine: PathBuf,
        detector: TableDetector,
    }

    /// One breed folder with `flagged` person images, `clean` plain ones and
    /// `broken` images the detector fails on
    fn fixture(flagged: usize, clean: usize, broken: usize) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("train");
        let breed_dir = root.join("beagle");
        fs::create_dir_all(&breed_dir).unwrap();

        let mut answers = HashMap::new();
        let person = Detection {
            class_id: 0,
            confidence: 0.9,
        };
        for i in 0..flagged {
            let name = format!("f_{:03}.jpg", i);
            fs::write(breed_dir.join(&name), b"x").unwrap();
            answers.insert(name, Some(vec![person]));
        }
        for i in 0..clean {
            let name = format!("c_{:03}.jpg", i);
            fs::write(breed_dir.join(&name), b"x").unwrap();
            answers.insert(name, Some(vec![]));
        }
        for i in 0..broken {
            let name = format!("x_{:03}.jpg", i);
            fs::write(breed_dir.join(&name), b"x").unwrap();
            answers.insert(name, None);
        }

        let quarantine = dir.path().join("rejected");
        Fixture {
            _dir: dir,
            root,
            quarantine,
            detector: TableDetector { answers },
        }
    }

    fn options(fx: &Fixture, min_count: usize, max_count: usize, dry_run: bool) -> QuotaOptions {
        QuotaOptions {
            bounds: QuotaBounds {
                min_count,
                max_count,
            },
            rule: FlagRule {
                class_id: 0,
                confidence_threshold: 0.5,
            },
            quarantine: Quarantine::new(&fx.quarantine),
            dry_run,
        }
    }

    #[test]
    fn test_stage_moves_flagged_into_quarantine() {
        let fx = fixture(30, 70, 0);
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let summary = run_quota_stage(&fx.root, &fx.detector, &options(&fx, 80, 85, false), &mut rng)
            .unwrap();

        let report = &summary.buckets[0];
        assert_eq!(report.initial, 100);
        assert_eq!(report.removed, 20);
        assert_eq!(report.final_count, 80);
        assert_eq!(report.status, BucketStatus::WithinRange);
        assert_eq!(fs::read_dir(fx.root.join("beagle")).unwrap().count(), 80);
        assert_eq!(fs::read_dir(fx.quarantine.join("beagle")).unwrap().count(), 20);
        assert!(fx.quarantine.join("beagle/f_000.jpg").exists());
    }

    #[test]
    fn test_second_run_removes_nothing() {
        let fx = fixture(10, 100, 0);
        let opts = options(&fx, 80, 85, false);
        let first =
            run_quota_stage(&fx.root, &fx.detector, &opts, &mut ChaCha8Rng::seed_from_u64(1))
                .unwrap();
        assert_eq!(first.buckets[0].final_count, 85);

        let second =
            run_quota_stage(&fx.root, &fx.detector, &opts, &mut ChaCha8Rng::seed_from_u64(2))
                .unwrap();
        assert_eq!(second.buckets[0].removed, 0);
        assert_eq!(second.buckets[0].final_count, 85);
    }

    #[test]
    fn test_unclassifiable_images_stay_and_are_reported() {
        let fx = fixture(5, 50, 3);
        let summary = run_quota_stage(
            &fx.root,
            &fx.detector,
            &options(&fx, 80, 85, false),
            &mut ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap();

        let report = &summary.buckets[0];
        assert_eq!(report.unclassifiable.len(), 3);
        assert!(report.unclassifiable[0].starts_with("x_000.jpg: "));
        assert!(report.unclassifiable[0].len() > "x_000.jpg: ".len());
        assert_eq!(report.removed, 0);
        assert_eq!(report.final_count, 58);
        assert_eq!(report.status, BucketStatus::BelowMinimum);
    }

    #[test]
    fn test_quarantine_collision_keeps_image_in_place() {
        let fx = fixture(4, 6, 0);
        let occupied = fx.quarantine.join("beagle/f_000.jpg");
        fs::create_dir_all(occupied.parent().unwrap()).unwrap();
        fs::write(&occupied, b"older copy").unwrap();

        let summary = run_quota_stage(
            &fx.root,
            &fx.detector,
            &options(&fx, 6, 6, false),
            &mut ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap();

        let report = &summary.buckets[0];
        assert_eq!(report.removed, 3);
        assert_eq!(report.move_failures.len(), 1);
        assert!(report.move_failures[0].starts_with("f_000.jpg: "));
        assert_eq!(report.final_count, 7);
        assert_eq!(report.status, BucketStatus::AboveMaximum);
        assert!(fx.root.join("beagle/f_000.jpg").exists());
        assert_eq!(fs::read_dir(fx.root.join("beagle")).unwrap().count(), 7);
        assert_eq!(fs::read(&occupied).unwrap(), b"older copy");
    }

    #[test]
    fn test_vanished_image_is_not_counted() {
        let fx = fixture(4, 6, 0);
        let bucket = ClassBucket::load("beagle", fx.root.join("beagle")).unwrap();
        fs::remove_file(fx.root.join("beagle/f_001.jpg")).unwrap();

        let report = process_bucket(
            &bucket,
            &fx.detector,
            &options(&fx, 6, 6, false),
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        assert_eq!(report.removed, 3);
        assert_eq!(report.missing, vec!["f_001.jpg".to_string()]);
        assert_eq!(report.final_count, 6);
        assert_eq!(report.status, BucketStatus::WithinRange);
        assert_eq!(fs::read_dir(fx.root.join("beagle")).unwrap().count(), 6);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let fx = fixture(30, 70, 0);
        let summary = run_quota_stage(
            &fx.root,
            &fx.detector,
            &options(&fx, 80, 85, true),
            &mut ChaCha8Rng::seed_from_u64(0),
        )
        .unwrap();

        assert_eq!(summary.buckets[0].removed, 20);
        assert_eq!(fs::read_dir(fx.root.join("beagle")).unwrap().count(), 100);
        assert!(!fx.quarantine.exists());
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let fx = fixture(0, 0, 0);
        let result = run_quota_stage(
            &fx.root.join("nope"),
            &fx.detector,
            &options(&fx, 1, 2, false),
            &mut ChaCha8Rng::seed_from_u64(0),
        );
        assert!(result.is_err());
    }
}
