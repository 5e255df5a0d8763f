use anyhow::{bail, Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::config::SplitConfig;
use crate::core::dataset::{list_class_dirs, list_image_files, DatasetSplit};
use crate::core::operations::copy_into;
use crate::progress::bucket_progress;

/// Planned image counts for one breed: `[train, val, test]`.
///
/// Each split gets at least one image. The test split takes what train and
/// val leave, so for tiny breeds the plan can exceed `total`; the later
/// slices then receive only what remains.
pub fn split_counts(total: usize, config: &SplitConfig) -> [usize; 3] {
    let n_train = ((config.train_ratio * total as f64) as usize).max(1);
    let n_val = ((config.val_ratio * total as f64) as usize).max(1);
    let n_test = total.saturating_sub(n_train + n_val).max(1);
    [n_train, n_val, n_test]
}

/// Images actually copied for one breed
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct SplitCounts {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SplitSummary {
    pub seed: u64,
    pub breeds: BTreeMap<String, SplitCounts>,
    pub copy_failures: Vec<String>,
}

/// Copy each breed's images under `source_root` into
/// `target_root/{train,val,test}/<breed>` after a seeded shuffle.
pub fn run_split_stage<R: Rng + ?Sized>(
    source_root: &Path,
    target_root: &Path,
    config: &SplitConfig,
    seed: u64,
    rng: &mut R,
) -> Result<SplitSummary> {
    if !source_root.is_dir() {
        bail!("source folder {:?} does not exist", source_root);
    }

    let breeds = list_class_dirs(source_root)
        .with_context(|| format!("failed to list {:?}", source_root))?;
    let mut summary = SplitSummary {
        seed,
        ..SplitSummary::default()
    };

    let pb = bucket_progress(breeds.len(), "split");
    for (breed, breed_dir) in &breeds {
        pb.inc(1);
        let mut images = list_image_files(breed_dir)?;
        if images.is_empty() {
            continue;
        }
        images.shuffle(rng);

        let plan = split_counts(images.len(), config);
        let mut counts = [0usize; 3];
        let mut remaining = images.as_slice();
        for (slot, (split, quota)) in DatasetSplit::ALL.iter().zip(plan).enumerate() {
            let take = quota.min(remaining.len());
            let (chunk, rest) = remaining.split_at(take);
            remaining = rest;

            let dest_dir = target_root.join(split.as_str()).join(breed);
            for image in chunk {
                match copy_into(image, &dest_dir) {
                    Ok(_) => counts[slot] += 1,
                    Err(e) => {
                        warn!("Failed to copy {:?}: {}", image, e);
                        summary.copy_failures.push(image.display().to_string());
                    }
                }
            }
        }

        let counts = SplitCounts {
            train: counts[0],
            val: counts[1],
            test: counts[2],
        };
        info!(
            "{}: train={}, val={}, test={}",
            breed, counts.train, counts.val, counts.test
        );
        summary.breeds.insert(breed.clone(), counts);
    }
    pb.finish_and_clear();

    info!("Dataset split completed into {:?}", target_root);
    Ok(summary)
}
