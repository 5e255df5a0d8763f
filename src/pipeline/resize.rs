use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::QualityConfig;
use crate::core::dataset::{list_class_dirs, list_files, DatasetSplit};
use crate::core::operations::{resize_exact, save_rgb};
use crate::progress::bucket_progress;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResizeSummary {
    /// Processed image count keyed by `split/breed` or `breed`
    pub processed: BTreeMap<String, usize>,
    pub failed: Vec<String>,
}

impl ResizeSummary {
    pub fn total(&self) -> usize {
        self.processed.values().sum()
    }
}

/// Resize every readable image in `src_dir` into `dst_dir` as `<stem>.jpg`
fn resize_folder(
    src_dir: &Path,
    dst_dir: &Path,
    quality: &QualityConfig,
    failed: &mut Vec<String>,
) -> Result<usize> {
    let mut count = 0;
    for src in list_files(src_dir).with_context(|| format!("failed to list {:?}", src_dir))? {
        let img = match image::open(&src) {
            Ok(img) => img,
            Err(e) => {
                debug!("Skipping {:?}: {}", src, e);
                continue;
            }
        };

        let stem = src.file_stem().unwrap_or_default().to_string_lossy();
        let dst = dst_dir.join(format!("{}.jpg", stem));
        let resized = resize_exact(&img, quality.target_width, quality.target_height);
        match save_rgb(&resized, &dst) {
            Ok(()) => count += 1,
            Err(e) => {
                warn!("Error processing {:?}: {}", src, e);
                failed.push(src.display().to_string());
            }
        }
    }
    Ok(count)
}

/// Mirror `source_root` into `target_root` with every image resized.
///
/// Folders named train/val/test are treated as splits holding breed folders;
/// any other folder is a breed.
pub fn run_resize_stage(
    source_root: &Path,
    target_root: &Path,
    quality: &QualityConfig,
) -> Result<ResizeSummary> {
    if !source_root.is_dir() {
        bail!("source folder {:?} does not exist", source_root);
    }

    let mut jobs = Vec::new();
    for (name, dir) in list_class_dirs(source_root)? {
        match DatasetSplit::from_dir_name(&name) {
            Some(_) => {
                for (breed, breed_dir) in list_class_dirs(&dir)? {
                    let key = format!("{}/{}", name, breed);
                    let dst = target_root.join(&name).join(&breed);
                    jobs.push((key, breed_dir, dst));
                }
            }
            None => {
                let dst = target_root.join(&name);
                jobs.push((name, dir, dst));
            }
        }
    }

    let mut summary = ResizeSummary::default();
    let pb = bucket_progress(jobs.len(), "resize");
    for (key, src_dir, dst_dir) in jobs {
        let count = resize_folder(&src_dir, &dst_dir, quality, &mut summary.failed)?;
        summary.processed.insert(key, count);
        pb.inc(1);
    }
    pb.finish_and_clear();

    for (key, count) in &summary.processed {
        info!("{}: {} images", key, count);
    }
    info!(
        "Resized {} images to {}x{} into {:?}",
        summary.total(),
        quality.target_width,
        quality.target_height,
        target_root
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::fs;

    fn write_png(path: &Path, w: u32, h: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_pixel(w, h, Rgb([50, 60, 70])).save(path).unwrap();
    }

    #[test]
    fn test_mirrors_split_and_flat_layouts() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("dataset");
        let dst = dir.path().join("processed");
        write_png(&src.join("Train/pug/a.png"), 300, 200);
        write_png(&src.join("Train/pug/b.png"), 50, 80);
        write_png(&src.join("beagle/c.png"), 640, 480);
        fs::write(src.join("beagle/notes.txt"), "x").unwrap();

        let summary = run_resize_stage(&src, &dst, &QualityConfig::default()).unwrap();
        assert_eq!(summary.processed.get("Train/pug"), Some(&2));
        assert_eq!(summary.processed.get("beagle"), Some(&1));
        assert_eq!(summary.total(), 3);

        let out = image::open(dst.join("Train/pug/a.jpg")).unwrap();
        assert_eq!(out.dimensions(), (224, 224));
        assert!(dst.join("beagle/c.jpg").exists());
        assert!(!dst.join("beagle/notes.jpg").exists());
    }
}
