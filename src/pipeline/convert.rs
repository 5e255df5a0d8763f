use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::core::dataset::{list_class_dirs, list_files};
use crate::core::operations::save_rgb;
use crate::progress::bucket_progress;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvertSummary {
    pub converted: Vec<String>,
    /// Files that could not be decoded, or whose `.jpg` name is taken
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

fn is_jpg(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("jpg"))
        .unwrap_or(false)
}

/// Re-encode every non-`.jpg` file in `dir` as `<stem>.jpg` and remove the original
fn convert_dir(dir: &Path, summary: &mut ConvertSummary) -> Result<()> {
    for path in list_files(dir).with_context(|| format!("failed to list {:?}", dir))? {
        if is_jpg(&path) {
            continue;
        }
        let shown = path.display().to_string();

        let img = match image::open(&path) {
            Ok(img) => img,
            Err(e) => {
                warn!("Skipping {} (cannot read): {}", shown, e);
                summary.skipped.push(shown);
                continue;
            }
        };

        let target = path.with_extension("jpg");
        if target.exists() {
            warn!("Skipping {}: {:?} already exists", shown, target);
            summary.skipped.push(shown);
            continue;
        }

        if let Err(e) = save_rgb(&img, &target) {
            warn!("Error converting {}: {}", shown, e);
            summary.failed.push(shown);
            continue;
        }

        if let Err(e) = fs::remove_file(&path) {
            warn!("Converted {} but could not remove it: {}", shown, e);
        }
        info!("Converted {} -> {:?}", shown, target.file_name().unwrap_or_default());
        summary.converted.push(shown);
    }
    Ok(())
}

/// Convert images to JPEG in place, in `root` itself and in each breed folder
pub fn run_convert_stage(root: &Path) -> Result<ConvertSummary> {
    if !root.is_dir() {
        bail!("image folder {:?} does not exist", root);
    }

    let mut dirs: Vec<PathBuf> = vec![root.to_path_buf()];
    dirs.extend(
        list_class_dirs(root)
            .with_context(|| format!("failed to list {:?}", root))?
            .into_iter()
            .map(|(_, dir)| dir),
    );

    let mut summary = ConvertSummary::default();
    let pb = bucket_progress(dirs.len(), "convert");
    for dir in &dirs {
        convert_dir(dir, &mut summary)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(
        "Conversion complete: {} converted, {} skipped, {} failed",
        summary.converted.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}
