//! Progress bars for per-bucket loops

use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{msg:<24} [{bar:40.cyan/blue}] {pos}/{len} ({elapsed})";

/// Progress bar over `len` buckets, labelled with the stage name
pub fn bucket_progress(len: usize, stage: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    let pb = ProgressBar::new(len as u64).with_style(style);
    pb.set_message(stage.to_string());
    pb
}
