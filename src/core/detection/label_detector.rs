use std::path::{Path, PathBuf};

use super::{Detection, DetectionError, Detector};
use crate::core::dataset::parse_label_file;

/// Reads detections that a YOLO predictor already wrote to disk.
///
/// The prediction for `<root>/<breed>/<stem>.<ext>` is expected at
/// `<labels_root>/<breed>/<stem>.txt`. A missing file means no detections.
pub struct LabelFileDetector {
    labels_root: PathBuf,
}

impl LabelFileDetector {
    pub fn new(labels_root: impl Into<PathBuf>) -> Self {
        Self {
            labels_root: labels_root.into(),
        }
    }

    pub fn label_path_for(&self, image_path: &Path) -> PathBuf {
        let mut path = self.labels_root.clone();
        if let Some(breed) = image_path.parent().and_then(|p| p.file_name()) {
            path.push(breed);
        }
        let stem = image_path.file_stem().unwrap_or_default();
        path.push(format!("{}.txt", stem.to_string_lossy()));
        path
    }
}

impl Detector for LabelFileDetector {
    fn detect(
        &self,
        image_path: &Path,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectionError> {
        // A prediction for an image that no longer decodes is meaningless
        image::image_dimensions(image_path).map_err(|source| DetectionError::UnreadableImage {
            path: image_path.to_path_buf(),
            source,
        })?;

        let label_path = self.label_path_for(image_path);
        let labels = parse_label_file(&label_path).map_err(|source| DetectionError::Label {
            path: label_path.clone(),
            source,
        })?;

        Ok(labels
            .unwrap_or_default()
            .into_iter()
            .map(|label| Detection {
                class_id: label.class_id,
                confidence: label.confidence.unwrap_or(1.0),
            })
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}
