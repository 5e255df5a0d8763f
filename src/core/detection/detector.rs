use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::dataset::{ClassBucket, LabelError};
use crate::core::filter::{ImageItem, Tag};

/// One object found in an image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: u32,
    pub confidence: f32,
}

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("image {path:?} is unreadable: {source}")]
    UnreadableImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("prediction file for {path:?} is unusable: {source}")]
    Label {
        path: PathBuf,
        #[source]
        source: LabelError,
    },
    #[error("failed to run detector {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("detector exited with {status}: {stderr}")]
    CommandFailed { status: String, stderr: String },
    #[error("unparsable detector output line {0:?}")]
    BadOutput(String),
}

/// External object detector.
///
/// Implementations return every detection at or above `confidence_threshold`.
/// A call that fails leaves the image unclassified; callers never retry it.
pub trait Detector {
    fn detect(
        &self,
        image_path: &Path,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectionError>;
}

/// Decides the flagged/clean tag from a detector's output
#[derive(Debug, Clone, Copy)]
pub struct FlagRule {
    pub class_id: u32,
    pub confidence_threshold: f32,
}

impl FlagRule {
    pub fn tag(&self, detections: &[Detection]) -> Tag {
        let flagged = detections
            .iter()
            .any(|d| d.class_id == self.class_id && d.confidence >= self.confidence_threshold);
        if flagged {
            Tag::Flagged
        } else {
            Tag::Clean
        }
    }
}

/// An image the detector could not classify, with the reason
#[derive(Debug, Clone)]
pub struct Unclassified {
    pub name: String,
    pub reason: String,
}

/// A bucket after one detector pass over every image
#[derive(Debug, Clone, Default)]
pub struct TaggedBucket {
    pub items: Vec<ImageItem>,
    pub unclassified: Vec<Unclassified>,
}

/// Run the detector once over every image in the bucket, in bucket order.
///
/// Failures are logged and collected; the rest of the bucket is still tagged.
pub fn tag_bucket(bucket: &ClassBucket, detector: &dyn Detector, rule: &FlagRule) -> TaggedBucket {
    let mut tagged = TaggedBucket::default();

    for image_path in &bucket.images {
        let name = image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        match detector.detect(image_path, rule.confidence_threshold) {
            Ok(detections) => {
                let tag = rule.tag(&detections);
                debug!("{} -> {:?} ({} detections)", name, tag, detections.len());
                tagged.items.push(ImageItem::new(name, tag));
            }
            Err(e) => {
                warn!("Could not classify {} in {}: {}", name, bucket.name, e);
                tagged.unclassified.push(Unclassified {
                    name,
                    reason: e.to_string(),
                });
            }
        }
    }

    tagged
}
