mod command_detector;
mod detector;
mod label_detector;

pub use command_detector::CommandDetector;
pub use detector::{tag_bucket, Detection, DetectionError, Detector, FlagRule};
pub use label_detector::LabelFileDetector;

#[cfg(test)]
pub(crate) use detector::tests::TableDetector;

use crate::config::DetectorConfig;

/// Build the detector a configuration names
pub fn build_detector(config: &DetectorConfig) -> Box<dyn Detector> {
    match config {
        DetectorConfig::Labels { labels_root } => Box::new(LabelFileDetector::new(labels_root)),
        DetectorConfig::Command { program, args } => {
            Box::new(CommandDetector::new(program.clone(), args.clone()))
        }
    }
}
