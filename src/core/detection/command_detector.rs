use std::path::Path;
use std::process::Command;
use tracing::debug;

use super::{Detection, DetectionError, Detector};

/// Runs an external detector program once per image.
///
/// Invocation: `program args... <image_path> <confidence_threshold>`. Each
/// non-empty stdout line must read `class_id confidence`.
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

/// Parse the detector's stdout into detections
pub fn parse_detector_output(stdout: &str) -> Result<Vec<Detection>, DetectionError> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let mut fields = line.split_whitespace();
            let class_id = fields.next().and_then(|v| v.parse::<u32>().ok());
            let confidence = fields.next().and_then(|v| v.parse::<f32>().ok());
            match (class_id, confidence, fields.next()) {
                (Some(class_id), Some(confidence), None) => Ok(Detection {
                    class_id,
                    confidence,
                }),
                _ => Err(DetectionError::BadOutput(line.to_string())),
            }
        })
        .collect()
}

impl Detector for CommandDetector {
    fn detect(
        &self,
        image_path: &Path,
        confidence_threshold: f32,
    ) -> Result<Vec<Detection>, DetectionError> {
        debug!("Running {} on {:?}", self.program, image_path);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(image_path)
            .arg(confidence_threshold.to_string())
            .output()
            .map_err(|source| DetectionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DetectionError::CommandFailed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let detections = parse_detector_output(&String::from_utf8_lossy(&output.stdout))?;
        Ok(detections
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}
