use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct YoloDetection {
    pub class_id: u32,
    pub x_center: f32,
    pub y_center: f32,
    pub width: f32,
    pub height: f32,
    /// Present when the predictor saved confidences (sixth column)
    pub confidence: Option<f32>,
}

#[derive(Debug, Error)]
pub enum LabelError {
    #[error("failed to read label file: {0}")]
    Io(#[from] io::Error),
    #[error("malformed label line {line}: {content:?}")]
    Malformed { line: usize, content: String },
}

/// Parse the contents of a YOLO prediction file.
///
/// Each non-empty line is `class_id x_center y_center width height [confidence]`.
/// Lines starting with `#` are ignored. Any other line is an error, since a
/// half-read prediction file cannot be trusted to say "no person here".
pub fn parse_label_str(content: &str) -> Result<Vec<YoloDetection>, LabelError> {
    let mut detections = Vec::new();

    for (idx, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let malformed = || LabelError::Malformed {
            line: idx + 1,
            content: line.to_string(),
        };

        let values: Vec<&str> = line.split_whitespace().collect();
        if values.len() != 5 && values.len() != 6 {
            return Err(malformed());
        }

        let class_id = values[0].parse::<u32>().map_err(|_| malformed())?;
        let mut coords = [0.0f32; 4];
        for (slot, raw) in coords.iter_mut().zip(&values[1..5]) {
            *slot = raw.parse::<f32>().map_err(|_| malformed())?;
        }
        let confidence = match values.get(5) {
            Some(raw) => Some(raw.parse::<f32>().map_err(|_| malformed())?),
            None => None,
        };

        detections.push(YoloDetection {
            class_id,
            x_center: coords[0],
            y_center: coords[1],
            width: coords[2],
            height: coords[3],
            confidence,
        });
    }

    Ok(detections)
}

/// Parse a YOLO prediction file.
///
/// Returns `Ok(None)` when the file does not exist: predictors write no file
/// for an image without detections.
pub fn parse_label_file(label_path: &Path) -> Result<Option<Vec<YoloDetection>>, LabelError> {
    match fs::read_to_string(label_path) {
        Ok(content) => parse_label_str(&content).map(Some),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(LabelError::Io(e)),
    }
}
