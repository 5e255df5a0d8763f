use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::core::dataset::DatasetSplit;

/// Errors raised while loading or validating a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Pipeline configuration passed explicitly into every stage.
///
/// Every field has a default, so a config file only needs to name the values
/// it changes. CLI flags are applied on top after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub quota: QuotaConfig,
    pub detector: DetectorConfig,
    pub quality: QualityConfig,
    pub split: SplitConfig,
    pub reduce: ReduceConfig,
    /// Seed for every random choice the pipeline makes (split shuffles and
    /// quota sampling)
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            quota: QuotaConfig::default(),
            detector: DetectorConfig::default(),
            quality: QualityConfig::default(),
            split: SplitConfig::default(),
            reduce: ReduceConfig::default(),
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root that a stage reads per-breed folders from
    pub source_root: PathBuf,
    /// Root that a stage writes into (resize, split) or cleans in place
    pub target_root: PathBuf,
    /// Parallel root that removed images are moved to for manual review
    pub quarantine_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source_root: PathBuf::from("images"),
            target_root: PathBuf::from("processed_dataset"),
            quarantine_root: PathBuf::from("rejected_images"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub min_count: usize,
    pub max_count: usize,
    /// Detections below this confidence are ignored
    pub confidence_threshold: f32,
    /// Detector class id that marks an image as flagged (COCO 0 = person)
    pub flagged_class_id: u32,
    /// Split under the target root whose breeds are filtered
    pub split: DatasetSplit,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            min_count: 80,
            max_count: 85,
            confidence_threshold: 0.5,
            flagged_class_id: 0,
            split: DatasetSplit::Train,
        }
    }
}

/// Which external detector produces the flagged/clean tags
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectorConfig {
    /// Precomputed YOLO prediction files, one `<stem>.txt` per image under
    /// `labels_root/<breed>/`
    Labels { labels_root: PathBuf },
    /// External program called once per image as
    /// `program args... <image> <threshold>`
    Command { program: String, args: Vec<String> },
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig::Labels {
            labels_root: PathBuf::from("predictions"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Laplacian variance below which an image counts as blurry
    pub blur_threshold: f64,
    pub min_width: u32,
    pub min_height: u32,
    pub target_width: u32,
    pub target_height: u32,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            min_width: 100,
            min_height: 100,
            target_width: 224,
            target_height: 224,
        }
    }
}

/// Split ratios; the test split takes whatever the other two leave
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    pub train_ratio: f64,
    pub val_ratio: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.7,
            val_ratio: 0.15,
        }
    }
}

/// Exact number of images each breed keeps per split after reduction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReduceConfig {
    pub train: usize,
    pub val: usize,
    pub test: usize,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            train: 60,
            val: 20,
            test: 20,
        }
    }
}

impl ReduceConfig {
    pub fn target_for(&self, split: DatasetSplit) -> usize {
        match split {
            DatasetSplit::Train => self.train,
            DatasetSplit::Val => self.val,
            DatasetSplit::Test => self.test,
        }
    }
}

impl PipelineConfig {
    /// Default location of the config file when none is given on the command line
    pub fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "breed-prep")
            .map(|dirs| dirs.config_dir().join("pipeline.json"))
    }

    /// Load a config file.
    ///
    /// An explicit path must exist. Without one, the default location is used
    /// when present and built-in defaults otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::read(path)?,
            None => match Self::default_config_path() {
                Some(default_path) if default_path.exists() => Self::read(&default_path)?,
                Some(default_path) => {
                    info!("No config file at {:?}. Using defaults.", default_path);
                    Self::default()
                }
                None => {
                    warn!("Could not determine config directory. Using defaults.");
                    Self::default()
                }
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        info!("Loading config from: {:?}", path);
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reject configurations that would make a stage misbehave
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.quota.min_count > self.quota.max_count {
            return Err(ConfigError::Invalid(format!(
                "quota.min_count ({}) is greater than quota.max_count ({})",
                self.quota.min_count, self.quota.max_count
            )));
        }

        if !(0.0..=1.0).contains(&self.quota.confidence_threshold) {
            return Err(ConfigError::Invalid(format!(
                "quota.confidence_threshold must be within [0, 1], got {}",
                self.quota.confidence_threshold
            )));
        }

        if self.split.train_ratio <= 0.0 || self.split.val_ratio <= 0.0 {
            return Err(ConfigError::Invalid(
                "split ratios must be positive".to_string(),
            ));
        }

        if self.split.train_ratio + self.split.val_ratio >= 1.0 {
            return Err(ConfigError::Invalid(format!(
                "split.train_ratio + split.val_ratio must leave room for the test split, got {}",
                self.split.train_ratio + self.split.val_ratio
            )));
        }

        if self.quality.target_width == 0 || self.quality.target_height == 0 {
            return Err(ConfigError::Invalid(
                "quality target size must be non-zero".to_string(),
            ));
        }

        if self.quality.blur_threshold < 0.0 {
            return Err(ConfigError::Invalid(
                "quality.blur_threshold must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_pipeline_constants() {
        let config = PipelineConfig::default();
        assert_eq!(config.quota.min_count, 80);
        assert_eq!(config.quota.max_count, 85);
        assert_eq!(config.quota.confidence_threshold, 0.5);
        assert_eq!(config.quota.flagged_class_id, 0);
        assert_eq!(config.quality.blur_threshold, 100.0);
        assert_eq!(config.quality.target_width, 224);
        assert_eq!(config.reduce.target_for(DatasetSplit::Train), 60);
        assert_eq!(config.reduce.target_for(DatasetSplit::Test), 20);
        assert_eq!(config.seed, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{
                "quota": { "min_count": 10, "max_count": 12 },
                "detector": { "kind": "command", "program": "detect.py", "args": ["--fast"] },
                "seed": 7
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.quota.min_count, 10);
        assert_eq!(config.quota.max_count, 12);
        assert_eq!(config.quota.confidence_threshold, 0.5);
        assert_eq!(config.seed, 7);
        assert_eq!(
            config.detector,
            DetectorConfig::Command {
                program: "detect.py".to_string(),
                args: vec!["--fast".to_string()],
            }
        );
        assert_eq!(config.paths.quarantine_root, PathBuf::from("rejected_images"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = PipelineConfig::load(Some(&dir.path().join("nope.json")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_bad_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            PipelineConfig::load(Some(&path)),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let mut config = PipelineConfig::default();
        config.quota.min_count = 90;
        config.quota.max_count = 85;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_threshold_out_of_range() {
        let mut config = PipelineConfig::default();
        config.quota.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_split_without_test_room() {
        let mut config = PipelineConfig::default();
        config.split.train_ratio = 0.9;
        config.split.val_ratio = 0.1;
        assert!(config.validate().is_err());
    }
}
