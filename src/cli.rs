use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DetectorConfig, PipelineConfig};

#[derive(Parser, Debug)]
#[command(name = "breed-prep")]
#[command(about = "Prepare a dog breed image dataset for classifier training")]
pub struct Cli {
    /// JSON pipeline configuration (defaults to the user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Directory for the run's log file
    #[arg(long, global = true, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Write the stage summary as JSON to this file
    #[arg(long, global = true)]
    pub report: Option<PathBuf>,

    /// Seed for every random choice
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Re-encode non-JPEG images as JPEG, in place [source root]
    Convert {
        #[arg(long)]
        root: Option<PathBuf>,
    },
    /// Resize every image into a mirrored tree [source root -> target root]
    Resize(TransferArgs),
    /// Quarantine blurry and duplicate images [target root]
    Clean(InPlaceArgs),
    /// Partition breed folders into train/val/test [source root -> target root]
    Split(TransferArgs),
    /// Keep exactly N clear images per breed and split [target root]
    Reduce(InPlaceArgs),
    /// Enforce the per-breed image quota, removing flagged images first
    /// [target root/train]
    Filter(FilterArgs),
    /// Count images per split and breed [target root]
    Count {
        #[arg(long)]
        root: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    #[arg(long)]
    pub source: Option<PathBuf>,
    #[arg(long)]
    pub target: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct InPlaceArgs {
    #[arg(long)]
    pub root: Option<PathBuf>,
    #[arg(long)]
    pub quarantine: Option<PathBuf>,
    /// Report what would be removed without moving anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct FilterArgs {
    #[command(flatten)]
    pub paths: InPlaceArgs,
    #[arg(long = "min")]
    pub min_count: Option<usize>,
    #[arg(long = "max")]
    pub max_count: Option<usize>,
    #[arg(long = "confidence")]
    pub confidence_threshold: Option<f32>,
    /// Read detections from YOLO prediction files under this folder
    #[arg(long, conflicts_with = "detector_cmd")]
    pub labels: Option<PathBuf>,
    /// Run this program once per image to get detections
    #[arg(long)]
    pub detector_cmd: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into the loaded configuration
    pub fn apply_overrides(&self, config: &mut PipelineConfig) {
        if let Some(seed) = self.seed {
            config.seed = seed;
        }

        match &self.command {
            Command::Convert { root } => {
                if let Some(root) = root {
                    config.paths.source_root = root.clone();
                }
            }
            Command::Resize(args) | Command::Split(args) => {
                if let Some(source) = &args.source {
                    config.paths.source_root = source.clone();
                }
                if let Some(target) = &args.target {
                    config.paths.target_root = target.clone();
                }
            }
            Command::Clean(args) | Command::Reduce(args) => args.apply(config),
            Command::Filter(args) => {
                if let Some(quarantine) = &args.paths.quarantine {
                    config.paths.quarantine_root = quarantine.clone();
                }
                if let Some(min_count) = args.min_count {
                    config.quota.min_count = min_count;
                }
                if let Some(max_count) = args.max_count {
                    config.quota.max_count = max_count;
                }
                if let Some(threshold) = args.confidence_threshold {
                    config.quota.confidence_threshold = threshold;
                }
                if let Some(labels_root) = &args.labels {
                    config.detector = DetectorConfig::Labels {
                        labels_root: labels_root.clone(),
                    };
                }
                if let Some(program) = &args.detector_cmd {
                    config.detector = DetectorConfig::Command {
                        program: program.clone(),
                        args: Vec::new(),
                    };
                }
            }
            Command::Count { root } => {
                if let Some(root) = root {
                    config.paths.target_root = root.clone();
                }
            }
        }
    }
}

impl FilterArgs {
    /// Breed folders to filter: `--root` as given, else the configured split
    /// under the target root
    pub fn resolve_root(&self, config: &PipelineConfig) -> PathBuf {
        self.paths
            .root
            .clone()
            .unwrap_or_else(|| config.paths.target_root.join(config.quota.split.as_str()))
    }
}

impl InPlaceArgs {
    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(root) = &self.root {
            config.paths.target_root = root.clone();
        }
        if let Some(quarantine) = &self.quarantine {
            config.paths.quarantine_root = quarantine.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_overrides() {
        let cli = Cli::parse_from([
            "breed-prep",
            "--seed",
            "9",
            "filter",
            "--root",
            "data/train",
            "--min",
            "10",
            "--max",
            "12",
            "--labels",
            "preds",
            "--dry-run",
        ]);
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.seed, 9);
        assert_eq!(config.quota.min_count, 10);
        assert_eq!(config.quota.max_count, 12);
        assert_eq!(config.paths.target_root, PathBuf::from("processed_dataset"));
        assert_eq!(
            config.detector,
            DetectorConfig::Labels {
                labels_root: PathBuf::from("preds")
            }
        );
        match cli.command {
            Command::Filter(args) => {
                assert!(args.paths.dry_run);
                assert_eq!(args.resolve_root(&config), PathBuf::from("data/train"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_split_overrides_roots() {
        let cli = Cli::parse_from(["breed-prep", "split", "--source", "raw", "--target", "out"]);
        let mut config = PipelineConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.paths.source_root, PathBuf::from("raw"));
        assert_eq!(config.paths.target_root, PathBuf::from("out"));
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn test_filter_root_defaults_to_train_split() {
        let cli = Cli::parse_from(["breed-prep", "filter"]);
        let config = PipelineConfig::default();
        match cli.command {
            Command::Filter(args) => assert_eq!(
                args.resolve_root(&config),
                PathBuf::from("processed_dataset/train")
            ),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_labels_and_command_conflict() {
        let result = Cli::try_parse_from([
            "breed-prep",
            "filter",
            "--labels",
            "preds",
            "--detector-cmd",
            "detect.py",
        ]);
        assert!(result.is_err());
    }
}
