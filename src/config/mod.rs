mod app_config;

pub use app_config::{DetectorConfig, PipelineConfig, QualityConfig, ReduceConfig, SplitConfig};
