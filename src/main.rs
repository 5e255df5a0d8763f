use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use tracing::{error, info, info_span, warn};

mod cli;
mod config;
mod core;
mod logging;
mod pipeline;
mod progress;

use crate::cli::{Cli, Command};
use crate::config::PipelineConfig;
use crate::core::detection::{build_detector, FlagRule};
use crate::core::filter::QuotaBounds;
use crate::core::operations::Quarantine;
use crate::pipeline::QuotaOptions;

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(&cli.log_dir) {
        logging::setup_stdout_logging();
        warn!(
            "Failed to set up file logging in {:?}: {}. Logging to stdout only",
            cli.log_dir, e
        );
    }

    let mut config = PipelineConfig::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;

    info!("Random seed: {}", config.seed);
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

    let result = run(&cli, &config, &mut rng);
    if let Err(e) = &result {
        error!("Stage failed: {:#}", e);
    }
    result
}

fn run(cli: &Cli, config: &PipelineConfig, rng: &mut ChaCha8Rng) -> Result<()> {
    let paths = &config.paths;

    match &cli.command {
        Command::Convert { .. } => {
            let _span = info_span!("convert").entered();
            let summary = pipeline::run_convert_stage(&paths.source_root)?;
            info!(
                "Converted {} images, {} already JPEG, {} failed",
                summary.converted.len(),
                summary.skipped.len(),
                summary.failed.len()
            );
            finish(cli, &summary)
        }
        Command::Resize(_) => {
            let _span = info_span!("resize").entered();
            let summary =
                pipeline::run_resize_stage(&paths.source_root, &paths.target_root, &config.quality)?;
            info!(
                "Resized {} images into {:?} ({} failed)",
                summary.total(),
                paths.target_root,
                summary.failed.len()
            );
            finish(cli, &summary)
        }
        Command::Clean(args) => {
            let _span = info_span!("clean").entered();
            let quarantine = Quarantine::new(&paths.quarantine_root);
            let summary = pipeline::run_clean_stage(
                &paths.target_root,
                config.quality.blur_threshold,
                &quarantine,
                args.dry_run,
            )?;
            summary.log();
            finish(cli, &summary)
        }
        Command::Split(_) => {
            let _span = info_span!("split").entered();
            let summary = pipeline::run_split_stage(
                &paths.source_root,
                &paths.target_root,
                &config.split,
                config.seed,
                rng,
            )?;
            info!(
                "Split {} breeds into {:?} ({} copy failures)",
                summary.breeds.len(),
                paths.target_root,
                summary.copy_failures.len()
            );
            finish(cli, &summary)
        }
        Command::Reduce(args) => {
            let _span = info_span!("reduce").entered();
            let quarantine = Quarantine::new(&paths.quarantine_root);
            let summary = pipeline::run_reduce_stage(
                &paths.target_root,
                &config.reduce,
                &config.quality,
                &quarantine,
                args.dry_run,
            )?;
            for report in summary.skipped() {
                warn!(
                    "{}/{}: only {} valid images, {} required. Left unchanged.",
                    report.split.as_str(),
                    report.breed,
                    report.valid,
                    report.required
                );
            }
            finish(cli, &summary)
        }
        Command::Filter(args) => {
            let _span = info_span!("filter").entered();
            let root = args.resolve_root(config);
            let detector = build_detector(&config.detector);
            let options = QuotaOptions {
                bounds: QuotaBounds {
                    min_count: config.quota.min_count,
                    max_count: config.quota.max_count,
                },
                rule: FlagRule {
                    class_id: config.quota.flagged_class_id,
                    confidence_threshold: config.quota.confidence_threshold,
                },
                quarantine: Quarantine::new(&paths.quarantine_root),
                dry_run: args.paths.dry_run,
            };
            let summary = pipeline::run_quota_stage(&root, detector.as_ref(), &options, rng)?;
            summary.log();
            finish(cli, &summary)
        }
        Command::Count { .. } => {
            let report = pipeline::count_images(&paths.target_root)?;
            println!("{}", report);
            finish(cli, &report)
        }
    }
}

fn finish<T: Serialize>(cli: &Cli, summary: &T) -> Result<()> {
    if let Some(path) = &cli.report {
        pipeline::write_report(path, summary)?;
    }
    Ok(())
}
