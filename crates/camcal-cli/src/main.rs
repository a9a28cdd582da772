use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use camcal_pipeline::{
    calibrate, config::load_config, gather_observations, run_pose_pipeline, sweep,
    write_pose_csv, CalibrationConfig, CalibrationFile, GatheredObservations, PatternConfig,
    PrecomputedDetections, SweepConfig, SweepOutcome,
};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

/// Chessboard camera calibration and pose estimation.
#[derive(Debug, Parser)]
#[command(author, version, about = "Pinhole calibration from planar chessboard views")]
struct Cli {
    /// Log solver internals (same as RUST_LOG=debug).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calibrate on every usable image and write the calibration file.
    Calibrate {
        #[command(flatten)]
        input: CalibrationInput,
        /// Calibration file to write.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print fx, fy, cx, cy and RMS error per batch size as JSON.
    Sweep {
        #[command(flatten)]
        input: CalibrationInput,
        /// Write the series here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Estimate the pattern pose in every image with a stored calibration.
    Pose {
        /// Calibration file written by `camcal calibrate`.
        #[arg(long)]
        calibration: PathBuf,
        /// JSON file of detector output per image.
        #[arg(long)]
        detections: PathBuf,
        /// JSON calibration config (only the solver section is used).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Write the pose table here instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
struct CalibrationInput {
    /// JSON file of detector output per image.
    #[arg(long)]
    detections: PathBuf,
    /// JSON pattern config; defaults to a 9x6 chessboard with unit squares.
    #[arg(long)]
    pattern: Option<PathBuf>,
    /// JSON calibration config.
    #[arg(long)]
    config: Option<PathBuf>,
    /// JSON sweep config (read by `sweep` only).
    #[arg(long)]
    sweep: Option<PathBuf>,
}

struct LoadedInput {
    pattern: PatternConfig,
    calibration: CalibrationConfig,
    detections: PrecomputedDetections,
    gathered: GatheredObservations,
}

fn load_detections(path: &Path) -> Result<PrecomputedDetections> {
    PrecomputedDetections::from_path(path)
        .with_context(|| format!("reading detections {}", path.display()))
}

fn load_input(input: &CalibrationInput) -> Result<LoadedInput> {
    let pattern: PatternConfig = load_config(input.pattern.as_deref())?;
    let calibration: CalibrationConfig = load_config(input.config.as_deref())?;
    let detections = load_detections(&input.detections)?;

    let geometry = pattern.geometry().context("pattern config")?;
    let gathered = gather_observations(&detections.ids(), &detections, &detections, &geometry);
    Ok(LoadedInput {
        pattern,
        calibration,
        detections,
        gathered,
    })
}

fn run_sweep(input: &CalibrationInput) -> Result<SweepOutcome> {
    let loaded = load_input(input)?;
    let sweep_cfg: SweepConfig = load_config(input.sweep.as_deref())?;
    let outcome = sweep(
        &loaded.gathered.observations,
        loaded.detections.image_size(),
        &sweep_cfg,
        &loaded.calibration,
    )?;
    for r in &outcome.records {
        if let Err(e) = &r.result {
            warn!("batch {} failed: {e}", r.batch_size);
        }
    }
    Ok(outcome)
}

fn write_or_print(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            println!("{text}");
            Ok(())
        }
    }
}

fn calibrate_cmd(input: &CalibrationInput, output: &Path) -> Result<()> {
    let loaded = load_input(input)?;
    let views: Vec<_> = loaded
        .gathered
        .observations
        .iter()
        .filter_map(|o| o.correspondence.clone())
        .collect();
    let result = calibrate(
        &views,
        loaded.detections.image_size(),
        &loaded.calibration,
    )
    .with_context(|| {
        format!(
            "calibrating on {} of {} images",
            views.len(),
            loaded.gathered.observations.len()
        )
    })?;

    info!(
        "fx {:.3} fy {:.3} cx {:.3} cy {:.3} rms {:.4} px over {} views",
        result.intrinsics.fx,
        result.intrinsics.fy,
        result.intrinsics.cx,
        result.intrinsics.cy,
        result.rms,
        result.extrinsics.len()
    );
    if !result.dropped_views.is_empty() {
        warn!("degenerate views dropped: {:?}", result.dropped_views);
    }
    CalibrationFile::from_result(&result, &loaded.pattern)
        .save(output)
        .with_context(|| format!("writing calibration {}", output.display()))
}

fn sweep_cmd(input: &CalibrationInput, output: Option<&Path>) -> Result<()> {
    let outcome = run_sweep(input)?;
    let json = serde_json::to_string_pretty(&outcome.series())?;
    write_or_print(output, &json)
}

fn pose_cmd(
    calibration: &Path,
    detections: &Path,
    config: Option<&Path>,
    output: Option<&Path>,
) -> Result<()> {
    let file = CalibrationFile::load(calibration)?;
    let camera = file.camera()?;
    let pattern = file.pattern()?;
    let cfg: CalibrationConfig = load_config(config)?;
    let detections = load_detections(detections)?;

    let gathered = gather_observations(&detections.ids(), &detections, &detections, &pattern);
    let outcome = run_pose_pipeline(
        &gathered.observations,
        &camera,
        &cfg.solver.solve_options(),
    );
    info!(
        "solved {} poses, skipped {} images",
        outcome.poses.len(),
        gathered.skipped.len() + outcome.skipped.len()
    );

    let mut buf = Vec::new();
    write_pose_csv(&mut buf, &outcome.records())?;
    write_or_print(output, String::from_utf8(buf)?.trim_end())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Err(err) = try_main(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn try_main(cli: Cli) -> Result<()> {
    match &cli.command {
        Command::Calibrate { input, output } => calibrate_cmd(input, output),
        Command::Sweep { input, output } => sweep_cmd(input, output.as_deref()),
        Command::Pose {
            calibration,
            detections,
            config,
            output,
        } => pose_cmd(
            calibration,
            detections,
            config.as_deref(),
            output.as_deref(),
        ),
    }
}
