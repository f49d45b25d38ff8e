// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Command implementations.
//!
//! Every command logs through one sink built from the global flags and
//! reports whether everything it attempted succeeded.

use std::process::ExitCode;

use crate::batch::{BatchSummary, extract_batch, render_batch};
use crate::bbox::BoxOverlayProcessor;
use crate::cli::args::{
    BatchExtractArgs, BatchRenderArgs, BoxesArgs, Cli, Commands, ExtractArgs, ParamsArgs,
    RenderArgs,
};
use crate::config::{AnnotateConfig, ProjectConfig, RunMode};
use crate::detections::{DumpEstimator, PoseDump};
use crate::error::{AnnotateError, Result};
use crate::font::load_font;
use crate::io::read_video_params;
use crate::keypoint_csv::KeypointCsvWriter;
use crate::logging::{ConsoleSink, FileSink, LogSink, Tee};
use crate::overlay::{FramePolicy, PairCheck};
use crate::pipeline::{KeypointVideoWriter, RenderReport};
use crate::transfer::{DirectoryStore, ObjectStore};

/// Run the parsed command line.
pub fn run(cli: &Cli) -> ExitCode {
    let console = ConsoleSink::new(cli.verbose);
    let log: Box<dyn LogSink> = match &cli.log_file {
        Some(path) => match FileSink::open(path) {
            Ok(file) => Box::new(Tee::new(console, file)),
            Err(e) => {
                console.error(&format!("Failed to open log file {}: {e}", path.display()));
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(console),
    };
    let log = log.as_ref();

    let outcome = match &cli.command {
        Commands::Extract(args) => extract(args, log),
        Commands::Render(args) => render(args, log),
        Commands::Boxes(args) => boxes(args, log),
        Commands::Params(args) => params(args),
        Commands::BatchExtract(args) => batch_extract(args, log),
        Commands::BatchRender(args) => batch_render(args, log),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            log.error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn extract(args: &ExtractArgs, log: &dyn LogSink) -> Result<bool> {
    let dump = PoseDump::open(&args.dump)?;
    let table = KeypointCsvWriter::new(log).write_keypoints_to_csv(dump, &args.output)?;
    log.success(&format!(
        "Wrote {} keypoints from {} frames to {}",
        table.keypoint_count(),
        table.len(),
        args.output.display()
    ));
    Ok(true)
}

fn render(args: &RenderArgs, log: &dyn LogSink) -> Result<bool> {
    let mut config = AnnotateConfig::new()
        .with_marker_radius(args.marker_radius)
        .with_line_thickness(args.line_thickness);
    if args.strict_pairs {
        config = config.with_pair_check(PairCheck::KeypointIndex);
    }

    let report = if args.detected_only {
        render_with(&KeypointVideoWriter::detected_only(&config, log), args)?
    } else {
        render_with(&KeypointVideoWriter::all_frames(&config, log), args)?
    };
    Ok(report.is_success())
}

fn render_with<P: FramePolicy>(
    writer: &KeypointVideoWriter<'_, P>,
    args: &RenderArgs,
) -> Result<RenderReport> {
    if args.show {
        return preview(writer, args);
    }
    writer.write_video_with_keypoints(&args.video, &args.output, &args.csv)
}

#[cfg(feature = "visualize")]
fn preview<P: FramePolicy>(
    writer: &KeypointVideoWriter<'_, P>,
    args: &RenderArgs,
) -> Result<RenderReport> {
    use crate::visualizer::PreviewSink;

    let title = format!("pose-annotate: {}", args.video.display());
    writer.write_video_through(&args.video, &args.output, &args.csv, |sink| {
        PreviewSink::new(sink, &title)
    })
}

#[cfg(not(feature = "visualize"))]
fn preview<P: FramePolicy>(
    _writer: &KeypointVideoWriter<'_, P>,
    _args: &RenderArgs,
) -> Result<RenderReport> {
    Err(AnnotateError::FeatureNotEnabled(
        "--show requires building with the 'visualize' feature".to_string(),
    ))
}

fn boxes(args: &BoxesArgs, log: &dyn LogSink) -> Result<bool> {
    let config = AnnotateConfig::new().with_box_threshold(args.threshold);
    let font = load_font(&args.font, log);
    let processor = BoxOverlayProcessor::new(&config, font.as_ref(), log);
    let report = processor.process_video(&args.video, &args.boxes, &args.output)?;
    Ok(report.is_success())
}

fn params(args: &ParamsArgs) -> Result<bool> {
    let params = read_video_params(&args.video)?;
    println!(
        "{}: {:.3} fps, {}x{}",
        args.video.display(),
        params.fps,
        params.width,
        params.height
    );
    Ok(true)
}

fn run_mode(mode: Option<&str>) -> RunMode {
    mode.map_or_else(RunMode::from_env, RunMode::from_name)
}

fn report_batch(name: &str, summary: BatchSummary, log: &dyn LogSink) -> bool {
    let message = format!(
        "{name}: {} of {} videos succeeded",
        summary.succeeded,
        summary.total()
    );
    if summary.failed == 0 {
        log.success(&message);
    } else {
        log.warn(&message);
    }
    summary.failed == 0
}

fn batch_extract(args: &BatchExtractArgs, log: &dyn LogSink) -> Result<bool> {
    let project = ProjectConfig::load(&args.config)?;
    let mode = run_mode(args.mode.as_deref());
    let video_root = project.video_folder(mode);
    let csv_root = project.csv_folder();
    log.info(&format!("Run mode {mode:?}, videos from {}", video_root.display()));

    let store = match (mode, &project.storage) {
        (RunMode::Cloud, Some(storage)) => {
            Some((DirectoryStore::new(storage.root.clone(), log), storage))
        }
        (RunMode::Cloud, None) => {
            return Err(AnnotateError::Config(
                "cloud mode requires a [storage] section".to_string(),
            ));
        }
        _ => None,
    };

    if let Some((store, storage)) = &store {
        store.download_prefix(&storage.bucket, &storage.download_prefix, &video_root)?;
    }

    let estimator = DumpEstimator::new(project.detections_folder());
    let summary = extract_batch(
        &estimator,
        &video_root,
        &csv_root,
        &project.class_folders(),
        log,
    )?;

    if let Some((store, storage)) = &store {
        store.upload_dir(&csv_root, &storage.bucket, &storage.upload_prefix)?;
    }
    Ok(report_batch("Keypoint extraction", summary, log))
}

fn batch_render(args: &BatchRenderArgs, log: &dyn LogSink) -> Result<bool> {
    let project = ProjectConfig::load(&args.config)?;
    let video_root = project.video_folder(run_mode(args.mode.as_deref()));
    let config = project.annotate_config();
    let summary = render_batch(
        &video_root,
        &project.csv_folder(),
        &project.class_folders(),
        &config,
        args.auto_labeling,
        log,
    )?;
    Ok(report_batch("Overlay rendering", summary, log))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{Level, MemorySink};

    #[test]
    fn test_run_mode_override() {
        assert_eq!(run_mode(Some("debug")), RunMode::Debug);
        assert_eq!(run_mode(Some("AWS")), RunMode::Cloud);
        assert_eq!(run_mode(Some("anything")), RunMode::Local);
    }

    #[test]
    fn test_report_batch_levels() {
        let log = MemorySink::new();
        assert!(report_batch("x", BatchSummary { succeeded: 2, failed: 0 }, &log));
        assert!(!report_batch("y", BatchSummary { succeeded: 1, failed: 1 }, &log));
        assert!(log.contains(Level::Success, "x: 2 of 2 videos succeeded"));
        assert!(log.contains(Level::Warn, "y: 1 of 2 videos succeeded"));
    }

    #[test]
    fn test_extract_command_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let dump = dir.path().join("clip.jsonl");
        std::fs::write(
            &dump,
            "{\"poses\": [{\"keypoints\": [{\"x\": 3.9, \"y\": 4.2, \"confidence\": 0.25}]}]}\n",
        )
        .unwrap();
        let output = dir.path().join("out").join("clip.csv");

        let log = MemorySink::new();
        let args = ExtractArgs {
            dump,
            output: output.clone(),
        };
        assert!(extract(&args, &log).unwrap());
        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            "Frame,Person,Keypoint,X,Y,Prob\r\n0,0,0,3,4,0.25\r\n"
        );
    }

    #[test]
    fn test_batch_extract_cloud_requires_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("project.toml");
        std::fs::write(
            &config,
            format!(
                "[data]\nroot = \"{}\"\n\n[classes]\nshot = \"shot\"\n",
                dir.path().display()
            ),
        )
        .unwrap();

        let log = MemorySink::new();
        let args = BatchExtractArgs {
            config,
            mode: Some("cloud".to_string()),
        };
        let err = batch_extract(&args, &log).unwrap_err();
        assert!(matches!(err, AnnotateError::Config(_)));
    }
}
