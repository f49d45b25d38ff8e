// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::font::DEFAULT_FONT;

/// CLI arguments parser.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = r#"Examples:
    pose-annotate extract --dump detections/clip.jsonl --output csv/clip.csv
    pose-annotate render --video clip.mp4 --csv csv/clip.csv --output clip_pose.avi
    pose-annotate render -v clip.mp4 -c csv/clip.csv -o review.avi --detected-only
    pose-annotate boxes --video clip.mp4 --boxes clip_boxes.txt --output clip_boxes.avi
    pose-annotate params clip.mp4
    AUTOLABELING_MODE=DEBUG pose-annotate batch-extract --config project.toml
    pose-annotate batch-render --config project.toml --auto-labeling --log-file logs/render.log"#)]
pub struct Cli {
    #[command(subcommand)]
    /// Subcommand to execute.
    pub command: Commands,

    /// Show verbose output
    #[arg(long, global = true, default_value_t = true, action = clap::ArgAction::Set)]
    pub verbose: bool,

    /// Also append log records to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

/// Commands for the CLI.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write the keypoints of a pose dump to a CSV file
    Extract(ExtractArgs),
    /// Draw skeleton overlays from a keypoint CSV onto a video
    Render(RenderArgs),
    /// Draw scored bounding boxes from a box file onto a video
    Boxes(BoxesArgs),
    /// Print frame rate and dimensions of a video
    Params(ParamsArgs),
    /// Extract keypoint CSVs for every video of every class
    BatchExtract(BatchExtractArgs),
    /// Render overlay videos for every keypoint CSV of every class
    BatchRender(BatchRenderArgs),
}

/// Arguments for the extract command.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Pose dump (JSON lines, one object per frame)
    #[arg(short, long)]
    pub dump: PathBuf,

    /// Output CSV path
    #[arg(short, long)]
    pub output: PathBuf,
}

/// Arguments for the render command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct RenderArgs {
    /// Source video
    #[arg(short, long)]
    pub video: PathBuf,

    /// Keypoint CSV
    #[arg(short, long)]
    pub csv: PathBuf,

    /// Output video (motion-JPEG, `.avi` container recommended)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only write frames that have detections
    #[arg(long, default_value_t = false)]
    pub detected_only: bool,

    /// Look up skeleton endpoints by keypoint index instead of position
    #[arg(long, default_value_t = false)]
    pub strict_pairs: bool,

    /// Keypoint marker radius
    #[arg(long, default_value_t = 3)]
    pub marker_radius: i32,

    /// Skeleton line thickness
    #[arg(long, default_value_t = 2)]
    pub line_thickness: u32,

    /// Display rendered frames in a window
    #[arg(long, default_value_t = false)]
    pub show: bool,
}

/// Arguments for the boxes command.
#[derive(Args, Debug)]
pub struct BoxesArgs {
    /// Source video
    #[arg(short, long)]
    pub video: PathBuf,

    /// Bounding box file (`Frame n` blocks)
    #[arg(short, long)]
    pub boxes: PathBuf,

    /// Output video (motion-JPEG)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Boxes must score strictly above this to be drawn
    #[arg(long, default_value_t = 0.5)]
    pub threshold: f32,

    /// Font used for score labels
    #[arg(long, default_value = DEFAULT_FONT)]
    pub font: String,
}

/// Arguments for the params command.
#[derive(Args, Debug)]
pub struct ParamsArgs {
    /// Video to inspect
    pub video: PathBuf,
}

/// Arguments for the batch-extract command.
#[derive(Args, Debug)]
pub struct BatchExtractArgs {
    /// Project configuration (TOML)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Run mode (local, cloud, debug); defaults to AUTOLABELING_MODE
    #[arg(long)]
    pub mode: Option<String>,
}

/// Arguments for the batch-render command.
#[derive(Args, Debug)]
pub struct BatchRenderArgs {
    /// Project configuration (TOML)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Run mode (local, cloud, debug); defaults to AUTOLABELING_MODE
    #[arg(long)]
    pub mode: Option<String>,

    /// Only keep frames with detections (review clips)
    #[arg(long, default_value_t = false)]
    pub auto_labeling: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_render_args_defaults() {
        let args = Cli::parse_from([
            "app", "render", "--video", "a.mp4", "--csv", "a.csv", "--output", "a.avi",
        ]);
        assert!(args.verbose);
        assert!(args.log_file.is_none());
        match args.command {
            Commands::Render(render) => {
                assert_eq!(render.video, PathBuf::from("a.mp4"));
                assert_eq!(render.marker_radius, 3);
                assert_eq!(render.line_thickness, 2);
                assert!(!render.detected_only);
                assert!(!render.strict_pairs);
                assert!(!render.show);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_boxes_args_custom() {
        let args = Cli::parse_from([
            "app",
            "boxes",
            "-v",
            "clip.mp4",
            "-b",
            "boxes.txt",
            "-o",
            "out.avi",
            "--threshold",
            "0.7",
            "--verbose",
            "false",
            "--log-file",
            "logs/boxes.log",
        ]);
        assert!(!args.verbose);
        assert_eq!(args.log_file, Some(PathBuf::from("logs/boxes.log")));
        match args.command {
            Commands::Boxes(boxes) => {
                assert!((boxes.threshold - 0.7).abs() < f32::EPSILON);
                assert_eq!(boxes.font, DEFAULT_FONT);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_batch_render_flags() {
        let args = Cli::parse_from([
            "app",
            "batch-render",
            "--config",
            "project.toml",
            "--auto-labeling",
            "--mode",
            "debug",
        ]);
        match args.command {
            Commands::BatchRender(batch) => {
                assert!(batch.auto_labeling);
                assert_eq!(batch.mode.as_deref(), Some("debug"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
