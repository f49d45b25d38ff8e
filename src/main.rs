// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::process::ExitCode;

use clap::Parser;
use pose_annotate::cli::{self, args::Cli};

fn main() -> ExitCode {
    let args = Cli::parse();
    cli::run(&args)
}
