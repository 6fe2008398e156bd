use std::process::ExitCode;

use clap::Parser;
use postercraft::{cli, logger};

fn main() -> ExitCode {
    let args = cli::CliArgs::parse();
    logger::init(args.verbose);
    postercraft::log_info!("PosterCraft {} starting", env!("CARGO_PKG_VERSION"));
    cli::run(args)
}
