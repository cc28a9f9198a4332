//! `scint install`: the CLI surface for the install dispatch.

use std::path::PathBuf;

use clap::Args;

use crate::install_run::{self, Options};

#[derive(Debug, Args)]
pub struct Args {
    /// Number of parallel workers to use (default: `min(cpus * 2, 50)`).
    #[arg(short = 'j', long = "jobs")]
    jobs: Option<usize>,

    /// Install prefix (env fallback: `BUNDLER_PATH`, then `.bundle`).
    #[arg(long = "path")]
    path: Option<PathBuf>,

    /// Purge all cache and prefix artifacts for the resolved set before
    /// installing.
    #[arg(short = 'f', long = "force")]
    force: bool,

    /// Print verbose progress instead of the terminal progress bars.
    #[arg(long = "verbose")]
    verbose: bool,

    /// Manifest path (defaults to `./Gemfile`).
    #[arg(long = "gemfile")]
    gemfile: Option<PathBuf>,
}

pub fn handle(args: Args) -> Result<(), install_run::Error> {
    install_run::run(Options {
        jobs: args.jobs,
        path: args.path,
        force: args.force,
        verbose: args.verbose,
        manifest_path: args.gemfile,
    })
}
