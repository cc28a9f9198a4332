//! `scint cache`: cache maintenance front-ends, outside the install
//! engine's scope. Stub only.

use clap::{Args, Subcommand};

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    subcommand: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Remove everything under the cache root.
    Clean,
}

pub fn handle(args: CacheArgs) {
    match args.subcommand {
        Cmd::Clean => println!("scint cache clean: not yet implemented"),
    }
}
