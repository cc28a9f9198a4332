//! Command-line surface. `install` is the one subcommand this workspace
//! actually implements; `add`/`remove`/`exec`/`cache` are thin,
//! unwired front-ends kept only so the binary presents a complete CLI
//! surface.

mod add;
mod cache;
mod exec;
mod install;
mod remove;

use clap::{Parser, Subcommand};
use thiserror::Error;

#[derive(Debug, Parser)]
#[command(name = "scint", about = "A parallel package installer")]
struct Command {
    #[command(subcommand)]
    subcommand: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// Resolve the manifest and install every dependency into the
    /// project's install prefix.
    Install(install::Args),
    /// Add a gem to the manifest.
    Add(add::Args),
    /// Remove a gem from the manifest.
    Remove(remove::Args),
    /// Run a command with the runtime load path applied.
    Exec(exec::Args),
    /// Cache maintenance.
    Cache(cache::CacheArgs),
}

pub fn process() -> Result<(), Error> {
    let command = Command::parse();

    match command.subcommand {
        Cmd::Install(args) => install::handle(args)?,
        Cmd::Add(args) => add::handle(args),
        Cmd::Remove(args) => remove::handle(args),
        Cmd::Exec(args) => exec::handle(args),
        Cmd::Cache(args) => cache::handle(args),
    }

    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Install(#[from] crate::install_run::Error),
}

impl Error {
    pub fn status_code(&self) -> i32 {
        match self {
            Error::Install(error) => error.status_code(),
        }
    }
}
