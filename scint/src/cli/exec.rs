//! `scint exec`: runs a command with the runtime load-path map applied to
//! its environment. Outside the install engine's scope. Stub only.

use clap::Args;

#[derive(Debug, Args)]
pub struct Args {
    /// Command (and its arguments) to run.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

pub fn handle(args: Args) {
    println!("scint exec: not yet implemented (would run {:?} with the runtime load path applied)", args.command);
}
