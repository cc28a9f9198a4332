//! `scint add`: a thin manifest-editing front-end, outside the install
//! engine's scope. Stub only.

use clap::Args;

#[derive(Debug, Args)]
pub struct Args {
    /// Name of the gem to add to the manifest.
    name: String,
}

pub fn handle(args: Args) {
    println!("scint add: not yet implemented (would add {:?} to the manifest)", args.name);
}
