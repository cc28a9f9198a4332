//! `scint remove`: a thin manifest-editing front-end, outside the install
//! engine's scope. Stub only.

use clap::Args;

#[derive(Debug, Args)]
pub struct Args {
    /// Name of the gem to remove from the manifest.
    name: String,
}

pub fn handle(args: Args) {
    println!("scint remove: not yet implemented (would remove {:?} from the manifest)", args.name);
}
