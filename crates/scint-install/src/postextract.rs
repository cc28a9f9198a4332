//! The decision an `extract` job's follow-up makes, as an owned value
//! rather than a closure capturing scheduler state — per DESIGN NOTES on
//! avoiding the "closure capturing `&mut Scheduler`" anti-pattern, the
//! follow-up computes this and then matches on it to decide which jobs
//! to enqueue next.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostExtract {
    /// A native extension must be compiled before the gem is usable;
    /// carries the directory `extconf.rb` lives in.
    NeedsBuild { ext_dir: PathBuf },
    NoBuild,
}

pub fn decide(ext_builder: &scint_extbuild::ExtBuilder, gem_path: &std::path::Path) -> PostExtract {
    match ext_builder.needs_build(gem_path) {
        Some(ext_dir) => PostExtract::NeedsBuild { ext_dir },
        None => PostExtract::NoBuild,
    }
}
