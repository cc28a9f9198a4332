//! Native extension builder: given an extracted gem directory that
//! declares a `mkmf`-style extension, drives `ruby extconf.rb`, `make`,
//! and `make install` as subprocesses.
//!
//! Every invocation sets its environment per-call via
//! `std::process::Command::envs`, never by mutating the running
//! process's environment, so per-job toolchain variables thread through
//! to build subprocesses without relying on ambient process state.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;
use thiserror::Error;

/// How many trailing lines of combined stdout/stderr are kept for a
/// failed step's error report. Past this, older output is dropped.
const OUTPUT_TAIL_LINES: usize = 200;

#[derive(Debug, Error)]
pub enum Error {
    #[error("step {step} failed with status {status}:\n{tail}")]
    StepFailed { step: &'static str, status: i32, tail: String },
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// A single entry point, e.g. `ruby`, overridable for testing or for a
/// pinned interpreter path.
#[derive(Debug, Clone)]
pub struct ExtBuilder {
    ruby_bin: PathBuf,
    make_bin: PathBuf,
}

impl Default for ExtBuilder {
    fn default() -> Self {
        Self {
            ruby_bin: PathBuf::from("ruby"),
            make_bin: PathBuf::from("make"),
        }
    }
}

impl ExtBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ruby_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.ruby_bin = path.into();
        self
    }

    pub fn with_make_bin(mut self, path: impl Into<PathBuf>) -> Self {
        self.make_bin = path.into();
        self
    }

    /// Runs `extconf.rb`, `make`, `make install` in `ext_dir`, installing
    /// into `dest_dir`. `env` is applied to every subprocess call; the
    /// running process's own environment is left untouched.
    pub fn build(&self, ext_dir: &Path, dest_dir: &Path, env: &[(String, String)]) -> Result<(), Error> {
        fs_err::create_dir_all(dest_dir)?;

        self.run_step(
            "extconf",
            Command::new(&self.ruby_bin)
                .arg("extconf.rb")
                .arg(format!("--install-dir={}", dest_dir.display()))
                .current_dir(ext_dir)
                .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        )?;

        self.run_step("make", Command::new(&self.make_bin).current_dir(ext_dir).envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str()))))?;

        self.run_step(
            "make install",
            Command::new(&self.make_bin)
                .arg("install")
                .current_dir(ext_dir)
                .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        )?;

        Ok(())
    }

    /// Scans an extracted gem tree for an `ext/**/extconf.rb`, the
    /// `mkmf` convention a native extension's build script lives at.
    /// Returns the directory `build` should be pointed at, if any.
    pub fn needs_build(&self, extracted: &Path) -> Option<PathBuf> {
        let ext_dir = extracted.join("ext");
        if !ext_dir.is_dir() {
            return None;
        }
        find_extconf_under(&ext_dir)
    }

    fn run_step(&self, step: &'static str, command: &mut Command) -> Result<(), Error> {
        debug!("running extension build step {step:?} in {:?}", command.get_current_dir());
        let output = command.output()?;

        if output.status.success() {
            return Ok(());
        }

        let tail = tail_lines(&output.stdout, &output.stderr, OUTPUT_TAIL_LINES);
        Err(Error::StepFailed {
            step,
            status: output.status.code().unwrap_or(-1),
            tail,
        })
    }
}

/// Depth-first, alphabetical search for the first `extconf.rb`, so a gem
/// with several extensions always picks the same one across runs.
fn find_extconf_under(dir: &Path) -> Option<PathBuf> {
    let mut entries: Vec<_> = fs_err::read_dir(dir).ok()?.filter_map(Result::ok).collect();
    entries.sort_by_key(|entry| entry.file_name());

    if entries.iter().any(|entry| entry.file_name() == "extconf.rb") {
        return Some(dir.to_path_buf());
    }
    for entry in &entries {
        let path = entry.path();
        if path.is_dir() {
            if let Some(found) = find_extconf_under(&path) {
                return Some(found);
            }
        }
    }
    None
}

fn tail_lines(stdout: &[u8], stderr: &[u8], limit: usize) -> String {
    let mut lines: VecDeque<String> = VecDeque::with_capacity(limit);
    for chunk in [stdout, stderr] {
        for line in String::from_utf8_lossy(chunk).lines() {
            if lines.len() == limit {
                lines.pop_front();
            }
            lines.push_back(line.to_string());
        }
    }
    lines.into_iter().collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tail_lines_keeps_only_the_last_n() {
        let stdout: Vec<u8> = (0..300).map(|i| format!("line {i}\n")).collect::<String>().into_bytes();
        let tail = tail_lines(&stdout, &[], 10);
        let lines: Vec<_> = tail.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "line 290");
        assert_eq!(lines[9], "line 299");
    }

    #[test]
    fn needs_build_finds_a_nested_extconf() {
        let tmp = tempfile::tempdir().unwrap();
        let ext_dir = tmp.path().join("ext").join("nokogiri");
        fs_err::create_dir_all(&ext_dir).unwrap();
        fs_err::write(ext_dir.join("extconf.rb"), "# stub").unwrap();

        let found = ExtBuilder::new().needs_build(tmp.path());
        assert_eq!(found, Some(ext_dir));
    }

    #[test]
    fn needs_build_is_none_without_an_ext_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert_eq!(ExtBuilder::new().needs_build(tmp.path()), None);
    }

    #[test]
    fn build_surfaces_step_failure_with_captured_output() {
        let tmp = tempfile::tempdir().unwrap();
        let ext_dir = tmp.path().join("ext");
        fs_err::create_dir_all(&ext_dir).unwrap();
        // no extconf.rb present, and no real ruby binary required since we
        // point at a script that always fails fast.
        let builder = ExtBuilder::new().with_ruby_bin("false");
        let dest = tmp.path().join("dest");

        let result = builder.build(&ext_dir, &dest, &[]);
        assert!(result.is_err());
    }
}
