//! Run configuration, layered the way system/user config usually is:
//! environment defaults first, then CLI overrides on top.

use std::path::PathBuf;

/// Resolved run configuration for one `install` invocation.
#[derive(Debug, Clone)]
pub struct Config {
    pub cache_root: PathBuf,
    pub install_prefix: PathBuf,
    pub max_workers: usize,
    pub force: bool,
    pub verbose: bool,
}

impl Config {
    /// Builds defaults from the environment (`BUNDLER_PATH`,
    /// `XDG_CACHE_HOME`), to be overridden by CLI flags afterwards.
    pub fn from_env() -> Self {
        let install_prefix = std::env::var_os("BUNDLER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".bundle"));

        let cache_root = std::env::var_os("XDG_CACHE_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs_home_cache().unwrap_or_else(|| PathBuf::from(".cache"))
            })
            .join("scint");

        Self {
            cache_root,
            install_prefix,
            max_workers: default_max_workers(),
            force: false,
            verbose: false,
        }
    }

    pub fn with_jobs(mut self, jobs: Option<usize>) -> Self {
        if let Some(jobs) = jobs {
            self.max_workers = jobs;
        }
        self
    }

    pub fn with_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.install_prefix = path;
        }
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// `min(cpu_count * 2, 50)`, the default worker count.
fn default_max_workers() -> usize {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
    (cpus * 2).min(50)
}

fn dirs_home_cache() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".cache"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jobs_override_wins_over_default() {
        let cfg = Config::from_env().with_jobs(Some(3));
        assert_eq!(cfg.max_workers, 3);
    }

    #[test]
    fn default_worker_count_is_capped_at_fifty() {
        let cfg = Config::from_env();
        assert!(cfg.max_workers <= 50);
        assert!(cfg.max_workers >= 1);
    }
}
