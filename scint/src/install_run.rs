//! Ties every in-scope component together into one `install` invocation:
//! manifest -> enqueue index-fetches + git-clones -> barrier ->
//! lockfile-current check -> project-lock or full resolve -> meta-gem
//! adjustment + dedupe -> planner diff -> DAG -> await all -> write
//! lockfile + runtime map.
//!
//! The same [`Scheduler`] instance is used for both the prefetch barrier
//! and the install DAG: `wait_for` only blocks on jobs of one type, so the
//! barrier phase and the DAG-construction phase can share one pool without
//! the DAG's `link`/`build_ext` jobs racing ahead of the barrier.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use log::{info, warn};
use thiserror::Error;
use url::Url;

use scint_cache::{CacheLayout, Prefix, Promoter};
use scint_core::dependency::{Group, Platform, SourceOpts};
use scint_core::job::TypeTag;
use scint_core::source::Source;
use scint_core::{Config, ErrorKind, ResolvedSpec};
use scint_extbuild::ExtBuilder;
use scint_lockfile::codec::Lockfile;
use scint_lockfile::provider::ReconcileProvider;
use scint_lockfile::reconcile::{self, ReuseContext};
use scint_lockfile::{LockfileCodec, TextCodec};
use scint_manifest::Manifest;
use scint_net::DownloadPool;
use scint_schedule::{ProgressSink, Scheduler};
use scint_source::Acquirers;
use scint_vcs::{GitRepo, RepoLocks};

/// Names that always resolve to `Action::Builtin` rather than a network
/// fetch: the tool's own self-install case, handled by [`adjust_meta_gems`].
const BUILTIN_NAMES: &[&str] = &["bundler"];

#[derive(Debug, Error)]
pub enum Error {
    #[error("reading {0:?}")]
    ManifestIo(PathBuf, #[source] std::io::Error),
    #[error("parsing the manifest")]
    ManifestParse(#[from] scint_manifest::Error),
    #[error("parsing the lockfile")]
    LockfileParse(#[from] scint_lockfile::codec::Error),
    #[error("resolving dependencies")]
    Resolve(#[from] scint_resolve::Error),
    #[error("writing the runtime manifest")]
    RuntimeConfig(#[from] scint_runtime_config::Error),
    #[error("io")]
    Io(#[from] std::io::Error),
    #[error("{0} job(s) failed during install")]
    InstallFailed(usize),
}

impl Error {
    /// The process exit status: typed `4..12` for everything that
    /// short-circuits before a job ever runs, `1` for a failure discovered
    /// mid-install.
    pub fn status_code(&self) -> i32 {
        match self {
            Error::ManifestIo(..) => ErrorKind::ManifestParse.status_code(),
            Error::ManifestParse(_) => ErrorKind::ManifestParse.status_code(),
            Error::LockfileParse(_) => ErrorKind::LockfileParse.status_code(),
            Error::Resolve(_) => ErrorKind::Resolve.status_code(),
            Error::RuntimeConfig(_) => ErrorKind::Cache.status_code(),
            Error::Io(_) => ErrorKind::Cache.status_code(),
            Error::InstallFailed(_) => 1,
        }
    }
}

/// Flags the `install` CLI subcommand accepts, layered over [`Config`]'s
/// environment defaults.
#[derive(Debug, Clone, Default)]
pub struct Options {
    pub jobs: Option<usize>,
    pub path: Option<PathBuf>,
    pub force: bool,
    pub verbose: bool,
    pub manifest_path: Option<PathBuf>,
}

pub fn run(options: Options) -> Result<(), Error> {
    let config = Config::from_env()
        .with_jobs(options.jobs)
        .with_path(options.path)
        .with_force(options.force)
        .with_verbose(options.verbose);

    let manifest_path = options.manifest_path.unwrap_or_else(|| PathBuf::from("Gemfile"));
    let manifest_text = fs_err::read_to_string(&manifest_path).map_err(|e| Error::ManifestIo(manifest_path.clone(), e))?;
    let manifest = scint_manifest::parse(&manifest_text)?;

    let ruby_version = manifest.ruby_version.clone().unwrap_or_else(|| "3.3.0".to_string());
    let local_platform = detect_local_platform();

    let layout = CacheLayout::new(&config.cache_root);
    let prefix = Prefix::new(&config.install_prefix, &ruby_version);
    let promoter = Promoter::new(&config.cache_root);
    let pool = DownloadPool::new();
    let repo_locks = RepoLocks::default();
    let acquirers = Acquirers::new(layout.clone(), promoter, pool.clone(), repo_locks.clone());
    let ext_builder = Arc::new(ExtBuilder::new());

    let lockfile_path = prefix.lockfile_path();
    let prior_lock = if lockfile_path.is_file() {
        let text = fs_err::read_to_string(&lockfile_path)?;
        Some(TextCodec.parse(&text)?)
    } else {
        None
    };

    let max_workers = config.max_workers;
    let progress: Option<Arc<dyn ProgressSink>> = if config.verbose {
        None
    } else {
        Some(Arc::new(scint_progress::TerminalProgress::new(0)))
    };
    let scheduler = Scheduler::new(max_workers, None, true, progress);
    scheduler.start();

    prefetch_barrier(&scheduler, &manifest, &layout, &repo_locks, &pool);

    let resolved = reconcile_or_resolve(&manifest, prior_lock.as_ref(), &layout, &local_platform, &pool)?;
    let resolved = adjust_meta_gems(resolved);

    if config.force {
        purge_resolved(&resolved, &layout, &prefix);
    }

    let plan = scint_plan::plan(&resolved, &prefix, &layout, BUILTIN_NAMES);
    info!("planned {} spec(s)", plan.len());

    let summary = scint_install::build_dag(&plan, &scheduler, &acquirers, Arc::clone(&ext_builder), layout.clone(), prefix.clone());
    info!(
        "dag built: {} linked, {} downloaded, {} extension build(s)",
        summary.linked, summary.downloaded, summary.build_ext
    );

    scheduler.wait_all();
    let stats = scheduler.stats();
    let errors = scheduler.errors();
    scheduler.shutdown();

    if !errors.is_empty() {
        scint_progress::report_failures(&errors);
        return Err(Error::InstallFailed(errors.len()));
    }
    if stats.failed > 0 {
        return Err(Error::InstallFailed(stats.failed));
    }

    let outcome = reconcile::write(&resolved, &manifest, prior_lock.as_ref());
    fs_err::write(&lockfile_path, TextCodec.serialize(&outcome.lock))?;

    let runtime_manifest = scint_runtime_config::build(&resolved, &prefix);
    scint_runtime_config::write(&runtime_manifest, &prefix.runtime_manifest_path())?;

    info!("installed {} gem(s)", resolved.len());
    Ok(())
}

/// Enqueues the prefetch phase's `fetch_index`/`git_clone` jobs and
/// blocks until both lanes have drained, ahead of the lockfile-reuse
/// decision. Best-effort: a failed prefetch doesn't fail the run, it just
/// means the reconciler/resolver hits the network again later on that
/// name.
fn prefetch_barrier(scheduler: &Scheduler, manifest: &Manifest, layout: &CacheLayout, repo_locks: &RepoLocks, pool: &DownloadPool) {
    let mut names_by_registry: std::collections::HashMap<Url, Vec<String>> = std::collections::HashMap::new();
    let mut seen_repos: HashSet<Url> = HashSet::new();

    for dep in &manifest.dependencies {
        match &dep.source_opts {
            SourceOpts::Registry(remote) => {
                names_by_registry.entry(remote.clone()).or_default().push(dep.name.clone());
            }
            SourceOpts::Default => {
                if let Some(remote) = manifest.default_remote() {
                    names_by_registry.entry(remote.clone()).or_default().push(dep.name.clone());
                }
            }
            SourceOpts::Git { uri, .. } => {
                if seen_repos.insert(uri.clone()) {
                    enqueue_git_clone(scheduler, uri.clone(), layout.clone(), repo_locks.clone());
                }
            }
            SourceOpts::Path(_) => {}
        }
    }

    for (remote, names) in names_by_registry {
        enqueue_fetch_index(scheduler, remote, names, pool.clone());
    }

    scheduler.wait_for(TypeTag::FetchIndex);
    scheduler.wait_for(TypeTag::GitClone);
}

/// Warms the compact-index lookup for every name sourced from `remote`
/// ahead of resolution, so `ReconcileProvider`'s own lazy lookups mostly
/// hit an already-primed connection. Per-name failures are logged and
/// swallowed: the resolver will simply re-query (and fail loudly there)
/// if a name genuinely can't be found.
fn enqueue_fetch_index(scheduler: &Scheduler, remote: Url, names: Vec<String>, pool: DownloadPool) {
    scheduler.enqueue(
        TypeTag::FetchIndex,
        format!("fetch_index:{remote}"),
        Box::new(move || {
            let client = scint_net::CompactIndexClient::new(remote.clone(), pool);
            for name in &names {
                if let Err(err) = scint_core::runtime::block_on(client.listings(name)) {
                    warn!("prefetching index listing for {name:?} from {remote} failed: {err}");
                }
            }
            Ok(())
        }),
        vec![],
        None,
    );
}

fn enqueue_git_clone(scheduler: &Scheduler, uri: Url, layout: CacheLayout, repo_locks: RepoLocks) {
    scheduler.enqueue(
        TypeTag::GitClone,
        format!("git_clone:{uri}"),
        Box::new(move || {
            let bare_path = layout.git_path(&uri);
            let _guard = repo_locks.lock_for(&bare_path);
            let repo = GitRepo::new(bare_path);
            repo.ensure_cloned(&uri).map_err(|e| e.to_string())
        }),
        vec![],
        None,
    );
}

/// Runs the lockfile reuse decision and either projects the existing
/// lock or falls back to a full resolve.
fn reconcile_or_resolve(manifest: &Manifest, prior_lock: Option<&Lockfile>, layout: &CacheLayout, local_platform: &Platform, pool: &DownloadPool) -> Result<Vec<ResolvedSpec>, Error> {
    if let Some(lock) = prior_lock {
        let ctx = ReuseContext { cache: layout };
        if reconcile::is_reusable(lock, manifest, local_platform, &ctx) {
            info!("lockfile is current, skipping resolve");
            let mut projected = reconcile::project(lock, local_platform);
            reconcile::upgrade_platforms(&mut projected, local_platform, pool);
            return Ok(projected);
        }
    }

    info!("resolving dependencies");
    let provider = build_provider(manifest, layout, pool);
    let default_source = manifest
        .default_remote()
        .map(|remote| Source::Registry { remotes: vec![remote.clone()] })
        .unwrap_or_else(|| Source::Registry { remotes: vec![] });

    Ok(scint_resolve::resolve(&manifest.dependencies, &default_source, local_platform, &provider)?)
}

fn build_provider(manifest: &Manifest, layout: &CacheLayout, pool: &DownloadPool) -> ReconcileProvider {
    let mut provider = ReconcileProvider::new();

    for source in &manifest.sources {
        provider.add_registry(source.remote.clone(), pool.clone());
    }

    for dep in &manifest.dependencies {
        match &dep.source_opts {
            SourceOpts::Registry(remote) => provider.add_registry(remote.clone(), pool.clone()),
            SourceOpts::Path(path) => {
                if let Ok(dir) = scint_source::locate_gemspec_dir(path, &dep.name, None) {
                    let gemspec_path = dir.join(format!("{}.gemspec", dep.name));
                    let source = scint_core::ResolvedSource::Path { path: path.clone() };
                    if let Err(err) = provider.add_local_gemspec(&gemspec_path, source) {
                        warn!("reading gemspec for path dependency {:?}: {err}", dep.name);
                    }
                }
            }
            SourceOpts::Git { uri, branch, tag, git_ref, glob, .. } => {
                if let Err(err) = register_git_gemspec(&mut provider, layout, uri, git_ref.as_deref().or(branch.as_deref()).or(tag.as_deref()), glob.as_deref(), &dep.name) {
                    warn!("reading gemspec for git dependency {:?} ({uri}): {err}", dep.name);
                }
            }
            SourceOpts::Default => {}
        }
    }

    provider
}

/// Materializes a git dependency's gemspec without executing it, so the
/// resolver can see its name/version/deps ahead of a full acquisition
/// without executing the gemspec body if avoidable.
fn register_git_gemspec(provider: &mut ReconcileProvider, layout: &CacheLayout, uri: &Url, revision_spec: Option<&str>, glob: Option<&str>, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bare_path = layout.git_path(uri);
    let repo = GitRepo::new(bare_path);
    repo.ensure_cloned(uri)?;
    let commit = repo.resolve_commit(revision_spec.unwrap_or("HEAD"))?;

    let tmp = tempfile::tempdir()?;
    repo.materialize(&commit, &tmp.path().join("checkout"), false)?;
    let checkout = tmp.path().join("checkout");

    let dir = scint_source::locate_gemspec_dir(&checkout, name, glob)?;
    let gemspec_path = dir.join(format!("{name}.gemspec"));
    let source = scint_core::ResolvedSource::Git { uri: uri.clone(), revision: commit };
    provider.add_local_gemspec(&gemspec_path, source)?;
    Ok(())
}

/// Injects the tool's own synthetic self-spec for every builtin name the
/// manifest doesn't already pin, then re-dedupes by `(name, version,
/// platform)` invariant.
///
/// If the resolver already produced an entry with the same name (e.g. a
/// manifest pins an explicit `bundler` version), that resolver-produced
/// entry wins; the synthetic spec is only added when the name is
/// otherwise absent. See DESIGN.md for why.
fn adjust_meta_gems(mut resolved: Vec<ResolvedSpec>) -> Vec<ResolvedSpec> {
    for &name in BUILTIN_NAMES {
        if resolved.iter().any(|s| s.name == name) {
            continue;
        }
        resolved.push(ResolvedSpec {
            name: name.to_string(),
            version: scint_buildinfo_version(),
            platform: Platform::ruby(),
            dependencies: vec![],
            source: scint_core::ResolvedSource::Builtin,
            has_extensions: false,
            checksum: None,
        });
    }

    let mut seen = HashSet::new();
    resolved.retain(|spec| seen.insert((spec.name.clone(), spec.version.clone(), spec.platform.clone())));
    resolved.sort_by(|a, b| a.name.cmp(&b.name));
    resolved
}

fn scint_buildinfo_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// `--force`: removes every on-disk artifact for `resolved` before any
/// install job runs, plus the prefix's shared `bin/` and runtime-lock
/// file. Forces the planner to see nothing installed or cached for any
/// of these specs, so every entry becomes a fresh `download`/`build_ext`.
fn purge_resolved(resolved: &[ResolvedSpec], layout: &CacheLayout, prefix: &Prefix) {
    for spec in resolved {
        let full_name = spec.full_name();
        let _ = fs_err::remove_file(layout.inbound_path(spec));
        let _ = fs_err::remove_dir_all(layout.assembling_path(spec));
        let _ = fs_err::remove_dir_all(layout.cached_path(spec));
        let _ = fs_err::remove_file(layout.cached_spec_path(spec));
        let _ = fs_err::remove_file(layout.cached_manifest_path(spec));
        let _ = fs_err::remove_dir_all(layout.ext_marker_path(spec));
        let _ = fs_err::remove_dir_all(prefix.gem_dir(&full_name));
        let _ = fs_err::remove_file(prefix.gemspec_path(&full_name));
        let _ = fs_err::remove_dir_all(prefix.ext_marker_dir(&full_name, spec.platform.abi_key()));
    }
    let _ = fs_err::remove_dir_all(prefix.bin_dir());
    let _ = fs_err::remove_file(prefix.runtime_manifest_path());
}

/// Normalizes `std::env::consts::{ARCH, OS}` into the gem-style platform
/// triple token the cache/prefix layout partitions by.
fn detect_local_platform() -> Platform {
    Platform::new(format!("{}-{}", std::env::consts::ARCH, std::env::consts::OS))
}
