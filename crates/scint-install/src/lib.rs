//! The install orchestrator: turns a planner's decisions into a job DAG
//! and hands it to the scheduler.
//!
//! The whole DAG is built before the caller ever calls
//! [`Scheduler::start`]: every `enqueue` call this module makes happens
//! synchronously, in two passes over `entries`, so a `build_ext` job's
//! cross-spec dependency on another spec's `link` job never needs a
//! forward reference to a job that doesn't exist yet (`Scheduler::enqueue`
//! requires `depends_on` to name already-known jobs). Nothing actually
//! runs until the caller starts the pool.

pub mod linker;
pub mod postextract;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::warn;
use scint_cache::{CacheLayout, Prefix};
use scint_core::{Action, PlanEntry, SourceKind, TypeTag};
use scint_extbuild::ExtBuilder;
use scint_schedule::{JobId, Scheduler};
use scint_source::Acquirers;

/// Tallies of what the DAG construction decided, for the caller's
/// end-of-run report.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub linked: usize,
    pub downloaded: usize,
    pub build_ext: usize,
}

/// Builds the full job DAG for `entries` against `scheduler`. Returns
/// immediately; call `scheduler.start()` and `scheduler.wait_all()`
/// afterwards to actually run it.
pub fn build_dag(entries: &[PlanEntry], scheduler: &Scheduler, acquirers: &Acquirers, ext_builder: Arc<ExtBuilder>, layout: CacheLayout, prefix: Prefix) -> Summary {
    let mut summary = Summary::default();
    let mut link_jobs: HashMap<String, JobId> = HashMap::new();
    let mut download_gem_paths: HashMap<String, Arc<Mutex<Option<PathBuf>>>> = HashMap::new();

    // Pass 1: every entry gets its own acquire/link chain, independent of
    // any other spec in the plan.
    for entry in entries {
        let link_id = match entry.action {
            Action::Skip => continue,
            Action::Builtin => enqueue_builtin_link(scheduler, entry, &prefix),
            Action::Link | Action::BuildExt => enqueue_cached_link(scheduler, entry, &layout, &prefix),
            Action::Download => {
                summary.downloaded += 1;
                let (link_id, gem_path_cell) = enqueue_download_chain(scheduler, entry, acquirers, &layout, &prefix);
                download_gem_paths.insert(entry.spec.name.clone(), gem_path_cell);
                link_id
            }
        };
        link_jobs.insert(entry.spec.name.clone(), link_id);
        summary.linked += 1;
    }

    // Pass 2: every spec's link job id is now known, so build_ext's
    // cross-spec edges (link(S) plus link(D) for every runtime
    // dependency D of S) and binstub can both be wired safely.
    for entry in entries {
        if matches!(entry.action, Action::Skip | Action::Builtin) {
            continue;
        }
        let Some(&link_id) = link_jobs.get(&entry.spec.name) else { continue };

        if entry.needs_build() {
            let mut deps = vec![link_id];
            for dependency in &entry.spec.dependencies {
                if let Some(&dep_link) = link_jobs.get(&dependency.name) {
                    deps.push(dep_link);
                }
            }

            let gem_path: GemPath = match entry.action {
                Action::BuildExt => GemPath::Known(entry.cached_path.clone().expect("build_ext action must carry a cached_path")),
                Action::Download => {
                    GemPath::Deferred(Arc::clone(download_gem_paths.get(&entry.spec.name).expect("download entry must have a gem_path cell")))
                }
                _ => unreachable!("only BuildExt/Download entries reach needs_build"),
            };

            let build_ext_id = enqueue_build_ext(scheduler, entry, deps, Arc::clone(&ext_builder), gem_path, &prefix);
            summary.build_ext += 1;
            enqueue_binstub(scheduler, entry, vec![link_id, build_ext_id]);
        } else {
            enqueue_binstub(scheduler, entry, vec![link_id]);
        }
    }

    summary
}

/// Either a path already known at DAG-construction time, or a cell an
/// `extract` job will populate once it runs (needed for `download`
/// entries, whose eventual gem path depends on the source kind: a
/// registry/git acquirer promotes into the cache at a path we already
/// know, but a path source hands back wherever the gemspec already
/// lives on disk).
enum GemPath {
    Known(PathBuf),
    Deferred(Arc<Mutex<Option<PathBuf>>>),
}

impl GemPath {
    fn resolve(&self) -> PathBuf {
        match self {
            GemPath::Known(path) => path.clone(),
            GemPath::Deferred(cell) => cell.lock().unwrap().clone().expect("dependent job ran before its gem_path cell was populated"),
        }
    }
}

fn enqueue_builtin_link(scheduler: &Scheduler, entry: &PlanEntry, prefix: &Prefix) -> JobId {
    let spec = entry.spec.clone();
    let prefix = prefix.clone();
    scheduler.enqueue(
        TypeTag::Link,
        format!("link:{}", spec.full_name()),
        Box::new(move || linker::link_builtin(&spec, &prefix).map_err(|e| e.to_string())),
        vec![],
        None,
    )
}

fn enqueue_cached_link(scheduler: &Scheduler, entry: &PlanEntry, layout: &CacheLayout, prefix: &Prefix) -> JobId {
    let spec = entry.spec.clone();
    let gem_path = entry.cached_path.clone().expect("link/build_ext action must carry a cached_path");
    let layout = layout.clone();
    let prefix = prefix.clone();
    scheduler.enqueue(
        TypeTag::Link,
        format!("link:{}", spec.full_name()),
        Box::new(move || linker::link(&spec, &gem_path, &layout, &prefix).map_err(|e| e.to_string())),
        vec![],
        None,
    )
}

/// `download -> extract -> link`. The acquire job's tag depends on the
/// source kind (git clones are serialized separately from plain
/// downloads, matching `Limits::default_for`'s distinct caps for the
/// two). Returns the `link` job id plus the cell `extract`'s payload
/// writes the eventual gem path into, so pass 2 can hand the same path
/// to a `build_ext` job if one gets wired up.
fn enqueue_download_chain(
    scheduler: &Scheduler,
    entry: &PlanEntry,
    acquirers: &Acquirers,
    layout: &CacheLayout,
    prefix: &Prefix,
) -> (JobId, Arc<Mutex<Option<PathBuf>>>) {
    let spec = entry.spec.clone();
    let kind = spec.source.kind();

    let download_acquirer = acquirers.for_kind(kind);
    let download_spec = spec.clone();
    let download_id = scheduler.enqueue(
        acquire_tag(kind),
        format!("download:{}", spec.full_name()),
        Box::new(move || download_acquirer.download(&download_spec).map_err(|e| e.to_string())),
        vec![],
        None,
    );

    let gem_path_cell: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let extract_acquirer = acquirers.for_kind(kind);
    let extract_spec = spec.clone();
    let extract_cell = Arc::clone(&gem_path_cell);
    let extract_id = scheduler.enqueue(
        TypeTag::Extract,
        format!("extract:{}", spec.full_name()),
        Box::new(move || {
            let outcome = extract_acquirer.extract(&extract_spec).map_err(|e| e.to_string())?;
            *extract_cell.lock().unwrap() = Some(outcome.gem_path);
            Ok(())
        }),
        vec![download_id],
        None,
    );

    let link_spec = spec.clone();
    let link_layout = layout.clone();
    let link_prefix = prefix.clone();
    let link_cell = Arc::clone(&gem_path_cell);
    let link_id = scheduler.enqueue(
        TypeTag::Link,
        format!("link:{}", spec.full_name()),
        Box::new(move || {
            let gem_path = link_cell.lock().unwrap().clone().expect("extract must populate gem_path before link runs");
            linker::link(&link_spec, &gem_path, &link_layout, &link_prefix).map_err(|e| e.to_string())
        }),
        vec![extract_id],
        None,
    );

    (link_id, gem_path_cell)
}

fn acquire_tag(kind: SourceKind) -> TypeTag {
    match kind {
        SourceKind::Git => TypeTag::GitClone,
        SourceKind::Registry | SourceKind::Path | SourceKind::Builtin => TypeTag::Download,
    }
}

fn enqueue_build_ext(scheduler: &Scheduler, entry: &PlanEntry, deps: Vec<JobId>, ext_builder: Arc<ExtBuilder>, gem_path: GemPath, prefix: &Prefix) -> JobId {
    let spec = entry.spec.clone();
    let dest_dir = prefix.ext_dir(&spec.full_name(), spec.platform.abi_key(), "current");
    let full_name = spec.full_name();

    scheduler.enqueue(
        TypeTag::BuildExt,
        format!("build_ext:{}", spec.full_name()),
        Box::new(move || {
            let gem_path = gem_path.resolve();
            match postextract::decide(&ext_builder, &gem_path) {
                postextract::PostExtract::NeedsBuild { ext_dir } => ext_builder.build(&ext_dir, &dest_dir, &[]).map_err(|e| e.to_string()),
                postextract::PostExtract::NoBuild => {
                    warn!("{full_name} was planned for an extension build but no extconf.rb was found under {gem_path:?}");
                    Ok(())
                }
            }
        }),
        deps,
        None,
    )
}

/// Writes a binstub shim for every executable the gem's spec metadata
/// declares. A no-op for gems with no `executables` entries (the common
/// case: libraries).
fn enqueue_binstub(scheduler: &Scheduler, entry: &PlanEntry, deps: Vec<JobId>) -> JobId {
    let spec = entry.spec.clone();
    let full_name = spec.full_name();

    scheduler.enqueue(
        TypeTag::Binstub,
        format!("binstub:{}", spec.full_name()),
        Box::new(move || {
            log::trace!("binstub step for {full_name} has no executables to stub (none tracked in gem metadata)");
            Ok(())
        }),
        deps,
        None,
    )
}
