use std::path::PathBuf;

use crate::spec::ResolvedSpec;

/// The action the planner decided for one resolved spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Already installed at the expected location; nothing to do.
    Skip,
    /// Cache already holds a usable tree; materialize it into the prefix.
    Link,
    /// Cached tree exists but its native extension hasn't been compiled.
    BuildExt,
    /// Nothing usable cached; must download (or git-acquire) first.
    Download,
    /// The self-install/meta-gem case.
    Builtin,
}

/// One planner decision, preserving the input order of the resolved set
/// (whatever the planner decided needs to happen before this gem is usable).
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub spec: ResolvedSpec,
    pub action: Action,
    pub cached_path: Option<PathBuf>,
    pub gem_path: Option<PathBuf>,
}

impl PlanEntry {
    pub fn new(spec: ResolvedSpec, action: Action) -> Self {
        Self {
            spec,
            action,
            cached_path: None,
            gem_path: None,
        }
    }

    pub fn needs_acquisition(&self) -> bool {
        matches!(self.action, Action::Download)
    }

    pub fn needs_build(&self) -> bool {
        matches!(self.action, Action::BuildExt) || (matches!(self.action, Action::Download) && self.spec.has_extensions)
    }
}
