//! Shared vocabulary for the scint install pipeline.
//!
//! Every other crate in the workspace builds on the types defined here:
//! the dependency/source data model, the resolved install plan, and the
//! error taxonomy every crate's local errors fold into at the
//! orchestrator/CLI boundary.

pub use self::config::Config;
pub use self::dependency::{Dependency, Group, Platform, SourceOpts};
pub use self::error::{ErrorKind, ScintError};
pub use self::job::TypeTag;
pub use self::plan::{Action, PlanEntry};
pub use self::source::{FullName, ResolvedSource, Source, SourceKind};
pub use self::spec::ResolvedSpec;

pub mod config;
pub mod dependency;
pub mod error;
pub mod job;
pub mod plan;
pub mod runtime;
pub mod source;
pub mod spec;
