//! The shared error taxonomy. Every crate keeps its own `thiserror` enum,
//! matching the per-module `Error` style used throughout the workspace,
//! and implements `From` into this one so the orchestrator and CLI have
//! a single reportable shape with a stable exit status (`4..12`).

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ManifestParse,
    LockfileParse,
    Resolve,
    Network,
    Install,
    ExtensionBuild,
    Permission,
    Platform,
    Cache,
}

impl ErrorKind {
    /// The typed exit status propagated to the process exit code (`4..12`).
    pub fn status_code(self) -> i32 {
        match self {
            ErrorKind::ManifestParse => 4,
            ErrorKind::LockfileParse => 5,
            ErrorKind::Resolve => 6,
            ErrorKind::Network => 7,
            ErrorKind::Install => 8,
            ErrorKind::ExtensionBuild => 9,
            ErrorKind::Permission => 10,
            ErrorKind::Platform => 11,
            ErrorKind::Cache => 12,
        }
    }
}

/// A network failure, optionally carrying the captured response so it can
/// be surfaced verbatim in the failure summary.
#[derive(Debug, Clone, Default)]
pub struct NetworkContext {
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct ScintError {
    pub kind: ErrorKind,
    pub message: String,
    pub network: Option<NetworkContext>,
}

impl ScintError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            network: None,
        }
    }

    pub fn network(message: impl Into<String>, context: NetworkContext) -> Self {
        Self {
            kind: ErrorKind::Network,
            message: message.into(),
            network: Some(context),
        }
    }

    pub fn status_code(&self) -> i32 {
        self.kind.status_code()
    }
}
