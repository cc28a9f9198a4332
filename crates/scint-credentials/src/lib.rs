//! File-backed registry credential store.
//!
//! Out of scope for the core install engine (just another external
//! collaborator, alongside the resolver and the archive reader), but an
//! install run still needs somewhere to read a registry bearer token from,
//! so this is the minimal real thing rather than a trait stub: one
//! JSON file under the user's config dir, keyed by registry host, created
//! with owner-only permissions.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io")]
    Io(#[from] std::io::Error),
    #[error("parsing {path}")]
    Parse { path: PathBuf, source: serde_json::Error },
    #[error("{0} has no host to key credentials on")]
    NoHost(Url),
}

/// `host -> bearer token`, loaded from and flushed back to a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Tokens(BTreeMap<String, String>);

pub struct CredentialStore {
    path: PathBuf,
    tokens: Tokens,
}

impl CredentialStore {
    /// Loads the store at `path`, treating a missing file as empty (the
    /// common case: most installs never configure a private registry).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let tokens = match fs_err::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| Error::Parse { path: path.clone(), source })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Tokens::default(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self { path, tokens })
    }

    /// Looks up the token for a remote's host, if one is configured.
    pub fn token_for(&self, remote: &Url) -> Option<&str> {
        let host = remote.host_str()?;
        self.tokens.0.get(host).map(String::as_str)
    }

    /// Sets (or replaces) the token for a remote's host and flushes to
    /// disk immediately, so a `scint login` style command can't lose a
    /// just-entered token to a later crash.
    pub fn set_token(&mut self, remote: &Url, token: impl Into<String>) -> Result<(), Error> {
        let host = remote.host_str().ok_or_else(|| Error::NoHost(remote.clone()))?.to_string();
        self.tokens.0.insert(host, token.into());
        self.flush()
    }

    pub fn remove_token(&mut self, remote: &Url) -> Result<(), Error> {
        if let Some(host) = remote.host_str() {
            self.tokens.0.remove(host);
        }
        self.flush()
    }

    fn flush(&self) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(&self.tokens).map_err(|source| Error::Parse { path: self.path.clone(), source })?;
        fs_err::write(&self.path, json)?;
        restrict_permissions(&self.path)?;
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs_err::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        s.parse().unwrap()
    }

    #[test]
    fn loading_a_missing_file_is_empty_not_an_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = CredentialStore::load(tmp.path().join("credentials.json")).unwrap();
        assert!(store.token_for(&url("https://gems.example.com/")).is_none());
    }

    #[test]
    fn set_then_load_round_trips_and_restricts_permissions() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("credentials.json");

        let mut store = CredentialStore::load(&path).unwrap();
        store.set_token(&url("https://gems.example.com/"), "s3cr3t").unwrap();

        let reloaded = CredentialStore::load(&path).unwrap();
        assert_eq!(reloaded.token_for(&url("https://gems.example.com/path")), Some("s3cr3t"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs_err::metadata(&path).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn different_hosts_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::load(tmp.path().join("credentials.json")).unwrap();
        store.set_token(&url("https://a.example.com/"), "token-a").unwrap();
        store.set_token(&url("https://b.example.com/"), "token-b").unwrap();

        assert_eq!(store.token_for(&url("https://a.example.com/")), Some("token-a"));
        assert_eq!(store.token_for(&url("https://b.example.com/")), Some("token-b"));
    }

    #[test]
    fn remove_token_clears_it() {
        let tmp = tempfile::tempdir().unwrap();
        let mut store = CredentialStore::load(tmp.path().join("credentials.json")).unwrap();
        let remote = url("https://gems.example.com/");
        store.set_token(&remote, "s3cr3t").unwrap();
        store.remove_token(&remote).unwrap();
        assert!(store.token_for(&remote).is_none());
    }
}
