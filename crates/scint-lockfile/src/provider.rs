//! Builds a [`scint_resolve::Provider`] for a full re-resolve: one
//! [`CompactIndexClient`] per registry remote the manifest declares, plus
//! whatever git/path gems were read directly off disk (their gemspecs,
//! via [`crate::gemspec`]) bypassing the registry entirely for those
//! names. Sync-to-async bridging goes through
//! [`scint_core::runtime::block_on`], the same mechanism every other
//! scheduler-worker payload in the workspace uses to call into
//! `scint-net`.

use std::collections::HashMap;
use std::path::Path;

use scint_core::dependency::Platform;
use scint_core::source::ResolvedSource;
use scint_net::{CompactIndexClient, DownloadPool};
use scint_resolve::{Candidate, Provider, ProviderError, Version};
use url::Url;

use crate::gemspec;

#[derive(Default)]
pub struct ReconcileProvider {
    indexes: Vec<CompactIndexClient>,
    inline: HashMap<String, Vec<Candidate>>,
}

impl ReconcileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a registry remote to fan out listing lookups across.
    pub fn add_registry(&mut self, remote: Url, pool: DownloadPool) {
        self.indexes.push(CompactIndexClient::new(remote, pool));
    }

    /// Reads `gemspec_path` (without executing it) and, if it names a
    /// gem, registers it as an inline candidate sourced from `source` —
    /// used for git/path dependencies, which never go through a registry
    /// index.
    pub fn add_local_gemspec(&mut self, gemspec_path: &Path, source: ResolvedSource) -> std::io::Result<()> {
        let fields = gemspec::read(gemspec_path)?;
        let Some(name) = fields.name else { return Ok(()) };
        let version = fields.version.unwrap_or_else(|| "0".to_string());

        self.inline.entry(name).or_default().push(Candidate {
            version: Version::parse(&version),
            platform: Platform::ruby(),
            dependencies: fields.dependencies,
            source,
            has_extensions: fields.has_extensions,
            checksum: None,
        });
        Ok(())
    }
}

impl Provider for ReconcileProvider {
    fn candidates(&self, name: &str) -> Result<Vec<Candidate>, ProviderError> {
        if let Some(candidates) = self.inline.get(name) {
            return Ok(candidates.clone());
        }

        let mut found = Vec::new();
        for index in &self.indexes {
            let listings = match scint_core::runtime::block_on(index.listings(name)) {
                Ok(listings) => listings,
                Err(err) => {
                    log::debug!("compact index lookup for {name:?} against {} failed: {err}", index.remote());
                    continue;
                }
            };
            found.extend(listings.into_iter().map(|listing| Candidate {
                version: Version::parse(&listing.version),
                platform: Platform::new(listing.platform),
                dependencies: listing.dependencies,
                source: ResolvedSource::Registry { remote: index.remote().clone() },
                has_extensions: false,
                checksum: Some(listing.checksum),
            }));
        }

        if found.is_empty() {
            return Err(ProviderError::NoListing(name.to_string()));
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn reads_a_local_gemspec_as_an_inline_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.gemspec");
        let mut file = fs_err::File::create(&path).unwrap();
        writeln!(file, "Gem::Specification.new do |s|").unwrap();
        writeln!(file, "  s.name = \"demo\"").unwrap();
        writeln!(file, "  s.version = \"1.0.0\"").unwrap();
        writeln!(file, "end").unwrap();

        let mut provider = ReconcileProvider::new();
        provider.add_local_gemspec(&path, ResolvedSource::Path { path: dir.path().to_path_buf() }).unwrap();

        let candidates = provider.candidates("demo").unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].version.to_string(), "1.0.0");
    }

    #[test]
    fn gemspec_without_a_name_assignment_is_silently_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.gemspec");
        fs_err::write(&path, "# empty\n").unwrap();

        let mut provider = ReconcileProvider::new();
        provider.add_local_gemspec(&path, ResolvedSource::Path { path: dir.path().to_path_buf() }).unwrap();

        assert!(provider.candidates("demo").is_err());
    }
}
