//! Registry acquirer: downloads a `.gem` tarball over HTTP and unpacks it
//! through the cache's assemble-then-promote protocol.

use scint_archive::{GemArchive, TarGzArchive};
use scint_cache::{CacheLayout, Promoter};
use scint_core::{ResolvedSource, ResolvedSpec};
use scint_net::DownloadPool;

use crate::{Acquirer, Error, ExtractOutcome};

pub struct RegistryAcquirer {
    layout: CacheLayout,
    promoter: Promoter,
    pool: DownloadPool,
    archive: TarGzArchive,
}

impl RegistryAcquirer {
    pub fn new(layout: CacheLayout, promoter: Promoter, pool: DownloadPool) -> Self {
        Self {
            layout,
            promoter,
            pool,
            archive: TarGzArchive,
        }
    }

    fn remote_of(spec: &ResolvedSpec) -> Result<&url::Url, Error> {
        match &spec.source {
            ResolvedSource::Registry { remote } => Ok(remote),
            _ => Err(Error::WrongSourceKind { expected: "registry" }),
        }
    }

    /// A `cached/<k>/` directory existing is not sufficient on its own: a
    /// require_path like `lib/concurrent-ruby` can be left stale by a
    /// prior partial write. When a `.manifest` sidecar is present, every
    /// file it recorded must still exist; a missing sidecar is tolerated
    /// (invariant 3: readers tolerate missing siblings) and treated as
    /// consistent.
    fn cached_tree_is_consistent(&self, spec: &ResolvedSpec, cached: &std::path::Path) -> bool {
        match scint_archive::ContentManifest::read_from(&self.layout.cached_manifest_path(spec)) {
            Ok(manifest) => manifest.is_consistent_with(cached),
            Err(_) => true,
        }
    }
}

impl Acquirer for RegistryAcquirer {
    fn download(&self, spec: &ResolvedSpec) -> Result<(), Error> {
        let inbound = self.layout.inbound_path(spec);
        if inbound.is_file() {
            return Ok(());
        }

        let remote = Self::remote_of(spec)?;
        let url = remote
            .join(&format!("gems/{}.gem", spec.full_name()))
            .map_err(|_| Error::InvalidDownloadUrl)?;

        let bytes = scint_core::runtime::block_on(self.pool.bytes(url))?;

        if let Some(parent) = inbound.parent() {
            fs_err::create_dir_all(parent)?;
        }
        let tmp = inbound.with_extension("gem.tmp");
        fs_err::write(&tmp, &bytes)?;
        fs_err::rename(&tmp, &inbound)?;

        Ok(())
    }

    fn extract(&self, spec: &ResolvedSpec) -> Result<ExtractOutcome, Error> {
        let cached = self.layout.cached_path(spec);
        if cached.is_dir() {
            if self.cached_tree_is_consistent(spec, &cached) {
                return Ok(ExtractOutcome {
                    gem_path: cached,
                    promoted_to_cache: false,
                });
            }
            log::warn!("cached tree for {} is missing files its manifest records, refreshing from the inbound archive", spec.full_name());
            fs_err::remove_dir_all(&cached)?;
            let _ = fs_err::remove_file(self.layout.cached_spec_path(spec));
            let _ = fs_err::remove_file(self.layout.cached_manifest_path(spec));
        }

        let inbound = self.layout.inbound_path(spec);
        let staging = self.layout.assembling_tmp_path(spec);
        if let Some(parent) = staging.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let extracted = self.archive.extract(&inbound, &staging)?;

        let lock_key = spec.full_name().to_string();
        let outcome = self.promoter.promote(&staging, &cached, &lock_key)?;

        if outcome == scint_cache::PromoteOutcome::Promoted {
            extracted.metadata.write_to(&self.layout.cached_spec_path(spec))?;
            extracted.manifest.write_to(&self.layout.cached_manifest_path(spec))?;
        }

        Ok(ExtractOutcome {
            gem_path: cached,
            promoted_to_cache: outcome == scint_cache::PromoteOutcome::Promoted,
        })
    }
}
