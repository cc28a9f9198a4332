//! The archive reader: turns a `.gem`-style tarball into an extracted tree
//! + metadata, consumed by the registry acquirer's `extract` phase
//! through the [`GemArchive`] trait.
//!
//! A reader type validates a header, then yields typed payloads. A
//! real `.gem` is itself an outer tar containing a `metadata` entry and a
//! gzipped `data.tar.gz` entry; we follow that shape, using `tar` +
//! `flate2` (DESIGN.md notes the `tar` addition).

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use fs_err::File;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub const METADATA_ENTRY: &str = "metadata.json";
pub const DATA_ENTRY: &str = "data.tar.gz";

/// The subset of gemspec fields the install pipeline actually needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GemMetadata {
    pub name: String,
    pub version: String,
    pub require_paths: Vec<String>,
    pub has_extensions: bool,
    pub extension_entry: Option<String>,
}

impl GemMetadata {
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        fs_err::write(path, json)
    }

    pub fn read_from(path: &Path) -> std::io::Result<Self> {
        let bytes = fs_err::read(path)?;
        serde_json::from_slice(&bytes).map_err(std::io::Error::other)
    }
}

/// A manifest of the extracted file tree: relative path -> content hash.
/// Written as the cache's `.manifest` sidecar and used to detect a
/// stale-cached extraction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentManifest {
    pub entries: BTreeMap<String, String>,
}

impl ContentManifest {
    pub fn from_tree(root: &Path) -> std::io::Result<Self> {
        let mut entries = BTreeMap::new();
        collect_entries(root, root, &mut entries)?;
        Ok(Self { entries })
    }

    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(self).map_err(std::io::Error::other)?;
        fs_err::write(path, json)
    }

    pub fn read_from(path: &Path) -> std::io::Result<Self> {
        let bytes = fs_err::read(path)?;
        serde_json::from_slice(&bytes).map_err(std::io::Error::other)
    }

    pub fn is_consistent_with(&self, root: &Path) -> bool {
        self.entries.keys().all(|relative| root.join(relative).exists())
    }
}

fn collect_entries(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) -> std::io::Result<()> {
    for entry in fs_err::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_entries(root, &path, out)?;
        } else {
            let relative = path.strip_prefix(root).unwrap().to_string_lossy().into_owned();
            let mut hasher = Sha256::new();
            let mut file = File::open(&path)?;
            let mut buf = Vec::new();
            file.read_to_end(&mut buf)?;
            hasher.update(&buf);
            out.insert(relative, hex::encode(hasher.finalize()));
        }
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("archive is missing the {0} entry")]
    MissingEntry(&'static str),
    #[error("malformed metadata: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("io")]
    Io(#[from] std::io::Error),
}

/// What a successful extraction produced, ready to be promoted into the
/// cache.
pub struct Extracted {
    pub metadata: GemMetadata,
    pub manifest: ContentManifest,
}

/// Extracts a `.gem`-style archive into `dest` (which must not yet exist;
/// the acquirer is responsible for creating it under `assembling/`).
pub trait GemArchive {
    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<Extracted, Error>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TarGzArchive;

impl GemArchive for TarGzArchive {
    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<Extracted, Error> {
        fs_err::create_dir_all(dest)?;

        let mut outer = tar::Archive::new(File::open(archive_path)?);
        let mut metadata: Option<GemMetadata> = None;
        let mut data_entry_path: Option<PathBuf> = None;

        for entry in outer.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.to_path_buf();
            match path.to_str() {
                Some(METADATA_ENTRY) => {
                    let mut buf = String::new();
                    entry.read_to_string(&mut buf)?;
                    metadata = Some(serde_json::from_str(&buf)?);
                }
                Some(DATA_ENTRY) => {
                    let out_path = dest.join(".data.tar.gz");
                    let mut out = fs_err::File::create(&out_path)?;
                    std::io::copy(&mut entry, &mut out)?;
                    data_entry_path = Some(out_path);
                }
                _ => {}
            }
        }

        let metadata = metadata.ok_or(Error::MissingEntry(METADATA_ENTRY))?;
        let data_path = data_entry_path.ok_or(Error::MissingEntry(DATA_ENTRY))?;

        let data_file = File::open(&data_path)?;
        let mut inner = tar::Archive::new(GzDecoder::new(data_file));
        inner.unpack(dest)?;
        fs_err::remove_file(&data_path)?;

        let manifest = ContentManifest::from_tree(dest)?;

        Ok(Extracted { metadata, manifest })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn build_gem(path: &Path, metadata: &GemMetadata, files: &[(&str, &[u8])]) {
        let mut data_tar_gz = Vec::new();
        {
            let encoder = GzEncoder::new(&mut data_tar_gz, Compression::default());
            let mut builder = tar::Builder::new(encoder);
            for (name, content) in files {
                let mut header = tar::Header::new_gnu();
                header.set_size(content.len() as u64);
                header.set_cksum();
                builder.append_data(&mut header, name, *content).unwrap();
            }
            builder.into_inner().unwrap().finish().unwrap();
        }

        let metadata_json = serde_json::to_vec(metadata).unwrap();

        let outer = File::create(path).unwrap();
        let mut builder = tar::Builder::new(outer);

        let mut header = tar::Header::new_gnu();
        header.set_size(metadata_json.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, METADATA_ENTRY, &metadata_json[..]).unwrap();

        let mut header = tar::Header::new_gnu();
        header.set_size(data_tar_gz.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, DATA_ENTRY, &data_tar_gz[..]).unwrap();

        builder.into_inner().unwrap().flush().unwrap();
    }

    #[test]
    fn extracts_metadata_and_files() {
        let tmp = tempfile::tempdir().unwrap();
        let gem_path = tmp.path().join("rack-2.2.8.gem");
        let meta = GemMetadata {
            name: "rack".into(),
            version: "2.2.8".into(),
            require_paths: vec!["lib".into()],
            has_extensions: false,
            extension_entry: None,
        };
        build_gem(&gem_path, &meta, &[("lib/rack.rb", b"module Rack; end")]);

        let dest = tmp.path().join("extracted");
        let extracted = TarGzArchive.extract(&gem_path, &dest).unwrap();

        assert_eq!(extracted.metadata, meta);
        assert!(dest.join("lib/rack.rb").exists());
        assert!(extracted.manifest.entries.contains_key("lib/rack.rb"));
    }

    #[test]
    fn manifest_consistency_detects_missing_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();
        fs_err::create_dir_all(root.join("lib")).unwrap();
        fs_err::write(root.join("lib/a.rb"), b"a").unwrap();

        let manifest = ContentManifest::from_tree(root).unwrap();
        assert!(manifest.is_consistent_with(root));

        fs_err::remove_file(root.join("lib/a.rb")).unwrap();
        assert!(!manifest.is_consistent_with(root));
    }
}
