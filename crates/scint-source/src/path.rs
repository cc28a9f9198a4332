//! Path acquirer: a local directory used as-is. Never touches the cache —
//! the tree already lives where the manifest pointed, and the gem content
//! is expected to change between runs (that's the point of a path source).

use scint_core::{ResolvedSource, ResolvedSpec};

use crate::{locate_gemspec_dir, Acquirer, Error, ExtractOutcome};

#[derive(Debug, Default, Clone, Copy)]
pub struct PathAcquirer;

impl Acquirer for PathAcquirer {
    fn download(&self, _spec: &ResolvedSpec) -> Result<(), Error> {
        Ok(())
    }

    fn extract(&self, spec: &ResolvedSpec) -> Result<ExtractOutcome, Error> {
        let root = match &spec.source {
            ResolvedSource::Path { path } => path,
            _ => return Err(Error::WrongSourceKind { expected: "path" }),
        };

        let gem_path = locate_gemspec_dir(root, &spec.name, None)?;

        Ok(ExtractOutcome {
            gem_path,
            promoted_to_cache: false,
        })
    }
}
