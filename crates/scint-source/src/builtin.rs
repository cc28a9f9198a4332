//! Builtin acquirer: default gems shipped inside the Ruby installation
//! itself (`psych`, `bigdecimal`, ...). Neither phase does any work —
//! these specs exist in the resolved graph purely to satisfy dependency
//! edges and never reach the install orchestrator's link/build stages.

use std::path::PathBuf;

use scint_core::ResolvedSpec;

use crate::{Acquirer, Error, ExtractOutcome};

#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinAcquirer;

impl Acquirer for BuiltinAcquirer {
    fn download(&self, _spec: &ResolvedSpec) -> Result<(), Error> {
        Ok(())
    }

    fn extract(&self, _spec: &ResolvedSpec) -> Result<ExtractOutcome, Error> {
        Ok(ExtractOutcome {
            gem_path: PathBuf::new(),
            promoted_to_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_acquisition_is_a_no_op() {
        let spec = scint_core::ResolvedSpec {
            name: "psych".into(),
            version: "5.1.2".into(),
            platform: scint_core::Platform::ruby(),
            dependencies: vec![],
            source: scint_core::ResolvedSource::Builtin,
            has_extensions: false,
            checksum: None,
        };

        BuiltinAcquirer.download(&spec).unwrap();
        let outcome = BuiltinAcquirer.extract(&spec).unwrap();
        assert!(!outcome.promoted_to_cache);
    }
}
