//! The lockfile's text format (an external collaborator: parse/serialize
//! the on-disk representation) plus the in-scope Lockfile Reconciler
//! built on top of it — the reuse decision, the lock→resolved-spec
//! projection, and the writer's source-identity-preservation rules.
//!
//! The reconciler never touches text directly; it only ever sees the
//! typed [`codec::Lockfile`] value, behind the [`LockfileCodec`] trait
//! below. Swapping in a different on-disk format means implementing that
//! trait, not touching `reconcile`.

pub mod codec;
mod gemspec;
mod line;
pub mod provider;
pub mod reconcile;

pub use codec::Lockfile;
pub use provider::ReconcileProvider;
pub use reconcile::{ReuseContext, WriteOutcome};

/// The parse/serialize boundary `reconcile` is built against. The
/// default implementation is [`codec::parse`]/[`codec::serialize`];
/// provided as a trait so an alternate on-disk format could stand in
/// without touching the reconciler.
pub trait LockfileCodec {
    fn parse(&self, text: &str) -> Result<Lockfile, codec::Error>;
    fn serialize(&self, lock: &Lockfile) -> String;
}

/// The textual format described by §6: `GIT`/`PATH`/`GEM` blocks, a
/// `PLATFORMS` list, a `DEPENDENCIES` list, and the optional
/// `CHECKSUMS`/`RUBY VERSION`/`BUNDLED WITH` trailers.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl LockfileCodec for TextCodec {
    fn parse(&self, text: &str) -> Result<Lockfile, codec::Error> {
        codec::parse(text)
    }

    fn serialize(&self, lock: &Lockfile) -> String {
        codec::serialize(lock)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_codec_round_trips_through_the_trait_object() {
        let codec: &dyn LockfileCodec = &TextCodec;
        let lock = Lockfile::default();
        let text = codec.serialize(&lock);
        assert_eq!(codec.parse(&text).unwrap(), lock);
    }
}
