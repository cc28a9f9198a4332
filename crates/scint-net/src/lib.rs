//! The HTTP download pool and compact-index registry client, consumed
//! by the rest of the workspace through these two types.
//!
//! `DownloadPool` holds one shared `reqwest::Client` per process,
//! lazily built, reused across every download in the run for connection
//! pooling. `CompactIndexClient` follows the same refresh pattern,
//! generalized from "fetch one index file" to "fetch one compact-index
//! listing per gem name".

pub mod index;
pub mod pool;

pub use index::{CompactIndexClient, Error as IndexError, SpecListing};
pub use pool::{DownloadPool, Error as PoolError};
