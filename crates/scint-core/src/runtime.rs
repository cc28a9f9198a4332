//! A process-wide tokio runtime, initialized once and shared by every
//! worker thread. The scheduler is an OS-thread pool whose
//! worker payloads run synchronously; this lets a payload that needs
//! network I/O (the registry/index acquirers) call into the async
//! `scint-net` stack without each worker spinning up its own runtime.

use std::future::Future;
use std::sync::{OnceLock, RwLock};

use tokio::runtime::{self, Handle};

static RUNTIME: OnceLock<RwLock<Option<Runtime>>> = OnceLock::new();

/// One-time initialization of the shared tokio runtime.
pub fn init() -> Guard {
    let lock = RUNTIME.get_or_init(Default::default);
    *lock.write().unwrap() = Some(Runtime::new().expect("build runtime"));
    Guard
}

fn destroy() {
    let rt = RUNTIME.get().unwrap().write().unwrap().take().expect("runtime initialized");
    drop(rt);
}

#[must_use = "runtime is dropped with guard"]
pub struct Guard;

impl Drop for Guard {
    fn drop(&mut self) {
        destroy()
    }
}

struct Runtime(runtime::Runtime);

impl Runtime {
    fn new() -> std::io::Result<Self> {
        Ok(Self(runtime::Builder::new_multi_thread().enable_all().build()?))
    }
}

/// Blocks the calling (scheduler worker) thread on `task`. Safe to call
/// from any scheduler worker thread, including concurrently from several.
pub fn block_on<T, F>(task: F) -> T
where
    F: Future<Output = T>,
{
    let guard = RUNTIME.get().expect("runtime not initialized").read().unwrap();
    let rt = guard.as_ref().expect("runtime initialized");
    rt.0.block_on(task)
}

/// Runs a blocking closure on the runtime's blocking thread pool, for use
/// from async contexts that need to shell out to blocking filesystem or
/// subprocess work.
pub async fn unblock<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    let handle = Handle::current();
    handle.spawn_blocking(f).await.expect("spawn blocking")
}
