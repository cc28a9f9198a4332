use scint_core::TypeTag;

/// Identifies one enqueued unit of work. Stable for the lifetime of the
/// [`crate::Scheduler`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub(crate) u64);

/// Where a job sits in its lifecycle.
///
/// `Queued` and `Ready` are both pre-run: `Queued` means at least one
/// dependency hasn't finished yet, `Ready` means every dependency finished
/// successfully and the job is only waiting for a free slot in its type's
/// concurrency cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Ready,
    Running,
    Done,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Done | JobState::Failed | JobState::Cancelled)
    }
}

/// The unit of work itself. Runs on a worker thread with no access to the
/// scheduler; side effects (writing to disk, making a request) happen here,
/// and the `Result` is all the scheduler learns about the outcome.
pub type Payload = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// Runs synchronously on the worker immediately after a job's payload
/// succeeds, before that worker picks up its next job. Takes a handle it can
/// use to enqueue further work (e.g. deciding at `extract`-time whether a
/// `build_ext` job is needed) rather than capturing scheduler state directly.
pub type FollowUp = Box<dyn FnOnce(&crate::Scheduler) + Send>;

/// One recorded failure, surfaced by [`crate::Scheduler::errors`].
/// Jobs cancelled as a consequence of a failure elsewhere are not reported
/// here even though they count toward [`crate::Stats::failed`].
#[derive(Debug, Clone)]
pub struct JobError {
    pub id: JobId,
    pub name: String,
    pub type_tag: TypeTag,
    pub error: String,
}

/// A state transition, handed to an optional [`ProgressSink`] as it happens.
#[derive(Debug, Clone)]
pub struct JobEvent {
    pub id: JobId,
    pub name: String,
    pub type_tag: TypeTag,
    pub state: JobState,
}

/// Observes job transitions as they happen. Implemented by the progress UI;
/// the scheduler itself has no opinion on how (or whether) this is rendered.
pub trait ProgressSink: Send + Sync {
    fn on_transition(&self, event: &JobEvent);
}
