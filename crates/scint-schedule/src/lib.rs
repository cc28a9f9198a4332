//! A typed-lane OS-thread-pool scheduler: a bounded pool of worker threads,
//! one FIFO ready queue per [`TypeTag`], and a concurrency cap per lane.
//!
//! Deliberately built on `std::thread` plus `Mutex`/`Condvar` rather than an
//! async executor. The jobs run here are blocking by nature (HTTP fetches,
//! `git` subprocesses, filesystem renames, `make`), so a worker just blocks
//! on its payload and the scheduler hands it the next ready job when it's
//! free, the way a traditional thread pool does.
//!
//! A job becomes `Ready` once every dependency listed in its `depends_on` is
//! `Done`; it only actually runs once its type's concurrency cap has a free
//! slot. If a dependency fails, every transitive dependant is marked
//! `Cancelled` instead of ever running, and `fail_fast` additionally cancels
//! every other pending job in the run.

mod job;

pub use job::{JobError, JobEvent, JobId, JobState, ProgressSink};
use job::{FollowUp, Payload};

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;

use scint_core::TypeTag;

/// Per-[`TypeTag`] concurrency caps.
#[derive(Debug, Clone)]
pub struct Limits(HashMap<TypeTag, usize>);

impl Limits {
    pub fn get(&self, tag: TypeTag) -> usize {
        self.0.get(&tag).copied().unwrap_or(1).max(1)
    }

    pub fn set(&mut self, tag: TypeTag, cap: usize) {
        self.0.insert(tag, cap.max(1));
    }

    /// The default policy: reserve a couple of worker slots for
    /// native-extension compiles, give the remainder to network and
    /// filesystem work (network capped at 8 regardless of pool size), and
    /// serialize git clones, build and binstub steps to small fixed caps.
    pub fn default_for(max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        let compile_slots = max_workers.min(2).max(1);
        let network_cap = max_workers.saturating_sub(compile_slots + 1).clamp(1, 8);
        let extract_link_cap = max_workers.saturating_sub(compile_slots + 1).max(1);
        let git_clone_cap = max_workers.min(4).max(1);

        let mut caps = HashMap::new();
        caps.insert(TypeTag::FetchIndex, network_cap);
        caps.insert(TypeTag::Download, network_cap);
        caps.insert(TypeTag::Extract, extract_link_cap);
        caps.insert(TypeTag::Link, extract_link_cap);
        caps.insert(TypeTag::GitClone, git_clone_cap);
        caps.insert(TypeTag::BuildExt, compile_slots);
        caps.insert(TypeTag::Binstub, 1);
        caps.insert(TypeTag::Resolve, 1);
        Self(caps)
    }
}

/// A point-in-time snapshot of the run, for progress reporting.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stats {
    pub workers: usize,
    pub queued: usize,
    pub running: usize,
    pub done: usize,
    pub failed: usize,
}

struct JobRecord {
    type_tag: TypeTag,
    name: String,
    payload: Option<Payload>,
    follow_up: Option<FollowUp>,
    depends_on: Vec<JobId>,
    dependants: Vec<JobId>,
    state: JobState,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, JobRecord>,
    ready: HashMap<TypeTag, VecDeque<JobId>>,
    in_flight: HashMap<TypeTag, usize>,
    errors: Vec<JobError>,
    running: usize,
    /// Jobs whose payload finished but whose follow-up is still executing
    /// on a worker. Kept separate from `running` so a follow-up that hasn't
    /// enqueued its own work yet still counts as outstanding for
    /// [`Scheduler::wait_all`].
    pending_follow_ups: usize,
}

impl State {
    fn is_idle(&self) -> bool {
        self.running == 0 && self.pending_follow_ups == 0 && self.ready.values().all(|q| q.is_empty())
    }
}

struct Inner {
    limits: Limits,
    fail_fast: bool,
    progress: Option<Arc<dyn ProgressSink>>,
    max_workers: usize,
    next_id: AtomicU64,
    current_workers: AtomicUsize,
    shutdown: AtomicBool,
    state: Mutex<State>,
    cv: Condvar,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

/// A cheap handle to the pool; clones share the same underlying state, so a
/// [`FollowUp`] can hold one to enqueue further jobs without borrowing the
/// scheduler that's running it.
#[derive(Clone)]
pub struct Scheduler(Arc<Inner>);

impl Scheduler {
    pub fn new(max_workers: usize, limits: Option<Limits>, fail_fast: bool, progress: Option<Arc<dyn ProgressSink>>) -> Self {
        let max_workers = max_workers.max(1);
        let limits = limits.unwrap_or_else(|| Limits::default_for(max_workers));
        Self(Arc::new(Inner {
            limits,
            fail_fast,
            progress,
            max_workers,
            next_id: AtomicU64::new(0),
            current_workers: AtomicUsize::new(0),
            shutdown: AtomicBool::new(false),
            state: Mutex::new(State::default()),
            cv: Condvar::new(),
            workers: Mutex::new(Vec::new()),
        }))
    }

    /// Launches the initial worker threads. Starts with a small pool
    /// (`max_workers` capped at 4) and relies on [`Self::scale_workers`] to
    /// grow it if the caller observes backpressure; pools never shrink.
    pub fn start(&self) {
        let initial = self.0.max_workers.min(4);
        for _ in 0..initial {
            self.spawn_worker();
        }
    }

    /// Grows the pool toward `target`, never past `max_workers` and never
    /// below the number of workers already running.
    pub fn scale_workers(&self, target: usize) {
        let target = target.min(self.0.max_workers);
        while self.0.current_workers.load(Ordering::SeqCst) < target {
            self.spawn_worker();
        }
    }

    fn spawn_worker(&self) {
        let scheduler = self.clone();
        let handle = std::thread::spawn(move || scheduler.worker_loop());
        self.0.workers.lock().unwrap().push(handle);
        self.0.current_workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a job. `depends_on` must name jobs already known to this
    /// scheduler (there is no forward reference). If any dependency is
    /// already `Failed` or `Cancelled`, the new job is born `Cancelled`
    /// rather than ever becoming eligible to run.
    pub fn enqueue(&self, type_tag: TypeTag, name: impl Into<String>, payload: Payload, depends_on: Vec<JobId>, follow_up: Option<FollowUp>) -> JobId {
        let id = JobId(self.0.next_id.fetch_add(1, Ordering::SeqCst));
        let name = name.into();
        let mut guard = self.0.state.lock().unwrap();

        let any_dead = depends_on
            .iter()
            .any(|dep| guard.jobs.get(dep).map(|r| matches!(r.state, JobState::Failed | JobState::Cancelled)).unwrap_or(false));
        let all_done = depends_on
            .iter()
            .all(|dep| guard.jobs.get(dep).map(|r| matches!(r.state, JobState::Done)).unwrap_or(false));

        let state = if any_dead {
            JobState::Cancelled
        } else if all_done {
            JobState::Ready
        } else {
            JobState::Queued
        };

        for dep in &depends_on {
            if let Some(record) = guard.jobs.get_mut(dep) {
                record.dependants.push(id);
            }
        }

        guard.jobs.insert(
            id,
            JobRecord {
                type_tag,
                name,
                payload: Some(payload),
                follow_up,
                depends_on,
                dependants: Vec::new(),
                state,
            },
        );

        if state == JobState::Ready {
            guard.ready.entry(type_tag).or_default().push_back(id);
        }
        drop(guard);
        self.0.cv.notify_all();
        id
    }

    /// Blocks until every job of `tag` recorded so far has reached a
    /// terminal state.
    pub fn wait_for(&self, tag: TypeTag) {
        let mut guard = self.0.state.lock().unwrap();
        loop {
            let pending = guard.jobs.values().any(|r| r.type_tag == tag && !r.state.is_terminal());
            if !pending {
                return;
            }
            guard = self.0.cv.wait(guard).unwrap();
        }
    }

    /// Blocks until nothing is running and nothing is ready to run. Any job
    /// still `Queued` at that point is waiting on a dependency that itself
    /// will never complete, which cannot happen given that every job
    /// transitions its dependants the moment it finishes.
    pub fn wait_all(&self) {
        let mut guard = self.0.state.lock().unwrap();
        loop {
            if guard.is_idle() {
                return;
            }
            guard = self.0.cv.wait(guard).unwrap();
        }
    }

    pub fn errors(&self) -> Vec<JobError> {
        self.0.state.lock().unwrap().errors.clone()
    }

    pub fn stats(&self) -> Stats {
        let guard = self.0.state.lock().unwrap();
        let mut queued = 0;
        let mut done = 0;
        let mut failed = 0;
        for record in guard.jobs.values() {
            match record.state {
                JobState::Queued | JobState::Ready => queued += 1,
                JobState::Running => {}
                JobState::Done => done += 1,
                JobState::Failed | JobState::Cancelled => failed += 1,
            }
        }
        Stats {
            workers: self.0.current_workers.load(Ordering::SeqCst),
            queued,
            running: guard.running,
            done,
            failed,
        }
    }

    /// Signals every worker to exit once its current job (if any) finishes,
    /// and joins them. Running jobs are never preempted.
    pub fn shutdown(&self) {
        self.0.shutdown.store(true, Ordering::SeqCst);
        self.0.cv.notify_all();
        let handles = std::mem::take(&mut *self.0.workers.lock().unwrap());
        for handle in handles {
            let _ = handle.join();
        }
        self.0.current_workers.store(0, Ordering::SeqCst);
    }

    fn worker_loop(&self) {
        set_worker_thread_priority();
        loop {
            let mut guard = self.0.state.lock().unwrap();
            let next = loop {
                if let Some(found) = pick_ready(&mut guard, &self.0.limits) {
                    break Some(found);
                }
                if self.0.shutdown.load(Ordering::SeqCst) && guard.is_idle() {
                    break None;
                }
                guard = self.0.cv.wait(guard).unwrap();
            };
            let Some((id, tag)) = next else { return };
            drop(guard);
            self.run_job(id, tag);
        }
    }

    fn run_job(&self, id: JobId, tag: TypeTag) {
        let (payload, name) = {
            let mut guard = self.0.state.lock().unwrap();
            let record = guard.jobs.get_mut(&id).expect("running job must be recorded");
            (record.payload.take().expect("running job must still have a payload"), record.name.clone())
        };
        self.emit(id, &name, tag, JobState::Running);

        let result = payload();
        let mut events = Vec::new();
        let follow_up = {
            let mut guard = self.0.state.lock().unwrap();
            let in_flight = guard.in_flight.entry(tag).or_insert(0);
            *in_flight = in_flight.saturating_sub(1);
            guard.running = guard.running.saturating_sub(1);

            match result {
                Ok(()) => {
                    guard.jobs.get_mut(&id).unwrap().state = JobState::Done;
                    events.push(JobEvent {
                        id,
                        name: name.clone(),
                        type_tag: tag,
                        state: JobState::Done,
                    });
                    let follow_up = guard.jobs.get_mut(&id).unwrap().follow_up.take();
                    if follow_up.is_some() {
                        guard.pending_follow_ups += 1;
                    }
                    wake_dependants(&mut guard, id);
                    follow_up
                }
                Err(err) => {
                    guard.jobs.get_mut(&id).unwrap().state = JobState::Failed;
                    guard.errors.push(JobError {
                        id,
                        name: name.clone(),
                        type_tag: tag,
                        error: err,
                    });
                    events.push(JobEvent {
                        id,
                        name: name.clone(),
                        type_tag: tag,
                        state: JobState::Failed,
                    });
                    cancel_dependants(&mut guard, id, &mut events);
                    if self.0.fail_fast {
                        cancel_all_pending(&mut guard, &mut events);
                    }
                    None
                }
            }
        };

        for event in &events {
            self.emit_event(event);
        }
        self.0.cv.notify_all();

        if let Some(follow_up) = follow_up {
            follow_up(self);
            let mut guard = self.0.state.lock().unwrap();
            guard.pending_follow_ups = guard.pending_follow_ups.saturating_sub(1);
            drop(guard);
            self.0.cv.notify_all();
        }
    }

    fn emit(&self, id: JobId, name: &str, type_tag: TypeTag, state: JobState) {
        if let Some(sink) = &self.0.progress {
            sink.on_transition(&JobEvent {
                id,
                name: name.to_string(),
                type_tag,
                state,
            });
        }
    }

    fn emit_event(&self, event: &JobEvent) {
        if let Some(sink) = &self.0.progress {
            sink.on_transition(event);
        }
    }
}

/// Pops the first ready job, in `TypeTag` declaration order, whose type has
/// a free slot under its cap. FIFO within a tag; no ordering is promised
/// across tags.
fn pick_ready(state: &mut State, limits: &Limits) -> Option<(JobId, TypeTag)> {
    for tag in TypeTag::ALL {
        let in_flight = *state.in_flight.get(&tag).unwrap_or(&0);
        if in_flight >= limits.get(tag) {
            continue;
        }
        let Some(queue) = state.ready.get_mut(&tag) else { continue };
        let Some(id) = queue.pop_front() else { continue };
        state.in_flight.insert(tag, in_flight + 1);
        state.running += 1;
        if let Some(record) = state.jobs.get_mut(&id) {
            record.state = JobState::Running;
        }
        return Some((id, tag));
    }
    None
}

/// Promotes every `Queued` dependant of `id` whose dependencies are now all
/// `Done` to `Ready` and enqueues it.
fn wake_dependants(state: &mut State, id: JobId) {
    let dependants = state.jobs.get(&id).map(|r| r.dependants.clone()).unwrap_or_default();
    for dep_id in dependants {
        let ready_now = match state.jobs.get(&dep_id) {
            Some(record) if record.state == JobState::Queued => record
                .depends_on
                .iter()
                .all(|d| state.jobs.get(d).map(|r| r.state == JobState::Done).unwrap_or(false)),
            _ => false,
        };
        if ready_now {
            if let Some(record) = state.jobs.get_mut(&dep_id) {
                record.state = JobState::Ready;
                let tag = record.type_tag;
                state.ready.entry(tag).or_default().push_back(dep_id);
            }
        }
    }
}

/// Marks every transitive dependant of the just-failed job `id` as
/// `Cancelled`, removing any that were already `Ready` from their queue.
fn cancel_dependants(state: &mut State, id: JobId, events: &mut Vec<JobEvent>) {
    let mut frontier: VecDeque<JobId> = state.jobs.get(&id).map(|r| r.dependants.clone().into()).unwrap_or_default();
    while let Some(dep_id) = frontier.pop_front() {
        let should_cancel = state.jobs.get(&dep_id).map(|r| matches!(r.state, JobState::Queued | JobState::Ready)).unwrap_or(false);
        if !should_cancel {
            continue;
        }
        let (name, tag, further) = {
            let record = state.jobs.get_mut(&dep_id).unwrap();
            record.state = JobState::Cancelled;
            (record.name.clone(), record.type_tag, record.dependants.clone())
        };
        remove_from_ready(state, tag, dep_id);
        events.push(JobEvent {
            id: dep_id,
            name,
            type_tag: tag,
            state: JobState::Cancelled,
        });
        frontier.extend(further);
    }
}

/// `fail_fast` support: cancels every job not currently running, anywhere
/// in the run, not just the failed job's own dependants.
fn cancel_all_pending(state: &mut State, events: &mut Vec<JobEvent>) {
    let pending: Vec<JobId> = state
        .jobs
        .iter()
        .filter(|(_, r)| matches!(r.state, JobState::Queued | JobState::Ready))
        .map(|(id, _)| *id)
        .collect();
    for id in pending {
        let (name, tag) = {
            let record = state.jobs.get_mut(&id).unwrap();
            record.state = JobState::Cancelled;
            (record.name.clone(), record.type_tag)
        };
        remove_from_ready(state, tag, id);
        events.push(JobEvent {
            id,
            name,
            type_tag: tag,
            state: JobState::Cancelled,
        });
    }
}

fn remove_from_ready(state: &mut State, tag: TypeTag, id: JobId) {
    if let Some(queue) = state.ready.get_mut(&tag) {
        queue.retain(|queued| *queued != id);
    }
}

fn set_worker_thread_priority() {
    use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
    match ThreadPriorityValue::try_from(50u8) {
        Ok(value) => {
            if let Err(err) = set_current_thread_priority(ThreadPriority::Crossplatform(value)) {
                log::warn!("failed to set worker thread priority to normal: {err:?}");
            }
        }
        Err(_) => log::warn!("normal thread priority value (50) rejected as out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn ok_payload() -> Payload {
        Box::new(|| Ok(()))
    }

    #[test]
    fn independent_jobs_all_complete() {
        let scheduler = Scheduler::new(2, None, false, None);
        scheduler.start();
        let a = scheduler.enqueue(TypeTag::Download, "a", ok_payload(), vec![], None);
        let b = scheduler.enqueue(TypeTag::Download, "b", ok_payload(), vec![], None);
        scheduler.wait_all();
        scheduler.shutdown();

        let stats = scheduler.stats();
        assert_eq!(stats.done, 2);
        assert_eq!(stats.failed, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn dependent_job_only_runs_after_its_dependency_completes() {
        let order = Arc::new(Mutex::new(Vec::new()));

        let scheduler = Scheduler::new(2, None, false, None);
        scheduler.start();

        let order_a = Arc::clone(&order);
        let a = scheduler.enqueue(
            TypeTag::Download,
            "a",
            Box::new(move || {
                std::thread::sleep(Duration::from_millis(20));
                order_a.lock().unwrap().push("a");
                Ok(())
            }),
            vec![],
            None,
        );

        let order_b = Arc::clone(&order);
        scheduler.enqueue(
            TypeTag::Link,
            "b",
            Box::new(move || {
                order_b.lock().unwrap().push("b");
                Ok(())
            }),
            vec![a],
            None,
        );

        scheduler.wait_all();
        scheduler.shutdown();

        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn a_failed_job_cancels_its_dependants_but_not_unrelated_jobs() {
        let scheduler = Scheduler::new(2, None, false, None);
        scheduler.start();

        let failing = scheduler.enqueue(TypeTag::Download, "fails", Box::new(|| Err("boom".to_string())), vec![], None);
        let dependant = scheduler.enqueue(TypeTag::Extract, "dependant", ok_payload(), vec![failing], None);
        let unrelated = scheduler.enqueue(TypeTag::Download, "unrelated", ok_payload(), vec![], None);

        scheduler.wait_all();
        scheduler.shutdown();

        let stats = scheduler.stats();
        assert_eq!(stats.failed, 2); // the failure itself plus its cancelled dependant
        assert_eq!(stats.done, 1);
        assert_eq!(scheduler.errors().len(), 1);
        assert_eq!(scheduler.errors()[0].id, failing);

        let _ = (dependant, unrelated);
    }

    #[test]
    fn fail_fast_cancels_every_other_pending_job() {
        let scheduler = Scheduler::new(1, None, true, None);
        scheduler.start();

        scheduler.enqueue(TypeTag::Download, "fails", Box::new(|| Err("boom".to_string())), vec![], None);
        scheduler.enqueue(TypeTag::GitClone, "unrelated", ok_payload(), vec![], None);

        scheduler.wait_all();
        scheduler.shutdown();

        let stats = scheduler.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.done, 0);
    }

    #[test]
    fn per_type_cap_bounds_concurrent_running_jobs() {
        let mut limits = Limits::default_for(8);
        limits.set(TypeTag::Download, 2);

        let scheduler = Scheduler::new(8, Some(limits), false, None);
        scheduler.start();

        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        for i in 0..6 {
            let current = Arc::clone(&current);
            let peak = Arc::clone(&peak);
            scheduler.enqueue(
                TypeTag::Download,
                format!("job-{i}"),
                Box::new(move || {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(15));
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }),
                vec![],
                None,
            );
        }

        scheduler.wait_all();
        scheduler.shutdown();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn follow_up_runs_after_success_and_can_enqueue_more_work() {
        let scheduler = Scheduler::new(2, None, false, None);
        scheduler.start();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_follow_up = Arc::clone(&seen);

        scheduler.enqueue(
            TypeTag::Extract,
            "extract",
            ok_payload(),
            vec![],
            Some(Box::new(move |sched: &Scheduler| {
                let seen = Arc::clone(&seen_follow_up);
                sched.enqueue(
                    TypeTag::Link,
                    "link",
                    Box::new(move || {
                        seen.lock().unwrap().push("link");
                        Ok(())
                    }),
                    vec![],
                    None,
                );
            })),
        );

        scheduler.wait_all();
        scheduler.shutdown();

        assert_eq!(*seen.lock().unwrap(), vec!["link"]);
        assert_eq!(scheduler.stats().done, 2);
    }
}
