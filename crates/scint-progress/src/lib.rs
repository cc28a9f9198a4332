//! Renders scheduler job transitions as a terminal progress UI: one
//! [`indicatif::MultiProgress`], a bar per in-flight job inserted ahead of a
//! running total, removed on completion. `scint-schedule` only knows about
//! [`ProgressSink`]; it has no opinion on how (or whether) events get drawn.

use std::collections::HashMap;
use std::sync::Mutex;

use scint_core::TypeTag;
use scint_schedule::{JobError, JobEvent, JobId, JobState, ProgressSink};
use tui::{ProgressBar, ProgressStyle, Stylize};

/// A live terminal progress display backed by `indicatif`.
///
/// One bar is shown per job currently `Running`; a trailing total bar
/// tracks how many of the run's jobs have reached a terminal state.
pub struct TerminalProgress {
    multi: tui::MultiProgress,
    total: ProgressBar,
    bars: Mutex<HashMap<JobId, ProgressBar>>,
}

impl TerminalProgress {
    pub fn new(total_jobs: usize) -> Self {
        let multi = tui::MultiProgress::new();
        let total = multi.add(
            ProgressBar::new(total_jobs as u64).with_style(
                ProgressStyle::with_template("\n|{bar:20.cyan/blue}| {pos}/{len} jobs")
                    .expect("static template")
                    .progress_chars("■≡=- "),
            ),
        );
        total.tick();

        Self {
            multi,
            total,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Clears every bar this run drew, leaving the terminal clean for
    /// whatever summary the caller prints next.
    pub fn finish(&self) {
        let _ = self.multi.clear();
    }
}

impl ProgressSink for TerminalProgress {
    fn on_transition(&self, event: &JobEvent) {
        let mut bars = self.bars.lock().unwrap();

        match event.state {
            JobState::Running => {
                let bar = self.multi.insert_before(
                    &self.total,
                    ProgressBar::new_spinner().with_style(
                        ProgressStyle::with_template(" {spinner} {msg}")
                            .expect("static template")
                            .tick_chars("--=≡■≡=--"),
                    ),
                );
                bar.set_message(format!("{} {}", verb(event.type_tag).blue(), event.name.clone().bold()));
                bar.enable_steady_tick(std::time::Duration::from_millis(120));
                bars.insert(event.id, bar);
            }
            JobState::Done => {
                if let Some(bar) = bars.remove(&event.id) {
                    bar.finish_and_clear();
                }
                let _ = self.multi.println(format!("{} {}", "done".green(), event.name));
                self.total.inc(1);
            }
            JobState::Failed => {
                if let Some(bar) = bars.remove(&event.id) {
                    bar.finish_and_clear();
                }
                let _ = self.multi.println(format!("{} {}", "failed".red().bold(), event.name));
                self.total.inc(1);
            }
            JobState::Cancelled => {
                if let Some(bar) = bars.remove(&event.id) {
                    bar.finish_and_clear();
                }
                self.total.inc(1);
            }
            JobState::Queued | JobState::Ready => {}
        }
    }
}

fn verb(tag: TypeTag) -> &'static str {
    match tag {
        TypeTag::FetchIndex => "Fetching index",
        TypeTag::GitClone => "Cloning",
        TypeTag::Download => "Downloading",
        TypeTag::Extract => "Extracting",
        TypeTag::Link => "Installing",
        TypeTag::BuildExt => "Building",
        TypeTag::Binstub => "Generating binstubs for",
        TypeTag::Resolve => "Resolving",
    }
}

/// Prints a one-line summary per failed job once the run is over, each
/// carrying whatever tail of build/download output the job's own error
/// string captured (e.g. `scint-extbuild`'s `make`/`extconf.rb` tail).
pub fn report_failures(errors: &[JobError]) {
    for error in errors {
        eprintln!("{} {} ({}): {}", "error:".red().bold(), error.name.clone().bold(), verb(error.type_tag), error.error);
    }
}
