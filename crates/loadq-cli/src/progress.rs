//! Terminal progress bars driven by load events.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use loadq_core::{LoadEvent, LoadListener};

const BAR_TEMPLATE: &str =
    "{spinner:.green} {msg:30!} [{bar:30.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg:30!} {bytes}";

/// One bar per request, kept in a [`MultiProgress`].
pub struct TransferBars {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl Default for TransferBars {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferBars {
    /// Bars drawn to stderr.
    pub fn new() -> Self {
        Self::with_draw_target(ProgressDrawTarget::stderr())
    }

    pub fn hidden() -> Self {
        Self::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn with_draw_target(target: ProgressDrawTarget) -> Self {
        Self {
            multi: MultiProgress::with_draw_target(target),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<String, ProgressBar>> {
        self.bars.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn spinner(&self, label: &str) -> ProgressBar {
        let bar = self.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template(SPINNER_TEMPLATE) {
            bar.set_style(style);
        }
        bar.set_message(label.to_string());
        bar
    }

    /// Show determinate progress once the total is known.
    fn update(&self, key: &str, done: u64, total: u64) {
        let bars = self.bars();
        let Some(bar) = bars.get(key) else { return };
        if bar.length() != Some(total) {
            if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
                bar.set_style(style.progress_chars("█▓░"));
            }
            bar.set_length(total);
        }
        bar.set_position(done);
    }

    /// Number of bars still running.
    pub fn active(&self) -> usize {
        self.bars().values().filter(|bar| !bar.is_finished()).count()
    }
}

impl<T> LoadListener<T> for TransferBars {
    fn on_event(&self, event: &LoadEvent<T>) {
        let key = event.request().locator().to_string();
        match event {
            LoadEvent::Started { request } => {
                let label = request
                    .locator()
                    .path_segments()
                    .and_then(|mut segments| segments.next_back())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| request.locator().host_str().unwrap_or("request"))
                    .to_string();
                let bar = self.spinner(&label);
                if let Some(previous) = self.bars().insert(key, bar) {
                    previous.finish_and_clear();
                }
            }
            LoadEvent::UploadProgress { sent, total, .. } => self.update(&key, *sent, *total),
            LoadEvent::DownloadProgress {
                received, total, ..
            } => self.update(&key, *received, *total),
            LoadEvent::Finished { raw, .. } => {
                if let Some(bar) = self.bars().get(&key) {
                    bar.set_position(raw.len() as u64);
                    bar.finish();
                }
            }
            LoadEvent::Failed { error, .. } => {
                if let Some(bar) = self.bars().get(&key) {
                    bar.abandon_with_message(error.user_message());
                }
            }
        }
    }
}
