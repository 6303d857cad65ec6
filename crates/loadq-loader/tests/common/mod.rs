//! Shared fixtures for loader integration tests.

pub mod transport;

use std::sync::{Arc, Mutex};

use loadq_loader::{LoadEvent, LoadListener};

/// Records every delivered event.
pub struct Recorder<T> {
    events: Mutex<Vec<LoadEvent<T>>>,
}

// Allow unused: not every test binary inspects every helper
#[allow(dead_code)]
impl<T: Send + Sync + 'static> Recorder<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub fn listener(self: &Arc<Self>) -> Arc<dyn LoadListener<T>> {
        Arc::clone(self) as Arc<dyn LoadListener<T>>
    }

    pub fn events(&self) -> Vec<LoadEvent<T>> {
        self.events.lock().unwrap().clone()
    }

    pub fn kinds_for(&self, path: &str) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.request().locator().path() == path)
            .map(LoadEvent::kind)
            .collect()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }

    pub fn terminal_count(&self) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.is_terminal())
            .count()
    }
}

impl<T: Send + Sync> LoadListener<T> for Recorder<T> {
    fn on_event(&self, event: &LoadEvent<T>) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Poll `done` every few milliseconds until it holds or `timeout` elapses.
#[allow(dead_code)]
pub fn wait_for(timeout: std::time::Duration, mut done: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if done() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    done()
}

/// Encode a blank RGB image of the given size as PNG.
#[allow(dead_code)]
pub fn png(width: u32, height: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    loadq_loader::DynamicImage::new_rgb8(width, height)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
