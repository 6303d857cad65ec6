//! Command handlers.
//!
//! Each handler builds a loader, hands its listener callbacks to a
//! [`MainLoop`] pumped on the calling thread, and waits for the workers to
//! go idle before writing results.

pub mod fetch;
pub mod image;
pub mod upload;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::Context;
use loadq_core::{LoadError, LoadEvent, LoadListener, LoadResult, Part, Request};
use loadq_loader::{FetchStrategy, Loader, LoaderState, MainLoop};
use url::Url;

use crate::error::CliError;
use crate::progress::TransferBars;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Terminal result of one request.
pub enum Outcome<T> {
    Finished {
        request: Arc<Request>,
        raw: Vec<u8>,
        output: Arc<T>,
    },
    Failed {
        request: Arc<Request>,
        error: LoadError,
    },
}

/// Collects terminal events.
pub struct Outcomes<T> {
    items: Mutex<Vec<Outcome<T>>>,
}

impl<T> Default for Outcomes<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> Outcomes<T> {
    fn items(&self) -> MutexGuard<'_, Vec<Outcome<T>>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn take(&self) -> Vec<Outcome<T>> {
        std::mem::take(&mut *self.items())
    }
}

impl<T: Send + Sync> LoadListener<T> for Outcomes<T> {
    fn on_event(&self, event: &LoadEvent<T>) {
        let outcome = match event {
            LoadEvent::Finished {
                request,
                raw,
                output,
            } => Outcome::Finished {
                request: Arc::clone(request),
                raw: raw.to_vec(),
                output: Arc::clone(output),
            },
            LoadEvent::Failed { request, error } => Outcome::Failed {
                request: Arc::clone(request),
                error: error.clone(),
            },
            _ => return,
        };
        self.items().push(outcome);
    }
}

/// Run posted callbacks until `idle` holds, then flush what is left.
pub fn pump_until_idle(main_loop: &mut MainLoop, mut idle: impl FnMut() -> bool) {
    while !main_loop.run_until(POLL_INTERVAL, &mut idle) {}
    main_loop.run_pending();
}

/// Queue `requests` on `loader`, start it and wait until it goes idle.
pub fn drive<S: FetchStrategy>(
    loader: &Loader<S>,
    main_loop: &mut MainLoop,
    requests: Vec<Arc<Request>>,
    bars: Arc<TransferBars>,
) -> LoadResult<Vec<Outcome<S::Output>>> {
    let outcomes = Arc::new(Outcomes::<S::Output>::default());
    loader.add_listener(bars);
    loader.add_listener(Arc::clone(&outcomes) as Arc<dyn LoadListener<S::Output>>);
    loader.add_all_to_queue(requests);
    loader.start()?;
    pump_until_idle(main_loop, || loader.state() == LoaderState::Idle);
    loader.join();
    Ok(outcomes.take())
}

/// Print failures to stderr; error out if there were any.
pub fn report_failures<T>(outcomes: &[Outcome<T>]) -> Result<(), CliError> {
    let mut failed = 0;
    for outcome in outcomes {
        if let Outcome::Failed { request, error } = outcome {
            eprintln!("{}: {}", request.locator(), error.user_message());
            failed += 1;
        }
    }
    if failed == 0 {
        Ok(())
    } else {
        Err(CliError::Incomplete {
            failed,
            total: outcomes.len(),
        })
    }
}

/// Build a request carrying `fields` as text parts followed by `extra`.
pub fn build_request(
    locator: &str,
    fields: &[(String, String)],
    extra: Vec<Part>,
) -> Result<Request, CliError> {
    let url = Url::parse(locator)
        .map_err(|e| CliError::Arguments(format!("invalid URL '{locator}': {e}")))?;
    let mut parts: Vec<Part> = fields
        .iter()
        .map(|(name, value)| Part::text(name.as_str(), value.as_str()))
        .collect();
    parts.extend(extra);

    let request = Request::new(url);
    Ok(if parts.is_empty() {
        request
    } else {
        request.with_parts(parts)
    })
}

/// File name for a downloaded body: the last path segment, made safe for
/// the local file system, with `extension` substituted when given.
pub fn output_name(locator: &Url, extension: Option<&str>) -> String {
    let segment = locator
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .or_else(|| locator.host_str())
        .unwrap_or("index");
    let safe: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match extension {
        Some(ext) => Path::new(&safe)
            .with_extension(ext)
            .to_string_lossy()
            .into_owned(),
        None => safe,
    }
}

/// Write `bytes` to `dir/name`, creating `dir` as needed.
pub fn write_output(dir: &Path, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    let path = dir.join(name);
    std::fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "Wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadq_core::Method;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_output_name() {
        assert_eq!(output_name(&url("http://h/a/b/photo.jpg"), None), "photo.jpg");
        assert_eq!(
            output_name(&url("http://h/a/photo.jpg?x=1"), Some("png")),
            "photo.png"
        );
        assert_eq!(output_name(&url("http://example.org/"), None), "example.org");
        assert_eq!(output_name(&url("http://h/we%20ird"), None), "we_20ird");
        assert_eq!(output_name(&url("http://h/dir/"), Some("png")), "h.png");
    }

    #[test]
    fn test_build_request() {
        let fields = vec![("p1".to_string(), "param1".to_string())];
        let request = build_request("http://h/q", &fields, Vec::new()).unwrap();
        assert_eq!(request.method(), Method::Get);
        assert_eq!(request.compose_locator().as_str(), "http://h/q?p1=param1");

        let request = build_request(
            "http://h/up",
            &fields,
            vec![Part::data("f", "f.bin", vec![1u8, 2, 3])],
        )
        .unwrap();
        assert_eq!(request.method(), Method::Post);
        assert_eq!(request.parts().map(<[Part]>::len), Some(2));

        assert!(matches!(
            build_request("not a url", &[], Vec::new()),
            Err(CliError::Arguments(_))
        ));
    }

    #[test]
    fn test_report_failures() {
        let request = Arc::new(Request::parse("http://h/x").unwrap());
        let ok: Vec<Outcome<()>> = vec![Outcome::Finished {
            request: Arc::clone(&request),
            raw: Vec::new(),
            output: Arc::new(()),
        }];
        assert!(report_failures(&ok).is_ok());

        let mixed: Vec<Outcome<()>> = vec![
            Outcome::Finished {
                request: Arc::clone(&request),
                raw: Vec::new(),
                output: Arc::new(()),
            },
            Outcome::Failed {
                request,
                error: LoadError::Cancelled,
            },
        ];
        let err = report_failures(&mixed).unwrap_err();
        assert_eq!(err.to_string(), "1 of 2 requests failed");
    }

    #[test]
    fn test_write_output_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("out");
        write_output(&nested, "a.bin", b"abc").unwrap();
        assert_eq!(std::fs::read(nested.join("a.bin")).unwrap(), b"abc");
    }
}
