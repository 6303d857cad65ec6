//! `loadq upload`

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use loadq_core::{Method, Part};
use loadq_loader::{HttpTransport, Loader, MainLoop, UploadStrategy};

use super::{Outcome, build_request, drive, report_failures};
use crate::config::CliConfig;
use crate::progress::TransferBars;

/// Read `path` into a data part named `name`.
pub fn file_part(name: &str, path: &Path) -> anyhow::Result<Part> {
    let data = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map_or_else(|| name.to_string(), |f| f.to_string_lossy().into_owned());
    Ok(Part::data(name, filename, data))
}

pub fn run(
    config: &CliConfig,
    url: &str,
    fields: &[(String, String)],
    files: &[(String, String)],
) -> anyhow::Result<()> {
    let parts = files
        .iter()
        .map(|(name, path)| file_part(name, Path::new(path)))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let mut request = build_request(url, fields, parts)?;
    request.set_method(Method::Post)?;

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let mut main_loop = MainLoop::new();
    let loader = Loader::builder(UploadStrategy::new(transport))
        .config(config.loader.clone())
        .delivery(Arc::new(main_loop.handle()))
        .build()?;

    let outcomes = drive(
        &loader,
        &mut main_loop,
        vec![Arc::new(request)],
        Arc::new(TransferBars::new()),
    )?;

    let mut stdout = std::io::stdout().lock();
    for outcome in &outcomes {
        if let Outcome::Finished { raw, .. } = outcome {
            stdout.write_all(raw).context("failed to write response")?;
        }
    }
    stdout.flush().context("failed to write response")?;
    report_failures(&outcomes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_part_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, b"a,b\n1,2\n").unwrap();

        let part = file_part("attachment", &path).unwrap();
        assert_eq!(part.name(), "attachment");
        assert_eq!(part.filename().as_deref(), Some("report.csv"));
        assert_eq!(part.raw_data().as_ref(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_part("f", &dir.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
