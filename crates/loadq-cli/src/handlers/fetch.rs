//! `loadq fetch`

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use loadq_core::Method;
use loadq_loader::{HttpTransport, Loader, MainLoop, UploadStrategy};
use tracing::info;

use super::{Outcome, build_request, drive, output_name, report_failures, write_output};
use crate::config::CliConfig;
use crate::progress::TransferBars;

pub fn run(
    config: &CliConfig,
    urls: &[String],
    fields: &[(String, String)],
    post: bool,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let mut requests = Vec::with_capacity(urls.len());
    for url in urls {
        let mut request = build_request(url, fields, Vec::new())?;
        if post {
            request.set_method(Method::Post)?;
        }
        requests.push(Arc::new(request));
    }

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let mut main_loop = MainLoop::new();
    let loader = Loader::builder(UploadStrategy::new(transport))
        .config(config.loader.clone())
        .delivery(Arc::new(main_loop.handle()))
        .build()?;

    info!(count = requests.len(), "Fetching");
    let outcomes = drive(
        &loader,
        &mut main_loop,
        requests,
        Arc::new(TransferBars::new()),
    )?;

    for outcome in &outcomes {
        let Outcome::Finished { request, raw, .. } = outcome else {
            continue;
        };
        match out {
            Some(dir) => write_output(dir, &output_name(request.locator(), None), raw)
                .with_context(|| format!("failed to save {}", request.locator()))?,
            None => println!("{}: {} bytes", request.locator(), raw.len()),
        }
    }
    report_failures(&outcomes)?;
    Ok(())
}
