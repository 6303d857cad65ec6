//! `loadq image`

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use loadq_core::{ImageCodec, LoadListener, Scale};
use loadq_loader::{
    DynamicImage, HttpTransport, ImageCrateCodec, ImageLoader, LoaderState, MainLoop, Route,
};
use tracing::debug;

use super::{Outcome, Outcomes, build_request, output_name, pump_until_idle, report_failures, write_output};
use crate::config::CliConfig;
use crate::progress::TransferBars;

pub fn run(
    config: &CliConfig,
    urls: &[String],
    scale: Option<Scale>,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    let mut requests = Vec::with_capacity(urls.len());
    for url in urls {
        requests.push(Arc::new(build_request(url, &[], Vec::new())?));
    }

    let transport = Arc::new(HttpTransport::new(&config.http)?);
    let mut main_loop = MainLoop::new();
    let images = ImageLoader::builder(transport)
        .config(config.image.clone())
        .delivery(Arc::new(main_loop.handle()))
        .build()?;

    let outcomes = Arc::new(Outcomes::<DynamicImage>::default());
    images.add_listener(Arc::new(TransferBars::new()));
    images.add_listener(Arc::clone(&outcomes) as Arc<dyn LoadListener<DynamicImage>>);

    for request in requests {
        let route = match scale {
            Some(scale) => images.add_to_queue_scaled(request, scale),
            None => images.add_to_queue(request),
        };
        debug!(?route, cached = route == Route::Cache, "Queued image");
    }
    images.start()?;
    pump_until_idle(&mut main_loop, || {
        images.fetch_loader().state() == LoaderState::Idle
            && images.cache_loader().state() == LoaderState::Idle
    });
    images.join();

    let outcomes = outcomes.take();
    let codec = ImageCrateCodec::new();
    for outcome in &outcomes {
        let Outcome::Finished {
            request, output, ..
        } = outcome
        else {
            continue;
        };
        match out {
            Some(dir) => {
                let png = codec.encode_png(output)?;
                write_output(dir, &output_name(request.locator(), Some("png")), &png)
                    .with_context(|| format!("failed to save {}", request.locator()))?;
            }
            None => println!(
                "{}: {}x{}",
                request.locator(),
                output.width(),
                output.height()
            ),
        }
    }
    report_failures(&outcomes)?;
    Ok(())
}
