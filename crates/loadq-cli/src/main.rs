//! CLI entry point - the composition root.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use loadq_cli::{Cli, CliConfig, CliError, Commands, handlers};

/// Log to stderr so progress bars and command output stay on their own
/// streams. `--verbose` wins over `RUST_LOG`.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("loadq_cli=debug,loadq_loader=debug,loadq_core=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch {
            urls,
            out,
            fields,
            post,
        } => handlers::fetch::run(&config, &urls, &fields, post, out.as_deref()),
        Commands::Upload { url, fields, files } => {
            handlers::upload::run(&config, &url, &fields, &files)
        }
        Commands::Image { urls, scale, out } => {
            handlers::image::run(&config, &urls, scale, out.as_deref())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            let code = err.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(1))
        }
    }
}
