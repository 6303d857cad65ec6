//! Root CLI structure and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use loadq_core::Scale;

/// Queue-driven fetching, uploading and image loading.
#[derive(Parser)]
#[command(name = "loadq")]
#[command(about = "Fetch, upload and load images through request queues")]
#[command(version)]
pub struct Cli {
    /// JSON configuration file
    #[arg(long, global = true, env = "LOADQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Download each URL in order
    Fetch {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Directory to write bodies into; sizes are reported otherwise
        #[arg(long)]
        out: Option<PathBuf>,

        /// Text part sent with every request
        #[arg(long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,

        /// Send the fields as a multipart body even when they fit the query
        #[arg(long)]
        post: bool,
    },

    /// Upload fields and files as a multipart body and print the response
    Upload {
        url: String,

        /// Text part
        #[arg(long = "field", value_parser = parse_pair)]
        fields: Vec<(String, String)>,

        /// File part, as NAME=PATH
        #[arg(long = "file", value_parser = parse_pair)]
        files: Vec<(String, String)>,
    },

    /// Load images through the fetch and cache queues and write them as PNG
    Image {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Bring every image within this box, e.g. 320x240
        #[arg(long)]
        scale: Option<Scale>,

        /// Directory to write images into; dimensions are reported otherwise
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// Parse `KEY=VALUE`. The value may itself contain `=`.
pub fn parse_pair(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{s}'")),
    }
}
