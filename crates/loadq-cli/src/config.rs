//! Configuration file for the CLI.
//!
//! ```json
//! {
//!   "loader": { "chunk_size": 16384, "progress_interval_ms": 100 },
//!   "image": { "cache": "lru", "max_cache_size": 20000000 },
//!   "http": { "read_timeout_ms": 30000 }
//! }
//! ```
//!
//! Every section and field is optional.

use std::path::Path;

use loadq_core::{HttpTransportConfig, ImageLoaderConfig, LoaderConfig};
use serde::{Deserialize, Serialize};

use crate::error::CliError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Engine settings for `fetch` and `upload`.
    pub loader: LoaderConfig,
    /// Settings for `image`.
    pub image: ImageLoaderConfig,
    pub http: HttpTransportConfig,
}

impl CliConfig {
    /// Read `path`, or fall back to defaults when none is given.
    pub fn load(path: Option<&Path>) -> Result<Self, CliError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .map_err(|e| CliError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
            .map_err(|e| CliError::Config(format!("invalid {}: {e}", path.display())))
    }

    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
