//! Host configuration.
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `EMBED_`-prefixed environment variables. Command-line flags are applied on
//! top by `main`.

use std::path::Path;

use embed_runtime::PlatformConfig;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostConfig {
    /// Worker threads in the engine platform.
    pub concurrency: usize,
    /// Stop the script after this many milliseconds.
    pub timeout_ms: Option<u64>,
    /// Default tracing filter, used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Engine options placed before the script, e.g. `--title=worker`.
    pub engine_options: Vec<String>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            concurrency: PlatformConfig::default().concurrency,
            timeout_ms: None,
            log_filter: "embed_host=info,embed_runtime=info".to_string(),
            engine_options: Vec::new(),
        }
    }
}

impl HostConfig {
    pub fn figment(file: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(HostConfig::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        figment.merge(Env::prefixed("EMBED_"))
    }

    pub fn load(file: Option<&Path>) -> Result<Self, figment::Error> {
        Self::figment(file).extract()
    }

    pub fn platform(&self) -> PlatformConfig {
        PlatformConfig {
            concurrency: self.concurrency,
        }
    }
}
