//! Platform configuration.

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;

fn default_concurrency() -> usize {
    4
}

/// Settings applied when the process is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformConfig {
    /// Worker threads in the engine platform.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

impl PlatformConfig {
    pub fn validate(&self) -> Result<(), Diagnostics> {
        if self.concurrency == 0 {
            return Err(Diagnostics::single("platform concurrency must be at least 1"));
        }
        Ok(())
    }
}
