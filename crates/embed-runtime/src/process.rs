//! Process-wide engine setup.
//!
//! A [`Process`] is the proof that global initialization happened. Sessions
//! borrow it, so it cannot be torn down while one is alive; teardown consumes
//! it, so it cannot happen twice.

use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::engine::{Engine, NormalizedArgs};
use crate::error::RuntimeError;
use crate::session::Session;
use crate::stop::StopCoordinator;

/// An initialized engine process with its platform.
pub struct Process<'e, E: Engine> {
    engine: &'e E,
    platform: Option<E::Platform>,
    args: NormalizedArgs,
}

impl<'e, E: Engine> Process<'e, E> {
    /// Initialize global engine state and build the platform.
    ///
    /// On failure nothing stays initialized.
    pub fn initialize(
        engine: &'e E,
        config: &PlatformConfig,
        args: &[String],
    ) -> Result<Self, RuntimeError> {
        config
            .validate()
            .map_err(|d| RuntimeError::Initialization(d.join()))?;

        tracing::debug!("[process] Initializing with {} argument(s)", args.len());
        let normalized = engine
            .initialize_process(args)
            .map_err(|d| RuntimeError::Initialization(d.join()))?;

        let platform = match engine.create_platform(config.concurrency) {
            Ok(platform) => platform,
            Err(diagnostics) => {
                tracing::warn!("[process] Platform creation failed, undoing process setup");
                engine.teardown_process();
                return Err(RuntimeError::Initialization(diagnostics.join()));
            }
        };

        tracing::debug!(
            "[process] Platform ready ({} worker threads)",
            config.concurrency
        );

        Ok(Self {
            engine,
            platform: Some(platform),
            args: normalized,
        })
    }

    pub fn engine(&self) -> &'e E {
        self.engine
    }

    /// Arguments as normalized by the engine.
    pub fn args(&self) -> &NormalizedArgs {
        &self.args
    }

    pub(crate) fn platform(&self) -> &E::Platform {
        // Only `shutdown` takes the platform, and it runs from `teardown`/`Drop`.
        self.platform
            .as_ref()
            .unwrap_or_else(|| unreachable!("platform used after teardown"))
    }

    /// Start a session that publishes to `coordinator` while it runs.
    pub fn session(&self, coordinator: Arc<StopCoordinator>) -> Session<'_, 'e, E> {
        Session::new(self, coordinator)
    }

    /// Release the platform and global engine state.
    pub fn teardown(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(platform) = self.platform.take() {
            tracing::debug!("[process] Tearing down");
            self.engine.teardown_platform(platform);
            self.engine.teardown_process();
        }
    }
}

impl<E: Engine> Drop for Process<'_, E> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
