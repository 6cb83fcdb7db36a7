//! One-shot run/stop entry points.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::PlatformConfig;
use crate::engine::Engine;
use crate::error::RuntimeError;
use crate::options::RunOptions;
use crate::process::Process;
use crate::session::RunResult;
use crate::stop::{StopCoordinator, StopHandle, StopStatus};

/// Runs environments of one engine and lets other threads stop them.
///
/// Each [`Embedder::run`] initializes the process, runs one session on the
/// calling thread and tears the process down again. Only one run may be in
/// flight per embedder; a concurrent call fails with
/// [`RuntimeError::AlreadyRunning`].
pub struct Embedder<E: Engine> {
    engine: E,
    config: PlatformConfig,
    coordinator: Arc<StopCoordinator>,
    running: Mutex<()>,
}

impl<E: Engine> Embedder<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            config: PlatformConfig::default(),
            coordinator: Arc::new(StopCoordinator::new()),
            running: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: PlatformConfig) -> Self {
        self.config = config;
        self
    }

    /// Use a shared coordinator instead of a private one.
    pub fn with_coordinator(mut self, coordinator: Arc<StopCoordinator>) -> Self {
        self.coordinator = coordinator;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Handle for stopping the running environment from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(Arc::clone(&self.coordinator))
    }

    /// Request the running environment to stop. Does not wait for it.
    pub fn stop(&self) -> StopStatus {
        self.coordinator.request_stop()
    }

    /// Run one environment to completion on the calling thread.
    pub fn run(&self, options: RunOptions<E::Binding>) -> RunResult {
        let Some(_running) = self.running.try_lock() else {
            tracing::warn!("[embedder] Rejecting run: another run is in progress");
            return RunResult::failed(RuntimeError::AlreadyRunning);
        };

        if options.is_deferred() {
            return RunResult::failed(RuntimeError::InvalidOptions(
                "deferred runs are not supported".to_string(),
            ));
        }

        let args = match options.process_args() {
            Ok(args) => args,
            Err(error) => return RunResult::failed(error),
        };

        let process = match Process::initialize(&self.engine, &self.config, &args) {
            Ok(process) => process,
            Err(error) => {
                tracing::error!("[embedder] {}", error);
                return RunResult::failed(error);
            }
        };

        let result = process
            .session(Arc::clone(&self.coordinator))
            .run(options.into_module());

        process.teardown();
        result
    }
}
