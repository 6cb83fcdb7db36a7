//! Runtime session: one environment for the duration of one run.
//!
//! ```text
//! Uninitialized → PlatformReady → EnvironmentCreated → ModuleRegistered
//!              → BootstrapLoaded → Running → Stopped
//!                        (any step before Running) ↘ Failed
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::engine::{Engine, ExitObserver};
use crate::error::RuntimeError;
use crate::module::{BOOTSTRAP_SOURCE, EMBEDDER_BINDING, NativeModule};
use crate::process::Process;
use crate::stop::StopCoordinator;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Uninitialized,
    PlatformReady,
    EnvironmentCreated,
    ModuleRegistered,
    BootstrapLoaded,
    Running,
    Stopped,
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Stopped | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
    /// Process-style exit code, `0` on success.
    pub exit_code: i32,
    /// Present iff a step failed before a clean shutdown.
    pub error: Option<RuntimeError>,
    /// `Stopped` if the event loop ran, `Failed` otherwise.
    pub state: SessionState,
}

impl RunResult {
    /// A run that failed before reaching its event loop.
    pub fn failed(error: RuntimeError) -> Self {
        Self {
            exit_code: 1,
            error: Some(error),
            state: SessionState::Failed,
        }
    }

    fn stopped(exit_code: i32, error: Option<RuntimeError>) -> Self {
        Self {
            exit_code,
            error,
            state: SessionState::Stopped,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }

    /// The aggregated error text, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(RuntimeError::message)
    }

    pub fn into_result(self) -> Result<(), RuntimeError> {
        match self.error {
            Some(error) => Err(error),
            None if self.exit_code != 0 => Err(RuntimeError::NonZeroExit {
                code: self.exit_code,
            }),
            None => Ok(()),
        }
    }
}

/// Owns one environment for one run.
pub struct Session<'p, 'e, E: Engine> {
    id: u64,
    process: &'p Process<'e, E>,
    coordinator: Arc<StopCoordinator>,
    state: SessionState,
}

impl<'p, 'e, E: Engine> Session<'p, 'e, E> {
    pub(crate) fn new(process: &'p Process<'e, E>, coordinator: Arc<StopCoordinator>) -> Self {
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            process,
            coordinator,
            state: SessionState::Uninitialized,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    fn advance(&mut self, next: SessionState) {
        tracing::debug!("[session:{}] {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn fail(mut self, error: RuntimeError) -> RunResult {
        tracing::warn!("[session:{}] Failed in {}: {}", self.id, self.state, error);
        self.advance(SessionState::Failed);
        RunResult::failed(error)
    }

    /// Run the session to completion on the calling thread.
    ///
    /// Blocks inside the event loop until scripts finish, an exit is
    /// requested, or a stop is forwarded through the coordinator.
    pub fn run(mut self, module: NativeModule<E::Binding>) -> RunResult {
        let process = self.process;
        let engine = process.engine();

        let platform = process.platform();
        self.advance(SessionState::PlatformReady);

        let mut env = match engine.create_environment(platform, process.args()) {
            Ok(env) => env,
            Err(diagnostics) => {
                return self.fail(RuntimeError::EnvironmentCreation(diagnostics.join()));
            }
        };
        self.advance(SessionState::EnvironmentCreated);

        // Installed before the bootstrap so exits requested by the module entry
        // point are observed too.
        let exit = ExitObserver::new();
        engine.install_exit_observer(&mut env, exit.clone());

        let module_name = module.name().to_string();
        let registered = module
            .validate()
            .and_then(|()| engine.register_native_module(&mut env, EMBEDDER_BINDING, module));
        if let Err(diagnostics) = registered {
            engine.teardown_environment(env);
            return self.fail(RuntimeError::ModuleRegistration(format!(
                "{}: {}",
                module_name,
                diagnostics.join()
            )));
        }
        self.advance(SessionState::ModuleRegistered);

        let bootstrap_error = match engine.load_bootstrap(&mut env, BOOTSTRAP_SOURCE) {
            Ok(()) => None,
            Err(diagnostics) if exit.is_completed() => {
                tracing::debug!(
                    "[session:{}] Bootstrap interrupted by exit request: {}",
                    self.id,
                    diagnostics
                );
                None
            }
            Err(diagnostics) => {
                tracing::warn!("[session:{}] Bootstrap failed: {}", self.id, diagnostics);
                Some(RuntimeError::BootstrapLoad(diagnostics.join()))
            }
        };
        self.advance(SessionState::BootstrapLoaded);

        let coordinator = Arc::clone(&self.coordinator);
        let target = Arc::new(engine.stop_target(&mut env));
        let published = match coordinator.publish(target) {
            Ok(published) => published,
            Err(error) => {
                engine.teardown_environment(env);
                return self.fail(error);
            }
        };
        self.advance(SessionState::Running);

        let loop_code = engine.run_event_loop(&mut env);

        published.clear();
        self.advance(SessionState::Stopped);

        engine.teardown_environment(env);

        let exit_code = exit.code().unwrap_or(loop_code);
        tracing::debug!(
            "[session:{}] Event loop returned {}, exit code {}",
            self.id,
            loop_code,
            exit_code
        );

        match bootstrap_error {
            Some(error) => RunResult::stopped(1, Some(error)),
            None => RunResult::stopped(exit_code, None),
        }
    }
}

impl<E: Engine> fmt::Debug for Session<'_, '_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .finish()
    }
}
