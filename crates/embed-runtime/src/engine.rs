//! The script engine boundary.
//!
//! Everything the lifecycle needs from a script engine goes through the
//! [`Engine`] trait. The lifecycle never looks inside platforms or
//! environments; it only sequences these calls and moves the values around.

use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::module::NativeModule;

/// A script engine that can host one environment per session.
///
/// Methods are called from the session's run thread only, except
/// [`StopTarget::request_stop`] on the value returned by
/// [`Engine::stop_target`], which may be called from any thread.
pub trait Engine {
    /// Process-wide platform state (worker threads, allocators).
    type Platform;
    /// One engine instance bound to one set of arguments and one event loop.
    type Environment;
    /// What a native module entry point receives when it is linked.
    type Binding;
    /// Thread-safe handle used to forward stop requests.
    type StopTarget: StopTarget;

    /// Global per-process setup. Splits the raw arguments into process
    /// arguments and engine options by the engine's own rules.
    fn initialize_process(&self, args: &[String]) -> Result<NormalizedArgs, Diagnostics>;

    /// Create the platform with a fixed worker-thread count.
    fn create_platform(&self, concurrency: usize) -> Result<Self::Platform, Diagnostics>;

    fn create_environment(
        &self,
        platform: &Self::Platform,
        args: &NormalizedArgs,
    ) -> Result<Self::Environment, Diagnostics>;

    /// Attach the observer completed when scripts request an exit.
    fn install_exit_observer(&self, env: &mut Self::Environment, observer: ExitObserver);

    /// Register `module` under the reserved internal `name`. The entry point
    /// must not run until the bootstrap links it.
    fn register_native_module(
        &self,
        env: &mut Self::Environment,
        name: &'static str,
        module: NativeModule<Self::Binding>,
    ) -> Result<(), Diagnostics>;

    /// Run the bootstrap script, including any module links it requests.
    fn load_bootstrap(&self, env: &mut Self::Environment, source: &str) -> Result<(), Diagnostics>;

    fn stop_target(&self, env: &mut Self::Environment) -> Self::StopTarget;

    /// Drive the event loop until it drains or is stopped. Blocks.
    fn run_event_loop(&self, env: &mut Self::Environment) -> i32;

    fn teardown_environment(&self, env: Self::Environment);

    fn teardown_platform(&self, platform: Self::Platform);

    /// Undo [`Engine::initialize_process`].
    fn teardown_process(&self) {}
}

/// Forwards a stop request to a running environment.
///
/// Returns the engine's status; `0` means the request was accepted.
pub trait StopTarget: Send + Sync + 'static {
    fn request_stop(&self) -> i32;
}

/// Arguments after engine normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedArgs {
    /// Program name followed by the arguments visible to scripts.
    pub args: Vec<String>,
    /// Options consumed by the engine itself.
    pub exec_args: Vec<String>,
}

impl NormalizedArgs {
    /// Split process-style arguments.
    ///
    /// `args[0]` is the program. Options starting with `--` directly after it
    /// are engine options, up to the first non-option. A bare `--` ends the
    /// engine options and is dropped.
    pub fn split(args: &[String]) -> Self {
        let mut normalized = NormalizedArgs::default();
        let mut iter = args.iter();

        if let Some(program) = iter.next() {
            normalized.args.push(program.clone());
        }

        let mut in_options = true;
        for arg in iter {
            if in_options {
                if arg == "--" {
                    in_options = false;
                    continue;
                }
                if arg.starts_with("--") {
                    normalized.exec_args.push(arg.clone());
                    continue;
                }
                in_options = false;
            }
            normalized.args.push(arg.clone());
        }

        normalized
    }

    pub fn program(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

/// Single-assignment slot for an application-requested exit code.
///
/// Cloned into the engine; the session reads it after the loop returns. Only
/// the first completion is kept.
#[derive(Debug, Clone, Default)]
pub struct ExitObserver {
    code: Arc<OnceLock<i32>>,
}

impl ExitObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code`. Returns `false` if an exit was already recorded.
    pub fn complete(&self, code: i32) -> bool {
        self.code.set(code).is_ok()
    }

    pub fn code(&self) -> Option<i32> {
        self.code.get().copied()
    }

    pub fn is_completed(&self) -> bool {
        self.code.get().is_some()
    }
}
