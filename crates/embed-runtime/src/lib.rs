//! Embedding runtime
//!
//! Runs a script environment inside a host program and lets other threads stop
//! it while it runs.
//!
//! # Architecture
//!
//! - [`Embedder::run`] initializes the process, runs one session on the
//!   calling thread and tears everything down again
//! - A session creates the environment, registers the host's native module,
//!   loads the bootstrap and blocks in the event loop
//! - The running session is published to a [`StopCoordinator`]; any thread may
//!   call [`Embedder::stop`] or [`StopHandle::stop`]
//! - The engine itself sits behind the [`Engine`] trait; [`DenoEngine`] runs
//!   JavaScript on `deno_core`

mod config;
mod diagnostics;
mod embedder;
mod engine;
mod error;
mod module;
mod options;
mod process;
mod session;
mod stop;

pub mod deno;

pub use config::PlatformConfig;
pub use diagnostics::{Diagnostics, join};
pub use embedder::Embedder;
pub use engine::{Engine, ExitObserver, NormalizedArgs, StopTarget};
pub use error::{RuntimeError, StopError};
pub use module::{
    BOOTSTRAP_SOURCE, EMBEDDER_BINDING, ModuleEntry, NATIVE_MODULE_VERSION, NativeModule,
};
pub use options::RunOptions;
pub use process::Process;
pub use session::{RunResult, Session, SessionState};
pub use stop::{NO_ACTIVE_SESSION, Published, StopCoordinator, StopHandle, StopStatus};

pub use deno::{DenoEngine, DenoEnvironment, DenoPlatform, DenoStopTarget};

/// Re-exported so native module entry points can drive the `JsRuntime`.
pub use deno_core;
