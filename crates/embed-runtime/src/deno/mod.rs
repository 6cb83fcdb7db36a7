//! [`Engine`] implementation on top of `deno_core`.
//!
//! Each environment is a `JsRuntime` driven by its own current-thread tokio
//! runtime on the session's run thread. Stops and `process.exit` flip a
//! `watch` flag the event loop selects on, and terminate V8 execution so
//! running script code unwinds.

mod ops;
pub mod resolve;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use deno_core::v8;
use deno_core::{JsRuntime, PollEventLoopOptions, RuntimeOptions};
use parking_lot::Mutex;
use tokio::sync::watch;

use crate::diagnostics::Diagnostics;
use crate::engine::{Engine, ExitObserver, NormalizedArgs, StopTarget};
use crate::module::NativeModule;

pub use ops::ProcessInfo;
use ops::{ExitHook, LinkRequests, embed_runtime};

/// Worker-thread count of the V8 platform, set when it is initialized.
/// V8 is initialized at most once per process.
static V8_PLATFORM_THREADS: OnceLock<usize> = OnceLock::new();

/// Serializes isolate creation; concurrent creation is not safe in V8.
static ISOLATE_CREATE_LOCK: Mutex<()> = Mutex::new(());

const V8_FLAGS_OPTION: &str = "--v8-flags=";
const TITLE_OPTION: &str = "--title=";

/// The `deno_core` engine. Stateless; all state lives in platforms and
/// environments.
#[derive(Debug, Default, Clone, Copy)]
pub struct DenoEngine;

impl DenoEngine {
    pub fn new() -> Self {
        Self
    }
}

/// Handle to the process-wide V8 platform.
///
/// `concurrency` is the worker-thread count V8 actually runs with, which is
/// the value of the first platform created in this process.
#[derive(Debug)]
pub struct DenoPlatform {
    concurrency: usize,
}

impl DenoPlatform {
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }
}

/// One `JsRuntime` with its event loop.
pub struct DenoEnvironment {
    // Dropped before `event_loop`; pending ops may hold tokio resources.
    runtime: JsRuntime,
    event_loop: tokio::runtime::Runtime,
    shutdown: Arc<watch::Sender<bool>>,
    modules: HashMap<&'static str, NativeModule<JsRuntime>>,
}

impl DenoEnvironment {
    pub fn runtime(&mut self) -> &mut JsRuntime {
        &mut self.runtime
    }
}

/// Stops a running [`DenoEnvironment`] from any thread.
pub struct DenoStopTarget {
    shutdown: Arc<watch::Sender<bool>>,
    isolate: v8::IsolateHandle,
}

impl StopTarget for DenoStopTarget {
    fn request_stop(&self) -> i32 {
        self.shutdown.send_replace(true);
        self.isolate.terminate_execution();
        0
    }
}

fn v8_flags(exec_args: &[String]) -> Vec<String> {
    exec_args
        .iter()
        .filter_map(|arg| arg.strip_prefix(V8_FLAGS_OPTION))
        .flat_map(|flags| flags.split(','))
        .filter(|flag| !flag.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_title(args: &NormalizedArgs) -> Result<String, Diagnostics> {
    let mut diagnostics = Diagnostics::new();
    let mut title = None;

    for arg in &args.exec_args {
        if let Some(value) = arg.strip_prefix(TITLE_OPTION) {
            title = Some(value.to_string());
        } else if !arg.starts_with(V8_FLAGS_OPTION) {
            diagnostics.push(format!("{}: bad option: {}", args.program(), arg));
        }
    }

    let title = title.unwrap_or_else(|| {
        std::path::Path::new(args.program())
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    });
    diagnostics.into_result(title)
}

impl Engine for DenoEngine {
    type Platform = DenoPlatform;
    type Environment = DenoEnvironment;
    type Binding = JsRuntime;
    type StopTarget = DenoStopTarget;

    fn initialize_process(&self, args: &[String]) -> Result<NormalizedArgs, Diagnostics> {
        let normalized = NormalizedArgs::split(args);

        let flags = v8_flags(&normalized.exec_args);
        if !flags.is_empty() {
            tracing::debug!("[deno_engine] Setting V8 flags: {:?}", flags);
            let mut argv = vec![normalized.program().to_string()];
            argv.extend(flags.iter().map(|flag| format!("--{}", flag.trim_start_matches('-'))));

            // V8 hands back argv[0] followed by the flags it did not recognize.
            let unrecognized: Diagnostics = deno_core::v8_set_flags(argv)
                .into_iter()
                .skip(1)
                .map(|flag| format!("unrecognized V8 flag: {}", flag))
                .collect();
            unrecognized.into_result(())?;
        }

        Ok(normalized)
    }

    fn create_platform(&self, concurrency: usize) -> Result<DenoPlatform, Diagnostics> {
        let threads = u32::try_from(concurrency)
            .map_err(|_| Diagnostics::single(format!("invalid concurrency: {}", concurrency)))?;

        let active = *V8_PLATFORM_THREADS.get_or_init(|| {
            let platform = v8::new_default_platform(threads, false).make_shared();
            JsRuntime::init_platform(Some(platform), false);
            tracing::debug!("[deno_engine] V8 platform initialized ({} threads)", threads);
            concurrency
        });

        if active != concurrency {
            tracing::warn!(
                "[deno_engine] V8 platform already runs {} worker threads, ignoring concurrency {}",
                active,
                concurrency
            );
        }

        Ok(DenoPlatform {
            concurrency: active,
        })
    }

    fn create_environment(
        &self,
        _platform: &DenoPlatform,
        args: &NormalizedArgs,
    ) -> Result<DenoEnvironment, Diagnostics> {
        let title = parse_title(args)?;

        let event_loop = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Diagnostics::single(format!("failed to build event loop: {}", e)))?;

        let mut runtime = {
            let _enter = event_loop.enter();
            let _lock = ISOLATE_CREATE_LOCK.lock();
            tracing::debug!("[deno_engine] Creating JsRuntime");
            JsRuntime::new(RuntimeOptions {
                extensions: vec![embed_runtime::init_ops_and_esm()],
                ..Default::default()
            })
        };

        {
            let op_state = runtime.op_state();
            let mut state = op_state.borrow_mut();
            state.put(ProcessInfo {
                argv: args.args.clone(),
                exec_argv: args.exec_args.clone(),
                title,
            });
            state.put(LinkRequests::default());
        }

        let (shutdown, _) = watch::channel(false);
        Ok(DenoEnvironment {
            runtime,
            event_loop,
            shutdown: Arc::new(shutdown),
            modules: HashMap::new(),
        })
    }

    fn install_exit_observer(&self, env: &mut DenoEnvironment, observer: ExitObserver) {
        let hook = ExitHook {
            observer,
            shutdown: Arc::clone(&env.shutdown),
            isolate: env.runtime.v8_isolate().thread_safe_handle(),
        };
        env.runtime.op_state().borrow_mut().put(hook);
    }

    fn register_native_module(
        &self,
        env: &mut DenoEnvironment,
        name: &'static str,
        module: NativeModule<JsRuntime>,
    ) -> Result<(), Diagnostics> {
        if env.modules.contains_key(name) {
            return Err(Diagnostics::single(format!(
                "a native module is already registered as '{}'",
                name
            )));
        }

        env.runtime
            .op_state()
            .borrow_mut()
            .borrow_mut::<LinkRequests>()
            .registered
            .insert(name.to_string());
        env.modules.insert(name, module);
        Ok(())
    }

    fn load_bootstrap(&self, env: &mut DenoEnvironment, source: &str) -> Result<(), Diagnostics> {
        let _enter = env.event_loop.enter();

        env.runtime
            .execute_script("[embedder:bootstrap]", source.to_string())
            .map_err(|e| Diagnostics::single(e.to_string()))?;

        let requested = std::mem::take(
            &mut env
                .runtime
                .op_state()
                .borrow_mut()
                .borrow_mut::<LinkRequests>()
                .requested,
        );

        for name in requested {
            let Some(module) = env.modules.remove(name.as_str()) else {
                continue;
            };
            module
                .link(&mut env.runtime)
                .map_err(|e| Diagnostics::single(format!("{:#}", e)))?;
        }

        Ok(())
    }

    fn stop_target(&self, env: &mut DenoEnvironment) -> DenoStopTarget {
        DenoStopTarget {
            shutdown: Arc::clone(&env.shutdown),
            isolate: env.runtime.v8_isolate().thread_safe_handle(),
        }
    }

    fn run_event_loop(&self, env: &mut DenoEnvironment) -> i32 {
        let mut shutdown = env.shutdown.subscribe();
        let stopped = &env.shutdown;
        let runtime = &mut env.runtime;

        env.event_loop.block_on(async {
            tokio::select! {
                biased;

                _ = shutdown.wait_for(|stopped| *stopped) => {
                    tracing::debug!("[deno_engine] Event loop stopped");
                    0
                }
                result = runtime.run_event_loop(PollEventLoopOptions::default()) => match result {
                    Ok(()) => 0,
                    // Termination surfaces as a loop error; a requested stop is not a failure.
                    Err(_) if *stopped.borrow() => 0,
                    Err(e) => {
                        tracing::error!("[deno_engine] Uncaught error: {}", e);
                        1
                    }
                },
            }
        })
    }

    fn teardown_environment(&self, env: DenoEnvironment) {
        let DenoEnvironment {
            runtime,
            event_loop,
            modules,
            ..
        } = env;

        if !modules.is_empty() {
            tracing::debug!("[deno_engine] {} native module(s) never linked", modules.len());
        }

        {
            let _enter = event_loop.enter();
            drop(runtime);
        }
        drop(event_loop);
        tracing::debug!("[deno_engine] Environment torn down");
    }

    fn teardown_platform(&self, platform: DenoPlatform) {
        // V8 cannot be initialized twice in one process; the platform stays up.
        tracing::debug!(
            "[deno_engine] Releasing platform handle ({} threads)",
            platform.concurrency
        );
    }
}
