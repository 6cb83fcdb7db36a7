//! Scripted engine for lifecycle tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use embed_runtime::{
    Diagnostics, EMBEDDER_BINDING, Engine, ExitObserver, NativeModule, NormalizedArgs,
    RunOptions, StopHandle, StopTarget,
};

/// What the fake engine does at each step.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub init_errors: Vec<String>,
    pub platform_errors: Vec<String>,
    pub environment_errors: Vec<String>,
    pub register_errors: Vec<String>,
    pub bootstrap_errors: Vec<String>,
    /// Block in the event loop until a stop arrives.
    pub block_in_loop: bool,
    pub loop_code: i32,
    pub stop_status: i32,
}

impl Script {
    pub fn blocking() -> Self {
        Self {
            block_in_loop: true,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<String>>,
    process_args: Mutex<Vec<String>>,
    stopped: Mutex<bool>,
    wake: Condvar,
    torn_down: AtomicBool,
    forwarded: AtomicUsize,
    late_stops: AtomicUsize,
}

#[derive(Clone)]
pub struct FakeEngine {
    script: Script,
    shared: Arc<Shared>,
}

impl FakeEngine {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            shared: Arc::new(Shared::default()),
        }
    }

    fn record(&self, event: impl Into<String>) {
        self.shared.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.shared.events.lock().unwrap().clone()
    }

    /// Arguments the last process initialization received.
    pub fn process_args(&self) -> Vec<String> {
        self.shared.process_args.lock().unwrap().clone()
    }

    pub fn saw(&self, event: &str) -> bool {
        self.events().iter().any(|e| e == event)
    }

    /// Stops forwarded to the environment.
    pub fn forwarded_stops(&self) -> usize {
        self.shared.forwarded.load(Ordering::SeqCst)
    }

    /// Stops that reached the environment after its teardown.
    pub fn late_stops(&self) -> usize {
        self.shared.late_stops.load(Ordering::SeqCst)
    }
}

fn failure(errors: &[String]) -> Result<(), Diagnostics> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.iter().cloned().collect())
    }
}

/// What native module entry points receive from the fake engine.
#[derive(Debug, Default)]
pub struct FakeBinding {
    pub exit: Option<ExitObserver>,
    pub linked: Vec<String>,
}

pub struct FakeEnvironment {
    binding: FakeBinding,
    module: Option<NativeModule<FakeBinding>>,
}

pub struct FakeStopTarget {
    shared: Arc<Shared>,
    status: i32,
}

impl StopTarget for FakeStopTarget {
    fn request_stop(&self) -> i32 {
        if self.shared.torn_down.load(Ordering::SeqCst) {
            self.shared.late_stops.fetch_add(1, Ordering::SeqCst);
        }
        self.shared.forwarded.fetch_add(1, Ordering::SeqCst);
        *self.shared.stopped.lock().unwrap() = true;
        self.shared.wake.notify_all();
        self.status
    }
}

impl Engine for FakeEngine {
    type Platform = ();
    type Environment = FakeEnvironment;
    type Binding = FakeBinding;
    type StopTarget = FakeStopTarget;

    fn initialize_process(&self, args: &[String]) -> Result<NormalizedArgs, Diagnostics> {
        self.record("initialize_process");
        *self.shared.process_args.lock().unwrap() = args.to_vec();
        failure(&self.script.init_errors)?;
        Ok(NormalizedArgs::split(args))
    }

    fn create_platform(&self, _concurrency: usize) -> Result<(), Diagnostics> {
        self.record("create_platform");
        failure(&self.script.platform_errors)
    }

    fn create_environment(
        &self,
        _platform: &(),
        _args: &NormalizedArgs,
    ) -> Result<FakeEnvironment, Diagnostics> {
        self.record("create_environment");
        failure(&self.script.environment_errors)?;
        *self.shared.stopped.lock().unwrap() = false;
        self.shared.torn_down.store(false, Ordering::SeqCst);
        Ok(FakeEnvironment {
            binding: FakeBinding::default(),
            module: None,
        })
    }

    fn install_exit_observer(&self, env: &mut FakeEnvironment, observer: ExitObserver) {
        self.record("install_exit_observer");
        env.binding.exit = Some(observer);
    }

    fn register_native_module(
        &self,
        env: &mut FakeEnvironment,
        name: &'static str,
        module: NativeModule<FakeBinding>,
    ) -> Result<(), Diagnostics> {
        self.record(format!("register:{}", name));
        failure(&self.script.register_errors)?;
        env.module = Some(module);
        Ok(())
    }

    fn load_bootstrap(&self, env: &mut FakeEnvironment, source: &str) -> Result<(), Diagnostics> {
        self.record("load_bootstrap");
        failure(&self.script.bootstrap_errors)?;
        if !source.contains(EMBEDDER_BINDING) {
            return Err(Diagnostics::single("bootstrap does not link the binding"));
        }
        if let Some(module) = env.module.take() {
            let name = module.name().to_string();
            module
                .link(&mut env.binding)
                .map_err(|e| Diagnostics::single(e.to_string()))?;
            env.binding.linked.push(name);
        }
        Ok(())
    }

    fn stop_target(&self, _env: &mut FakeEnvironment) -> FakeStopTarget {
        FakeStopTarget {
            shared: Arc::clone(&self.shared),
            status: self.script.stop_status,
        }
    }

    fn run_event_loop(&self, _env: &mut FakeEnvironment) -> i32 {
        self.record("run_event_loop");
        if self.script.block_in_loop {
            let stopped = self.shared.stopped.lock().unwrap();
            let (_stopped, timeout) = self
                .shared
                .wake
                .wait_timeout_while(stopped, Duration::from_secs(10), |stopped| !*stopped)
                .unwrap();
            assert!(!timeout.timed_out(), "event loop was never stopped");
        }
        self.script.loop_code
    }

    fn teardown_environment(&self, _env: FakeEnvironment) {
        self.shared.torn_down.store(true, Ordering::SeqCst);
        self.record("teardown_environment");
    }

    fn teardown_platform(&self, _platform: ()) {
        self.record("teardown_platform");
    }

    fn teardown_process(&self) {
        self.record("teardown_process");
    }
}

pub fn noop_module() -> NativeModule<FakeBinding> {
    NativeModule::new("host", |_: &mut FakeBinding| Ok(()))
}

pub fn options(module: NativeModule<FakeBinding>) -> RunOptions<FakeBinding> {
    RunOptions::new(module)
        .args(["host", "main.js"])
        .insert_default_process_arg(false)
}

/// Wait until a session is published.
pub fn wait_until_running(handle: &StopHandle) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !handle.is_running() {
        assert!(Instant::now() < deadline, "session never started running");
        std::thread::sleep(Duration::from_millis(1));
    }
}
