//! Ops backing the JavaScript surface of an embedded environment.
//!
//! Per-environment state lives in `OpState`: [`ProcessInfo`] for `process.*`,
//! [`ExitHook`] for `process.exit`, and [`LinkRequests`] for
//! `__embedder.linkedBinding`.

use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use deno_core::error::{AnyError, generic_error};
use deno_core::op2;
use deno_core::v8;
use deno_core::{CancelFuture, CancelHandle, OpState, Resource, ResourceId};
use serde::Serialize;
use tokio::sync::watch;

use crate::deno::resolve::{self, ResolvedModule};
use crate::engine::ExitObserver;

/// What scripts see as `process.argv`, `process.execArgv` and `process.title`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessInfo {
    pub argv: Vec<String>,
    pub exec_argv: Vec<String>,
    pub title: String,
}

/// Completes the exit observer and shuts the environment down.
pub struct ExitHook {
    pub observer: ExitObserver,
    pub shutdown: Arc<watch::Sender<bool>>,
    pub isolate: v8::IsolateHandle,
}

/// Native modules the bootstrap may link, and the links it asked for.
#[derive(Debug, Default)]
pub struct LinkRequests {
    pub registered: HashSet<String>,
    /// Every name ever requested; a binding links at most once.
    pub linked: HashSet<String>,
    /// Requests not yet handed to the engine.
    pub requested: Vec<String>,
}

impl LinkRequests {
    pub fn request(&mut self, name: String) -> Result<(), String> {
        if !self.registered.contains(&name) {
            return Err(format!("No such binding: {}", name));
        }
        if !self.linked.insert(name.clone()) {
            return Err(format!("Binding already linked: {}", name));
        }
        self.requested.push(name);
        Ok(())
    }
}

/// Cancels the pending sleep of one timer.
struct TimerResource(Rc<CancelHandle>);

impl Resource for TimerResource {
    fn name(&self) -> Cow<str> {
        "timer".into()
    }

    fn close(self: Rc<Self>) {
        self.0.cancel();
    }
}

#[op2(fast)]
pub fn op_embed_log(#[string] level: &str, #[string] msg: &str) {
    match level {
        "error" => tracing::error!("[js] {}", msg),
        "warn" => tracing::warn!("[js] {}", msg),
        "debug" => tracing::debug!("[js] {}", msg),
        "trace" => tracing::trace!("[js] {}", msg),
        _ => tracing::info!("[js] {}", msg),
    }
}

#[op2(fast)]
#[smi]
pub fn op_embed_timer_open(state: &mut OpState) -> ResourceId {
    state
        .resource_table
        .add(TimerResource(CancelHandle::new_rc()))
}

/// Cancel a timer. A cancelled sleep resolves at once and no longer keeps
/// the event loop alive.
#[op2(fast)]
pub fn op_embed_timer_close(state: &mut OpState, #[smi] rid: ResourceId) {
    if let Ok(timer) = state.resource_table.take::<TimerResource>(rid) {
        timer.0.cancel();
    }
}

/// Timer primitive. Resolves to `false` if the timer was cancelled.
/// Negative and non-finite delays resolve immediately.
#[op2(async)]
pub async fn op_embed_sleep(
    state: Rc<RefCell<OpState>>,
    delay: f64,
    #[smi] rid: ResourceId,
) -> Result<bool, AnyError> {
    let cancel = {
        let state = state.borrow();
        Rc::clone(&state.resource_table.get::<TimerResource>(rid)?.0)
    };

    let sleep = tokio::time::sleep(std::time::Duration::from_millis(delay as u64));
    Ok(sleep.or_cancel(cancel).await.is_ok())
}

#[op2(fast)]
pub fn op_embed_exit(state: &mut OpState, #[smi] code: i32) {
    let Some(hook) = state.try_borrow::<ExitHook>() else {
        tracing::warn!("[js] process.exit({}) without an exit hook", code);
        return;
    };

    if hook.observer.complete(code) {
        tracing::debug!("[js] process.exit({})", code);
    }
    hook.shutdown.send_replace(true);
    hook.isolate.terminate_execution();
}

#[op2]
#[string]
pub fn op_embed_cwd() -> Result<String, AnyError> {
    let cwd = std::env::current_dir()?;
    Ok(cwd.to_string_lossy().into_owned())
}

#[op2]
#[serde]
pub fn op_embed_process_info(state: &mut OpState) -> ProcessInfo {
    state.borrow::<ProcessInfo>().clone()
}

/// Resolve and read a CommonJS module.
///
/// `referrer` is the requiring module's filename, or a directory with a
/// trailing separator.
#[op2]
#[serde]
pub fn op_embed_resolve(
    #[string] specifier: String,
    #[string] referrer: String,
) -> Result<ResolvedModule, AnyError> {
    let referrer_path = Path::new(&referrer);
    let base = if referrer.ends_with('/') || referrer.ends_with(std::path::MAIN_SEPARATOR) {
        referrer_path
    } else {
        referrer_path.parent().unwrap_or(referrer_path)
    };

    resolve::load(&specifier, base).map_err(|e| generic_error(e.to_string()))
}

/// Queue a native module link. The engine runs the entry point once the
/// bootstrap script has returned.
#[op2(fast)]
pub fn op_embed_link(state: &mut OpState, #[string] name: String) -> Result<(), AnyError> {
    state
        .borrow_mut::<LinkRequests>()
        .request(name)
        .map_err(generic_error)
}

deno_core::extension!(
    embed_runtime,
    ops = [
        op_embed_log,
        op_embed_timer_open,
        op_embed_timer_close,
        op_embed_sleep,
        op_embed_exit,
        op_embed_cwd,
        op_embed_process_info,
        op_embed_resolve,
        op_embed_link,
    ],
    esm_entry_point = "ext:embed_runtime/runtime.js",
    esm = [dir "src/deno", "runtime.js"],
);
