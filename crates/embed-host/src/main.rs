//! Embed Host
//!
//! Runs a CommonJS script in an embedded JavaScript environment. Ctrl-C and
//! the optional timeout stop the environment from a watcher thread.

mod config;

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use embed_runtime::deno_core::JsRuntime;
use embed_runtime::{DenoEngine, Embedder, NativeModule, RunOptions, StopHandle};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::HostConfig;

/// Run a script in an embedded JavaScript environment
#[derive(Parser, Debug)]
#[command(name = "embed-host")]
#[command(about = "Run a script in an embedded JavaScript environment", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop the script after this many milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Worker threads in the engine platform
    #[arg(long)]
    concurrency: Option<usize>,

    /// Engine option placed before the script (repeatable), e.g. --engine-option=--title=worker
    #[arg(long = "engine-option", value_name = "OPTION", allow_hyphen_values = true)]
    engine_options: Vec<String>,

    /// Script to run
    script: PathBuf,

    /// Arguments visible to the script as process.argv[2..]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    script_args: Vec<String>,
}

/// Native module whose entry point requires the script.
fn host_module(script: PathBuf) -> NativeModule<JsRuntime> {
    NativeModule::new("embed-host", move |runtime: &mut JsRuntime| {
        let specifier = serde_json::to_string(&script.to_string_lossy())?;
        runtime.execute_script("[embed-host:main]", format!("require({});", specifier))?;
        Ok(())
    })
}

/// Stop the environment on Ctrl-C or when the timeout elapses.
fn spawn_watcher(handle: StopHandle, timeout: Option<Duration>) -> Result<()> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build watcher runtime")?;

    thread::Builder::new()
        .name("embed-host-watcher".to_string())
        .spawn(move || {
            rt.block_on(async {
                let timeout = async {
                    match timeout {
                        Some(timeout) => tokio::time::sleep(timeout).await,
                        None => std::future::pending::<()>().await,
                    }
                };

                tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        if let Err(e) = signal {
                            warn!("Failed to listen for Ctrl-C: {}", e);
                            return;
                        }
                        info!("Interrupted, stopping");
                    }
                    _ = timeout => {
                        info!("Timeout elapsed, stopping");
                    }
                }

                let status = handle.stop();
                if let Err(e) = status.into_result() {
                    warn!("{}", e);
                }
            })
        })
        .context("failed to spawn watcher thread")?;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = HostConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency;
    }
    if args.timeout_ms.is_some() {
        config.timeout_ms = args.timeout_ms;
    }
    config.engine_options.extend(args.engine_options);

    // Logs go to stderr; stdout belongs to the script.
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let script = std::fs::canonicalize(&args.script)
        .with_context(|| format!("script not found: {}", args.script.display()))?;

    let embedder = Embedder::new(DenoEngine::new()).with_config(config.platform());
    spawn_watcher(
        embedder.stop_handle(),
        config.timeout_ms.map(Duration::from_millis),
    )?;

    let mut process_args = config.engine_options.clone();
    process_args.push(script.display().to_string());
    process_args.extend(args.script_args);

    info!("Running {}", script.display());
    let result = embedder.run(RunOptions::new(host_module(script)).args(process_args));

    if let Some(e) = &result.error {
        error!("{}", e);
    }
    info!("Exited with code {}", result.exit_code);
    std::process::exit(result.exit_code);
}
