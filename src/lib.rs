// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod host;
pub mod logging;
pub mod plugin;
pub mod signals;
pub mod watch;

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::{ConfigFile, Settings};
use crate::engine::WATCH_FILE_NAME;
use crate::exec::{build_args, run_args};
use crate::host::{HostEvent, HostRuntime};
use crate::plugin::{BundleOutcome, WebextPlugin};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the plugin / supervisor pair
/// - (watch mode) the file watcher and the host event loop
/// - Ctrl-C / SIGTERM handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg)?;
        return Ok(());
    }

    let plugin = WebextPlugin::new(cfg.settings.clone(), cfg.runner.clone());

    if args.watch {
        run_watch(plugin).await
    } else {
        run_build(&plugin).await
    }
}

/// One-shot packaging: start the build and wait for the runner to finish.
async fn run_build(plugin: &WebextPlugin) -> Result<()> {
    let BundleOutcome::Build(Some(build)) = plugin.write_bundle(None, false)? else {
        warn!("no build was started");
        return Ok(());
    };

    let summary = build.wait().await?;
    if !summary.success {
        bail!("runner build failed (exit code {:?})", summary.code);
    }
    info!("extension packaged");
    Ok(())
}

/// Live session: reload the browser on every change until interrupted.
async fn run_watch(plugin: WebextPlugin) -> Result<()> {
    let source_dir = plugin.settings().source_dir()?.to_path_buf();

    let (host_tx, host_rx) = mpsc::channel::<HostEvent>(16);

    let _watcher_handle =
        watch::spawn_watcher(&source_dir, watch::DEFAULT_DEBOUNCE, host_tx.clone())?;

    {
        let tx = host_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = signals::wait_for_shutdown_signal().await {
                eprintln!("failed to listen for shutdown signals: {e}");
                return;
            }
            let _ = tx.send(HostEvent::ShutdownRequested).await;
        });
    }

    // The bundle already on disk starts the session.
    host_tx.send(HostEvent::BundleWritten).await?;

    let runtime = HostRuntime::new(plugin, host_rx, true);
    runtime.run().await?;
    Ok(())
}

/// Print both runner invocations without spawning anything.
fn print_dry_run(cfg: &ConfigFile) -> Result<()> {
    let settings: Settings = cfg.settings.clone().with_defaults();
    let placeholder = Path::new("<session-dir>").join(WATCH_FILE_NAME);

    println!("webext-supervisor dry-run");
    println!("  runner.binary = {}", cfg.runner.binary);
    println!("  runner.kill_grace_ms = {}", cfg.runner.kill_grace_ms);
    println!();

    let run = run_args(&settings, &placeholder)?;
    println!("watch mode:");
    println!("  {} {}", cfg.runner.binary, join_args(&run));

    let build = build_args(&settings)?;
    println!("build mode:");
    println!("  {} {}", cfg.runner.binary, join_args(&build));

    debug!("dry-run complete (no execution)");
    Ok(())
}

fn join_args(args: &[std::ffi::OsString]) -> String {
    args.iter()
        .map(|a| a.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
