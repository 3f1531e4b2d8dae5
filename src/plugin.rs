// src/plugin.rs

//! Build-tool lifecycle glue.
//!
//! A bundler calls [`WebextPlugin::write_bundle`] after every bundle it writes
//! and [`WebextPlugin::close_watcher`] once when its watch session ends. The
//! plugin merges the per-call output directory into its settings and forwards
//! to the [`Supervisor`].

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::{RunnerConfig, Settings};
use crate::engine::{OneShotBuild, Supervisor, TaskHandle};
use crate::errors::Result;
use crate::exec::Launcher;

/// Name the plugin registers under.
pub const PLUGIN_NAME: &str = "webext";

/// What a `write_bundle` call started.
#[derive(Debug)]
pub enum BundleOutcome {
    /// Watch mode: a queued spawn-or-reload. Awaiting it is optional.
    Reload(TaskHandle<()>),
    /// Build mode: the detached packaging run (`None` once killed).
    Build(Option<OneShotBuild>),
}

#[derive(Debug, Clone)]
pub struct WebextPlugin {
    settings: Settings,
    supervisor: Supervisor,
}

impl WebextPlugin {
    /// Plugin backed by real runner processes. Defaults are applied to
    /// `settings` (devtools on, `firefox-desktop` target).
    pub fn new(settings: Settings, runner: RunnerConfig) -> Self {
        Self::with_supervisor(settings, Supervisor::with_process_launcher(runner))
    }

    /// Plugin backed by a custom launcher.
    pub fn with_launcher(
        settings: Settings,
        runner: RunnerConfig,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self::with_supervisor(settings, Supervisor::new(runner, launcher))
    }

    pub fn with_supervisor(settings: Settings, supervisor: Supervisor) -> Self {
        Self {
            settings: settings.with_defaults(),
            supervisor,
        }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    /// Settings after defaults were applied.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Hook: a bundle was written to `output_dir`.
    ///
    /// Fails with `Missing dir setting` when neither the settings nor the
    /// call provide a directory.
    pub fn write_bundle(
        &self,
        output_dir: Option<&Path>,
        watch_mode: bool,
    ) -> Result<BundleOutcome> {
        let merged = self.settings.merged_with_output_dir(output_dir);
        merged.source_dir()?;

        if watch_mode {
            debug!(dir = ?merged.dir, "bundle written in watch mode; queueing update");
            Ok(BundleOutcome::Reload(self.supervisor.update(merged)))
        } else {
            debug!(dir = ?merged.dir, "bundle written; starting one-shot build");
            Ok(BundleOutcome::Build(self.supervisor.build(&merged)?))
        }
    }

    /// Hook: the host's watch session is closing. Call at most once.
    pub async fn close_watcher(&self) -> Result<()> {
        self.supervisor.kill().await
    }
}
