// src/config/model.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::{Result, SupervisorError};

/// Target used when the caller does not name any.
pub const DEFAULT_TARGET: &str = "firefox-desktop";

/// Program spawned when `[runner].binary` is not set.
pub const DEFAULT_BINARY: &str = "web-ext";

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runner]
/// binary = "web-ext"
/// kill_grace_ms = 3000
///
/// [settings]
/// dir = "dist"
/// targets = ["firefox-desktop"]
///
/// [settings.bundle]
/// filename = "ext.zip"
/// ```
///
/// Both sections are optional. Only `settings.dir` is eventually required,
/// and even that can be supplied per call by the host (see
/// [`Settings::merged_with_output_dir`]).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub settings: Settings,
}

/// Validated configuration. Build it through `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runner: RunnerConfig,
    pub settings: Settings,
}

impl ConfigFile {
    /// Used by the validator once all checks have passed.
    pub(crate) fn new_unchecked(runner: RunnerConfig, settings: Settings) -> Self {
        Self { runner, settings }
    }
}

/// `[runner]` section: how the external binary is invoked and torn down.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RunnerConfig {
    /// Program to execute, looked up on `PATH` when not absolute.
    #[serde(default = "default_binary")]
    pub binary: String,

    /// How long to wait for the runner to exit after SIGTERM before it is
    /// force-killed. `0` force-kills immediately.
    #[serde(default = "default_kill_grace_ms")]
    pub kill_grace_ms: u64,

    /// Prefix of the per-session temporary directory.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
}

fn default_binary() -> String {
    DEFAULT_BINARY.to_string()
}

fn default_kill_grace_ms() -> u64 {
    3000
}

fn default_temp_prefix() -> String {
    "webext-supervisor-".to_string()
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            kill_grace_ms: default_kill_grace_ms(),
            temp_prefix: default_temp_prefix(),
        }
    }
}

impl RunnerConfig {
    pub fn kill_grace(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }
}

/// `[settings]` section: everything that ends up on the runner's command line.
///
/// Every field is optional; an absent field never emits its flag.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Extension source directory (the bundle output directory).
    pub dir: Option<PathBuf>,

    /// Open the browser devtools on launch (`--devtools`).
    pub devtools: Option<bool>,

    /// Browsers to launch, one `--target` each, in order.
    pub targets: Option<Vec<String>>,

    pub binaries: Option<Binaries>,

    /// Page to open on launch (`--start-url`).
    pub url: Option<String>,

    /// Packaging options, only used by one-shot builds.
    pub bundle: Option<BundleSettings>,
}

/// `[settings.binaries]`: explicit browser executables.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Binaries {
    pub firefox: Option<PathBuf>,
    pub chromium: Option<PathBuf>,
}

/// `[settings.bundle]`: artifact naming and location.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BundleSettings {
    pub filename: Option<String>,
    pub dir: Option<PathBuf>,
}

impl Settings {
    /// Fill in the plugin-level defaults: devtools on, a single Firefox
    /// desktop target.
    pub fn with_defaults(mut self) -> Self {
        if self.devtools.is_none() {
            self.devtools = Some(true);
        }
        if self.targets.is_none() {
            self.targets = Some(vec![DEFAULT_TARGET.to_string()]);
        }
        self
    }

    /// Merge a per-call output directory into these settings.
    ///
    /// An explicit `dir` in the settings wins; `output_dir` is only the
    /// fallback.
    pub fn merged_with_output_dir(&self, output_dir: Option<&Path>) -> Settings {
        let mut merged = self.clone();
        if merged.dir.is_none() {
            merged.dir = output_dir.map(Path::to_path_buf);
        }
        merged
    }

    /// The configured source directory, or a config error if there is none.
    pub fn source_dir(&self) -> Result<&Path> {
        match self.dir.as_deref() {
            Some(dir) if !dir.as_os_str().is_empty() => Ok(dir),
            _ => Err(SupervisorError::ConfigError("Missing dir setting".to_string())),
        }
    }

    pub fn devtools_enabled(&self) -> bool {
        self.devtools.unwrap_or(false)
    }
}
