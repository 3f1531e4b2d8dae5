#![allow(dead_code)]

use std::path::PathBuf;

use webext_supervisor::config::{Binaries, BundleSettings, RunnerConfig, Settings};

/// Builder for `Settings` to simplify test setup.
///
/// Nothing is defaulted: fields left alone stay `None`, exactly like a
/// settings object that omits them.
#[derive(Default)]
pub struct SettingsBuilder {
    settings: Settings,
}

impl SettingsBuilder {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            settings: Settings {
                dir: Some(dir.into()),
                ..Settings::default()
            },
        }
    }

    /// No `dir` at all.
    pub fn without_dir() -> Self {
        Self::default()
    }

    pub fn devtools(mut self, val: bool) -> Self {
        self.settings.devtools = Some(val);
        self
    }

    pub fn target(mut self, target: &str) -> Self {
        self.settings
            .targets
            .get_or_insert_with(Vec::new)
            .push(target.to_string());
        self
    }

    pub fn firefox(mut self, path: &str) -> Self {
        self.binaries().firefox = Some(PathBuf::from(path));
        self
    }

    pub fn chromium(mut self, path: &str) -> Self {
        self.binaries().chromium = Some(PathBuf::from(path));
        self
    }

    pub fn url(mut self, url: &str) -> Self {
        self.settings.url = Some(url.to_string());
        self
    }

    pub fn bundle_filename(mut self, name: &str) -> Self {
        self.bundle().filename = Some(name.to_string());
        self
    }

    pub fn bundle_dir(mut self, dir: &str) -> Self {
        self.bundle().dir = Some(PathBuf::from(dir));
        self
    }

    pub fn build(self) -> Settings {
        self.settings
    }

    fn binaries(&mut self) -> &mut Binaries {
        self.settings.binaries.get_or_insert_with(Binaries::default)
    }

    fn bundle(&mut self) -> &mut BundleSettings {
        self.settings.bundle.get_or_insert_with(BundleSettings::default)
    }
}

/// Runner config that never waits on termination.
pub fn fast_runner() -> RunnerConfig {
    RunnerConfig {
        kill_grace_ms: 0,
        ..RunnerConfig::default()
    }
}
