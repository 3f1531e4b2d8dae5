// src/exec/args.rs

//! Argument vectors for the extension runner.
//!
//! This is the wire contract with the external binary, so the flag order is
//! fixed:
//!
//! ```text
//! run   --watch-file <path> --no-input --source-dir <dir>
//!       [--devtools] [--firefox-binary <p>] [--chromium-binary <p>]
//!       [--target <t>]* [--start-url <u>]
//! build --no-input --overwrite-dest --source-dir <dir>
//!       [--filename <f>] [--artifacts-dir <dir>]
//! ```

use std::ffi::OsString;
use std::path::{Component, Path, PathBuf};

use crate::config::Settings;
use crate::errors::Result;

/// Which subcommand the runner is invoked with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerMode {
    /// Live browser session, reloaded through the watch file.
    Run,
    /// One-shot packaging of the extension.
    Build,
}

impl RunnerMode {
    pub fn subcommand(self) -> &'static str {
        match self {
            RunnerMode::Run => "run",
            RunnerMode::Build => "build",
        }
    }
}

/// Arguments for a watch-mode session.
pub fn run_args(settings: &Settings, watch_file: &Path) -> Result<Vec<OsString>> {
    let source_dir = resolve_dir(settings.source_dir()?)?;

    let mut args: Vec<OsString> = vec![
        RunnerMode::Run.subcommand().into(),
        "--watch-file".into(),
        watch_file.as_os_str().to_owned(),
        "--no-input".into(),
        "--source-dir".into(),
        source_dir.into_os_string(),
    ];

    if settings.devtools_enabled() {
        args.push("--devtools".into());
    }

    if let Some(binaries) = &settings.binaries {
        if let Some(firefox) = &binaries.firefox {
            args.push("--firefox-binary".into());
            args.push(firefox.as_os_str().to_owned());
        }
        if let Some(chromium) = &binaries.chromium {
            args.push("--chromium-binary".into());
            args.push(chromium.as_os_str().to_owned());
        }
    }

    for target in settings.targets.iter().flatten() {
        args.push("--target".into());
        args.push(target.into());
    }

    if let Some(url) = &settings.url {
        args.push("--start-url".into());
        args.push(url.into());
    }

    Ok(args)
}

/// Arguments for a one-shot packaging build.
pub fn build_args(settings: &Settings) -> Result<Vec<OsString>> {
    let source_dir = resolve_dir(settings.source_dir()?)?;

    let mut args: Vec<OsString> = vec![
        RunnerMode::Build.subcommand().into(),
        "--no-input".into(),
        "--overwrite-dest".into(),
        "--source-dir".into(),
        source_dir.into_os_string(),
    ];

    if let Some(bundle) = &settings.bundle {
        if let Some(filename) = &bundle.filename {
            args.push("--filename".into());
            args.push(filename.into());
        }
        if let Some(dir) = &bundle.dir {
            args.push("--artifacts-dir".into());
            args.push(resolve_dir(dir)?.into_os_string());
        }
    }

    Ok(args)
}

/// Make `dir` absolute against the current working directory and normalise
/// it: `.` segments and trailing separators are dropped, `..` pops the
/// previous segment.
///
/// Purely lexical: symlinks are not followed and the directory does not
/// have to exist yet.
pub fn resolve_dir(dir: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(dir)?;
    Ok(normalize_lexically(&absolute))
}

fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            // `pop` never removes the root, so `/..` stays `/`.
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
