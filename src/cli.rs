// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `webext-supervisor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "webext-supervisor",
    version,
    about = "Run or package a browser extension through the web-ext runner.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `Webext.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Webext.toml")]
    pub config: String,

    /// Launch a live browser and reload it whenever the source directory
    /// changes. Without this flag a one-shot packaging build is run.
    #[arg(long)]
    pub watch: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `WEBEXT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the runner invocations, but don't spawn anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_build_mode_with_default_config() {
        let args = CliArgs::try_parse_from(["webext-supervisor"]).unwrap();
        assert_eq!(args.config, "Webext.toml");
        assert!(!args.watch);
        assert!(!args.dry_run);
        assert!(args.log_level.is_none());
    }

    #[test]
    fn accepts_watch_and_log_level() {
        let args = CliArgs::try_parse_from([
            "webext-supervisor",
            "--watch",
            "--log-level",
            "debug",
            "--config",
            "conf/ext.toml",
        ])
        .unwrap();
        assert!(args.watch);
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert_eq!(args.config, "conf/ext.toml");
    }
}
