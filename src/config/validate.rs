// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.runner, raw.settings))
    }
}

/// Run every semantic check on a raw config.
pub fn validate_config(cfg: &RawConfigFile) -> Result<()> {
    validate_runner(cfg)?;
    validate_targets(cfg)?;
    validate_bundle(cfg)?;
    Ok(())
}

fn validate_runner(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runner.binary.trim().is_empty() {
        return Err(SupervisorError::ConfigError(
            "[runner].binary must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_targets(cfg: &RawConfigFile) -> Result<()> {
    let Some(targets) = cfg.settings.targets.as_ref() else {
        return Ok(());
    };

    if targets.is_empty() {
        return Err(SupervisorError::ConfigError(
            "[settings].targets must list at least one target (omit it to use the default)"
                .to_string(),
        ));
    }

    if let Some(pos) = targets.iter().position(|t| t.trim().is_empty()) {
        return Err(SupervisorError::ConfigError(format!(
            "[settings].targets[{pos}] is empty"
        )));
    }

    Ok(())
}

fn validate_bundle(cfg: &RawConfigFile) -> Result<()> {
    let filename = cfg
        .settings
        .bundle
        .as_ref()
        .and_then(|b| b.filename.as_deref());

    if let Some(name) = filename {
        if name.trim().is_empty() {
            return Err(SupervisorError::ConfigError(
                "[settings.bundle].filename must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{BundleSettings, Settings};

    #[test]
    fn empty_target_list_is_rejected() {
        let raw = RawConfigFile {
            settings: Settings {
                targets: Some(vec![]),
                ..Settings::default()
            },
            ..RawConfigFile::default()
        };

        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, SupervisorError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn blank_target_reports_its_index() {
        let raw = RawConfigFile {
            settings: Settings {
                targets: Some(vec!["chromium".into(), " ".into()]),
                ..Settings::default()
            },
            ..RawConfigFile::default()
        };

        let err = ConfigFile::try_from(raw).unwrap_err();
        assert!(matches!(err, SupervisorError::ConfigError(msg) if msg.contains("targets[1]")));
    }

    #[test]
    fn blank_bundle_filename_is_rejected() {
        let raw = RawConfigFile {
            settings: Settings {
                bundle: Some(BundleSettings {
                    filename: Some(String::new()),
                    dir: None,
                }),
                ..Settings::default()
            },
            ..RawConfigFile::default()
        };

        assert!(ConfigFile::try_from(raw).is_err());
    }

    #[test]
    fn missing_dir_is_allowed_at_load_time() {
        let cfg = ConfigFile::try_from(RawConfigFile::default()).unwrap();
        assert!(cfg.settings.dir.is_none());
        assert_eq!(cfg.runner.binary, "web-ext");
    }
}
