// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{ConfigFile, PollSetting, RawConfigFile, WatchSection};
use crate::errors::{DepwatchError, Result};
use crate::types::{PollMode, WatchOptions, DEFAULT_DELAY, DEFAULT_IGNORE_PATTERN};
use crate::watch::ignore::build_globset;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = DepwatchError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch = watch_options(&raw.watch)?;
        validate_build(&raw)?;
        Ok(ConfigFile::new_unchecked(watch, raw.build))
    }
}

/// Resolve `[watch]` into `WatchOptions`, applying defaults.
pub fn watch_options(section: &WatchSection) -> Result<WatchOptions> {
    let delay = match section.delay {
        None => DEFAULT_DELAY,
        Some(ms) if ms < 0 => {
            return Err(DepwatchError::ConfigError(format!(
                "[watch].delay must be >= 0 milliseconds (got {ms})"
            )));
        }
        Some(ms) => Duration::from_millis(ms as u64),
    };

    let ignore = match &section.ignore {
        None => vec![DEFAULT_IGNORE_PATTERN.to_string()],
        Some(setting) => setting.patterns(),
    };
    // Compile once here so a bad glob is reported at load time.
    build_globset(&ignore)?;

    let poll = match section.poll {
        None | Some(PollSetting::Enabled(false)) => PollMode::Off,
        Some(PollSetting::Enabled(true)) => PollMode::On,
        Some(PollSetting::IntervalMs(ms)) if ms <= 0 => {
            return Err(DepwatchError::ConfigError(format!(
                "[watch].poll interval must be > 0 milliseconds (got {ms})"
            )));
        }
        Some(PollSetting::IntervalMs(ms)) => PollMode::Interval(Duration::from_millis(ms as u64)),
    };

    Ok(WatchOptions {
        delay,
        ignore,
        poll,
    })
}

fn validate_build(cfg: &RawConfigFile) -> Result<()> {
    if cfg.build.cmd.trim().is_empty() {
        return Err(DepwatchError::ConfigError(
            "[build].cmd must not be empty".to_string(),
        ));
    }
    if cfg.build.entries.is_empty() {
        return Err(DepwatchError::ConfigError(
            "[build].entries must list at least one file".to_string(),
        ));
    }
    Ok(())
}
