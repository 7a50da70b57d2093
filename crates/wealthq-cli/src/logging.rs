// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::Config;

pub const LOG_ENV: &str = "WEALTHQ_LOG";

/// Sends tracing output to the configured log file. The terminal belongs to
/// the TUI, so nothing is written to stdout or stderr.
pub fn init(config: &Config) -> Result<PathBuf> {
    let path = config.log_path()?;
    let filter = build_filter(config.log_level())?;
    let file = open_log_file(&path)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(false),
        )
        .try_init()
        .context("install tracing subscriber")?;
    Ok(path)
}

fn build_filter(configured_level: &str) -> Result<EnvFilter> {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(configured_level))
        .with_context(|| {
            format!("invalid log filter; fix {LOG_ENV} or [log].level ({configured_level:?})")
        })
}

fn open_log_file(path: &Path) -> Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| {
            format!(
                "open log file {}; set [log].path to a writable location",
                path.display()
            )
        })
}

#[cfg(test)]
mod tests {
    use super::{build_filter, open_log_file};
    use anyhow::Result;
    use std::io::Write;

    #[test]
    fn open_log_file_creates_parent_directories_and_appends() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("wealthq.log");

        writeln!(open_log_file(&path)?, "first")?;
        writeln!(open_log_file(&path)?, "second")?;

        assert_eq!(std::fs::read_to_string(&path)?, "first\nsecond\n");
        Ok(())
    }

    #[test]
    fn configured_level_builds_a_filter() -> Result<()> {
        let filter = build_filter("debug")?;
        assert!(filter.to_string().contains("debug"));
        Ok(())
    }
}
