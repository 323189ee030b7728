// src/logging.rs

//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `RESULTSTRACKER_LOG` environment variable (`EnvFilter` directives,
//!    e.g. "info,resultstracker::engine=debug")
//! 3. the first directive line of the logging config file
//!    (`[resultstracker].logging`), if that file exists and the line is a
//!    plain `level` / `target=level` list; anything else (an INI logging
//!    config, for instance) is reported and ignored
//! 4. default to `info`
//!
//! Logs are sent to STDERR.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::{EnvFilter, fmt};

use crate::cli::LogLevel;

pub const LOG_ENV_VAR: &str = "RESULTSTRACKER_LOG";

const LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Initialise the global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, logging_config: &Path) -> Result<()> {
    let mut rejected = None;
    let directives = match cli_level {
        Some(lvl) => level_directive(lvl).to_string(),
        None => std::env::var(LOG_ENV_VAR)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| match read_config_directive(logging_config) {
                Ok(directive) => directive,
                Err(line) => {
                    rejected = Some(line);
                    None
                }
            })
            .unwrap_or_else(|| "info".to_string()),
    };

    let filter = EnvFilter::try_new(&directives)
        .with_context(|| format!("invalid log filter '{directives}'"))?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    if let Some(line) = rejected {
        warn!(
            file = %logging_config.display(),
            %line,
            "logging config is not a filter directive; using 'info'"
        );
    }

    Ok(())
}

fn level_directive(lvl: LogLevel) -> &'static str {
    match lvl {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    }
}

fn read_config_directive(path: &Path) -> std::result::Result<Option<String>, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => directive_from_config(&contents),
        Err(_) => Ok(None),
    }
}

/// First line that is neither blank nor a `#` comment.
///
/// `Err` carries that line when it is not a filter directive.
pub fn directive_from_config(contents: &str) -> std::result::Result<Option<String>, String> {
    let Some(line) = contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
    else {
        return Ok(None);
    };
    if is_filter_directive(line) {
        Ok(Some(line.to_string()))
    } else {
        Err(line.to_string())
    }
}

/// Comma-separated `level` or `target=level` parts.
fn is_filter_directive(line: &str) -> bool {
    let is_level = |s: &str| LEVELS.iter().any(|l| l.eq_ignore_ascii_case(s));
    let is_target = |s: &str| {
        !s.is_empty()
            && s.chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
    };
    line.split(',').map(str::trim).all(|part| match part.split_once('=') {
        Some((target, level)) => is_target(target.trim()) && is_level(level.trim()),
        None => is_level(part),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_comments_and_blank_lines() {
        let contents = "# resultstracker logging\n\n  warn,resultstracker::engine=debug  \ninfo\n";
        assert_eq!(
            directive_from_config(contents),
            Ok(Some("warn,resultstracker::engine=debug".to_string()))
        );
    }

    #[test]
    fn empty_config_has_no_directive() {
        assert_eq!(directive_from_config("# nothing here\n"), Ok(None));
    }

    #[test]
    fn missing_file_has_no_directive() {
        assert_eq!(
            read_config_directive(Path::new("/nonexistent/logging.resultstracker.conf")),
            Ok(None)
        );
    }

    #[test]
    fn ini_logging_config_is_rejected() {
        let contents = "[loggers]\nkeys=root\n\n[handlers]\nkeys=consoleHandler\n\n\
                        [logger_root]\nlevel=DEBUG\nhandlers=consoleHandler\n";
        assert_eq!(directive_from_config(contents), Err("[loggers]".to_string()));
    }

    #[test]
    fn directive_shapes() {
        assert!(is_filter_directive("info"));
        assert!(is_filter_directive("WARN"));
        assert!(is_filter_directive("warn,resultstracker::engine=debug"));
        assert!(is_filter_directive("hyper-util=off, my.mod=trace"));
        assert!(!is_filter_directive("keys=root"));
        assert!(!is_filter_directive("level=DEBUG extra"));
        assert!(!is_filter_directive("resultstracker"));
        assert!(!is_filter_directive("info,"));
    }

    #[test]
    fn ini_file_on_disk_falls_back() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), "[loggers]\nkeys=root\n").unwrap();
        assert_eq!(read_config_directive(tmp.path()), Err("[loggers]".to_string()));
    }
}
