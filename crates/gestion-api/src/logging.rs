//! Tracing subscriber setup.
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `LOG_FORMAT` | `json` for one JSON object per line, anything else for text |
//! | `LOG_FILE` | write to a daily-rotated file at this path instead of stdout |
//! | `LOG_ANSI` | force colors on (`true`/`1`) or off; files default to off |
//! | `RUST_LOG` | env filter, default [`DEFAULT_FILTER`] |

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub const DEFAULT_FILTER: &str = "gestion_api=debug,gestion_inference=debug,tower_http=debug";

const DEFAULT_LOG_FILE: &str = "gestion-api.log";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub json: bool,
    pub file: Option<PathBuf>,
    pub ansi: Option<bool>,
}

impl LogSettings {
    pub fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        Self {
            json: var("LOG_FORMAT").is_some_and(|v| v.eq_ignore_ascii_case("json")),
            file: var("LOG_FILE").map(PathBuf::from),
            ansi: var("LOG_ANSI").map(|v| v == "true" || v == "1"),
        }
    }

    /// Colors only where a terminal is likely unless overridden.
    pub fn use_ansi(&self) -> bool {
        self.ansi.unwrap_or(self.file.is_none())
    }

    fn split_file(path: &Path) -> (PathBuf, OsString) {
        let dir = path
            .parent()
            .filter(|d| !d.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
            .to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.into());
        (dir, name)
    }
}

/// Install the global subscriber.
///
/// Output goes through a non-blocking writer; keep the guard alive until
/// exit or buffered lines are lost.
pub fn init_tracing() -> WorkerGuard {
    let settings = LogSettings::from_lookup(|key| std::env::var(key).ok());

    let (writer, guard) = match &settings.file {
        Some(path) => {
            let (dir, name) = LogSettings::split_file(path);
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, name))
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let json_layer = settings
        .json
        .then(|| fmt::layer().json().with_writer(writer.clone()));
    let text_layer = (!settings.json).then(|| {
        fmt::layer()
            .with_writer(writer)
            .with_ansi(settings.use_ansi())
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();

    info!(
        json = settings.json,
        file = ?settings.file,
        "Logging initialized"
    );
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> LogSettings {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        LogSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults_to_colored_text_on_stdout() {
        let s = settings(&[]);
        assert!(!s.json);
        assert!(s.file.is_none());
        assert!(s.use_ansi());
    }

    #[test]
    fn test_file_output_disables_ansi_unless_forced() {
        let s = settings(&[("LOG_FILE", "/var/log/gestion/api.log"), ("LOG_FORMAT", "JSON")]);
        assert!(s.json);
        assert!(!s.use_ansi());

        let s = settings(&[("LOG_FILE", "api.log"), ("LOG_ANSI", "1")]);
        assert!(s.use_ansi());
    }

    #[test]
    fn test_split_file() {
        let (dir, name) = LogSettings::split_file(Path::new("/var/log/gestion/api.log"));
        assert_eq!(dir, PathBuf::from("/var/log/gestion"));
        assert_eq!(name, OsString::from("api.log"));

        let (dir, name) = LogSettings::split_file(Path::new("api.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, OsString::from("api.log"));
    }
}
