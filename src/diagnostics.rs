//! Diagnostics for the counter.
//!
//! Provides:
//! - **About info**: version, platform and architecture
//! - **Diagnostics export**: a zip bundle with about info, a redacted
//!   settings snapshot and the recent log files
//! - **Log rotation helpers**: used by `lib.rs` to configure rolling log files.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::settings::Settings;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum number of log files to retain.
pub const MAX_LOG_FILES: usize = 10;

/// Per-file cap when copying logs into a diagnostics bundle (5 MB).
pub const MAX_LOG_SIZE: u64 = 5 * 1024 * 1024;

/// File name prefix used by the rolling appender.
pub const LOG_FILE_PREFIX: &str = "pos";

const APP_ID: &str = "com.syndicate.pos";
const REDACTED: &str = "[REDACTED]";

#[derive(Debug, Error)]
pub enum DiagnosticsError {
    #[error("Diagnostics I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode diagnostics: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Failed to write diagnostics archive: {0}")]
    Archive(#[from] zip::result::ZipError),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> DiagnosticsError + '_ {
    move |source| DiagnosticsError::Io {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// About info
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutInfo {
    pub name: &'static str,
    pub version: &'static str,
    pub platform: &'static str,
    pub arch: &'static str,
}

pub fn about_info() -> AboutInfo {
    AboutInfo {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        platform: std::env::consts::OS,
        arch: std::env::consts::ARCH,
    }
}

// ---------------------------------------------------------------------------
// Diagnostics export
// ---------------------------------------------------------------------------

/// Write a diagnostics zip under `output_dir` and return its path.
///
/// The archive holds `about.json`, `settings.json` with secrets masked, and
/// `logs/` copies of the log files found in `log_dir` (a missing `log_dir`
/// is fine). Each log file is capped at [`MAX_LOG_SIZE`].
pub fn export_diagnostics(
    settings: &Settings,
    log_dir: &Path,
    output_dir: &Path,
) -> Result<PathBuf, DiagnosticsError> {
    fs::create_dir_all(output_dir).map_err(io_err(output_dir))?;
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let zip_path = output_dir.join(format!("syndicate-pos-diagnostics-{timestamp}.zip"));

    let file = fs::File::create(&zip_path).map_err(io_err(&zip_path))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    zip.start_file("about.json", options)?;
    zip.write_all(serde_json::to_string_pretty(&about_info())?.as_bytes())
        .map_err(io_err(&zip_path))?;

    let settings_value = redact_sensitive_fields(serde_json::to_value(settings)?);
    zip.start_file("settings.json", options)?;
    zip.write_all(serde_json::to_string_pretty(&settings_value)?.as_bytes())
        .map_err(io_err(&zip_path))?;

    let mut included = 0usize;
    for (path, _) in log_files(log_dir) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let mut buf = Vec::new();
        let read = fs::File::open(&path).and_then(|f| f.take(MAX_LOG_SIZE).read_to_end(&mut buf));
        if let Err(e) = read {
            warn!(path = %path.display(), error = %e, "Skipping log file");
            continue;
        }
        zip.start_file(format!("logs/{name}"), options)?;
        zip.write_all(&buf).map_err(io_err(&zip_path))?;
        included += 1;
    }

    zip.finish()?;
    info!(path = %zip_path.display(), logs = included, "Diagnostics exported");
    Ok(zip_path)
}

fn redact_sensitive_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, v)| {
                    if should_redact_key(&key) && !v.is_null() {
                        (key, Value::String(REDACTED.to_string()))
                    } else {
                        (key, redact_sensitive_fields(v))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => {
            Value::Array(items.into_iter().map(redact_sensitive_fields).collect())
        }
        other => other,
    }
}

fn should_redact_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["key", "token", "secret", "password"]
        .iter()
        .any(|marker| key.contains(marker))
}

// ---------------------------------------------------------------------------
// Log rotation
// ---------------------------------------------------------------------------

/// Per-user application data directory, falling back to the working
/// directory when no home is known.
fn data_dir() -> PathBuf {
    let var = |name: &str| {
        std::env::var_os(name)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
    };
    if let Some(dir) = var("LOCALAPPDATA").or_else(|| var("XDG_DATA_HOME")) {
        return dir;
    }
    if cfg!(windows) {
        var("USERPROFILE")
            .unwrap_or_else(|| PathBuf::from("."))
            .join("AppData")
            .join("Local")
    } else {
        var("HOME")
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".local")
            .join("share")
    }
}

/// Default log directory: `<data dir>/com.syndicate.pos/logs`.
pub fn get_log_dir() -> PathBuf {
    data_dir().join(APP_ID).join("logs")
}

/// Log files in `dir`, newest first.
fn log_files(dir: &Path) -> Vec<(PathBuf, std::time::SystemTime)> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    let prefix = format!("{LOG_FILE_PREFIX}.");
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let is_log = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| name.starts_with(&prefix));
        if is_log {
            let modified = entry
                .metadata()
                .ok()
                .and_then(|m| m.modified().ok())
                .unwrap_or(std::time::UNIX_EPOCH);
            files.push((path, modified));
        }
    }
    files.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| b.0.cmp(&a.0)));
    files
}

/// Prune old log files in `dir`, keeping only the newest `keep`.
/// Returns how many were removed.
pub fn prune_old_logs(dir: &Path, keep: usize) -> usize {
    let mut removed = 0;
    for (path, _) in log_files(dir).iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => warn!("Failed to prune log file {}: {e}", path.display()),
        }
    }
    removed
}
