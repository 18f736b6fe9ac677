use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const DEFAULT_LOG_FILE: &str = "docflow.logs.jsonl";

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

fn enabled() -> bool {
    std::env::var("DOCFLOW_OBSERVABILITY_ENABLED")
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(true)
}

fn env_filter() -> EnvFilter {
    if let Ok(level) = std::env::var("DOCFLOW_LOG_LEVEL")
        && let Ok(filter) = EnvFilter::try_new(level)
    {
        return filter;
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Splits a log path into (directory, file name), creating the directory.
fn log_target(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&dir);
    let file = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (dir, file)
}

/// Installs the global `tracing` subscriber once per process.
///
/// Environment variables:
/// - `DOCFLOW_OBSERVABILITY_ENABLED`: kill switch (default enabled).
/// - `DOCFLOW_LOG_LEVEL`: filter directive; falls back to `RUST_LOG`, then `info`.
/// - `DOCFLOW_JSON_LOG_PATH`: when set, JSON lines are appended to that file
///   instead of compact console output on stdout.
pub fn init_observability() {
    INIT.get_or_init(|| {
        if !enabled() {
            return;
        }
        let filter = env_filter();
        match std::env::var("DOCFLOW_JSON_LOG_PATH") {
            Ok(raw) => {
                let (dir, file) = log_target(Path::new(&raw));
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_target(false)
                    .with_writer(tracing_appender::rolling::never(dir, file));
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
            Err(_) => {
                let layer = tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stdout);
                let _ = tracing_subscriber::registry()
                    .with(filter)
                    .with(layer)
                    .try_init();
            }
        }
    });
}
