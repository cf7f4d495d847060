//! Logging configuration for the backend server process.
//!
//! The backend consumes a `logging.config.dictConfig`-shaped JSON document.
//! It is modeled here as typed structs and materialized to a temporary file
//! whose lifetime the session owns.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempPath;
use thiserror::Error;

pub const LOG_DIR_NAME: &str = "logs";
pub const DEFAULT_LOG_FILE: &str = "default.log";
pub const ACCESS_LOG_FILE: &str = "access.log";

const SERVER_LOGGER: &str = "_granian";
const ACCESS_LOGGER: &str = "granian.access";

const CONSOLE_HANDLER: &str = "console";
const CONSOLE_ACCESS_HANDLER: &str = "console-access";
const FILE_HANDLER: &str = "default";
const FILE_ACCESS_HANDLER: &str = "access";

const STREAM_HANDLER_CLASS: &str = "logging.StreamHandler";
const FILE_HANDLER_CLASS: &str = "logging.FileHandler";

#[derive(Debug, Error)]
pub enum LoggingConfigError {
    #[error("Failed to prepare log directory {0}: {1}")]
    LogDir(PathBuf, std::io::Error),

    #[error("Failed to create logging config file: {0}")]
    TempFile(std::io::Error),

    #[error("Failed to write logging config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Formatter {
    #[serde(rename = "()")]
    pub factory: String,
    pub fmt: String,
    pub datefmt: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub class: String,
    pub formatter: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<PathBuf>,
}

impl Handler {
    fn console(formatter: &str) -> Self {
        Self {
            class: STREAM_HANDLER_CLASS.to_string(),
            formatter: formatter.to_string(),
            stream: Some("ext://sys.stdout".to_string()),
            filename: None,
        }
    }

    fn file(formatter: &str, filename: PathBuf) -> Self {
        Self {
            class: FILE_HANDLER_CLASS.to_string(),
            formatter: formatter.to_string(),
            stream: None,
            filename: Some(filename),
        }
    }

    pub fn is_console(&self) -> bool {
        self.class == STREAM_HANDLER_CLASS
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Logger {
    pub handlers: Vec<String>,
    pub level: String,
    pub propagate: bool,
}

impl Logger {
    fn info(handlers: &[&str]) -> Self {
        Self {
            handlers: handlers.iter().map(|h| h.to_string()).collect(),
            level: "INFO".to_string(),
            propagate: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggingConfig {
    pub version: u8,
    pub disable_existing_loggers: bool,
    pub formatters: BTreeMap<String, Formatter>,
    pub handlers: BTreeMap<String, Handler>,
    pub loggers: BTreeMap<String, Logger>,
}

fn formatters() -> BTreeMap<String, Formatter> {
    let datefmt = "[%Y-%m-%d %H:%M:%S %z]".to_string();
    BTreeMap::from([
        (
            "generic".to_string(),
            Formatter {
                factory: "logging.Formatter".to_string(),
                fmt: "[%(levelname)s] %(message)s".to_string(),
                datefmt: datefmt.clone(),
            },
        ),
        (
            "access".to_string(),
            Formatter {
                factory: "logging.Formatter".to_string(),
                fmt: "%(message)s".to_string(),
                datefmt,
            },
        ),
    ])
}

/// Loggers used in development: console sinks only.
pub fn development_loggers() -> BTreeMap<String, Logger> {
    BTreeMap::from([
        (SERVER_LOGGER.to_string(), Logger::info(&[CONSOLE_HANDLER])),
        (
            ACCESS_LOGGER.to_string(),
            Logger::info(&[CONSOLE_ACCESS_HANDLER]),
        ),
    ])
}

/// Fixed production logger mapping: every console sink is mirrored to a file.
pub fn production_loggers() -> BTreeMap<String, Logger> {
    BTreeMap::from([
        (
            SERVER_LOGGER.to_string(),
            Logger::info(&[FILE_HANDLER, CONSOLE_HANDLER]),
        ),
        (
            ACCESS_LOGGER.to_string(),
            Logger::info(&[FILE_ACCESS_HANDLER, CONSOLE_ACCESS_HANDLER]),
        ),
    ])
}

/// Build the backend logging configuration.
///
/// In production the `logs/` directory under `base_dir` and both log files are
/// created if missing, and file sinks are added next to the console ones.
pub fn build_logging_config(
    dev: bool,
    base_dir: &Path,
) -> Result<LoggingConfig, LoggingConfigError> {
    let mut handlers = BTreeMap::from([
        (CONSOLE_HANDLER.to_string(), Handler::console("generic")),
        (
            CONSOLE_ACCESS_HANDLER.to_string(),
            Handler::console("access"),
        ),
    ]);

    let loggers = if dev {
        development_loggers()
    } else {
        let log_dir = ensure_log_dir(base_dir)?;
        handlers.insert(
            FILE_HANDLER.to_string(),
            Handler::file("generic", log_dir.join(DEFAULT_LOG_FILE)),
        );
        handlers.insert(
            FILE_ACCESS_HANDLER.to_string(),
            Handler::file("access", log_dir.join(ACCESS_LOG_FILE)),
        );
        production_loggers()
    };

    Ok(LoggingConfig {
        version: 1,
        disable_existing_loggers: false,
        formatters: formatters(),
        handlers,
        loggers,
    })
}

/// Create `logs/`, `logs/default.log` and `logs/access.log` under `base_dir`.
/// Existing files are left untouched.
pub fn ensure_log_dir(base_dir: &Path) -> Result<PathBuf, LoggingConfigError> {
    let log_dir = base_dir.join(LOG_DIR_NAME);
    fs::create_dir_all(&log_dir).map_err(|e| LoggingConfigError::LogDir(log_dir.clone(), e))?;
    for name in [DEFAULT_LOG_FILE, ACCESS_LOG_FILE] {
        let path = log_dir.join(name);
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| LoggingConfigError::LogDir(path.clone(), e))?;
    }
    Ok(log_dir)
}

/// Temporary JSON file holding a [`LoggingConfig`]. Removed on drop.
#[derive(Debug)]
pub struct LoggingConfigFile {
    path: TempPath,
}

impl LoggingConfigFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize `config` into a fresh temporary file.
pub fn write_logging_config(
    config: &LoggingConfig,
) -> Result<LoggingConfigFile, LoggingConfigError> {
    let file = tempfile::Builder::new()
        .prefix("nestipy-logging-")
        .suffix(".json")
        .tempfile()
        .map_err(LoggingConfigError::TempFile)?;
    let (file, path) = file.into_parts();
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, config)?;
    writer.flush().map_err(LoggingConfigError::TempFile)?;
    tracing::debug!(path = %path.display(), "wrote logging config");
    Ok(LoggingConfigFile { path })
}
