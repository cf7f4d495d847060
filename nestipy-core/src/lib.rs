//! Nestipy Core - session logic shared by the `nestipy` CLI
//!
//! Everything in this crate is free of process and descriptor handling: it
//! builds the immutable start configuration, the backend logging
//! configuration, the hot-reload path sets, and the two line-level
//! transformations applied to subprocess output (frontend classification and
//! backend prefix rewriting).
//!
//! Spawning, supervising, and descriptor redirection live in the `nestipy`
//! crate.

pub mod ansi;
pub mod classify;
pub mod lines;
pub mod logging_config;
pub mod reload;
pub mod rewrite;
pub mod server;
pub mod start_config;

pub use classify::{
    Category, Classification, Emission, EmissionKind, Level, SessionState, Verbosity, classify,
};
pub use lines::{LineBuffer, LineSplit};
pub use logging_config::{
    LoggingConfig, LoggingConfigError, LoggingConfigFile, build_logging_config, ensure_log_dir,
    write_logging_config,
};
pub use reload::{ReloadPathResolver, ReloadPathSet, ReloadRequest, ScaffoldDirs};
pub use rewrite::{CANONICAL_TAG, rewrite_line};
pub use server::server_args;
pub use start_config::{
    HttpChoice, LoopChoice, ReloadSettings, StartConfig, select_port, MICROSERVICE_PORT_RANGE,
};
