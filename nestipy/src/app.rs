//! The application handle.
//!
//! The framework's application object lives in another process; this side
//! only needs its locator, whether it is a microservice, and the
//! `start()`/`ready()` pair that runs before the server binds its port.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::process::exit_code;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid application locator '{0}': expected <module path>:<attribute>")]
    InvalidLocator(String),

    #[error("Failed to parse bootstrap command '{command}': {source}")]
    BootstrapParse {
        command: String,
        source: shell_words::ParseError,
    },

    #[error("Bootstrap command is empty")]
    EmptyBootstrap,

    #[error("Failed to run bootstrap command '{command}': {source}")]
    BootstrapSpawn { command: String, source: io::Error },

    #[error("Bootstrap command '{command}' exited with code {code}")]
    BootstrapFailed { command: String, code: i32 },

    #[error("Failed to create async runtime: {0}")]
    Runtime(io::Error),
}

/// `module/path:attribute`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppLocator {
    module: String,
    attribute: String,
}

impl AppLocator {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let invalid = || AppError::InvalidLocator(raw.to_string());
        let (module, attribute) = raw.rsplit_once(':').ok_or_else(invalid)?;
        let module = module.trim();
        let attribute = attribute.trim();
        if module.is_empty() || attribute.is_empty() {
            return Err(invalid());
        }
        Ok(Self {
            module: module.to_string(),
            attribute: attribute.to_string(),
        })
    }

    /// Directory containing the module file.
    pub fn project_root(&self, cwd: &Path) -> PathBuf {
        let module = cwd.join(&self.module);
        module
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf())
    }

    /// Locator importable from [`Self::project_root`].
    pub fn target(&self) -> String {
        let stem = Path::new(&self.module)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.module.clone());
        let stem = stem.strip_suffix(".py").unwrap_or(&stem);
        format!("{stem}:{}", self.attribute)
    }
}

#[async_trait]
pub trait Application: Send + Sync {
    fn locator(&self) -> &AppLocator;

    fn is_microservice(&self) -> bool;

    async fn start(&self) -> Result<(), AppError>;

    async fn ready(&self) -> Result<(), AppError> {
        Ok(())
    }
}

/// Application whose lifecycle runs out of process.
pub struct ExternalApplication {
    locator: AppLocator,
    microservice: bool,
    bootstrap: Option<String>,
    project_root: PathBuf,
}

impl ExternalApplication {
    pub fn new(
        locator: AppLocator,
        microservice: bool,
        bootstrap: Option<String>,
        project_root: PathBuf,
    ) -> Self {
        Self {
            locator,
            microservice,
            bootstrap,
            project_root,
        }
    }
}

#[async_trait]
impl Application for ExternalApplication {
    fn locator(&self) -> &AppLocator {
        &self.locator
    }

    fn is_microservice(&self) -> bool {
        self.microservice
    }

    async fn start(&self) -> Result<(), AppError> {
        let Some(command) = self.bootstrap.as_deref() else {
            return Ok(());
        };
        let argv = shell_words::split(command).map_err(|source| AppError::BootstrapParse {
            command: command.to_string(),
            source,
        })?;
        let (program, args) = argv.split_first().ok_or(AppError::EmptyBootstrap)?;

        tracing::info!(command, "running bootstrap command");
        let status = tokio::process::Command::new(program)
            .args(args)
            .current_dir(&self.project_root)
            .status()
            .await
            .map_err(|source| AppError::BootstrapSpawn {
                command: command.to_string(),
                source,
            })?;
        if !status.success() {
            return Err(AppError::BootstrapFailed {
                command: command.to_string(),
                code: exit_code(&status),
            });
        }
        Ok(())
    }
}

/// Run `start()` then `ready()` to completion on a current-thread runtime.
pub fn run_lifecycle(app: &dyn Application) -> Result<(), AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    tracing::debug!(app = %app.locator().target(), "running application lifecycle");
    runtime.block_on(async {
        app.start().await?;
        app.ready().await
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_parses_module_and_attribute() {
        let locator = AppLocator::parse("src/main:app").unwrap();
        assert_eq!(locator.target(), "main:app");
        assert_eq!(
            locator.project_root(Path::new("/work")),
            PathBuf::from("/work/src")
        );

        let bare = AppLocator::parse("main:app").unwrap();
        assert_eq!(bare.project_root(Path::new("/work")), PathBuf::from("/work"));
        assert_eq!(bare.target(), "main:app");

        let file = AppLocator::parse("api/server.py:application").unwrap();
        assert_eq!(file.target(), "server:application");
    }

    #[test]
    fn locator_rejects_malformed_input() {
        for raw in ["main", ":app", "main:", ""] {
            assert!(
                matches!(AppLocator::parse(raw), Err(AppError::InvalidLocator(_))),
                "{raw}"
            );
        }
    }

    fn app(bootstrap: Option<&str>) -> ExternalApplication {
        ExternalApplication::new(
            AppLocator::parse("main:app").unwrap(),
            true,
            bootstrap.map(str::to_string),
            std::env::temp_dir(),
        )
    }

    #[tokio::test]
    async fn start_without_bootstrap_is_a_no_op() {
        let app = app(None);
        assert!(app.is_microservice());
        app.start().await.unwrap();
        app.ready().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn start_reports_bootstrap_exit_code() {
        let err = app(Some("sh -c 'exit 3'")).start().await.unwrap_err();
        match err {
            AppError::BootstrapFailed { code, .. } => assert_eq!(code, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn start_rejects_unbalanced_quotes() {
        let err = run_lifecycle(&app(Some("echo 'oops"))).unwrap_err();
        assert!(matches!(err, AppError::BootstrapParse { .. }), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn lifecycle_runs_bootstrap_to_completion() {
        let dir = tempfile::TempDir::new().unwrap();
        let app = ExternalApplication::new(
            AppLocator::parse("main:app").unwrap(),
            true,
            Some("sh -c 'touch booted'".to_string()),
            dir.path().to_path_buf(),
        );
        run_lifecycle(&app).unwrap();
        assert!(dir.path().join("booted").exists());
    }
}
