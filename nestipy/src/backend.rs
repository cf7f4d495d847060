//! Launching the backend application server.

use std::io;
use std::path::Path;
use std::process::Command;

use nestipy_core::{StartConfig, server_args};

use crate::process::exit_code;

/// The server command for `config`, run from the project root so the
/// locator's module is importable.
pub fn build_command(program: &str, config: &StartConfig, project_root: &Path) -> Command {
    let mut command = Command::new(program);
    command
        .args(server_args(config))
        .current_dir(project_root)
        .env("PYTHONUNBUFFERED", "1");
    command
}

/// Run the server to completion with inherited stdio. Returns its exit code.
pub fn launch(program: &str, config: &StartConfig, project_root: &Path) -> io::Result<i32> {
    let mut command = build_command(program, config, project_root);
    tracing::info!(
        program,
        args = ?server_args(config),
        "launching backend server"
    );
    let status = command.status()?;
    Ok(exit_code(&status))
}
