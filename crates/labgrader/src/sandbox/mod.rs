//! Restricted process execution
//!
//! Builds wrapped command lines, owns the per-submission execution
//! directories and runs processes with a wall clock limit and capped output.

use std::path::Path;

use thiserror::Error;

pub use crate::sandbox::command::SandboxCommand;
pub use crate::sandbox::exec_dir::ExecutionDir;
pub use crate::sandbox::process::{run_batch, run_with_output};

mod command;
mod exec_dir;
mod process;

/// Errors that occur while preparing or running a sandboxed process
#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to create execution directory under {path}: {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("command failed: {0}")]
    CommandFailed(String),

    #[error("command '{0}' not found in PATH")]
    CommandNotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resolve the program in a command to an absolute path using `search_path`.
///
/// Processes are spawned with a cleared environment, so a bare program name
/// (like `gcc`) is looked up in the toolchain's configured PATH rather than
/// the grader's own. Commands that already contain a `/` are left unchanged.
pub fn resolve_command(command: &mut [String], search_path: &str) -> Result<(), SandboxError> {
    let first = match command.first_mut() {
        Some(first) => first,
        None => return Err(SandboxError::CommandFailed("empty command".to_string())),
    };

    if first.contains('/') {
        return Ok(());
    }

    for dir in search_path.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(&*first);
        if candidate.is_file() {
            *first = candidate.to_string_lossy().into_owned();
            return Ok(());
        }
    }

    Err(SandboxError::CommandNotFound(first.clone()))
}
