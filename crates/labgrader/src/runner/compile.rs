//! Compilation step
//!
//! Stages a submission into its own execution directory and builds it with
//! the toolchain's compiler. Interpreted toolchains skip the build.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::{Config, Placeholders, Toolchain};
use crate::layout::is_report_file;
use crate::runner::CompileError;
use crate::sandbox::{ExecutionDir, SandboxCommand, resolve_command, run_with_output};
use crate::types::{ExecutionLimits, SubmissionUnit};

/// A built submission, ready to run
///
/// Owns the submission's execution directory; dropping the artifact removes
/// it.
#[derive(Debug)]
pub struct Artifact {
    dir: ExecutionDir,

    /// Absolute path of the built program, or the entry source when interpreted
    binary: PathBuf,

    /// Expanded run command
    run_command: Vec<String>,

    env: BTreeMap<String, String>,

    /// PATH for the program
    path: String,
}

impl Artifact {
    pub fn submission_id(&self) -> &str {
        self.dir.submission_id()
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Execution directory the program runs in
    pub fn workdir(&self) -> &Path {
        self.dir.path()
    }

    pub fn run_command(&self) -> &[String] {
        &self.run_command
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn search_path(&self) -> &str {
        &self.path
    }

    /// Remove the execution directory
    pub fn cleanup(self) {
        // Failures are logged by the directory itself
        let _ = self.dir.cleanup();
    }
}

/// Build a submission
///
/// Every regular file of the submission except earlier reports is copied into
/// a fresh execution directory. Sources are the staged top-level files with
/// the toolchain's extension, passed to the compiler in sorted order and
/// relative to the execution directory.
#[instrument(skip(config, toolchain), fields(toolchain = %toolchain.name, submission = %submission.id))]
pub async fn compile(
    config: &Config,
    toolchain: &Toolchain,
    submission: &SubmissionUnit,
) -> Result<Artifact, CompileError> {
    let dir = ExecutionDir::create(&config.work_dir(), &submission.id)?;
    let staged = dir
        .stage_from(&submission.path, |name| !is_report_file(name))
        .await?;

    let sources: Vec<String> = staged
        .into_iter()
        .filter(|name| toolchain.is_source(name))
        .collect();
    if sources.is_empty() {
        return Err(CompileError::NoSources {
            extension: toolchain.extension.to_string(),
        });
    }

    let binary = match &toolchain.compile {
        Some(compile_config) => {
            let binary = dir.path().join(&compile_config.output_name);
            let mut command = Toolchain::expand_command(
                &compile_config.command,
                &Placeholders {
                    sources: &sources,
                    binary: &binary,
                    workdir: dir.path(),
                },
            );
            resolve_command(&mut command, &compile_config.path)?;

            debug!(?command, "compiling");

            let command = SandboxCommand::new(command)
                .working_dir(dir.path())
                .envs(&compile_config.env)
                .path(&compile_config.path);
            let limits = ExecutionLimits::new()
                .with_timeout_seconds(config.compile_timeout)
                .with_max_output(config.max_output);

            let (result, output) = run_with_output(&command, &limits).await?;

            debug!(
                exit_code = ?result.exit_code,
                timed_out = result.timed_out,
                wall_time_ms = result.wall_time.as_millis() as u64,
                "compilation complete"
            );

            if result.timed_out {
                return Err(CompileError::Timeout {
                    seconds: limits.timeout_seconds,
                });
            }
            if !result.is_success() {
                return Err(CompileError::Failed {
                    exit_code: result.exit_code,
                    output,
                });
            }
            if !dir.file_exists(&compile_config.output_name).await? {
                return Err(CompileError::MissingArtifact(
                    compile_config.output_name.clone(),
                ));
            }
            binary
        }
        None => dir.path().join(&sources[0]),
    };

    // Run commands see absolute paths so they never depend on the cwd
    let absolute_sources: Vec<String> = sources
        .iter()
        .map(|name| dir.path().join(name).to_string_lossy().into_owned())
        .collect();
    let run_command = Toolchain::expand_command(
        &toolchain.run.command,
        &Placeholders {
            sources: &absolute_sources,
            binary: &binary,
            workdir: dir.path(),
        },
    );

    Ok(Artifact {
        binary,
        run_command,
        env: toolchain.run.env.clone(),
        path: toolchain.run.path.clone(),
        dir,
    })
}
