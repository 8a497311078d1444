//! Execution step
//!
//! Runs a built artifact inside its execution directory, wrapped in the
//! configured sandbox profile when one is enabled.

use tracing::{debug, instrument};

use crate::config::Config;
use crate::runner::ExecuteError;
use crate::runner::compile::Artifact;
use crate::sandbox::{SandboxCommand, resolve_command, run_batch};
use crate::types::{ExecutionLimits, RawExecution};

/// Run an artifact once with batch I/O
#[instrument(skip(config, artifact, input), fields(submission = %artifact.submission_id()))]
pub async fn execute(
    config: &Config,
    artifact: &Artifact,
    input: Option<&[u8]>,
    limits: &ExecutionLimits,
) -> Result<RawExecution, ExecuteError> {
    if !artifact.binary().is_file() {
        return Err(ExecuteError::NotStarted(format!(
            "'{}' not found - was compilation run?",
            artifact.binary().display()
        )));
    }

    let mut run_cmd = artifact.run_command().to_vec();
    resolve_command(&mut run_cmd, artifact.search_path())?;

    debug!(?run_cmd, "executing program");

    let command = SandboxCommand::new(run_cmd)
        .profile(config.sandbox_profile())
        .network_disabled(limits.network_disabled)
        .working_dir(artifact.workdir())
        .envs(artifact.env())
        .path(artifact.search_path());

    Ok(run_batch(&command, input, limits).await?)
}
